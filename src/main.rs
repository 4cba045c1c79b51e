fn main() {
    extdata::run_cli();
}
