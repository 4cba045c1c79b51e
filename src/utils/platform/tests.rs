use super::*;

#[cfg(unix)]
#[test]
fn build_program_resolves_from_path() {
    let cmd = build_program_command("sh", &["-c".to_string(), "true".to_string()]).unwrap();
    let debug = format!("{:?}", cmd);
    assert!(debug.contains("sh"));
}

#[test]
fn missing_program_is_reported() {
    let err = build_program_command("extdata-no-such-program", &[]).unwrap_err();
    assert!(matches!(err, ExtDataError::SystemCommandFailed { .. }));
}
