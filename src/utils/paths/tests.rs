use super::*;

#[test]
fn explicit_config_path_wins() {
    let path = config_file(Some(Path::new("/tmp/custom.kdl"))).unwrap();
    assert_eq!(path, PathBuf::from("/tmp/custom.kdl"));
}

#[test]
fn throttle_file_uses_expected_filename() {
    let path = throttle_file().expect("throttle_file should resolve");
    assert_eq!(
        path.file_name().and_then(|f| f.to_str()),
        Some(project_identity::THROTTLE_FILE_BASENAME)
    );
}

#[test]
fn cache_db_uses_expected_filename() {
    let path = cache_db_file().expect("cache_db_file should resolve");
    assert_eq!(
        path.file_name().and_then(|f| f.to_str()),
        Some(project_identity::CACHE_DB_BASENAME)
    );
}

#[test]
fn expand_home_leaves_absolute_paths() {
    let path = expand_home(Path::new("/var/data")).unwrap();
    assert_eq!(path, PathBuf::from("/var/data"));
}
