//! Configuration loading and root folder resolution
//!
//! Tests that manipulate GCUR_ROOT_FOLDER are marked #[serial] so they do not
//! race on the process environment.

use gcur_common::config::{
    default_root_folder, resolve_root_folder, LoggingConfig, TomlConfig, DEFAULT_DATABASE_FILE,
    ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};

#[test]
#[serial]
fn test_cli_argument_wins() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/gcur-from-env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/gcur-from-toml")),
        ..Default::default()
    };

    let resolved = resolve_root_folder(Some(Path::new("/tmp/gcur-from-cli")), &toml);
    assert_eq!(resolved, PathBuf::from("/tmp/gcur-from-cli"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_env_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/gcur-from-env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/gcur-from-toml")),
        ..Default::default()
    };

    assert_eq!(resolve_root_folder(None, &toml), PathBuf::from("/tmp/gcur-from-env"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_toml_beats_default() {
    env::remove_var(ROOT_FOLDER_ENV);
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/gcur-from-toml")),
        ..Default::default()
    };

    assert_eq!(resolve_root_folder(None, &toml), PathBuf::from("/tmp/gcur-from-toml"));
}

#[test]
#[serial]
fn test_falls_back_to_compiled_default() {
    env::remove_var(ROOT_FOLDER_ENV);
    let resolved = resolve_root_folder(None, &TomlConfig::default());
    assert_eq!(resolved, default_root_folder());
    assert!(!resolved.as_os_str().is_empty());
}

#[test]
fn test_parse_full_toml() {
    let config = TomlConfig::parse(
        r#"
        root_folder = "/srv/gcur"
        database_file = "curation.db"
        scoring_config = "/srv/gcur/sop.toml"

        [logging]
        level = "debug"
        "#,
    )
    .unwrap();

    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/gcur")));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(
        config.database_path(Path::new("/srv/gcur")),
        PathBuf::from("/srv/gcur/curation.db")
    );
}

#[test]
fn test_empty_toml_uses_defaults() {
    let config = TomlConfig::parse("").unwrap();
    assert_eq!(config, TomlConfig::default());
    assert_eq!(config.logging, LoggingConfig::default());
    assert_eq!(
        config.database_path(Path::new("/data")),
        PathBuf::from("/data").join(DEFAULT_DATABASE_FILE)
    );
}

#[test]
fn test_malformed_toml_is_config_error() {
    let err = TomlConfig::parse("root_folder = [").unwrap_err();
    assert!(matches!(err, gcur_common::Error::Config(_)));
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "database_file = \"alt.db\"").unwrap();

    let config = TomlConfig::load(file.path()).unwrap();
    assert_eq!(config.database_file.as_deref(), Some("alt.db"));
}

#[test]
fn test_load_missing_file_is_config_error() {
    let err = TomlConfig::load(Path::new("/nonexistent/gcur.toml")).unwrap_err();
    assert!(matches!(err, gcur_common::Error::Config(_)));
}
