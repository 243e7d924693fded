//! Loading `UiConfig` from TOML files.

use coordinator_ui::config::{UiConfig, DEFAULT_DRAIN_TIMEOUT_MS, DEFAULT_PORT};
use coordinator_ui::UiError;
use std::io::Write;
use std::path::PathBuf;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_full_file() {
    let file = write_config(
        r#"
host = "127.0.0.1"
port = 9191
stack_size = "0x10000"
template_dir = "/srv/ui/templates"
drain_timeout_ms = 750
"#,
    );
    let config = UiConfig::load(file.path()).unwrap();
    assert_eq!(config.bind_addr(), "127.0.0.1:9191");
    assert_eq!(config.stack_size, 0x10000);
    assert_eq!(config.template_dir, Some(PathBuf::from("/srv/ui/templates")));
    assert_eq!(config.drain_timeout_ms, 750);
}

#[test]
fn test_partial_file_keeps_defaults() {
    let file = write_config("port = 1234\n");
    let config = UiConfig::load(file.path()).unwrap();
    assert_eq!(config.port, 1234);
    assert_eq!(config.host, "0.0.0.0");
    assert_eq!(config.drain_timeout_ms, DEFAULT_DRAIN_TIMEOUT_MS);
}

#[test]
fn test_empty_file_is_default() {
    let file = write_config("");
    let config = UiConfig::load(file.path()).unwrap();
    assert_eq!(config, UiConfig::default());
    assert_eq!(config.port, DEFAULT_PORT);
}

#[test]
fn test_unknown_key_is_rejected() {
    let file = write_config("port = 1\nworkers = 4\n");
    let err = UiConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, UiError::Config(_)), "{err:?}");
}

#[test]
fn test_zero_stack_size_is_rejected() {
    let file = write_config("stack_size = 0\n");
    assert!(matches!(UiConfig::load(file.path()), Err(UiError::Config(_))));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = UiConfig::load(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, UiError::Io(_)), "{err:?}");
}
