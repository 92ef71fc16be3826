//! Config file integration tests.

use std::io::Write;

use ahti_connect::config::{Config, ConnectionConfig, ConnectionMode};
use ahti_connect::connection::resolve_connection_with_env;
use ahti_connect::error::AhtiError;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_config_with_connections_and_probe() {
    let file = write_config(
        r#"
[probe]
table = "probe_rows"

[connections.default]
sync_url = "http://localhost:8082"
local_path = "local.db"

[connections.prod]
mode = "remote"
sync_url = "libsql://prod.example.com"
auth_token = "prod-token"
"#,
    );

    let config = Config::load_from_file(file.path()).unwrap();
    assert_eq!(config.probe.table, "probe_rows");
    assert_eq!(config.probe.value, 1);

    let prod = config.get_connection(Some("prod")).unwrap();
    assert_eq!(prod.effective_mode(), ConnectionMode::Remote);
    prod.validate().unwrap();
}

#[test]
fn test_missing_config_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_from_file(&dir.path().join("missing.toml")).unwrap();
    assert!(config.connections.is_empty());
}

#[test]
fn test_malformed_config_names_file() {
    let file = write_config("[connections.default\nsync_url = 1");

    let err = Config::load_from_file(file.path()).unwrap_err();
    assert!(matches!(err, AhtiError::Config(_)));
    assert!(err.to_string().contains(&file.path().display().to_string()));
}

#[test]
fn test_resolution_against_loaded_file() {
    let file = write_config(
        r#"
[connections.default]
sync_url = "http://file:8080"
"#,
    );
    let config = Config::load_from_file(file.path()).unwrap();
    let env = |key: &str| (key == "LIBSQL_AUTH_TOKEN").then(|| "env-token".to_string());

    let cli = ConnectionConfig {
        local_path: Some("replica.db".into()),
        ..Default::default()
    };
    let conn = resolve_connection_with_env(&cli, None, &config, env).unwrap();

    assert_eq!(conn.sync_url.as_deref(), Some("http://file:8080"));
    assert_eq!(conn.auth_token.as_deref(), Some("env-token"));
    assert_eq!(
        conn.display_string(),
        "replica.db <- http://file:8080 (replica, token)"
    );
}
