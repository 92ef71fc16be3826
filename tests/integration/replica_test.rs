//! Embedded replica integration tests.
//!
//! Require a running libSQL server at LIBSQL_TEST_URL.

use ahti_connect::config::{ConnectionConfig, ConnectionMode, ProbeConfig};
use ahti_connect::db::{self, DatabaseClient, LibsqlClient};
use ahti_connect::probe::{Probe, ProbeStep};

/// Helper to build a replica config from the environment.
fn get_test_config(dir: &tempfile::TempDir) -> Option<ConnectionConfig> {
    let url = std::env::var("LIBSQL_TEST_URL").ok()?;
    let mut config = ConnectionConfig::from_url(&url).ok()?;
    config.auth_token = std::env::var("LIBSQL_TEST_AUTH_TOKEN").ok();
    config.local_path = Some(dir.path().join("replica.db"));
    Some(config)
}

#[tokio::test]
async fn test_replica_probe_syncs_around_write() {
    let dir = tempfile::tempdir().unwrap();
    let Some(config) = get_test_config(&dir) else {
        eprintln!("Skipping test: LIBSQL_TEST_URL not set");
        return;
    };

    let client = db::connect(&config).await.unwrap();
    assert!(client.supports_sync());

    let probe_config = ProbeConfig {
        table: "ahti_connect_it".to_string(),
        value: 1,
    };
    let report = Probe::new(client.as_ref(), &probe_config)
        .run(config.display_string())
        .await
        .unwrap();

    assert_eq!(report.steps.first().map(|s| s.step), Some(ProbeStep::InitialSync));
    assert!(report
        .steps
        .iter()
        .any(|s| s.step == ProbeStep::PostCommitSync));
    assert!(report.result.row_count >= 1);

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_remote_mode_query() {
    let dir = tempfile::tempdir().unwrap();
    let Some(mut config) = get_test_config(&dir) else {
        eprintln!("Skipping test: LIBSQL_TEST_URL not set");
        return;
    };
    config.mode = Some(ConnectionMode::Remote);

    let client = LibsqlClient::connect(&config).await.unwrap();
    assert_eq!(client.mode(), ConnectionMode::Remote);
    assert!(!client.supports_sync());

    let result = client.query("SELECT 1").await.unwrap();
    assert_eq!(result.row_count, 1);
}

#[tokio::test(flavor = "current_thread")]
async fn test_replica_unreachable_server() {
    let dir = tempfile::tempdir().unwrap();
    let config = ConnectionConfig {
        local_path: Some(dir.path().join("replica.db")),
        ..ConnectionConfig::from_url("http://127.0.0.1:1").unwrap()
    };

    // Building a replica may defer the network round trip to the first sync.
    let result = match db::connect(&config).await {
        Ok(client) => client.sync().await.map(|_| ()),
        Err(e) => Err(e),
    };

    let err = result.unwrap_err();
    assert!(
        matches!(err.category(), "Connection Error" | "Sync Error"),
        "Expected connection or sync error, got: {err}"
    );
}
