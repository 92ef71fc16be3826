//! Probe integration tests against local database files.

use ahti_connect::config::{ConnectionConfig, ProbeConfig};
use ahti_connect::db::{self, DatabaseClient, Value};
use ahti_connect::output::{render_report, render_rows, OutputFormat};
use ahti_connect::probe::{Probe, ProbeStep};

fn local_config(dir: &tempfile::TempDir) -> ConnectionConfig {
    ConnectionConfig::local(dir.path().join("local.db"))
}

#[tokio::test]
async fn test_probe_on_local_file() {
    let dir = tempfile::tempdir().unwrap();
    let connection = local_config(&dir);
    let client = db::connect(&connection).await.unwrap();
    let probe_config = ProbeConfig::default();

    let report = Probe::new(client.as_ref(), &probe_config)
        .run(connection.display_string())
        .await
        .unwrap();

    // Local files have nothing to sync with.
    let steps: Vec<ProbeStep> = report.steps.iter().map(|s| s.step).collect();
    assert_eq!(
        steps,
        vec![ProbeStep::CreateTable, ProbeStep::Insert, ProbeStep::Select]
    );
    assert_eq!(report.result.rows, vec![vec![Value::Int(1)]]);
    assert_eq!(render_report(&report, OutputFormat::Rows).unwrap(), "[(1,)]");

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_rows_persist_across_connections() {
    let dir = tempfile::tempdir().unwrap();
    let connection = local_config(&dir);
    let probe_config = ProbeConfig::default();

    for _ in 0..2 {
        let client = db::connect(&connection).await.unwrap();
        Probe::new(client.as_ref(), &probe_config)
            .run("local")
            .await
            .unwrap();
        client.close().await.unwrap();
    }

    let client = db::connect(&connection).await.unwrap();
    let result = client.query("select * from users").await.unwrap();
    assert_eq!(render_rows(&result), "[(1,), (1,)]");
}

#[tokio::test]
async fn test_probe_custom_table() {
    let dir = tempfile::tempdir().unwrap();
    let client = db::connect(&local_config(&dir)).await.unwrap();
    let probe_config = ProbeConfig {
        table: "probe_rows".to_string(),
        value: -7,
    };

    let report = Probe::new(client.as_ref(), &probe_config)
        .run("local")
        .await
        .unwrap();

    assert_eq!(report.result.rows, vec![vec![Value::Int(-7)]]);
    assert_eq!(report.result.columns[0].name, "id");
}

#[tokio::test]
async fn test_probe_fails_on_incompatible_table() {
    let dir = tempfile::tempdir().unwrap();
    let client = db::connect(&local_config(&dir)).await.unwrap();
    client
        .execute("CREATE TABLE users (name TEXT NOT NULL)")
        .await
        .unwrap();

    let err = Probe::new(client.as_ref(), &ProbeConfig::default())
        .run("local")
        .await
        .unwrap_err();

    assert_eq!(err.category(), "Query Error");
    assert!(err.to_string().contains("insert: "), "got: {err}");

    let result = client.query("select * from users").await.unwrap();
    assert!(result.is_empty());
}
