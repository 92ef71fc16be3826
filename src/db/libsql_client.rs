//! libsql database client implementation.
//!
//! Provides the `LibsqlClient` struct that implements the `DatabaseClient`
//! trait for embedded replicas, remote connections and local files.

use crate::config::{ConnectionConfig, ConnectionMode};
use crate::db::{ColumnInfo, DatabaseClient, QueryResult, Row, SyncOutcome, Value, MAX_ROWS};
use crate::error::{AhtiError, Result};
use async_trait::async_trait;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Statement timeout in seconds.
const QUERY_TIMEOUT_SECS: u64 = 30;

/// Replica sync timeout in seconds.
const SYNC_TIMEOUT_SECS: u64 = 60;

/// Maximum number of connection retry attempts.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// libsql database client.
pub struct LibsqlClient {
    db: libsql::Database,
    conn: libsql::Connection,
    mode: ConnectionMode,
    target: String,
}

impl std::fmt::Debug for LibsqlClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibsqlClient")
            .field("mode", &self.mode)
            .field("target", &self.target)
            .finish()
    }
}

impl LibsqlClient {
    /// Opens the database described by `config` and connects to it.
    ///
    /// Transient failures are retried with exponential backoff.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        config.validate()?;

        let mode = config.effective_mode();
        let target = config.display_string();
        let mut last_error = None;
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

        for attempt in 1..=MAX_RETRY_ATTEMPTS {
            debug!("Connection attempt {} of {}", attempt, MAX_RETRY_ATTEMPTS);

            match build_database(config).await {
                Ok(db) => {
                    let conn = db
                        .connect()
                        .map_err(|e| map_connection_error(e, &target))?;
                    debug!("Opened {} database: {}", mode, target);
                    return Ok(Self {
                        db,
                        conn,
                        mode,
                        target,
                    });
                }
                Err(e) => {
                    let is_transient = is_transient_error(&e);
                    last_error = Some(e);

                    if attempt < MAX_RETRY_ATTEMPTS && is_transient {
                        warn!(
                            "Connection attempt {} failed (transient error), retrying in {:?}",
                            attempt, delay
                        );
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    } else {
                        break;
                    }
                }
            }
        }

        match last_error {
            Some(e) => Err(map_connection_error(e, &target)),
            None => Err(AhtiError::internal("No connection attempt was made")),
        }
    }

    /// The connection mode this client was opened with.
    pub fn mode(&self) -> ConnectionMode {
        self.mode
    }

    async fn fetch_all(&self, sql: &str) -> Result<(Vec<String>, Vec<Row>, usize)> {
        let mut rows = self.conn.query(sql, ()).await.map_err(map_query_error)?;

        let column_count = rows.column_count();
        let names: Vec<String> = (0..column_count)
            .map(|i| rows.column_name(i).unwrap_or_default().to_string())
            .collect();

        let mut collected: Vec<Row> = Vec::new();
        let mut total_rows = 0usize;

        while let Some(row) = rows.next().await.map_err(map_query_error)? {
            total_rows += 1;
            if collected.len() >= MAX_ROWS {
                continue;
            }

            let mut values = Vec::with_capacity(names.len());
            for i in 0..column_count {
                let value = row.get_value(i).map_err(map_query_error)?;
                values.push(convert_value(value));
            }
            collected.push(values);
        }

        Ok((names, collected, total_rows))
    }
}

#[async_trait]
impl DatabaseClient for LibsqlClient {
    async fn execute(&self, sql: &str) -> Result<u64> {
        with_timeout(QUERY_TIMEOUT_SECS, async {
            self.conn.execute(sql, ()).await.map_err(map_query_error)
        })
        .await
    }

    async fn execute_in_transaction(&self, statements: &[String]) -> Result<u64> {
        let tx = with_timeout(QUERY_TIMEOUT_SECS, async {
            self.conn
                .transaction()
                .await
                .map_err(|e| map_query_error(e).context("begin"))
        })
        .await?;

        let mut affected = 0;
        for sql in statements {
            let result = with_timeout(QUERY_TIMEOUT_SECS, async {
                tx.execute(sql, ()).await.map_err(map_query_error)
            })
            .await;

            match result {
                Ok(n) => affected += n,
                Err(e) => {
                    let rollback = with_timeout(QUERY_TIMEOUT_SECS, async {
                        tx.rollback().await.map_err(map_query_error)
                    })
                    .await;
                    if let Err(rollback_err) = rollback {
                        warn!("Rollback failed: {}", rollback_err);
                    }
                    return Err(e);
                }
            }
        }

        with_timeout(QUERY_TIMEOUT_SECS, async {
            tx.commit()
                .await
                .map_err(|e| map_query_error(e).context("commit"))
        })
        .await?;
        debug!("Committed {} statement(s)", statements.len());

        Ok(affected)
    }

    async fn query(&self, sql: &str) -> Result<QueryResult> {
        let start = Instant::now();
        let (names, rows, total_rows) =
            with_timeout(QUERY_TIMEOUT_SECS, self.fetch_all(sql)).await?;
        let execution_time = start.elapsed();

        let was_truncated = total_rows > MAX_ROWS;
        if was_truncated {
            warn!(
                "Query returned {} rows, truncating to {} rows",
                total_rows, MAX_ROWS
            );
        }

        let columns = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| ColumnInfo::new(name, infer_column_type(&rows, i)))
            .collect();
        let row_count = rows.len();

        Ok(QueryResult {
            columns,
            rows,
            execution_time,
            row_count,
            total_rows: Some(total_rows),
            was_truncated,
        })
    }

    async fn sync(&self) -> Result<SyncOutcome> {
        if self.mode != ConnectionMode::Replica {
            return Err(AhtiError::sync(format!(
                "Sync is not supported in {} mode",
                self.mode
            )));
        }

        let replicated = tokio::time::timeout(Duration::from_secs(SYNC_TIMEOUT_SECS), self.db.sync())
            .await
            .map_err(|_| {
                AhtiError::sync(format!("Sync timed out after {SYNC_TIMEOUT_SECS} seconds"))
            })?
            .map_err(|e| map_sync_error(e, &self.target))?;

        let outcome = SyncOutcome {
            frame_no: replicated.frame_no(),
            frames_synced: replicated.frames_synced(),
        };
        debug!("Replica synced: {}", outcome);
        Ok(outcome)
    }

    fn supports_sync(&self) -> bool {
        self.mode == ConnectionMode::Replica
    }

    async fn close(&self) -> Result<()> {
        // libsql releases the connection on drop
        debug!("Closing {}", self.target);
        Ok(())
    }
}

async fn build_database(config: &ConnectionConfig) -> std::result::Result<libsql::Database, libsql::Error> {
    let url = config.sync_url.clone().unwrap_or_default();
    let token = config.effective_auth_token();

    match config.effective_mode() {
        ConnectionMode::Replica => {
            let mut builder =
                libsql::Builder::new_remote_replica(config.effective_local_path(), url, token)
                    .read_your_writes(config.effective_read_your_writes());
            if let Some(interval) = config.sync_interval() {
                builder = builder.sync_interval(interval);
            }
            builder.build().await
        }
        ConnectionMode::Remote => libsql::Builder::new_remote(url, token).build().await,
        ConnectionMode::Local => {
            libsql::Builder::new_local(config.effective_local_path())
                .build()
                .await
        }
    }
}

async fn with_timeout<T, F>(secs: u64, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(Duration::from_secs(secs), fut)
        .await
        .map_err(|_| AhtiError::query(format!("Query timed out after {secs} seconds")))?
}

fn convert_value(value: libsql::Value) -> Value {
    match value {
        libsql::Value::Null => Value::Null,
        libsql::Value::Integer(i) => Value::Int(i),
        libsql::Value::Real(f) => Value::Float(f),
        libsql::Value::Text(s) => Value::String(s),
        libsql::Value::Blob(b) => Value::Bytes(b),
    }
}

/// Storage class of the first non-null value in the column.
fn infer_column_type(rows: &[Row], index: usize) -> &'static str {
    rows.iter()
        .filter_map(|row| row.get(index))
        .find(|value| !value.is_null())
        .map(Value::type_name)
        .unwrap_or("")
}

/// Determines if an error is transient and worth retrying.
fn is_transient_error(error: &libsql::Error) -> bool {
    is_transient_message(&error.to_string())
}

fn is_transient_message(message: &str) -> bool {
    let error_str = message.to_lowercase();

    if error_str.contains("unauthorized")
        || error_str.contains("401")
        || error_str.contains("403")
        || error_str.contains("invalid")
    {
        return false;
    }

    error_str.contains("connection refused")
        || error_str.contains("timed out")
        || error_str.contains("timeout")
        || error_str.contains("temporarily unavailable")
        || error_str.contains("connection reset")
        || error_str.contains("broken pipe")
        || error_str.contains("database is locked")
}

/// Translates a libsql error message into a user-facing hint.
fn describe_network_error(error_str: &str, target: &str) -> Option<String> {
    let lower = error_str.to_lowercase();

    if lower.contains("connection refused") || lower.contains("error trying to connect") {
        Some(format!(
            "Cannot reach {target}. Check that the server is running."
        ))
    } else if lower.contains("unauthorized")
        || lower.contains("401")
        || lower.contains("403")
        || lower.contains("authentication")
    {
        Some(format!(
            "Authentication failed for {target}. Check your auth token."
        ))
    } else if lower.contains("dns") || lower.contains("failed to lookup") {
        Some(format!("Cannot resolve host for {target}."))
    } else if lower.contains("timed out") || lower.contains("timeout") {
        Some(format!(
            "Connection to {target} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        None
    }
}

fn map_connection_error(error: libsql::Error, target: &str) -> AhtiError {
    let error_str = error.to_string();
    AhtiError::connection(describe_network_error(&error_str, target).unwrap_or(error_str))
}

fn map_sync_error(error: libsql::Error, target: &str) -> AhtiError {
    let error_str = error.to_string();
    match describe_network_error(&error_str, target) {
        Some(hint) => AhtiError::connection(hint),
        None => AhtiError::sync(error_str),
    }
}

fn map_query_error(error: libsql::Error) -> AhtiError {
    let error_str = error.to_string();
    match describe_network_error(&error_str, "the server") {
        Some(hint) => AhtiError::connection(hint),
        None => AhtiError::query(error_str),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_client() -> (tempfile::TempDir, LibsqlClient) {
        let dir = tempfile::tempdir().unwrap();
        let config = ConnectionConfig::local(dir.path().join("test.db"));
        let client = LibsqlClient::connect(&config).await.unwrap();
        (dir, client)
    }

    #[tokio::test]
    async fn test_local_execute_and_query() {
        let (_dir, client) = temp_client().await;
        client
            .execute("CREATE TABLE users (id INTEGER)")
            .await
            .unwrap();
        let affected = client
            .execute("INSERT INTO users(id) VALUES (1)")
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let result = client.query("SELECT * FROM users").await.unwrap();
        assert_eq!(result.columns, vec![ColumnInfo::new("id", "integer")]);
        assert_eq!(result.rows, vec![vec![Value::Int(1)]]);
        assert!(!result.was_truncated);
    }

    #[tokio::test]
    async fn test_transaction_rolls_back_on_error() {
        let (_dir, client) = temp_client().await;
        client.execute("CREATE TABLE t (id INTEGER)").await.unwrap();

        let statements = vec![
            "INSERT INTO t(id) VALUES (1)".to_string(),
            "INSERT INTO missing(id) VALUES (2)".to_string(),
        ];
        let err = client.execute_in_transaction(&statements).await.unwrap_err();
        assert!(matches!(err, AhtiError::Query(_)));

        let result = client.query("SELECT * FROM t").await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_transaction_commits() {
        let (_dir, client) = temp_client().await;
        client.execute("CREATE TABLE t (id INTEGER)").await.unwrap();

        let statements = vec![
            "INSERT INTO t(id) VALUES (1)".to_string(),
            "INSERT INTO t(id) VALUES (2)".to_string(),
        ];
        assert_eq!(client.execute_in_transaction(&statements).await.unwrap(), 2);

        let result = client.query("SELECT id FROM t ORDER BY id").await.unwrap();
        assert_eq!(result.rows, vec![vec![Value::Int(1)], vec![Value::Int(2)]]);
    }

    #[tokio::test]
    async fn test_query_value_types() {
        let (_dir, client) = temp_client().await;
        let result = client
            .query("SELECT 1 AS i, 2.5 AS f, 'x' AS s, x'0102' AS b, NULL AS n")
            .await
            .unwrap();

        assert_eq!(
            result.rows[0],
            vec![
                Value::Int(1),
                Value::Float(2.5),
                Value::from("x"),
                Value::Bytes(vec![1, 2]),
                Value::Null,
            ]
        );
        let types: Vec<&str> = result.columns.iter().map(|c| c.data_type.as_str()).collect();
        assert_eq!(types, vec!["integer", "real", "text", "blob", ""]);
    }

    #[tokio::test]
    async fn test_query_truncates_at_max_rows() {
        let (_dir, client) = temp_client().await;
        let sql = format!(
            "WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n WHERE x < {}) SELECT x FROM n",
            MAX_ROWS + 5
        );
        let result = client.query(&sql).await.unwrap();

        assert_eq!(result.row_count, MAX_ROWS);
        assert_eq!(result.total_rows, Some(MAX_ROWS + 5));
        assert!(result.was_truncated);
    }

    #[tokio::test]
    async fn test_query_error_is_query_variant() {
        let (_dir, client) = temp_client().await;
        let err = client.query("SELECT * FROM nonexistent_table_xyz").await.unwrap_err();
        assert!(matches!(err, AhtiError::Query(_)));
        assert!(err.to_string().contains("nonexistent_table_xyz"));
    }

    #[tokio::test]
    async fn test_sync_unsupported_for_local() {
        let (_dir, client) = temp_client().await;
        assert!(!client.supports_sync());

        let err = client.sync().await.unwrap_err();
        assert!(matches!(err, AhtiError::Sync(_)));
        assert!(err.to_string().contains("local mode"));
    }

    #[tokio::test]
    async fn test_connect_validates_config() {
        let config = ConnectionConfig {
            mode: Some(ConnectionMode::Remote),
            ..Default::default()
        };
        let err = LibsqlClient::connect(&config).await.unwrap_err();
        assert!(matches!(err, AhtiError::Config(_)));
    }

    #[test]
    fn test_describe_network_error() {
        let hint = describe_network_error("tcp connect error: Connection refused (os error 111)", "http://x");
        assert!(hint.unwrap().contains("Cannot reach http://x"));

        let hint = describe_network_error("Hrana: `api error: `status=401 Unauthorized``", "http://x");
        assert!(hint.unwrap().contains("Authentication failed"));

        assert!(describe_network_error("no such table: users", "http://x").is_none());
    }

    #[test]
    fn test_is_transient_error() {
        let cases = [
            ("tcp connect error: Connection refused (os error 111)", true),
            ("database is locked", true),
            ("operation timed out", true),
            ("connection reset by peer", true),
            ("Resource temporarily unavailable", true),
            ("connection failed: status=401 Unauthorized", false),
            ("connection rejected: 403 Forbidden", false),
            ("Invalid auth token, connection closed", false),
            ("no such table: users", false),
            ("near \"SELEC\": syntax error", false),
        ];

        for (message, expected) in cases {
            assert_eq!(is_transient_message(message), expected, "{message}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_bounds_stalled_calls() {
        let err = with_timeout(QUERY_TIMEOUT_SECS, std::future::pending::<Result<()>>())
            .await
            .unwrap_err();
        assert!(matches!(err, AhtiError::Query(_)));
        assert!(err.to_string().contains("timed out after 30 seconds"));
    }

    #[test]
    fn test_infer_column_type_skips_nulls() {
        let rows = vec![vec![Value::Null], vec![Value::from("a")]];
        assert_eq!(infer_column_type(&rows, 0), "text");
        assert_eq!(infer_column_type(&rows, 1), "");
    }
}
