//! Database abstraction layer for ahti-connect.
//!
//! Provides a trait-based interface for database operations, so the probe
//! can run against libsql or an in-memory double.

mod libsql_client;
mod mock;
mod types;

pub use libsql_client::LibsqlClient;
pub use mock::{FailingDatabaseClient, MockDatabaseClient};
pub use types::{ColumnInfo, QueryResult, Row, SyncOutcome, Value};

use crate::config::ConnectionConfig;
use crate::error::Result;
use async_trait::async_trait;

/// Maximum rows to return from a query.
pub const MAX_ROWS: usize = 1000;

/// Creates a database client for the given configuration.
///
/// This is the central factory function for database connections.
pub async fn connect(config: &ConnectionConfig) -> Result<Box<dyn DatabaseClient>> {
    let client = LibsqlClient::connect(config).await?;
    Ok(Box::new(client))
}

/// Trait defining the interface for database clients.
///
/// All database operations are async and return Results with AhtiError.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Executes a single statement, returning the number of affected rows.
    async fn execute(&self, sql: &str) -> Result<u64>;

    /// Executes the statements in one transaction and commits.
    ///
    /// On failure the transaction is rolled back and the error returned.
    async fn execute_in_transaction(&self, statements: &[String]) -> Result<u64>;

    /// Executes a SQL query and returns the results.
    async fn query(&self, sql: &str) -> Result<QueryResult>;

    /// Pulls remote changes into the local replica.
    async fn sync(&self) -> Result<SyncOutcome>;

    /// Whether [`sync`](Self::sync) is meaningful for this connection.
    fn supports_sync(&self) -> bool;

    /// Closes the database connection.
    async fn close(&self) -> Result<()>;
}
