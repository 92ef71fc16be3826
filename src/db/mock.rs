//! Mock database clients for testing.
//!
//! `MockDatabaseClient` understands just enough SQL to run the probe:
//! `CREATE TABLE`, single-row `INSERT ... VALUES (..)` and `SELECT * FROM`.

use super::{ColumnInfo, DatabaseClient, QueryResult, Row, SyncOutcome, Value};
use crate::error::{AhtiError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone, Default)]
struct MockState {
    tables: HashMap<String, Vec<Row>>,
    executed: Vec<String>,
    syncs: usize,
}

/// An in-memory database double.
#[derive(Debug, Default)]
pub struct MockDatabaseClient {
    state: Mutex<MockState>,
    supports_sync: bool,
    fail_on: Option<String>,
}

impl MockDatabaseClient {
    /// Creates a mock that behaves like a replica.
    pub fn new() -> Self {
        Self {
            supports_sync: true,
            ..Default::default()
        }
    }

    /// Creates a mock that behaves like a local or remote connection.
    pub fn without_sync() -> Self {
        Self::default()
    }

    /// Makes every statement containing `fragment` fail with a query error.
    pub fn fail_on(mut self, fragment: impl Into<String>) -> Self {
        self.fail_on = Some(fragment.into().to_lowercase());
        self
    }

    /// Statements executed so far, in order, including failed ones.
    pub fn executed(&self) -> Vec<String> {
        self.lock().map(|s| s.executed.clone()).unwrap_or_default()
    }

    /// Number of completed syncs.
    pub fn sync_count(&self) -> usize {
        self.lock().map(|s| s.syncs).unwrap_or_default()
    }

    /// Committed rows of a table.
    pub fn rows(&self, table: &str) -> Option<Vec<Row>> {
        self.lock()
            .ok()
            .and_then(|s| s.tables.get(&table.to_lowercase()).cloned())
    }

    fn lock(&self) -> Result<MutexGuard<'_, MockState>> {
        self.state
            .lock()
            .map_err(|_| AhtiError::internal("mock state lock poisoned"))
    }

    fn check_failure(&self, sql: &str) -> Result<()> {
        match &self.fail_on {
            Some(fragment) if sql.to_lowercase().contains(fragment.as_str()) => Err(
                AhtiError::query(format!("injected failure for statement: {sql}")),
            ),
            _ => Ok(()),
        }
    }

    fn apply(&self, state: &mut MockState, sql: &str) -> Result<u64> {
        state.executed.push(sql.to_string());
        self.check_failure(sql)?;

        match parse_statement(sql) {
            Statement::CreateTable(table) => {
                state.tables.entry(table).or_default();
                Ok(0)
            }
            Statement::Insert(table, value) => {
                let rows = state
                    .tables
                    .get_mut(&table)
                    .ok_or_else(|| AhtiError::query(format!("no such table: {table}")))?;
                rows.push(vec![value]);
                Ok(1)
            }
            Statement::Select(_) | Statement::Other => Ok(0),
        }
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn execute(&self, sql: &str) -> Result<u64> {
        let mut state = self.lock()?;
        self.apply(&mut state, sql)
    }

    async fn execute_in_transaction(&self, statements: &[String]) -> Result<u64> {
        let mut state = self.lock()?;
        let mut staged = state.clone();

        let mut affected = 0;
        for sql in statements {
            match self.apply(&mut staged, sql) {
                Ok(n) => affected += n,
                Err(e) => {
                    // Keep the statement log, drop the staged data
                    state.executed = staged.executed;
                    return Err(e);
                }
            }
        }

        *state = staged;
        Ok(affected)
    }

    async fn query(&self, sql: &str) -> Result<QueryResult> {
        let mut state = self.lock()?;
        state.executed.push(sql.to_string());
        self.check_failure(sql)?;

        match parse_statement(sql) {
            Statement::Select(table) => {
                let rows = state
                    .tables
                    .get(&table)
                    .cloned()
                    .ok_or_else(|| AhtiError::query(format!("no such table: {table}")))?;
                Ok(
                    QueryResult::with_data(vec![ColumnInfo::new("id", "integer")], rows)
                        .with_execution_time(Duration::from_millis(1)),
                )
            }
            _ => Ok(QueryResult::new().with_execution_time(Duration::from_millis(1))),
        }
    }

    async fn sync(&self) -> Result<SyncOutcome> {
        if !self.supports_sync {
            return Err(AhtiError::sync("Sync is not supported by this mock"));
        }
        let mut state = self.lock()?;
        state.syncs += 1;
        Ok(SyncOutcome {
            frame_no: Some(state.syncs as u64),
            frames_synced: 1,
        })
    }

    fn supports_sync(&self) -> bool {
        self.supports_sync
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// A client whose every operation fails with a connection error.
#[derive(Debug, Clone)]
pub struct FailingDatabaseClient {
    message: String,
}

impl FailingDatabaseClient {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    fn error(&self) -> AhtiError {
        AhtiError::connection(self.message.clone())
    }
}

#[async_trait]
impl DatabaseClient for FailingDatabaseClient {
    async fn execute(&self, _sql: &str) -> Result<u64> {
        Err(self.error())
    }

    async fn execute_in_transaction(&self, _statements: &[String]) -> Result<u64> {
        Err(self.error())
    }

    async fn query(&self, _sql: &str) -> Result<QueryResult> {
        Err(self.error())
    }

    async fn sync(&self) -> Result<SyncOutcome> {
        Err(self.error())
    }

    fn supports_sync(&self) -> bool {
        true
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, PartialEq)]
enum Statement {
    CreateTable(String),
    Insert(String, Value),
    Select(String),
    Other,
}

fn parse_statement(sql: &str) -> Statement {
    let normalized = sql.trim().trim_end_matches(';').trim().to_lowercase();

    if let Some(rest) = normalized.strip_prefix("create table") {
        let rest = rest.trim_start();
        let rest = rest.strip_prefix("if not exists").unwrap_or(rest);
        return Statement::CreateTable(leading_identifier(rest));
    }

    if let Some(rest) = normalized.strip_prefix("insert into") {
        let table = leading_identifier(rest);
        let value = rest
            .split_once("values")
            .map(|(_, values)| values.trim().trim_start_matches('(').trim_end_matches(')'))
            .map(parse_literal)
            .unwrap_or_default();
        return Statement::Insert(table, value);
    }

    if let Some(rest) = normalized.strip_prefix("select * from") {
        return Statement::Select(leading_identifier(rest));
    }

    Statement::Other
}

fn leading_identifier(s: &str) -> String {
    s.trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

fn parse_literal(s: &str) -> Value {
    let s = s.trim();
    if s.eq_ignore_ascii_case("null") {
        Value::Null
    } else if let Ok(i) = s.parse::<i64>() {
        Value::Int(i)
    } else if let Ok(f) = s.parse::<f64>() {
        Value::Float(f)
    } else {
        Value::String(s.trim_matches('\'').to_string())
    }
}
