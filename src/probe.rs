//! Connection probe.
//!
//! Exercises a connection end to end: sync the replica, create the probe
//! table, insert and commit a row, sync again, then read the table back.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ProbeConfig;
use crate::db::{DatabaseClient, QueryResult};
use crate::error::Result;

/// One stage of the probe, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStep {
    InitialSync,
    CreateTable,
    Insert,
    PostCommitSync,
    Select,
}

impl ProbeStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InitialSync => "initial sync",
            Self::CreateTable => "create table",
            Self::Insert => "insert",
            Self::PostCommitSync => "post-commit sync",
            Self::Select => "select",
        }
    }
}

impl fmt::Display for ProbeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timing and outcome of a completed step.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: ProbeStep,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    pub detail: String,
}

/// Everything a successful probe observed.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    /// Display string of the probed connection (never contains the token).
    pub connection: String,
    pub steps: Vec<StepReport>,
    /// Rows read back by the final select.
    pub result: QueryResult,
}

impl ProbeReport {
    pub fn total_elapsed(&self) -> Duration {
        self.steps.iter().map(|s| s.elapsed).sum()
    }
}

/// Runs the create/insert/commit/select sequence against a client.
pub struct Probe<'a> {
    db: &'a dyn DatabaseClient,
    config: &'a ProbeConfig,
    sync: bool,
}

impl<'a> Probe<'a> {
    pub fn new(db: &'a dyn DatabaseClient, config: &'a ProbeConfig) -> Self {
        Self {
            db,
            config,
            sync: true,
        }
    }

    /// Disables the replica syncs around the write.
    pub fn without_sync(mut self) -> Self {
        self.sync = false;
        self
    }

    pub fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (id INTEGER);",
            self.config.table
        )
    }

    pub fn insert_sql(&self) -> String {
        format!(
            "INSERT INTO {}(id) VALUES ({});",
            self.config.table, self.config.value
        )
    }

    pub fn select_sql(&self) -> String {
        format!("select * from {}", self.config.table)
    }

    /// Runs the probe. Stops at the first failing step.
    pub async fn run(&self, connection: impl Into<String>) -> Result<ProbeReport> {
        self.config.validate()?;

        let mut steps = Vec::new();
        let syncing = self.sync && self.db.supports_sync();
        if !syncing {
            debug!("Replica sync skipped");
        }

        if syncing {
            self.step(&mut steps, ProbeStep::InitialSync, async {
                Ok(self.db.sync().await?.to_string())
            })
            .await?;
        }

        self.step(&mut steps, ProbeStep::CreateTable, async {
            self.db.execute(&self.create_table_sql()).await?;
            Ok(format!("table {} ready", self.config.table))
        })
        .await?;

        self.step(&mut steps, ProbeStep::Insert, async {
            let affected = self
                .db
                .execute_in_transaction(&[self.insert_sql()])
                .await?;
            Ok(format!("{affected} row(s) inserted and committed"))
        })
        .await?;

        if syncing {
            self.step(&mut steps, ProbeStep::PostCommitSync, async {
                Ok(self.db.sync().await?.to_string())
            })
            .await?;
        }

        let mut result = None;
        self.step(&mut steps, ProbeStep::Select, async {
            let query_result = self.db.query(&self.select_sql()).await?;
            let detail = format!("{} row(s) returned", query_result.row_count);
            result = Some(query_result);
            Ok(detail)
        })
        .await?;

        let report = ProbeReport {
            connection: connection.into(),
            steps,
            result: result.unwrap_or_default(),
        };
        info!(
            "Probe finished in {:?} ({} steps)",
            report.total_elapsed(),
            report.steps.len()
        );
        Ok(report)
    }

    async fn step<F>(&self, steps: &mut Vec<StepReport>, step: ProbeStep, fut: F) -> Result<()>
    where
        F: std::future::Future<Output = Result<String>>,
    {
        let start = Instant::now();
        match fut.await {
            Ok(detail) => {
                let elapsed = start.elapsed();
                debug!("{}: {} ({:?})", step, detail, elapsed);
                steps.push(StepReport {
                    step,
                    elapsed,
                    detail,
                });
                Ok(())
            }
            Err(e) => {
                let completed: Vec<&str> = steps.iter().map(|s| s.step.as_str()).collect();
                warn!(
                    "Probe failed at {} after completing [{}]",
                    step,
                    completed.join(", ")
                );
                Err(e.context(step.as_str()))
            }
        }
    }
}

fn serialize_millis<S>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
}
