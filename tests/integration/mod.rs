//! Integration tests for ahti-connect.
//!
//! Replica tests are skipped unless LIBSQL_TEST_URL is set.

pub mod auth_test;
pub mod config_test;
pub mod probe_test;
pub mod replica_test;
