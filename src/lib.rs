//! ahti-connect - connection tester for libSQL databases.
//!
//! This library exposes the core modules for use in integration tests.

pub mod auth;
pub mod cli;
pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod logging;
pub mod output;
pub mod probe;
pub mod prompt;
