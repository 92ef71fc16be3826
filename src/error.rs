//! Error types for ahti-connect.
//!
//! Defines the main error enum used throughout the application.

use thiserror::Error;

/// Main error type for ahti-connect operations.
#[derive(Error, Debug)]
pub enum AhtiError {
    /// Database connection errors (server unreachable, bad token, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Statement execution errors (syntax errors, missing tables, etc.)
    #[error("Query error: {0}")]
    Query(String),

    /// Replica synchronization errors.
    #[error("Sync error: {0}")]
    Sync(String),

    /// Key and token errors (malformed keys, bad signatures, expired tokens).
    #[error("Auth error: {0}")]
    Auth(String),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Interactive input errors (closed stdin, unreadable answer).
    #[error("Input error: {0}")]
    Input(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AhtiError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates a sync error with the given message.
    pub fn sync(msg: impl Into<String>) -> Self {
        Self::Sync(msg.into())
    }

    /// Creates an auth error with the given message.
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an input error with the given message.
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Query(_) => "Query Error",
            Self::Sync(_) => "Sync Error",
            Self::Auth(_) => "Auth Error",
            Self::Config(_) => "Configuration Error",
            Self::Input(_) => "Input Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Prefixes the message with context, keeping the variant.
    pub fn context(self, ctx: &str) -> Self {
        match self {
            Self::Connection(m) => Self::Connection(format!("{ctx}: {m}")),
            Self::Query(m) => Self::Query(format!("{ctx}: {m}")),
            Self::Sync(m) => Self::Sync(format!("{ctx}: {m}")),
            Self::Auth(m) => Self::Auth(format!("{ctx}: {m}")),
            Self::Config(m) => Self::Config(format!("{ctx}: {m}")),
            Self::Input(m) => Self::Input(format!("{ctx}: {m}")),
            Self::Internal(m) => Self::Internal(format!("{ctx}: {m}")),
        }
    }
}

/// Result type alias using AhtiError.
pub type Result<T> = std::result::Result<T, AhtiError>;
