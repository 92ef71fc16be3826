//! Log setup.
//!
//! Diagnostics never touch stdout, which carries only prompts and query
//! results. They go to stderr unless `--log-file` asks for a file.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use crate::error::{AhtiError, Result};

/// Where log lines are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

impl From<Option<PathBuf>> for LogTarget {
    fn from(path: Option<PathBuf>) -> Self {
        path.map_or(Self::Stderr, Self::File)
    }
}

/// `RUST_LOG` wins; otherwise `info`, or `debug` with `-v`.
fn env_filter(verbose: bool) -> EnvFilter {
    let fallback = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Installs the global subscriber.
///
/// A log file that cannot be opened is reported once on stderr and logging
/// continues there.
pub fn init(target: &LogTarget, verbose: bool) {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter(verbose));

    match target {
        LogTarget::Stderr => builder.with_writer(std::io::stderr).init(),
        LogTarget::File(path) => match open_log_file(path) {
            Ok(file) => builder.with_writer(file).with_ansi(false).init(),
            Err(e) => {
                eprintln!("Warning: {e}; logging to stderr");
                builder.with_writer(std::io::stderr).init();
            }
        },
    }
}

/// Creates the parent directory and truncates the file.
fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            AhtiError::config(format!(
                "Could not create log directory {}: {e}",
                parent.display()
            ))
        })?;
    }

    File::create(path).map_err(|e| {
        AhtiError::config(format!("Could not create log file {}: {e}", path.display()))
    })
}

/// `ahti-connect.log` under the state directory, then the config directory,
/// then the temp directory.
pub fn default_log_path() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::config_dir)
        .map(|dir| dir.join("ahti-connect"))
        .unwrap_or_else(std::env::temp_dir)
        .join("ahti-connect.log")
}
