//! Connection resolution.
//!
//! Combines CLI flags, the config file and the environment into one
//! `ConnectionConfig`, then fills what is still missing from a private key
//! or interactive prompts.

use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::{debug, info};

use crate::auth::{mint_token, TokenClaims};
use crate::cli::Cli;
use crate::config::{Config, ConnectionConfig, DEFAULT_SYNC_URL};
use crate::error::{AhtiError, Result};
use crate::prompt::Prompter;

/// Lifetime of tokens minted for a single session.
const SESSION_TOKEN_TTL_SECS: i64 = 3600;

/// Resolves, completes and validates the connection for this run.
///
/// The prompter is only used when `--no-prompt` is not set.
pub async fn prepare_connection<R, W>(
    cli: &Cli,
    config: &Config,
    prompter: Option<&mut Prompter<R, W>>,
) -> Result<ConnectionConfig>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    prepare_connection_with_env(cli, config, prompter, |key| std::env::var(key).ok()).await
}

/// Same as [`prepare_connection`] with an explicit environment lookup.
pub async fn prepare_connection_with_env<R, W, F>(
    cli: &Cli,
    config: &Config,
    prompter: Option<&mut Prompter<R, W>>,
    env: F,
) -> Result<ConnectionConfig>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    F: Fn(&str) -> Option<String>,
{
    let mut connection = resolve_connection_with_env(
        &cli.to_connection_config(),
        cli.connection_name(),
        config,
        env,
    )?;

    apply_private_key(&mut connection, cli.connection.private_key.as_deref())?;

    let prompter = if cli.no_prompt { None } else { prompter };
    complete_connection(&mut connection, prompter).await?;

    connection.validate()?;
    Ok(connection)
}

/// Resolves the connection configuration with precedence:
/// 1. CLI arguments (highest)
/// 2. Named connection from config
/// 3. Default connection from config
/// 4. Environment variables
pub fn resolve_connection(
    cli: &ConnectionConfig,
    name: Option<&str>,
    config: &Config,
) -> Result<ConnectionConfig> {
    resolve_connection_with_env(cli, name, config, |key| std::env::var(key).ok())
}

/// Same as [`resolve_connection`] with an explicit environment lookup.
pub fn resolve_connection_with_env<F>(
    cli: &ConnectionConfig,
    name: Option<&str>,
    config: &Config,
    env: F,
) -> Result<ConnectionConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut connection = match name {
        Some(name) => config.get_connection(Some(name)).cloned().ok_or_else(|| {
            AhtiError::config(format!("Connection '{name}' not found in config file"))
        })?,
        None => config.get_connection(None).cloned().unwrap_or_default(),
    };

    connection.merge(cli);
    connection.apply_env_defaults_from(env);

    Ok(connection)
}

/// Mints a session token from `private_key` when no token is configured.
pub fn apply_private_key(connection: &mut ConnectionConfig, private_key: Option<&str>) -> Result<()> {
    let Some(key) = private_key.filter(|k| !k.trim().is_empty()) else {
        return Ok(());
    };

    if connection.auth_token.is_some() {
        debug!("Auth token already set, ignoring private key");
        return Ok(());
    }

    let token = mint_token(key, &TokenClaims::expiring_in(SESSION_TOKEN_TTL_SECS)?)?;
    info!("Minted a session token valid for {}s", SESSION_TOKEN_TTL_SECS);
    connection.auth_token = Some(token);
    Ok(())
}

/// Fills a missing URL and token, prompting when a prompter is given.
///
/// Without a prompter a missing URL is an error and a missing token means
/// no auth.
pub async fn complete_connection<R, W>(
    connection: &mut ConnectionConfig,
    prompter: Option<&mut Prompter<R, W>>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    if !connection.effective_mode().needs_url() {
        return Ok(());
    }

    match prompter {
        Some(prompter) => {
            if connection.sync_url.is_none() {
                connection.sync_url = Some(prompter.sync_url(DEFAULT_SYNC_URL).await?);
            }
            if connection.auth_token.is_none() {
                connection.auth_token = Some(prompter.auth_token().await?);
            }
        }
        None => {
            if connection.sync_url.is_none() {
                return Err(AhtiError::config(
                    "No sync URL configured. Pass --url, set LIBSQL_URL, or allow prompting",
                ));
            }
        }
    }

    Ok(())
}
