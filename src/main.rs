//! ahti-connect - connection tester for libSQL databases.

use ahti_connect::auth::{mint_token, Access, KeyPair, TokenClaims};
use ahti_connect::cli::{Cli, Command};
use ahti_connect::config::{Config, ConnectionConfig};
use ahti_connect::connection::prepare_connection;
use ahti_connect::db::{self, DatabaseClient};
use ahti_connect::error::{AhtiError, Result};
use ahti_connect::logging::{self, LogTarget};
use ahti_connect::output::{render_query, render_report};
use ahti_connect::probe::Probe;
use ahti_connect::prompt::Prompter;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();

    let log_target = LogTarget::from(cli.log_path());
    logging::init(&log_target, cli.verbose);

    if let Err(e) = run(&cli).await {
        error!("{}: {}", e.category(), e);
        if log_target != LogTarget::Stderr {
            eprintln!("{}: {}", e.category(), e);
        }
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<()> {
    match cli.command() {
        Command::Keygen => {
            let pair = KeyPair::generate();
            println!("PUBLIC_KEY={}", pair.public_key_b64());
            println!("PRIVATE_KEY={}", pair.private_key_b64());
            Ok(())
        }
        Command::Token {
            expires_in,
            read_only,
        } => {
            let key = cli.connection.private_key.as_deref().ok_or_else(|| {
                AhtiError::config("A private key is required (--private-key or AHTI_PRIVATE_KEY)")
            })?;

            let mut claims = match expires_in {
                Some(secs) => TokenClaims::expiring_in(secs)?,
                None => TokenClaims::default(),
            };
            if read_only {
                claims = claims.with_access(Access::ReadOnly);
            }

            println!("{}", mint_token(key, &claims)?);
            Ok(())
        }
        Command::Probe => run_probe(cli).await,
        Command::Query { sql } => run_query(cli, &sql).await,
    }
}

async fn run_probe(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let probe_config = config
        .probe
        .with_overrides(cli.probe.table.as_deref(), cli.probe.value)?;

    let connection = connection_for_run(cli, &config).await?;
    info!("Connection: {}", connection.display_string());

    let client = db::connect(&connection).await?;
    let mut probe = Probe::new(client.as_ref(), &probe_config);
    if cli.probe.no_sync {
        probe = probe.without_sync();
    }

    let report = probe.run(connection.display_string()).await;
    client.close().await?;
    let report = report?;

    println!("{}", render_report(&report, cli.format)?);
    Ok(())
}

async fn run_query(cli: &Cli, sql: &str) -> Result<()> {
    let config = load_config(cli)?;
    let connection = connection_for_run(cli, &config).await?;
    info!("Connection: {}", connection.display_string());

    let client = db::connect(&connection).await?;
    let result = client.query(sql).await;
    client.close().await?;
    let result = result?;

    println!("{}", render_query(&result, cli.format)?);
    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    Config::load_from_file(&config_path)
}

async fn connection_for_run(cli: &Cli, config: &Config) -> Result<ConnectionConfig> {
    let mut prompter = Prompter::stdio();
    prepare_connection(cli, config, Some(&mut prompter)).await
}
