//! CLI entry point for the url-relay tool.

use std::io::{self, IsTerminal, Read, Write};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use relay_core::relay::{
    DEFAULT_CHUNK_RETRY_LIMIT, SINK_CONNECT_TIMEOUT_SECS, SINK_REQUEST_TIMEOUT_SECS,
    SOURCE_CONNECT_TIMEOUT_SECS, SOURCE_READ_TIMEOUT_SECS, SinkEndpoints,
};
use relay_core::{
    BatchDriver, DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS, Database, FileStore, HttpSource,
    RelayConfig, RelayCoordinator, RetryPolicy, SinkClient, SinkCredentials,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod app_config;
mod cli;

use app_config::FileConfig;
use cli::{Cli, Command, UploadArgs};

/// Environment variable holding the sink access token.
const ACCESS_TOKEN_ENV: &str = "URL_RELAY_ACCESS_TOKEN";

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();
    let file_config = app_config::load_file_config(cli.config.as_deref())?.unwrap_or_default();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > config file > info
    let default_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => file_config
                .verbosity
                .map_or("info", app_config::VerbositySetting::filter_directive),
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?cli, "CLI arguments parsed");

    let db_path = cli
        .database
        .clone()
        .or_else(|| file_config.database_path.clone())
        .unwrap_or_else(app_config::resolve_default_database_path);
    let db = Database::new(&db_path)
        .await
        .with_context(|| format!("Failed to open database '{}'", db_path.display()))?;
    let store = Arc::new(FileStore::new(db));

    match cli.command {
        Command::List => {
            let records = store.find_all().await.context("Failed to list records")?;
            let mut stdout = io::stdout().lock();
            for record in &records {
                writeln!(stdout, "{}", serde_json::to_string(record)?)?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Delete { url } => {
            let driver = build_driver(&file_config, &UploadArgs::default(), store)?;
            let record = driver
                .delete_by_source_url(&url)
                .await
                .with_context(|| format!("Failed to delete '{url}'"))?;
            writeln!(io::stdout(), "{}", serde_json::to_string(&record)?)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Upload(args) => run_upload(&file_config, &args, store).await,
    }
}

async fn run_upload(
    file_config: &FileConfig,
    args: &UploadArgs,
    store: Arc<FileStore>,
) -> Result<ExitCode> {
    let urls = if args.urls.is_empty() {
        read_urls_from_stdin()?
    } else {
        args.urls.iter().map(|url| url.trim().to_string()).collect()
    };
    if urls.is_empty() {
        info!("No input provided. Pipe URLs via stdin or pass as arguments.");
        info!("Example: echo 'https://example.com/file.pdf' | url-relay upload");
        return Ok(ExitCode::SUCCESS);
    }

    let driver = build_driver(file_config, args, store)?;
    let cancel = driver.cancellation_token();
    tokio::spawn(cancel_on_ctrl_c(cancel));

    let report = driver.upload_all(&urls).await?;
    let mut stdout = io::stdout().lock();
    for entry in &report.entries {
        writeln!(stdout, "{}", serde_json::to_string(entry)?)?;
    }

    info!(
        completed = report.stats.completed(),
        failed = report.stats.failed(),
        restarted = report.stats.restarted(),
        total = report.stats.total(),
        "Relay complete"
    );

    if report.stats.failed() > 0 {
        Ok(ExitCode::from(2))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("interrupt received, cancelling in-flight transfers");
        cancel.cancel();
    }
}

/// One URL per line; blank lines and `#` comments are skipped.
fn read_urls_from_stdin() -> Result<Vec<String>> {
    if io::stdin().is_terminal() {
        return Ok(Vec::new());
    }
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    Ok(parse_url_lines(&buffer))
}

fn parse_url_lines(input: &str) -> Vec<String> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn build_driver(
    file_config: &FileConfig,
    args: &UploadArgs,
    store: Arc<FileStore>,
) -> Result<BatchDriver> {
    let token = resolve_access_token(file_config)?;
    let defaults = SinkEndpoints::default();
    let endpoints = SinkEndpoints::new(
        file_config
            .upload_url
            .clone()
            .unwrap_or(defaults.upload_url),
        file_config
            .api_base_url
            .clone()
            .unwrap_or(defaults.api_base_url),
    );

    let sink = Arc::new(SinkClient::new_with_timeouts(
        endpoints,
        SinkCredentials::new(token),
        file_config
            .sink_connect_timeout_secs
            .unwrap_or(SINK_CONNECT_TIMEOUT_SECS),
        file_config
            .sink_read_timeout_secs
            .unwrap_or(SINK_REQUEST_TIMEOUT_SECS),
    ));
    let source = Arc::new(HttpSource::new_with_timeouts(
        file_config
            .source_connect_timeout_secs
            .unwrap_or(SOURCE_CONNECT_TIMEOUT_SECS),
        file_config
            .source_read_timeout_secs
            .unwrap_or(SOURCE_READ_TIMEOUT_SECS),
    ));

    let config = relay_config(file_config, args);
    debug!(?config, "relay configuration resolved");
    let coordinator = Arc::new(RelayCoordinator::new(source, sink.clone(), config));

    let concurrency = args
        .concurrency
        .or(file_config.concurrency)
        .map_or(DEFAULT_CONCURRENCY, usize::from);
    Ok(BatchDriver::new(coordinator, sink, store, concurrency)?)
}

/// CLI flag, then config file, then built-in default.
fn relay_config(file_config: &FileConfig, args: &UploadArgs) -> RelayConfig {
    let max_attempts = args
        .max_attempts
        .or(file_config.max_attempts)
        .map_or(DEFAULT_MAX_ATTEMPTS, u32::from);
    let chunk_retry_limit = file_config
        .chunk_retry_limit
        .unwrap_or(DEFAULT_CHUNK_RETRY_LIMIT);
    let publish = !args.no_share && file_config.share_publicly.unwrap_or(true);

    let mut config = RelayConfig::default()
        .with_transfer_retry(RetryPolicy::with_max_attempts(max_attempts))
        .with_chunk_retry(RetryPolicy::with_max_attempts(chunk_retry_limit))
        .with_publish(publish);
    if let Some(kib) = args.chunk_size_kib.or(file_config.chunk_size_kib) {
        config = config.with_chunk_size(kib as usize * 1024);
    }
    config
}

/// Token from the environment, else from `access_token_file`.
fn resolve_access_token(file_config: &FileConfig) -> Result<String> {
    if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV)
        && !token.trim().is_empty()
    {
        return Ok(token.trim().to_string());
    }
    if let Some(path) = &file_config.access_token_file {
        return read_token_file(path);
    }
    bail!("No sink access token: set {ACCESS_TOKEN_ENV} or `access_token_file` in the config file")
}

fn read_token_file(path: &Path) -> Result<String> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read access token file '{}'", path.display()))?;
    let token = raw.trim();
    if token.is_empty() {
        bail!("Access token file '{}' is empty", path.display());
    }
    Ok(token.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_url_lines_skips_blank_and_comments() {
        let urls = parse_url_lines("https://a.test/1\n\n  # note\n  https://b.test/2  \n");
        assert_eq!(urls, vec!["https://a.test/1", "https://b.test/2"]);
    }

    #[test]
    fn test_relay_config_cli_overrides_file() {
        let file = FileConfig {
            max_attempts: Some(7),
            chunk_size_kib: Some(512),
            share_publicly: Some(true),
            ..FileConfig::default()
        };
        let args = UploadArgs {
            max_attempts: Some(2),
            chunk_size_kib: Some(1024),
            no_share: true,
            ..UploadArgs::default()
        };
        let config = relay_config(&file, &args);
        assert_eq!(config.transfer_retry.max_attempts(), 2);
        assert_eq!(config.chunk_size, 1024 * 1024);
        assert!(!config.publish);
    }

    #[test]
    fn test_relay_config_falls_back_to_file_then_defaults() {
        let file = FileConfig {
            max_attempts: Some(7),
            share_publicly: Some(false),
            chunk_retry_limit: Some(4),
            ..FileConfig::default()
        };
        let config = relay_config(&file, &UploadArgs::default());
        assert_eq!(config.transfer_retry.max_attempts(), 7);
        assert_eq!(config.chunk_retry.max_attempts(), 4);
        assert_eq!(config.chunk_size, relay_core::DEFAULT_CHUNK_SIZE);
        assert!(!config.publish);

        let config = relay_config(&FileConfig::default(), &UploadArgs::default());
        assert_eq!(config.transfer_retry.max_attempts(), DEFAULT_MAX_ATTEMPTS);
        assert!(config.publish);
    }

    #[test]
    fn test_read_token_file_trims_and_rejects_empty() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("token");
        std::fs::write(&path, "  secret-token\n").unwrap();
        assert_eq!(read_token_file(&path).unwrap(), "secret-token");

        std::fs::write(&path, "\n").unwrap();
        assert!(read_token_file(&path).is_err());
    }
}
