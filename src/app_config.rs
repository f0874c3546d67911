//! File configuration for CLI defaults.
//!
//! The file is a flat `key = value` list (a TOML subset): strings are
//! double-quoted, `#` starts a comment outside strings, unknown keys are errors.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

/// Values read from the config file. `None` means "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Metadata database location.
    pub database_path: Option<PathBuf>,
    /// URLs relayed at once (1..=100).
    pub concurrency: Option<u8>,
    /// Transfer attempts per URL (1..=10).
    pub max_attempts: Option<u8>,
    /// Chunk size in KiB (multiple of 256, 256..=65536).
    pub chunk_size_kib: Option<u32>,
    /// Publish uploaded artifacts to anyone with the link.
    pub share_publicly: Option<bool>,
    /// Default log level.
    pub verbosity: Option<VerbositySetting>,
    /// Resumable upload initiation URL.
    pub upload_url: Option<String>,
    /// Base URL for artifact calls.
    pub api_base_url: Option<String>,
    /// File holding the sink access token.
    pub access_token_file: Option<PathBuf>,
    /// Source connect timeout.
    pub source_connect_timeout_secs: Option<u64>,
    /// Source idle read timeout.
    pub source_read_timeout_secs: Option<u64>,
    /// Sink connect timeout.
    pub sink_connect_timeout_secs: Option<u64>,
    /// Sink per-request timeout.
    pub sink_read_timeout_secs: Option<u64>,
    /// In-place retries per chunk push (1..=100).
    pub chunk_retry_limit: Option<u32>,
}

impl FileConfig {
    /// Checks every set value against the ranges the CLI enforces.
    pub fn validate(&self) -> Result<()> {
        check_range("concurrency", self.concurrency.map(u64::from), 1, 100)?;
        check_range("max_attempts", self.max_attempts.map(u64::from), 1, 10)?;
        check_range("chunk_retry_limit", self.chunk_retry_limit.map(u64::from), 1, 100)?;
        if let Some(kib) = self.chunk_size_kib {
            validate_chunk_size_kib(kib).context("Invalid config value for `chunk_size_kib`")?;
        }
        for (field, value) in [
            ("source_connect_timeout_secs", self.source_connect_timeout_secs),
            ("source_read_timeout_secs", self.source_read_timeout_secs),
            ("sink_connect_timeout_secs", self.sink_connect_timeout_secs),
            ("sink_read_timeout_secs", self.sink_read_timeout_secs),
        ] {
            check_range(field, value, 1, 3600)?;
        }
        for (field, value) in [
            ("upload_url", self.upload_url.as_deref()),
            ("api_base_url", self.api_base_url.as_deref()),
        ] {
            if let Some(value) = value
                && url::Url::parse(value).is_err()
            {
                bail!("Invalid config value for `{field}`: '{value}' is not a URL");
            }
        }
        Ok(())
    }
}

fn check_range(field: &str, value: Option<u64>, min: u64, max: u64) -> Result<()> {
    if let Some(value) = value
        && !(min..=max).contains(&value)
    {
        bail!("Invalid config value for `{field}`: {value}. Expected range: {min}..={max}");
    }
    Ok(())
}

/// Chunk sizes must be whole multiples of the sink's 256 KiB granularity.
pub fn validate_chunk_size_kib(kib: u32) -> Result<()> {
    if !(256..=65_536).contains(&kib) || kib % 256 != 0 {
        bail!("{kib} KiB is not a multiple of 256 between 256 and 65536");
    }
    Ok(())
}

/// Log level labels accepted in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl VerbositySetting {
    /// `tracing` filter directive for this setting.
    #[must_use]
    pub fn filter_directive(self) -> &'static str {
        match self {
            Self::Default => "info",
            Self::Verbose => "debug",
            Self::Quiet => "error",
            Self::Debug => "trace",
        }
    }
}

/// Default config path: `$XDG_CONFIG_HOME/url-relay/config.toml`, then
/// `$HOME/.config/url-relay/config.toml`.
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg).join("url-relay").join("config.toml"));
    }
    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("url-relay")
            .join("config.toml"),
    )
}

/// Default database path: `$XDG_DATA_HOME/url-relay/relay.db`, then
/// `$HOME/.local/share/url-relay/relay.db`, then `./url-relay.db`.
#[must_use]
pub fn resolve_default_database_path() -> PathBuf {
    if let Some(xdg) = env_var_non_empty_os("XDG_DATA_HOME") {
        return PathBuf::from(xdg).join("url-relay").join("relay.db");
    }
    env_var_non_empty_os("HOME").map_or_else(
        || PathBuf::from("url-relay.db"),
        |home| {
            PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("url-relay")
                .join("relay.db")
        },
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    env::var_os(name).filter(|value| !value.is_empty())
}

/// Loads `explicit` if given (it must exist), otherwise the default path if present.
pub fn load_file_config(explicit: Option<&Path>) -> Result<Option<FileConfig>> {
    if let Some(path) = explicit {
        return read_file_config(path).map(Some);
    }
    match resolve_default_config_path() {
        Some(path) if path.exists() => read_file_config(&path).map(Some),
        _ => Ok(None),
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_no = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };
        let key = raw_key.trim();
        let value = raw_value.trim();
        let invalid = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "database_path" => {
                cfg.database_path = Some(PathBuf::from(
                    parse_string_literal(value).with_context(invalid)?,
                ));
            }
            "access_token_file" => {
                cfg.access_token_file = Some(PathBuf::from(
                    parse_string_literal(value).with_context(invalid)?,
                ));
            }
            "upload_url" => cfg.upload_url = Some(parse_string_literal(value).with_context(invalid)?),
            "api_base_url" => {
                cfg.api_base_url = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "concurrency" => cfg.concurrency = Some(parse_integer(value).with_context(invalid)?),
            "max_attempts" => cfg.max_attempts = Some(parse_integer(value).with_context(invalid)?),
            "chunk_size_kib" => {
                cfg.chunk_size_kib = Some(parse_integer(value).with_context(invalid)?);
            }
            "chunk_retry_limit" => {
                cfg.chunk_retry_limit = Some(parse_integer(value).with_context(invalid)?);
            }
            "share_publicly" => cfg.share_publicly = Some(parse_boolean(value).with_context(invalid)?),
            "verbosity" => {
                let label = parse_string_literal(value).with_context(invalid)?;
                cfg.verbosity = Some(parse_verbosity(&label).with_context(|| {
                    format!("Invalid `verbosity` value '{label}' on line {line_no}")
                })?);
            }
            "source_connect_timeout_secs" => {
                cfg.source_connect_timeout_secs = Some(parse_integer(value).with_context(invalid)?);
            }
            "source_read_timeout_secs" => {
                cfg.source_read_timeout_secs = Some(parse_integer(value).with_context(invalid)?);
            }
            "sink_connect_timeout_secs" => {
                cfg.sink_connect_timeout_secs = Some(parse_integer(value).with_context(invalid)?);
            }
            "sink_read_timeout_secs" => {
                cfg.sink_read_timeout_secs = Some(parse_integer(value).with_context(invalid)?);
            }
            unknown => bail!("Unknown configuration key: '{unknown}' on line {line_no}"),
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    raw_value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Expected double-quoted string"))
}

/// Parses a non-negative integer that fits `T`.
fn parse_integer<T: TryFrom<u64>>(raw_value: &str) -> Result<T> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    if token.starts_with('-') {
        bail!("Expected non-negative integer");
    }
    let value: u64 = token.parse()?;
    T::try_from(value).map_err(|_| anyhow::anyhow!("Integer value {value} out of range"))
}

fn parse_verbosity(value: &str) -> Result<VerbositySetting> {
    match value {
        "default" => Ok(VerbositySetting::Default),
        "verbose" => Ok(VerbositySetting::Verbose),
        "quiet" => Ok(VerbositySetting::Quiet),
        "debug" => Ok(VerbositySetting::Debug),
        _ => bail!("Expected one of: default, verbose, quiet, debug"),
    }
}

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}
