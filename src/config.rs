//! Per-invocation configuration for the `meta` command.
//!
//! Address precedence: `--addr` > `LOG_CACHE_ADDR` (both handled by clap) >
//! `addr` in the YAML file given by `--config` / `LOG_CACHE_CONFIG`.
//! Timeout precedence: `--timeout` > `timeout` in the YAML file > 2s.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::cmd::MetaArgs;
use crate::logcache;

/// Default deadline for the metadata request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Optional YAML config file.
///
/// ```yaml
/// addr: https://log-cache.example.com
/// timeout: 5s
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub addr: Option<String>,
    pub timeout: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse YAML config file: {}", path.display()))
    }
}

/// Resolved settings handed to the meta pipeline.
#[derive(Debug, Clone)]
pub struct MetaConfig {
    pub addr: Url,
    pub timeout: Duration,
    pub no_headers: bool,
    pub json: bool,
}

impl MetaConfig {
    /// Merge the global address (flag or env), the file config and the
    /// subcommand arguments. Fails before any request is attempted.
    pub fn resolve(addr: Option<&str>, file: &FileConfig, args: &MetaArgs) -> Result<Self> {
        let raw_addr = addr
            .filter(|s| !s.trim().is_empty())
            .or_else(|| file.addr.as_deref().filter(|s| !s.trim().is_empty()));
        let Some(raw_addr) = raw_addr else {
            bail!("no Log Cache address configured (use --addr, LOG_CACHE_ADDR or a config file)");
        };
        let addr = logcache::parse_addr(raw_addr)?;

        let timeout = match (args.timeout, file.timeout.as_deref()) {
            (Some(t), _) => t.into(),
            (None, Some(raw)) => humantime::parse_duration(raw.trim())
                .with_context(|| format!("invalid timeout in config file: '{raw}'"))?,
            (None, None) => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            addr,
            timeout,
            no_headers: args.no_headers,
            json: args.json,
        })
    }
}
