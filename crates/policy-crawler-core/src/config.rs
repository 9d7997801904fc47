//! Crawler configuration: YAML file, then environment overrides.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CrawlError, CrawlResult};
use crate::types::PolicyType;

/// Config file looked up when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "policy-crawler.yaml";

/// What to do when a single fetch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Abort the profile's crawl on the first failure.
    #[default]
    Abort,
    /// Record the failure in the report and continue with an empty value.
    Record,
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorPolicy::Abort => f.write_str("abort"),
            ErrorPolicy::Record => f.write_str("record"),
        }
    }
}

impl FromStr for ErrorPolicy {
    type Err = CrawlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(ErrorPolicy::Abort),
            "record" => Ok(ErrorPolicy::Record),
            other => Err(CrawlError::config(format!(
                "unknown error policy `{}` (expected abort or record)",
                other
            ))),
        }
    }
}

/// Crawler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrawlerConfig {
    /// Named CLI profiles to crawl.
    #[serde(default)]
    pub profiles: Vec<String>,

    /// Organization policy types to enumerate.
    #[serde(default = "default_policy_types")]
    pub policy_types: Vec<PolicyType>,

    /// AWS CLI binary.
    #[serde(default = "default_aws_bin")]
    pub aws_bin: String,

    /// Directory receiving the JSON artifacts.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Maximum number of CLI invocations in flight.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-invocation timeout in seconds.
    #[serde(default = "default_timeout")]
    pub command_timeout_secs: u64,

    /// Retries for throttled invocations.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default)]
    pub on_error: ErrorPolicy,

    /// Write indented JSON.
    #[serde(default)]
    pub pretty: bool,
}

fn default_policy_types() -> Vec<PolicyType> {
    vec![PolicyType::ServiceControlPolicy]
}

fn default_aws_bin() -> String {
    "aws".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_concurrency() -> usize {
    4
}

fn default_timeout() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    2
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            profiles: Vec::new(),
            policy_types: default_policy_types(),
            aws_bin: default_aws_bin(),
            output_dir: default_output_dir(),
            concurrency: default_concurrency(),
            command_timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            on_error: ErrorPolicy::default(),
            pretty: false,
        }
    }
}

impl CrawlerConfig {
    /// Load the config file (if any) and apply environment overrides.
    ///
    /// An explicit `path` must exist. Without one, [`DEFAULT_CONFIG_FILE`]
    /// is used when present and built-in defaults otherwise.
    pub fn load(path: Option<&Path>) -> CrawlResult<Self> {
        let config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    debug!("no config file found, using defaults");
                    Self::default()
                }
            }
        };
        Ok(config.apply_env())
    }

    pub fn from_file(path: &Path) -> CrawlResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CrawlError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_yaml(&raw)
            .map_err(|e| CrawlError::config(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    /// Apply environment overrides.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `POLICY_CRAWLER_PROFILES` | Comma-separated profiles |
    /// | `POLICY_CRAWLER_AWS_BIN` | AWS CLI binary |
    /// | `POLICY_CRAWLER_OUTPUT_DIR` | Artifact directory |
    /// | `POLICY_CRAWLER_CONCURRENCY` | Fan-out limit |
    /// | `POLICY_CRAWLER_TIMEOUT` | Per-invocation timeout in seconds |
    /// | `POLICY_CRAWLER_MAX_RETRIES` | Throttling retries |
    pub fn apply_env(mut self) -> Self {
        if let Ok(v) = std::env::var("POLICY_CRAWLER_PROFILES") {
            let profiles = split_list(&v);
            if !profiles.is_empty() {
                self.profiles = profiles;
            }
        }
        if let Ok(v) = std::env::var("POLICY_CRAWLER_AWS_BIN") {
            self.aws_bin = v;
        }
        if let Ok(v) = std::env::var("POLICY_CRAWLER_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = env_parse("POLICY_CRAWLER_CONCURRENCY") {
            self.concurrency = v;
        }
        if let Some(v) = env_parse("POLICY_CRAWLER_TIMEOUT") {
            self.command_timeout_secs = v;
        }
        if let Some(v) = env_parse("POLICY_CRAWLER_MAX_RETRIES") {
            self.max_retries = v;
        }
        self
    }

    /// Check settings needed for a crawl.
    pub fn validate(&self, needs_policy_types: bool) -> CrawlResult<()> {
        if self.profiles.is_empty() {
            return Err(CrawlError::config(
                "no profiles configured (use --profile, POLICY_CRAWLER_PROFILES or `profiles:` in the config file)",
            ));
        }
        if let Some(bad) = self.profiles.iter().find(|p| p.trim().is_empty()) {
            return Err(CrawlError::config(format!("invalid profile name `{}`", bad)));
        }
        if needs_policy_types && self.policy_types.is_empty() {
            return Err(CrawlError::config("no policy types configured"));
        }
        self.validate_runner()
    }

    /// Check the settings used to invoke the AWS CLI.
    pub fn validate_runner(&self) -> CrawlResult<()> {
        if self.aws_bin.trim().is_empty() {
            return Err(CrawlError::config("aws_bin must not be empty"));
        }
        if self.command_timeout_secs == 0 {
            return Err(CrawlError::config("command_timeout_secs must be at least 1"));
        }
        Ok(())
    }

    /// Fan-out limit, never below one.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.max(1)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
