use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use policy_crawler_core::{CrawlerConfig, ErrorPolicy, PolicyType};

#[derive(Parser)]
#[command(
    name = "policy-crawler",
    version,
    about = "Crawl AWS Organizations and IAM policies through the AWS CLI into timestamped JSON"
)]
pub struct Cli {
    /// Config file (default: policy-crawler.yaml when present)
    #[arg(long, global = true, env = "POLICY_CRAWLER_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Crawl organization roots, units and accounts with their attached policies
    Org(OrgArgs),
    /// Crawl IAM users, groups and managed policy documents
    Iam(CrawlArgs),
    /// Check that the AWS CLI runs and each profile resolves to an identity
    Doctor(DoctorArgs),
    /// Print the effective configuration as YAML
    Config(OrgArgs),
    Version,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Flags shared by the crawl commands. Each one overrides the config file
/// and environment.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct CrawlArgs {
    /// Profile to crawl (repeatable)
    #[arg(long = "profile", short = 'p')]
    pub profiles: Vec<String>,

    /// Directory receiving the JSON artifacts
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// AWS CLI binary
    #[arg(long)]
    pub aws_bin: Option<String>,

    /// Maximum CLI invocations in flight (1 = strictly sequential)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Per-invocation timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Retries for throttled invocations
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// abort: stop the profile on the first failed fetch; record: keep going and list failures
    #[arg(long)]
    pub on_error: Option<ErrorPolicy>,

    /// Write indented JSON
    #[arg(long)]
    pub pretty: bool,
}

impl CrawlArgs {
    pub fn apply_to(&self, config: &mut CrawlerConfig) {
        if !self.profiles.is_empty() {
            config.profiles = self.profiles.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(bin) = &self.aws_bin {
            config.aws_bin = bin.clone();
        }
        if let Some(n) = self.concurrency {
            config.concurrency = n;
        }
        if let Some(secs) = self.timeout_secs {
            config.command_timeout_secs = secs;
        }
        if let Some(n) = self.max_retries {
            config.max_retries = n;
        }
        if let Some(policy) = self.on_error {
            config.on_error = policy;
        }
        if self.pretty {
            config.pretty = true;
        }
    }
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct OrgArgs {
    #[command(flatten)]
    pub crawl: CrawlArgs,

    /// Organization policy type to collect (repeatable), e.g. SERVICE_CONTROL_POLICY
    #[arg(long = "policy-type")]
    pub policy_types: Vec<PolicyType>,
}

impl OrgArgs {
    pub fn apply_to(&self, config: &mut CrawlerConfig) {
        self.crawl.apply_to(config);
        if !self.policy_types.is_empty() {
            config.policy_types = self.policy_types.clone();
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct DoctorArgs {
    /// Profile to check (repeatable; default: configured profiles)
    #[arg(long = "profile", short = 'p')]
    pub profiles: Vec<String>,

    /// AWS CLI binary
    #[arg(long)]
    pub aws_bin: Option<String>,

    /// Per-invocation timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}
