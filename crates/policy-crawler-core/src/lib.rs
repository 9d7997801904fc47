//! Organization and IAM policy crawler built on the AWS CLI.
//!
//! This crate drives the `aws` binary to collect:
//!
//! - the organization tree (roots, organizational units, accounts) with the
//!   policies attached to every node, plus the full document of every policy
//!   of the configured types
//! - IAM users, their groups, attached and inline policies, and the default
//!   version document of every distinct managed policy
//!
//! and writes each result to a timestamped JSON artifact.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use policy_crawler_core::{crawl_organization, AwsCli, CrawlSession, CrawlerConfig};
//!
//! # async fn example() -> policy_crawler_core::CrawlResult<()> {
//! let config = CrawlerConfig::load(None)?;
//! let runner = Arc::new(AwsCli::from_config(&config));
//! let session = CrawlSession::from_config(runner, "prod", &config);
//! let report = crawl_organization(&session).await?;
//! println!("accounts: {}", report.accounts.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `POLICY_CRAWLER_PROFILES` | Comma-separated CLI profiles |
//! | `POLICY_CRAWLER_AWS_BIN` | AWS CLI binary (default: `aws`) |
//! | `POLICY_CRAWLER_OUTPUT_DIR` | Artifact directory (default: `.`) |
//! | `POLICY_CRAWLER_CONCURRENCY` | Max invocations in flight (default: 4) |
//! | `POLICY_CRAWLER_TIMEOUT` | Per-invocation timeout in seconds (default: 120) |
//! | `POLICY_CRAWLER_MAX_RETRIES` | Retries for throttled calls (default: 2) |

pub mod config;
pub mod error;
pub mod fanout;
pub mod iam;
pub mod org;
pub mod persist;
pub mod report;
pub mod runner;
pub mod session;
pub mod types;

pub use config::{CrawlerConfig, ErrorPolicy, DEFAULT_CONFIG_FILE};
pub use error::{CrawlError, CrawlResult};
pub use iam::crawl_identities;
pub use org::crawl_organization;
pub use persist::{save_report, ArtifactKind};
pub use report::{
    AttachedPolicies, CrawlReport, FetchFailure, GroupNode, IdentityReport, ManagedPolicyDocument,
    OrgReport, OuNode, PolicyRegistry, TargetNode, UserNode,
};
pub use runner::fixture::StaticRunner;
pub use runner::{AwsCli, CliInvocation, CommandRunner};
pub use session::CrawlSession;
pub use types::{CallerIdentity, PolicyType};
