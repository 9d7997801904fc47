//! Command runner: executes AWS CLI invocations and parses their JSON output.
//!
//! Empty stdout is a valid, empty response (`{}`), distinct from a failed
//! invocation, which is always a [`CrawlError`].

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{CrawlError, CrawlResult};

mod aws;
pub mod fixture;

pub use aws::AwsCli;

/// Maximum number of stderr bytes kept in errors.
pub(crate) const STDERR_CAP: usize = 4096;

/// A single AWS CLI call: `aws <service> <operation> [--name value]... --profile <p> --no-paginate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliInvocation {
    service: String,
    operation: String,
    args: Vec<(String, String)>,
    profile: String,
}

impl CliInvocation {
    pub fn new(
        service: impl Into<String>,
        operation: impl Into<String>,
        profile: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            operation: operation.into(),
            args: Vec::new(),
            profile: profile.into(),
        }
    }

    /// Shorthand for `aws organizations <operation>`.
    pub fn organizations(operation: &str, profile: &str) -> Self {
        Self::new("organizations", operation, profile)
    }

    /// Shorthand for `aws iam <operation>`.
    pub fn iam(operation: &str, profile: &str) -> Self {
        Self::new("iam", operation, profile)
    }

    /// Append `--<name> <value>`.
    pub fn arg(mut self, name: &str, value: impl Into<String>) -> Self {
        self.args.push((name.to_string(), value.into()));
        self
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Arguments passed to the binary, in order. Values are never shell-interpreted.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() * 2 + 5);
        argv.push(self.service.clone());
        argv.push(self.operation.clone());
        for (name, value) in &self.args {
            argv.push(format!("--{}", name));
            argv.push(value.clone());
        }
        argv.push("--profile".to_string());
        argv.push(self.profile.clone());
        argv.push("--no-paginate".to_string());
        argv
    }

    /// Human-readable command line using the given binary name.
    pub fn render(&self, bin: &str) -> String {
        let mut line = bin.to_string();
        for part in self.argv() {
            line.push(' ');
            line.push_str(&part);
        }
        line
    }
}

impl fmt::Display for CliInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render("aws"))
    }
}

/// Executes CLI invocations.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the invocation and return its parsed stdout.
    async fn run(&self, invocation: &CliInvocation) -> CrawlResult<Value>;
}

/// Run an invocation and decode the response into `T`.
pub async fn fetch<T: DeserializeOwned>(
    runner: &dyn CommandRunner,
    invocation: &CliInvocation,
) -> CrawlResult<T> {
    let value = runner.run(invocation).await?;
    decode(&invocation.to_string(), value)
}

pub(crate) fn decode<T: DeserializeOwned>(command: &str, value: Value) -> CrawlResult<T> {
    serde_json::from_value(value).map_err(|e| CrawlError::Decode {
        command: command.to_string(),
        message: e.to_string(),
    })
}

/// Parse CLI stdout. Blank output is an empty mapping.
pub(crate) fn parse_stdout(command: &str, stdout: &[u8]) -> CrawlResult<Value> {
    if stdout.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(stdout).map_err(|e| CrawlError::Parse {
        command: command.to_string(),
        message: e.to_string(),
    })
}

pub(crate) fn truncate_stderr(stderr: &[u8]) -> String {
    let end = stderr.len().min(STDERR_CAP);
    String::from_utf8_lossy(&stderr[..end]).trim().to_string()
}
