//! Runner backed by the real `aws` binary.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{parse_stdout, truncate_stderr, CliInvocation, CommandRunner};
use crate::config::CrawlerConfig;
use crate::error::{CrawlError, CrawlResult};

/// Runs invocations as child processes of the AWS CLI.
#[derive(Debug, Clone)]
pub struct AwsCli {
    bin: String,
    timeout: Duration,
    max_retries: u32,
}

impl AwsCli {
    pub fn new(bin: impl Into<String>, timeout: Duration, max_retries: u32) -> Self {
        Self {
            bin: bin.into(),
            timeout,
            max_retries,
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            config.aws_bin.clone(),
            Duration::from_secs(config.command_timeout_secs),
            config.max_retries,
        )
    }

    pub fn bin(&self) -> &str {
        &self.bin
    }

    /// `aws --version`. CLI v1 prints to stderr, v2 to stdout.
    pub async fn version(&self) -> CrawlResult<String> {
        let command = format!("{} --version", self.bin);
        let output = self.spawn_and_wait(&command, &["--version".to_string()]).await?;
        if !output.status.success() {
            return Err(CrawlError::CommandFailed {
                command,
                status: output.status.to_string(),
                stderr: truncate_stderr(&output.stderr),
            });
        }
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if stdout.is_empty() {
            Ok(truncate_stderr(&output.stderr))
        } else {
            Ok(stdout)
        }
    }

    async fn run_once(&self, invocation: &CliInvocation) -> CrawlResult<Value> {
        let command = invocation.render(&self.bin);
        debug!(command = %command, "execute command");

        let output = self.spawn_and_wait(&command, &invocation.argv()).await?;

        if !output.status.success() {
            return Err(CrawlError::CommandFailed {
                command,
                status: output.status.to_string(),
                stderr: truncate_stderr(&output.stderr),
            });
        }

        if output.stdout.iter().all(|b| b.is_ascii_whitespace()) {
            let stderr = truncate_stderr(&output.stderr);
            let stderr = if stderr.is_empty() { "N/A" } else { stderr.as_str() };
            debug!(command = %command, stderr = %stderr, "empty response");
        }

        parse_stdout(&command, &output.stdout)
    }

    async fn spawn_and_wait(
        &self,
        command: &str,
        argv: &[String],
    ) -> CrawlResult<std::process::Output> {
        let child = Command::new(&self.bin)
            .args(argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CrawlError::Spawn {
                command: command.to_string(),
                message: e.to_string(),
            })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(CrawlError::Spawn {
                command: command.to_string(),
                message: format!("failed waiting for process: {}", e),
            }),
            Err(_) => Err(CrawlError::Timeout {
                command: command.to_string(),
                timeout: self.timeout,
            }),
        }
    }
}

#[async_trait]
impl CommandRunner for AwsCli {
    async fn run(&self, invocation: &CliInvocation) -> CrawlResult<Value> {
        use rand::Rng;

        let mut retries = 0;

        loop {
            match self.run_once(invocation).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && retries < self.max_retries => {
                    retries += 1;

                    let base_backoff = Duration::from_secs(1 << retries.min(5));
                    let base_backoff = base_backoff.min(Duration::from_secs(30));
                    let jittered_ms =
                        rand::thread_rng().gen_range(0..=base_backoff.as_millis() as u64);
                    let backoff = Duration::from_millis(jittered_ms.max(10));

                    warn!(
                        error = %e,
                        retry = retries,
                        max_retries = self.max_retries,
                        backoff_ms = backoff.as_millis(),
                        "retrying throttled command"
                    );

                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
