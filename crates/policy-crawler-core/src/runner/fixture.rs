//! In-memory runner returning canned responses, keyed by rendered command.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::{CliInvocation, CommandRunner};
use crate::error::{CrawlError, CrawlResult};

#[derive(Debug, Clone)]
enum Canned {
    Json(Value),
    Fail(String),
}

/// Replays canned CLI responses. Commands without a fixture fail.
#[derive(Debug, Default)]
pub struct StaticRunner {
    responses: HashMap<String, Canned>,
    calls: Mutex<Vec<String>>,
}

impl StaticRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to `command` (e.g. `aws iam list-users --profile p --no-paginate`) with `value`.
    pub fn with_response(mut self, command: impl Into<String>, value: Value) -> Self {
        self.responses.insert(command.into(), Canned::Json(value));
        self
    }

    /// Fail `command` with a non-zero exit and the given stderr.
    pub fn with_failure(mut self, command: impl Into<String>, stderr: impl Into<String>) -> Self {
        self.responses
            .insert(command.into(), Canned::Fail(stderr.into()));
        self
    }

    /// Commands executed so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn call_count(&self, command: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == command).count()
    }
}

#[async_trait]
impl CommandRunner for StaticRunner {
    async fn run(&self, invocation: &CliInvocation) -> CrawlResult<Value> {
        let command = invocation.to_string();
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(command.clone());

        match self.responses.get(&command) {
            Some(Canned::Json(value)) => Ok(value.clone()),
            Some(Canned::Fail(stderr)) => Err(CrawlError::CommandFailed {
                command,
                status: "exit status: 254".to_string(),
                stderr: stderr.clone(),
            }),
            None => Err(CrawlError::CommandFailed {
                command,
                status: "exit status: 252".to_string(),
                stderr: "no fixture for command".to_string(),
            }),
        }
    }
}
