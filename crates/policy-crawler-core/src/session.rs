//! Per-profile crawl context shared by the org and IAM crawlers.

use std::collections::HashSet;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::{CrawlerConfig, ErrorPolicy};
use crate::error::{CrawlError, CrawlResult};
use crate::report::FetchFailure;
use crate::runner::{self, CliInvocation, CommandRunner};
use crate::types::{Listing, PolicyType};

/// Runner, profile and crawl options for one profile's crawl.
#[derive(Clone)]
pub struct CrawlSession {
    runner: Arc<dyn CommandRunner>,
    profile: String,
    policy_types: Vec<PolicyType>,
    concurrency: usize,
    on_error: ErrorPolicy,
}

impl CrawlSession {
    pub fn new(runner: Arc<dyn CommandRunner>, profile: impl Into<String>) -> Self {
        let defaults = CrawlerConfig::default();
        Self {
            runner,
            profile: profile.into(),
            policy_types: defaults.policy_types,
            concurrency: defaults.concurrency,
            on_error: defaults.on_error,
        }
    }

    /// Session for `profile` using the crawl options of `config`.
    pub fn from_config(
        runner: Arc<dyn CommandRunner>,
        profile: impl Into<String>,
        config: &CrawlerConfig,
    ) -> Self {
        Self::new(runner, profile)
            .with_policy_types(config.policy_types.clone())
            .with_concurrency(config.effective_concurrency())
            .with_error_policy(config.on_error)
    }

    pub fn with_policy_types(mut self, policy_types: Vec<PolicyType>) -> Self {
        self.policy_types = policy_types;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_error_policy(mut self, on_error: ErrorPolicy) -> Self {
        self.on_error = on_error;
        self
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn policy_types(&self) -> &[PolicyType] {
        &self.policy_types
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        self.on_error
    }

    /// Whether fan-outs should stop at the first failed item.
    pub fn stops_on_error(&self) -> bool {
        self.on_error == ErrorPolicy::Abort
    }

    pub fn organizations(&self, operation: &str) -> CliInvocation {
        CliInvocation::organizations(operation, &self.profile)
    }

    pub fn iam(&self, operation: &str) -> CliInvocation {
        CliInvocation::iam(operation, &self.profile)
    }

    pub async fn fetch<T: DeserializeOwned>(&self, invocation: &CliInvocation) -> CrawlResult<T> {
        runner::fetch(self.runner.as_ref(), invocation).await
    }

    /// Fetch every page of a listing, following its continuation until the
    /// response reports no further page.
    pub async fn fetch_all<T: Listing>(&self, invocation: &CliInvocation) -> CrawlResult<T> {
        let mut listing: T = self.fetch(invocation).await?;
        let mut seen = HashSet::new();
        while let Some((arg, token)) = listing.continuation() {
            if !seen.insert(token.clone()) {
                return Err(CrawlError::Decode {
                    command: invocation.to_string(),
                    message: format!("pagination token `{token}` repeated"),
                });
            }
            debug!(command = %invocation, page = seen.len() + 1, "fetching next page");
            let page: T = self.fetch(&invocation.clone().arg(arg, token)).await?;
            listing.extend_page(page);
        }
        Ok(listing)
    }

    /// Fetch a complete listing; under [`ErrorPolicy::Record`] a failure on
    /// any page is recorded and an empty listing returned.
    pub async fn fetch_listing<T: Listing>(
        &self,
        invocation: &CliInvocation,
        failures: &mut Vec<FetchFailure>,
    ) -> CrawlResult<T> {
        match self.fetch_all(invocation).await {
            Ok(value) => Ok(value),
            Err(e) => {
                self.absorb(e, failures)?;
                Ok(T::default())
            }
        }
    }

    /// Fetch a single record; under [`ErrorPolicy::Record`] a failure is
    /// recorded and `None` returned.
    pub async fn fetch_optional<T: DeserializeOwned>(
        &self,
        invocation: &CliInvocation,
        failures: &mut Vec<FetchFailure>,
    ) -> CrawlResult<Option<T>> {
        match self.fetch(invocation).await {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                self.absorb(e, failures)?;
                Ok(None)
            }
        }
    }

    /// Apply the error policy: record and continue, or propagate.
    pub fn absorb(&self, err: CrawlError, failures: &mut Vec<FetchFailure>) -> CrawlResult<()> {
        match self.on_error {
            ErrorPolicy::Abort => Err(err),
            ErrorPolicy::Record => {
                warn!(profile = %self.profile, error = %err, "fetch failed, continuing");
                failures.push(FetchFailure::from(&err));
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for CrawlSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlSession")
            .field("profile", &self.profile)
            .field("policy_types", &self.policy_types)
            .field("concurrency", &self.concurrency)
            .field("on_error", &self.on_error)
            .finish_non_exhaustive()
    }
}
