use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use policy_crawler_core::{
    save_report, ArtifactKind, AwsCli, CommandRunner, CrawlReport, CrawlResult, CrawlSession,
    CrawlerConfig,
};
use tracing::{error, info, warn};

use crate::exit_codes::{CRAWL_FAILED, SUCCESS};

/// Config file, then environment, then flags.
pub(crate) fn load_config(
    config_path: Option<&Path>,
    apply_flags: impl FnOnce(&mut CrawlerConfig),
) -> anyhow::Result<CrawlerConfig> {
    let mut config = CrawlerConfig::load(config_path).context("failed to load configuration")?;
    apply_flags(&mut config);
    Ok(config)
}

/// Crawl every configured profile in turn with a fresh session and report.
///
/// A failing profile is logged and skipped; the exit code reports whether
/// any profile failed.
pub(crate) async fn crawl_profiles<R, F, Fut>(
    config: &CrawlerConfig,
    kind: ArtifactKind,
    crawl: F,
) -> anyhow::Result<i32>
where
    R: CrawlReport,
    F: Fn(CrawlSession) -> Fut,
    Fut: Future<Output = CrawlResult<R>>,
{
    let runner: Arc<dyn CommandRunner> = Arc::new(AwsCli::from_config(config));
    let mut failed = 0usize;

    for profile in &config.profiles {
        info!(profile = %profile, "crawling profile");
        let session = CrawlSession::from_config(runner.clone(), profile.as_str(), config);

        match crawl_profile(session, config, kind, &crawl).await {
            Ok(path) => {
                println!(
                    "Policies saved for: \"{}\", to: \"{}\".",
                    profile,
                    path.display()
                );
            }
            Err(e) => {
                let message = format!("{e:#}");
                error!(profile = %profile, error = %message, "profile failed");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        warn!(
            failed,
            total = config.profiles.len(),
            "some profiles were not saved"
        );
        Ok(CRAWL_FAILED)
    } else {
        Ok(SUCCESS)
    }
}

async fn crawl_profile<R, F, Fut>(
    session: CrawlSession,
    config: &CrawlerConfig,
    kind: ArtifactKind,
    crawl: &F,
) -> anyhow::Result<PathBuf>
where
    R: CrawlReport,
    F: Fn(CrawlSession) -> Fut,
    Fut: Future<Output = CrawlResult<R>>,
{
    let profile = session.profile().to_string();
    let report = crawl(session)
        .await
        .with_context(|| format!("crawl failed for profile {profile}"))?;

    let failures = report.failures().len();
    if failures > 0 {
        warn!(profile = %profile, failures, "crawl completed with recorded failures");
    }

    let file_name = kind.file_name(&profile, Utc::now());
    save_report(&config.output_dir, &file_name, &report, config.pretty)
        .await
        .with_context(|| format!("failed to write report for profile {profile}"))
}
