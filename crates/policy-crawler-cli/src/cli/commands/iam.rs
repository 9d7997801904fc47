use std::path::Path;

use policy_crawler_core::{crawl_identities, ArtifactKind};

use super::common::{crawl_profiles, load_config};
use crate::cli::args::CrawlArgs;

pub async fn run(args: CrawlArgs, config_path: Option<&Path>) -> anyhow::Result<i32> {
    let config = load_config(config_path, |c| args.apply_to(c))?;
    config.validate(false)?;

    crawl_profiles(&config, ArtifactKind::Identity, |session| async move {
        crawl_identities(&session).await
    })
    .await
}
