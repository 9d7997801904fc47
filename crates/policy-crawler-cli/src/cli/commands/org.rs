use std::path::Path;

use policy_crawler_core::{crawl_organization, ArtifactKind};

use super::common::{crawl_profiles, load_config};
use crate::cli::args::OrgArgs;

pub async fn run(args: OrgArgs, config_path: Option<&Path>) -> anyhow::Result<i32> {
    let config = load_config(config_path, |c| args.apply_to(c))?;
    config.validate(true)?;

    crawl_profiles(&config, ArtifactKind::Organization, |session| async move {
        crawl_organization(&session).await
    })
    .await
}
