use std::path::Path;

use super::common::load_config;
use crate::cli::args::OrgArgs;
use crate::exit_codes::SUCCESS;

/// Print the merged configuration. Not validated, so an incomplete setup
/// can still be inspected.
pub fn run(args: OrgArgs, config_path: Option<&Path>) -> anyhow::Result<i32> {
    let config = load_config(config_path, |c| args.apply_to(c))?;
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(SUCCESS)
}
