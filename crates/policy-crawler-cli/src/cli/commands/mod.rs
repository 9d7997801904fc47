use super::args::*;

pub(crate) mod common;
pub mod config;
pub mod doctor;
pub mod iam;
pub mod org;

use crate::exit_codes::SUCCESS;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let config_path = cli.config.as_deref();
    match cli.cmd {
        Command::Org(args) => org::run(args, config_path).await,
        Command::Iam(args) => iam::run(args, config_path).await,
        Command::Doctor(args) => doctor::run(args, config_path).await,
        Command::Config(args) => config::run(args, config_path),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(SUCCESS)
        }
    }
}
