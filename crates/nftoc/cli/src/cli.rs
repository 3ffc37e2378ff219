use clap::Parser;
use nftoc_common::args::CliArgs;
use nftoc_core::{
    DEFAULT_EXPLORER_API_URL,
    config::NetworksArgs,
    deploy::DeployArgs,
    verify::VerifyArgs,
};
use std::sync::OnceLock;

fn version_message() -> &'static str {
    static VERSION: OnceLock<String> = OnceLock::new();
    VERSION
        .get_or_init(|| {
            format!(
                "{}\nDefault explorer API: {}",
                env!("CARGO_PKG_VERSION"),
                DEFAULT_EXPLORER_API_URL,
            )
        })
        .as_str()
}

#[derive(Parser)]
#[command(
    name = "nftoc",
    version = version_message(),
    long_version = version_message(),
    about = "Deploy and verify the NFTOC contract"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
    #[command(flatten)]
    pub args: CliArgs,
}

#[derive(clap::Subcommand)]
pub enum Commands {
    #[command(name = "deploy")]
    Deploy(DeployArgs),
    #[command(name = "verify")]
    Verify(VerifyArgs),
    #[command(name = "networks")]
    Networks(NetworksArgs),
}
