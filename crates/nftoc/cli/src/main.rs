mod cli;

use crate::cli::{
    Cli,
    Commands,
};
use clap::Parser;
use color_eyre::{
    Result,
    eyre::Report,
};
use nftoc_core::config::Config;
use serde_json::json;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::config::HookBuilder::default()
        .display_location_section(true)
        .display_env_section(false)
        .install()?;
    let _guard = rust_tracing::trace();

    let cli = Cli::parse();
    let json_output = cli.args.json_output();

    let result = async {
        let config = Config::load(cli.args.config_path())?;
        match &cli.command {
            Commands::Deploy(deploy) => {
                deploy.run(&config, json_output).await?;
            }
            Commands::Verify(verify) => {
                verify.run(&config, json_output).await?;
            }
            Commands::Networks(networks) => {
                networks.run(&config, json_output);
            }
        }
        Ok::<_, Report>(())
    }
    .await;

    if let Err(err) = result {
        if json_output {
            tracing::error!(error = %err, "Command failed");
            eprintln!(
                "{}",
                json!({
                    "status": "error",
                    "error": {
                        "message": err.to_string(),
                    }
                })
            );
            std::process::exit(1);
        }
        return Err(err);
    }

    Ok(())
}
