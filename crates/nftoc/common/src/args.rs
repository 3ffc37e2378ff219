use clap::{
    Parser,
    ValueHint,
};
use std::path::{
    Path,
    PathBuf,
};

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "nftoc.toml";

#[derive(Debug, Parser, Clone, Default)]
pub struct CliArgs {
    /// Print machine-readable JSON instead of human output
    #[clap(short, long, global = true)]
    pub json: bool,
    /// Path to the project config file
    #[clap(long, global = true, env = "NFTOC_CONFIG", value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
}

impl CliArgs {
    pub fn json_output(&self) -> bool {
        self.json
    }

    pub fn config_path(&self) -> &Path {
        self.config
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE))
    }
}
