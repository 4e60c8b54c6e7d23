use crate::types::LATEST_VERSION;
use clap::{Parser, Subcommand};

pub fn get_version() -> &'static str {
    const BASE_VERSION: &str = env!("CARGO_PKG_VERSION");

    // Tagged builds report the tag alone
    if let Some(tag) = option_env!("AZABOX_GIT_TAG") {
        return tag;
    }

    let commit = option_env!("AZABOX_GIT_COMMIT").unwrap_or("unknown");
    let branch = option_env!("AZABOX_GIT_BRANCH").unwrap_or("unknown");

    // Leaked once at startup for clap's 'static requirement
    let version = format!("v{}-{} ({})", BASE_VERSION, commit, branch);
    Box::leak(version.into_boxed_str())
}

#[derive(Parser, Debug)]
#[command(name = "azabox")]
#[command(about = "azabox - A per-user binary manager")]
#[command(version = get_version())]
pub struct Cli {
    /// Increase verbosity (use multiple times for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Reduce output to errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Set the logging level (trace, debug, info, warn, error)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install binaries for the current user
    #[command(after_help = "Examples:\n  azabox install derailed/k9s\n  azabox install -V v0.32.0 derailed/k9s\n  azabox install jq")]
    Install {
        /// Binaries to install ('owner/name', or 'name' for 'name/name')
        #[arg(required = true)]
        binaries: Vec<String>,

        /// Desired version of the binaries
        #[arg(short = 'V', long = "version", default_value = LATEST_VERSION)]
        version: String,
    },

    /// Update installed binaries (all of them when none is given)
    Update {
        /// Binaries to update ('owner/name' or 'name')
        binaries: Vec<String>,
    },

    /// List installed binaries for the current user
    List,

    /// Show the current version
    Version,
}
