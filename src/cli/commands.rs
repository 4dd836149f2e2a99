//! Command argument definitions

use clap::Args;

/// Arguments for the `build` command
#[derive(Debug, Args, Clone)]
pub struct BuildCommand {
    /// Print the resolved configuration before building
    #[arg(long)]
    pub show_config: bool,
}

/// Arguments for the `develop` command
#[derive(Debug, Args, Clone)]
pub struct DevelopCommand {
    /// Port for the development server
    #[arg(short, long, default_value_t = 2080)]
    pub port: u16,
}
