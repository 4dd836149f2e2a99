//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{BuildCommand, DevelopCommand};

/// Static site build tool
#[derive(Debug, Parser, Clone)]
#[command(name = "pagesmith")]
#[command(author = "Pagesmith Contributors")]
#[command(version = "0.1.0")]
#[command(about = "A static site build tool with live-reloading development server", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Remove the output and intermediate directories
    Clean,

    /// Run the full production build
    Build(BuildCommand),

    /// Compile, watch, and serve with live reload
    Develop(DevelopCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}

use std::ffi::OsString;
