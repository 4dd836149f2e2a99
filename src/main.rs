use anyhow::{Context, Result};
use pagesmith::cli::commands::{BuildCommand, DevelopCommand};
use pagesmith::cli::output::*;
use pagesmith::cli::{Cli, Command};
use pagesmith::{Orchestrator, ReloadHub, SiteConfig};
use std::time::Instant;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    let cwd = std::env::current_dir().context("Failed to determine working directory")?;
    let config = SiteConfig::resolve(&cwd);

    // Execute command
    match &cli.command {
        Command::Clean => clean(config).await?,
        Command::Build(cmd) => build(cmd, config).await?,
        Command::Develop(cmd) => develop(cmd, config).await?,
    }

    Ok(())
}

async fn clean(config: SiteConfig) -> Result<()> {
    let orchestrator = Orchestrator::new(config);
    match orchestrator.clean().run().await {
        Ok(()) => {
            println!("{} Removed output and intermediate directories", CHECK);
            Ok(())
        }
        Err(e) => {
            println!("{} Clean {}", CROSS, style("failed").red());
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

async fn build(cmd: &BuildCommand, config: SiteConfig) -> Result<()> {
    if cmd.show_config {
        let yaml = serde_yaml::to_string(&config).context("Failed to render configuration")?;
        println!("{} Effective configuration:\n{}", INFO, yaml);
    }

    println!("{} Building site", ROCKET);
    let started = Instant::now();

    let orchestrator = Orchestrator::new(config);
    let result = orchestrator.build().run().await;

    if let Err(e) = result {
        println!("{} Build {}", CROSS, style("failed").red());
        error!("{}", e);
        std::process::exit(1);
    }

    println!(
        "{} Build completed {} in {}",
        CHECK,
        style("successfully").green(),
        style(format_duration(started.elapsed())).dim()
    );
    Ok(())
}

async fn develop(cmd: &DevelopCommand, config: SiteConfig) -> Result<()> {
    println!(
        "{} Starting development server on {}",
        ROCKET,
        style(format!("http://127.0.0.1:{}", cmd.port)).bold()
    );

    let hub = ReloadHub::new();
    let orchestrator = Orchestrator::with_reload(config, hub);
    if let Err(e) = orchestrator.develop(cmd.port).await {
        println!("{} Development server {}", CROSS, style("failed").red());
        error!("{}", e);
        std::process::exit(1);
    }
    Ok(())
}
