//! AutoGaitA CLI Entry Point
//!
//! This is the main entry point for the autogaita command-line tool.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use autogaita_cli::{batch, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Dlc(args) => {
            let summary = batch::execute_dlc(args)?;
            println!("{summary}");
        }
        Commands::Simi(args) => {
            let summary = batch::execute_simi(args)?;
            println!("{summary}");
        }
        Commands::Group(args) => {
            batch::execute_group(args)?;
        }
        Commands::Version => {
            println!("autogaita {}", env!("CARGO_PKG_VERSION"));
            println!("core version: {}", autogaita_core::VERSION);
        }
    }

    Ok(())
}
