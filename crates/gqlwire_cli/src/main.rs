//! Main entry point for the gqlwire CLI.

use clap::Parser;
use gqlwire_cli::Cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| gqlwire_cli::default_filter(&cli).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match gqlwire_cli::run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
