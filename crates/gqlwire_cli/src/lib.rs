//! Command-line interface for gqlwire.
//!
//! # Usage
//!
//! ```bash
//! # Serve the demo library on 127.0.0.1:4000/graphql
//! gqlwire serve
//!
//! # Bind elsewhere, tick the clock subscription every 250ms
//! gqlwire serve --host 0.0.0.0 --port 8080 --tick-ms 250
//!
//! # Print version information
//! gqlwire version
//! ```

pub mod demo;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use gqlwire_sdk::{GqlServer, ServerConfig};
use std::time::Duration;

pub use demo::DemoExecutor;

#[derive(Parser, Debug)]
#[command(name = "gqlwire")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the demo library over HTTP
    Serve(ServeArgs),

    /// Print version information
    Version,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, default_value = "4000")]
    pub port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Path of the GraphQL endpoint
    #[arg(long, default_value = "/graphql")]
    pub endpoint: String,

    /// Disable the playground page
    #[arg(long)]
    pub no_playground: bool,

    /// Clock subscription period in milliseconds
    #[arg(long, default_value = "1000")]
    pub tick_ms: u64,
}

impl ServeArgs {
    pub fn server_config(&self) -> ServerConfig {
        let config = ServerConfig::new()
            .port(self.port)
            .host(self.host.clone())
            .endpoint(self.endpoint.clone());
        if self.no_playground {
            config.no_playground()
        } else {
            config
        }
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

/// Default `RUST_LOG` directive for the given verbosity.
pub fn default_filter(cli: &Cli) -> &'static str {
    if cli.verbose {
        "gqlwire=debug"
    } else if cli.quiet {
        "gqlwire=warn"
    } else {
        "gqlwire=info"
    }
}

pub async fn run(cli: Cli) -> Result<i32, Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Serve(args) => {
            let config = args.server_config();
            if !cli.quiet {
                print_banner(&config, args.tick());
            }

            let server = GqlServer::builder()
                .config(config)
                .executor(DemoExecutor::new(args.tick()))
                .build()?;
            server.listen().await?;
            Ok(0)
        }
        Commands::Version => {
            println!("gqlwire {}", env!("CARGO_PKG_VERSION"));
            Ok(0)
        }
    }
}

fn print_banner(config: &ServerConfig, tick: Duration) {
    let url = format!("http://{}:{}{}", config.host, config.port, config.endpoint);
    println!("{}", "gqlwire demo server".green().bold());
    println!();
    println!("  Endpoint:   {}", url.cyan());
    println!(
        "  Playground: {}",
        if config.playground {
            "enabled".green()
        } else {
            "disabled".dimmed()
        }
    );
    println!("  Clock tick: {}ms", tick.as_millis());
    println!();
    println!(
        "  {} curl -N {} -H 'Content-Type: application/json' -d '{{\"query\":\"subscription {{ clock }}\"}}'",
        "Try:".yellow(),
        url
    );
    println!();
}
