//! Lemu CLI - Operational tools for the storefront.
//!
//! # Usage
//!
//! ```bash
//! # Create the session store table
//! lemu-cli migrate
//!
//! # Check a tenant's store configuration
//! lemu-cli store nexor --products
//! ```
//!
//! # Commands
//!
//! - `migrate` - Create the session store table
//! - `store` - Look up a store by subdomain

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "lemu-cli")]
#[command(author, version, about = "Lemu storefront CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the session store table
    Migrate,
    /// Look up a store by subdomain
    Store {
        /// Store subdomain, e.g. `nexor`
        subdomain: String,

        /// Also fetch the first page of products
        #[arg(short, long)]
        products: bool,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::sessions().await?,
        Commands::Store {
            subdomain,
            products,
        } => commands::store::show(&subdomain, products).await?,
    }
    Ok(())
}
