use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::EnvFilter;

use prism_provider::provider::{PrismProvider, ProviderRequest};
use prism_provider::wait::OpContext;

/// Log filter, e.g. `PRISM_LOG=prism_provider=debug`
const LOG_ENV: &str = "PRISM_LOG";

#[derive(Parser)]
#[command(name = "prism-provider")]
#[command(about = "Terraform provider for the CloudKeeper Prism identity and access management API", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print provider, resource and data source schemas as JSON
    Schema,

    /// Run one provider operation and print the response as JSON
    Invoke {
        /// Request file, or `-` to read from stdin
        #[arg(short, long, default_value = "-")]
        request: String,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_request(source: &str) -> Result<ProviderRequest> {
    let raw = if source == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read request from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("Failed to read request file: {}", source))?
    };

    serde_json::from_str(&raw).context("Failed to parse provider request")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    match cli.command {
        Commands::Schema => {
            let schemas = PrismProvider::new().schemas();
            let json =
                serde_json::to_string_pretty(&schemas).context("Failed to serialize schemas")?;
            println!("{}", json);
        }
        Commands::Invoke { request } => {
            let request = read_request(&request)?;

            // Interrupts cancel polling and cascades at their next checkpoint
            let cancel = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&cancel);
            ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
                .context("Failed to install interrupt handler")?;
            let ctx = OpContext::with_cancel_flag(cancel);

            let response = PrismProvider::new().handle(request, &ctx);
            let json =
                serde_json::to_string(&response).context("Failed to serialize response")?;
            println!("{}", json);
        }
    }

    Ok(())
}
