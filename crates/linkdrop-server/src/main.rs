//! Linkdrop directory server binary.
//!
//! # Usage
//!
//! ```bash
//! linkdrop-server --bind 0.0.0.0:8787
//! ```

use clap::Parser;
use linkdrop_server::{Server, ServerRuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Linkdrop rendezvous directory server
#[derive(Parser, Debug)]
#[command(name = "linkdrop-server")]
#[command(about = "Room directory for code-based peer rendezvous")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:8787")]
    bind: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Linkdrop directory starting");
    tracing::info!("Binding to {}", args.bind);

    let server = Server::bind(ServerRuntimeConfig { bind_address: args.bind }).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
