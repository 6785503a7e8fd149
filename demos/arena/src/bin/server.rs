//! # arena-server
//!
//! Hosts robot arena matches.
//!
//! ```text
//! arena-server 0.0.0.0 8007 --max-connections 16 --max-turns 100
//! ```

use std::time::Duration;

use arena::ArenaEngine;
use clap::{Parser, ValueEnum};
use rgmatch::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum WireFormat {
    Bincode,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "arena-server")]
#[command(about = "Turn-based robot arena match server")]
struct Args {
    /// Host to bind to and advertise in match URIs
    host: String,

    /// Port to listen on
    port: u16,

    /// Connections beyond this are turned away
    #[arg(long, default_value_t = 8)]
    max_connections: usize,

    /// Close a connection after this many seconds without input
    #[arg(long, default_value_t = 65536)]
    idle_timeout_secs: u64,

    /// Default turn limit for new matches
    #[arg(long, default_value_t = 100)]
    max_turns: u32,

    /// Encoding for settings, snapshots and action batches
    #[arg(long, value_enum, default_value_t = WireFormat::Bincode)]
    codec: WireFormat,

    /// Seed for spawn placement
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let builder = MatchServerBuilder::new()
        .bind(&args.host, args.port)
        .max_connections(args.max_connections)
        .idle_timeout(Duration::from_secs(args.idle_timeout_secs))
        .max_turns(args.max_turns);
    let engine = ArenaEngine::new(args.seed);

    tracing::info!(codec = ?args.codec, seed = args.seed, "starting arena server");
    match args.codec {
        WireFormat::Bincode => builder.build(engine, BincodeCodec).await?.run().await,
        WireFormat::Json => builder.build(engine, JsonCodec).await?.run().await,
    }
}
