//! # arena-client
//!
//! Plays one arena match.
//!
//! ```text
//! arena-client rg-match://127.0.0.1:8007/ robots/guard.py      # create
//! arena-client rg-match://127.0.0.1:8007/Xy7 robots/guard.py   # join
//! ```
//!
//! The player is named after the robot file's stem. Every robot guards.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use rgmatch::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "arena-client")]
#[command(about = "Play a robot arena match")]
struct Args {
    /// rg-match://host:port/ to create a match, or rg-match://host:port/<id> to join one
    uri: MatchUri,

    /// Robot file; its stem becomes the player name
    robot: PathBuf,
}

/// The robot file's stem, reduced to the characters `NAME` accepts.
fn player_name(robot: &Path) -> String {
    let stem: String = robot
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();
    if stem.is_empty() { "robot".to_string() } else { stem }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut client = MatchClient::new(player_name(&args.robot), GuardBrain, BincodeCodec);

    match client.play(&args.uri).await {
        Ok(report) => {
            let survivors = report
                .final_snapshot()
                .map(|s| s.owned_by(report.settings.player_slot).count())
                .unwrap_or(0);
            tracing::info!(
                uri = %report.match_uri,
                turns = report.history.len(),
                survivors,
                "match complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "match failed");
            ExitCode::FAILURE
        }
    }
}
