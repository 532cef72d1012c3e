use clap::Parser;
use log::{info, warn};
use miette::{IntoDiagnostic, Result};

use kmreplay_server::replay::{DatagramTap, ReplayEngine};
use kmreplay_server::{Cli, VERSION};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .format_timestamp_millis()
        .init();

    info!("kmreplay {} starting", VERSION);

    let config = args.to_config().into_diagnostic()?;
    let tap = DatagramTap::new();
    let handle = ReplayEngine::start(config, tap.clone()).into_diagnostic()?;

    let cancel = handle.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping replay");
            cancel.cancel();
        }
    });

    let status = tokio::task::spawn_blocking(move || handle.join())
        .await
        .into_diagnostic()?
        .into_diagnostic()?;

    let counts = tap.counts();
    info!(
        "captured installation: {}, runtime: {}, sound speed: {}",
        counts.installation, counts.runtime, counts.sound_speed
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&status).into_diagnostic()?
    );

    Ok(())
}
