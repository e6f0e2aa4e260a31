//! gauge-watch: poll the analytics API health endpoint and log
//! connectivity until interrupted.

use gauge_client::{init_tracing, GaugeConfig, HttpProbe, PollingController, TelemetryConfig};
use gauge_core::{GaugeResult, SystemClock};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("gauge-watch: {e}");
        std::process::exit(1);
    }
}

async fn run() -> GaugeResult<()> {
    let config = GaugeConfig::load()?;
    init_tracing(&TelemetryConfig::default())?;

    let probe = HttpProbe::new(
        &config.api_base_url,
        &config.polling.health_path,
        config.request_timeout(),
    )?;
    info!(url = probe.url(), "watching");

    let controller = PollingController::new(
        Arc::new(probe),
        config.polling.clone(),
        Arc::new(SystemClock),
    );
    let mut status_rx = controller.subscribe();
    controller.start();

    loop {
        tokio::select! {
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = status_rx.borrow_and_update().clone();
                if status.connected {
                    info!(state = ?status.state, last_update = ?status.last_update, "status");
                } else {
                    warn!(state = ?status.state, "api unreachable");
                }
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!(error = %e, "failed to listen for ctrl-c");
                }
                break;
            }
        }
    }

    controller.stop();
    Ok(())
}
