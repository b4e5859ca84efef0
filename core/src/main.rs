mod backfill;
mod config;
mod error;
mod ingest;
mod normalize;
mod supervisor;

use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "configuration error");
            std::process::exit(1);
        }
    };

    tokio::select! {
        result = supervisor::run(config) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "fatal startup error");
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            // §9: the core has no graceful-drain protocol — in-flight
            // claims simply stay `claimed=true` until the next sweep
            // (never implemented, per the same note). This only stops
            // the process from exiting silently.
            tracing::info!("received shutdown signal, exiting");
        }
    }
}
