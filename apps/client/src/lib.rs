//! Offline-first engine for the vocabulary quiz.
//!
//! Mirrors the server's words and folders into a local SQLite store, queues
//! answers given offline and replays them once the server is reachable.

pub mod config;
pub mod connectivity;
pub mod db;
pub mod outbox;
pub mod quiz;
pub mod remote;
pub mod session;
pub mod state;
pub mod sync;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ClientConfig;
use crate::connectivity::StatusBanner;
use crate::state::OfflineServices;

const USAGE: &str = "usage: wordquiz-client <prepare|sync|status|watch>";

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let command = std::env::args().nth(1).unwrap_or_else(|| "status".into());
    let config = ClientConfig::from_env()?;

    info!(db = %config.db_path.display(), "Opening offline store...");
    let mut services = OfflineServices::open(&config)?;

    match command.as_str() {
        "prepare" => {
            let report = services.engine.prepare_offline().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "sync" => {
            let report = services
                .engine
                .drain(|current, total| info!(current, total, "sync progress"))
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "status" => {
            let online = services.engine.remote().check_connectivity().await;
            let status = services.snapshot_status(online)?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        "watch" => watch(&mut services, config.probe_interval.is_some()).await?,
        other => anyhow::bail!("unknown command {other:?}\n{USAGE}"),
    }

    Ok(())
}

/// Run the monitor until Ctrl-C, logging banner changes.
async fn watch(services: &mut OfflineServices, probing: bool) -> anyhow::Result<()> {
    let online = !probing || services.engine.remote().check_connectivity().await;
    let monitor = services.start(online);
    let mut updates = monitor.subscribe();
    let mut last_banner = StatusBanner::Hidden;

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let banner = updates.borrow_and_update().banner();
                if banner != last_banner {
                    info!(?banner, "status changed");
                    last_banner = banner;
                }
            }
        }
    }

    services.shutdown().await;
    Ok(())
}
