//! FilaMan Link (filaman-link) - headless device monitor
//!
//! Keeps a live session with the device, falls back to polling while the
//! session is down, correlates every AMS tray against the inventory catalog
//! and logs what it sees.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use filaman_common::config::{ClientConfig, DEVICE_URL_ENV_VAR};
use filaman_common::protocol::NfcContent;
use filaman_common::{EventBus, LinkEvent};
use filaman_link::{HttpAmsSource, SessionManager, WsConnector};
use filaman_tags::{CatalogSnapshot, CatalogSource, SpoolmanClient, TrayView};
use tokio::signal;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for filaman-link
#[derive(Parser, Debug)]
#[command(name = "filaman-link")]
#[command(about = "Headless monitor for a FilaMan device")]
#[command(version)]
struct Args {
    /// Config file (overrides FILAMAN_CONFIG and the per-user file)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Device base URL, e.g. http://filaman.local
    #[arg(long, env = DEVICE_URL_ENV_VAR)]
    device_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::new(format!(
        "filaman_link={0},filaman_tags={0},filaman_common={0}",
        level
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins; otherwise --log-level, then the config file's level
    let env_filter = EnvFilter::try_from_default_env().ok();
    let pinned = env_filter.is_some() || args.log_level.is_some();
    let initial = env_filter
        .unwrap_or_else(|| level_filter(args.log_level.as_deref().unwrap_or("info")));
    let (filter, filter_handle) = reload::Layer::new(initial);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ClientConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?
        .with_device_url(args.device_url)
        .context("Invalid device URL")?;
    if !pinned {
        filter_handle
            .reload(level_filter(&config.logging.level))
            .context("Failed to apply configured log level")?;
    }

    let endpoints = config
        .device_endpoints()
        .context("Failed to derive device endpoints")?;
    info!("Starting FilaMan Link for {}", config.device_url);
    info!("Live session: {}", endpoints.websocket);

    let bus = EventBus::new(config.link.event_capacity);
    let events = bus.subscribe();

    let connector = Arc::new(WsConnector::new(endpoints.websocket.clone()));
    let ams_source = Arc::new(
        HttpAmsSource::new(endpoints.ams.clone(), config.link.connect_timeout())
            .context("Failed to build polling client")?,
    );
    let link = SessionManager::spawn(config.link.clone(), connector, Some(ams_source), bus);
    link.connect().await.context("Session manager not running")?;

    let catalog: Arc<dyn CatalogSource> = Arc::new(match &config.catalog.spoolman_url {
        Some(url) => SpoolmanClient::new(url.clone(), config.catalog.request_timeout()),
        None => SpoolmanClient::discovered(
            endpoints.catalog_discovery.to_string(),
            config.catalog.request_timeout(),
        ),
    }
    .context("Failed to build catalog client")?);

    let stop = CancellationToken::new();
    let (snapshot_tx, snapshot_rx) = watch::channel(CatalogSnapshot::default());
    let refresher = tokio::spawn(refresh_catalog(
        catalog,
        config.catalog.refresh_interval(),
        snapshot_tx,
        stop.clone(),
    ));

    tokio::select! {
        _ = monitor(events, snapshot_rx) => {
            warn!("Event stream ended");
        }
        _ = shutdown_signal() => {}
    }

    stop.cancel();
    link.shutdown().await;
    let _ = refresher.await;
    info!("FilaMan Link stopped");
    Ok(())
}

/// Fetch catalog snapshots periodically
async fn refresh_catalog(
    source: Arc<dyn CatalogSource>,
    every: Duration,
    snapshots: watch::Sender<CatalogSnapshot>,
    stop: CancellationToken,
) {
    let mut interval = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = interval.tick() => {
                match source.snapshot().await {
                    Ok(snapshot) => {
                        let summary = snapshot.summary();
                        info!(
                            spools = summary.total_spools,
                            without_tag = summary.spools_without_tag,
                            vendors = summary.vendor_count,
                            weight_kg = summary.total_weight / 1000.0,
                            "Catalog refreshed"
                        );
                        snapshots.send_replace(snapshot);
                    }
                    Err(e) => warn!(error = %e, "Catalog refresh failed"),
                }
            }
        }
    }
}

/// Log every event, correlating trays against the latest catalog snapshot
async fn monitor(
    mut events: broadcast::Receiver<LinkEvent>,
    catalog: watch::Receiver<CatalogSnapshot>,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "Monitor lagging behind events");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return,
        };

        match event {
            LinkEvent::ConnectionChanged { connected, .. } => {
                info!(connected, "Device connection changed");
            }
            LinkEvent::Disconnected { reason, .. } => info!(%reason, "Device session ended"),
            LinkEvent::ReconnectScheduled { delay_ms, .. } => {
                debug!(delay_ms, "Reconnect pending")
            }
            LinkEvent::StateChanged { from, to, .. } => debug!(%from, %to, "Session state"),
            LinkEvent::AmsData { units, .. } => {
                let snapshot = catalog.borrow();
                for view in TrayView::build_all(&units, &snapshot.spools) {
                    info!(
                        ams = view.ams_id,
                        tray = %view.display_name,
                        empty = view.is_empty,
                        spool = ?view.spool_id,
                        material = view.material.as_deref().unwrap_or("-"),
                        vendor = view.vendor.as_deref().unwrap_or("-"),
                        color = %view.color_hex,
                        remaining = %view.remaining.map(|r| r.to_string()).unwrap_or_default(),
                        "Tray"
                    );
                }
            }
            LinkEvent::NfcTag { presence, .. } => info!(?presence, "Tag reader"),
            LinkEvent::NfcData { content, .. } => match content {
                NfcContent::Spool(tag) => {
                    let snapshot = catalog.borrow();
                    match tag.spool_id().and_then(|id| snapshot.spool(id)) {
                        Some(spool) => info!(spool = %spool.label(), "Spool tag read"),
                        None => info!(sm_id = %tag.sm_id, "Spool tag read, not in catalog"),
                    }
                }
                NfcContent::Location(location) => info!(%location, "Location tag read"),
                NfcContent::Error(message) => warn!(%message, "Tag reader error"),
                NfcContent::Info(message) => info!(%message, "Tag reader"),
                NfcContent::Empty => debug!("Tag reader cleared"),
                NfcContent::Unknown(value) => debug!(%value, "Unrecognized tag contents"),
            },
            LinkEvent::WriteNfcTagResult { success, .. } => info!(success, "Tag write finished"),
            LinkEvent::SpoolmanSettingsResult { success, .. } => {
                info!(success, "Catalog settings push finished")
            }
            LinkEvent::PeerStatus { status, .. } => debug!(
                free_heap_kb = ?status.free_heap_kb,
                bambu = ?status.bambu_connected,
                spoolman = ?status.spoolman_connected,
                "Device status"
            ),
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
