use anyhow::Result;
use facepaint_hw::V4l2Backend;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod backend;
mod config;
mod dbus_interface;
mod render_loop;
mod scheduler;
mod studio;

use backend::HttpBackend;
use config::Config;
use dbus_interface::{StudioService, BUS_NAME, OBJECT_PATH};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "facepaintd starting");

    let config = Config::load()?;
    tracing::info!(
        mode = ?config.capture_mode,
        auto_capture = config.auto_capture,
        auto_apply = config.auto_apply,
        "configuration loaded"
    );

    let capture_backend = Arc::new(HttpBackend::new(&config));
    let studio = studio::spawn_studio(config, Arc::new(V4l2Backend), capture_backend);
    let events = studio.subscribe();

    let service = StudioService {
        studio: studio.clone(),
    };
    let connection = zbus::connection::Builder::session()?
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, service)?
        .build()
        .await?;

    let forwarder = connection.clone();
    tokio::spawn(async move {
        if let Err(e) = dbus_interface::forward_events(forwarder, events).await {
            tracing::error!(error = %e, "studio event forwarder stopped");
        }
    });

    tracing::info!(bus = BUS_NAME, path = OBJECT_PATH, "facepaintd ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("facepaintd shutting down");

    if let Err(e) = studio.stop_camera().await {
        tracing::warn!(error = %e, "camera release on shutdown failed");
    }

    Ok(())
}
