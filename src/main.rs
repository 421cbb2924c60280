use std::{net::SocketAddr, sync::Arc};

use http::HeaderValue;
use tokio::signal;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
};
use tracing::info;

use relocation_api as api;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    let platform = Arc::new(api::platform::PlatformClient::new(&cfg)?);

    // Probe once which optional platform methods this account exposes, so
    // request handling never branches on error types.
    let capabilities = platform.probe_capabilities(&cfg.warehouse_id).await;
    info!(
        erp_units = capabilities.erp_units,
        location_listing = capabilities.location_listing,
        "platform capabilities probed"
    );

    let cors_layer = build_cors_layer(&cfg);
    let state = api::AppState::new(cfg.clone(), platform, capabilities);

    let mut app = api::app(state)
        .layer(api::tracing::configure_http_tracing())
        .layer(CompressionLayer::new());
    if let Some(cors) = cors_layer {
        app = app.layer(cors);
    }

    let addr = SocketAddr::new(cfg.host.parse()?, cfg.port);
    info!("relocation-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Explicit origins from config; permissive only in development. This is an
/// operator tool called from scripts, so no CORS layer at all is the normal
/// production setup.
fn build_cors_layer(cfg: &api::config::AppConfig) -> Option<CorsLayer> {
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    if let Some(origins) = configured_origins {
        Some(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else if cfg.is_development() {
        info!("using permissive CORS (development environment)");
        Some(CorsLayer::permissive())
    } else {
        None
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
