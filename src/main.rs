//! meme-depot server binary.
//!
//! Accepts single-image uploads, stores them in a flat upload directory and
//! serves them back with cross-origin headers. The main entry point builds the
//! Axum router, starts the HTTP listener and handles graceful shutdown.

mod atomic;
mod background;
mod config;
mod error;
mod etag;
mod files;
mod http;
mod logging;
mod naming;
mod routes;
mod storage;
mod upload;

use axum::extract::connect_info::ConnectInfo;
use axum::http::Request;
use axum_server::Handle;
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, info, info_span};

use crate::background::spawn_background_tasks;
use crate::config::Args;
use crate::http::build_cors_layer;
use crate::storage::LocalStore;
use crate::upload::UploadConfig;

/// Starts the meme-depot server and blocks until shutdown.
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    logging::init_logging();

    let args = Args::parse();
    let store = Arc::new(LocalStore::new(PathBuf::from(&args.upload_dir)));
    store.ensure_root().await?;
    let upload_config = Arc::new(UploadConfig {
        max_upload_size: args.max_upload_size,
        name_scheme: args.name_scheme,
        public_url: args.public_url.clone(),
        temp_ttl: Duration::from_secs(args.temp_ttl_secs),
        clock: upload::wall_clock_millis,
    });

    let app = routes::build_router(
        store.clone(),
        upload_config.clone(),
        build_cors_layer(args.cors_origins.as_deref()),
    )
    .layer(
        TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let connect_ip = request
                    .extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip());
                let client_ip = http::resolve_client_ip(request.headers(), connect_ip)
                    .map(|ip| ip.to_string())
                    .unwrap_or_else(|| "unknown".to_string());

                info_span!(
                    env!("CARGO_CRATE_NAME"),
                    client_ip,
                    method = ?request.method(),
                    path = ?request.uri().path(),
                )
            })
            .on_request(DefaultOnRequest::new().level(Level::DEBUG))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    let host = args
        .host
        .parse::<IpAddr>()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string()))?;
    let addr = SocketAddr::new(host, args.port);
    let handle = Handle::new();

    info!(
        upload_dir = %store.root_path().display(),
        name_scheme = ?upload_config.name_scheme,
        max_upload_size = upload_config.max_upload_size,
        "🚀 Starting HTTP server at {}",
        addr
    );

    spawn_background_tasks(store, upload_config);
    tokio::spawn(shutdown_signal(handle.clone()));

    axum_server::bind(addr)
        .handle(handle)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received termination signal shutting down");
    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}
