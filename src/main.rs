// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, process::ExitCode};

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use booking_server::{
    api::router,
    auth::{AuthPipeline, KeyRing},
    config::{AppConfig, LogFormat, TlsConfig, DEFAULT_LOG_FILTER},
    state::AppState,
    store::InMemoryStore,
};

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing(LogFormat::from_env());

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let addr: SocketAddr = match format!("{}:{}", config.server.host, config.server.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!(host = %config.server.host, error = %e, "Invalid bind address");
            return ExitCode::FAILURE;
        }
    };

    let key_ring = match KeyRing::new(
        config.auth.jwks_url.as_str(),
        config.auth.algorithm,
        config.auth.key_fetch_timeout,
    ) {
        Ok(key_ring) => key_ring.with_min_refresh_interval(config.auth.key_min_refresh_interval),
        Err(e) => {
            tracing::error!(error = %e, "Failed to build key set HTTP client");
            return ExitCode::FAILURE;
        }
    };
    key_ring.warm().await;

    tracing::info!(
        issuer = %config.auth.issuer,
        jwks_url = %config.auth.jwks_url,
        mapped_groups = config.auth.group_roles.len(),
        "Authentication configured"
    );

    let pipeline = AuthPipeline::new(config.auth, key_ring);
    let app = router(AppState::new(pipeline, InMemoryStore::new()));

    let served = match config.server.tls {
        Some(tls) => serve_https(addr, &tls, app).await,
        None => {
            tracing::info!(%addr, "Booking server listening on http (docs at /docs)");
            serve(axum_server::bind(addr).serve(app.into_make_service())).await
        }
    };

    match served {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}

async fn serve_https(addr: SocketAddr, tls: &TlsConfig, app: Router) -> std::io::Result<()> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("rustls crypto provider already installed");
    }

    let tls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path).await?;
    tracing::info!(%addr, "Booking server listening on https (docs at /docs)");
    serve(axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service())).await
}

/// Run until the server exits or Ctrl-C arrives.
async fn serve(
    server: impl std::future::Future<Output = std::io::Result<()>>,
) -> std::io::Result<()> {
    tokio::select! {
        result = server => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            Ok(())
        }
    }
}
