#![warn(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::single_match_else)]

use crate::{
    config::RuntimeConfiguration,
    routes::{
        documents::{get_document, internal_delete_document, internal_post_capture, internal_put_import},
        index::{get_index_route, internal_get_form},
        record::internal_post_record,
        save::internal_post_save,
        search::{internal_post_identifier, internal_post_search},
    },
    state::IndukState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::env;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{compression::CompressionLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[macro_use]
extern crate tracing;

mod config;
mod controller;
mod data;
mod error;
mod form;
mod maud_conveniences;
mod routes;
mod scanner;
mod service;
mod state;

///a hundred scanned pages comfortably fit
const MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    warn!("signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("not loading .env: {e}");
    }

    tracing::subscriber::set_global_default(
        FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .finish(),
    )
    .expect("unable to set tracing subscriber");

    info!("`tracing` online");

    let config = RuntimeConfiguration::new().expect("unable to create config");
    let state = IndukState::new(config).expect("unable to create state");

    let trace_layer = TraceLayer::new_for_http();

    let app = Router::new()
        .route("/", get(get_index_route))
        .route("/documents/{kind}", get(get_document))
        .route("/internal/form", get(internal_get_form))
        .route("/internal/identifier", post(internal_post_identifier))
        .route("/internal/search", post(internal_post_search))
        .route("/internal/record", post(internal_post_record))
        .route(
            "/internal/scan/{kind}",
            post(internal_post_capture)
                .put(internal_put_import)
                .delete(internal_delete_document),
        )
        .route("/internal/save", post(internal_post_save))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_UPLOAD_BYTES))
        .layer(CompressionLayer::new())
        .layer(trace_layer)
        .with_state(state);

    let server_ip = env::var("INDUK_SERVER_IP").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let listener = TcpListener::bind(&server_ip)
        .await
        .expect("unable to listen on server ip");

    info!(?server_ip, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("unable to serve app");
}
