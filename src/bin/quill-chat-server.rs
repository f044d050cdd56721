// ABOUTME: Server binary wiring configuration, database, provider, and routes
// ABOUTME: Starts the HTTP API with graceful shutdown on ctrl-c
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Quill Labs

//! # Quill Chat Server Binary
//!
//! Starts the conversational AI backend: loads configuration from the
//! environment, migrates the database, constructs the language-model
//! provider, and serves the HTTP API.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use quill_chat_server::{
    config::environment::ServerConfig,
    database::Database,
    llm::build_provider,
    logging,
    resources::ServerResources,
    retrieval::NullRetriever,
    routes,
    services::token_counter::build_token_counter,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "quill-chat-server")]
#[command(about = "Quill Chat Server - Conversational AI backend with budgeted context windows")]
struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }

    logging::init_from_env()?;

    info!("Starting Quill Chat Server");
    info!("{}", config.summary());

    let database = Database::new(&config.database.url.to_connection_string())
        .await
        .context("Failed to initialize database")?;
    info!("Database initialized: {}", config.database.url);

    let provider = Arc::new(build_provider(&config.llm).context("Failed to build LLM provider")?);

    let counter = build_token_counter(config.token_counter, config.llm.model.as_deref());

    // No document pipeline ships with the server itself; deployments with a
    // retrieval stack substitute their own implementation here.
    let retriever = Arc::new(NullRetriever);

    let config = Arc::new(config);
    let resources = Arc::new(ServerResources::new(
        Arc::clone(&config),
        database,
        provider,
        counter,
        retriever,
    ));

    let app = routes::router(resources);

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    // Ignore the error: if the signal handler cannot install, run until killed
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received shutdown signal");
    }
}
