// ABOUTME: Route module organization for Quill chat server HTTP endpoints
// ABOUTME: Centralized route definitions with thin handlers delegating to services
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Quill Labs

//! Route module for the Quill chat server
//!
//! Each domain module contains only route definitions and thin handler
//! functions that delegate to the service layer.

/// Chat conversation routes
pub mod chat;
/// Health check and system status routes
pub mod health;

pub use chat::ChatRoutes;
pub use health::HealthRoutes;

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::resources::ServerResources;

/// Assemble the full application router
#[must_use]
pub fn router(resources: Arc<ServerResources>) -> Router {
    Router::new()
        .merge(HealthRoutes::routes())
        .merge(ChatRoutes::routes(resources))
        .layer(TraceLayer::new_for_http())
}
