//! checkout-sync-api library
//!
//! Reconciles a third-party checkout provider's completed orders with the
//! local cart system: one validation callback endpoint plus the persistence
//! and configuration plumbing behind it.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod dto;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod services;
pub mod stores;

use axum::{extract::State, response::Json, routing::get, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

use services::{CustomerService, OrderValidationService};
use stores::{
    CartStore, ConfigSettingsStore, ProviderOrderStore, SettingsStore, SqlCartStore,
    SqlCustomerStore, SqlProviderOrderStore,
};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<config::AppConfig>,
    pub event_sender: events::EventSender,
    pub settings: Arc<dyn SettingsStore>,
    pub validation: Arc<OrderValidationService>,
}

impl AppState {
    /// Wires the SeaORM-backed stores and services onto the shared state.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: Arc<config::AppConfig>,
        event_sender: events::EventSender,
    ) -> Self {
        let carts: Arc<dyn CartStore> = Arc::new(SqlCartStore::new(db.clone()));
        let customers = CustomerService::new(
            Arc::new(SqlCustomerStore::new(db.clone())),
            event_sender.clone(),
        );
        let provider_orders: Arc<dyn ProviderOrderStore> =
            Arc::new(SqlProviderOrderStore::new(db.clone()));
        let settings: Arc<dyn SettingsStore> = Arc::new(ConfigSettingsStore::new(config.clone()));
        let validation = Arc::new(OrderValidationService::new(
            carts,
            customers,
            provider_orders,
            event_sender.clone(),
        ));

        Self {
            db,
            config,
            event_sender,
            settings,
            validation,
        }
    }
}

// Common response wrapper for the ambient endpoints
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Builds the application router: liveness, health and status plus the
/// provider callback routes.
pub fn app_router() -> Router<AppState> {
    Router::new()
        .route("/", get(|| async { "checkout-sync-api up" }))
        .route("/health", get(health_check))
        .route("/status", get(api_status))
        .nest("/callbacks", handlers::callback_routes())
}

async fn api_status() -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let version = env!("CARGO_PKG_VERSION");
    let git = option_env!("GIT_HASH").unwrap_or("unknown");
    let status_data = json!({
        "status": "ok",
        "version": version,
        "git": git,
        "service": "checkout-sync-api",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "environment": std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}
