//! Procurement API Library
//!
//! Supplier onboarding, requests for quotation, quotation review, purchase
//! orders, invoices and installment payment plans, behind an axum HTTP API.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod clock;
pub mod commands;
pub mod config;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod models;
pub mod notifications;
pub mod openapi;
pub mod services;
pub mod store;
pub mod tracing;

use axum::{
    extract::FromRef,
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Instant};
use tower_http::cors::{Any, CorsLayer};
use utoipa::ToSchema;

use crate::{
    auth::AuthService,
    clock::Clock,
    commands::WorkflowContext,
    config::AppConfig,
    events::{EventHandler, EventSender},
    notifications::{InMemoryNotificationService, NotificationEmitter, NotificationService},
    services::{AnalyticsService, EntityQueryService, WorkflowEngine},
    store::{EntityStore, LockRegistry},
};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub workflow: WorkflowEngine,
    pub queries: EntityQueryService,
    pub analytics: AnalyticsService,
    pub notifications: Arc<dyn NotificationService>,
    pub auth: Arc<AuthService>,
    pub started_at: Instant,
}

impl AppState {
    /// Wires the engine, the read services and the notification task around `store`.
    ///
    /// Spawns the event processing loop, so it must be called inside a Tokio runtime.
    pub fn bootstrap(config: AppConfig, store: Arc<dyn EntityStore>, clock: Arc<dyn Clock>) -> Self {
        let notifications: Arc<dyn NotificationService> =
            Arc::new(InMemoryNotificationService::with_capacity(
                config.notification_inbox_capacity,
            ));

        let (events, event_rx) = EventSender::channel(config.event_channel_capacity);
        let emitter: Arc<dyn EventHandler> =
            Arc::new(NotificationEmitter::new(store.clone(), notifications.clone()));
        tokio::spawn(events::process_events(event_rx, vec![emitter]));

        let ctx = WorkflowContext::new(
            store.clone(),
            Arc::new(events),
            LockRegistry::new(),
            clock.clone(),
        );

        Self {
            auth: Arc::new(AuthService::new(config.auth_config())),
            config: Arc::new(config),
            workflow: WorkflowEngine::new(ctx),
            queries: EntityQueryService::new(store.clone()),
            analytics: AnalyticsService::new(store, clock),
            notifications,
            started_at: Instant::now(),
        }
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

// Common response wrappers
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, page: u64, per_page: u64, total: u64) -> Self {
        let total_pages = if per_page == 0 {
            0
        } else {
            total.div_ceil(per_page)
        };
        Self {
            items,
            total,
            page,
            per_page,
            total_pages,
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}


pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .merge(handlers::suppliers::supplier_routes())
        .merge(handlers::rfqs::rfq_routes())
        .merge(handlers::quotations::quotation_routes())
        .merge(handlers::purchase_orders::purchase_order_routes())
        .merge(handlers::invoices::invoice_routes())
        .merge(handlers::payments::payment_routes())
        .merge(handlers::entities::entity_routes())
        .merge(handlers::reports::report_routes())
        .merge(handlers::notifications::notification_routes())
}

async fn openapi_document() -> impl IntoResponse {
    match openapi::openapi_json() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        ),
        Err(e) => {
            ::tracing::error!(error = %e, "failed to render OpenAPI document");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain")],
                String::from("openapi error"),
            )
        }
    }
}

/// CORS from configuration: explicit origins win, then the permissive
/// development fallback. Otherwise cross-origin requests are refused.
pub fn cors_layer(cfg: &AppConfig) -> CorsLayer {
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
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else if cfg.should_allow_permissive_cors() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    }
}

/// The full HTTP application: health, OpenAPI document and `/api/v1`.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    Router::new()
        .route("/", get(|| async { "procurement-api up" }))
        .route("/api-docs/openapi.json", get(openapi_document))
        .merge(handlers::health::health_routes())
        .nest("/api/v1", api_v1_routes())
        .layer(crate::tracing::configure_http_tracing())
        .layer(cors)
        // Outermost, so the trace span and error bodies see the request id
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}
