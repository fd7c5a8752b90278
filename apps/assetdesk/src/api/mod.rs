//! # assetdesk HTTP API Module
//!
//! REST API over the [`Desk`] using axum.
//!
//! ## Endpoints
//!
//! Public:
//! - `GET /health` - Health check
//! - `GET /helpdesk` - Helpdesk ticket form (HTML)
//! - `POST /helpdesk/ticket` - Submit the helpdesk form (HTML)
//!
//! Behind the API key (JSON):
//! - `GET /status` - Dashboard counts
//! - `POST /export`, `POST /import` - Registry snapshots
//! - `/assets`, `/employees`, `/recipients`, `/room-types`, `/rooms` - Master data
//! - `/allocations/...` - Allocation lifecycle
//! - `/checklists/...`, `/follow-ups/...` - Check-in/check-out verification
//! - `/clearances/...` - Exit clearance
//! - `/vehicles`, `/services`, `/trips`, `/trip-tickets`, `/driver-assignments`, `/job-cards` - Fleet
//! - `/maintenance/...` - Maintenance plans and requests
//! - `POST /jobs/run` - Run the daily jobs now
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `ASSETDESK_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `ASSETDESK_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)
//! - `ASSETDESK_API_KEY`: If set, requires Bearer token authentication

mod auth;
mod handlers;
mod helpdesk;
mod middleware;
mod types;

pub use middleware::{GlobalRateLimiter, create_rate_limiter};
// Re-export types for integration tests (via `assetdesk::api::*`)
#[allow(unused_imports)]
pub use types::*;

use crate::config::ServerConfig;
use crate::mailer::{DeliveryReport, Mailer};
use assetdesk_core::{Desk, DeskError};
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{delete, get, post, put},
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Request body limit; signed checklist documents are the largest payloads.
const MAX_BODY_SIZE: usize = 8 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
#[derive(Clone, Debug)]
pub struct AppState {
    pub desk: Arc<RwLock<Desk>>,
    /// Snapshot file rewritten after every change (file backend only).
    snapshot: Option<Arc<PathBuf>>,
    mailer: Mailer,
}

impl AppState {
    #[must_use]
    pub fn new(desk: Desk) -> Self {
        Self {
            desk: Arc::new(RwLock::new(desk)),
            snapshot: None,
            mailer: Mailer::default(),
        }
    }

    #[must_use]
    pub fn with_snapshot(mut self, path: PathBuf) -> Self {
        self.snapshot = Some(Arc::new(path));
        self
    }

    #[must_use]
    pub fn with_mailer(mut self, mailer: Mailer) -> Self {
        self.mailer = mailer;
        self
    }

    /// Run one change under the write lock and persist it. Queued
    /// notifications are handed to the mailer in the background. A failed
    /// snapshot write rolls the change back.
    pub async fn mutate<T>(
        &self,
        op: impl FnOnce(&mut Desk) -> Result<T, DeskError>,
    ) -> Result<T, DeskError> {
        let (value, queued) = {
            let mut desk = self.desk.write().await;
            let value = self.commit(&mut *desk, op).await?;
            (value, !desk.registry().outbox.is_empty())
        };
        if queued {
            let state = self.clone();
            tokio::spawn(async move {
                state.flush_outbox().await;
            });
        }
        Ok(value)
    }

    /// Apply `op` to a locked desk and write the snapshot. When the write
    /// fails the registry is put back as it was before `op`.
    pub(crate) async fn commit<T>(
        &self,
        desk: &mut Desk,
        op: impl FnOnce(&mut Desk) -> Result<T, DeskError>,
    ) -> Result<T, DeskError> {
        let previous = self.snapshot.is_some().then(|| desk.registry().clone());
        let value = op(&mut *desk)?;
        if let Err(e) = self.persist(&*desk).await {
            if let Some(registry) = previous {
                desk.restore(registry)?;
            }
            return Err(e);
        }
        Ok(value)
    }

    /// Write the snapshot file, if this state has one. The file is staged
    /// next to the target and renamed over it on a blocking thread.
    pub async fn persist(&self, desk: &Desk) -> Result<(), DeskError> {
        let Some(path) = self.snapshot.clone() else {
            return Ok(());
        };
        let bytes = desk.export_bytes()?;
        tokio::task::spawn_blocking(move || {
            let staging = path.with_extension("tmp");
            std::fs::write(&staging, &bytes)
                .map_err(|e| DeskError::IoError(format!("Write snapshot: {}", e)))?;
            std::fs::rename(&staging, path.as_path())
                .map_err(|e| DeskError::IoError(format!("Replace snapshot: {}", e)))
        })
        .await
        .map_err(|e| DeskError::IoError(format!("Snapshot task: {}", e)))?
    }

    /// Drain the outbox and deliver it. Delivery never fails the caller.
    pub async fn flush_outbox(&self) -> DeliveryReport {
        let notifications = {
            let mut desk = self.desk.write().await;
            match self.commit(&mut *desk, Desk::drain_outbox).await {
                Ok(n) => n,
                Err(e) => {
                    tracing::error!(error = %e, "Could not drain the notification outbox");
                    return DeliveryReport::default();
                }
            }
        };
        if notifications.is_empty() {
            return DeliveryReport::default();
        }
        let report = self.mailer.deliver(notifications).await;
        tracing::info!(
            sent = report.sent,
            failed = report.failed,
            logged = report.logged,
            "Outbox delivered"
        );
        report
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build the CORS layer from the configured origins.
///
/// - `"*"`: allows all origins (development only)
/// - unset: localhost only
/// - otherwise: the comma-separated list
fn build_cors_layer(origins: Option<&str>) -> CorsLayer {
    match origins {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (ASSETDESK_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!("CORS: No valid origins configured, defaulting to localhost only");
                build_localhost_cors()
            } else {
                cors_for(allowed_origins)
            }
        }
        None => {
            tracing::info!("CORS: No origins configured, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();
    cors_for(origins)
}

fn cors_for(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            handlers::ACTOR_HEADER,
        ])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the router with settings read from the environment.
pub fn create_router(state: AppState) -> Router {
    create_router_with(state, &ServerConfig::from_env())
}

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Rate Limiting - protects against DoS (if enabled)
/// 4. Authentication - validates API key (if configured)
pub fn create_router_with(state: AppState, server: &ServerConfig) -> Router {
    let cors = build_cors_layer(server.cors_origins.as_deref());

    let rate_limiter = if server.rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", server.rate_limit);
        Some(create_rate_limiter(server.rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    let api_key = server.api_key.clone();
    if api_key.is_some() {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED - every endpoint is publicly accessible. \
             Set ASSETDESK_API_KEY to enable authentication."
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/helpdesk", get(helpdesk::form_handler))
        .route("/helpdesk/ticket", post(helpdesk::submit_handler))
        .route("/status", get(handlers::status_handler))
        .route("/export", post(handlers::export_handler))
        .route("/import", post(handlers::import_handler))
        // Master data
        .route(
            "/assets",
            get(handlers::list_assets_handler).post(handlers::add_asset_handler),
        )
        .route("/assets/{id}", get(handlers::get_asset_handler))
        .route("/assets/{id}/validate", post(handlers::validate_asset_handler))
        .route("/assets/{id}/scrap", post(handlers::scrap_asset_handler))
        .route("/assets/{id}/place", post(handlers::place_asset_handler))
        .route("/employees", post(handlers::add_employee_handler))
        .route("/recipients", put(handlers::set_recipients_handler))
        .route("/room-types", post(handlers::add_room_type_handler))
        .route("/rooms", post(handlers::add_room_handler))
        .route("/rooms/{id}", get(handlers::get_room_handler))
        .route("/rooms/{id}/done", post(handlers::mark_room_done_handler))
        .route("/rooms/{id}/capacity", post(handlers::set_room_capacity_handler))
        // Allocations
        .route("/allocations", post(handlers::create_allocation_handler))
        .route("/allocations/{id}", get(handlers::get_allocation_handler))
        .route(
            "/allocations/{id}/assets",
            post(handlers::add_allocation_asset_handler),
        )
        .route(
            "/allocations/{id}/assets/{asset}",
            delete(handlers::remove_allocation_asset_handler),
        )
        .route("/allocations/{id}/submit", post(handlers::submit_handler))
        .route("/allocations/{id}/approve", post(handlers::approve_handler))
        .route("/allocations/{id}/reset", post(handlers::reset_to_draft_handler))
        .route("/allocations/{id}/cancel", post(handlers::cancel_handler))
        .route("/allocations/{id}/reject", post(handlers::reject_handler))
        .route("/allocations/{id}/allocate", post(handlers::allocate_handler))
        .route("/allocations/{id}/return", post(handlers::return_handler))
        .route(
            "/allocations/{id}/checklists",
            post(handlers::open_checklist_handler),
        )
        // Checklists and follow-ups
        .route("/checklists/{id}", get(handlers::get_checklist_handler))
        .route("/checklists/{id}/lines", post(handlers::set_checklist_line_handler))
        .route("/checklists/{id}/document", post(handlers::attach_document_handler))
        .route("/checklists/{id}/verify", post(handlers::verify_checklist_handler))
        .route("/checklists/{id}/reset", post(handlers::reset_checklist_handler))
        .route("/follow-ups/{id}/advance", post(handlers::advance_follow_up_handler))
        // Clearance
        .route("/clearances", post(handlers::create_clearance_handler))
        .route("/clearances/{id}", get(handlers::get_clearance_handler))
        .route("/clearances/{id}/process", post(handlers::process_clearance_handler))
        // Fleet
        .route("/vehicles", post(handlers::add_vehicle_handler))
        .route("/services", post(handlers::add_service_handler))
        .route("/services/{id}/state", post(handlers::set_service_state_handler))
        .route("/trips", post(handlers::add_trip_handler))
        .route("/trip-tickets", post(handlers::add_trip_ticket_handler))
        .route("/driver-assignments", post(handlers::add_driver_assignment_handler))
        .route(
            "/driver-assignments/{id}/status",
            post(handlers::set_assignment_status_handler),
        )
        .route("/job-cards", post(handlers::open_job_card_handler))
        .route("/job-cards/{id}/close", post(handlers::close_job_card_handler))
        // Maintenance
        .route("/maintenance/plans", put(handlers::set_maintenance_plan_handler))
        .route(
            "/maintenance/requests",
            post(handlers::open_maintenance_request_handler),
        )
        .route(
            "/maintenance/requests/{id}/state",
            post(handlers::set_maintenance_state_handler),
        )
        .route("/jobs/run", post(handlers::run_jobs_handler));

    // Authentication runs innermost, after rate limiting.
    if let Some(key) = api_key {
        router = router.layer(axum_middleware::from_fn_with_state(
            Arc::<str>::from(key),
            auth::api_key_auth_middleware,
        ));
    }

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Bind and serve until the process stops.
pub async fn run_server(state: AppState, server: &ServerConfig) -> Result<(), DeskError> {
    let router = create_router_with(state, server);
    let addr = format!("{}:{}", server.host, server.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| DeskError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("assetdesk HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| DeskError::IoError(format!("Server error: {}", e)))
}
