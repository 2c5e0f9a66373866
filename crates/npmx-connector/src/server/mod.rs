//! HTTP server for the web UI
//!
//! JSON over HTTP on the loopback interface. Every endpoint except
//! `/connect` requires the session token as a bearer credential.

mod auth;
mod error;
mod handlers;

pub use auth::Authorized;
pub use error::{ApiError, ApiResult};

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::ConnectorState;

/// Build the connector's router
pub fn router(state: Arc<ConnectorState>) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .route("/connect", post(handlers::connect))
        .route("/state", get(handlers::get_state))
        .route(
            "/operations",
            post(handlers::create_operation).delete(handlers::delete_operation),
        )
        .route("/operations/batch", post(handlers::create_batch))
        .route("/operations/all", delete(handlers::delete_all))
        .route("/approve", post(handlers::approve))
        .route("/approve-all", post(handlers::approve_all))
        .route("/retry", post(handlers::retry))
        .route("/execute", post(handlers::execute))
        .route("/org/:org/users", get(handlers::org_users))
        .route("/org/:org/teams", get(handlers::org_teams))
        .route("/team/:scope_team/users", get(handlers::team_users))
        .route(
            "/package/:pkg/collaborators",
            get(handlers::package_collaborators),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for the configured web UI origins
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid allowed origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_private_network(true)
}

/// Serve until `shutdown` is cancelled
pub async fn serve(
    listener: TcpListener,
    state: Arc<ConnectorState>,
    shutdown: CancellationToken,
) -> Result<()> {
    let address = listener
        .local_addr()
        .context("Failed to read listener address")?;
    tracing::info!("Connector listening on http://{}", address);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("HTTP server failed")?;

    tracing::info!("Connector server stopped");
    Ok(())
}
