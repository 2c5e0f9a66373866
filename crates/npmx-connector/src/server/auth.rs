//! Bearer token extractor

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use npmx_core::auth::parse_bearer;

use super::error::ApiError;
use crate::state::ConnectorState;

/// Proof that the request carried the session token.
///
/// Taking this as the first handler argument rejects the request before any
/// other extractor or the handler body runs.
#[derive(Debug, Clone, Copy)]
pub struct Authorized;

#[async_trait]
impl FromRequestParts<Arc<ConnectorState>> for Authorized {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ConnectorState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_bearer);

        match token {
            Some(token) if state.authorize(token) => Ok(Authorized),
            Some(_) => {
                tracing::warn!("Rejected request to {} with a wrong token", parts.uri.path());
                Err(ApiError::Unauthorized)
            }
            None => {
                tracing::debug!("Rejected request to {} without a token", parts.uri.path());
                Err(ApiError::Unauthorized)
            }
        }
    }
}
