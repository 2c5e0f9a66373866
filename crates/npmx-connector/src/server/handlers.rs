//! Request handlers
//!
//! Handlers are thin: they check the bearer token, decode the request, call
//! into the store, scheduler or executor, and wrap the answer in the
//! envelope.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;

use npmx_core::api::{
    ApprovedCount, Collaborators, ConnectRequest, ExecuteRequest, ExecuteResponse,
    OperationQuery, OrgUsers, RemovedCount, StateResponse,
};
use npmx_core::auth::SessionInfo;
use npmx_core::validate::validate_otp;
use npmx_core::{NewOperation, Operation};

use super::auth::Authorized;
use super::error::{ok, ApiError, ApiResult};
use crate::executor::parse::{parse_collaborators, parse_name_list, parse_org_users};
use crate::executor::ReadQuery;
use crate::state::ConnectorState;

type AppState = State<Arc<ConnectorState>>;

pub async fn connect(
    State(state): AppState,
    payload: Result<Json<ConnectRequest>, JsonRejection>,
) -> ApiResult<SessionInfo> {
    let Json(request) = payload?;
    ok(state.connect(&request.token).await?)
}

pub async fn get_state(_: Authorized, State(state): AppState) -> ApiResult<StateResponse> {
    let session = state.session_info();
    ok(StateResponse {
        identity: session.identity,
        connected_at: session.connected_at,
        operations: state.operations.list(),
    })
}

pub async fn create_operation(
    _: Authorized,
    State(state): AppState,
    payload: Result<Json<NewOperation>, JsonRejection>,
) -> ApiResult<Operation> {
    let Json(request) = payload?;
    ok(state.operations.add(request)?)
}

pub async fn create_batch(
    _: Authorized,
    State(state): AppState,
    payload: Result<Json<Vec<NewOperation>>, JsonRejection>,
) -> ApiResult<Vec<Operation>> {
    let Json(requests) = payload?;
    ok(state.operations.add_batch(requests)?)
}

pub async fn approve(
    _: Authorized,
    State(state): AppState,
    query: Result<Query<OperationQuery>, QueryRejection>,
) -> ApiResult<Operation> {
    let Query(query) = query?;
    ok(state.operations.approve(&query.id)?)
}

pub async fn approve_all(_: Authorized, State(state): AppState) -> ApiResult<ApprovedCount> {
    let count = state.operations.approve_all();
    tracing::info!("Approved {} pending operations", count);
    ok(ApprovedCount { count })
}

pub async fn retry(
    _: Authorized,
    State(state): AppState,
    query: Result<Query<OperationQuery>, QueryRejection>,
) -> ApiResult<Operation> {
    let Query(query) = query?;
    ok(state.operations.retry(&query.id)?)
}

/// The body is optional; an empty body or empty OTP means "no OTP"
pub async fn execute(
    _: Authorized,
    State(state): AppState,
    body: Bytes,
) -> ApiResult<ExecuteResponse> {
    let request: ExecuteRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ExecuteRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))?
    };

    let otp = request
        .otp
        .as_deref()
        .map(str::trim)
        .filter(|otp| !otp.is_empty());
    if let Some(otp) = otp {
        validate_otp(otp).map_err(ApiError::BadRequest)?;
    }

    ok(state.execute(otp).await?)
}

pub async fn delete_operation(
    _: Authorized,
    State(state): AppState,
    query: Result<Query<OperationQuery>, QueryRejection>,
) -> ApiResult<Operation> {
    let Query(query) = query?;
    ok(state.operations.remove(&query.id)?)
}

pub async fn delete_all(_: Authorized, State(state): AppState) -> ApiResult<RemovedCount> {
    let removed = state.operations.remove_all();
    tracing::info!("Removed {} operations", removed);
    ok(RemovedCount { removed })
}

async fn run_query(state: &ConnectorState, query: ReadQuery) -> Result<String, ApiError> {
    query.validate()?;
    Ok(state.executor.query(&query).await?)
}

pub async fn org_users(
    _: Authorized,
    State(state): AppState,
    Path(org): Path<String>,
) -> ApiResult<OrgUsers> {
    let stdout = run_query(&state, ReadQuery::OrgUsers { org }).await?;
    ok(parse_org_users(&stdout)?)
}

pub async fn org_teams(
    _: Authorized,
    State(state): AppState,
    Path(org): Path<String>,
) -> ApiResult<Vec<String>> {
    let stdout = run_query(&state, ReadQuery::OrgTeams { org }).await?;
    ok(parse_name_list(&stdout)?)
}

pub async fn team_users(
    _: Authorized,
    State(state): AppState,
    Path(scope_team): Path<String>,
) -> ApiResult<Vec<String>> {
    let stdout = run_query(&state, ReadQuery::TeamUsers { scope_team }).await?;
    ok(parse_name_list(&stdout)?)
}

pub async fn package_collaborators(
    _: Authorized,
    State(state): AppState,
    Path(package): Path<String>,
) -> ApiResult<Collaborators> {
    let stdout = run_query(&state, ReadQuery::PackageCollaborators { package }).await?;
    ok(parse_collaborators(&stdout)?)
}
