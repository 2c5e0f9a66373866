//! HTTP wire types shared by the connector and its clients
//!
//! Every response is wrapped in the same envelope:
//! `{"success": true, "data": ...}` or `{"success": false, "error": "..."}`.
//! Field names are camelCase to match the web UI.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::command::{AccessLevel, OrgRole};
use crate::operation::Operation;
use crate::types::{ExecutionResult, OperationId};

/// Uniform response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// `POST /connect` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectRequest {
    pub token: String,
}

/// `GET /state` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateResponse {
    pub identity: Option<String>,
    pub connected_at: Option<u64>,
    pub operations: Vec<Operation>,
}

/// `?id=` query for single-operation actions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationQuery {
    pub id: OperationId,
}

/// `POST /execute` body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteRequest {
    #[serde(default)]
    pub otp: Option<String>,
}

/// Result of one operation touched by an execute call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    pub id: OperationId,
    pub result: ExecutionResult,
}

/// `POST /execute` payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResponse {
    pub results: Vec<OperationOutcome>,
    /// A command asked for a one-time password that was not supplied
    pub otp_required: bool,
    /// A command was rejected because npm credentials are missing or expired
    pub auth_failure: bool,
}

/// `POST /approve-all` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovedCount {
    pub count: usize,
}

/// `DELETE /operations/all` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovedCount {
    pub removed: usize,
}

/// `GET /org/:org/users`: username to role
pub type OrgUsers = BTreeMap<String, OrgRole>;

/// `GET /package/:pkg/collaborators`: username to access level
pub type Collaborators = BTreeMap<String, AccessLevel>;
