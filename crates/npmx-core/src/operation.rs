//! Operation records and their state machine
//!
//! ```text
//! pending -> approved -> running -> completed
//!               ^                \-> failed
//!               \____ retry ________/
//! ```
//!
//! Only the scheduler moves an operation into or out of `running`; every
//! other edge is driven by an explicit approve, retry or delete request.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::command::{NpmCommand, OperationKind};
use crate::error::OperationError;
use crate::types::{ExecutionResult, OperationId, OperationStatus};

/// Milliseconds since the UNIX epoch
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A request to queue one operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOperation {
    pub kind: OperationKind,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub depends_on: Option<OperationId>,
}

/// One queued privileged action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub id: OperationId,
    pub kind: OperationKind,
    pub params: BTreeMap<String, String>,
    /// Human-readable summary for the approval UI
    pub description: String,
    /// The command line as shown to the user
    pub command: String,
    pub status: OperationStatus,
    pub created_at: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<OperationId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ExecutionResult>,
}

impl Operation {
    /// Validate a request and build a `pending` operation from it
    pub fn create(request: NewOperation) -> Result<Self, OperationError> {
        NpmCommand::from_params(request.kind, &request.params)?;

        Ok(Self {
            id: OperationId::generate(),
            kind: request.kind,
            params: request.params,
            description: request.description,
            command: request.command,
            status: OperationStatus::Pending,
            created_at: current_time_millis(),
            depends_on: request.depends_on,
            result: None,
        })
    }

    /// The typed npm command this operation runs
    pub fn npm_command(&self) -> Result<NpmCommand, OperationError> {
        NpmCommand::from_params(self.kind, &self.params)
    }

    fn require(&self, action: &'static str, from: OperationStatus) -> Result<(), OperationError> {
        if self.status == from {
            Ok(())
        } else {
            Err(OperationError::InvalidTransition {
                id: self.id.clone(),
                action,
                status: self.status,
            })
        }
    }

    /// `pending -> approved`
    pub fn approve(&mut self) -> Result<(), OperationError> {
        self.require("approve", OperationStatus::Pending)?;
        self.status = OperationStatus::Approved;
        Ok(())
    }

    /// `failed -> approved`, discarding the previous result
    pub fn retry(&mut self) -> Result<(), OperationError> {
        self.require("retry", OperationStatus::Failed)?;
        self.status = OperationStatus::Approved;
        self.result = None;
        Ok(())
    }

    /// `approved -> running`
    pub fn start(&mut self) -> Result<(), OperationError> {
        self.require("start", OperationStatus::Approved)?;
        self.status = OperationStatus::Running;
        Ok(())
    }

    /// `running -> completed | failed`, depending on the exit code
    pub fn finish(&mut self, result: ExecutionResult) -> Result<(), OperationError> {
        self.require("finish", OperationStatus::Running)?;
        self.status = if result.is_success() {
            OperationStatus::Completed
        } else {
            OperationStatus::Failed
        };
        self.result = Some(result);
        Ok(())
    }

    /// `approved -> failed` without running, because the predecessor failed
    pub fn skip(&mut self) -> Result<(), OperationError> {
        self.require("skip", OperationStatus::Approved)?;
        self.status = OperationStatus::Failed;
        self.result = Some(ExecutionResult::dependency_failed());
        Ok(())
    }

    /// Whether the operation may be removed from the store
    pub fn is_deletable(&self) -> bool {
        self.status != OperationStatus::Running
    }
}
