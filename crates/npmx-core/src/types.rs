//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Diagnostic recorded on operations skipped because their predecessor failed
pub const DEPENDENCY_FAILED: &str = "Skipped: dependency failed";

/// Unique identifier for a queued operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Wrap an existing id string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for OperationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OperationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle status of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    /// Queued, waiting for human approval
    Pending,
    /// Approved, waiting for the scheduler
    Approved,
    /// Dispatched to the executor
    Running,
    /// Finished with exit code 0
    Completed,
    /// Finished with a non-zero exit code, or skipped
    Failed,
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationStatus::Pending => write!(f, "pending"),
            OperationStatus::Approved => write!(f, "approved"),
            OperationStatus::Running => write!(f, "running"),
            OperationStatus::Completed => write!(f, "completed"),
            OperationStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of one privileged command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    /// The command was rejected pending a one-time password
    pub requires_otp: bool,
    /// The npm credentials are missing or expired
    pub auth_failure: bool,
}

impl ExecutionResult {
    /// A generic failure with no OTP or auth classification
    pub fn failure(stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: 1,
            requires_otp: false,
            auth_failure: false,
        }
    }

    /// Result recorded for an operation whose predecessor failed
    pub fn dependency_failed() -> Self {
        Self::failure(DEPENDENCY_FAILED)
    }

    /// Exit code 0 means success regardless of the flags
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}
