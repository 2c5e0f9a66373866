//! Core error types for the npmx connector

use std::path::PathBuf;
use thiserror::Error;

use crate::types::{OperationId, OperationStatus};

/// Top-level error type for the connector
#[derive(Error, Debug)]
pub enum ConnectorError {
    /// Missing or mismatched bearer token
    #[error("Unauthorized")]
    Unauthorized,

    /// Operation error
    #[error(transparent)]
    Operation(#[from] OperationError),

    /// Read-only query error
    #[error(transparent)]
    Query(#[from] QueryError),

    /// A scheduler run is already in flight
    #[error("Execution already in progress")]
    ExecutionInProgress,
}

/// Operation store and state machine errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// No operation with this id
    #[error("Operation not found: {0}")]
    NotFound(OperationId),

    /// The operation is not in the state the action requires
    #[error("Cannot {action} operation {id}: status is {status}")]
    InvalidTransition {
        id: OperationId,
        action: &'static str,
        status: OperationStatus,
    },

    /// Running operations cannot be removed
    #[error("Cannot delete operation {0} while it is running")]
    Running(OperationId),

    /// Parameters do not fit the operation kind
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),
}

/// Errors from the read-only query collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The query argument failed validation
    #[error("Invalid query argument: {0}")]
    InvalidArgument(String),

    /// The command exited unsuccessfully
    #[error("{0}")]
    Failed(String),

    /// The command output could not be parsed
    #[error("Failed to parse npm output: {0}")]
    Parse(String),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
}
