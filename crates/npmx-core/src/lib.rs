//! npmx-core: Core types and rules for the npmx connector
//!
//! This crate provides the operation model and its state machine, the typed
//! npm command set with argument validation, npm error classification, the
//! session token, configuration, and the HTTP wire types shared by the
//! connector and its clients.

pub mod api;
pub mod auth;
pub mod classify;
pub mod command;
pub mod config;
pub mod error;
pub mod operation;
pub mod types;
pub mod validate;

pub use command::{NpmCommand, OperationKind};
pub use error::{ConnectorError, OperationError, QueryError};
pub use operation::{NewOperation, Operation};
pub use types::{ExecutionResult, OperationId, OperationStatus};
