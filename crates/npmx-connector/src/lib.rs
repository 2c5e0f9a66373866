//! npmx-connector: Local bridge between the npmx web UI and the npm CLI
//!
//! The connector runs on the user's machine with their npm credentials. The
//! web UI queues privileged operations (org membership, teams, package
//! access), the user approves them, and the connector runs them in
//! dependency order, pausing when npm asks for a one-time password.

pub mod executor;
pub mod scheduler;
pub mod server;
pub mod state;
pub mod store;

pub use executor::{CommandExecutor, NpmExecutor, ReadQuery};
pub use state::ConnectorState;
pub use store::OperationStore;
