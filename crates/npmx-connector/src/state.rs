//! Connector state shared by every request handler

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;

use npmx_core::api::ExecuteResponse;
use npmx_core::auth::{Session, SessionInfo};
use npmx_core::config::ConnectorConfig;
use npmx_core::operation::current_time_millis;
use npmx_core::ConnectorError;

use crate::executor::CommandExecutor;
use crate::scheduler;
use crate::store::OperationStore;

/// Everything one connector process owns: the session, the queued
/// operations and the executor that runs them
pub struct ConnectorState {
    /// Configuration
    pub config: ConnectorConfig,
    /// The local session and its token
    session: RwLock<Session>,
    /// Queued operations
    pub operations: OperationStore,
    /// npm executor
    pub executor: Arc<dyn CommandExecutor>,
    /// Held for the duration of a scheduler run
    execution: Mutex<()>,
}

impl ConnectorState {
    /// Create connector state with a freshly minted token
    pub fn new(config: ConnectorConfig, executor: Arc<dyn CommandExecutor>) -> Self {
        Self::with_session(config, executor, Session::new())
    }

    /// Create connector state around an existing session
    pub fn with_session(
        config: ConnectorConfig,
        executor: Arc<dyn CommandExecutor>,
        session: Session,
    ) -> Self {
        Self {
            config,
            session: RwLock::new(session),
            operations: OperationStore::new(),
            executor,
            execution: Mutex::new(()),
        }
    }

    /// The token the browser must present
    pub fn token(&self) -> String {
        self.session.read().token().to_string()
    }

    /// Check a bearer credential
    pub fn authorize(&self, provided: &str) -> bool {
        self.session.read().authorize(provided)
    }

    pub fn session_info(&self) -> SessionInfo {
        self.session.read().info()
    }

    /// Handshake: check the token, ask npm who is logged in, stamp the session
    pub async fn connect(&self, token: &str) -> Result<SessionInfo, ConnectorError> {
        if !self.authorize(token) {
            tracing::warn!("Rejected connect attempt with an invalid token");
            return Err(ConnectorError::Unauthorized);
        }

        let identity = self.executor.whoami().await;
        let mut session = self.session.write();
        session.mark_connected(identity, current_time_millis());

        tracing::info!(
            "Web UI connected as {}",
            session.identity.as_deref().unwrap_or("<not logged in>")
        );
        Ok(session.info())
    }

    /// Run the scheduler; only one run may be in flight
    pub async fn execute(&self, otp: Option<&str>) -> Result<ExecuteResponse, ConnectorError> {
        let _guard = self
            .execution
            .try_lock()
            .map_err(|_| ConnectorError::ExecutionInProgress)?;

        Ok(scheduler::run(&self.operations, self.executor.as_ref(), otp).await)
    }
}
