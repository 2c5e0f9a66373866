//! Command execution boundary
//!
//! The scheduler and HTTP handlers talk to npm only through
//! [`CommandExecutor`], so tests can swap in a scripted executor. Executors
//! never touch the operation store; the scheduler records their results.

mod npm;
pub mod parse;

pub use npm::NpmExecutor;

use async_trait::async_trait;

use npmx_core::validate::{validate_name, validate_package_name, validate_scope_team};
use npmx_core::{ExecutionResult, NpmCommand, QueryError};

/// Read-only npm queries exposed to the web UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadQuery {
    /// `npm org ls <org> --json`
    OrgUsers { org: String },
    /// `npm team ls <org> --json`
    OrgTeams { org: String },
    /// `npm team ls <scope:team> --json`
    TeamUsers { scope_team: String },
    /// `npm access list collaborators <pkg> --json`
    PackageCollaborators { package: String },
}

impl ReadQuery {
    /// Reject arguments that are not valid npm names
    pub fn validate(&self) -> Result<(), QueryError> {
        let checked = match self {
            ReadQuery::OrgUsers { org } | ReadQuery::OrgTeams { org } => {
                validate_name("org", org)
            }
            ReadQuery::TeamUsers { scope_team } => validate_scope_team(scope_team),
            ReadQuery::PackageCollaborators { package } => validate_package_name(package),
        };
        checked.map_err(QueryError::InvalidArgument)
    }

    /// npm arguments for this query
    pub fn args(&self) -> Vec<String> {
        let args: Vec<&str> = match self {
            ReadQuery::OrgUsers { org } => vec!["org", "ls", org.as_str(), "--json"],
            ReadQuery::OrgTeams { org } => vec!["team", "ls", org.as_str(), "--json"],
            ReadQuery::TeamUsers { scope_team } => {
                vec!["team", "ls", scope_team.as_str(), "--json"]
            }
            ReadQuery::PackageCollaborators { package } => {
                vec!["access", "list", "collaborators", package.as_str(), "--json"]
            }
        };
        args.into_iter().map(String::from).collect()
    }
}

/// Runs privileged npm commands on behalf of the connector
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run one mutating command, passing the OTP through when given
    async fn execute(&self, command: &NpmCommand, otp: Option<&str>) -> ExecutionResult;

    /// npm username of the logged-in user, if any
    async fn whoami(&self) -> Option<String>;

    /// Run a read-only query and return its raw JSON output
    async fn query(&self, query: &ReadQuery) -> Result<String, QueryError>;
}
