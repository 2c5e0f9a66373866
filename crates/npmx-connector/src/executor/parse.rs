//! Parsing of `npm ... --json` output for the read-only queries

use serde::de::DeserializeOwned;

use npmx_core::api::{Collaborators, OrgUsers};
use npmx_core::QueryError;

fn parse_json<T: DeserializeOwned + Default>(stdout: &str) -> Result<T, QueryError> {
    let trimmed = stdout.trim();
    // npm prints nothing at all for some empty listings
    if trimmed.is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(trimmed).map_err(|e| QueryError::Parse(e.to_string()))
}

/// `npm org ls <org> --json`: `{"alice": "owner", ...}`
pub fn parse_org_users(stdout: &str) -> Result<OrgUsers, QueryError> {
    parse_json(stdout)
}

/// `npm team ls <org|scope:team> --json`: `["acme:devs", ...]` or `["alice", ...]`
pub fn parse_name_list(stdout: &str) -> Result<Vec<String>, QueryError> {
    let mut names: Vec<String> = parse_json(stdout)?;
    names.sort();
    Ok(names)
}

/// `npm access list collaborators <pkg> --json`: `{"alice": "read-write", ...}`
pub fn parse_collaborators(stdout: &str) -> Result<Collaborators, QueryError> {
    parse_json(stdout)
}
