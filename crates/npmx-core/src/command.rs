//! Operation kinds and their typed npm commands
//!
//! Operations arrive from the browser as a kind string plus a flat map of
//! string parameters. [`NpmCommand::from_params`] turns that pair into a
//! typed command, checking every value on the way, so the executor only ever
//! sees well-formed arguments.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::OperationError;
use crate::validate::{validate_name, validate_package_name, validate_scope_team};

/// The closed set of privileged verbs the connector will run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    #[serde(rename = "org:add-user")]
    OrgAddUser,
    #[serde(rename = "org:rm-user")]
    OrgRemoveUser,
    #[serde(rename = "team:create")]
    TeamCreate,
    #[serde(rename = "team:destroy")]
    TeamDestroy,
    #[serde(rename = "team:add-user")]
    TeamAddUser,
    #[serde(rename = "team:rm-user")]
    TeamRemoveUser,
    #[serde(rename = "access:grant")]
    AccessGrant,
    #[serde(rename = "access:revoke")]
    AccessRevoke,
    #[serde(rename = "owner:add")]
    OwnerAdd,
    #[serde(rename = "owner:rm")]
    OwnerRemove,
    #[serde(rename = "package:init")]
    PackageInit,
}

impl OperationKind {
    /// Wire name of the kind
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::OrgAddUser => "org:add-user",
            OperationKind::OrgRemoveUser => "org:rm-user",
            OperationKind::TeamCreate => "team:create",
            OperationKind::TeamDestroy => "team:destroy",
            OperationKind::TeamAddUser => "team:add-user",
            OperationKind::TeamRemoveUser => "team:rm-user",
            OperationKind::AccessGrant => "access:grant",
            OperationKind::AccessRevoke => "access:revoke",
            OperationKind::OwnerAdd => "owner:add",
            OperationKind::OwnerRemove => "owner:rm",
            OperationKind::PackageInit => "package:init",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of a member inside an npm organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrgRole {
    Developer,
    Admin,
    Owner,
}

impl OrgRole {
    pub fn as_str(self) -> &'static str {
        match self {
            OrgRole::Developer => "developer",
            OrgRole::Admin => "admin",
            OrgRole::Owner => "owner",
        }
    }
}

impl FromStr for OrgRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "developer" => Ok(OrgRole::Developer),
            "admin" => Ok(OrgRole::Admin),
            "owner" => Ok(OrgRole::Owner),
            other => Err(format!("invalid role {:?}", other)),
        }
    }
}

/// Package access level granted to a team or collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessLevel {
    ReadOnly,
    ReadWrite,
}

impl AccessLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            AccessLevel::ReadOnly => "read-only",
            AccessLevel::ReadWrite => "read-write",
        }
    }
}

impl FromStr for AccessLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read-only" => Ok(AccessLevel::ReadOnly),
            "read-write" => Ok(AccessLevel::ReadWrite),
            other => Err(format!("invalid permission {:?}", other)),
        }
    }
}

/// A validated npm command, one variant per [`OperationKind`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NpmCommand {
    OrgAddUser { org: String, user: String, role: OrgRole },
    OrgRemoveUser { org: String, user: String },
    TeamCreate { scope_team: String },
    TeamDestroy { scope_team: String },
    TeamAddUser { scope_team: String, user: String },
    TeamRemoveUser { scope_team: String, user: String },
    AccessGrant { permission: AccessLevel, scope_team: String, package: String },
    AccessRevoke { scope_team: String, package: String },
    OwnerAdd { user: String, package: String },
    OwnerRemove { user: String, package: String },
    PackageInit { name: String, author: Option<String> },
}

impl NpmCommand {
    /// Build a typed command from an operation's kind and parameters
    pub fn from_params(
        kind: OperationKind,
        params: &BTreeMap<String, String>,
    ) -> Result<Self, OperationError> {
        let p = Params(params);
        let command = match kind {
            OperationKind::OrgAddUser => NpmCommand::OrgAddUser {
                org: p.org()?,
                user: p.user()?,
                role: p.parsed("role")?,
            },
            OperationKind::OrgRemoveUser => NpmCommand::OrgRemoveUser {
                org: p.org()?,
                user: p.user()?,
            },
            OperationKind::TeamCreate => NpmCommand::TeamCreate {
                scope_team: p.scope_team()?,
            },
            OperationKind::TeamDestroy => NpmCommand::TeamDestroy {
                scope_team: p.scope_team()?,
            },
            OperationKind::TeamAddUser => NpmCommand::TeamAddUser {
                scope_team: p.scope_team()?,
                user: p.user()?,
            },
            OperationKind::TeamRemoveUser => NpmCommand::TeamRemoveUser {
                scope_team: p.scope_team()?,
                user: p.user()?,
            },
            OperationKind::AccessGrant => NpmCommand::AccessGrant {
                permission: p.parsed("permission")?,
                scope_team: p.scope_team()?,
                package: p.package("pkg")?,
            },
            OperationKind::AccessRevoke => NpmCommand::AccessRevoke {
                scope_team: p.scope_team()?,
                package: p.package("pkg")?,
            },
            OperationKind::OwnerAdd => NpmCommand::OwnerAdd {
                user: p.user()?,
                package: p.package("pkg")?,
            },
            OperationKind::OwnerRemove => NpmCommand::OwnerRemove {
                user: p.user()?,
                package: p.package("pkg")?,
            },
            OperationKind::PackageInit => NpmCommand::PackageInit {
                name: p.package("name")?,
                author: match params.get("author") {
                    Some(author) => {
                        validate_name("author", author).map_err(OperationError::InvalidParams)?;
                        Some(author.clone())
                    }
                    None => None,
                },
            },
        };
        Ok(command)
    }

    /// The operation kind this command was built from
    pub fn kind(&self) -> OperationKind {
        match self {
            NpmCommand::OrgAddUser { .. } => OperationKind::OrgAddUser,
            NpmCommand::OrgRemoveUser { .. } => OperationKind::OrgRemoveUser,
            NpmCommand::TeamCreate { .. } => OperationKind::TeamCreate,
            NpmCommand::TeamDestroy { .. } => OperationKind::TeamDestroy,
            NpmCommand::TeamAddUser { .. } => OperationKind::TeamAddUser,
            NpmCommand::TeamRemoveUser { .. } => OperationKind::TeamRemoveUser,
            NpmCommand::AccessGrant { .. } => OperationKind::AccessGrant,
            NpmCommand::AccessRevoke { .. } => OperationKind::AccessRevoke,
            NpmCommand::OwnerAdd { .. } => OperationKind::OwnerAdd,
            NpmCommand::OwnerRemove { .. } => OperationKind::OwnerRemove,
            NpmCommand::PackageInit { .. } => OperationKind::PackageInit,
        }
    }

    /// npm arguments for this command, without the OTP flag.
    ///
    /// `package:init` publishes from a scratch directory; its arguments are
    /// the publish step only.
    pub fn args(&self) -> Vec<String> {
        let args: Vec<&str> = match self {
            NpmCommand::OrgAddUser { org, user, role } => {
                vec!["org", "set", org.as_str(), user.as_str(), role.as_str()]
            }
            NpmCommand::OrgRemoveUser { org, user } => {
                vec!["org", "rm", org.as_str(), user.as_str()]
            }
            NpmCommand::TeamCreate { scope_team } => vec!["team", "create", scope_team.as_str()],
            NpmCommand::TeamDestroy { scope_team } => vec!["team", "destroy", scope_team.as_str()],
            NpmCommand::TeamAddUser { scope_team, user } => {
                vec!["team", "add", scope_team.as_str(), user.as_str()]
            }
            NpmCommand::TeamRemoveUser { scope_team, user } => {
                vec!["team", "rm", scope_team.as_str(), user.as_str()]
            }
            NpmCommand::AccessGrant {
                permission,
                scope_team,
                package,
            } => vec![
                "access",
                "grant",
                permission.as_str(),
                scope_team.as_str(),
                package.as_str(),
            ],
            NpmCommand::AccessRevoke {
                scope_team,
                package,
            } => vec!["access", "revoke", scope_team.as_str(), package.as_str()],
            NpmCommand::OwnerAdd { user, package } => {
                vec!["owner", "add", user.as_str(), package.as_str()]
            }
            NpmCommand::OwnerRemove { user, package } => {
                vec!["owner", "rm", user.as_str(), package.as_str()]
            }
            NpmCommand::PackageInit { .. } => vec!["publish", "--access", "public"],
        };
        args.into_iter().map(String::from).collect()
    }
}

/// Accessor over the raw parameter map that reports missing keys
struct Params<'a>(&'a BTreeMap<String, String>);

impl Params<'_> {
    fn required(&self, key: &str) -> Result<&str, OperationError> {
        self.0
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| OperationError::InvalidParams(format!("missing parameter {:?}", key)))
    }

    fn parsed<T: FromStr<Err = String>>(&self, key: &str) -> Result<T, OperationError> {
        self.required(key)?
            .parse()
            .map_err(OperationError::InvalidParams)
    }

    fn checked(
        &self,
        key: &str,
        check: impl Fn(&str) -> Result<(), String>,
    ) -> Result<String, OperationError> {
        let value = self.required(key)?;
        check(value).map_err(OperationError::InvalidParams)?;
        Ok(value.to_string())
    }

    fn org(&self) -> Result<String, OperationError> {
        self.checked("org", |v| validate_name("org", v))
    }

    fn user(&self) -> Result<String, OperationError> {
        self.checked("user", |v| validate_name("user", v))
    }

    fn scope_team(&self) -> Result<String, OperationError> {
        self.checked("scopeTeam", validate_scope_team)
    }

    fn package(&self, key: &str) -> Result<String, OperationError> {
        self.checked(key, validate_package_name)
    }
}
