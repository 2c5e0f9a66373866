//! Connector session token
//!
//! The connector mints a random token on startup and prints it once. The
//! browser hands it back on `/connect` and then presents it as a bearer
//! credential on every other request. The token lives only in memory and is
//! never rotated while the process runs.
//!
//! - Token is 32 bytes of random data, hex-encoded (64 chars)
//! - Comparison is constant-time over equal-length inputs

use serde::Serialize;

/// Length of the session token in bytes (before hex encoding)
const TOKEN_BYTES: usize = 32;

/// Generate a new random session token
///
/// Returns a 64-character hex string (32 random bytes)
pub fn generate_token() -> String {
    use rand::Rng;
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// Validate a presented token against the minted one
pub fn validate_token(provided: &str, expected: &str) -> bool {
    if provided.len() != expected.len() {
        return false;
    }

    let mut result = 0u8;
    for (a, b) in provided.bytes().zip(expected.bytes()) {
        result |= a ^ b;
    }
    result == 0
}

/// Extract the credential from an `Authorization: Bearer <token>` value
pub fn parse_bearer(header: &str) -> Option<&str> {
    // The scheme name is case-insensitive
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// The single local session served by this connector
#[derive(Debug, Clone)]
pub struct Session {
    token: String,
    /// Last successful `/connect`, in ms since the epoch
    pub connected_at: Option<u64>,
    /// npm username reported at the last `/connect`
    pub identity: Option<String>,
}

/// What `/connect` and `/state` report about the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub identity: Option<String>,
    pub connected_at: Option<u64>,
}

impl Session {
    /// Start a session with a freshly minted token
    pub fn new() -> Self {
        Self::with_token(generate_token())
    }

    /// Start a session with a known token
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            connected_at: None,
            identity: None,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Check a presented credential against this session's token
    pub fn authorize(&self, provided: &str) -> bool {
        validate_token(provided, &self.token)
    }

    /// Record a successful handshake
    pub fn mark_connected(&mut self, identity: Option<String>, at: u64) {
        self.identity = identity;
        self.connected_at = Some(at);
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            identity: self.identity.clone(),
            connected_at: self.connected_at,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
