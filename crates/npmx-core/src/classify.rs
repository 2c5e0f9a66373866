//! Classification of npm error output
//!
//! A failed npm command is either waiting on a one-time password, blocked by
//! missing or expired credentials, or a plain failure. The phrase lists below
//! are data: each is checked in order with a case-insensitive substring match,
//! OTP first.

/// Phrases npm uses when a one-time password is required
pub const OTP_PATTERNS: &[&str] = &[
    "EOTP",
    "one-time password",
    "one time password",
    "This operation requires a one-time password",
    "--otp",
];

/// Phrases npm uses when the user is not (or no longer) logged in
pub const AUTH_FAILURE_PATTERNS: &[&str] = &[
    "E401",
    "ENEEDAUTH",
    "not logged in",
    "You must be logged in",
    "Unable to authenticate",
    "authentication token",
    "need auth",
];

/// Diagnostic shown in place of npm's output when an OTP is needed
pub const OTP_REQUIRED_MESSAGE: &str = "This operation requires a one-time password (OTP).";

/// Diagnostic shown in place of npm's output when credentials are rejected
pub const AUTH_FAILURE_MESSAGE: &str = "npm authentication failed. Run 'npm login' and try again.";

/// Line prefixes that carry no decision-relevant information
const NOISE_PREFIXES: &[&str] = &["npm warn", "npm notice"];

/// What a failed command's output says about the failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Retry with a one-time password
    OtpRequired,
    /// Log in again before retrying
    AuthFailure,
    /// Anything else
    Generic,
}

/// Classified form of a failed command's diagnostic output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub class: FailureClass,
    /// Text to surface to the caller
    pub message: String,
}

impl Diagnostic {
    pub fn requires_otp(&self) -> bool {
        self.class == FailureClass::OtpRequired
    }

    pub fn auth_failure(&self) -> bool {
        self.class == FailureClass::AuthFailure
    }
}

fn matches_any(haystack: &str, patterns: &[&str]) -> bool {
    patterns
        .iter()
        .any(|pattern| haystack.contains(&pattern.to_lowercase()))
}

/// Classify raw diagnostic text from a failed command
pub fn classify(raw: &str) -> Diagnostic {
    let lowered = raw.to_lowercase();

    if matches_any(&lowered, OTP_PATTERNS) {
        return Diagnostic {
            class: FailureClass::OtpRequired,
            message: OTP_REQUIRED_MESSAGE.to_string(),
        };
    }

    if matches_any(&lowered, AUTH_FAILURE_PATTERNS) {
        return Diagnostic {
            class: FailureClass::AuthFailure,
            message: AUTH_FAILURE_MESSAGE.to_string(),
        };
    }

    Diagnostic {
        class: FailureClass::Generic,
        message: filter_noise(raw),
    }
}

/// Drop informational warning lines and blank lines
pub fn filter_noise(raw: &str) -> String {
    raw.lines()
        .map(str::trim_end)
        .filter(|line| {
            let lowered = line.trim_start().to_lowercase();
            !lowered.is_empty() && !NOISE_PREFIXES.iter().any(|p| lowered.starts_with(p))
        })
        .collect::<Vec<_>>()
        .join("\n")
}
