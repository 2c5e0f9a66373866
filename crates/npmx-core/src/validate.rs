//! Argument validation for values passed to the npm CLI
//!
//! Every operation parameter ends up as an argument of a process that runs
//! with the user's npm credentials. Values are checked against npm's naming
//! rules so that nothing can be smuggled in as an extra flag.

/// npm's limit for package and user names
const MAX_NAME_LEN: usize = 214;

/// Validate an npm username or organization name
pub fn validate_name(kind: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{} must not be empty", kind));
    }
    if value.len() > MAX_NAME_LEN {
        return Err(format!("{} is too long", kind));
    }
    let mut chars = value.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if !first_ok || !rest_ok {
        return Err(format!("invalid {}: {:?}", kind, value));
    }
    Ok(())
}

/// Validate a `scope:team` (or `@scope:team`) identifier
pub fn validate_scope_team(value: &str) -> Result<(), String> {
    let trimmed = value.strip_prefix('@').unwrap_or(value);
    let Some((scope, team)) = trimmed.split_once(':') else {
        return Err(format!("invalid team {:?}: expected scope:team", value));
    };
    validate_name("scope", scope)?;
    validate_name("team", team)
}

/// Validate an npm package name, scoped or not
pub fn validate_package_name(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err("package name must not be empty".to_string());
    }
    if value.len() > MAX_NAME_LEN {
        return Err("package name is too long".to_string());
    }

    let name = match value.strip_prefix('@') {
        Some(scoped) => {
            let Some((scope, name)) = scoped.split_once('/') else {
                return Err(format!("invalid package name {:?}: missing '/'", value));
            };
            check_package_segment(value, scope)?;
            name
        }
        None => value,
    };
    check_package_segment(value, name)
}

fn check_package_segment(full: &str, segment: &str) -> Result<(), String> {
    let valid = !segment.is_empty()
        && !segment.starts_with(['.', '_', '-'])
        && segment.chars().all(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '.' | '_' | '~')
        });
    if valid {
        Ok(())
    } else {
        Err(format!("invalid package name {:?}", full))
    }
}

/// Validate a one-time password: 6 to 8 ASCII digits
pub fn validate_otp(value: &str) -> Result<(), String> {
    if (6..=8).contains(&value.len()) && value.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err("OTP must be 6 to 8 digits".to_string())
    }
}
