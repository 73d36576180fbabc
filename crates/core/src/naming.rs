//! Name rules for apps, actions, and component display names.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;

/// Maximum length of an app or action name.
pub const MAX_NAME_LEN: usize = 128;

/// Display names double as identifiers in client-side expressions, so they
/// follow identifier syntax.
const DISPLAY_NAME_PATTERN: &str = r"^[A-Za-z_$][A-Za-z0-9_$]*$";

static DISPLAY_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DISPLAY_NAME_PATTERN).expect("valid regex"));

/// Validate a component or action display name.
pub fn validate_display_name(name: &str) -> Result<(), CoreError> {
    if name.len() > MAX_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "Display name exceeds {MAX_NAME_LEN} characters"
        )));
    }
    if !DISPLAY_NAME_RE.is_match(name) {
        return Err(CoreError::Validation(format!(
            "Invalid display name '{name}'"
        )));
    }
    Ok(())
}

/// Validate a human-facing app name.
pub fn validate_app_name(name: &str) -> Result<(), CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("App name must not be empty".into()));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "App name exceeds {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}
