//! App version numbering.
//!
//! Version `0` is the mutable draft every realtime edit targets. Positive
//! versions are immutable copies produced by release or snapshot. Two
//! negative sentinels are accepted on read paths and resolved against the
//! app row.

use crate::error::CoreError;
use crate::types::Version;

/// The mutable draft. All realtime writes land here.
pub const EDIT_VERSION: Version = 0;

/// Read sentinel: resolves to the app's mainline version.
pub const AUTO_MAINLINE_VERSION: Version = -1;

/// Read sentinel: resolves to the app's release version.
pub const AUTO_RELEASE_VERSION: Version = -2;

/// Resolve a requested read version against an app's version counters.
///
/// Sentinels are replaced by the matching counter. Any other negative value,
/// or a version above the mainline, is rejected.
pub fn resolve_version(
    requested: Version,
    mainline_version: Version,
    release_version: Version,
) -> Result<Version, CoreError> {
    match requested {
        AUTO_MAINLINE_VERSION => Ok(mainline_version),
        AUTO_RELEASE_VERSION => Ok(release_version),
        v if v < 0 => Err(CoreError::Validation(format!(
            "Invalid version {v}. Use 0 (edit), -1 (mainline), -2 (release) or a published version"
        ))),
        v if v > mainline_version => Err(CoreError::Validation(format!(
            "Version {v} has not been published (mainline is {mainline_version})"
        ))),
        v => Ok(v),
    }
}

/// The mainline version a release or snapshot will publish.
pub fn next_mainline(mainline_version: Version) -> Version {
    mainline_version + 1
}

/// Check the ordering invariant between the two app version counters.
pub fn validate_version_counters(
    mainline_version: Version,
    release_version: Version,
) -> Result<(), CoreError> {
    if release_version < 0 {
        return Err(CoreError::Validation(format!(
            "release version must be non-negative, got {release_version}"
        )));
    }
    if mainline_version < release_version {
        return Err(CoreError::Validation(format!(
            "mainline version {mainline_version} is behind release version {release_version}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_resolve_to_counters() {
        assert_eq!(resolve_version(AUTO_MAINLINE_VERSION, 7, 5).unwrap(), 7);
        assert_eq!(resolve_version(AUTO_RELEASE_VERSION, 7, 5).unwrap(), 5);
    }

    #[test]
    fn edit_and_published_versions_pass_through() {
        assert_eq!(resolve_version(EDIT_VERSION, 3, 3).unwrap(), 0);
        assert_eq!(resolve_version(2, 3, 3).unwrap(), 2);
        assert_eq!(resolve_version(3, 3, 3).unwrap(), 3);
    }

    #[test]
    fn unknown_negative_version_is_rejected() {
        let err = resolve_version(-3, 3, 3).unwrap_err();
        assert!(err.to_string().contains("-3"));
    }

    #[test]
    fn unpublished_version_is_rejected() {
        assert!(resolve_version(4, 3, 3).is_err());
    }

    #[test]
    fn next_mainline_increments() {
        assert_eq!(next_mainline(0), 1);
        assert_eq!(next_mainline(41), 42);
    }

    #[test]
    fn counter_invariant() {
        assert!(validate_version_counters(4, 4).is_ok());
        assert!(validate_version_counters(4, 2).is_ok());
        assert!(validate_version_counters(2, 4).is_err());
        assert!(validate_version_counters(0, -1).is_err());
    }
}
