//! Target names (machine hostnames, user principals) double as cache file
//! names, so they must be a single, visible path component. Hidden names are
//! reserved for the cache's own temporary files.

use crate::error::ValidationError;

/// Check that `name` is usable as a cache file name.
pub fn validate_target_name(name: &str) -> Result<(), ValidationError> {
    let reason = if name.is_empty() {
        "must be non-empty"
    } else if name.starts_with('.') {
        "starts with a dot"
    } else if name.contains('/') || name.contains('\\') {
        "contains a path separator"
    } else if name.contains('\0') {
        "contains a NUL byte"
    } else {
        return Ok(());
    };
    Err(ValidationError::InvalidTargetName {
        name: name.to_string(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_hostnames_and_principals() {
        assert!(validate_target_name("ws-042").is_ok());
        assert!(validate_target_name("alice@EXAMPLE.COM").is_ok());
        assert!(validate_target_name("host.example.com").is_ok());
    }

    #[test]
    fn rejects_unsafe_names() {
        for bad in ["", ".", "..", ".hidden", "a/b", "x\\y", "nul\0byte"] {
            assert!(
                matches!(
                    validate_target_name(bad),
                    Err(ValidationError::InvalidTargetName { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
    }
}
