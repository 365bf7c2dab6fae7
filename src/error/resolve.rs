//! Resolver and installer errors

use super::NccError;

/// Creates a circular dependency error from the packages on the cycle
pub fn circular(cycle: &[String]) -> NccError {
    NccError::CyclicDependency {
        chain: cycle.join(" -> "),
    }
}

/// Creates an unresolvable dependency error listing every requirer
pub fn unresolvable(package: impl Into<String>, requirers: &[(String, String)]) -> NccError {
    let requirers = requirers
        .iter()
        .map(|(requirer, constraint)| format!("{requirer} requires {constraint}"))
        .collect::<Vec<_>>()
        .join("; ");
    NccError::UnresolvableDependency {
        package: package.into(),
        requirers,
    }
}

/// Creates a package not found error
pub fn package_not_found(package: impl Into<String>) -> NccError {
    NccError::NotFound {
        what: "Package".to_string(),
        name: package.into(),
    }
}

/// Creates a fetch error
pub fn fetch_failed(package: impl Into<String>, attempts: u32, reason: impl Into<String>) -> NccError {
    NccError::Fetch {
        package: package.into(),
        attempts,
        reason: reason.into(),
    }
}

/// Creates an integrity error
pub fn integrity(
    package: impl Into<String>,
    expected: impl Into<String>,
    actual: impl Into<String>,
) -> NccError {
    NccError::Integrity {
        package: package.into(),
        expected: expected.into(),
        actual: actual.into(),
    }
}

/// Creates the error reported when an operation was cancelled
pub fn cancelled() -> NccError {
    NccError::Operation {
        message: "cancelled".to_string(),
    }
}
