//! Execution unit errors

use super::NccError;

/// Creates an operation error
pub fn operation(message: impl Into<String>) -> NccError {
    NccError::Operation {
        message: message.into(),
    }
}

/// Creates a timeout error for a unit
pub fn timeout(unit: impl Into<String>, seconds: u64) -> NccError {
    NccError::Timeout {
        unit: unit.into(),
        seconds,
    }
}

/// Creates an execution unit not found error
pub fn unit_not_found(name: impl Into<String>) -> NccError {
    NccError::NotFound {
        what: "Execution unit".to_string(),
        name: name.into(),
    }
}
