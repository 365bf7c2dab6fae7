//! Repository registry and vault errors

use super::NccError;

/// Creates a validation error
pub fn validation(message: impl Into<String>) -> NccError {
    NccError::Validation {
        message: message.into(),
    }
}

/// Creates a repository not found error
pub fn repository_not_found(name: impl Into<String>) -> NccError {
    NccError::NotFound {
        what: "Repository".to_string(),
        name: name.into(),
    }
}

/// Creates a repository already exists error
pub fn repository_exists(name: impl Into<String>) -> NccError {
    NccError::AlreadyExists {
        what: "Repository".to_string(),
        name: name.into(),
    }
}

/// Creates a credential not found error
pub fn credential_not_found(registry: impl Into<String>) -> NccError {
    NccError::NotFound {
        what: "Credential for registry".to_string(),
        name: registry.into(),
    }
}

/// Creates an authentication error
pub fn authentication(registry: impl Into<String>, reason: impl Into<String>) -> NccError {
    NccError::Authentication {
        registry: registry.into(),
        reason: reason.into(),
    }
}
