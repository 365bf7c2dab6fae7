//! Serializer and package file errors

use super::NccError;

/// Creates an encoding error naming the kind of value that was rejected
pub fn encoding(kind: impl Into<String>, message: impl Into<String>) -> NccError {
    NccError::Encoding {
        kind: kind.into(),
        message: message.into(),
    }
}

/// Creates a decoding error at the given byte offset
pub fn decoding(offset: usize, message: impl Into<String>) -> NccError {
    NccError::Decoding {
        offset,
        message: message.into(),
    }
}
