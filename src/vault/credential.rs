//! Registry credentials

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// A value that must not reach logs or debug output
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret<T>(T);

impl<T> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl From<String> for Secret<String> {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Secret<String> {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credential {
    UsernamePassword {
        username: String,
        password: Secret<String>,
    },
    AccessToken {
        token: Secret<String>,
    },
}

impl Credential {
    pub fn username_password(username: impl Into<String>, password: impl Into<Secret<String>>) -> Self {
        Credential::UsernamePassword {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn access_token(token: impl Into<Secret<String>>) -> Self {
        Credential::AccessToken {
            token: token.into(),
        }
    }

    /// Value for an `Authorization` header
    pub fn authentication_material(&self) -> Secret<String> {
        match self {
            Credential::UsernamePassword { username, password } => {
                let pair = format!("{username}:{}", password.expose());
                Secret(format!("Basic {}", STANDARD.encode(pair)))
            }
            Credential::AccessToken { token } => Secret(format!("Bearer {}", token.expose())),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Credential::UsernamePassword { .. } => "username_password",
            Credential::AccessToken { .. } => "access_token",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_material() {
        let basic = Credential::username_password("alice", "s3cret");
        assert_eq!(basic.authentication_material().expose(), "Basic YWxpY2U6czNjcmV0");

        let bearer = Credential::access_token("tok123");
        assert_eq!(bearer.authentication_material().expose(), "Bearer tok123");
    }

    #[test]
    fn test_debug_hides_secrets() {
        let credential = Credential::username_password("alice", "s3cret");
        let shown = format!("{credential:?}");
        assert!(shown.contains("alice"));
        assert!(shown.contains("Secret(***)"));
        assert!(!shown.contains("s3cret"));
        assert!(!format!("{:?}", credential.authentication_material()).contains("Basic"));
    }

    #[test]
    fn test_tagged_encoding() {
        let credential = Credential::access_token("tok");
        let value = crate::serializer::to_value(&credential).unwrap();
        assert_eq!(value.get("type").and_then(|v| v.as_str()), Some("access_token"));
        assert_eq!(value.get("token").and_then(|v| v.as_str()), Some("tok"));

        let back: Credential = crate::serializer::from_value(value).unwrap();
        assert_eq!(back, credential);
    }
}
