//! Core types for pagewalk

use serde::{Deserialize, Serialize};
use std::fmt;

/// How an identity proves itself to the console
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Credentials {
    /// Username/password submitted through the login form
    Password(String),
    /// Bearer token injected as a cookie
    Token(String),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Password(_) => f.write_str("Password(***)"),
            Credentials::Token(_) => f.write_str("Token(***)"),
        }
    }
}

/// An account the harness can act as
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub login: String,
    pub credentials: Credentials,
}

impl Identity {
    pub fn with_password(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            credentials: Credentials::Password(password.into()),
        }
    }

    pub fn with_token(login: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            credentials: Credentials::Token(token.into()),
        }
    }

    /// Logins are compared case-insensitively by the console
    pub fn is(&self, login: &str) -> bool {
        self.login.eq_ignore_ascii_case(login)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.login)
    }
}

/// Kinds of remote resources a fixture may create
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Storage,
    Folder,
    Pipeline,
    Tool,
    Run,
    User,
}

impl ResourceKind {
    /// Prefix used for generated names of this kind
    pub fn name_prefix(&self) -> &'static str {
        match self {
            ResourceKind::Storage => "storage",
            ResourceKind::Folder => "folder",
            ResourceKind::Pipeline => "pipeline",
            ResourceKind::Tool => "tool",
            ResourceKind::Run => "run",
            ResourceKind::User => "user",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name_prefix())
    }
}

/// A named remote resource owned by a fixture
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub name: String,
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_are_redacted_in_debug_output() {
        let id = Identity::with_password("admin", "s3cret");
        let rendered = format!("{:?}", id);
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("admin"));
    }

    #[test]
    fn identity_login_comparison_ignores_case() {
        let id = Identity::with_token("PIPE_ADMIN", "t");
        assert!(id.is("pipe_admin"));
        assert!(!id.is("pipe_user"));
    }
}
