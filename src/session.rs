//! Session context resolved once at bootstrap.
//!
//! The dashboards this crate was extracted from read `token`, `userId`, and
//! `userType` out of ambient storage wherever they happened to need them.
//! Here the session is an explicit value constructed by the caller and handed
//! to [`crate::client::HttpClient`]; nothing else in the crate reads ambient
//! state.

use serde::{Deserialize, Serialize};

/// The four portals of the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Coordinator,
    Lawyer,
    Client,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Admin => "admin",
            Self::Coordinator => "coordinator",
            Self::Lawyer => "lawyer",
            Self::Client => "client",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub role: Role,
    /// Bearer token; `None` when the deployment uses cookie sessions.
    pub token: Option<String>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}
