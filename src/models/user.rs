//! Customer identity as reported by the admin API

use serde::{Deserialize, Serialize};

/// Customer attached to a conversation or ticket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUser {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl AdminUser {
    /// Presence key for this user: `id:<id>`, else `email:<lowercased>`.
    ///
    /// Returns `None` when the user carries neither, in which case no
    /// presence record can ever be found for them.
    pub fn presence_key(&self) -> Option<String> {
        if let Some(id) = self.id {
            return Some(format!("id:{}", id));
        }
        self.normalized_email()
            .map(|email| format!("email:{}", email))
    }

    /// Lowercased email, or `None` if absent or blank.
    pub fn normalized_email(&self) -> Option<String> {
        self.email
            .as_deref()
            .filter(|e| !e.is_empty())
            .map(str::to_lowercase)
    }

    /// Full name, else email, else "Unknown user".
    pub fn display_name(&self) -> String {
        self.full_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.email.as_deref().filter(|e| !e.is_empty()))
            .unwrap_or("Unknown user")
            .to_string()
    }
}
