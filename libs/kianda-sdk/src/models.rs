use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ApiError;

/// Portal role, as reported in the user object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    Teacher,
    Parent,
    Student,
    Other(String),
}

impl Role {
    /// Route the portal lands on after login for this role.
    #[must_use]
    pub fn dashboard_path(&self) -> &'static str {
        match self {
            Self::Admin => "/admin/dashboard",
            Self::Teacher => "/teacher/dashboard",
            Self::Parent => "/parent/dashboard",
            Self::Student | Self::Other(_) => "/dashboard",
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Admin => "admin",
            Self::Teacher => "teacher",
            Self::Parent => "parent",
            Self::Student => "student",
            Self::Other(other) => other,
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            "admin" => Self::Admin,
            "teacher" => Self::Teacher,
            "parent" => Self::Parent,
            "student" => Self::Student,
            _ => Self::Other(value),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Other(other) => other,
            known => known.as_str().to_owned(),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The logged-in user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: u64,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Fields this client does not model.
    pub extra: Map<String, Value>,
}

impl User {
    /// Landing route for this user's role (`/dashboard` without a role).
    #[must_use]
    pub fn dashboard_path(&self) -> &'static str {
        self.role.as_ref().map_or("/dashboard", Role::dashboard_path)
    }

    #[must_use]
    pub fn display_name(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if name.is_empty() {
            self.email.clone().unwrap_or_else(|| format!("user {}", self.id))
        } else {
            name
        }
    }
}

/// User object as the API sends it; `id` is validated separately so a
/// missing id is reported as such rather than as a decode error.
#[derive(Debug, Deserialize)]
pub struct UserPayload {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    role: Option<Role>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl UserPayload {
    pub(crate) fn into_user(self, context: &'static str) -> Result<User, ApiError> {
        let id = self.id.ok_or(ApiError::MissingUserId(context))?;
        Ok(User {
            id,
            email: self.email,
            role: self.role,
            first_name: self.first_name,
            last_name: self.last_name,
            extra: self.extra,
        })
    }
}

/// Editable profile fields; unknown fields round-trip through `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
