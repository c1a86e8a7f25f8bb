//! Domain DTOs for the back-office API.
//!
//! # Design
//! The backend owns the shape of users, items and ledger records. The client
//! layer does not inspect them, so they travel as JSON values. `UserRecord` is
//! a transparent newtype only so the session layer can name what it stores.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque backend user object (id, email, name, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRecord(pub Value);

impl UserRecord {
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Convenience for logging.
    pub fn email(&self) -> Option<&str> {
        self.0.get("email").and_then(Value::as_str)
    }
}

/// Body of a successful login. Fields other than `user` are preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Login request payload.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Registration request payload.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest<'a> {
    pub email: &'a str,
    pub name: &'a str,
    pub password: &'a str,
}
