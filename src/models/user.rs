use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default, skip_serializing)]
    pub email_verification_token: Option<String>,
    #[serde(default, skip_serializing)]
    pub password_reset_token: Option<String>,
    #[serde(default)]
    pub password_reset_expires: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields a caller supplies when inserting a user. Everything else is
/// assigned by the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateUserData {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    #[serde(default)]
    pub email_verification_token: Option<String>,
}

/// Partial patch over a [`User`]. `None` means "leave as is".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateUserData {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password_hash: Option<String>,
    pub email_verified: Option<bool>,
    pub email_verification_token: Option<String>,
    pub password_reset_token: Option<String>,
    pub password_reset_expires: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    /// The row the database produces for `data` with server defaults filled in.
    pub fn from_create(data: CreateUserData, id: Uuid, now: DateTime<Utc>) -> Self {
        User {
            id,
            email: data.email,
            name: data.name,
            password_hash: data.password_hash,
            email_verified: false,
            email_verification_token: data.email_verification_token,
            password_reset_token: None,
            password_reset_expires: None,
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl UpdateUserData {
    pub fn is_empty(&self) -> bool {
        *self == UpdateUserData::default()
    }

    /// Write every supplied field onto `user`. `id` and `created_at` are
    /// not patchable.
    pub fn apply_to(&self, user: &mut User) {
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(name) = &self.name {
            user.name = name.clone();
        }
        if let Some(hash) = &self.password_hash {
            user.password_hash = hash.clone();
        }
        if let Some(verified) = self.email_verified {
            user.email_verified = verified;
        }
        if let Some(token) = &self.email_verification_token {
            user.email_verification_token = Some(token.clone());
        }
        if let Some(token) = &self.password_reset_token {
            user.password_reset_token = Some(token.clone());
        }
        if let Some(expires) = self.password_reset_expires {
            user.password_reset_expires = Some(expires);
        }
        if let Some(at) = self.last_login {
            user.last_login = Some(at);
        }
        if let Some(at) = self.updated_at {
            user.updated_at = at;
        }
    }
}
