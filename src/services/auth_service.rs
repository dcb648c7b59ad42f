//! Domain service for authentication.
//!
//! Owns the login state machine: credential checks, the failed-attempt
//! lockout policy, and access-token issuance.

use serde::Serialize;
use thiserror::Error;

use crate::db::Account;

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Pre-condition failure (malformed email, short password). Raised
    /// before any account lookup so it never leaks account existence.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Unknown account and wrong password are indistinguishable on purpose.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account temporarily locked")]
    AccountLocked,

    #[error("Account not found")]
    AccountNotFound,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Account summary DTO for responses. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub id: i32,
    pub email: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: String,
    pub last_login: Option<String>,
}

impl From<Account> for AccountSummary {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            email: account.email,
            role: account.role,
            is_active: account.is_active,
            created_at: account.created_at,
            last_login: account.last_login,
        }
    }
}

/// Successful login: a signed access token plus the account summary.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub token: String,
    pub user: AccountSummary,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Runs the full login state machine.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] on malformed input,
    /// [`AuthError::InvalidCredentials`] for unknown accounts or wrong
    /// passwords, and [`AuthError::AccountLocked`] while a lockout window is
    /// open.
    async fn login(&self, email: &str, password: &str) -> Result<LoginResult, AuthError>;

    /// Looks up the account behind a verified identity.
    async fn current_user(&self, account_id: i32) -> Result<AccountSummary, AuthError>;
}
