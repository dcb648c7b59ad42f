use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::entities::users;

/// Account data returned from the repository (without the password hash)
#[derive(Debug, Clone)]
pub struct Account {
    pub id: i32,
    pub email: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: String,
    pub last_login: Option<String>,
}

impl From<users::Model> for Account {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            role: model.role,
            is_active: model.is_active,
            created_at: model.created_at,
            last_login: model.last_login,
        }
    }
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Get the full credential record for an active account. Only the
    /// authentication engine consumes this; everything else gets [`Account`].
    pub async fn find_active_by_email(&self, email: &str) -> Result<Option<users::Model>> {
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .filter(users::Column::IsActive.eq(true))
            .one(&self.conn)
            .await
            .context("Failed to query user by email")?;

        Ok(user)
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<Account>> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(user.map(Account::from))
    }

    /// Record a failed login attempt. Once the counter reaches `max_attempts`
    /// the account is locked until now + `lockout_minutes`.
    pub async fn record_login_failure(
        &self,
        user: users::Model,
        max_attempts: i32,
        lockout_minutes: i64,
    ) -> Result<()> {
        let attempts = user.failed_login_attempts + 1;

        let mut active: users::ActiveModel = user.into();
        active.failed_login_attempts = Set(attempts);
        if attempts >= max_attempts {
            let until = Utc::now() + Duration::minutes(lockout_minutes);
            active.locked_until = Set(Some(until.to_rfc3339()));
        }
        active
            .update(&self.conn)
            .await
            .context("Failed to record login failure")?;

        Ok(())
    }

    /// Reset the failure counter, clear any lockout, and stamp last_login.
    pub async fn record_login_success(&self, user: users::Model) -> Result<Account> {
        let now = Utc::now().to_rfc3339();

        let mut active: users::ActiveModel = user.into();
        active.failed_login_attempts = Set(0);
        active.locked_until = Set(None);
        active.last_login = Set(Some(now));
        let updated = active
            .update(&self.conn)
            .await
            .context("Failed to record login success")?;

        Ok(Account::from(updated))
    }

    /// Provision a new account with an already-hashed password.
    pub async fn create(&self, email: &str, password_hash: &str, role: &str) -> Result<Account> {
        let now = Utc::now().to_rfc3339();

        let active = users::ActiveModel {
            email: Set(email.to_string()),
            password_hash: Set(password_hash.to_string()),
            role: Set(role.to_string()),
            is_active: Set(true),
            created_at: Set(now),
            failed_login_attempts: Set(0),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to create account")?;

        Ok(Account::from(model))
    }
}
