//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;
use tokio::task;

use crate::config::SecurityConfig;
use crate::db::Store;
use crate::entities::users;
use crate::services::auth_service::{AccountSummary, AuthError, AuthService, LoginResult};
use crate::services::password;
use crate::services::token::TokenService;

fn email_regex() -> &'static Regex {
    static INSTANCE: OnceLock<Regex> = OnceLock::new();
    INSTANCE.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is a valid regex")
    })
}

/// Locked while now < locked_until; the boundary itself counts as unlocked.
fn is_locked(user: &users::Model) -> bool {
    user.locked_until.as_deref().is_some_and(|until| {
        DateTime::parse_from_rfc3339(until)
            .map(|until| Utc::now() < until)
            .unwrap_or(false)
    })
}

pub struct SeaOrmAuthService {
    store: Store,
    tokens: TokenService,
    security: SecurityConfig,
}

impl SeaOrmAuthService {
    #[must_use]
    pub const fn new(store: Store, tokens: TokenService, security: SecurityConfig) -> Self {
        Self {
            store,
            tokens,
            security,
        }
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResult, AuthError> {
        // Pre-condition checks run before any lookup so the response cannot
        // reveal whether the account exists
        if !email_regex().is_match(email) {
            return Err(AuthError::Validation(
                "A valid email address is required".to_string(),
            ));
        }
        if password.len() < self.security.min_password_length {
            return Err(AuthError::Validation(format!(
                "Password must be at least {} characters",
                self.security.min_password_length
            )));
        }

        let Some(user) = self.store.find_active_account_by_email(email).await? else {
            return Err(AuthError::InvalidCredentials);
        };

        if is_locked(&user) {
            return Err(AuthError::AccountLocked);
        }

        // Argon2 verification is CPU-intensive; keep it off the async runtime
        let candidate = password.to_string();
        let stored_hash = user.password_hash.clone();
        let is_valid = task::spawn_blocking(move || password::verify_password(&candidate, &stored_hash))
            .await
            .map_err(|e| AuthError::Internal(format!("Password verification task panicked: {e}")))?;

        if !is_valid {
            self.store
                .record_login_failure(
                    user,
                    self.security.lockout.max_failed_attempts,
                    self.security.lockout.lockout_minutes,
                )
                .await?;
            return Err(AuthError::InvalidCredentials);
        }

        let account = self.store.record_login_success(user).await?;

        let token = self
            .tokens
            .issue(account.id, &account.email, &account.role)
            .map_err(|e| AuthError::Internal(format!("Failed to issue access token: {e}")))?;

        tracing::info!(account = %account.email, "Login succeeded");

        Ok(LoginResult {
            token,
            user: AccountSummary::from(account),
        })
    }

    async fn current_user(&self, account_id: i32) -> Result<AccountSummary, AuthError> {
        let account = self
            .store
            .get_account_by_id(account_id)
            .await?
            .filter(|a| a.is_active)
            .ok_or(AuthError::AccountNotFound)?;

        Ok(AccountSummary::from(account))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};

    const EMAIL: &str = "admin@lotarr.test";
    const PASSWORD: &str = "sw0rdfish";

    async fn service_with_account() -> (SeaOrmAuthService, Store) {
        let store = Store::with_pool_options("sqlite::memory:", 1, 1)
            .await
            .unwrap();

        let hash = password::hash_password(PASSWORD, None).unwrap();
        store.create_account(EMAIL, &hash, "admin").await.unwrap();

        let security = SecurityConfig::default();
        let tokens = TokenService::new(&security.jwt_secret, security.token_ttl_hours);
        let service = SeaOrmAuthService::new(store.clone(), tokens, security);
        (service, store)
    }

    async fn fetch_user(store: &Store) -> users::Model {
        users::Entity::find()
            .filter(users::Column::Email.eq(EMAIL))
            .one(&store.conn)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn login_succeeds_with_correct_password() {
        let (service, _store) = service_with_account().await;

        let result = service.login(EMAIL, PASSWORD).await.unwrap();
        assert!(!result.token.is_empty());
        assert_eq!(result.user.email, EMAIL);
        assert_eq!(result.user.role, "admin");
        assert!(result.user.last_login.is_some());
    }

    #[tokio::test]
    async fn malformed_email_is_a_validation_error() {
        let (service, _store) = service_with_account().await;

        assert!(matches!(
            service.login("not-an-email", PASSWORD).await,
            Err(AuthError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn short_password_is_a_validation_error() {
        let (service, _store) = service_with_account().await;

        assert!(matches!(
            service.login(EMAIL, "abc").await,
            Err(AuthError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn unknown_account_matches_wrong_password() {
        let (service, _store) = service_with_account().await;

        let unknown = service.login("nobody@lotarr.test", PASSWORD).await;
        let wrong = service.login(EMAIL, "wrong-password").await;

        assert!(matches!(unknown, Err(AuthError::InvalidCredentials)));
        assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn inactive_account_cannot_login() {
        let (service, store) = service_with_account().await;

        let user = fetch_user(&store).await;
        let mut active: users::ActiveModel = user.into();
        active.is_active = Set(false);
        active.update(&store.conn).await.unwrap();

        assert!(matches!(
            service.login(EMAIL, PASSWORD).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn five_failures_lock_the_account() {
        let (service, store) = service_with_account().await;

        for _ in 0..5 {
            assert!(matches!(
                service.login(EMAIL, "wrong-password").await,
                Err(AuthError::InvalidCredentials)
            ));
        }

        let user = fetch_user(&store).await;
        assert_eq!(user.failed_login_attempts, 5);
        assert!(user.locked_until.is_some());

        // Sixth attempt hits the lockout and must not bump the counter,
        // even with the correct password
        assert!(matches!(
            service.login(EMAIL, PASSWORD).await,
            Err(AuthError::AccountLocked)
        ));
        let user = fetch_user(&store).await;
        assert_eq!(user.failed_login_attempts, 5);
    }

    #[tokio::test]
    async fn success_resets_counter_and_clears_lockout() {
        let (service, store) = service_with_account().await;

        for _ in 0..2 {
            let _ = service.login(EMAIL, "wrong-password").await;
        }
        assert_eq!(fetch_user(&store).await.failed_login_attempts, 2);

        service.login(EMAIL, PASSWORD).await.unwrap();

        let user = fetch_user(&store).await;
        assert_eq!(user.failed_login_attempts, 0);
        assert!(user.locked_until.is_none());
        assert!(user.last_login.is_some());
    }

    #[tokio::test]
    async fn lockout_boundary_is_exclusive() {
        let (service, store) = service_with_account().await;

        // An expiry in the past (or exactly now) means the window is over
        let user = fetch_user(&store).await;
        let mut active: users::ActiveModel = user.into();
        active.failed_login_attempts = Set(5);
        active.locked_until = Set(Some(Utc::now().to_rfc3339()));
        active.update(&store.conn).await.unwrap();

        let result = service.login(EMAIL, PASSWORD).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn current_user_requires_active_account() {
        let (service, store) = service_with_account().await;

        let user = fetch_user(&store).await;
        let id = user.id;

        let summary = service.current_user(id).await.unwrap();
        assert_eq!(summary.email, EMAIL);

        let mut active: users::ActiveModel = user.into();
        active.is_active = Set(false);
        active.update(&store.conn).await.unwrap();

        assert!(matches!(
            service.current_user(id).await,
            Err(AuthError::AccountNotFound)
        ));
    }
}
