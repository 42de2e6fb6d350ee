use async_trait::async_trait;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{error, info, warn};

use crate::db::models::User;
use crate::db::rollback_after;
use crate::error::{AppError, AuthError};

/// Persistence of usernames with their salted password hashes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a new user. Fails with `AuthError::UserExists` when the
    /// username is taken; any other fault is a `DatabaseError`.
    async fn register(&self, username: &str, password_hash: &str, salt: &str) -> Result<(), AppError>;

    /// Salt stored for `username`, or `AuthError::UserNotFound`.
    async fn get_salt(&self, username: &str) -> Result<String, AppError>;

    /// Succeeds only when a row matches both `username` and `password_hash`.
    async fn verify(&self, username: &str, password_hash: &str) -> Result<(), AppError>;
}

pub struct SqliteCredentialStore {
    pool: SqlitePool,
}

impl SqliteCredentialStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>("SELECT username, hash, salt FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("SQL error while fetching user {}: {}", username, e);
                AppError::from(e)
            })
    }

    async fn insert_user_with_transaction(
        username: &str,
        password_hash: &str,
        salt: &str,
        transaction: &mut Transaction<'_, Sqlite>,
    ) -> Result<(), AppError> {
        sqlx::query("INSERT INTO users (username, hash, salt) VALUES (?, ?, ?)")
            .bind(username)
            .bind(password_hash)
            .bind(salt)
            .execute(&mut **transaction)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                    AppError::AuthError(AuthError::UserExists)
                }
                other => other.into(),
            })?;

        Ok(())
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn register(&self, username: &str, password_hash: &str, salt: &str) -> Result<(), AppError> {
        let mut transaction = self.pool.begin().await?;

        let result =
            Self::insert_user_with_transaction(username, password_hash, salt, &mut transaction).await;

        match result {
            Ok(()) => {
                transaction.commit().await?;
                info!("User {} inserted into database", username);
                Ok(())
            }
            Err(e) => {
                let e = rollback_after(transaction, e).await;
                match &e {
                    AppError::AuthError(AuthError::UserExists) => {
                        warn!("Username {} exists in the database", username)
                    }
                    _ => error!("Error inserting user {}: {}", username, e),
                }
                Err(e)
            }
        }
    }

    async fn get_salt(&self, username: &str) -> Result<String, AppError> {
        let user = self.find_user(username).await?;

        match user {
            Some(user) => Ok(user.salt),
            None => {
                warn!("Username {} is not in the database", username);
                Err(AuthError::UserNotFound.into())
            }
        }
    }

    async fn verify(&self, username: &str, password_hash: &str) -> Result<(), AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT username, hash, salt FROM users WHERE username = ? AND hash = ?",
        )
        .bind(username)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("SQL error while verifying user: {}", e);
            AppError::from(e)
        })?;

        user.map(|_| ()).ok_or(AuthError::InvalidCredentials.into())
    }
}
