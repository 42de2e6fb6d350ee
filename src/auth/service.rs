use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::auth::session::Identity;
use crate::db::CredentialStore;
use crate::error::{AppError, AuthError};

/// Length of the per-user salt, in ASCII characters.
pub const SALT_LENGTH: usize = 8;

/// Hex SHA-256 of the password bytes immediately followed by the salt bytes.
pub fn compute_hash(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn generate_salt() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SALT_LENGTH)
        .map(char::from)
        .collect()
}

pub struct AuthService {
    credentials: Arc<dyn CredentialStore>,
}

impl AuthService {
    pub fn new(credentials: Arc<dyn CredentialStore>) -> Self {
        Self { credentials }
    }

    /// Create an account with a fresh salt.
    pub async fn register_user(&self, username: &str, password: &str) -> Result<(), AppError> {
        if username.is_empty() || password.is_empty() {
            return Err(AppError::ValidationError(
                "Username and password are compulsory!".to_string(),
            ));
        }

        let salt = generate_salt();
        let password_hash = compute_hash(password, &salt);
        self.credentials.register(username, &password_hash, &salt).await?;

        info!("Registered user {}", username);
        Ok(())
    }

    /// Check a username/password pair.
    ///
    /// Errors stay precise here (`UserNotFound` vs `InvalidCredentials`);
    /// collapsing them for the client happens in the error response.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Identity, AppError> {
        debug!("Attempting authentication for {}", username);

        let salt = self.credentials.get_salt(username).await?;
        let password_hash = compute_hash(password, &salt);

        match self.credentials.verify(username, &password_hash).await {
            Ok(()) => Ok(Identity::Authenticated {
                username: username.to_string(),
            }),
            Err(e) => {
                if matches!(e, AppError::AuthError(AuthError::InvalidCredentials)) {
                    warn!("Password mismatch for {}", username);
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::credentials::MockCredentialStore;
    use crate::db::Database;
    use crate::error::DatabaseError;
    use mockall::predicate::eq;

    async fn sqlite_service() -> (Database, AuthService) {
        let db = Database::in_memory().await.expect("Failed to open database");
        let service = AuthService::new(Arc::new(db.credentials()));
        (db, service)
    }

    #[test]
    fn test_compute_hash_known_vector() {
        // sha256("password" || "salt") == sha256("passwordsalt")
        assert_eq!(
            compute_hash("password", "salt"),
            "7a37b85c8918eac19a9089c0fa5a2ab4dce3f90528dcdeec108b23ddf3607b99"
        );
    }

    #[test]
    fn test_compute_hash_is_deterministic() {
        let first = compute_hash("secret1", "abcdefgh");
        let second = compute_hash("secret1", "abcdefgh");
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_compute_hash_changes_with_any_byte() {
        let base = compute_hash("secret1", "abcdefgh");
        let mut seen = std::collections::HashSet::new();
        seen.insert(base.clone());

        for variant in [
            compute_hash("secret2", "abcdefgh"),
            compute_hash("Secret1", "abcdefgh"),
            compute_hash("secret1 ", "abcdefgh"),
            compute_hash("secret1", "abcdefgi"),
            compute_hash("secret1", "Abcdefgh"),
            compute_hash("secret1", "abcdefg"),
        ] {
            assert!(seen.insert(variant), "digest collision within sample");
        }
    }

    #[test]
    fn test_compute_hash_has_no_separator() {
        assert_eq!(compute_hash("secret1", "abcdefgh"), compute_hash("secret1abcdefgh", ""));
        assert_eq!(compute_hash("secret1", "abcdefgh"), compute_hash("", "secret1abcdefgh"));
    }

    #[test]
    fn test_generate_salt() {
        let salt = generate_salt();
        assert_eq!(salt.len(), SALT_LENGTH);
        assert!(salt.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(generate_salt(), generate_salt());
    }

    #[test_log::test(tokio::test)]
    async fn test_register_then_authenticate() {
        let (_db, service) = sqlite_service().await;

        service.register_user("alice", "secret1").await.unwrap();

        let identity = service.authenticate("alice", "secret1").await.unwrap();
        assert_eq!(identity, Identity::Authenticated { username: "alice".into() });
    }

    #[test_log::test(tokio::test)]
    async fn test_authenticate_failures() {
        let (_db, service) = sqlite_service().await;
        service.register_user("alice", "secret1").await.unwrap();

        let err = service.authenticate("alice", "wrongpw").await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::InvalidCredentials)));

        let err = service.authenticate("bob", "x").await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::UserNotFound)));
    }

    #[tokio::test]
    async fn test_register_twice() {
        let (_db, service) = sqlite_service().await;
        service.register_user("alice", "secret1").await.unwrap();

        let err = service.register_user("alice", "other").await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::UserExists)));

        // The first password still works.
        assert!(service.authenticate("alice", "secret1").await.is_ok());
        assert!(service.authenticate("alice", "other").await.is_err());
    }

    #[tokio::test]
    async fn test_register_requires_fields() {
        let service = AuthService::new(Arc::new(MockCredentialStore::new()));

        let err = service.register_user("", "secret").await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        let err = service.register_user("alice", "").await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_authenticate_hashes_with_stored_salt() {
        let mut store = MockCredentialStore::new();
        store
            .expect_get_salt()
            .with(eq("alice"))
            .times(1)
            .returning(|_| Ok("NaCl1234".to_string()));
        store
            .expect_verify()
            .with(eq("alice"), eq(compute_hash("secret1", "NaCl1234")))
            .times(1)
            .returning(|_, _| Ok(()));

        let service = AuthService::new(Arc::new(store));
        let identity = service.authenticate("alice", "secret1").await.unwrap();
        assert_eq!(identity.username(), Some("alice"));
    }

    #[tokio::test]
    async fn test_authenticate_skips_verify_for_unknown_user() {
        let mut store = MockCredentialStore::new();
        store
            .expect_get_salt()
            .returning(|_| Err(AuthError::UserNotFound.into()));
        store.expect_verify().never();

        let service = AuthService::new(Arc::new(store));
        let err = service.authenticate("ghost", "pw").await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::UserNotFound)));
    }

    #[tokio::test]
    async fn test_authenticate_propagates_storage_errors() {
        let mut store = MockCredentialStore::new();
        store.expect_get_salt().returning(|_| {
            Err(AppError::DatabaseError(DatabaseError::ConnectionError("down".into())))
        });

        let service = AuthService::new(Arc::new(store));
        let err = service.authenticate("alice", "pw").await.unwrap_err();
        assert!(matches!(err, AppError::DatabaseError(_)));
    }
}
