//! Accounts, password hashing and bearer sessions
//!
//! Tokens are opaque random strings handed to the client once. Only their
//! SHA-256 digest is stored, so a leaked database does not leak sessions.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{Error, Result};
use crate::processing::DocumentManager;
use crate::storage::{Database, UserDeletion};
use crate::types::{AuthResponse, Session, User};

pub const PASSWORD_POLICY_MESSAGE: &str = "Password must be at least 8 characters long and contain at least one uppercase letter and one number";

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Body of `POST /api/auth/register`
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Body of `POST /api/auth/login`
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// At least 8 characters, one ASCII uppercase letter and one digit
pub fn validate_password(password: &str) -> Result<()> {
    let long_enough = password.chars().count() >= 8;
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if long_enough && has_upper && has_digit {
        Ok(())
    } else {
        Err(Error::validation(PASSWORD_POLICY_MESSAGE))
    }
}

/// Argon2id PHC string with a random salt
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::internal(format!("Password hashing failed: {}", e)))
}

/// Check a password against a stored PHC string; malformed hashes never match
pub fn verify_password(password: &str, phc: &str) -> bool {
    match PasswordHash::new(phc) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("Stored password hash is malformed: {}", e);
            false
        }
    }
}

/// New opaque session token
pub fn generate_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// Digest under which a token is stored
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

async fn hash_password_blocking(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| Error::internal(format!("Password hashing task failed: {}", e)))?
}

async fn verify_password_blocking(password: String, phc: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &phc))
        .await
        .map_err(|e| Error::internal(format!("Password verification task failed: {}", e)))
}

/// Registration, login, session lookup and user administration
pub struct AccountService {
    db: Arc<Database>,
    documents: Arc<DocumentManager>,
    config: AuthConfig,
}

impl AccountService {
    pub fn new(db: Arc<Database>, documents: Arc<DocumentManager>, config: AuthConfig) -> Self {
        Self {
            db,
            documents,
            config,
        }
    }

    /// Create an account and sign it in
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse> {
        let username = request.username.trim();
        let email = request.email.trim().to_lowercase();

        if username.is_empty() {
            return Err(Error::validation("Username is required"));
        }
        if email.is_empty() || !email.contains('@') {
            return Err(Error::validation("A valid email is required"));
        }
        validate_password(&request.password)?;

        if self.db.find_user_by_email(&email)?.is_some() {
            return Err(Error::validation("User already exists"));
        }
        if self.db.find_user_by_username(username)?.is_some() {
            return Err(Error::validation("Username already taken"));
        }

        let is_admin = self.config.first_user_is_admin && self.db.count_users()? == 0;
        let password_hash = hash_password_blocking(request.password).await?;
        let user = User::new(username, email, password_hash, is_admin);
        self.db.create_user(&user)?;

        tracing::info!(user_id = %user.id, is_admin, "Registered user {}", user.username);

        let token = self.issue_session(&user)?;
        Ok(AuthResponse { user, token })
    }

    /// Exchange credentials for a new session
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse> {
        let email = request.email.trim().to_lowercase();

        let user = self
            .db
            .find_user_by_email(&email)?
            .ok_or_else(|| Error::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

        if !verify_password_blocking(request.password, user.password_hash.clone()).await? {
            tracing::debug!(user_id = %user.id, "login rejected");
            return Err(Error::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        let expired = self.db.delete_expired_sessions(Utc::now())?;
        if expired > 0 {
            tracing::debug!("Removed {} expired sessions", expired);
        }

        let token = self.issue_session(&user)?;
        Ok(AuthResponse { user, token })
    }

    fn issue_session(&self, user: &User) -> Result<String> {
        let token = generate_token();
        let now = Utc::now();

        self.db.insert_session(&Session {
            token_hash: hash_token(&token),
            user_id: user.id,
            created_at: now,
            expires_at: now + Duration::days(self.config.token_ttl_days),
        })?;

        Ok(token)
    }

    /// Resolve a bearer token to its user
    pub fn authenticate(&self, token: &str) -> Result<User> {
        self.db
            .user_for_token_hash(&hash_token(token), Utc::now())?
            .ok_or_else(|| Error::Unauthorized("Invalid or expired token".to_string()))
    }

    /// Users without admin rights
    pub fn list_users(&self) -> Result<Vec<User>> {
        self.db.list_non_admin_users()
    }

    /// Delete a regular user with their chats, documents, files and sessions.
    ///
    /// Admins cannot delete themselves or another admin.
    pub async fn delete_user(&self, actor: &User, target_id: Uuid) -> Result<UserDeletion> {
        if actor.id == target_id {
            return Err(Error::validation("Cannot delete your own account"));
        }

        let target = self
            .db
            .get_user(target_id)?
            .ok_or_else(|| Error::NotFound("User not found".to_string()))?;

        if target.is_admin {
            return Err(Error::validation("Cannot delete an admin user"));
        }

        self.documents.remove_uploader_files(target.id).await?;
        let removed = self.db.delete_user_cascade(target.id)?;

        if removed.documents > 0 {
            self.documents.reset_index().await;
        }

        tracing::info!(
            user_id = %target.id,
            chats = removed.chats,
            documents = removed.documents,
            "Deleted user {}",
            target.username
        );
        Ok(removed)
    }
}
