//! Authentication module.

use crate::config::SubscriptionTier;
use crate::db::{Database, Session, User, now_timestamp};
use crate::error::{AppError, Result};
use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
        rand_core::{OsRng, RngCore},
    },
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};

/// Minimum password length.
const MIN_PASSWORD_LEN: usize = 6;

/// Hash a password using Argon2.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Verify a password against a hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Generate a secure random token.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Lowercase and trim an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: &str) -> Result<()> {
    let valid = email.len() <= 254
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| {
                !local.is_empty() && domain.contains('.') && !domain.contains('@')
            });
    if valid {
        Ok(())
    } else {
        Err(AppError::Validation("Invalid email address".to_string()))
    }
}

fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Authentication service.
#[derive(Clone)]
pub struct AuthService {
    db: Database,
    session_duration_days: u32,
    registration_enabled: bool,
}

impl AuthService {
    /// Create a new auth service.
    pub fn new(db: Database, session_duration_days: u32, registration_enabled: bool) -> Self {
        Self {
            db,
            session_duration_days,
            registration_enabled,
        }
    }

    /// Register a new user on the free tier.
    pub fn register(&self, email: &str, password: &str, name: &str) -> Result<User> {
        if !self.registration_enabled {
            return Err(AppError::Validation("Registration is disabled".to_string()));
        }

        self.create_user(email, password, name, SubscriptionTier::Free)
    }

    /// Create a new user (admin function).
    pub fn create_user(
        &self,
        email: &str,
        password: &str,
        name: &str,
        tier: SubscriptionTier,
    ) -> Result<User> {
        let email = normalize_email(email);
        validate_email(&email)?;
        validate_password(password)?;

        let name = name.trim();
        if name.is_empty() || name.chars().count() > 100 {
            return Err(AppError::Validation(
                "Name must be 1-100 characters".to_string(),
            ));
        }

        let password_hash = hash_password(password)?;

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            password_hash,
            name: name.to_string(),
            subscription_tier: tier.as_str().to_string(),
            created_at: now_timestamp(),
            last_login: None,
        };

        self.db.create_user(&user)?;
        tracing::info!(user_id = %user.id, tier = tier.as_str(), "User created");
        Ok(user)
    }

    /// Login and create a session.
    pub fn login(&self, email: &str, password: &str) -> Result<(User, String)> {
        let email = normalize_email(email);
        let user = self
            .db
            .get_user_by_email(&email)?
            .ok_or_else(|| AppError::Unauthorized("Invalid credentials".to_string()))?;

        if !verify_password(password, &user.password_hash)? {
            tracing::warn!(email = %email, "Failed login attempt");
            return Err(AppError::Unauthorized("Invalid credentials".to_string()));
        }

        // Update last login
        self.db.update_user_last_login(&user.id)?;

        // Create session
        let token = generate_token();
        let expires_at = now_timestamp() + (self.session_duration_days as i64 * 24 * 60 * 60);

        let session = Session {
            token: token.clone(),
            user_id: user.id.clone(),
            expires_at,
        };

        self.db.create_session(&session)?;

        Ok((user, token))
    }

    /// Validate a session token and return the user.
    pub fn validate_token(&self, token: &str) -> Result<Option<User>> {
        let session = match self.db.get_session(token)? {
            Some(s) => s,
            None => return Ok(None),
        };

        // Check expiration
        if session.expires_at < now_timestamp() {
            self.db.delete_session(token)?;
            return Ok(None);
        }

        self.db.get_user_by_id(&session.user_id)
    }

    /// Logout (delete session).
    pub fn logout(&self, token: &str) -> Result<()> {
        self.db.delete_session(token)
    }

    /// Change a user's password after checking the current one.
    pub fn change_password(&self, user: &User, current: &str, new_password: &str) -> Result<()> {
        if !verify_password(current, &user.password_hash)? {
            return Err(AppError::Unauthorized(
                "Current password is incorrect".to_string(),
            ));
        }
        self.set_password(&user.email, new_password)?;
        Ok(())
    }

    /// Set a password without checking the old one (admin function).
    pub fn set_password(&self, email: &str, new_password: &str) -> Result<bool> {
        validate_password(new_password)?;

        let password_hash = hash_password(new_password)?;
        self.db
            .update_user_password(&normalize_email(email), &password_hash)
    }

    /// Change a user's subscription tier.
    pub fn set_tier(&self, email: &str, tier: SubscriptionTier) -> Result<bool> {
        self.db
            .update_user_tier(&normalize_email(email), tier.as_str())
    }

    /// Delete a user.
    pub fn delete_user(&self, email: &str) -> Result<bool> {
        self.db.delete_user(&normalize_email(email))
    }

    /// List all users.
    pub fn list_users(&self) -> Result<Vec<User>> {
        self.db.list_users()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        AuthService::new(Database::open_memory().unwrap(), 30, true)
    }

    #[test]
    fn test_password_hash_and_verify() {
        let password = "test_password_123";
        let hash = hash_password(password).unwrap();

        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_generate_token() {
        let token1 = generate_token();
        let token2 = generate_token();

        assert_eq!(token1.len(), 43); // Base64 of 32 bytes
        assert_ne!(token1, token2);
    }

    #[test]
    fn test_register_login_logout() {
        let auth = service();
        let user = auth
            .register("  Writer@Example.com ", "secret1", "Ada")
            .unwrap();
        assert_eq!(user.email, "writer@example.com");
        assert_eq!(user.subscription_tier, "free");

        let (logged_in, token) = auth.login("writer@example.com", "secret1").unwrap();
        assert_eq!(logged_in.id, user.id);
        assert_eq!(
            auth.validate_token(&token).unwrap().map(|u| u.id),
            Some(user.id.clone())
        );

        auth.logout(&token).unwrap();
        assert!(auth.validate_token(&token).unwrap().is_none());
    }

    #[test]
    fn test_registration_rules() {
        let auth = service();
        auth.register("a@b.io", "secret1", "A").unwrap();

        assert!(matches!(
            auth.register("a@b.io", "secret1", "A"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            auth.register("no-at-sign", "secret1", "A"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            auth.register("c@d.io", "short", "A"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            auth.register("c@d.io", "secret1", "  "),
            Err(AppError::Validation(_))
        ));

        let closed = AuthService::new(Database::open_memory().unwrap(), 30, false);
        assert!(closed.register("e@f.io", "secret1", "E").is_err());
    }

    #[test]
    fn test_wrong_password_is_unauthorized() {
        let auth = service();
        auth.register("a@b.io", "secret1", "A").unwrap();

        assert!(matches!(
            auth.login("a@b.io", "nope!!"),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            auth.login("missing@b.io", "secret1"),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_change_password_and_tier() {
        let auth = service();
        let user = auth.register("a@b.io", "secret1", "A").unwrap();

        assert!(auth.change_password(&user, "wrong!!", "secret2").is_err());
        auth.change_password(&user, "secret1", "secret2").unwrap();
        assert!(auth.login("a@b.io", "secret2").is_ok());

        assert!(auth.set_tier("a@b.io", SubscriptionTier::Pro).unwrap());
        assert!(!auth.set_tier("nobody@b.io", SubscriptionTier::Pro).unwrap());
        assert_eq!(
            auth.list_users().unwrap()[0].subscription_tier,
            "pro"
        );

        assert!(auth.delete_user("A@B.io").unwrap());
        assert!(auth.list_users().unwrap().is_empty());
    }
}
