use crate::domain::session::Principal;
use crate::{AdminStore, CoreError, CoreResult, SessionStore, TenantRegistry};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use std::sync::Arc;
use tracing::{info, warn};

pub const MIN_PASSWORD_LEN: usize = 8;

/// Hashes `password` into a PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> CoreResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CoreError::storage("hashing password", e.to_string()))
}

/// A malformed stored hash verifies as false rather than erroring.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

// Argon2 is deliberately slow; keep it off the async workers.
pub(crate) async fn hash_password_blocking(password: String) -> CoreResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| CoreError::storage("hashing password", e))?
}

async fn verify_password_blocking(password: String, hash: String) -> CoreResult<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| CoreError::storage("verifying password", e))
}

pub fn validate_password(password: &str) -> CoreResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(CoreError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Login flows for both principal kinds over the one shared session store.
#[derive(Clone)]
pub struct AuthService {
    admins: Arc<dyn AdminStore>,
    sessions: Arc<dyn SessionStore>,
    tenants: Arc<dyn TenantRegistry>,
}

impl AuthService {
    pub fn new(
        admins: Arc<dyn AdminStore>,
        sessions: Arc<dyn SessionStore>,
        tenants: Arc<dyn TenantRegistry>,
    ) -> Self {
        Self {
            admins,
            sessions,
            tenants,
        }
    }

    /// True once the super admin exists.
    pub async fn setup_status(&self) -> CoreResult<bool> {
        Ok(self.admins.get_super_admin().await?.is_some())
    }

    pub async fn setup(&self, username: &str, password: &str) -> CoreResult<()> {
        let username = username.trim();
        if username.is_empty() {
            return Err(CoreError::Validation("Username cannot be empty".into()));
        }
        validate_password(password)?;
        if self.setup_status().await? {
            return Err(CoreError::Conflict("Super admin already exists".into()));
        }

        let hash = hash_password_blocking(password.to_string()).await?;
        self.admins.create_super_admin(username, &hash).await?;
        info!("Super admin {} created", username);
        Ok(())
    }

    /// Returns a session token, or `None` when the credentials do not match.
    pub async fn login_super_admin(
        &self,
        username: &str,
        password: &str,
    ) -> CoreResult<Option<String>> {
        let Some(admin) = self.admins.get_super_admin().await? else {
            warn!("Super admin login attempted before setup");
            return Ok(None);
        };
        if admin.username != username
            || !verify_password_blocking(password.to_string(), admin.password_hash).await?
        {
            warn!("Failed super admin login for {}", username);
            return Ok(None);
        }

        let token = self
            .sessions
            .create_session(&Principal::super_admin(admin.username))
            .await?;
        Ok(Some(token))
    }

    /// Authenticates against the tenant's hashed credential only.
    pub async fn login_tenant(&self, slug: &str, password: &str) -> CoreResult<Option<String>> {
        let Some(tenant) = self.tenants.get(slug).await? else {
            return Ok(None);
        };
        if !verify_password_blocking(password.to_string(), tenant.password_hash).await? {
            warn!("Failed tenant login for {}", slug);
            return Ok(None);
        }

        let token = self
            .sessions
            .create_session(&Principal::tenant(tenant.slug))
            .await?;
        Ok(Some(token))
    }

    pub async fn authenticate(&self, token: &str) -> CoreResult<Option<Principal>> {
        Ok(self
            .sessions
            .get_session(token)
            .await?
            .map(|session| session.principal))
    }

    pub async fn logout(&self, token: &str) -> CoreResult<()> {
        self.sessions.delete_session(token).await
    }
}
