use crate::{
    models::{Identity, ProfileChange, ProfileRecord, Role},
    Result,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(test)]
use mockall::automock;

/// Tokens handed out by the auth service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user_id: String,
    pub email: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpResult {
    SignedIn(AuthGrant),
    /// Account created, waiting for the emailed confirmation link
    ConfirmationRequired { user_id: String },
}

/// Sign-in, sign-up and session handling of the hosted backend
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait AuthBackend: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthGrant>;

    /// Sign in with an ID token from an external provider such as `google`
    async fn sign_in_with_id_token(&self, provider: &str, id_token: &str) -> Result<AuthGrant>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
        phone: Option<String>,
    ) -> Result<SignUpResult>;

    async fn refresh(&self, refresh_token: &str) -> Result<AuthGrant>;

    async fn sign_out(&self) -> Result<()>;

    /// Id of the user the current access token belongs to
    async fn current_user_id(&self) -> Result<String>;

    async fn update_password(&self, new_password: &str) -> Result<()>;

    /// Make later calls act as the given session (or anonymously)
    fn use_access_token(&self, token: Option<String>);
}

/// Row storage for profiles, one table per role
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    async fn fetch_profile(&self, owner: &Identity) -> Result<ProfileRecord>;

    async fn create_profile(&self, role: Role, profile: &ProfileRecord) -> Result<ProfileRecord>;

    /// Apply `changes` to the owner's own row
    async fn update_profile(&self, owner: &Identity, changes: &[ProfileChange]) -> Result<()>;
}

/// Object storage holding profile photos
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<()>;

    /// Resolvable URL for a stored object
    async fn public_url(&self, path: &str) -> Result<String>;

    async fn remove(&self, path: &str) -> Result<()>;

    /// Object path behind a URL this storage produced, if it did
    fn path_for_url(&self, url: &str) -> Option<String>;
}
