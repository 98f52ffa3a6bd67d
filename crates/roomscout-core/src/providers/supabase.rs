// Hosted backend provider - bridges the REST client with the core traits
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use roomscout_api::{object_path_from_public_url, AuthSession, BackendClient, SignUpResponse};
use serde_json::json;
use tracing::debug;

use crate::{
    backend::{AuthBackend, AuthGrant, ObjectStorage, ProfileStore, SignUpResult},
    config::BackendConfig,
    models::{Identity, ProfileChange, ProfileRecord, Role},
    providers::schema::ProfileSchemas,
    Result,
};

/// Wrapper around BackendClient that implements the auth, profile and storage traits
#[derive(Clone)]
pub struct SupabaseBackend {
    client: BackendClient,
    schemas: ProfileSchemas,
    avatar_bucket: String,
}

impl SupabaseBackend {
    pub fn new(client: BackendClient, schemas: ProfileSchemas, avatar_bucket: impl Into<String>) -> Self {
        Self {
            client,
            schemas,
            avatar_bucket: avatar_bucket.into(),
        }
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        let (url, anon_key) = config.credentials()?;
        let client = BackendClient::new(url, anon_key)?;
        Ok(Self::new(
            client,
            ProfileSchemas::new(&config.renter_table, &config.advertiser_table),
            config.avatar_bucket.clone(),
        ))
    }
}

#[async_trait]
impl AuthBackend for SupabaseBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthGrant> {
        let session = self.client.sign_in_with_password(email, password).await?;
        Ok(session_to_grant(session))
    }

    async fn sign_in_with_id_token(&self, provider: &str, id_token: &str) -> Result<AuthGrant> {
        let session = self.client.sign_in_with_id_token(provider, id_token).await?;
        Ok(session_to_grant(session))
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
        phone: Option<String>,
    ) -> Result<SignUpResult> {
        let metadata = json!({ "name": display_name, "phone": phone });
        let response = self.client.sign_up(email, password, &metadata).await?;

        Ok(match response {
            SignUpResponse::Session(session) => SignUpResult::SignedIn(session_to_grant(session)),
            SignUpResponse::PendingConfirmation(user) => {
                debug!("Sign-up for {} awaits email confirmation", user.id);
                SignUpResult::ConfirmationRequired { user_id: user.id }
            }
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthGrant> {
        let session = self.client.refresh_session(refresh_token).await?;
        self.client.set_session_token(Some(session.access_token.clone()));
        Ok(session_to_grant(session))
    }

    async fn sign_out(&self) -> Result<()> {
        self.client.sign_out().await?;
        Ok(())
    }

    async fn current_user_id(&self) -> Result<String> {
        Ok(self.client.get_user().await?.id)
    }

    async fn update_password(&self, new_password: &str) -> Result<()> {
        self.client.update_password(new_password).await?;
        Ok(())
    }

    fn use_access_token(&self, token: Option<String>) {
        self.client.set_session_token(token);
    }
}

#[async_trait]
impl ProfileStore for SupabaseBackend {
    async fn fetch_profile(&self, owner: &Identity) -> Result<ProfileRecord> {
        let schema = self.schemas.for_role(owner.role);
        let row = self.client.select_row(&schema.table, &owner.user_id).await?;
        schema.to_record(&row)
    }

    async fn create_profile(&self, role: Role, profile: &ProfileRecord) -> Result<ProfileRecord> {
        let schema = self.schemas.for_role(role);
        let row = self.client.insert_row(&schema.table, &schema.to_row(profile)).await?;
        schema.to_record(&row)
    }

    async fn update_profile(&self, owner: &Identity, changes: &[ProfileChange]) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let schema = self.schemas.for_role(owner.role);
        self.client
            .update_row(&schema.table, &owner.user_id, &schema.to_patch(changes))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for SupabaseBackend {
    async fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<()> {
        self.client
            .upload_object(&self.avatar_bucket, path, bytes.to_vec(), content_type)
            .await?;
        Ok(())
    }

    async fn public_url(&self, path: &str) -> Result<String> {
        Ok(self.client.public_url(&self.avatar_bucket, path))
    }

    async fn remove(&self, path: &str) -> Result<()> {
        self.client
            .remove_objects(&self.avatar_bucket, &[path.to_string()])
            .await?;
        Ok(())
    }

    fn path_for_url(&self, url: &str) -> Option<String> {
        object_path_from_public_url(url, &self.avatar_bucket)
    }
}

/// Convert the API session into our grant
fn session_to_grant(session: AuthSession) -> AuthGrant {
    AuthGrant {
        access_token: session.access_token,
        refresh_token: session.refresh_token,
        user_id: session.user.id,
        email: session.user.email.unwrap_or_default(),
        expires_at: session
            .expires_at
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
    }
}
