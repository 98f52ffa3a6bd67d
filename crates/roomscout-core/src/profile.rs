// The signed-in user's profile and the edits allowed on it
use std::sync::{Arc, RwLock, RwLockWriteGuard};
use tracing::{error, info};

use crate::{
    avatar::AvatarDisplay,
    backend::ProfileStore,
    models::{Identity, ProfileChange, ProfileRecord},
    notify::Notifier,
    Error, Result,
};

/// Local copy of one profile, kept in step with the backend
///
/// The copy only changes after the backend acknowledged a write, so it never
/// shows an edit that did not stick.
pub struct ProfileService {
    store: Arc<dyn ProfileStore>,
    notifier: Arc<dyn Notifier>,
    owner: Identity,
    current: RwLock<Option<ProfileRecord>>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn ProfileStore>, notifier: Arc<dyn Notifier>, owner: Identity) -> Self {
        Self {
            store,
            notifier,
            owner,
            current: RwLock::new(None),
        }
    }

    pub fn owner(&self) -> &Identity {
        &self.owner
    }

    /// Last fetched or acknowledged state
    pub fn profile(&self) -> Option<ProfileRecord> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Refetch the record from the backend
    pub async fn refresh(&self) -> Result<ProfileRecord> {
        let record = self.store.fetch_profile(&self.owner).await?;
        *self.write() = Some(record.clone());
        Ok(record)
    }

    /// Save the profile form. The name is required; a blank phone clears it.
    pub async fn save_details(&self, display_name: &str, phone: Option<&str>) -> Result<()> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            let err = Error::InvalidInput("Name cannot be empty".into());
            self.notifier.error(&err.to_string());
            return Err(err);
        }

        let phone = phone.map(str::trim).filter(|p| !p.is_empty()).map(str::to_string);
        let changes = [
            ProfileChange::DisplayName(display_name.to_string()),
            ProfileChange::Phone(phone),
        ];

        match self.store.update_profile(&self.owner, &changes).await {
            Ok(()) => {
                if let Some(record) = self.write().as_mut() {
                    record.apply(&changes);
                }
                info!("Saved profile details for {}", self.owner.user_id);
                self.notifier.success("Profile updated");
                Ok(())
            }
            Err(e) => {
                error!("Saving profile for {} failed: {}", self.owner.user_id, e);
                self.notifier
                    .error(&format!("Could not update your profile: {}", e));
                Err(e)
            }
        }
    }

    /// Reconcile after the uploader persisted a new photo
    pub fn apply_avatar(&self, url: &str) {
        if let Some(record) = self.write().as_mut() {
            record.apply(&[ProfileChange::AvatarUrl(url.to_string())]);
        }
    }

    pub fn avatar_display(&self, load_failed: bool) -> AvatarDisplay {
        match self.profile() {
            Some(record) => AvatarDisplay::resolve(record.avatar_url.as_deref(), &record.display_name, load_failed),
            None => AvatarDisplay::Placeholder,
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<ProfileRecord>> {
        self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
