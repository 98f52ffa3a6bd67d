// Profile photo upload: validate, store, persist, report
use crate::{
    backend::{ObjectStorage, ProfileStore},
    config::UploadConfig,
    error::ValidationError,
    models::{Identity, ProfileChange},
    notify::Notifier,
    Error, Result,
};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// A file picked by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Lowercase extension for the stored object, from the name or else the MIME subtype
    pub fn extension(&self) -> String {
        let from_name = self
            .name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));

        from_name
            .or_else(|| {
                self.mime_type
                    .split_once('/')
                    .map(|(_, sub)| sub.to_ascii_lowercase())
                    .filter(|sub| !sub.is_empty() && sub.chars().all(|c| c.is_ascii_alphanumeric()))
            })
            .unwrap_or_else(|| "img".to_string())
    }
}

/// What files are accepted and how long each stage may take
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub max_bytes: u64,
    /// Lowercase MIME types; empty accepts any `image/*`
    pub allowed_types: Vec<String>,
    pub dwell: Duration,
    pub timeout: Duration,
}

impl From<&UploadConfig> for UploadPolicy {
    fn from(config: &UploadConfig) -> Self {
        Self {
            max_bytes: config.max_bytes,
            allowed_types: config
                .allowed_types
                .iter()
                .map(|t| t.trim().to_ascii_lowercase())
                .collect(),
            dwell: config.dwell(),
            timeout: config.timeout(),
        }
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::from(&UploadConfig::default())
    }
}

impl UploadPolicy {
    /// Checks run in order: image type, allowed subtype, size
    pub fn validate(&self, file: &SelectedFile) -> std::result::Result<(), ValidationError> {
        let mime_type = file.mime_type.trim().to_ascii_lowercase();

        if !mime_type.starts_with("image/") {
            return Err(ValidationError::NotAnImage {
                mime_type: file.mime_type.clone(),
            });
        }

        if !self.allowed_types.is_empty() && !self.allowed_types.contains(&mime_type) {
            return Err(ValidationError::UnsupportedType {
                mime_type: file.mime_type.clone(),
                allowed: self.allowed_types.join(", "),
            });
        }

        if file.size() > self.max_bytes {
            return Err(ValidationError::TooLarge {
                size: file.size(),
                limit: self.max_bytes,
            });
        }

        Ok(())
    }
}

/// Observable status of the upload widget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    InProgress,
    Succeeded,
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Succeeded | Phase::Failed)
    }
}

/// Typed upload lifecycle: each phase only offers its legal next steps
///
/// Idle -> InProgress -> (Succeeded | Failed) -> Idle. There is no way to go
/// from a finished upload straight into a new one without `reset`.
#[derive(Debug)]
pub struct Upload<S> {
    attempt: u64,
    state: S,
}

#[derive(Debug)]
pub struct Idle;

#[derive(Debug)]
pub struct InProgress {
    file: SelectedFile,
}

#[derive(Debug)]
pub struct Succeeded {
    url: String,
}

#[derive(Debug)]
pub struct Failed {
    reason: String,
}

impl<S> Upload<S> {
    pub fn attempt(&self) -> u64 {
        self.attempt
    }
}

impl Upload<Idle> {
    pub fn new(attempt: u64) -> Self {
        Self {
            attempt,
            state: Idle,
        }
    }

    pub fn begin(self, file: SelectedFile) -> Upload<InProgress> {
        Upload {
            attempt: self.attempt,
            state: InProgress { file },
        }
    }
}

impl Upload<InProgress> {
    pub fn file(&self) -> &SelectedFile {
        &self.state.file
    }

    pub fn succeed(self, url: String) -> Upload<Succeeded> {
        Upload {
            attempt: self.attempt,
            state: Succeeded { url },
        }
    }

    pub fn fail(self, reason: String) -> Upload<Failed> {
        Upload {
            attempt: self.attempt,
            state: Failed { reason },
        }
    }
}

impl Upload<Succeeded> {
    pub fn url(&self) -> &str {
        &self.state.url
    }
}

impl Upload<Failed> {
    pub fn reason(&self) -> &str {
        &self.state.reason
    }
}

/// A finished upload waiting for its dwell to expire
pub trait Finished: Send + 'static {
    fn attempt(&self) -> u64;
    fn reset(self) -> Upload<Idle>;
}

impl Finished for Upload<Succeeded> {
    fn attempt(&self) -> u64 {
        self.attempt
    }

    fn reset(self) -> Upload<Idle> {
        Upload::new(self.attempt)
    }
}

impl Finished for Upload<Failed> {
    fn attempt(&self) -> u64 {
        self.attempt
    }

    fn reset(self) -> Upload<Idle> {
        Upload::new(self.attempt)
    }
}

/// What a call to `AvatarUploader::handle_selection` ended with
#[derive(Debug)]
pub enum UploadOutcome {
    /// The picker closed without a file
    Skipped,
    /// Another upload from this widget is still running
    Busy,
    /// Refused before any network call
    Rejected(Error),
    Succeeded { url: String },
    Failed { reason: String },
}

/// Object path for a new avatar: namespaced by user, unique per upload
pub fn avatar_path(user_id: &str, file: &SelectedFile, now: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "users/{}/{}-{}.{}",
        user_id,
        now.timestamp_millis(),
        &suffix[..8],
        file.extension()
    )
}

/// Drives one avatar widget: validation, the upload sequence and the status phase
///
/// The pipeline never returns an error. Every failure ends up in the outcome,
/// the phase and a notice.
pub struct AvatarUploader {
    storage: Arc<dyn ObjectStorage>,
    profiles: Arc<dyn ProfileStore>,
    notifier: Arc<dyn Notifier>,
    policy: UploadPolicy,
    phase_tx: Arc<watch::Sender<Phase>>,
    generation: Arc<AtomicU64>,
}

impl AvatarUploader {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        profiles: Arc<dyn ProfileStore>,
        notifier: Arc<dyn Notifier>,
        policy: UploadPolicy,
    ) -> Self {
        let (phase_tx, _) = watch::channel(Phase::Idle);
        Self {
            storage,
            profiles,
            notifier,
            policy,
            phase_tx: Arc::new(phase_tx),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase_tx.borrow()
    }

    /// Watch phase changes, e.g. to re-render the status icon
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase_tx.subscribe()
    }

    /// The file input is locked only while an upload runs
    pub fn input_enabled(&self) -> bool {
        self.phase() != Phase::InProgress
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Handle a file-picker change event
    ///
    /// `on_uploaded` runs once with the new URL after the profile row has been
    /// updated, so the caller can show the photo without refetching the profile.
    pub async fn handle_selection<F>(
        &self,
        file: Option<SelectedFile>,
        owner: Option<&Identity>,
        current_avatar: Option<&str>,
        on_uploaded: F,
    ) -> UploadOutcome
    where
        F: FnOnce(&str),
    {
        let Some(file) = file else {
            debug!("File picker closed without a selection");
            return UploadOutcome::Skipped;
        };

        if self.phase() == Phase::InProgress {
            warn!("Ignoring {}: an upload is already running", file.name);
            return UploadOutcome::Busy;
        }

        if let Err(invalid) = self.policy.validate(&file) {
            self.notifier.error(&invalid.to_string());
            return UploadOutcome::Rejected(invalid.into());
        }

        let Some(owner) = owner else {
            let err = Error::PreconditionError("You need to be signed in to change your photo".into());
            self.notifier.error(&err.to_string());
            return UploadOutcome::Rejected(err);
        };

        let Some(attempt) = self.claim() else {
            warn!("Ignoring {}: an upload is already running", file.name);
            return UploadOutcome::Busy;
        };

        let upload = Upload::new(attempt).begin(file);
        info!(
            "Uploading avatar {} ({} bytes) for {}",
            upload.file().name,
            upload.file().size(),
            owner.user_id
        );

        let result = match tokio::time::timeout(self.policy.timeout, self.store_and_persist(&upload, owner)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                seconds: self.policy.timeout.as_secs(),
            }),
        };

        match result {
            Ok((url, path)) => {
                on_uploaded(&url);
                let done = upload.succeed(url.clone());
                self.phase_tx.send_replace(Phase::Succeeded);
                self.notifier.success("Profile photo updated");
                self.schedule_reset(done);

                self.remove_previous(current_avatar, &path).await;
                UploadOutcome::Succeeded { url }
            }
            Err(err) => {
                let reason = err.to_string();
                error!("Avatar upload {} failed: {}", attempt, reason);
                let done = upload.fail(reason.clone());
                self.phase_tx.send_replace(Phase::Failed);
                self.notifier
                    .error(&format!("Could not update your photo: {}", done.reason()));
                self.schedule_reset(done);
                UploadOutcome::Failed { reason }
            }
        }
    }

    /// Upload, resolve the URL, then point the profile at it. Strictly in order.
    async fn store_and_persist(
        &self,
        upload: &Upload<InProgress>,
        owner: &Identity,
    ) -> Result<(String, String)> {
        let file = upload.file();
        let path = avatar_path(&owner.user_id, file, Utc::now());

        self.storage.upload(&path, &file.bytes, &file.mime_type).await?;
        let url = self.storage.public_url(&path).await?;
        self.profiles
            .update_profile(owner, &[ProfileChange::AvatarUrl(url.clone())])
            .await?;

        Ok((url, path))
    }

    /// Best-effort cleanup of the photo that was just replaced
    async fn remove_previous(&self, current_avatar: Option<&str>, new_path: &str) {
        let Some(old_path) = current_avatar
            .and_then(|url| self.storage.path_for_url(url))
            .filter(|old| old != new_path)
        else {
            return;
        };

        match tokio::time::timeout(self.policy.timeout, self.storage.remove(&old_path)).await {
            Ok(Ok(())) => debug!("Removed previous avatar {}", old_path),
            Ok(Err(e)) => warn!("Could not remove previous avatar {}: {}", old_path, e),
            Err(_) => warn!("Timed out removing previous avatar {}", old_path),
        }
    }

    /// Move to InProgress unless an upload is already running
    fn claim(&self) -> Option<u64> {
        let mut attempt = None;
        self.phase_tx.send_if_modified(|phase| {
            if *phase == Phase::InProgress {
                return false;
            }
            attempt = Some(self.generation.fetch_add(1, Ordering::SeqCst) + 1);
            *phase = Phase::InProgress;
            true
        });
        attempt
    }

    /// Return to Idle after the dwell, unless a newer upload has started
    fn schedule_reset<T: Finished>(&self, done: T) {
        let phase_tx = Arc::clone(&self.phase_tx);
        let generation = Arc::clone(&self.generation);
        let dwell = self.policy.dwell;

        tokio::spawn(async move {
            tokio::time::sleep(dwell).await;

            let attempt = done.attempt();
            let current = phase_tx.send_if_modified(|phase| {
                if phase.is_terminal() && generation.load(Ordering::SeqCst) == attempt {
                    *phase = Phase::Idle;
                    true
                } else {
                    false
                }
            });

            if current {
                let _idle = done.reset();
                debug!("Upload {} status cleared", attempt);
            }
        });
    }
}
