use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::session::Session;

/// On-disk home of a remembered session
///
/// Only written when the user asked to stay signed in. The file holds live
/// tokens, so on Unix it is created readable by the owner only.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store under the platform data dir
    pub fn at_default_location() -> crate::Result<Self> {
        Ok(Self::new(Self::default_path()?))
    }

    pub fn default_path() -> crate::Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| crate::Error::ConfigError("Could not find data directory".into()))?
            .join("roomscout");

        Ok(data_dir.join("session.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The saved session, if there is one
    pub fn load(&self) -> crate::Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&self.path)?;
        let session = serde_json::from_str(&contents)
            .map_err(|e| crate::Error::ConfigError(format!("Failed to parse saved session: {}", e)))?;
        Ok(Some(session))
    }

    pub fn save(&self, session: &Session) -> crate::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(session)?;
        let mut file = open_private(&self.path)?;
        file.write_all(contents.as_bytes())?;

        debug!("Saved session to {}", self.path.display());
        Ok(())
    }

    /// Forget the saved session. Nothing saved is fine.
    pub fn clear(&self) -> crate::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Removed saved session {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Open for writing, owner-only from the moment the file exists
#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies on creation; tighten a file left by an older run
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().write(true).create(true).truncate(true).open(path)
}
