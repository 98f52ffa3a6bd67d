use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_BACKEND_URL: &str = "ROOMSCOUT_BACKEND_URL";
const ENV_ANON_KEY: &str = "ROOMSCOUT_ANON_KEY";

/// Main configuration structure
///
/// Loaded from the config file, then environment overrides are applied.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

impl Config {
    /// Load config from the default location, falling back to defaults
    pub fn load() -> crate::Result<Self> {
        let config_path = Self::config_path()?;
        let config = Self::load_from(&config_path)?;
        Ok(config.with_overrides(|key| std::env::var(key).ok()))
    }

    /// Load config from an explicit path. A missing file means defaults.
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| crate::Error::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Save config to disk
    pub fn save_to(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| crate::Error::ConfigError(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `ROOMSCOUT_*` overrides using `lookup` to read variables
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BACKEND_URL).filter(|v| !v.is_empty()) {
            self.backend.url = Some(url);
        }
        if let Some(key) = lookup(ENV_ANON_KEY).filter(|v| !v.is_empty()) {
            self.backend.anon_key = Some(key);
        }
        self
    }

    /// The config file path under the platform config dir
    pub fn config_path() -> crate::Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| crate::Error::ConfigError("Could not find config directory".into()))?
            .join("roomscout");

        Ok(config_dir.join("config.toml"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Project URL, e.g. https://<project>.supabase.co
    pub url: Option<String>,

    /// Public anon key of the project
    pub anon_key: Option<String>,

    /// Bucket that holds profile photos
    #[serde(default = "default_avatar_bucket")]
    pub avatar_bucket: String,

    /// Profile table for renters
    #[serde(default = "default_renter_table")]
    pub renter_table: String,

    /// Profile table for advertisers
    #[serde(default = "default_advertiser_table")]
    pub advertiser_table: String,
}

fn default_avatar_bucket() -> String {
    "avatars".to_string()
}

fn default_renter_table() -> String {
    "profiles".to_string()
}

fn default_advertiser_table() -> String {
    "advertisers".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            anon_key: None,
            avatar_bucket: default_avatar_bucket(),
            renter_table: default_renter_table(),
            advertiser_table: default_advertiser_table(),
        }
    }
}

impl BackendConfig {
    /// URL and key, or a config error naming what is missing
    pub fn credentials(&self) -> crate::Result<(&str, &str)> {
        let url = self.url.as_deref().filter(|u| !u.is_empty()).ok_or_else(|| {
            crate::Error::ConfigError(format!("backend.url is not set (or {})", ENV_BACKEND_URL))
        })?;
        let key = self
            .anon_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                crate::Error::ConfigError(format!("backend.anon_key is not set (or {})", ENV_ANON_KEY))
            })?;
        Ok((url, key))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Largest accepted photo in bytes
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,

    /// Accepted MIME types. Empty means any `image/*`.
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,

    /// How long the success/error indicator stays before going back to idle
    #[serde(default = "default_dwell_ms")]
    pub dwell_ms: u64,

    /// Deadline for the whole network sequence of one upload
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_bytes() -> u64 {
    5 * 1024 * 1024
}

fn default_allowed_types() -> Vec<String> {
    vec![
        "image/jpeg".to_string(),
        "image/jpg".to_string(),
        "image/png".to_string(),
    ]
}

fn default_dwell_ms() -> u64 {
    2000
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            allowed_types: default_allowed_types(),
            dwell_ms: default_dwell_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl UploadConfig {
    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.dwell_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CatalogConfig {
    /// JSON file with the listing collection
    pub path: Option<PathBuf>,
}
