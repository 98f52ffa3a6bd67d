// Core business logic lives here - listings, search, profiles and photo uploads
pub mod avatar;
pub mod backend;
pub mod catalog;
pub mod config;
pub mod error;
pub mod models;
pub mod notify;
pub mod profile;
pub mod providers;
pub mod search;
pub mod search_with_cache;
pub mod session;
pub mod session_store;
pub mod upload;

pub use avatar::AvatarDisplay;
pub use backend::{AuthBackend, AuthGrant, ObjectStorage, ProfileStore, SignUpResult};
pub use catalog::{Catalog, FEATURED_COUNT};
pub use config::Config;
pub use error::{Error, ValidationError};
pub use models::{Identity, Listing, ProfileChange, ProfileRecord, Role};
pub use notify::{NoticeLevel, Notifier, TracingNotifier};
pub use profile::ProfileService;
pub use providers::SupabaseBackend;
pub use search::{filter_listings, results_label, FilterState, ListingQuery};
pub use search_with_cache::MemoizedFilter;
pub use session::{AuthContext, PasswordChange, Session, SignUpOutcome, SignUpRequest};
pub use session_store::SessionStore;
pub use upload::{AvatarUploader, Phase, SelectedFile, UploadOutcome, UploadPolicy};

/// Result type alias because typing Result<T, Error> everywhere is tedious
pub type Result<T> = std::result::Result<T, Error>;
