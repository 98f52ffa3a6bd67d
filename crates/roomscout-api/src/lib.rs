// Client for the hosted backend: auth, table rows and object storage
pub mod auth;
pub mod client;
pub mod retry;
pub mod rows;
pub mod storage;

// Re-export common types
pub use auth::{AuthSession, AuthUser, SignUpResponse};
pub use client::{error_message, ApiError, BackendClient, Result};
pub use storage::{encode_path, object_path_from_public_url};
