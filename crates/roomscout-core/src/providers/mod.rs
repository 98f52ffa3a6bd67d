// Backend provider implementations
pub mod schema;
pub mod supabase;

pub use schema::{ProfileSchema, ProfileSchemas};
pub use supabase::SupabaseBackend;
