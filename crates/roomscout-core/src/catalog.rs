// The listing collection a browsing session works against
use crate::{models::Listing, Error, Result};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

/// How many listings the home page features
pub const FEATURED_COUNT: usize = 4;

/// Source of catalog versions, shared by every catalog in the process
static NEXT_VERSION: AtomicU64 = AtomicU64::new(1);

fn next_version() -> u64 {
    NEXT_VERSION.fetch_add(1, Ordering::Relaxed)
}

/// Immutable-for-the-session listing collection
///
/// `version` is unique per collection contents: every construction and every
/// `replace` draws a fresh one, so derived views (see `MemoizedFilter`) never
/// confuse two catalogs. Clones share the version along with the listings.
#[derive(Debug, Clone)]
pub struct Catalog {
    listings: Vec<Listing>,
    version: u64,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Catalog {
    pub fn new(listings: Vec<Listing>) -> Self {
        Self {
            listings: dedup_by_id(listings),
            version: next_version(),
        }
    }

    /// Parse a JSON array of listings
    pub fn from_json(json: &str) -> Result<Self> {
        let listings: Vec<Listing> = serde_json::from_str(json)?;
        Ok(Self::new(listings))
    }

    /// Load a JSON array of listings from disk
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let catalog = Self::from_json(&contents)?;
        info!("Loaded {} listings from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    /// Swap in a new collection
    pub fn replace(&mut self, listings: Vec<Listing>) {
        self.listings = dedup_by_id(listings);
        self.version = next_version();
    }

    pub fn listings(&self) -> &[Listing] {
        &self.listings
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    pub fn get(&self, id: &str) -> Result<&Listing> {
        self.listings
            .iter()
            .find(|listing| listing.id == id)
            .ok_or_else(|| Error::NotFound(format!("listing {}", id)))
    }

    /// The first `limit` listings, in catalog order
    pub fn featured(&self, limit: usize) -> &[Listing] {
        &self.listings[..limit.min(self.listings.len())]
    }

    /// Every distinct tag, in first-seen order
    pub fn tags(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.listings
            .iter()
            .flat_map(|listing| listing.tags.iter())
            .filter(|tag| seen.insert(tag.to_lowercase()))
            .map(String::as_str)
            .collect()
    }
}

/// Ids are unique within a catalog; later duplicates are dropped
fn dedup_by_id(listings: Vec<Listing>) -> Vec<Listing> {
    let mut seen = HashSet::new();
    listings
        .into_iter()
        .filter(|listing| {
            let fresh = seen.insert(listing.id.clone());
            if !fresh {
                warn!("Dropping duplicate listing id {}", listing.id);
            }
            fresh
        })
        .collect()
}
