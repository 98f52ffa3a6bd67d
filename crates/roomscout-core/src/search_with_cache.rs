// Filtering with the last result kept around
use crate::{
    catalog::Catalog,
    models::Listing,
    search::{FilterState, ListingQuery},
};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::debug;

/// Remembers the last filtered view as indices into the catalog
///
/// Re-rendering with an unchanged state and catalog skips the scan entirely.
/// Every catalog carries a process-unique version, so the entry is only
/// reused for the exact collection it was computed from.
#[derive(Debug, Default)]
pub struct MemoizedFilter {
    last: Option<CachedView>,
    hits: u64,
    misses: u64,
}

#[derive(Debug)]
struct CachedView {
    fingerprint: u64,
    version: u64,
    indices: Vec<usize>,
}

impl MemoizedFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply<'a>(&mut self, catalog: &'a Catalog, state: &FilterState) -> Vec<&'a Listing> {
        let fingerprint = fingerprint(state);
        let listings = catalog.listings();

        if let Some(view) = &self.last {
            if view.fingerprint == fingerprint && view.version == catalog.version() {
                self.hits += 1;
                return view.indices.iter().map(|&i| &listings[i]).collect();
            }
        }

        self.misses += 1;
        let query = ListingQuery::new(state);
        let indices: Vec<usize> = listings
            .iter()
            .enumerate()
            .filter(|(_, listing)| query.matches(listing))
            .map(|(i, _)| i)
            .collect();
        debug!(
            "Filtered {} listings down to {} (catalog v{})",
            listings.len(),
            indices.len(),
            catalog.version()
        );

        let view = indices.iter().map(|&i| &listings[i]).collect();
        self.last = Some(CachedView {
            fingerprint,
            version: catalog.version(),
            indices,
        });
        view
    }

    pub fn invalidate(&mut self) {
        self.last = None;
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

/// Stable hash of a filter state; prices are hashed by bit pattern
fn fingerprint(state: &FilterState) -> u64 {
    let mut hasher = DefaultHasher::new();
    state.search_text.hash(&mut hasher);
    state.price_min.map(f64::to_bits).hash(&mut hasher);
    state.price_max.map(f64::to_bits).hash(&mut hasher);
    state.location.hash(&mut hasher);
    state.required_tags.hash(&mut hasher);
    hasher.finish()
}
