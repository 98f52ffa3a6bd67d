use crate::models::Listing;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Query parameter that carries the search term between pages
pub const SEARCH_PARAM: &str = "search";

/// Everything the rooms page can narrow results by
///
/// Bounds are inclusive and independent: setting one never clamps the other,
/// so `price_min > price_max` simply matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    pub search_text: String,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub location: Option<String>,
    pub required_tags: BTreeSet<String>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the state from the `search` query parameter
    pub fn from_query_param(search: Option<&str>) -> Self {
        Self {
            search_text: search.unwrap_or_default().to_string(),
            ..Self::default()
        }
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search_text = text.into();
        self
    }

    pub fn price_min(mut self, min: f64) -> Self {
        self.price_min = Some(min);
        self
    }

    pub fn price_max(mut self, max: f64) -> Self {
        self.price_max = Some(max);
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.select_location(Some(&location.into()));
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.required_tags.insert(tag.into());
        self
    }

    /// Slider and min/max inputs always move both bounds together
    pub fn set_price_range(&mut self, min: f64, max: f64) {
        self.price_min = Some(min);
        self.price_max = Some(max);
    }

    /// Select a location, or clear it with `None` or an empty string
    pub fn select_location(&mut self, location: Option<&str>) {
        self.location = location
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string);
    }

    /// Check or uncheck an amenity
    pub fn toggle_tag(&mut self, tag: &str, checked: bool) {
        if checked {
            self.required_tags.insert(tag.to_string());
        } else {
            self.required_tags.remove(tag);
        }
    }

    pub fn has_active_filters(&self) -> bool {
        !self.search_text.trim().is_empty()
            || self.price_min.is_some()
            || self.price_max.is_some()
            || self.location.is_some()
            || !self.required_tags.is_empty()
    }

    /// Back to the unfiltered view
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// The `search` parameter to write back into the URL, if any
    pub fn query_param(&self) -> Option<(&'static str, String)> {
        let term = self.search_text.trim();
        if term.is_empty() {
            None
        } else {
            Some((SEARCH_PARAM, term.to_string()))
        }
    }
}

/// Path of the rooms page for a search submitted elsewhere (e.g. the home hero)
pub fn rooms_path(search: &str) -> String {
    match search.trim() {
        "" => "/rooms".to_string(),
        term => format!("/rooms?{}={}", SEARCH_PARAM, urlencoding::encode(term)),
    }
}

/// A `FilterState` with the case folding done once instead of per listing
#[derive(Debug, Clone)]
pub struct ListingQuery {
    tokens: Vec<String>,
    price_min: Option<f64>,
    price_max: Option<f64>,
    location: Option<String>,
    tags: Vec<String>,
}

impl ListingQuery {
    pub fn new(state: &FilterState) -> Self {
        let tokens = state
            .search_text
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        Self {
            tokens,
            price_min: state.price_min,
            price_max: state.price_max,
            location: state
                .location
                .as_deref()
                .filter(|l| !l.is_empty())
                .map(str::to_lowercase),
            tags: state.required_tags.iter().map(|t| t.to_lowercase()).collect(),
        }
    }

    /// True when the listing passes every active constraint
    pub fn matches(&self, listing: &Listing) -> bool {
        self.matches_text(listing)
            && self.matches_price(listing)
            && self.matches_location(listing)
            && self.matches_tags(listing)
    }

    /// Every token must appear somewhere in title, location, tags or description
    fn matches_text(&self, listing: &Listing) -> bool {
        if self.tokens.is_empty() {
            return true;
        }

        let haystack = haystack(listing);
        self.tokens.iter().all(|token| haystack.contains(token.as_str()))
    }

    fn matches_price(&self, listing: &Listing) -> bool {
        self.price_min.map_or(true, |min| listing.price >= min)
            && self.price_max.map_or(true, |max| listing.price <= max)
    }

    fn matches_location(&self, listing: &Listing) -> bool {
        match &self.location {
            Some(location) => listing.location.to_lowercase().contains(location.as_str()),
            None => true,
        }
    }

    /// Exact label match, ignoring case. "Suíte" does not satisfy "Suíte privativa".
    fn matches_tags(&self, listing: &Listing) -> bool {
        if self.tags.is_empty() {
            return true;
        }

        let listing_tags: Vec<String> = listing.tags.iter().map(|t| t.to_lowercase()).collect();
        self.tags
            .iter()
            .all(|required| listing_tags.iter().any(|tag| tag == required))
    }
}

fn haystack(listing: &Listing) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(listing.tags.len() + 3);
    parts.push(&listing.title);
    parts.push(&listing.location);
    parts.extend(listing.tags.iter().map(String::as_str));
    parts.push(&listing.description);
    parts.join(" ").to_lowercase()
}

/// Listings that satisfy `state`, in their original order
pub fn filter_listings<'a>(listings: &'a [Listing], state: &FilterState) -> Vec<&'a Listing> {
    let query = ListingQuery::new(state);
    listings.iter().filter(|listing| query.matches(listing)).collect()
}

/// Result count line shown above the cards
pub fn results_label(count: usize) -> String {
    match count {
        0 => "No rooms match the current filters".to_string(),
        1 => "1 room found".to_string(),
        n => format!("{} rooms found", n),
    }
}
