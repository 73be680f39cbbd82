//! Owned-item records and duplicate elimination.
//!
//! Items come back from the ownership endpoint as camelCase JSON payloads.
//! The same item can appear under several sort orders, so merged result sets
//! are deduplicated on the (order detail URL, ASIN) pair.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// One owned e-book as reported by the ownership endpoint.
///
/// Field values are kept exactly as received; records are never mutated after
/// deserialization. Wire fields outside the six we project into the CSV are
/// retained in `extra` so the raw JSON dump stays faithful.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    #[serde(default)]
    pub authors: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub asin: String,

    #[serde(rename = "orderDetailURL", default)]
    pub order_detail_url: String,

    #[serde(rename = "productImage", default)]
    pub product_image: String,

    #[serde(rename = "acquiredDate", default)]
    pub acquired_date: String,

    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl ItemRecord {
    /// Composite identity: two records with the same (order detail URL, ASIN)
    /// pair are the same item regardless of any other field.
    ///
    /// A structured pair is used instead of concatenating the two strings so
    /// that boundary-straddling coincidences cannot merge distinct items.
    pub fn identity_key(&self) -> (&str, &str) {
        (&self.order_detail_url, &self.asin)
    }
}

/// Remove duplicate items, keeping the first occurrence of each identity key.
///
/// Stable: the relative order of surviving records is unchanged. O(n) set
/// membership on the identity key.
pub fn dedupe_items(items: Vec<ItemRecord>) -> Vec<ItemRecord> {
    let mut seen: HashSet<(String, String)> = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| {
            let (url, asin) = item.identity_key();
            seen.insert((url.to_string(), asin.to_string()))
        })
        .collect()
}
