//! Domain module - core extraction logic and entities
//!
//! Everything here is pure with respect to the network: the fetch engine
//! talks to the ownership endpoint only through the `OwnershipQuery` trait.

pub mod fetch;
pub mod item;
pub mod sort_order;

// Re-export commonly used items for convenience
pub use fetch::{
    FetchError, MultiOrderMerger, OwnershipQuery, PageRequest, PageResponse, PaginatedFetcher,
    DEFAULT_BATCH_SIZE, MAX_START_INDEX,
};
pub use item::{dedupe_items, ItemRecord};
pub use sort_order::{FetchPlan, SortDirection, SortField, SortOrder};
