//! Kindle Shelf - ownership-list extraction tool
//!
//! Signs into an account over a cookie HTTP session and reconstructs its
//! e-book ownership list from the capped paginated ownership endpoint by
//! querying it under multiple sort orders, merging, and deduplicating.

// Module declarations
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
