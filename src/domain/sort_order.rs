//! Sort-order descriptors and fetch plans.
//!
//! The ownership endpoint never returns records past a fixed offset ceiling
//! under any single ordering, so a full extraction walks the list under every
//! direction/field combination and merges the results. The traversal order
//! matters only in that items found under an earlier order win ties.

use serde::{Deserialize, Serialize};

/// Sort direction as the endpoint spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::Ascending => "ASCENDING",
            Self::Descending => "DESCENDING",
        }
    }
}

/// Field the endpoint sorts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortField {
    Date,
    Title,
    Author,
}

impl SortField {
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::Date => "DATE",
            Self::Title => "TITLE",
            Self::Author => "AUTHOR",
        }
    }
}

/// One (direction, field) pair the list can be requested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub direction: SortDirection,
    pub field: SortField,
}

impl SortOrder {
    pub const fn new(direction: SortDirection, field: SortField) -> Self {
        Self { direction, field }
    }
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}",
            self.direction.as_wire().to_lowercase(),
            self.field.as_wire().to_lowercase()
        )
    }
}

/// The ordered sequence of sort orders traversed in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPlan {
    orders: Vec<SortOrder>,
}

impl FetchPlan {
    /// Full extraction: both directions of date, title and author. Six orders
    /// reach roughly twice the per-order ceiling; libraries beyond that stay
    /// partial, which is an endpoint limitation and not recoverable here.
    pub fn full() -> Self {
        use SortDirection::{Ascending, Descending};
        use SortField::{Author, Date, Title};
        Self {
            orders: vec![
                SortOrder::new(Descending, Date),
                SortOrder::new(Ascending, Date),
                SortOrder::new(Descending, Title),
                SortOrder::new(Ascending, Title),
                SortOrder::new(Descending, Author),
                SortOrder::new(Ascending, Author),
            ],
        }
    }

    /// Latest-only mode: a single descending-date pass, capped at the
    /// endpoint ceiling by construction.
    pub fn latest() -> Self {
        Self {
            orders: vec![SortOrder::new(SortDirection::Descending, SortField::Date)],
        }
    }

    pub fn orders(&self) -> &[SortOrder] {
        &self.orders
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}
