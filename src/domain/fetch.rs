//! Paginated multi-order fetch-and-merge engine.
//!
//! The ownership endpoint pages through the account's items with an offset
//! and batch size, but stops being trustworthy at a fixed offset ceiling:
//! past it the service errors or loops even while still claiming
//! `hasMoreItems`. `PaginatedFetcher` walks one sort order up to that
//! ceiling; `MultiOrderMerger` runs the fetcher once per order in a plan and
//! deduplicates the running union after each pass.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::domain::item::{dedupe_items, ItemRecord};
use crate::domain::sort_order::{FetchPlan, SortOrder};

/// Hard offset ceiling of the ownership endpoint. Requests at or beyond this
/// start index are never issued, regardless of `has_more_items`.
pub const MAX_START_INDEX: u32 = 1000;

/// Default page size. Batches up to 100 are known to work; 50 keeps each
/// response comfortably small.
pub const DEFAULT_BATCH_SIZE: u32 = 50;

/// One page query against the ownership endpoint.
///
/// The fixed filter parameters (content type, item status sets, origin types)
/// are a property of the wire protocol and added by the endpoint client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub order: SortOrder,
    pub start_index: u32,
    pub batch_size: u32,
}

/// One page of results.
#[derive(Debug, Clone, Default)]
pub struct PageResponse {
    /// Success marker from the response envelope. Absent and `false` are
    /// equivalent: the page is rejected.
    pub success: Option<bool>,
    pub items: Vec<ItemRecord>,
    pub has_more_items: bool,
}

impl PageResponse {
    pub fn accepted(&self) -> bool {
        self.success == Some(true)
    }
}

/// Errors from the fetch engine. All of them abort the run; there is no retry
/// because a failed page leaves the session in an unknown state.
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("ownership query transport failed: {0}")]
    Transport(String),

    #[error("ownership response at start index {start_index} lacks the success marker")]
    MissingSuccess { start_index: u32 },

    #[error("ownership response could not be decoded: {0}")]
    Decode(String),
}

/// Page-request collaborator. The production implementation posts to the
/// ownership endpoint over the authenticated session; tests substitute
/// scripted responses.
#[async_trait]
pub trait OwnershipQuery: Send + Sync {
    async fn query_page(&self, request: &PageRequest) -> Result<PageResponse, FetchError>;
}

/// Pages through a single sort order until the endpoint reports no more
/// items or the offset ceiling is reached.
pub struct PaginatedFetcher {
    query: Arc<dyn OwnershipQuery>,
}

impl PaginatedFetcher {
    pub fn new(query: Arc<dyn OwnershipQuery>) -> Self {
        Self { query }
    }

    /// Fetch every reachable item under one sort order.
    ///
    /// Reaching the ceiling while `has_more_items` is still true is a normal
    /// termination of this order's pagination, not a failure.
    pub async fn fetch_order(
        &self,
        order: SortOrder,
        batch_size: u32,
    ) -> Result<Vec<ItemRecord>, FetchError> {
        let mut accumulated = Vec::new();
        let mut start_index = 0u32;

        loop {
            info!(
                "Fetching item list in {} order with batch start of {}",
                order, start_index
            );

            let request = PageRequest {
                order,
                start_index,
                batch_size,
            };
            let response = self.query.query_page(&request).await?;
            if !response.accepted() {
                return Err(FetchError::MissingSuccess { start_index });
            }

            accumulated.extend(response.items);

            // The endpoint may keep claiming more items right up to the
            // ceiling; the offset check terminates this order regardless.
            if response.has_more_items && start_index + batch_size < MAX_START_INDEX {
                start_index += batch_size;
            } else {
                break;
            }
        }

        Ok(accumulated)
    }
}

/// Drives `PaginatedFetcher` once per sort order of a plan, deduplicating the
/// running union after every order so earlier orders win ties and the
/// accumulator stays small between passes.
pub struct MultiOrderMerger {
    fetcher: PaginatedFetcher,
}

impl MultiOrderMerger {
    pub fn new(query: Arc<dyn OwnershipQuery>) -> Self {
        Self {
            fetcher: PaginatedFetcher::new(query),
        }
    }

    /// Run the whole plan and return the deduplicated union. Any failing
    /// page aborts the run; partial results are discarded.
    pub async fn run(
        &self,
        plan: &FetchPlan,
        batch_size: u32,
    ) -> Result<Vec<ItemRecord>, FetchError> {
        let mut items: Vec<ItemRecord> = Vec::new();

        for order in plan.orders() {
            let fetched = self.fetcher.fetch_order(*order, batch_size).await?;
            let fetched_count = fetched.len();
            items.extend(fetched);
            items = dedupe_items(items);

            info!(
                "Completed {} order: {} fetched, {} unique so far",
                order,
                fetched_count,
                items.len()
            );
        }

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::domain::sort_order::{SortDirection, SortField};

    fn item(url: &str, asin: &str) -> ItemRecord {
        ItemRecord {
            authors: String::new(),
            title: String::new(),
            asin: asin.to_string(),
            order_detail_url: url.to_string(),
            product_image: String::new(),
            acquired_date: String::new(),
            extra: HashMap::new(),
        }
    }

    fn page(items: Vec<ItemRecord>, has_more: bool) -> PageResponse {
        PageResponse {
            success: Some(true),
            items,
            has_more_items: has_more,
        }
    }

    /// Scripted endpoint that records every request it receives.
    struct ScriptedQuery {
        requests: Mutex<Vec<PageRequest>>,
        respond: Box<dyn Fn(&PageRequest) -> Result<PageResponse, FetchError> + Send + Sync>,
    }

    impl ScriptedQuery {
        fn new(
            respond: impl Fn(&PageRequest) -> Result<PageResponse, FetchError>
                + Send
                + Sync
                + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                requests: Mutex::new(Vec::new()),
                respond: Box::new(respond),
            })
        }

        fn seen(&self) -> Vec<PageRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl OwnershipQuery for ScriptedQuery {
        async fn query_page(&self, request: &PageRequest) -> Result<PageResponse, FetchError> {
            self.requests.lock().unwrap().push(*request);
            (self.respond)(request)
        }
    }

    fn desc_date() -> SortOrder {
        SortOrder::new(SortDirection::Descending, SortField::Date)
    }

    #[tokio::test]
    async fn single_page_order_issues_one_request() {
        let query = ScriptedQuery::new(|req| {
            let items = (0..50)
                .map(|i| item(&format!("u{}", req.start_index + i), "A"))
                .collect();
            Ok(page(items, false))
        });

        let fetcher = PaginatedFetcher::new(query.clone());
        let items = fetcher.fetch_order(desc_date(), 50).await.unwrap();

        assert_eq!(items.len(), 50);
        assert_eq!(query.seen().len(), 1);
        assert_eq!(query.seen()[0].start_index, 0);
    }

    #[tokio::test]
    async fn pagination_stops_at_the_ceiling() {
        // Endpoint always claims more items; the fetcher must still stop
        // before issuing a request at offset 1000.
        let query = ScriptedQuery::new(|req| {
            let items = (0..50)
                .map(|i| item(&format!("u{}", req.start_index + i), "A"))
                .collect();
            Ok(page(items, true))
        });

        let fetcher = PaginatedFetcher::new(query.clone());
        let items = fetcher.fetch_order(desc_date(), 50).await.unwrap();

        let seen = query.seen();
        assert_eq!(seen.len(), 20);
        assert_eq!(seen.first().unwrap().start_index, 0);
        assert_eq!(seen.last().unwrap().start_index, 950);
        assert!(seen.iter().all(|r| r.start_index < MAX_START_INDEX));
        assert_eq!(items.len(), 1000);
    }

    #[tokio::test]
    async fn missing_success_marker_aborts_the_order() {
        let query = ScriptedQuery::new(|_| {
            Ok(PageResponse {
                success: None,
                items: vec![],
                has_more_items: false,
            })
        });

        let fetcher = PaginatedFetcher::new(query);
        let err = fetcher.fetch_order(desc_date(), 50).await.unwrap_err();
        assert!(matches!(err, FetchError::MissingSuccess { start_index: 0 }));
    }

    #[tokio::test]
    async fn transport_failure_propagates_from_merger() {
        let query = ScriptedQuery::new(|_| Err(FetchError::Transport("boom".to_string())));

        let merger = MultiOrderMerger::new(query);
        let err = merger.run(&FetchPlan::full(), 50).await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
    }

    #[tokio::test]
    async fn single_order_plan_matches_fetch_plus_dedupe() {
        let respond = |req: &PageRequest| {
            // Two pages; the second repeats one item of the first.
            if req.start_index == 0 {
                let mut items: Vec<_> = (0..3).map(|i| item(&format!("u{i}"), "A")).collect();
                items.push(item("u0", "A"));
                Ok(page(items, true))
            } else {
                Ok(page(vec![item("u3", "A")], false))
            }
        };

        let merger = MultiOrderMerger::new(ScriptedQuery::new(respond));
        let merged = merger.run(&FetchPlan::latest(), 50).await.unwrap();

        let fetcher = PaginatedFetcher::new(ScriptedQuery::new(respond));
        let direct = dedupe_items(fetcher.fetch_order(desc_date(), 50).await.unwrap());

        assert_eq!(merged, direct);
        assert_eq!(merged.len(), 4);
    }

    #[tokio::test]
    async fn overlapping_orders_merge_to_unique_items() {
        // Every order returns the same three items.
        let query = ScriptedQuery::new(|_| {
            Ok(page(
                vec![item("u1", "A1"), item("u2", "A2"), item("u3", "A3")],
                false,
            ))
        });

        let merger = MultiOrderMerger::new(query.clone());
        let items = merger.run(&FetchPlan::full(), 50).await.unwrap();

        assert_eq!(query.seen().len(), 6);
        assert_eq!(items.len(), 3);
    }

    #[tokio::test]
    async fn disjoint_orders_accumulate_across_the_plan() {
        // Each of the six orders contributes its own hundred items.
        let query = ScriptedQuery::new(|req| {
            let prefix = format!("{}-{}", req.order.direction.as_wire(), req.order.field.as_wire());
            let items = (0..100)
                .map(|i| item(&format!("{prefix}/{i}"), "A"))
                .collect();
            Ok(page(items, false))
        });

        let merger = MultiOrderMerger::new(query);
        let items = merger.run(&FetchPlan::full(), 100).await.unwrap();
        assert_eq!(items.len(), 600);
    }
}
