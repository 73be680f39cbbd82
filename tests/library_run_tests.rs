//! End-to-end tests of the fetch-merge-export pipeline over a scripted endpoint
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use kindle_shelf_lib::domain::fetch::{
    FetchError, MultiOrderMerger, OwnershipQuery, PageRequest, PageResponse,
};
use kindle_shelf_lib::domain::item::ItemRecord;
use kindle_shelf_lib::domain::sort_order::FetchPlan;
use kindle_shelf_lib::infrastructure::export;

fn item(url: &str, asin: &str, title: &str) -> ItemRecord {
    ItemRecord {
        authors: "Author, Some".to_string(),
        title: title.to_string(),
        asin: asin.to_string(),
        order_detail_url: url.to_string(),
        product_image: format!("https://example.invalid/img/{asin}.jpg"),
        acquired_date: "July 7, 2015".to_string(),
        extra: HashMap::new(),
    }
}

/// Endpoint stand-in driven by a closure; counts the requests it serves.
struct ScriptedEndpoint {
    requests: Mutex<u32>,
    respond: Box<dyn Fn(&PageRequest) -> Result<PageResponse, FetchError> + Send + Sync>,
}

impl ScriptedEndpoint {
    fn new(
        respond: impl Fn(&PageRequest) -> Result<PageResponse, FetchError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(0),
            respond: Box::new(respond),
        })
    }
}

#[async_trait]
impl OwnershipQuery for ScriptedEndpoint {
    async fn query_page(&self, request: &PageRequest) -> Result<PageResponse, FetchError> {
        *self.requests.lock().unwrap() += 1;
        (self.respond)(request)
    }
}

/// Mirrors the fetch phase's hand-off: the sinks are only written once the
/// whole merge has succeeded.
async fn run_and_export(
    endpoint: Arc<dyn OwnershipQuery>,
    plan: &FetchPlan,
    raw_path: &Path,
    table_path: &Path,
) -> Result<Vec<ItemRecord>, FetchError> {
    let merger = MultiOrderMerger::new(endpoint);
    let items = merger.run(plan, 50).await?;
    export::write_raw(raw_path, &items).expect("raw sink");
    export::write_table(table_path, &items).expect("table sink");
    Ok(items)
}

#[tokio::test]
async fn full_plan_with_disjoint_orders_covers_every_item() {
    // Six orders, each surfacing its own disjoint slice of a 600-item
    // library; together they stay under the per-order ceiling.
    let endpoint = ScriptedEndpoint::new(|req| {
        let slot = (req.order.direction.as_wire(), req.order.field.as_wire());
        let base = match slot {
            ("DESCENDING", "DATE") => 0,
            ("ASCENDING", "DATE") => 100,
            ("DESCENDING", "TITLE") => 200,
            ("ASCENDING", "TITLE") => 300,
            ("DESCENDING", "AUTHOR") => 400,
            _ => 500,
        };
        let items = (base..base + 100)
            .map(|i| item(&format!("https://example.invalid/o/{i}"), &format!("B{i:09}"), "t"))
            .collect();
        Ok(PageResponse {
            success: Some(true),
            items,
            has_more_items: false,
        })
    });

    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("booklist.txt");
    let table = dir.path().join("booklist.csv");

    let items = run_and_export(endpoint.clone(), &FetchPlan::full(), &raw, &table)
        .await
        .unwrap();

    assert_eq!(items.len(), 600);
    assert_eq!(*endpoint.requests.lock().unwrap(), 6);

    let parsed: Vec<ItemRecord> =
        serde_json::from_str(&std::fs::read_to_string(&raw).unwrap()).unwrap();
    assert_eq!(parsed.len(), 600);

    let csv = std::fs::read_to_string(&table).unwrap();
    assert_eq!(csv.lines().count(), 601); // header + one row per item
}

#[tokio::test]
async fn overlapping_orders_collapse_to_unique_items() {
    // Every order returns the same three records.
    let endpoint = ScriptedEndpoint::new(|_| {
        Ok(PageResponse {
            success: Some(true),
            items: vec![
                item("https://example.invalid/o/1", "B000000001", "one"),
                item("https://example.invalid/o/2", "B000000002", "two"),
                item("https://example.invalid/o/3", "B000000003", "three"),
            ],
            has_more_items: false,
        })
    });

    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("booklist.txt");
    let table = dir.path().join("booklist.csv");

    let items = run_and_export(endpoint, &FetchPlan::full(), &raw, &table)
        .await
        .unwrap();
    assert_eq!(items.len(), 3);
}

#[tokio::test]
async fn rejected_page_aborts_before_any_sink_is_written() {
    // Second order's first page comes back without the success marker.
    let endpoint = ScriptedEndpoint::new(|req| {
        if req.order.direction.as_wire() == "ASCENDING" {
            Ok(PageResponse {
                success: None,
                items: vec![],
                has_more_items: false,
            })
        } else {
            Ok(PageResponse {
                success: Some(true),
                items: vec![item("https://example.invalid/o/1", "B000000001", "one")],
                has_more_items: false,
            })
        }
    });

    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("booklist.txt");
    let table = dir.path().join("booklist.csv");

    let result = run_and_export(endpoint, &FetchPlan::full(), &raw, &table).await;

    assert!(matches!(
        result,
        Err(FetchError::MissingSuccess { start_index: 0 })
    ));
    assert!(!raw.exists());
    assert!(!table.exists());
}

#[tokio::test]
async fn latest_mode_is_bounded_by_the_ceiling() {
    // Endpoint claims more items forever; latest mode still ends at 1000.
    let endpoint = ScriptedEndpoint::new(|req| {
        let items = (0..req.batch_size)
            .map(|i| {
                let n = req.start_index + i;
                item(&format!("https://example.invalid/o/{n}"), &format!("B{n:09}"), "t")
            })
            .collect();
        Ok(PageResponse {
            success: Some(true),
            items,
            has_more_items: true,
        })
    });

    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("booklist.txt");
    let table = dir.path().join("booklist.csv");

    let items = run_and_export(endpoint.clone(), &FetchPlan::latest(), &raw, &table)
        .await
        .unwrap();

    assert_eq!(items.len(), 1000);
    assert_eq!(*endpoint.requests.lock().unwrap(), 20);
}
