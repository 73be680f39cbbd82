//! Ownership-query endpoint client
//!
//! The endpoint is an authenticated POST carrying a form-encoded `data`
//! field whose value is a JSON query envelope, plus the anti-forgery token
//! obtained from the devices page. Field names and nesting are a fixed
//! external contract.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::fetch::{FetchError, OwnershipQuery, PageRequest, PageResponse};
use crate::domain::item::ItemRecord;
use crate::infrastructure::http_client::HttpClient;

/// Fixed filter parameters of the ownership query. These mirror what the
/// site's own frontend sends; the endpoint returns nothing useful without
/// them.
mod filters {
    pub const CONTENT_TYPE: &str = "Ebook";

    pub const ITEM_STATUS: &[&str] = &["Active", "Expired"];

    pub const EXCLUDE_EXPIRED_ITEMS_FOR: &[&str] = &[
        "KOLL",
        "Purchase",
        "Pottermore",
        "FreeTrial",
        "DeviceRegistration",
        "ku",
        "Sample",
    ];

    pub const ORIGIN_TYPE: &[&str] = &[
        "Purchase",
        "PublicLibraryLending",
        "PersonalLending",
        "KOLL",
        "RFFLending",
        "Pottermore",
        "Rental",
        "DeviceRegistration",
        "FreeTrial",
        "ku",
        "Sample",
    ];
}

#[derive(Serialize)]
struct QueryEnvelope<'a> {
    param: QueryParam<'a>,
}

#[derive(Serialize)]
struct QueryParam<'a> {
    #[serde(rename = "OwnershipData")]
    ownership_data: OwnershipDataQuery<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OwnershipDataQuery<'a> {
    sort_order: &'a str,
    sort_index: &'a str,
    start_index: u32,
    batch_size: u32,
    content_type: &'a str,
    item_status: &'a [&'a str],
    exclude_expired_items_for: &'a [&'a str],
    origin_type: &'a [&'a str],
    #[serde(rename = "isExtendedMYK")]
    is_extended_myk: bool,
}

#[derive(Deserialize)]
struct ResponseEnvelope {
    #[serde(rename = "OwnershipData")]
    ownership_data: OwnershipDataPayload,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OwnershipDataPayload {
    success: Option<bool>,
    #[serde(default)]
    items: Vec<ItemRecord>,
    #[serde(default)]
    has_more_items: bool,
}

/// Client for the ownership-query endpoint, bound to one session token.
pub struct OwnershipEndpoint {
    http: Arc<HttpClient>,
    query_url: String,
    csrf_token: String,
}

impl OwnershipEndpoint {
    pub fn new(http: Arc<HttpClient>, query_url: String, csrf_token: String) -> Self {
        Self {
            http,
            query_url,
            csrf_token,
        }
    }

    fn encode_query(request: &PageRequest) -> String {
        let envelope = QueryEnvelope {
            param: QueryParam {
                ownership_data: OwnershipDataQuery {
                    sort_order: request.order.direction.as_wire(),
                    sort_index: request.order.field.as_wire(),
                    start_index: request.start_index,
                    batch_size: request.batch_size,
                    content_type: filters::CONTENT_TYPE,
                    item_status: filters::ITEM_STATUS,
                    exclude_expired_items_for: filters::EXCLUDE_EXPIRED_ITEMS_FOR,
                    origin_type: filters::ORIGIN_TYPE,
                    is_extended_myk: true,
                },
            },
        };
        serde_json::to_string(&envelope).expect("query envelope serializes")
    }

    fn decode_response(body: &str) -> Result<PageResponse, FetchError> {
        let envelope: ResponseEnvelope =
            serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;
        let payload = envelope.ownership_data;
        Ok(PageResponse {
            success: payload.success,
            items: payload.items,
            has_more_items: payload.has_more_items,
        })
    }
}

#[async_trait]
impl OwnershipQuery for OwnershipEndpoint {
    async fn query_page(&self, request: &PageRequest) -> Result<PageResponse, FetchError> {
        let data = Self::encode_query(request);
        debug!(
            "Posting ownership query: start_index={} batch_size={}",
            request.start_index, request.batch_size
        );

        let (body, _) = self
            .http
            .post_form(
                &self.query_url,
                &[("data", data.as_str()), ("csrfToken", self.csrf_token.as_str())],
            )
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Self::decode_response(&body)
    }
}
