pub mod hetzner;

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// A DNS zone as returned by the provider. The name is the suffix every
/// record name inside the zone is relative to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub ttl: i64,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub modified: Option<String>,
}

/// A record as the provider stores it. `name` is zone-relative (`@` is the
/// apex) and `value` is provider-encoded. A missing TTL means the zone
/// default applies.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Record {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub value: String,
    #[serde(default)]
    pub ttl: Option<i64>,
    pub zone_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordParams {
    pub zone_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
    pub last_page: u32,
    #[serde(default)]
    pub total_entries: u32,
}

/// One page of a listing. No pagination metadata means this is the last page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Option<Pagination>,
}

impl<T> Page<T> {
    fn next_page(&self) -> Option<u32> {
        self.pagination
            .filter(|p| p.last_page > p.page)
            .map(|p| p.page + 1)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn list_zones(&self, page: u32, per_page: u32) -> Result<Page<Zone>, TransportError>;
    async fn list_records(
        &self,
        zone_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<Record>, TransportError>;
    async fn create_record(&self, params: &RecordParams) -> Result<Record, TransportError>;
    async fn update_record(
        &self,
        record_id: &str,
        params: &RecordParams,
    ) -> Result<Record, TransportError>;
    async fn delete_record(&self, record_id: &str) -> Result<(), TransportError>;
}

pub async fn fetch_all_zones<T>(transport: &T, per_page: u32) -> Result<Vec<Zone>, TransportError>
where
    T: Transport + ?Sized,
{
    collect_pages("zones", |page| transport.list_zones(page, per_page)).await
}

pub async fn fetch_all_records<T>(
    transport: &T,
    zone_id: &str,
    per_page: u32,
) -> Result<Vec<Record>, TransportError>
where
    T: Transport + ?Sized,
{
    collect_pages("records", |page| transport.list_records(zone_id, page, per_page)).await
}

async fn collect_pages<I, F, Fut>(kind: &str, mut fetch: F) -> Result<Vec<I>, TransportError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page<I>, TransportError>>,
{
    let mut items = Vec::new();
    let mut page = 1;

    loop {
        let result = fetch(page).await?;
        let next = result.next_page();
        debug!(kind, page, count = result.items.len(), "fetched page");
        items.extend(result.items);

        match next {
            Some(n) => page = n,
            None => break,
        }
    }

    Ok(items)
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),
    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),
    #[error("invalid api key: {0}")]
    HeaderError(#[from] reqwest::header::InvalidHeaderValue),
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },
}
