use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, IntoUrl, Response, Url};
use serde::Deserialize;
use tracing::debug;

use super::{Page, Pagination, Record, RecordParams, Transport, TransportError, Zone};
use crate::rate_limit::RateLimit;

pub const DEFAULT_BASE_URL: &str = "https://dns.hetzner.com/api/v1/";

const API_TOKEN_HEADER: &str = "Auth-API-Token";

#[derive(Debug)]
pub struct HetznerClient {
    base_url: Url,
    client: Client,
    limit: RateLimit,
}

impl HetznerClient {
    pub fn new<U: IntoUrl>(
        api_key: &str,
        base_url: U,
        requests_per_second: u64,
    ) -> Result<Self, TransportError> {
        let mut base_url = base_url.into_url()?;
        // Url::join replaces the last segment unless the path ends in a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let mut token = HeaderValue::from_str(api_key)?;
        token.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(API_TOKEN_HEADER, token);

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            base_url,
            client,
            limit: RateLimit::new(requests_per_second, Duration::from_secs(1)),
        })
    }

    fn url(&self, path: &str) -> Result<Url, TransportError> {
        Ok(self.base_url.join(path)?)
    }
}

#[async_trait::async_trait]
impl Transport for HetznerClient {
    #[tracing::instrument(skip(self))]
    async fn list_zones(&self, page: u32, per_page: u32) -> Result<Page<Zone>, TransportError> {
        let mut url = self.url("zones")?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &per_page.to_string());

        self.limit.ready().await;
        let body = check_status(self.client.get(url).send().await?)
            .await?
            .json::<ZonesResponse>()
            .await?;

        debug!("got {} zones from Hetzner", body.zones.len());

        Ok(Page {
            items: body.zones,
            pagination: body.meta.map(|m| m.pagination),
        })
    }

    #[tracing::instrument(skip(self))]
    async fn list_records(
        &self,
        zone_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<Record>, TransportError> {
        let mut url = self.url("records")?;
        url.query_pairs_mut()
            .append_pair("zone_id", zone_id)
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &per_page.to_string());

        self.limit.ready().await;
        let body = check_status(self.client.get(url).send().await?)
            .await?
            .json::<RecordsResponse>()
            .await?;

        debug!("got {} records from Hetzner", body.records.len());

        Ok(Page {
            items: body.records,
            pagination: body.meta.map(|m| m.pagination),
        })
    }

    #[tracing::instrument(skip(self))]
    async fn create_record(&self, params: &RecordParams) -> Result<Record, TransportError> {
        let url = self.url("records")?;

        self.limit.ready().await;
        let body = check_status(self.client.post(url).json(params).send().await?)
            .await?
            .json::<RecordResponse>()
            .await?;

        Ok(body.record)
    }

    #[tracing::instrument(skip(self))]
    async fn update_record(
        &self,
        record_id: &str,
        params: &RecordParams,
    ) -> Result<Record, TransportError> {
        let url = self.url(&format!("records/{record_id}"))?;

        self.limit.ready().await;
        let body = check_status(self.client.put(url).json(params).send().await?)
            .await?
            .json::<RecordResponse>()
            .await?;

        Ok(body.record)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_record(&self, record_id: &str) -> Result<(), TransportError> {
        let url = self.url(&format!("records/{record_id}"))?;

        self.limit.ready().await;
        check_status(self.client.delete(url).send().await?).await?;

        Ok(())
    }
}

async fn check_status(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(TransportError::Status {
        status: status.as_u16(),
        body,
    })
}

#[derive(Debug, Deserialize)]
struct Meta {
    pagination: Pagination,
}

#[derive(Debug, Deserialize)]
struct ZonesResponse {
    #[serde(default)]
    zones: Vec<Zone>,
    #[serde(default)]
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct RecordsResponse {
    #[serde(default)]
    records: Vec<Record>,
    #[serde(default)]
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct RecordResponse {
    record: Record,
}
