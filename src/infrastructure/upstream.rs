//! Upstream provider client
//!
//! Models exactly the provider calls the pipeline needs: snapshot status and
//! generation, transaction listing/creation, delta reports and paginated
//! holdings retrieval. The HTTP implementation wraps reqwest with a governor
//! rate limiter so the slow, rate-limited provider is never hammered, and
//! maps HTTP status codes onto the pipeline error taxonomy.

use async_trait::async_trait;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

use super::config::UpstreamConfig;
use crate::domain::errors::PipelineError;
use crate::domain::events::DeltaEntry;
use crate::domain::holding::HoldingRecord;

/// Upstream snapshot/transaction generation stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SnapshotStage {
    None,
    InProgress,
    Completed,
    Failed,
}

/// Provider-reported loading status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamLoadingStatus {
    pub status: SnapshotStage,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_count: Option<u32>,
}

impl UpstreamLoadingStatus {
    pub fn is_completed(&self) -> bool {
        self.status == SnapshotStage::Completed
    }

    /// Completed and created within the freshness window
    pub fn completed_within(&self, window: chrono::Duration) -> bool {
        self.is_completed()
            && self
                .created
                .is_some_and(|created| Utc::now() - created < window)
    }
}

/// One transaction as listed by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamTransaction {
    pub transaction_id: String,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct HoldingsPage {
    holdings: Vec<HoldingRecord>,
}

#[derive(Debug, Deserialize)]
struct DeltaPage {
    holdings: Vec<DeltaEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionsEnvelope {
    holdings_download_transaction_ids: Vec<UpstreamTransaction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeltaReportHandle {
    delta_report_id: String,
}

/// Everything the pipeline asks of the upstream provider
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn get_status(&self, credentials_id: &str)
        -> Result<UpstreamLoadingStatus, PipelineError>;

    /// Fire-and-forget snapshot generation request (provider answers 202)
    async fn request_snapshot(&self, credentials_id: &str) -> Result<(), PipelineError>;

    async fn get_snapshot_page(
        &self,
        credentials_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<HoldingRecord>, PipelineError>;

    async fn list_transactions(
        &self,
        credentials_id: &str,
    ) -> Result<Vec<UpstreamTransaction>, PipelineError>;

    async fn create_transaction(
        &self,
        credentials_id: &str,
    ) -> Result<UpstreamTransaction, PipelineError>;

    async fn get_transaction_status(
        &self,
        credentials_id: &str,
        transaction_id: &str,
    ) -> Result<UpstreamLoadingStatus, PipelineError>;

    async fn get_transaction_page(
        &self,
        credentials_id: &str,
        transaction_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<HoldingRecord>, PipelineError>;

    /// Request a delta report comparing two transactions; returns its id
    async fn request_delta_report(
        &self,
        credentials_id: &str,
        from_transaction: &str,
        to_transaction: &str,
    ) -> Result<String, PipelineError>;

    async fn get_delta_report_status(
        &self,
        credentials_id: &str,
        delta_id: &str,
    ) -> Result<UpstreamLoadingStatus, PipelineError>;

    async fn get_delta_page(
        &self,
        credentials_id: &str,
        delta_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<DeltaEntry>, PipelineError>;
}

/// Rate-limited reqwest implementation of [`UpstreamClient`]
pub struct HttpUpstreamClient {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    config: UpstreamConfig,
}

impl HttpUpstreamClient {
    pub fn new(config: UpstreamConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&config.api_key).context("Invalid API key header value")?,
        );
        headers.insert("accept", HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        let quota = Quota::per_second(
            NonZeroU32::new(config.max_requests_per_second)
                .context("Rate limit must be greater than 0")?,
        );
        let rate_limiter = RateLimiter::direct(quota);

        Ok(Self { client, rate_limiter, config })
    }

    fn url(&self, credentials_id: &str, path: &str) -> String {
        format!("{}/{}/{}", self.config.base_url, credentials_id, path)
    }

    async fn get(&self, url: &str) -> Result<Response, PipelineError> {
        self.rate_limiter.until_ready().await;
        debug!("GET {}", url);
        let response = self.client.get(url).send().await.map_err(transport_error)?;
        check_status(response)
    }

    async fn post(&self, url: &str, body: serde_json::Value) -> Result<Response, PipelineError> {
        self.rate_limiter.until_ready().await;
        debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response)
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: Response,
    ) -> Result<T, PipelineError> {
        response.json::<T>().await.map_err(transport_error)
    }
}

fn transport_error(err: reqwest::Error) -> PipelineError {
    let status = err.status().map_or(0, |s| s.as_u16());
    PipelineError::UpstreamUnavailable { status, message: err.to_string() }
}

/// Map HTTP status codes onto the taxonomy: 401/403 terminal auth failure,
/// other 4xx terminal bad request, 5xx retryable.
fn check_status(response: Response) -> Result<Response, PipelineError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let code = status.as_u16();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Err(PipelineError::UpstreamAuthFailure { status: code })
    } else if status.is_client_error() {
        Err(PipelineError::UpstreamBadRequest { status: code })
    } else {
        Err(PipelineError::UpstreamUnavailable {
            status: code,
            message: format!("upstream responded {status}"),
        })
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstreamClient {
    async fn get_status(
        &self,
        credentials_id: &str,
    ) -> Result<UpstreamLoadingStatus, PipelineError> {
        let response = self.get(&self.url(credentials_id, "holdings/status")).await?;
        Self::decode(response).await
    }

    async fn request_snapshot(&self, credentials_id: &str) -> Result<(), PipelineError> {
        self.post(&self.url(credentials_id, "holdings"), serde_json::json!({})).await?;
        Ok(())
    }

    async fn get_snapshot_page(
        &self,
        credentials_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<HoldingRecord>, PipelineError> {
        // Provider pagination is 1-based
        let url = format!(
            "{}?offset={}&count={}",
            self.url(credentials_id, "holdings"),
            page + 1,
            page_size
        );
        let response = self.get(&url).await?;
        let page: HoldingsPage = Self::decode(response).await?;
        Ok(page.holdings)
    }

    async fn list_transactions(
        &self,
        credentials_id: &str,
    ) -> Result<Vec<UpstreamTransaction>, PipelineError> {
        let response = self
            .get(&self.url(credentials_id, "reports/holdings/transactions"))
            .await?;
        let envelope: TransactionsEnvelope = Self::decode(response).await?;
        Ok(envelope.holdings_download_transaction_ids)
    }

    async fn create_transaction(
        &self,
        credentials_id: &str,
    ) -> Result<UpstreamTransaction, PipelineError> {
        let response = self
            .post(
                &self.url(credentials_id, "reports/holdings/transactions"),
                serde_json::json!({}),
            )
            .await?;
        Self::decode(response).await
    }

    async fn get_transaction_status(
        &self,
        credentials_id: &str,
        transaction_id: &str,
    ) -> Result<UpstreamLoadingStatus, PipelineError> {
        let path = format!("reports/holdings/transactions/{transaction_id}/status");
        let response = self.get(&self.url(credentials_id, &path)).await?;
        Self::decode(response).await
    }

    async fn get_transaction_page(
        &self,
        credentials_id: &str,
        transaction_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<HoldingRecord>, PipelineError> {
        let path = format!(
            "reports/holdings/transactions/{transaction_id}?offset={}&count={}",
            page + 1,
            page_size
        );
        let response = self.get(&self.url(credentials_id, &path)).await?;
        let page: HoldingsPage = Self::decode(response).await?;
        Ok(page.holdings)
    }

    async fn request_delta_report(
        &self,
        credentials_id: &str,
        from_transaction: &str,
        to_transaction: &str,
    ) -> Result<String, PipelineError> {
        let body = serde_json::json!({
            "currentSnapshotId": to_transaction,
            "previousSnapshotId": from_transaction,
        });
        let response = self
            .post(&self.url(credentials_id, "reports/holdings/deltas"), body)
            .await?;
        let handle: DeltaReportHandle = Self::decode(response).await?;
        Ok(handle.delta_report_id)
    }

    async fn get_delta_report_status(
        &self,
        credentials_id: &str,
        delta_id: &str,
    ) -> Result<UpstreamLoadingStatus, PipelineError> {
        let path = format!("reports/holdings/deltas/{delta_id}/status");
        let response = self.get(&self.url(credentials_id, &path)).await?;
        Self::decode(response).await
    }

    async fn get_delta_page(
        &self,
        credentials_id: &str,
        delta_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<DeltaEntry>, PipelineError> {
        let path = format!(
            "reports/holdings/deltas/{delta_id}?offset={}&count={}",
            page + 1,
            page_size
        );
        let response = self.get(&self.url(credentials_id, &path)).await?;
        let page: DeltaPage = Self::decode(response).await?;
        Ok(page.holdings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_freshness_requires_completed_and_recent() {
        let fresh = UpstreamLoadingStatus {
            status: SnapshotStage::Completed,
            created: Some(Utc::now() - chrono::Duration::minutes(2)),
            total_count: Some(100),
        };
        assert!(fresh.completed_within(chrono::Duration::minutes(5)));
        assert!(!fresh.completed_within(chrono::Duration::minutes(1)));

        let pending = UpstreamLoadingStatus {
            status: SnapshotStage::InProgress,
            created: Some(Utc::now()),
            total_count: None,
        };
        assert!(!pending.completed_within(chrono::Duration::minutes(5)));
    }

    #[test]
    fn stage_parses_provider_casing() {
        let status: UpstreamLoadingStatus =
            serde_json::from_str(r#"{"status":"inProgress"}"#).unwrap();
        assert_eq!(status.status, SnapshotStage::InProgress);
        let status: UpstreamLoadingStatus =
            serde_json::from_str(r#"{"status":"completed","totalCount":5000}"#).unwrap();
        assert!(status.is_completed());
        assert_eq!(status.total_count, Some(5000));
    }
}
