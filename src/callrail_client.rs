use crate::aggregation::{aggregate_by_service_area, aggregate_by_source};
use crate::callrail_models::*;
use crate::config::Config;
use crate::errors::CallRailError;
use crate::query::{format_date_range, pagination_params, CallFilters, DateRange, QueryParams};
use crate::rate_limit::{RateLimitSnapshot, RateLimitState};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

/// CallRail v3 REST API root.
pub const CALLRAIL_BASE_URL: &str = "https://api.callrail.com/v3";

/// Page size used when pulling calls for the aggregate reports.
pub const AGGREGATION_PAGE_SIZE: u32 = 1000;

/// Default number of pages the aggregate reports will walk.
pub const DEFAULT_MAX_AGGREGATION_PAGES: u32 = 10;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Typed client for the CallRail v3 API.
///
/// Clones share the underlying connection pool and the rate-limit counters.
#[derive(Clone)]
pub struct CallRailClient {
    client: Client,
    base_url: String,
    api_key: String,
    account_id: String,
    rate_limit: RateLimitState,
    max_aggregation_pages: u32,
}

impl std::fmt::Debug for CallRailClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallRailClient")
            .field("base_url", &self.base_url)
            .field("account_id", &self.account_id)
            .field("api_key", &"[REDACTED]")
            .field("rate_limit", &self.rate_limit.snapshot())
            .finish()
    }
}

impl CallRailClient {
    /// Creates a client against the public CallRail API.
    ///
    /// # Errors
    ///
    /// Returns `CallRailError::Configuration` if `api_key` or `account_id` is empty.
    pub fn new(api_key: &str, account_id: &str) -> Result<Self, CallRailError> {
        Self::with_base_url(CALLRAIL_BASE_URL, api_key, account_id)
    }

    /// Creates a client against another API root (mock server, proxy).
    pub fn with_base_url(
        base_url: &str,
        api_key: &str,
        account_id: &str,
    ) -> Result<Self, CallRailError> {
        Self::build(base_url, api_key, account_id, DEFAULT_TIMEOUT)
    }

    /// Creates a client from the service configuration.
    pub fn from_config(config: &Config) -> Result<Self, CallRailError> {
        let client = Self::build(
            &config.callrail_base_url,
            &config.callrail_api_key,
            &config.callrail_account_id,
            Duration::from_secs(config.callrail_timeout_secs),
        )?;
        Ok(client.with_max_aggregation_pages(config.max_aggregation_pages))
    }

    fn build(
        base_url: &str,
        api_key: &str,
        account_id: &str,
        timeout: Duration,
    ) -> Result<Self, CallRailError> {
        if api_key.trim().is_empty() {
            return Err(CallRailError::Configuration(
                "CallRail API key is required".to_string(),
            ));
        }
        if account_id.trim().is_empty() {
            return Err(CallRailError::Configuration(
                "CallRail account ID is required".to_string(),
            ));
        }
        Url::parse(base_url).map_err(|e| {
            CallRailError::Configuration(format!("Invalid CallRail base URL '{}': {}", base_url, e))
        })?;

        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            CallRailError::Configuration(format!("Failed to create CallRail client: {}", e))
        })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            account_id: account_id.to_string(),
            rate_limit: RateLimitState::new(),
            max_aggregation_pages: DEFAULT_MAX_AGGREGATION_PAGES,
        })
    }

    /// Caps how many pages of calls the aggregate reports fetch (minimum 1).
    pub fn with_max_aggregation_pages(mut self, pages: u32) -> Self {
        self.max_aggregation_pages = pages.max(1);
        self
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Current client-side view of the CallRail rate limit.
    pub fn rate_limit(&self) -> RateLimitSnapshot {
        self.rate_limit.snapshot()
    }

    /// Overrides the rate-limit counters, e.g. when restoring known state.
    pub fn set_rate_limit(&self, snapshot: RateLimitSnapshot) {
        self.rate_limit.set(snapshot);
    }

    /// Builds `{base}/a/{account}/{endpoint}` one path segment at a time so
    /// nothing in `endpoint` can climb out of the account.
    fn endpoint_url(&self, endpoint: &str, params: &QueryParams) -> Result<Url, CallRailError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| CallRailError::Configuration(format!("Failed to build URL: {}", e)))?;

        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                CallRailError::Configuration(format!(
                    "CallRail base URL '{}' cannot carry a path",
                    self.base_url
                ))
            })?;
            segments.pop_if_empty().push("a").push(&self.account_id);
            for segment in endpoint.split('/').filter(|s| !s.is_empty()) {
                if segment == "." || segment == ".." {
                    return Err(CallRailError::Configuration(format!(
                        "Invalid CallRail endpoint '{}'",
                        endpoint
                    )));
                }
                segments.push(segment);
            }
        }

        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                if let Some(value) = value {
                    pairs.append_pair(key, value);
                }
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }

        Ok(url)
    }

    /// Issues an authenticated GET against `endpoint` and decodes the body.
    ///
    /// Waits for the rate-limit window to reset first if the last response
    /// said the budget was used up. Non-2xx responses become
    /// `CallRailError::Api` carrying the vendor's message; transport failures
    /// are logged and returned as `CallRailError::Network` without retrying.
    pub async fn request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &QueryParams,
    ) -> Result<T, CallRailError> {
        self.rate_limit.wait_if_exhausted().await;

        let url = self.endpoint_url(endpoint, params)?;
        tracing::debug!("CallRail GET {}", url);

        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Token token={}", self.api_key))
            .send()
            .await
            .map_err(|e| {
                tracing::error!("CallRail request to {} failed: {}", endpoint, e);
                CallRailError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<CallRailErrorBody>(&error_text)
                .ok()
                .and_then(|body| body.message.or(body.error))
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .map(String::from)
                        .unwrap_or_else(|| status.to_string())
                });
            tracing::warn!(
                "CallRail returned {} for {}: {}",
                status.as_u16(),
                endpoint,
                message
            );
            return Err(CallRailError::Api {
                status: status.as_u16(),
                message,
            });
        }

        self.rate_limit.update_from_headers(response.headers());

        response
            .json::<T>()
            .await
            .map_err(|e| CallRailError::Decode(e.to_string()))
    }

    /// Lists calls in a date range, with any vendor filters applied.
    pub async fn get_calls(
        &self,
        date_range: &DateRange,
        page: u32,
        per_page: u32,
        filters: &CallFilters,
    ) -> Result<PaginatedResponse<CallRecord>, CallRailError> {
        let mut params = format_date_range(date_range);
        params.extend(pagination_params(page, per_page));
        params.extend(filters.to_params());

        let calls: PaginatedResponse<CallRecord> = self.request("calls.json", &params).await?;
        tracing::info!(
            "Fetched CallRail calls page {}/{} ({} of {} records)",
            calls.page,
            calls.total_pages,
            calls.records.len(),
            calls.total_records
        );
        Ok(calls)
    }

    /// Fetches one call by id.
    pub async fn get_call(&self, call_id: &str) -> Result<CallRecord, CallRailError> {
        let call_id = resource_id(call_id)?;
        tracing::info!("Fetching CallRail call {}", call_id);
        self.request(&format!("calls/{}.json", call_id), &Vec::new())
            .await
    }

    /// CallRail's own per-day summary for a date range.
    pub async fn get_call_summary(
        &self,
        date_range: &DateRange,
    ) -> Result<CallSummaryResponse, CallRailError> {
        let mut params = format_date_range(date_range);
        params.push(("group_by".to_string(), Some("date".to_string())));
        self.request("calls/summary.json", &params).await
    }

    pub async fn get_tracking_numbers(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<PaginatedResponse<TrackingNumber>, CallRailError> {
        self.request("trackers.json", &pagination_params(page, per_page))
            .await
    }

    pub async fn get_tracking_number(
        &self,
        tracker_id: &str,
    ) -> Result<TrackingNumber, CallRailError> {
        let tracker_id = resource_id(tracker_id)?;
        self.request(&format!("trackers/{}.json", tracker_id), &Vec::new())
            .await
    }

    /// Unanswered calls in a date range.
    pub async fn get_missed_calls(
        &self,
        date_range: &DateRange,
        page: u32,
        per_page: u32,
    ) -> Result<PaginatedResponse<CallRecord>, CallRailError> {
        let filters = CallFilters::new().answered(false);
        self.get_calls(date_range, page, per_page, &filters).await
    }

    /// Calls flagged by CallRail as the caller's first call.
    pub async fn get_first_time_callers(
        &self,
        date_range: &DateRange,
        page: u32,
        per_page: u32,
    ) -> Result<PaginatedResponse<CallRecord>, CallRailError> {
        let filters = CallFilters::new().first_call(true);
        self.get_calls(date_range, page, per_page, &filters).await
    }

    /// Pulls calls for the aggregate reports, page by page, up to the page cap.
    async fn fetch_calls_for_aggregation(
        &self,
        date_range: &DateRange,
    ) -> Result<Vec<CallRecord>, CallRailError> {
        let filters = CallFilters::new();
        let mut calls = Vec::new();
        let mut page = 1;

        loop {
            let response = self
                .get_calls(date_range, page, AGGREGATION_PAGE_SIZE, &filters)
                .await?;
            let has_next = response.has_next_page();
            let total_records = response.total_records;
            calls.extend(response.records);

            if !has_next {
                break;
            }
            if page >= self.max_aggregation_pages {
                tracing::warn!(
                    "Aggregation for {} stopped at {} pages; {} of {} calls left out",
                    date_range,
                    page,
                    total_records.saturating_sub(calls.len() as u64),
                    total_records
                );
                break;
            }
            page += 1;
        }

        Ok(calls)
    }

    /// Calls grouped by traffic source.
    pub async fn get_calls_by_source(
        &self,
        date_range: &DateRange,
    ) -> Result<Vec<SourceAttribution>, CallRailError> {
        let calls = self.fetch_calls_for_aggregation(date_range).await?;
        let report = aggregate_by_source(&calls);
        tracing::info!(
            "Built source report for {}: {} calls across {} sources",
            date_range,
            calls.len(),
            report.len()
        );
        Ok(report)
    }

    /// Calls grouped by the service area matched from each caller's city.
    pub async fn get_calls_by_service_area(
        &self,
        date_range: &DateRange,
        service_areas: &[String],
    ) -> Result<Vec<ServiceAreaPerformance>, CallRailError> {
        let calls = self.fetch_calls_for_aggregation(date_range).await?;
        let report = aggregate_by_service_area(&calls, service_areas);
        tracing::info!(
            "Built service-area report for {}: {} calls across {} areas",
            date_range,
            calls.len(),
            report.len()
        );
        Ok(report)
    }
}

/// Checks that a call or tracker id names a single resource.
fn resource_id(id: &str) -> Result<&str, CallRailError> {
    let id = id.trim();
    if id.is_empty()
        || id == "."
        || id == ".."
        || id.contains(|c: char| matches!(c, '/' | '\\' | '?' | '#'))
    {
        return Err(CallRailError::InvalidId(id.to_string()));
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        assert!(CallRailClient::new("key", "ACC123").is_ok());
    }

    #[test]
    fn test_empty_credentials_rejected() {
        assert!(matches!(
            CallRailClient::new("", "ACC123"),
            Err(CallRailError::Configuration(_))
        ));
        assert!(matches!(
            CallRailClient::new("key", "  "),
            Err(CallRailError::Configuration(_))
        ));
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(matches!(
            CallRailClient::with_base_url("not a url", "key", "ACC123"),
            Err(CallRailError::Configuration(_))
        ));
    }

    #[test]
    fn test_endpoint_url_skips_empty_params() {
        let client = CallRailClient::new("key", "ACC123").unwrap();
        let params = vec![
            ("date_range".to_string(), Some("today".to_string())),
            ("answered".to_string(), None),
            ("search".to_string(), Some("garage door".to_string())),
        ];
        let url = client.endpoint_url("calls.json", &params).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.callrail.com/v3/a/ACC123/calls.json?date_range=today&search=garage+door"
        );

        let bare = client.endpoint_url("trackers/TRK1.json", &Vec::new()).unwrap();
        assert_eq!(bare.as_str(), "https://api.callrail.com/v3/a/ACC123/trackers/TRK1.json");
    }

    #[test]
    fn test_endpoint_url_keeps_base_path_and_encodes_segments() {
        let client = CallRailClient::with_base_url("http://localhost:9000/", "key", "ACC123").unwrap();
        let url = client.endpoint_url("calls/CAL 1.json", &Vec::new()).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/a/ACC123/calls/CAL%201.json");

        assert!(matches!(
            client.endpoint_url("calls/../../OTHER/calls.json", &Vec::new()),
            Err(CallRailError::Configuration(_))
        ));
    }

    #[test]
    fn test_resource_id_rejects_path_tricks() {
        assert_eq!(resource_id(" CAL123 ").unwrap(), "CAL123");
        for bad in ["", "  ", ".", "..", "../../OTHER/calls", "CAL1?x=1", "CAL1#frag", "a\\b"] {
            assert_eq!(
                resource_id(bad),
                Err(CallRailError::InvalidId(bad.trim().to_string())),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let client = CallRailClient::new("super-secret", "ACC123").unwrap();
        let debug = format!("{:?}", client);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("ACC123"));
    }

    #[test]
    fn test_page_cap_has_floor_of_one() {
        let client = CallRailClient::new("key", "ACC123")
            .unwrap()
            .with_max_aggregation_pages(0);
        assert_eq!(client.max_aggregation_pages, 1);
    }
}
