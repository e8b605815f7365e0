use crate::callrail_client::CallRailClient;
use crate::callrail_models::*;
use crate::config::{parse_service_areas, Config};
use crate::errors::{AppError, ResultExt};
use crate::query::{CallFilters, DateRange};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use moka::future::Cache;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

const DEFAULT_PER_PAGE: u32 = 25;

/// Largest `per_page` the listing routes accept.
const MAX_PER_PAGE: u32 = 250;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// CallRail API client (clones share the rate-limit counters).
    pub client: CallRailClient,
    /// Application configuration.
    pub config: Config,
    /// Aggregate report cache.
    /// Key: "sources:{range}" or "areas:{range}:{areas}", Value: report JSON.
    pub report_cache: Cache<String, serde_json::Value>,
}

/// Routes served under `/api/v1/callrail`.
pub fn callrail_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/callrail/calls", get(list_calls))
        .route("/api/v1/callrail/calls/missed", get(list_missed_calls))
        .route("/api/v1/callrail/calls/first-time", get(list_first_time_callers))
        .route("/api/v1/callrail/calls/:id", get(get_call))
        .route("/api/v1/callrail/summary", get(call_summary))
        .route("/api/v1/callrail/trackers", get(list_trackers))
        .route("/api/v1/callrail/trackers/:id", get(get_tracker))
        .route("/api/v1/callrail/reports/sources", get(source_report))
        .route(
            "/api/v1/callrail/reports/service-areas",
            get(service_area_report),
        )
}

/// Health check endpoint.
///
/// Returns the service status, version and the client's current view of the
/// CallRail rate limit.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "callrail-reporting",
            "version": env!("CARGO_PKG_VERSION"),
            "rate_limit": state.client.rate_limit(),
        })),
    )
}

/// Pulls the date range out of the query map.
///
/// Accepts `date_range=<preset>`, `date_range=<start>..<end>` or
/// `start_date=&end_date=`. Falls back to the last 30 days.
fn take_date_range(params: &mut BTreeMap<String, String>) -> Result<DateRange, AppError> {
    let start = params.remove("start_date");
    let end = params.remove("end_date");
    let preset = params.remove("date_range");

    match (start, end, preset) {
        (Some(start), Some(end), _) => format!("{}..{}", start, end)
            .parse()
            .map_err(AppError::BadRequest),
        (Some(_), None, _) | (None, Some(_), _) => Err(AppError::BadRequest(
            "start_date and end_date must be given together".to_string(),
        )),
        (None, None, Some(preset)) => preset.parse().map_err(AppError::BadRequest),
        (None, None, None) => Ok(DateRange::default()),
    }
}

fn take_u32(
    params: &mut BTreeMap<String, String>,
    key: &str,
    default: u32,
) -> Result<u32, AppError> {
    match params.remove(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::BadRequest(format!("{} must be a positive integer", key))),
        None => Ok(default),
    }
}

fn take_pagination(params: &mut BTreeMap<String, String>) -> Result<(u32, u32), AppError> {
    let page = take_u32(params, "page", 1)?;
    let per_page = take_u32(params, "per_page", DEFAULT_PER_PAGE)?;
    if page == 0 {
        return Err(AppError::BadRequest("page starts at 1".to_string()));
    }
    if per_page == 0 || per_page > MAX_PER_PAGE {
        return Err(AppError::BadRequest(format!(
            "per_page must be between 1 and {}",
            MAX_PER_PAGE
        )));
    }
    Ok((page, per_page))
}

/// Fails if anything is left in the query map after the known keys were taken.
fn reject_leftovers(params: BTreeMap<String, String>) -> Result<(), AppError> {
    if params.is_empty() {
        return Ok(());
    }
    let keys: Vec<String> = params.into_keys().collect();
    Err(AppError::BadRequest(format!(
        "Unsupported query parameters: {}",
        keys.join(", ")
    )))
}

/// GET /api/v1/callrail/calls
///
/// Any query key other than the date range and pagination is passed to
/// CallRail as a filter.
pub async fn list_calls(
    State(state): State<Arc<AppState>>,
    Query(mut params): Query<BTreeMap<String, String>>,
) -> Result<Json<PaginatedResponse<CallRecord>>, AppError> {
    let date_range = take_date_range(&mut params)?;
    let (page, per_page) = take_pagination(&mut params)?;
    let filters = CallFilters::from_map(params).map_err(AppError::BadRequest)?;
    tracing::info!("GET /callrail/calls - range: {}, page: {}", date_range, page);

    let calls = state
        .client
        .get_calls(&date_range, page, per_page, &filters)
        .await?;
    Ok(Json(calls))
}

/// GET /api/v1/callrail/calls/missed
///
/// Only the date range and pagination are accepted; use `/calls?answered=false`
/// for further filtering.
pub async fn list_missed_calls(
    State(state): State<Arc<AppState>>,
    Query(mut params): Query<BTreeMap<String, String>>,
) -> Result<Json<PaginatedResponse<CallRecord>>, AppError> {
    let date_range = take_date_range(&mut params)?;
    let (page, per_page) = take_pagination(&mut params)?;
    reject_leftovers(params)?;
    tracing::info!("GET /callrail/calls/missed - range: {}", date_range);

    let calls = state
        .client
        .get_missed_calls(&date_range, page, per_page)
        .await?;
    Ok(Json(calls))
}

/// GET /api/v1/callrail/calls/first-time
///
/// Same query rules as `/calls/missed`.
pub async fn list_first_time_callers(
    State(state): State<Arc<AppState>>,
    Query(mut params): Query<BTreeMap<String, String>>,
) -> Result<Json<PaginatedResponse<CallRecord>>, AppError> {
    let date_range = take_date_range(&mut params)?;
    let (page, per_page) = take_pagination(&mut params)?;
    reject_leftovers(params)?;
    tracing::info!("GET /callrail/calls/first-time - range: {}", date_range);

    let calls = state
        .client
        .get_first_time_callers(&date_range, page, per_page)
        .await?;
    Ok(Json(calls))
}

/// GET /api/v1/callrail/calls/:id
pub async fn get_call(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CallRecord>, AppError> {
    tracing::info!("GET /callrail/calls/{}", id);
    let call = state.client.get_call(&id).await?;
    Ok(Json(call))
}

/// GET /api/v1/callrail/summary
pub async fn call_summary(
    State(state): State<Arc<AppState>>,
    Query(mut params): Query<BTreeMap<String, String>>,
) -> Result<Json<CallSummaryResponse>, AppError> {
    let date_range = take_date_range(&mut params)?;
    tracing::info!("GET /callrail/summary - range: {}", date_range);
    let summary = state.client.get_call_summary(&date_range).await?;
    Ok(Json(summary))
}

/// GET /api/v1/callrail/trackers
pub async fn list_trackers(
    State(state): State<Arc<AppState>>,
    Query(mut params): Query<BTreeMap<String, String>>,
) -> Result<Json<PaginatedResponse<TrackingNumber>>, AppError> {
    let (page, per_page) = take_pagination(&mut params)?;
    let trackers = state.client.get_tracking_numbers(page, per_page).await?;
    Ok(Json(trackers))
}

/// GET /api/v1/callrail/trackers/:id
pub async fn get_tracker(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TrackingNumber>, AppError> {
    tracing::info!("GET /callrail/trackers/{}", id);
    let tracker = state.client.get_tracking_number(&id).await?;
    Ok(Json(tracker))
}

/// GET /api/v1/callrail/reports/sources
///
/// Cached per date range for `report_cache_ttl_secs`.
pub async fn source_report(
    State(state): State<Arc<AppState>>,
    Query(mut params): Query<BTreeMap<String, String>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let date_range = take_date_range(&mut params)?;
    let cache_key = format!("sources:{}", date_range);

    let client = state.client.clone();
    let range = date_range;
    let report = state
        .report_cache
        .try_get_with(cache_key, async move {
            let data = client
                .get_calls_by_source(&range)
                .await
                .context("Building source report")?;
            Ok::<_, AppError>(json!({
                "date_range": range.to_string(),
                "data": data,
            }))
        })
        .await
        .map_err(|e| e.as_ref().clone())?;

    Ok(Json(report))
}

/// GET /api/v1/callrail/reports/service-areas?areas=Orlando,Winter%20Park
///
/// Uses the configured `SERVICE_AREAS` when `areas` is not given.
pub async fn service_area_report(
    State(state): State<Arc<AppState>>,
    Query(mut params): Query<BTreeMap<String, String>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let date_range = take_date_range(&mut params)?;
    let areas = params
        .remove("areas")
        .map(|raw| parse_service_areas(&raw))
        .filter(|areas| !areas.is_empty())
        .unwrap_or_else(|| state.config.service_areas.clone());

    if areas.is_empty() {
        return Err(AppError::BadRequest(
            "No service areas given and none configured".to_string(),
        ));
    }

    // Labels echo the areas as given, so the key must keep their case.
    let cache_key = format!("areas:{}:{}", date_range, areas.join("|"));
    let client = state.client.clone();
    let range = date_range;
    let report = state
        .report_cache
        .try_get_with(cache_key, async move {
            let data = client
                .get_calls_by_service_area(&range, &areas)
                .await
                .context("Building service-area report")?;
            Ok::<_, AppError>(json!({
                "date_range": range.to_string(),
                "data": data,
            }))
        })
        .await
        .map_err(|e| e.as_ref().clone())?;

    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_take_date_range_variants() {
        let mut p = params(&[("date_range", "last_7_days"), ("source", "Google")]);
        assert_eq!(take_date_range(&mut p).unwrap(), DateRange::preset("last_7_days"));
        assert_eq!(p.len(), 1);

        let mut p = params(&[("start_date", "2024-01-01"), ("end_date", "2024-01-31")]);
        assert_eq!(
            take_date_range(&mut p).unwrap(),
            DateRange::custom("2024-01-01", "2024-01-31")
        );

        let mut p = params(&[("start_date", "2024-01-01")]);
        assert!(matches!(take_date_range(&mut p), Err(AppError::BadRequest(_))));

        let mut p = params(&[]);
        assert_eq!(take_date_range(&mut p).unwrap(), DateRange::default());
    }

    #[test]
    fn test_take_pagination_bounds() {
        let mut p = params(&[]);
        assert_eq!(take_pagination(&mut p).unwrap(), (1, DEFAULT_PER_PAGE));

        let mut p = params(&[("page", "0")]);
        assert!(take_pagination(&mut p).is_err());

        let mut p = params(&[("per_page", "250")]);
        assert_eq!(take_pagination(&mut p).unwrap(), (1, MAX_PER_PAGE));

        let mut p = params(&[("per_page", "251")]);
        assert!(matches!(take_pagination(&mut p), Err(AppError::BadRequest(_))));

        let mut p = params(&[("per_page", "1000")]);
        assert!(take_pagination(&mut p).is_err());

        let mut p = params(&[("page", "two")]);
        assert!(take_pagination(&mut p).is_err());
    }

    #[test]
    fn test_reject_leftovers_names_the_keys() {
        assert!(reject_leftovers(params(&[])).is_ok());

        match reject_leftovers(params(&[("source", "Google"), ("direction", "inbound")])) {
            Err(AppError::BadRequest(msg)) => {
                assert_eq!(msg, "Unsupported query parameters: direction, source")
            }
            other => panic!("expected BadRequest, got {:?}", other),
        }
    }
}
