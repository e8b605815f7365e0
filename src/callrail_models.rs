use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// One phone call as returned by `calls.json` / `calls/{id}.json`.
/// Documentation: https://apidocs.callrail.com/#calls
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct CallRecord {
    /// CallRail call identifier (e.g. "CAL8154748ae6bd4e278a7cddd38a662f4f")
    pub id: String,

    /// When the call started, with the account's UTC offset
    #[serde(default)]
    pub start_time: Option<DateTime<FixedOffset>>,

    /// Call length in seconds (null while the call is in progress)
    #[serde(default)]
    pub duration: Option<u32>,

    /// Whether the call was answered
    #[serde(default)]
    pub answered: bool,

    /// Whether this was the caller's first call to the account
    #[serde(default)]
    pub first_call: bool,

    /// "inbound" or "outbound"
    #[serde(default)]
    pub direction: Option<String>,

    #[serde(default)]
    pub customer_name: Option<String>,

    #[serde(default)]
    pub customer_phone_number: Option<String>,

    #[serde(default)]
    pub customer_city: Option<String>,

    #[serde(default)]
    pub customer_state: Option<String>,

    #[serde(default)]
    pub customer_country: Option<String>,

    /// Number the caller dialed
    #[serde(default)]
    pub tracking_phone_number: Option<String>,

    /// Number the call was forwarded to
    #[serde(default)]
    pub business_phone_number: Option<String>,

    /// Traffic source attribution (e.g. "Google Organic", "Direct")
    #[serde(default)]
    pub source: Option<String>,

    #[serde(default)]
    pub medium: Option<String>,

    #[serde(default)]
    pub campaign: Option<String>,

    #[serde(default)]
    pub voicemail: bool,

    /// Recording download URL, if the call was recorded
    #[serde(default)]
    pub recording: Option<String>,

    /// Recording length in seconds, as CallRail sends it (string or number)
    #[serde(default)]
    pub recording_duration: Option<serde_json::Value>,

    /// Browser player URL for the recording
    #[serde(default)]
    pub recording_player: Option<String>,
}

impl CallRecord {
    /// Duration in seconds, treating an unknown duration as zero.
    pub fn duration_secs(&self) -> f64 {
        f64::from(self.duration.unwrap_or(0))
    }

    /// Whether CallRail attached a recording to this call.
    pub fn has_recording(&self) -> bool {
        self.recording.is_some() || self.recording_player.is_some()
    }
}

/// Where a tracker gets its attribution from (e.g. `{"type": "google_my_business"}`).
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct TrackerSource {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,

    #[serde(default)]
    pub name: Option<String>,
}

/// A provisioned tracking number ("tracker" in CallRail terms).
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct TrackingNumber {
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    /// "source" or "session"
    #[serde(rename = "type", default)]
    pub tracking_type: Option<String>,

    /// "active" or "disabled"
    #[serde(default)]
    pub status: Option<String>,

    /// E.164 numbers attached to the tracker
    #[serde(default)]
    pub tracking_numbers: Vec<String>,

    /// Display form, e.g. "(407) 555-0123"
    #[serde(default)]
    pub formatted_tracking_number: Option<String>,

    #[serde(default)]
    pub destination_number: Option<String>,

    #[serde(default)]
    pub source: Option<TrackerSource>,
}

/// One page of a CallRail listing.
///
/// CallRail names the records array after the resource (`calls`, `trackers`),
/// so the field accepts either.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PaginatedResponse<T> {
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
    pub total_records: u64,
    #[serde(alias = "calls", alias = "trackers", default = "Vec::new")]
    pub records: Vec<T>,
}

impl<T> PaginatedResponse<T> {
    /// Whether CallRail reports more pages after this one.
    pub fn has_next_page(&self) -> bool {
        self.page < self.total_pages
    }
}

/// One summary row from `calls/summary.json` grouped by date.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct CallSummary {
    /// Group key, e.g. "2024-03-01"
    #[serde(alias = "key", default)]
    pub date: Option<String>,

    #[serde(default)]
    pub total_calls: u64,

    #[serde(default)]
    pub answered_calls: u64,

    #[serde(default)]
    pub missed_calls: u64,

    #[serde(default)]
    pub first_time_callers: u64,

    #[serde(default)]
    pub average_duration: Option<f64>,
}

/// Body of `calls/summary.json`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct CallSummaryResponse {
    #[serde(default)]
    pub start_date: Option<String>,

    #[serde(default)]
    pub end_date: Option<String>,

    #[serde(default)]
    pub time_zone: Option<String>,

    #[serde(alias = "grouped_results", alias = "summary", default)]
    pub rows: Vec<CallSummary>,
}

/// Calls grouped by traffic source.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SourceAttribution {
    pub source: String,
    pub total_calls: u64,
    pub answered_calls: u64,
    pub first_time_callers: u64,
    /// Mean call duration in seconds
    pub average_duration: f64,
}

impl SourceAttribution {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            total_calls: 0,
            answered_calls: 0,
            first_time_callers: 0,
            average_duration: 0.0,
        }
    }
}

/// Calls grouped by the service area matched from the caller's city.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ServiceAreaPerformance {
    pub area: String,
    pub total_calls: u64,
    pub answered_calls: u64,
    pub first_time_callers: u64,
    /// answered / total * 100, or 0 when there were no calls
    pub conversion_rate: f64,
}

impl ServiceAreaPerformance {
    pub fn new(area: impl Into<String>) -> Self {
        Self {
            area: area.into(),
            total_calls: 0,
            answered_calls: 0,
            first_time_callers: 0,
            conversion_rate: 0.0,
        }
    }
}

/// CallRail's JSON error body.
#[derive(Debug, Clone, Deserialize)]
pub struct CallRailErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_record_from_vendor_json() {
        let json = serde_json::json!({
            "id": "CAL123",
            "answered": true,
            "first_call": false,
            "duration": 184,
            "start_time": "2024-03-01T09:15:02.000-05:00",
            "customer_city": "Orlando",
            "customer_state": "FL",
            "source": "Google Organic",
            "recording": null,
            "recording_duration": "184"
        });

        let call: CallRecord = serde_json::from_value(json).unwrap();
        assert_eq!(call.id, "CAL123");
        assert!(call.answered);
        assert_eq!(call.duration, Some(184));
        assert_eq!(call.customer_city.as_deref(), Some("Orlando"));
        assert!(call.start_time.is_some());
        assert!(!call.has_recording());
    }

    #[test]
    fn test_call_record_tolerates_missing_fields() {
        let call: CallRecord = serde_json::from_value(serde_json::json!({"id": "CAL1"})).unwrap();
        assert!(!call.answered);
        assert!(call.source.is_none());
        assert_eq!(call.duration_secs(), 0.0);
    }

    #[test]
    fn test_paginated_response_accepts_resource_key() {
        let calls: PaginatedResponse<CallRecord> = serde_json::from_value(serde_json::json!({
            "page": 1,
            "per_page": 100,
            "total_pages": 3,
            "total_records": 250,
            "calls": [{"id": "CAL1"}, {"id": "CAL2"}]
        }))
        .unwrap();
        assert_eq!(calls.records.len(), 2);
        assert!(calls.has_next_page());

        let trackers: PaginatedResponse<TrackingNumber> =
            serde_json::from_value(serde_json::json!({
                "page": 1,
                "per_page": 100,
                "total_pages": 1,
                "total_records": 1,
                "trackers": [{
                    "id": "TRK1",
                    "name": "Google My Business",
                    "type": "source",
                    "status": "active",
                    "tracking_numbers": ["+14075550123"],
                    "source": {"type": "google_my_business"}
                }]
            }))
            .unwrap();
        assert_eq!(trackers.records[0].tracking_type.as_deref(), Some("source"));
        assert_eq!(
            trackers.records[0]
                .source
                .as_ref()
                .and_then(|s| s.kind.as_deref()),
            Some("google_my_business")
        );
        assert!(!trackers.has_next_page());
    }
}
