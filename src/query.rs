//! Query-string building for CallRail requests.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Ordered `(key, value)` pairs; `None` values are skipped when the URL is built.
pub type QueryParams = Vec<(String, Option<String>)>;

/// Presets CallRail accepts for `date_range`.
pub const DATE_RANGE_PRESETS: &[&str] = &[
    "recent",
    "today",
    "yesterday",
    "last_7_days",
    "last_30_days",
    "this_month",
    "last_month",
    "this_year",
    "last_year",
    "all_time",
];

/// Either a named CallRail preset or an explicit start/end pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DateRange {
    Preset(String),
    Custom { start_date: String, end_date: String },
}

impl DateRange {
    pub fn preset(name: impl Into<String>) -> Self {
        DateRange::Preset(name.into())
    }

    pub fn custom(start_date: impl Into<String>, end_date: impl Into<String>) -> Self {
        DateRange::Custom {
            start_date: start_date.into(),
            end_date: end_date.into(),
        }
    }
}

impl Default for DateRange {
    fn default() -> Self {
        DateRange::Preset("last_30_days".to_string())
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateRange::Preset(name) => write!(f, "{}", name),
            DateRange::Custom {
                start_date,
                end_date,
            } => write!(f, "{}..{}", start_date, end_date),
        }
    }
}

/// Parses `"last_7_days"` as a preset or `"2024-01-01..2024-01-31"` as a custom range.
impl FromStr for DateRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some((start, end)) = s.split_once("..") {
            let start_date = parse_day(start)?;
            let end_date = parse_day(end)?;
            if end_date < start_date {
                return Err(format!("end date {} is before start date {}", end, start));
            }
            return Ok(DateRange::custom(start.trim(), end.trim()));
        }

        if DATE_RANGE_PRESETS.contains(&s) {
            Ok(DateRange::Preset(s.to_string()))
        } else {
            Err(format!("unknown date range preset: {}", s))
        }
    }
}

fn parse_day(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{}', expected YYYY-MM-DD", value.trim()))
}

/// Normalizes a date range into the query parameters CallRail expects.
pub fn format_date_range(range: &DateRange) -> QueryParams {
    match range {
        DateRange::Preset(name) => vec![("date_range".to_string(), Some(name.clone()))],
        DateRange::Custom {
            start_date,
            end_date,
        } => vec![
            ("start_date".to_string(), Some(start_date.clone())),
            ("end_date".to_string(), Some(end_date.clone())),
        ],
    }
}

/// Filters for `calls.json`.
///
/// The typed fields cover the filters this crate sets itself; anything else
/// CallRail supports goes in `extra`. A typed field wins over an `extra`
/// entry with the same key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallFilters {
    pub answered: Option<bool>,
    pub first_call: Option<bool>,
    pub direction: Option<String>,
    pub tracker_id: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub fields: Option<String>,
    pub extra: BTreeMap<String, String>,
}

impl CallFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answered(mut self, answered: bool) -> Self {
        self.answered = Some(answered);
        self
    }

    pub fn first_call(mut self, first_call: bool) -> Self {
        self.first_call = Some(first_call);
        self
    }

    pub fn direction(mut self, direction: impl Into<String>) -> Self {
        self.direction = Some(direction.into());
        self
    }

    pub fn tracker_id(mut self, tracker_id: impl Into<String>) -> Self {
        self.tracker_id = Some(tracker_id.into());
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn sort(mut self, sort: impl Into<String>, order: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self.order = Some(order.into());
        self
    }

    pub fn fields(mut self, fields: impl Into<String>) -> Self {
        self.fields = Some(fields.into());
        self
    }

    /// Adds an arbitrary vendor filter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Builds filters from an open string map, lifting known keys into typed fields.
    pub fn from_map(map: BTreeMap<String, String>) -> Result<Self, String> {
        let mut filters = CallFilters::new();
        for (key, value) in map {
            match key.as_str() {
                "answered" => filters.answered = Some(parse_bool(&key, &value)?),
                "first_call" => filters.first_call = Some(parse_bool(&key, &value)?),
                "direction" => filters.direction = Some(value),
                "tracker_id" => filters.tracker_id = Some(value),
                "search" => filters.search = Some(value),
                "sort" => filters.sort = Some(value),
                "order" => filters.order = Some(value),
                "fields" => filters.fields = Some(value),
                _ => {
                    filters.extra.insert(key, value);
                }
            }
        }
        Ok(filters)
    }

    /// Flattens the filters into query parameters.
    pub fn to_params(&self) -> QueryParams {
        let typed: [(&str, Option<String>); 8] = [
            ("answered", self.answered.map(|b| b.to_string())),
            ("first_call", self.first_call.map(|b| b.to_string())),
            ("direction", self.direction.clone()),
            ("tracker_id", self.tracker_id.clone()),
            ("search", self.search.clone()),
            ("sort", self.sort.clone()),
            ("order", self.order.clone()),
            ("fields", self.fields.clone()),
        ];

        let mut params: QueryParams = self
            .extra
            .iter()
            .filter(|(key, _)| !typed.iter().any(|(k, v)| v.is_some() && *k == key.as_str()))
            .map(|(key, value)| (key.clone(), Some(value.clone())))
            .collect();

        params.extend(typed.into_iter().map(|(k, v)| (k.to_string(), v)));
        params
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(format!("{} must be true or false, got '{}'", key, value)),
    }
}

/// Page and page size for listing endpoints.
pub fn pagination_params(page: u32, per_page: u32) -> QueryParams {
    vec![
        ("page".to_string(), Some(page.to_string())),
        ("per_page".to_string(), Some(per_page.to_string())),
    ]
}
