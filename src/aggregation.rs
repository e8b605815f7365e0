use crate::callrail_models::{CallRecord, ServiceAreaPerformance, SourceAttribution};

/// Label for calls without a `source`.
pub const UNKNOWN_SOURCE: &str = "Unknown";

/// Label for calls whose city matches none of the service areas.
pub const OTHER_AREA: &str = "Other";

/// Groups calls by traffic source.
///
/// Buckets come out in the order each source is first seen. The average
/// duration is updated incrementally, `(mean * (n - 1) + duration) / n`, so
/// no per-call durations are kept.
pub fn aggregate_by_source(calls: &[CallRecord]) -> Vec<SourceAttribution> {
    let mut buckets: Vec<SourceAttribution> = Vec::new();

    for call in calls {
        let source = call
            .source
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(UNKNOWN_SOURCE);

        let idx = match buckets.iter().position(|b| b.source == source) {
            Some(idx) => idx,
            None => {
                buckets.push(SourceAttribution::new(source));
                buckets.len() - 1
            }
        };
        let bucket = &mut buckets[idx];

        bucket.total_calls += 1;
        if call.answered {
            bucket.answered_calls += 1;
        }
        if call.first_call {
            bucket.first_time_callers += 1;
        }

        let n = bucket.total_calls as f64;
        bucket.average_duration = (bucket.average_duration * (n - 1.0) + call.duration_secs()) / n;
    }

    buckets
}

/// Finds the first service area whose lower-cased name contains, or is
/// contained in, the lower-cased city. Blank cities never match.
pub fn match_service_area<'a>(city: Option<&str>, service_areas: &'a [String]) -> Option<&'a str> {
    let city = city.map(|c| c.trim().to_lowercase()).filter(|c| !c.is_empty())?;

    service_areas
        .iter()
        .find(|area| {
            let area = area.trim().to_lowercase();
            !area.is_empty() && (city.contains(&area) || area.contains(&city))
        })
        .map(String::as_str)
}

/// Groups calls by service area, matched on the caller's city.
///
/// Every requested area appears in the output, in input order, even with
/// zero calls. Unmatched calls go to an "Other" bucket appended when first
/// needed.
pub fn aggregate_by_service_area(
    calls: &[CallRecord],
    service_areas: &[String],
) -> Vec<ServiceAreaPerformance> {
    let mut buckets: Vec<ServiceAreaPerformance> = Vec::with_capacity(service_areas.len() + 1);
    for area in service_areas {
        if !buckets.iter().any(|b| &b.area == area) {
            buckets.push(ServiceAreaPerformance::new(area.clone()));
        }
    }

    for call in calls {
        let label = match_service_area(call.customer_city.as_deref(), service_areas)
            .unwrap_or(OTHER_AREA);

        let idx = match buckets.iter().position(|b| b.area == label) {
            Some(idx) => idx,
            None => {
                buckets.push(ServiceAreaPerformance::new(label));
                buckets.len() - 1
            }
        };
        let bucket = &mut buckets[idx];

        bucket.total_calls += 1;
        if call.answered {
            bucket.answered_calls += 1;
        }
        if call.first_call {
            bucket.first_time_callers += 1;
        }
    }

    for bucket in &mut buckets {
        bucket.conversion_rate = if bucket.total_calls > 0 {
            bucket.answered_calls as f64 / bucket.total_calls as f64 * 100.0
        } else {
            0.0
        };
    }

    buckets
}
