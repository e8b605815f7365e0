use serde::Deserialize;

use crate::callrail_client::{CALLRAIL_BASE_URL, DEFAULT_MAX_AGGREGATION_PAGES};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub callrail_api_key: String,
    pub callrail_account_id: String,
    pub callrail_base_url: String,
    pub callrail_timeout_secs: u64,
    pub service_areas: Vec<String>, // Default areas for the service-area report
    pub report_cache_ttl_secs: u64,
    pub max_aggregation_pages: u32,
}

fn required(name: &str) -> anyhow::Result<String> {
    let value = std::env::var(name)
        .map_err(|_| anyhow::anyhow!("{} environment variable required", name))?;
    if value.trim().is_empty() {
        anyhow::bail!("{} cannot be empty", name);
    }
    Ok(value)
}

fn parsed_or<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number", name)),
        _ => Ok(default),
    }
}

/// Splits a comma-separated list, dropping blanks.
pub fn parse_service_areas(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: parsed_or("PORT", 3000u16)
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            callrail_api_key: required("CALLRAIL_API_KEY")?,
            callrail_account_id: required("CALLRAIL_ACCOUNT_ID")?,
            callrail_base_url: std::env::var("CALLRAIL_BASE_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|url| {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("CALLRAIL_BASE_URL must start with http:// or https://");
                    }
                    Ok(url)
                })
                .transpose()?
                .unwrap_or_else(|| CALLRAIL_BASE_URL.to_string()),
            callrail_timeout_secs: parsed_or("CALLRAIL_TIMEOUT_SECS", 30u64)?,
            service_areas: std::env::var("SERVICE_AREAS")
                .map(|raw| parse_service_areas(&raw))
                .unwrap_or_default(),
            report_cache_ttl_secs: parsed_or("REPORT_CACHE_TTL_SECS", 300u64)?,
            max_aggregation_pages: parsed_or(
                "MAX_AGGREGATION_PAGES",
                DEFAULT_MAX_AGGREGATION_PAGES,
            )?,
        };

        // Log successful configuration load (without the API key)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("CallRail base URL: {}", config.callrail_base_url);
        tracing::debug!("CallRail account: {}", config.callrail_account_id);
        if !config.service_areas.is_empty() {
            tracing::info!("Default service areas: {:?}", config.service_areas);
        }
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_service_areas() {
        assert_eq!(
            parse_service_areas("Orlando, Winter Park,,  Kissimmee "),
            vec!["Orlando", "Winter Park", "Kissimmee"]
        );
        assert!(parse_service_areas(" , ").is_empty());
    }
}
