//! CallRail Reporting Library
//!
//! This library provides a typed client for the CallRail v3 API, the
//! aggregate call reports built on top of it (by traffic source and by
//! service area), and the HTTP handlers that serve them to dashboards.
//!
//! # Modules
//!
//! - `api`: HTTP-facing components.
//! - `core`: Data models, query building, aggregation and errors.
//! - `integrations`: External service integrations.
//! - `aggregation`: Source and service-area report folds.
//! - `callrail_client`: CallRail API client.
//! - `callrail_models`: CallRail data models.
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `query`: Date ranges, filters and pagination parameters.
//! - `rate_limit`: Client-side rate-limit tracking.

pub mod api;
pub mod core;
pub mod integrations;

pub mod aggregation;
pub mod callrail_client;
pub mod callrail_models;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod query;
pub mod rate_limit;

pub use callrail_client::CallRailClient;
pub use errors::CallRailError;
pub use query::{format_date_range, CallFilters, DateRange};
