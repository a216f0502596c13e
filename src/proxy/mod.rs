//! Proxy acquisition and validation pipeline
//!
//! This module provides the stages of the pipeline:
//! - Fetching candidate listings from many providers concurrently
//! - Deduplicating candidates and short-circuiting trusted listings
//! - Confirming candidate countries with primary/fallback geolocation
//! - Probing which confirmed proxies open the target login page
//! - Persisting confirmed and qualified snapshots

pub mod aggregator;
pub mod geo;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod probe;
pub mod sources;
pub mod store;

pub use aggregator::{Aggregator, AggregatorConfig, Harvest};
pub use geo::{GeoConfig, GeoError, GeoProvider, GeoValidator, IpApi, IpInfo};
pub use models::{ConfirmedProxy, Proxy, ProxyType, QualifiedProxy};
pub use parser::ProxyParser;
pub use pipeline::{Pipeline, RunSummary};
pub use probe::{ProbeConfig, TargetProbe, Verdict, DEFAULT_TARGET_URL};
pub use sources::{default_sources, ProxySource};
pub use store::{ResultStore, SnapshotRecord, CONFIRMED_FILE, QUALIFIED_FILE};
