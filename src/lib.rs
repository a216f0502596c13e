//! Proxy Scout - proxy discovery and qualification
//!
//! Collects proxy candidates from many public listings, confirms their country
//! through geolocation providers, and probes which of them can open a gated
//! login page when used as a forwarding endpoint. Each pipeline stage writes a
//! flat snapshot file that fully replaces the previous run's output.

pub mod proxy;

pub use proxy::*;

/// Application result type
pub type Result<T> = anyhow::Result<T>;
