//! Proxy data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Proxy protocol enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProxyType {
    #[default]
    Http,
    Socks4,
    Socks5,
}

impl fmt::Display for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyType::Http => write!(f, "http"),
            ProxyType::Socks4 => write!(f, "socks4"),
            ProxyType::Socks5 => write!(f, "socks5"),
        }
    }
}

/// A proxy candidate harvested from a listing source.
///
/// Identity is the `(host, port)` pair; protocol and source are metadata.
/// Candidates are created once by their source and never mutated downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proxy {
    pub host: String,
    pub port: u16,
    pub protocol: ProxyType,
    /// Identifier of the listing the candidate came from
    pub source: String,
}

impl Proxy {
    pub fn new(host: String, port: u16, protocol: ProxyType, source: &str) -> Self {
        Self {
            host,
            port,
            protocol,
            source: source.to_string(),
        }
    }

    /// Get the proxy URL string
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }

    /// Get the proxy string in HOST:PORT format
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url())
    }
}

/// A candidate whose IP geolocation matched the target country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedProxy {
    pub proxy: Proxy,
    /// ISO 3166-1 alpha-2 country code (e.g., "RU")
    pub country: String,
}

impl ConfirmedProxy {
    pub fn new(proxy: Proxy, country: impl Into<String>) -> Self {
        Self {
            proxy,
            country: country.into(),
        }
    }
}

/// A confirmed proxy that opened the target login page through a live probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualifiedProxy {
    pub proxy: Proxy,
    pub country: String,
    /// Observed round-trip time of the probe in seconds
    pub latency_secs: f64,
    /// When the probe succeeded
    pub verified_at: DateTime<Utc>,
}
