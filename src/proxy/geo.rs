//! Geolocation stage: confirms candidate country via remote lookup providers

use crate::proxy::models::{ConfirmedProxy, Proxy};
use crate::Result;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, info};

/// Default timeout for a single lookup in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Default number of concurrent lookups
const DEFAULT_CONCURRENCY: usize = 20;

/// Default target country code
const DEFAULT_COUNTRY: &str = "RU";

/// Error raised by a single geolocation lookup.
#[derive(Debug, Error)]
pub enum GeoError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(StatusCode),
    #[error("response carried no country")]
    MissingCountry,
    #[error("lookup timed out")]
    Timeout,
}

/// A remote service resolving an IP address to a country code.
#[async_trait]
pub trait GeoProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn lookup(&self, client: &Client, ip: &str) -> std::result::Result<String, GeoError>;
}

/// ipinfo.io lookup; the anonymous tier allows ~1000 requests per day
pub struct IpInfo;

#[derive(Deserialize)]
struct IpInfoResponse {
    country: Option<String>,
}

#[async_trait]
impl GeoProvider for IpInfo {
    fn name(&self) -> &'static str {
        "ipinfo.io"
    }

    async fn lookup(&self, client: &Client, ip: &str) -> std::result::Result<String, GeoError> {
        let url = format!("https://ipinfo.io/{ip}/json");
        let response = client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(GeoError::Status(response.status()));
        }
        let body: IpInfoResponse = response.json().await?;
        body.country.ok_or(GeoError::MissingCountry)
    }
}

/// ip-api.com lookup, used as the fallback provider
pub struct IpApi;

#[derive(Deserialize)]
struct IpApiResponse {
    status: Option<String>,
    #[serde(rename = "countryCode")]
    country_code: Option<String>,
}

#[async_trait]
impl GeoProvider for IpApi {
    fn name(&self) -> &'static str {
        "ip-api.com"
    }

    async fn lookup(&self, client: &Client, ip: &str) -> std::result::Result<String, GeoError> {
        let url = format!("http://ip-api.com/json/{ip}");
        let response = client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(GeoError::Status(response.status()));
        }
        let body: IpApiResponse = response.json().await?;
        if body.status.as_deref() == Some("fail") {
            return Err(GeoError::MissingCountry);
        }
        body.country_code.ok_or(GeoError::MissingCountry)
    }
}

/// Configuration for the geolocation stage
#[derive(Debug, Clone)]
pub struct GeoConfig {
    /// Country code candidates must resolve to
    pub country: String,
    /// Number of concurrent lookups
    pub concurrency: usize,
    /// Timeout for each lookup
    pub timeout: Duration,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            country: DEFAULT_COUNTRY.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl GeoConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = country.into();
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Confirms candidate countries with a primary and a fallback provider.
///
/// Per candidate the primary provider is asked once; any failure (transport,
/// bad status, malformed body, timeout) moves the candidate to the fallback.
/// If the fallback fails too the candidate is dropped. Exactly one provider's
/// verdict is trusted per candidate.
pub struct GeoValidator {
    config: GeoConfig,
    client: Client,
    primary: Box<dyn GeoProvider>,
    fallback: Box<dyn GeoProvider>,
}

impl GeoValidator {
    /// Create a validator with the default provider pair
    pub fn new(config: GeoConfig) -> Result<Self> {
        Self::with_providers(config, Box::new(IpInfo), Box::new(IpApi))
    }

    /// Create a validator with a custom provider pair
    pub fn with_providers(
        config: GeoConfig,
        primary: Box<dyn GeoProvider>,
        fallback: Box<dyn GeoProvider>,
    ) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            config,
            client,
            primary,
            fallback,
        })
    }

    /// The country code candidates must resolve to
    pub fn country(&self) -> &str {
        &self.config.country
    }

    /// Confirm candidates concurrently, keeping only target-country matches.
    ///
    /// Candidates whose lookups fail on both providers are dropped, not kept
    /// as unknown. Addresses and protocols pass through untouched.
    pub async fn confirm(&self, candidates: Vec<Proxy>) -> Vec<ConfirmedProxy> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));

        stream::iter(candidates)
            .map(|candidate| {
                let semaphore = Arc::clone(&semaphore);
                async move {
                    let _permit = semaphore
                        .acquire()
                        .await
                        .expect("Semaphore closed unexpectedly");
                    let country = self.resolve_country(&candidate.host).await?;
                    if country == self.config.country {
                        info!(proxy = %candidate, %country, "country confirmed");
                        Some(ConfirmedProxy::new(candidate, country))
                    } else {
                        debug!(proxy = %candidate, %country, "country mismatch");
                        None
                    }
                }
            })
            .buffer_unordered(self.config.concurrency)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    async fn resolve_country(&self, ip: &str) -> Option<String> {
        match self.lookup_bounded(self.primary.as_ref(), ip).await {
            Ok(country) => Some(country),
            Err(error) => {
                debug!(provider = self.primary.name(), ip, %error, "primary lookup failed");
                match self.lookup_bounded(self.fallback.as_ref(), ip).await {
                    Ok(country) => Some(country),
                    Err(error) => {
                        debug!(provider = self.fallback.name(), ip, %error, "fallback lookup failed");
                        None
                    }
                }
            }
        }
    }

    async fn lookup_bounded(
        &self,
        provider: &dyn GeoProvider,
        ip: &str,
    ) -> std::result::Result<String, GeoError> {
        match timeout(self.config.timeout, provider.lookup(&self.client, ip)).await {
            Ok(result) => result,
            Err(_) => Err(GeoError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::models::ProxyType;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn candidate(host: &str) -> Proxy {
        Proxy::new(host.to_string(), 8080, ProxyType::Http, "test")
    }

    /// Resolves from a fixed map; misses are reported as missing-country
    struct MapProvider {
        countries: HashMap<String, String>,
    }

    impl MapProvider {
        fn new(entries: &[(&str, &str)]) -> Box<dyn GeoProvider> {
            Box::new(Self {
                countries: entries
                    .iter()
                    .map(|(ip, cc)| (ip.to_string(), cc.to_string()))
                    .collect(),
            })
        }
    }

    #[async_trait]
    impl GeoProvider for MapProvider {
        fn name(&self) -> &'static str {
            "map"
        }

        async fn lookup(
            &self,
            _client: &Client,
            ip: &str,
        ) -> std::result::Result<String, GeoError> {
            self.countries
                .get(ip)
                .cloned()
                .ok_or(GeoError::MissingCountry)
        }
    }

    /// Always fails with a transport-level error stand-in
    struct DeadProvider;

    #[async_trait]
    impl GeoProvider for DeadProvider {
        fn name(&self) -> &'static str {
            "dead"
        }

        async fn lookup(
            &self,
            _client: &Client,
            _ip: &str,
        ) -> std::result::Result<String, GeoError> {
            Err(GeoError::MissingCountry)
        }
    }

    /// Sleeps past any reasonable test timeout
    struct SlowProvider;

    #[async_trait]
    impl GeoProvider for SlowProvider {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn lookup(
            &self,
            _client: &Client,
            _ip: &str,
        ) -> std::result::Result<String, GeoError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(GeoError::MissingCountry)
        }
    }

    /// Tracks how many lookups run at once
    struct CountingProvider {
        current: Arc<AtomicUsize>,
        max_seen: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl GeoProvider for CountingProvider {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn lookup(
            &self,
            _client: &Client,
            _ip: &str,
        ) -> std::result::Result<String, GeoError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_seen.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok("RU".to_string())
        }
    }

    #[tokio::test]
    async fn test_confirm_keeps_only_target_country() {
        let primary = MapProvider::new(&[("1.1.1.1", "RU"), ("2.2.2.2", "US")]);
        let validator =
            GeoValidator::with_providers(GeoConfig::new(), primary, Box::new(DeadProvider))
                .unwrap();

        let confirmed = validator
            .confirm(vec![candidate("1.1.1.1"), candidate("2.2.2.2")])
            .await;
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].proxy.host, "1.1.1.1");
        assert_eq!(confirmed[0].country, "RU");
    }

    #[tokio::test]
    async fn test_confirm_uses_fallback_when_primary_fails() {
        let fallback = MapProvider::new(&[("1.1.1.1", "RU")]);
        let validator =
            GeoValidator::with_providers(GeoConfig::new(), Box::new(DeadProvider), fallback)
                .unwrap();

        let confirmed = validator.confirm(vec![candidate("1.1.1.1")]).await;
        assert_eq!(confirmed.len(), 1);
    }

    #[tokio::test]
    async fn test_confirm_drops_when_both_providers_fail() {
        let validator = GeoValidator::with_providers(
            GeoConfig::new(),
            Box::new(DeadProvider),
            Box::new(DeadProvider),
        )
        .unwrap();

        let confirmed = validator.confirm(vec![candidate("1.1.1.1")]).await;
        assert!(confirmed.is_empty());
    }

    #[tokio::test]
    async fn test_confirm_timeout_triggers_fallback() {
        let fallback = MapProvider::new(&[("1.1.1.1", "RU")]);
        let config = GeoConfig::new().with_timeout(Duration::from_millis(50));
        let validator =
            GeoValidator::with_providers(config, Box::new(SlowProvider), fallback).unwrap();

        let confirmed = validator.confirm(vec![candidate("1.1.1.1")]).await;
        assert_eq!(confirmed.len(), 1);
    }

    #[tokio::test]
    async fn test_confirm_respects_concurrency_bound() {
        let max_seen = Arc::new(AtomicUsize::new(0));
        let counting = Box::new(CountingProvider {
            current: Arc::new(AtomicUsize::new(0)),
            max_seen: Arc::clone(&max_seen),
        });
        let config = GeoConfig::new().with_concurrency(4);
        let validator =
            GeoValidator::with_providers(config, counting, Box::new(DeadProvider)).unwrap();

        let candidates = (0..20)
            .map(|i| candidate(&format!("10.0.0.{i}")))
            .collect();
        let confirmed = validator.confirm(candidates).await;
        assert_eq!(confirmed.len(), 20);

        let peak = max_seen.load(Ordering::SeqCst);
        assert!(peak <= 4, "saw {peak} concurrent lookups");
    }

    #[test]
    fn test_geo_config_builder() {
        let config = GeoConfig::new()
            .with_country("DE")
            .with_concurrency(7)
            .with_timeout(Duration::from_secs(2));
        assert_eq!(config.country, "DE");
        assert_eq!(config.concurrency, 7);
        assert_eq!(config.timeout, Duration::from_secs(2));
    }
}
