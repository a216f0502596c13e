//! Concurrent fan-out over all listing sources and candidate dedup

use crate::proxy::models::{ConfirmedProxy, Proxy};
use crate::proxy::sources::ProxySource;
use crate::Result;
use futures::future::join_all;
use reqwest::Client;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, warn};

/// Default timeout for listing fetches in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default user agent for listing fetches
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/96.0.4664.110 Safari/537.36";

/// Configuration for the aggregator
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Timeout for each listing fetch
    pub timeout: Duration,
    /// User agent sent to listing sites
    pub user_agent: String,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl AggregatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// The deduplicated output of one aggregation pass.
///
/// `confirmed` holds candidates from sources that report the target country
/// themselves; `pending` holds everything still needing geolocation. An
/// address never appears in both.
#[derive(Debug, Default)]
pub struct Harvest {
    pub pending: Vec<Proxy>,
    pub confirmed: Vec<ConfirmedProxy>,
}

impl Harvest {
    pub fn total(&self) -> usize {
        self.pending.len() + self.confirmed.len()
    }
}

/// Fans out to every source concurrently and merges the results.
pub struct Aggregator {
    client: Client,
}

impl Aggregator {
    /// Create a new aggregator with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(AggregatorConfig::default())
    }

    /// Create a new aggregator with custom configuration
    pub fn with_config(config: AggregatorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;
        Ok(Self { client })
    }

    /// Fetch every source concurrently and merge into a deduplicated harvest.
    ///
    /// One source failing only costs that source's candidates. Candidates from
    /// country-reporting sources are tagged with `country` and short-circuit
    /// the geolocation stage; when an address shows up in both a trusted and
    /// an untrusted listing, the trusted tag wins.
    pub async fn collect(&self, sources: &[Box<dyn ProxySource>], country: &str) -> Harvest {
        let fetches = sources.iter().map(|source| async move {
            let outcome = source.fetch(&self.client).await;
            (source, outcome)
        });
        let outcomes = join_all(fetches).await;

        let (trusted, untrusted): (Vec<_>, Vec<_>) = outcomes
            .into_iter()
            .partition(|(source, _)| source.reports_country());

        let mut seen: HashSet<(String, u16)> = HashSet::new();
        let mut harvest = Harvest::default();

        for (source, outcome) in trusted.into_iter().chain(untrusted) {
            let proxies = match outcome {
                Ok(proxies) => {
                    info!(source = source.name(), count = proxies.len(), "source fetched");
                    proxies
                }
                Err(error) => {
                    warn!(source = source.name(), %error, "source failed");
                    Vec::new()
                }
            };

            for proxy in proxies {
                if !seen.insert((proxy.host.clone(), proxy.port)) {
                    continue;
                }
                if source.reports_country() {
                    harvest
                        .confirmed
                        .push(ConfirmedProxy::new(proxy, country.to_string()));
                } else {
                    harvest.pending.push(proxy);
                }
            }
        }

        harvest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::models::ProxyType;
    use anyhow::anyhow;
    use async_trait::async_trait;

    struct StaticSource {
        name: &'static str,
        reports: bool,
        items: Vec<(&'static str, u16)>,
        fail: bool,
    }

    #[async_trait]
    impl ProxySource for StaticSource {
        fn name(&self) -> &'static str {
            self.name
        }

        fn reports_country(&self) -> bool {
            self.reports
        }

        async fn fetch(&self, _client: &Client) -> Result<Vec<Proxy>> {
            if self.fail {
                return Err(anyhow!("listing unreachable"));
            }
            Ok(self
                .items
                .iter()
                .map(|(host, port)| {
                    Proxy::new(host.to_string(), *port, ProxyType::Http, self.name)
                })
                .collect())
        }
    }

    fn boxed(source: StaticSource) -> Box<dyn ProxySource> {
        Box::new(source)
    }

    #[tokio::test]
    async fn test_collect_dedups_across_sources() {
        let sources = vec![
            boxed(StaticSource {
                name: "a",
                reports: false,
                items: vec![("1.2.3.4", 8080), ("5.6.7.8", 3128)],
                fail: false,
            }),
            boxed(StaticSource {
                name: "b",
                reports: false,
                items: vec![("1.2.3.4", 8080), ("1.2.3.4", 80)],
                fail: false,
            }),
        ];
        let harvest = Aggregator::new().unwrap().collect(&sources, "RU").await;
        assert!(harvest.confirmed.is_empty());
        assert_eq!(harvest.pending.len(), 3);
        let addrs: Vec<_> = harvest.pending.iter().map(|p| p.address()).collect();
        assert_eq!(
            addrs.iter().filter(|a| *a == "1.2.3.4:8080").count(),
            1
        );
    }

    #[tokio::test]
    async fn test_collect_isolates_failing_source() {
        let sources = vec![
            boxed(StaticSource {
                name: "broken",
                reports: false,
                items: vec![],
                fail: true,
            }),
            boxed(StaticSource {
                name: "ok",
                reports: false,
                items: vec![("5.6.7.8", 3128)],
                fail: false,
            }),
        ];
        let harvest = Aggregator::new().unwrap().collect(&sources, "RU").await;
        assert_eq!(harvest.pending.len(), 1);
        assert_eq!(harvest.pending[0].source, "ok");
    }

    #[tokio::test]
    async fn test_collect_short_circuits_trusted_sources() {
        let sources = vec![
            boxed(StaticSource {
                name: "plain",
                reports: false,
                items: vec![("1.2.3.4", 8080), ("5.6.7.8", 3128)],
                fail: false,
            }),
            boxed(StaticSource {
                name: "trusted",
                reports: true,
                items: vec![("1.2.3.4", 8080)],
                fail: false,
            }),
        ];
        let harvest = Aggregator::new().unwrap().collect(&sources, "RU").await;

        // The overlapping address keeps its trusted tag and is not re-checked
        assert_eq!(harvest.confirmed.len(), 1);
        assert_eq!(harvest.confirmed[0].proxy.address(), "1.2.3.4:8080");
        assert_eq!(harvest.confirmed[0].country, "RU");
        assert_eq!(harvest.pending.len(), 1);
        assert_eq!(harvest.pending[0].address(), "5.6.7.8:3128");
        assert_eq!(harvest.total(), 2);
    }

    #[tokio::test]
    async fn test_collect_tolerates_empty_sources() {
        let sources = vec![boxed(StaticSource {
            name: "empty",
            reports: false,
            items: vec![],
            fail: false,
        })];
        let harvest = Aggregator::new().unwrap().collect(&sources, "RU").await;
        assert_eq!(harvest.total(), 0);
    }
}
