//! Target probe stage: qualifies proxies that can open the gated login page

use crate::proxy::models::{ConfirmedProxy, Proxy, ProxyType, QualifiedProxy};
use crate::Result;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use reqwest::{Client, Proxy as ReqwestProxy};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, info};

/// Default gated page the proxies must reach
pub const DEFAULT_TARGET_URL: &str = "http://vats290368.megapbx.ru/";

/// Default timeout for each probe in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Default number of concurrent probes
const DEFAULT_CONCURRENCY: usize = 20;

/// Markers of a generic diagnostic page a proxy serves instead of the target.
/// Seeing the request reflected back means the proxy never reached the site.
const DEFAULT_DIAGNOSTIC_MARKERS: &[&str] = &["remote_addr", "request_method"];

/// Markers of a real login form, structural tags plus the words the target
/// renders on its sign-in page
const DEFAULT_LOGIN_INDICATORS: &[&str] = &[
    r#"input[name="login"]"#,
    r#"input[name="username"]"#,
    r#"input[type="password"]"#,
    "form",
    "<form",
    "логин",
    "пароль",
    "вход",
    "авторизация",
    "личный кабинет",
    "виртуальной атс",
];

/// How a probed response body was classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The page shows a recognizable login form
    LoginForm,
    /// The proxy answered with a diagnostic echo page, not the target
    DiagnosticEcho,
    /// Reachable page without any login-form indicator
    NoForm,
}

/// Configuration for the probe stage
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// URL of the gated page
    pub target_url: String,
    /// Number of concurrent probes
    pub concurrency: usize,
    /// Timeout for each probe
    pub timeout: Duration,
    /// Lower-cased substrings accepted as login-form evidence
    pub login_indicators: Vec<String>,
    /// Lower-cased substrings rejecting a body as a diagnostic echo
    pub diagnostic_markers: Vec<String>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            target_url: DEFAULT_TARGET_URL.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            login_indicators: DEFAULT_LOGIN_INDICATORS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            diagnostic_markers: DEFAULT_DIAGNOSTIC_MARKERS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ProbeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target_url(mut self, url: impl Into<String>) -> Self {
        self.target_url = url.into();
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

    pub fn with_login_indicators(mut self, indicators: Vec<String>) -> Self {
        self.login_indicators = indicators.into_iter().map(|s| s.to_lowercase()).collect();
        self
    }

    pub fn with_diagnostic_markers(mut self, markers: Vec<String>) -> Self {
        self.diagnostic_markers = markers.into_iter().map(|s| s.to_lowercase()).collect();
        self
    }
}

/// Probes confirmed proxies against the target page.
///
/// One GET per proxy, no retries: a failed attempt is a final rejection for
/// the run. Certificate validation is off; free proxies and the target do not
/// reliably present valid chains.
pub struct TargetProbe {
    config: ProbeConfig,
}

impl TargetProbe {
    /// Create a probe with default configuration
    pub fn new() -> Self {
        Self::with_config(ProbeConfig::default())
    }

    /// Create a probe with custom configuration
    pub fn with_config(config: ProbeConfig) -> Self {
        Self { config }
    }

    /// Probe all proxies concurrently and collect the qualified ones
    pub async fn qualify(&self, confirmed: &[ConfirmedProxy]) -> Vec<QualifiedProxy> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));

        stream::iter(confirmed)
            .map(|proxy| {
                let semaphore = Arc::clone(&semaphore);
                async move {
                    let _permit = semaphore
                        .acquire()
                        .await
                        .expect("Semaphore closed unexpectedly");
                    self.probe_one(proxy).await
                }
            })
            .buffer_unordered(self.config.concurrency)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    /// Probe a single proxy; any failure yields None
    pub async fn probe_one(&self, confirmed: &ConfirmedProxy) -> Option<QualifiedProxy> {
        let client = match self.build_client(&confirmed.proxy) {
            Ok(client) => client,
            Err(error) => {
                debug!(proxy = %confirmed.proxy, %error, "could not build probe client");
                return None;
            }
        };

        let start = Instant::now();
        let response = match timeout(
            self.config.timeout,
            client.get(&self.config.target_url).send(),
        )
        .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => {
                debug!(proxy = %confirmed.proxy, %error, "probe transport error");
                return None;
            }
            Err(_) => {
                debug!(proxy = %confirmed.proxy, "probe timed out");
                return None;
            }
        };

        if !response.status().is_success() {
            debug!(proxy = %confirmed.proxy, status = %response.status(), "probe rejected by status");
            return None;
        }
        let latency_secs = start.elapsed().as_secs_f64();

        let body = match response.text().await {
            Ok(body) => body,
            Err(error) => {
                debug!(proxy = %confirmed.proxy, %error, "probe body unreadable");
                return None;
            }
        };

        match self.classify_body(&body) {
            Verdict::LoginForm => {
                info!(proxy = %confirmed.proxy, latency_secs, "login form reached");
                Some(QualifiedProxy {
                    proxy: confirmed.proxy.clone(),
                    country: confirmed.country.clone(),
                    latency_secs,
                    verified_at: Utc::now(),
                })
            }
            Verdict::DiagnosticEcho => {
                debug!(proxy = %confirmed.proxy, "proxy serves a diagnostic echo page");
                None
            }
            Verdict::NoForm => {
                debug!(proxy = %confirmed.proxy, "page reachable but no login form");
                None
            }
        }
    }

    /// Classify a response body. Diagnostic markers override everything else:
    /// an echo page may well contain form tags of its own.
    pub fn classify_body(&self, body: &str) -> Verdict {
        let body = body.to_lowercase();

        if self
            .config
            .diagnostic_markers
            .iter()
            .any(|marker| body.contains(marker))
        {
            return Verdict::DiagnosticEcho;
        }

        if self
            .config
            .login_indicators
            .iter()
            .any(|indicator| body.contains(indicator))
        {
            return Verdict::LoginForm;
        }

        Verdict::NoForm
    }

    /// Create a reqwest client routing through the proxy
    fn build_client(&self, proxy: &Proxy) -> Result<Client> {
        let forward = match proxy.protocol {
            ProxyType::Http => ReqwestProxy::http(proxy.url())?,
            ProxyType::Socks4 | ProxyType::Socks5 => ReqwestProxy::all(proxy.url())?,
        };

        let client = Client::builder()
            .proxy(forward)
            .danger_accept_invalid_certs(true)
            .timeout(self.config.timeout)
            .build()?;

        Ok(client)
    }
}

impl Default for TargetProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_accepts_password_input() {
        let probe = TargetProbe::new();
        let body = r#"<html><body><form><input type="password" name="pwd"></form></body></html>"#;
        assert_eq!(probe.classify_body(body), Verdict::LoginForm);
    }

    #[test]
    fn test_classify_accepts_target_language_words() {
        let probe = TargetProbe::new();
        assert_eq!(
            probe.classify_body("<html><div>Логин и Пароль</div></html>"),
            Verdict::LoginForm
        );
    }

    #[test]
    fn test_classify_is_case_insensitive() {
        let probe = TargetProbe::new();
        assert_eq!(
            probe.classify_body(r#"<INPUT TYPE="PASSWORD">"#),
            Verdict::LoginForm
        );
    }

    #[test]
    fn test_classify_rejects_diagnostic_echo_over_form() {
        let probe = TargetProbe::new();
        // The echo marker wins even when the page contains a form
        let body = r#"REMOTE_ADDR: 1.2.3.4 <form><input type="password"></form>"#;
        assert_eq!(probe.classify_body(body), Verdict::DiagnosticEcho);
    }

    #[test]
    fn test_classify_rejects_request_method_echo() {
        let probe = TargetProbe::new();
        assert_eq!(
            probe.classify_body("request_method = GET"),
            Verdict::DiagnosticEcho
        );
    }

    #[test]
    fn test_classify_rejects_formless_page() {
        let probe = TargetProbe::new();
        assert_eq!(
            probe.classify_body("<html><body>plain landing page</body></html>"),
            Verdict::NoForm
        );
    }

    #[test]
    fn test_custom_indicators_are_lowercased() {
        let config = ProbeConfig::new()
            .with_login_indicators(vec!["SignIn-Widget".to_string()])
            .with_diagnostic_markers(vec!["X-Echo".to_string()]);
        let probe = TargetProbe::with_config(config);
        assert_eq!(probe.classify_body("<div>signin-widget</div>"), Verdict::LoginForm);
        assert_eq!(probe.classify_body("x-echo active"), Verdict::DiagnosticEcho);
    }

    #[test]
    fn test_probe_config_builder() {
        let config = ProbeConfig::new()
            .with_target_url("http://example.com/")
            .with_concurrency(5)
            .with_timeout(Duration::from_secs(3));
        assert_eq!(config.target_url, "http://example.com/");
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.timeout, Duration::from_secs(3));
    }
}
