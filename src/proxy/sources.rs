//! Proxy listing sources
//!
//! One adapter per provider. Every adapter fetches a single listing and parses
//! it into candidates; a failing adapter simply contributes nothing. Providers
//! whose listings are already filtered to the target country set
//! `reports_country`, which lets the aggregator skip geolocation for them.

use crate::proxy::models::{Proxy, ProxyType};
use crate::proxy::parser::ProxyParser;
use crate::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

/// A proxy listing provider.
#[async_trait]
pub trait ProxySource: Send + Sync {
    /// Provider identifier used as the candidate `source` tag
    fn name(&self) -> &'static str;

    /// Whether the listing is pre-filtered to the target country, so its
    /// candidates can skip the geolocation stage
    fn reports_country(&self) -> bool {
        false
    }

    /// Fetch and parse the provider's listing
    async fn fetch(&self, client: &Client) -> Result<Vec<Proxy>>;
}

/// The full provider registry, trusted country-filtered sources included.
pub fn default_sources() -> Vec<Box<dyn ProxySource>> {
    vec![
        Box::new(ProxyListDownload),
        Box::new(ProxyListDownloadRu),
        Box::new(ProxyScrape),
        Box::new(Geonode),
        Box::new(FreeProxyList),
        Box::new(FreeProxyWorld),
        Box::new(GoodProxies),
        Box::new(ProxyListOrg),
        Box::new(HtmlWeb),
    ]
}

async fn fetch_text(client: &Client, url: &str) -> Result<String> {
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.text().await?)
}

fn cell_text(cells: &[ElementRef], idx: usize) -> String {
    cells
        .get(idx)
        .map(|cell| cell.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

fn table_rows<'a>(document: &'a Html, selector: &Selector) -> Vec<Vec<ElementRef<'a>>> {
    let td = Selector::parse("td").expect("valid td selector");
    document
        .select(selector)
        .map(|row| row.select(&td).collect())
        .collect()
}

/// Port values in provider JSON come as either a number or a string.
fn port_value(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::to_string)
        .or_else(|| value.as_u64().map(|port| port.to_string()))
}

/// proxy-list.download plain v1 API, no country filter
pub struct ProxyListDownload;

#[async_trait]
impl ProxySource for ProxyListDownload {
    fn name(&self) -> &'static str {
        "proxy-list.download"
    }

    async fn fetch(&self, client: &Client) -> Result<Vec<Proxy>> {
        let url = "https://www.proxy-list.download/api/v1/get?type=http";
        let text = fetch_text(client, url).await?;
        Ok(ProxyParser::parse_list(&text, ProxyType::Http, self.name()))
    }
}

/// proxy-list.download v2 API, filtered to the Russian Federation
pub struct ProxyListDownloadRu;

impl ProxyListDownloadRu {
    fn parse(&self, body: &str) -> Vec<Proxy> {
        let Ok(data) = serde_json::from_str::<Value>(body) else {
            return Vec::new();
        };
        data["LISTA"]
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| {
                        let ip = entry["IP"].as_str()?;
                        let port = port_value(&entry["PORT"])?;
                        ProxyParser::from_parts(ip, &port, ProxyType::Http, self.name())
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl ProxySource for ProxyListDownloadRu {
    fn name(&self) -> &'static str {
        "proxy-list.download/v2"
    }

    fn reports_country(&self) -> bool {
        true
    }

    async fn fetch(&self, client: &Client) -> Result<Vec<Proxy>> {
        let url = "https://www.proxy-list.download/api/v2/get?l=en&t=http&c=Russian+Federation";
        let text = fetch_text(client, url).await?;
        Ok(self.parse(&text))
    }
}

/// proxyscrape.com display API with a country filter in the query
pub struct ProxyScrape;

#[async_trait]
impl ProxySource for ProxyScrape {
    fn name(&self) -> &'static str {
        "proxyscrape.com"
    }

    fn reports_country(&self) -> bool {
        true
    }

    async fn fetch(&self, client: &Client) -> Result<Vec<Proxy>> {
        let url = "https://api.proxyscrape.com/v2/?request=displayproxies&protocol=http\
                   &timeout=10000&country=RU&ssl=all&anonymity=all";
        let text = fetch_text(client, url).await?;
        Ok(ProxyParser::parse_list(&text, ProxyType::Http, self.name()))
    }
}

/// geonode.com proxy-list API with a country filter in the query
pub struct Geonode;

impl Geonode {
    fn parse(&self, body: &str) -> Vec<Proxy> {
        let Ok(data) = serde_json::from_str::<Value>(body) else {
            return Vec::new();
        };
        data["data"]
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| {
                        let ip = entry["ip"].as_str()?;
                        let port = port_value(&entry["port"])?;
                        ProxyParser::from_parts(ip, &port, ProxyType::Http, self.name())
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl ProxySource for Geonode {
    fn name(&self) -> &'static str {
        "geonode.com"
    }

    fn reports_country(&self) -> bool {
        true
    }

    async fn fetch(&self, client: &Client) -> Result<Vec<Proxy>> {
        let url = "https://proxylist.geonode.com/api/proxy-list?limit=500&page=1&country=RU\
                   &speed=fast&protocols=http,https,socks4,socks5";
        let text = fetch_text(client, url).await?;
        Ok(self.parse(&text))
    }
}

/// free-proxy-list.net table; keeps only rows whose country column matches
pub struct FreeProxyList;

impl FreeProxyList {
    fn parse(&self, body: &str) -> Vec<Proxy> {
        let document = Html::parse_document(body);
        let rows = Selector::parse("#list tbody tr").expect("valid row selector");
        table_rows(&document, &rows)
            .into_iter()
            .filter_map(|cells| {
                if cells.len() < 8 || cell_text(&cells, 2) != "RU" {
                    return None;
                }
                ProxyParser::from_parts(
                    &cell_text(&cells, 0),
                    &cell_text(&cells, 1),
                    ProxyType::Http,
                    self.name(),
                )
            })
            .collect()
    }
}

#[async_trait]
impl ProxySource for FreeProxyList {
    fn name(&self) -> &'static str {
        "free-proxy-list.net"
    }

    fn reports_country(&self) -> bool {
        true
    }

    async fn fetch(&self, client: &Client) -> Result<Vec<Proxy>> {
        let text = fetch_text(client, "https://free-proxy-list.net/").await?;
        Ok(self.parse(&text))
    }
}

/// freeproxy.world table; country column is filtered but the listing is not
/// trusted, so candidates still go through geolocation
pub struct FreeProxyWorld;

impl FreeProxyWorld {
    fn parse(&self, body: &str) -> Vec<Proxy> {
        let document = Html::parse_document(body);
        let rows = Selector::parse(".table-striped tbody tr").expect("valid row selector");
        table_rows(&document, &rows)
            .into_iter()
            .filter_map(|cells| {
                if cells.len() < 2 {
                    return None;
                }
                let country = cell_text(&cells, 6);
                if !country.contains("Russia") && !country.contains("RU") {
                    return None;
                }
                ProxyParser::from_parts(
                    &cell_text(&cells, 0),
                    &cell_text(&cells, 1),
                    ProxyType::Http,
                    self.name(),
                )
            })
            .collect()
    }
}

#[async_trait]
impl ProxySource for FreeProxyWorld {
    fn name(&self) -> &'static str {
        "freeproxy.world"
    }

    async fn fetch(&self, client: &Client) -> Result<Vec<Proxy>> {
        let text = fetch_text(client, "https://www.freeproxy.world/").await?;
        Ok(self.parse(&text))
    }
}

/// good-proxies.ru free listing
pub struct GoodProxies;

impl GoodProxies {
    fn parse(&self, body: &str) -> Vec<Proxy> {
        let document = Html::parse_document(body);
        let rows = Selector::parse("table.proxy-list tbody tr").expect("valid row selector");
        table_rows(&document, &rows)
            .into_iter()
            .filter_map(|cells| {
                if cells.len() < 2 {
                    return None;
                }
                let country = cell_text(&cells, 2);
                if !country.contains("RU") && !country.contains("Россия") {
                    return None;
                }
                ProxyParser::from_parts(
                    &cell_text(&cells, 0),
                    &cell_text(&cells, 1),
                    ProxyType::Http,
                    self.name(),
                )
            })
            .collect()
    }
}

#[async_trait]
impl ProxySource for GoodProxies {
    fn name(&self) -> &'static str {
        "good-proxies.ru"
    }

    async fn fetch(&self, client: &Client) -> Result<Vec<Proxy>> {
        let text = fetch_text(client, "https://www.good-proxies.ru/free-proxy").await?;
        Ok(self.parse(&text))
    }
}

/// proxy-list.org russian listing; addresses are embedded in list items
pub struct ProxyListOrg;

static LIST_ITEM_ADDR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+\.\d+\.\d+\.\d+):(\d+)").expect("Invalid address regex"));

impl ProxyListOrg {
    fn parse(&self, body: &str) -> Vec<Proxy> {
        let document = Html::parse_document(body);
        let items = Selector::parse(".table ul li").expect("valid item selector");
        document
            .select(&items)
            .filter_map(|item| {
                let text = item.text().collect::<String>();
                let caps = LIST_ITEM_ADDR.captures(&text)?;
                ProxyParser::from_parts(&caps[1], &caps[2], ProxyType::Http, self.name())
            })
            .collect()
    }
}

#[async_trait]
impl ProxySource for ProxyListOrg {
    fn name(&self) -> &'static str {
        "proxy-list.org"
    }

    async fn fetch(&self, client: &Client) -> Result<Vec<Proxy>> {
        let text = fetch_text(client, "https://proxy-list.org/russian/index.php").await?;
        Ok(self.parse(&text))
    }
}

/// htmlweb.ru analyzer API
pub struct HtmlWeb;

impl HtmlWeb {
    fn parse(&self, body: &str) -> Vec<Proxy> {
        let Ok(data) = serde_json::from_str::<Value>(body) else {
            return Vec::new();
        };
        data["list"]
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| {
                        let ip = entry["ip"].as_str()?;
                        let port = port_value(&entry["port"])?;
                        ProxyParser::from_parts(ip, &port, ProxyType::Http, self.name())
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl ProxySource for HtmlWeb {
    fn name(&self) -> &'static str {
        "htmlweb.ru"
    }

    async fn fetch(&self, client: &Client) -> Result<Vec<Proxy>> {
        let url = "https://htmlweb.ru/analiz/api_proxy.php?country=ru&format=json";
        let text = fetch_text(client, url).await?;
        Ok(self.parse(&text))
    }
}
