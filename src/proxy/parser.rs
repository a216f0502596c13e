//! Parsing of provider payloads into proxy candidates

use crate::proxy::models::{Proxy, ProxyType};
use once_cell::sync::Lazy;
use regex::Regex;

/// Regex pattern to match IP:PORT pairs embedded in arbitrary text
static IP_PORT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}):(\d{1,5})\b")
        .expect("Invalid IP:PORT regex")
});

/// Parses raw provider listings into proxy candidates
pub struct ProxyParser;

impl ProxyParser {
    /// Parse a single `HOST:PORT` line; empty lines and `#` comments yield None
    pub fn parse_line(line: &str, protocol: ProxyType, source: &str) -> Option<Proxy> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let (host, port) = line.split_once(':')?;
        let host = host.trim();
        let port: u16 = port.trim().parse().ok()?;
        if host.is_empty() || port == 0 {
            return None;
        }

        Some(Proxy::new(host.to_string(), port, protocol, source))
    }

    /// Parse a line-oriented listing (one `HOST:PORT` per line)
    pub fn parse_list(content: &str, protocol: ProxyType, source: &str) -> Vec<Proxy> {
        content
            .lines()
            .filter_map(|line| Self::parse_line(line, protocol.clone(), source))
            .collect()
    }

    /// Extract `IP:PORT` pairs embedded in arbitrary text (markup, prose)
    pub fn extract_from_text(content: &str, protocol: ProxyType, source: &str) -> Vec<Proxy> {
        IP_PORT_REGEX
            .captures_iter(content)
            .filter_map(|cap| {
                let host = cap.get(1)?.as_str().to_string();
                let port: u16 = cap.get(2)?.as_str().parse().ok()?;

                // Validate IP address parts
                let parts: Vec<&str> = host.split('.').collect();
                if parts.len() != 4 {
                    return None;
                }
                for part in parts {
                    let num: u32 = part.parse().ok()?;
                    if num > 255 {
                        return None;
                    }
                }

                if port == 0 {
                    return None;
                }

                Some(Proxy::new(host, port, protocol.clone(), source))
            })
            .collect()
    }

    /// Build a candidate from separately scraped host and port cells
    pub fn from_parts(host: &str, port: &str, protocol: ProxyType, source: &str) -> Option<Proxy> {
        let host = host.trim();
        let port: u16 = port.trim().parse().ok()?;
        if host.is_empty() || port == 0 {
            return None;
        }
        Some(Proxy::new(host.to_string(), port, protocol, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_line() {
        let proxy = ProxyParser::parse_line("192.168.1.1:8080", ProxyType::Http, "test").unwrap();
        assert_eq!(proxy.host, "192.168.1.1");
        assert_eq!(proxy.port, 8080);
        assert_eq!(proxy.source, "test");
    }

    #[test]
    fn test_parse_line_trims_whitespace() {
        let proxy = ProxyParser::parse_line("  10.0.0.1:3128 \r", ProxyType::Http, "test").unwrap();
        assert_eq!(proxy.host, "10.0.0.1");
        assert_eq!(proxy.port, 3128);
    }

    #[test]
    fn test_parse_empty_and_comment_lines() {
        assert!(ProxyParser::parse_line("", ProxyType::Http, "test").is_none());
        assert!(ProxyParser::parse_line("# comment", ProxyType::Http, "test").is_none());
    }

    #[test]
    fn test_parse_invalid_lines() {
        assert!(ProxyParser::parse_line("invalid", ProxyType::Http, "test").is_none());
        assert!(ProxyParser::parse_line("192.168.1.1", ProxyType::Http, "test").is_none());
        assert!(ProxyParser::parse_line("192.168.1.1:abc", ProxyType::Http, "test").is_none());
        assert!(ProxyParser::parse_line("192.168.1.1:0", ProxyType::Http, "test").is_none());
    }

    #[test]
    fn test_parse_list() {
        let content = "192.168.1.1:8080\r\n# comment\n192.168.1.2:3128\n\n";
        let proxies = ProxyParser::parse_list(content, ProxyType::Http, "test");
        assert_eq!(proxies.len(), 2);
    }

    #[test]
    fn test_extract_from_text() {
        let content = "Here is a proxy: 192.168.1.1:8080 and another one 10.0.0.1:3128.";
        let proxies = ProxyParser::extract_from_text(content, ProxyType::Http, "test");
        assert_eq!(proxies.len(), 2);
    }

    #[test]
    fn test_extract_rejects_invalid_octets() {
        let content = "Invalid IP: 999.999.999.999:8080";
        let proxies = ProxyParser::extract_from_text(content, ProxyType::Http, "test");
        assert!(proxies.is_empty());
    }

    #[test]
    fn test_extract_rejects_zero_port() {
        let content = "Zero port: 192.168.1.1:0";
        let proxies = ProxyParser::extract_from_text(content, ProxyType::Http, "test");
        assert!(proxies.is_empty());
    }

    #[test]
    fn test_from_parts() {
        let proxy = ProxyParser::from_parts(" 1.2.3.4 ", "8080", ProxyType::Http, "test").unwrap();
        assert_eq!(proxy.address(), "1.2.3.4:8080");
        assert!(ProxyParser::from_parts("1.2.3.4", "notaport", ProxyType::Http, "test").is_none());
    }
}
