//! Backend address normalization.
//!
//! Users usually type a bare public IP or domain for the machine running
//! the generation backend. That is expanded to `http://{host}:8000`.
//! Inputs that already name a scheme or port keep them.

use std::fmt;
use std::net::Ipv6Addr;

use reqwest::Url;

use crate::error::CoreError;

/// Port the generation backend listens on when none is given.
pub const DEFAULT_BACKEND_PORT: u16 = 8000;

/// A normalized backend base URL without a trailing slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendAddress(String);

impl BackendAddress {
    /// Normalize user input into a base URL.
    ///
    /// * `10.0.0.4` -> `http://10.0.0.4:8000`
    /// * `10.0.0.4/api` -> `http://10.0.0.4:8000/api`
    /// * `::1` -> `http://[::1]:8000`
    /// * `gen.example.com:9000` -> `http://gen.example.com:9000`
    /// * `https://gen.example.com/` -> `https://gen.example.com`
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let trimmed = input.trim();
        if trimmed.trim_end_matches('/').is_empty() {
            return Err(CoreError::Validation(
                "Please enter the backend address first".to_string(),
            ));
        }
        let invalid = || CoreError::Validation(format!("Invalid backend address '{trimmed}'"));
        if trimmed.contains(char::is_whitespace) {
            return Err(invalid());
        }

        let has_explicit_scheme = trimmed.contains("://");
        let candidate = if has_explicit_scheme {
            trimmed.to_string()
        } else if is_bare_ipv6(trimmed) {
            format!("http://[{trimmed}]")
        } else {
            format!("http://{trimmed}")
        };

        let mut url = Url::parse(&candidate).map_err(|_| invalid())?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(CoreError::Validation(format!(
                "Unsupported backend scheme '{}', expected http or https",
                url.scheme()
            )));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(invalid());
        }

        // The default port applies only to input without a scheme or port.
        // `Url` hides ports equal to the scheme default, so look at the text.
        if !has_explicit_scheme && !has_port(&candidate) {
            url.set_port(Some(DEFAULT_BACKEND_PORT)).map_err(|_| invalid())?;
        }

        Ok(Self(url.as_str().trim_end_matches('/').to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Join an endpoint path (with leading slash) onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.0, path)
    }
}

/// Whether the authority of `url` names a port, e.g. `host:80` or `[::1]:9000`.
fn has_port(url: &str) -> bool {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    authority
        .rsplit_once(':')
        .is_some_and(|(_, port)| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()))
}

/// `::1` or `fe80::2`, which need brackets inside a URL.
fn is_bare_ipv6(input: &str) -> bool {
    input.parse::<Ipv6Addr>().is_ok()
}

impl fmt::Display for BackendAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for BackendAddress {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_ip_gets_default_port() {
        let addr = BackendAddress::parse("20.115.3.9").unwrap();
        assert_eq!(addr.as_str(), "http://20.115.3.9:8000");
    }

    #[test]
    fn bare_domain_gets_default_port() {
        let addr = BackendAddress::parse("  gen.example.com ").unwrap();
        assert_eq!(addr.as_str(), "http://gen.example.com:8000");
    }

    #[test]
    fn explicit_port_is_kept() {
        let addr = BackendAddress::parse("gen.example.com:9000").unwrap();
        assert_eq!(addr.as_str(), "http://gen.example.com:9000");
    }

    #[test]
    fn explicit_scheme_is_kept_without_port() {
        let addr = BackendAddress::parse("https://gen.example.com/").unwrap();
        assert_eq!(addr.as_str(), "https://gen.example.com");
    }

    #[test]
    fn explicit_scheme_and_port() {
        let addr = BackendAddress::parse("http://127.0.0.1:41234").unwrap();
        assert_eq!(addr.as_str(), "http://127.0.0.1:41234");
        assert_eq!(addr.endpoint("/health"), "http://127.0.0.1:41234/health");
    }

    #[test]
    fn path_keeps_default_port_on_the_host() {
        let addr = BackendAddress::parse("10.0.0.4/api").unwrap();
        assert_eq!(addr.as_str(), "http://10.0.0.4:8000/api");
        assert_eq!(addr.endpoint("/health"), "http://10.0.0.4:8000/api/health");
    }

    #[test]
    fn explicit_default_http_port_is_not_replaced() {
        let addr = BackendAddress::parse("10.0.0.4:80").unwrap();
        assert_eq!(addr.as_str(), "http://10.0.0.4");
    }

    #[test]
    fn path_with_port_and_trailing_slash() {
        let addr = BackendAddress::parse("gen.example.com:9000/api/").unwrap();
        assert_eq!(addr.as_str(), "http://gen.example.com:9000/api");
    }

    #[test]
    fn bare_ipv6_is_bracketed() {
        let addr = BackendAddress::parse("::1").unwrap();
        assert_eq!(addr.as_str(), "http://[::1]:8000");
        assert_eq!(addr.endpoint("/health"), "http://[::1]:8000/health");
    }

    #[test]
    fn bracketed_ipv6_with_port_is_kept() {
        let addr = BackendAddress::parse("[::1]:9000").unwrap();
        assert_eq!(addr.as_str(), "http://[::1]:9000");
    }

    #[test]
    fn uppercase_scheme_is_accepted() {
        let addr = BackendAddress::parse("HTTP://Gen.Example.com").unwrap();
        assert_eq!(addr.as_str(), "http://gen.example.com");
    }

    #[test]
    fn unparsable_host_is_rejected() {
        assert!(BackendAddress::parse("host:notaport").is_err());
        assert!(BackendAddress::parse("http://").is_err());
    }

    #[test]
    fn empty_input_is_rejected() {
        let err = BackendAddress::parse("   ").unwrap_err();
        assert!(err.to_string().contains("backend address"));
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        assert!(BackendAddress::parse("ftp://host").is_err());
    }

    #[test]
    fn embedded_whitespace_is_rejected() {
        assert!(BackendAddress::parse("my host").is_err());
    }
}
