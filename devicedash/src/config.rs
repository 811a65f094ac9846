//! Client configuration: API base URL, TLS trust, polling cadence and paging.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::types::DEFAULT_PAGE_SIZE;

/// Base URL baked in at build time (`DEVICEDASH_API_URL`), falling back to localhost.
pub const DEFAULT_API_URL: &str = match option_env!("DEVICEDASH_API_URL") {
    Some(u) => u,
    None => "http://localhost:8080",
};

pub const DEFAULT_POLL_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: Url,
    pub tls_ca: Option<PathBuf>,
    pub poll_interval: Duration,
    pub page_size: u32,
}

impl ClientConfig {
    pub fn new(api_url: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            api_url: parse_base_url(api_url)?,
            tls_ca: None,
            poll_interval: Duration::from_secs(DEFAULT_POLL_SECS),
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    pub fn with_tls_ca(mut self, ca: Option<PathBuf>) -> Self {
        self.tls_ca = ca;
        self
    }

    pub fn with_poll_interval(mut self, d: Duration) -> Self {
        self.poll_interval = d;
        self
    }

    pub fn with_page_size(mut self, n: u32) -> Self {
        self.page_size = n.max(1);
        self
    }

    /// HTTP endpoint for queries and mutations.
    pub fn graphql_endpoint(&self) -> Url {
        endpoint(&self.api_url)
    }

    /// WebSocket endpoint for subscriptions (`http→ws`, `https→wss`).
    pub fn subscription_endpoint(&self) -> Url {
        let mut u = endpoint(&self.api_url);
        let scheme = if u.scheme() == "https" { "wss" } else { "ws" };
        // http(s) → ws(s) is always an allowed scheme change for special schemes
        let _ = u.set_scheme(scheme);
        u
    }

    /// Config pointing at the build-time default URL.
    pub fn from_build_default() -> Result<Self, url::ParseError> {
        Self::new(DEFAULT_API_URL)
    }
}

/// Accept `host:port` shorthand and ws/wss URLs; normalize to http(s).
pub fn parse_base_url(raw: &str) -> Result<Url, url::ParseError> {
    let raw = raw.trim();
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };
    let mut u = Url::parse(&with_scheme)?;
    match u.scheme() {
        "ws" => {
            let _ = u.set_scheme("http");
        }
        "wss" => {
            let _ = u.set_scheme("https");
        }
        _ => {}
    }
    Ok(u)
}

fn endpoint(base: &Url) -> Url {
    let mut u = base.clone();
    let path = u.path().trim_end_matches('/');
    let path = if path.ends_with("/query") {
        path.to_string()
    } else {
        format!("{path}/query")
    };
    u.set_path(&path);
    u.set_query(None);
    u
}
