//! Transport seam between the API client and the wire.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::graphql::{GraphqlRequest, GraphqlResponse};

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send one operation, attaching `token` as a bearer credential when present.
    async fn execute(
        &self,
        req: &GraphqlRequest,
        token: Option<&str>,
    ) -> Result<GraphqlResponse, ApiError>;
}

/// GraphQL over HTTP POST.
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
}

impl HttpTransport {
    pub fn new(cfg: &ClientConfig) -> Result<Self, ApiError> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10));
        if let Some(ca) = cfg.tls_ca.as_deref() {
            for cert in crate::tls::reqwest_roots(ca)? {
                builder = builder.add_root_certificate(cert);
            }
        }
        Ok(Self {
            client: builder.build()?,
            endpoint: cfg.graphql_endpoint(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        req: &GraphqlRequest,
        token: Option<&str>,
    ) -> Result<GraphqlResponse, ApiError> {
        let mut builder = self.client.post(self.endpoint.clone()).json(req);
        if let Some(t) = token {
            builder = builder.bearer_auth(t);
        }
        let resp = builder.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        debug!(op = %req.operation_name, %status, bytes = body.len(), "graphql response");

        // Gateways in front of the API answer a bad token with a bare 401.
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthenticated(truncate(&body, 200)));
        }
        // GraphQL servers may put an errors body behind a 4xx; prefer it when it decodes.
        match serde_json::from_str::<GraphqlResponse>(&body) {
            Ok(parsed) if status.is_success() || !parsed.errors.is_empty() => Ok(parsed),
            _ if !status.is_success() => Err(ApiError::Http {
                status: status.as_u16(),
                body: truncate(&body, 200),
            }),
            Ok(parsed) => Ok(parsed),
            Err(e) => Err(ApiError::Decode(e.to_string())),
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééé", 3), "é...");
    }

    #[test]
    fn http_transport_targets_query_endpoint() {
        let cfg = ClientConfig::new("http://127.0.0.1:8080").unwrap();
        let t = HttpTransport::new(&cfg).unwrap();
        assert_eq!(t.endpoint().as_str(), "http://127.0.0.1:8080/query");
    }
}
