//! HTTP transport backed by `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;

use noderpc_core::config::ClientConfig;
use noderpc_core::error::RpcError;
use noderpc_core::transport::{RpcTransport, TransportKind};

pub const USER_AGENT: &str = concat!("noderpc/", env!("CARGO_PKG_VERSION"));

/// Stateless HTTP channel to one node.
pub struct HttpTransport {
    url: String,
    http: reqwest::Client,
    auth: Option<(String, String)>,
}

impl HttpTransport {
    /// Build a transport for `url` with the timeout and credentials from `config`.
    pub fn new(url: impl Into<String>, config: &ClientConfig) -> Result<Self, RpcError> {
        Self::with_timeout(url, config.request_timeout(), config.credentials())
    }

    pub fn with_timeout(
        url: impl Into<String>,
        timeout: Duration,
        credentials: Option<(&str, &str)>,
    ) -> Result<Self, RpcError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| RpcError::Configuration(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            http,
            auth: credentials.map(|(u, p)| (u.to_string(), p.to_string())),
        })
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn send(&self, payload: &str) -> Result<String, RpcError> {
        let mut req = self.http.post(&self.url).body(payload.to_string());
        if let Some((user, password)) = &self.auth {
            req = req.basic_auth(user, Some(password));
        }

        let resp = req.send().await.map_err(|e| {
            tracing::debug!(url = %self.url, error = %e, timeout = e.is_timeout(), "HTTP request failed");
            RpcError::Transport(e.to_string())
        })?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(RpcError::Unauthorized { url: self.url.clone() });
        }
        if !status.is_success() {
            tracing::debug!(url = %self.url, status = status.as_u16(), "non-success HTTP status");
        }
        resp.text().await.map_err(|e| RpcError::Transport(e.to_string()))
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Stateless
    }

    fn url(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve exactly one canned HTTP response and hand back the raw request.
    async fn one_shot(status: &str, body: &str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        let handle = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let n = sock.read(&mut buf).await.unwrap();
            sock.write_all(response.as_bytes()).await.unwrap();
            sock.shutdown().await.ok();
            String::from_utf8_lossy(&buf[..n]).into_owned()
        });
        (format!("http://{addr}"), handle)
    }

    #[tokio::test]
    async fn returns_body_text() {
        let (url, server) = one_shot("200 OK", r#"{"id":1,"result":7}"#).await;
        let t = HttpTransport::with_timeout(&url, Duration::from_secs(5), None).unwrap();
        let reply = t.send(r#"{"id":1}"#).await.unwrap();
        assert_eq!(reply, r#"{"id":1,"result":7}"#);

        let request = server.await.unwrap().to_lowercase();
        assert!(request.starts_with("post "));
        assert!(request.contains("content-type: application/json"));
        assert!(request.contains("user-agent: noderpc/"));
    }

    #[tokio::test]
    async fn error_pages_are_returned_as_text() {
        let (url, _server) = one_shot("502 Bad Gateway", "<h1>502 Bad Gateway</h1>").await;
        let t = HttpTransport::with_timeout(&url, Duration::from_secs(5), None).unwrap();
        assert_eq!(t.send("{}").await.unwrap(), "<h1>502 Bad Gateway</h1>");
    }

    #[tokio::test]
    async fn unauthorized_is_mapped() {
        let (url, server) = one_shot("401 Unauthorized", "").await;
        let t = HttpTransport::with_timeout(&url, Duration::from_secs(5), Some(("alice", "pw"))).unwrap();
        let err = t.send("{}").await.unwrap_err();
        assert!(matches!(err, RpcError::Unauthorized { .. }));
        assert!(server.await.unwrap().to_lowercase().contains("authorization: basic"));
    }

    #[tokio::test]
    async fn refused_connection_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let t = HttpTransport::with_timeout(format!("http://{addr}"), Duration::from_secs(5), None).unwrap();
        let err = t.send("{}").await.unwrap_err();
        assert!(matches!(err, RpcError::Transport(_)));
        assert_eq!(t.kind(), TransportKind::Stateless);
    }
}
