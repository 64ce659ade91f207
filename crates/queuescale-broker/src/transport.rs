//! Minimal JSON-over-HTTP client for the monitoring endpoint.

use std::time::Duration;

use bytes::Bytes;
use http::Uri;
use http_body_util::{BodyExt, Empty};
use serde::de::DeserializeOwned;
use tracing::debug;

use queuescale_core::{ScaleError, ScaleResult};

/// A parsed `http://host[:port][/prefix]` base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// `host:port` to connect to.
    address: String,
    /// Value for the `host` header.
    host: String,
    /// Path prefix without a trailing slash.
    prefix: String,
}

impl Endpoint {
    pub fn parse(url: &str) -> ScaleResult<Self> {
        let uri: Uri = url
            .trim()
            .parse()
            .map_err(|e| ScaleError::Config(format!("invalid broker url \"{url}\": {e}")))?;

        if uri.scheme_str() != Some("http") {
            return Err(ScaleError::Config(format!(
                "broker url \"{url}\" must use http://"
            )));
        }
        let authority = uri
            .authority()
            .ok_or_else(|| ScaleError::Config(format!("broker url \"{url}\" has no host")))?;

        let host = authority.host();
        let (address, host_header) = match authority.port_u16() {
            Some(port) => (format!("{host}:{port}"), format!("{host}:{port}")),
            None => (format!("{host}:80"), host.to_string()),
        };

        Ok(Self {
            address,
            host: host_header,
            prefix: uri.path().trim_end_matches('/').to_string(),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Origin-form request target for `path` under the prefix.
    pub fn target(&self, path: &str) -> String {
        format!("{}{path}", self.prefix)
    }

    /// GET `path` and decode the JSON body, all within `timeout`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        timeout: Duration,
    ) -> ScaleResult<T> {
        let target = self.target(path);
        let body = tokio::time::timeout(timeout, self.get(&target))
            .await
            .map_err(|_| {
                ScaleError::Broker(format!("GET {target} timed out after {timeout:?}"))
            })??;

        serde_json::from_slice(&body)
            .map_err(|e| ScaleError::Broker(format!("GET {target}: invalid response body: {e}")))
    }

    async fn get(&self, target: &str) -> ScaleResult<Bytes> {
        let stream = tokio::net::TcpStream::connect(&self.address)
            .await
            .map_err(|e| request_error(target, "connect failed", e))?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| request_error(target, "handshake failed", e))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "broker connection closed with error");
            }
        });

        let req = http::Request::builder()
            .method("GET")
            .uri(target)
            .header("host", &self.host)
            .header("accept", "application/json")
            .header("user-agent", "queuescale/0.1")
            .body(Empty::<Bytes>::new())
            .map_err(|e| request_error(target, "invalid request", e))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| request_error(target, "request failed", e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ScaleError::Broker(format!("GET {target}: status {status}")));
        }

        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| request_error(target, "reading body failed", e))?
            .to_bytes();
        debug!(%target, %status, bytes = body.len(), "broker response");
        Ok(body)
    }
}

fn request_error(target: &str, what: &str, e: impl std::fmt::Display) -> ScaleError {
    ScaleError::Broker(format!("GET {target}: {what}: {e}"))
}
