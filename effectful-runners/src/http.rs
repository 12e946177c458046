//! HTTP runner backed by `reqwest`.

use async_trait::async_trait;
use effect0::{DurationMs, HttpFailure, HttpRequest, HttpResponse, HttpRunner};
use std::error::Error as _;
use std::io;

/// An [`HttpRunner`] using a shared `reqwest::Client`.
///
/// Any status code is a successful exchange; only transport problems
/// are failures. The interpreter's deadline bounds every call; an
/// optional client-side timeout can be set with
/// [`ReqwestHttp::with_timeout`] and surfaces as `HttpFailure::Timeout`.
#[derive(Debug, Clone)]
pub struct ReqwestHttp {
    client: reqwest::Client,
    timeout: Option<DurationMs>,
}

impl Default for ReqwestHttp {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

impl ReqwestHttp {
    /// Wrap an existing client (connection pool, TLS config, proxies).
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: None,
        }
    }

    /// Apply a per-request timeout inside reqwest itself.
    #[must_use]
    pub fn with_timeout(mut self, timeout: DurationMs) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn map_error(&self, err: reqwest::Error) -> HttpFailure {
        if err.is_timeout() {
            return match self.timeout {
                Some(t) => HttpFailure::Timeout(t),
                None => HttpFailure::Connection(err.to_string()),
            };
        }
        map_reqwest_error(err)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> HttpFailure {
    if is_connection_lost(&err) {
        return HttpFailure::Connection(err.to_string());
    }
    if err.is_builder() {
        HttpFailure::InvalidRequest(err.to_string())
    } else if err.is_connect() || err.is_request() {
        HttpFailure::Connection(err.to_string())
    } else if err.is_redirect() || err.is_body() || err.is_decode() {
        HttpFailure::Protocol(err.to_string())
    } else {
        HttpFailure::Unknown(err.to_string())
    }
}

/// Whether the peer dropped the connection mid-exchange. reqwest reports
/// a reset during the body read as a body/decode error; the underlying
/// `io::Error` sits further down the source chain.
fn is_connection_lost(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = err.source();
    while let Some(e) = source {
        if let Some(io) = e.downcast_ref::<io::Error>() {
            return matches!(
                io.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            );
        }
        source = e.source();
    }
    false
}

#[async_trait]
impl HttpRunner for ReqwestHttp {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpFailure> {
        request.check()?;
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| HttpFailure::InvalidRequest(e.to_string()))?;

        let mut builder = self.client.request(method, request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        if let Some(t) = self.timeout {
            builder = builder.timeout(t.to_std());
        }

        let response = builder.send().await.map_err(|e| self.map_error(e))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| {
                if is_connection_lost(&e) {
                    HttpFailure::Connection(format!("reading body: {e}"))
                } else {
                    HttpFailure::Protocol(format!("reading body: {e}"))
                }
            })?
            .to_vec();

        tracing::trace!(status, bytes = body.len(), "effectful.http.response");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
