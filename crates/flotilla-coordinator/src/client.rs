//! Control-plane HTTP client: push configs to nodes, pull their counters.
//!
//! Both calls authenticate with the node's bearer token. The `_through`
//! variant tunnels the request over the configured forward proxy — the
//! fallback path for nodes that are unreachable directly.

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::Method;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status: {0}")]
    Status(reqwest::StatusCode),
}

pub struct HttpClient {
    inner: reqwest::Client,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            inner: reqwest::Client::builder().timeout(timeout).build()?,
            timeout,
        })
    }

    pub async fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        token: &str,
        body: Option<&B>,
    ) -> Result<Vec<u8>, ClientError> {
        send(&self.inner, method, url, token, body).await
    }

    /// Same request, tunneled through the forward proxy.
    pub async fn request_through<B: Serialize + ?Sized>(
        &self,
        proxy: &str,
        method: Method,
        url: &str,
        token: &str,
        body: Option<&B>,
    ) -> Result<Vec<u8>, ClientError> {
        let proxied = reqwest::Client::builder()
            .timeout(self.timeout)
            .proxy(reqwest::Proxy::all(proxy)?)
            .build()?;
        send(&proxied, method, url, token, body).await
    }

    pub async fn get(&self, url: &str, token: &str) -> Result<Vec<u8>, ClientError> {
        self.request::<()>(Method::GET, url, token, None).await
    }
}

async fn send<B: Serialize + ?Sized>(
    client: &reqwest::Client,
    method: Method,
    url: &str,
    token: &str,
    body: Option<&B>,
) -> Result<Vec<u8>, ClientError> {
    let mut request = client
        .request(method, url)
        .header(AUTHORIZATION, format!("Bearer {token}"));
    if let Some(body) = body {
        request = request.json(body);
    }
    let response = request.send().await?;
    if !response.status().is_success() {
        return Err(ClientError::Status(response.status()));
    }
    Ok(response.bytes().await?.to_vec())
}
