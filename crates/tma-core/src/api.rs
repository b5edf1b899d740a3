//! HTTP façade for exercising a Mini App backend.
//!
//! Thin wrapper over `reqwest`: attaches the initData authorization header,
//! applies the configured timeout and retry policy, and records timing.

use std::time::{Duration, Instant};

use reqwest::{header::HeaderMap, Method, StatusCode};
use serde::de::DeserializeOwned;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

use crate::{config::Config, errors::Error, Result};

/// Scheme Telegram Mini App backends expect in the `Authorization` header.
pub const AUTH_SCHEME: &str = "tma";

pub fn authorization_value(init_data: &str) -> String {
    format!("{AUTH_SCHEME} {init_data}")
}

#[derive(Clone, Debug)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
    /// Time from sending the request to having the full body.
    pub elapsed: Duration,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

#[derive(Clone, Debug)]
pub struct ApiClient {
    base_url: Url,
    http: reqwest::Client,
    init_data: Option<String>,
    retry_count: u32,
    retry_delay: Duration,
}

impl ApiClient {
    pub fn new(base_url: Url, cfg: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout())
            .build()
            .map_err(|e| Error::External(format!("http client build error: {e}")))?;
        Ok(Self {
            base_url: with_trailing_slash(base_url),
            http,
            init_data: None,
            retry_count: cfg.retry_count(),
            retry_delay: cfg.retry_delay(),
        })
    }

    /// Client for the configured `mini_app_url`.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let base = cfg
            .mini_app_url()
            .cloned()
            .ok_or_else(|| Error::Config("mini_app_url is not configured".to_string()))?;
        Self::new(base, cfg)
    }

    /// Authenticate subsequent requests as the user in `init_data`.
    pub fn with_init_data(mut self, init_data: impl Into<String>) -> Self {
        self.init_data = Some(init_data.into());
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn url_for(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| Error::External(format!("invalid request path {path:?}: {e}")))
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: &serde_json::Value) -> Result<ApiResponse> {
        self.request(Method::POST, path, Some(body)).await
    }

    /// Send a request, retrying connect/timeout failures.
    ///
    /// Any HTTP status, including 5xx, is returned to the caller as-is.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<ApiResponse> {
        let url = self.url_for(path)?;
        let mut attempt = 0u32;

        loop {
            let mut req = self.http.request(method.clone(), url.clone());
            if let Some(init_data) = &self.init_data {
                req = req.header(reqwest::header::AUTHORIZATION, authorization_value(init_data));
            }
            if let Some(body) = body {
                req = req.json(body);
            }

            let started = Instant::now();
            match req.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let headers = resp.headers().clone();
                    let body = resp
                        .text()
                        .await
                        .map_err(|e| Error::External(format!("http body error: {e}")))?;
                    let elapsed = started.elapsed();
                    debug!(%method, %url, status = status.as_u16(), ?elapsed, "api request");
                    return Ok(ApiResponse {
                        status,
                        headers,
                        body,
                        elapsed,
                    });
                }
                Err(e) if attempt < self.retry_count && (e.is_connect() || e.is_timeout()) => {
                    attempt += 1;
                    warn!(%method, %url, attempt, error = %e, "api request failed, retrying");
                    sleep(self.retry_delay).await;
                }
                Err(e) => {
                    return Err(Error::External(format!("http request error: {e}")));
                }
            }
        }
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
mod tests {
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        sync::oneshot,
    };

    use super::*;
    use crate::config::ConfigParams;

    fn config(url: Option<&str>) -> Config {
        Config::new(ConfigParams {
            api_id: Some(1),
            api_hash: Some("0123456789abcdef0123456789abcdef".to_string()),
            session_string: Some("session".to_string()),
            retry_count: Some(0),
            mini_app_url: url.map(str::to_string),
            ..ConfigParams::default()
        })
        .unwrap()
    }

    #[test]
    fn joins_paths_under_base() {
        let client = ApiClient::from_config(&config(Some("https://example.org/api"))).unwrap();
        assert_eq!(client.base_url().as_str(), "https://example.org/api/");
        assert_eq!(
            client.url_for("/users/me").unwrap().as_str(),
            "https://example.org/api/users/me"
        );
    }

    #[test]
    fn from_config_requires_mini_app_url() {
        assert!(matches!(
            ApiClient::from_config(&config(None)),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn authorization_uses_tma_scheme() {
        assert_eq!(authorization_value("a=1&hash=ff"), "tma a=1&hash=ff");
    }

    /// One-shot HTTP server that records the raw request head.
    async fn serve_once(body: &'static str) -> (Url, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = sock.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());

            let resp = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            sock.write_all(resp.as_bytes()).await.unwrap();
            sock.shutdown().await.unwrap();
        });

        (Url::parse(&format!("http://{addr}/")).unwrap(), rx)
    }

    #[tokio::test]
    async fn get_sends_init_data_and_decodes_json() {
        let (base, head) = serve_once(r#"{"ok":true,"id":42}"#).await;
        let client = ApiClient::new(base, &config(None))
            .unwrap()
            .with_init_data("auth_date=1&hash=ab");

        let resp = client.get("/me").await.unwrap();
        assert!(resp.is_success());
        let v: serde_json::Value = resp.json().unwrap();
        assert_eq!(v["id"], 42);

        let head = head.await.unwrap().to_lowercase();
        assert!(head.starts_with("get /me http/1.1"), "{head}");
        assert!(head.contains("authorization: tma auth_date=1&hash=ab"), "{head}");
    }
}
