//! Async HTTP client wrapping reqwest.
//!
//! Not a browser, just HTTP requests. Two underlying clients: one that
//! follows redirects (limited to 5) and one that never does, so callers can
//! observe each hop. Nothing here retries; the caller owns retry policy.

use crate::error::{DetectError, DetectResult};
use reqwest::header::{LOCATION, USER_AGENT};
use std::time::Duration;

/// Largest prefix read when scanning for `</head>` (1 MiB).
const MAX_HEAD_BYTES: usize = 1024 * 1024;

/// Maximum redirect hops followed by hand.
pub const MAX_REDIRECT_HOPS: usize = 5;

/// Response from an HTTP GET request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Original requested URL.
    pub url: String,
    /// Final URL after redirects (the request URL when redirects are off).
    pub final_url: String,
    /// HTTP status code.
    pub status: u16,
    /// Location header, only meaningful on 3xx without redirect following.
    pub location: Option<String>,
    /// Response body as text.
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status) && self.location.is_some()
    }

    /// Turn non-2xx responses into a network error.
    pub fn error_for_status(self) -> DetectResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(DetectError::Network(format!("HTTP {} for {}", self.status, self.url)))
        }
    }
}

/// The leading part of an HTML document, up to and including `</head>`.
#[derive(Debug, Clone)]
pub struct HeadResponse {
    /// Final URL after redirects; relative links resolve against this.
    pub final_url: String,
    /// Markup read so far, truncated after `</head>` when it was seen.
    pub markup: String,
}

/// HTTP client for the acquisition engine.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    /// Same settings with redirect following disabled.
    no_redirect_client: reqwest::Client,
    user_agent: String,
}

impl HttpClient {
    /// Create a new HTTP client sending `user_agent` by default.
    pub fn new(user_agent: &str, timeout_ms: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECT_HOPS))
            .user_agent(user_agent)
            .build()
            .unwrap_or_default();

        let no_redirect_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(user_agent)
            .build()
            .unwrap_or_default();

        Self {
            client,
            no_redirect_client,
            user_agent: user_agent.to_string(),
        }
    }

    /// The default user agent.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// GET with the default user agent, following redirects.
    pub async fn get(&self, url: &str, timeout_ms: u64) -> DetectResult<HttpResponse> {
        self.send(&self.client, url, None, timeout_ms).await
    }

    /// GET with an explicit user agent, following redirects.
    pub async fn get_as(
        &self,
        url: &str,
        user_agent: &str,
        timeout_ms: u64,
    ) -> DetectResult<HttpResponse> {
        self.send(&self.client, url, Some(user_agent), timeout_ms)
            .await
    }

    /// GET without following redirects. 3xx responses are returned as-is.
    pub async fn get_no_redirect(&self, url: &str, timeout_ms: u64) -> DetectResult<HttpResponse> {
        self.send(&self.no_redirect_client, url, None, timeout_ms)
            .await
    }

    /// GET with redirects disabled, following up to [`MAX_REDIRECT_HOPS`] by hand.
    ///
    /// Returns the last response and every URL requested, in order. The
    /// last response's `url` is the true origin of the returned markup.
    pub async fn get_observing_redirects(
        &self,
        url: &str,
        timeout_ms: u64,
    ) -> DetectResult<(HttpResponse, Vec<String>)> {
        let mut hops = vec![url.to_string()];
        let mut resp = self.get_no_redirect(url, timeout_ms).await?;

        while resp.is_redirect() && hops.len() <= MAX_REDIRECT_HOPS {
            let Some(next) = resp
                .location
                .as_deref()
                .and_then(|loc| url::Url::parse(&resp.url).ok()?.join(loc).ok())
            else {
                break;
            };
            let next = next.to_string();
            tracing::debug!(from = %resp.url, to = %next, "following redirect hop");
            hops.push(next.clone());
            resp = self.get_no_redirect(&next, timeout_ms).await?;
        }

        Ok((resp, hops))
    }

    /// Fetch a page but stop reading once `</head>` has been received.
    pub async fn get_head(&self, url: &str, timeout_ms: u64) -> DetectResult<HeadResponse> {
        let mut resp = self
            .client
            .get(url)
            .timeout(Duration::from_millis(timeout_ms))
            .send()
            .await?;

        let final_url = resp.url().to_string();

        let mut buf: Vec<u8> = Vec::new();
        while let Some(chunk) = resp.chunk().await? {
            // Re-scan a small overlap so a tag split across chunks is still seen.
            let scan_from = buf.len().saturating_sub(6);
            buf.extend_from_slice(&chunk);
            if let Some(pos) = find_head_close(&buf[scan_from..]) {
                buf.truncate(scan_from + pos + "</head>".len());
                break;
            }
            if buf.len() >= MAX_HEAD_BYTES {
                break;
            }
        }

        Ok(HeadResponse {
            final_url,
            markup: String::from_utf8_lossy(&buf).into_owned(),
        })
    }

    async fn send(
        &self,
        client: &reqwest::Client,
        url: &str,
        user_agent: Option<&str>,
        timeout_ms: u64,
    ) -> DetectResult<HttpResponse> {
        let mut builder = client.get(url).timeout(Duration::from_millis(timeout_ms));
        if let Some(ua) = user_agent {
            builder = builder.header(USER_AGENT, ua);
        }

        let r = builder.send().await?;
        let status = r.status().as_u16();
        let final_url = r.url().to_string();
        let location = r
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = r.text().await.map_err(DetectError::network)?;

        Ok(HttpResponse {
            url: url.to_string(),
            final_url,
            status,
            location,
            body,
        })
    }
}

/// Case-insensitive search for `</head>`.
fn find_head_close(bytes: &[u8]) -> Option<usize> {
    const NEEDLE: &[u8] = b"</head>";
    bytes
        .windows(NEEDLE.len())
        .position(|w| w.eq_ignore_ascii_case(NEEDLE))
}
