//! HTTP transport seam shared by all drivers.
//!
//! Drivers build plain [`HttpRequest`] values and hand them to an
//! [`HttpTransport`]. The production transport sits on `reqwest`; tests swap
//! in a scripted transport so no test ever touches the network.

use async_trait::async_trait;
use reqwest::header::{COOKIE, SET_COOKIE};
use std::time::Duration;

use crate::error::ScoutError;
use crate::types::ProviderId;

/// Browser-like user agent; several upstreams refuse obvious bots.
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
}

/// A single upstream request, independent of any HTTP library.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub provider: ProviderId,
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Body>,
}

impl HttpRequest {
    pub fn get<U: Into<String>>(provider: ProviderId, url: U) -> Self {
        Self {
            provider,
            method: Method::Get,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post<U: Into<String>>(provider: ProviderId, url: U) -> Self {
        Self {
            method: Method::Post,
            ..Self::get(provider, url)
        }
    }

    pub fn query<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Attach a `Cookie` header; skipped when the value is empty.
    pub fn cookies(self, header_value: String) -> Self {
        if header_value.is_empty() {
            self
        } else {
            self.header(COOKIE.as_str(), header_value)
        }
    }

    pub fn json(mut self, value: serde_json::Value) -> Self {
        self.body = Some(Body::Json(value));
        self
    }

    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.body = Some(Body::Form(fields));
        self
    }

    /// Value of a query parameter, if set.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value of a header (case-insensitive name), if set.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// What the drivers need from a response: status, cookies and the body text.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Raw `Set-Cookie` header values, in arrival order
    pub set_cookies: Vec<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn new<B: Into<String>>(status: u16, body: B) -> Self {
        Self {
            status,
            set_cookies: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_cookie<C: Into<String>>(mut self, set_cookie: C) -> Self {
        self.set_cookies.push(set_cookie.into());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Anything that can carry an [`HttpRequest`] to an upstream.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ScoutError>;
}

/// Send a request and fail on non-success status, tagging errors with the provider.
pub(crate) async fn fetch(
    transport: &dyn HttpTransport,
    request: HttpRequest,
) -> Result<HttpResponse, ScoutError> {
    let provider = request.provider;
    let response = transport.send(request).await?;
    if response.is_success() {
        Ok(response)
    } else {
        Err(ScoutError::transport_status(provider, response.status))
    }
}

/// Production transport on top of `reqwest`.
#[derive(Clone)]
pub struct ReqwestTransport {
    http_client: reqwest::Client,
    /// Upper bound for each individual request, body included
    timeout: Duration,
}

impl ReqwestTransport {
    /// Create a transport whose requests each fail after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, ScoutError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout + Duration::from_secs(1))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                ScoutError::transport("http", format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            http_client,
            timeout,
        })
    }

    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ScoutError> {
        let provider = request.provider;
        let mut builder = match request.method {
            Method::Get => self.http_client.get(&request.url),
            Method::Post => self.http_client.post(&request.url),
        };

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            Some(Body::Json(value)) => builder.json(&value),
            Some(Body::Form(fields)) => builder.form(&fields),
            None => builder,
        };

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ScoutError::timeout(format!("{} request", provider), self.timeout)
            } else {
                ScoutError::transport(provider, format!("Request failed: {}", e))
            }
        })?;

        let status = response.status().as_u16();
        let set_cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(String::from)
            .collect();
        let body = response.text().await.map_err(|e| {
            ScoutError::transport(provider, format!("Failed to read body: {}", e))
        })?;

        Ok(HttpResponse {
            status,
            set_cookies,
            body,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ScoutError> {
        let provider = request.provider;
        tracing::debug!(
            provider = %provider,
            method = ?request.method,
            url = %request.url,
            "sending upstream request"
        );

        match tokio::time::timeout(self.timeout, self.execute(request)).await {
            Ok(result) => {
                if let Ok(response) = &result {
                    tracing::debug!(provider = %provider, status = response.status, "upstream responded");
                }
                result
            }
            Err(_) => Err(ScoutError::timeout(
                format!("{} request", provider),
                self.timeout,
            )),
        }
    }
}
