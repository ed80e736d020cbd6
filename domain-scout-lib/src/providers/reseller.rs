//! Reseller driver: one "prepare" call plus chunked secondary checks.
//!
//! Upstream contract (best effort, owned by the reseller):
//!
//! - `POST {base}/api/domains/prepare` with `{"domains": "<newline-joined>"}`
//!   returns `{"domains": [{"domain", "status", "premium", "price",
//!   "renewalPrice"}]}` and a session cookie. Prices are display strings that
//!   may contain HTML numeric entities.
//! - `GET {base}/api/domains/check?names=<pipe-joined>` with that cookie
//!   returns `{"statuses": {"<domain>": <code>}}`. At most
//!   [`MAX_SECONDARY_CHUNK`](crate::config::MAX_SECONDARY_CHUNK) names per call.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::concurrent::{chunk_domains, dispatch_chunks};
use crate::config::ResellerSettings;
use crate::error::ScoutError;
use crate::http::{fetch, HttpRequest, HttpTransport};
use crate::providers::Driver;
use crate::session::CookieSet;
use crate::types::{DomainResult, Price, ProviderId, ProviderOutcome, SearchOptions};
use crate::utils::{canonicalize_all, canonicalize_domain};

const PROVIDER: ProviderId = ProviderId::Reseller;

const PREPARE_PATH: &str = "/api/domains/prepare";
const CHECK_PATH: &str = "/api/domains/check";

/// Status codes reported by both endpoints. Any other value means the
/// upstream has not decided yet and a secondary check is needed.
const STATUS_CODES: &[(i64, StatusClass)] = &[
    (1, StatusClass::Available),
    (2, StatusClass::PreregistrationAvailable),
    (3, StatusClass::Unavailable),
    (4, StatusClass::Reserved),
];

lazy_static! {
    static ref NUMERIC_ENTITY: Regex =
        Regex::new(r"&#([xX][0-9a-fA-F]+|[0-9]+);").expect("entity pattern is valid");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusClass {
    Available,
    PreregistrationAvailable,
    Unavailable,
    Reserved,
    NeedsCheck,
}

impl StatusClass {
    fn from_code(code: i64) -> Self {
        STATUS_CODES
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, class)| *class)
            .unwrap_or(StatusClass::NeedsCheck)
    }

    fn is_available(self) -> bool {
        matches!(
            self,
            StatusClass::Available | StatusClass::PreregistrationAvailable
        )
    }
}

#[derive(Debug, Deserialize)]
struct PrepareResponse {
    #[serde(default)]
    domains: Vec<PrepareEntry>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrepareEntry {
    domain: String,
    status: i64,
    #[serde(default)]
    premium: bool,
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    renewal_price: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    #[serde(default)]
    statuses: HashMap<String, i64>,
    #[serde(default)]
    error: Option<String>,
}

/// Driver for the reseller upstream.
pub struct ResellerDriver {
    transport: Arc<dyn HttpTransport>,
    settings: ResellerSettings,
    /// Names per secondary-check request
    chunk_size: usize,
}

impl ResellerDriver {
    pub fn new(transport: Arc<dyn HttpTransport>, settings: ResellerSettings, chunk_size: usize) -> Self {
        Self {
            transport,
            settings,
            chunk_size,
        }
    }

    fn base_url(&self) -> Result<&str, ScoutError> {
        self.settings
            .base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .ok_or_else(|| ScoutError::config("reseller base_url is not configured"))
    }

    async fn check(&self, domains: Vec<String>) -> Result<Vec<DomainResult>, ScoutError> {
        let base_url = self.base_url()?;

        let response = fetch(
            self.transport.as_ref(),
            HttpRequest::post(PROVIDER, format!("{}{}", base_url, PREPARE_PATH))
                .json(serde_json::json!({ "domains": domains.join("\n") })),
        )
        .await?;

        let cookies = CookieSet::from_set_cookie_headers(&response.set_cookies);
        let entries = parse_prepare(&response.body)?;

        let mut pending = Vec::new();
        let mut results: Vec<DomainResult> = entries
            .into_iter()
            .map(|entry| {
                let domain = entry.domain.trim().to_lowercase();
                let class = StatusClass::from_code(entry.status);
                if class == StatusClass::NeedsCheck {
                    pending.push(domain.clone());
                }
                let price = entry.price.as_deref().and_then(parse_price).map(|registration| {
                    Price::new(
                        registration,
                        entry.renewal_price.as_deref().and_then(parse_price),
                        self.settings.currency.clone(),
                    )
                });
                DomainResult::new(domain, class.is_available(), PROVIDER)
                    .with_premium(entry.premium)
                    .with_price(price)
            })
            .collect();

        if !pending.is_empty() {
            tracing::debug!(provider = %PROVIDER, pending = pending.len(), "running secondary check");
            let resolved = self.secondary_check(base_url, &cookies, &pending).await;
            for result in results.iter_mut() {
                if resolved.contains(&result.domain) {
                    result.available = true;
                }
            }
        }

        Ok(results)
    }

    /// Returns the names whose secondary status is available-class.
    ///
    /// A failed chunk is logged and contributes nothing, so its domains keep
    /// their prepare-phase availability.
    async fn secondary_check(
        &self,
        base_url: &str,
        cookies: &CookieSet,
        pending: &[String],
    ) -> HashSet<String> {
        let chunks = chunk_domains(pending, self.chunk_size);
        let responses = dispatch_chunks(chunks, |chunk| self.check_chunk(base_url, cookies, chunk)).await;

        let mut resolved = HashSet::new();
        for (index, response) in responses.into_iter().enumerate() {
            match response {
                Ok(statuses) => resolved.extend(
                    statuses
                        .into_iter()
                        .filter(|(_, code)| StatusClass::from_code(*code).is_available())
                        .map(|(domain, _)| domain.trim().to_lowercase()),
                ),
                Err(e) => {
                    tracing::warn!(provider = %PROVIDER, chunk = index, error = %e, "secondary check failed")
                }
            }
        }
        resolved
    }

    async fn check_chunk(
        &self,
        base_url: &str,
        cookies: &CookieSet,
        chunk: Vec<String>,
    ) -> Result<HashMap<String, i64>, ScoutError> {
        let response = fetch(
            self.transport.as_ref(),
            HttpRequest::get(PROVIDER, format!("{}{}", base_url, CHECK_PATH))
                .query("names", chunk.join("|"))
                .cookies(cookies.header_value()),
        )
        .await?;

        let parsed: CheckResponse = serde_json::from_str(&response.body).map_err(|e| {
            ScoutError::parse(PROVIDER, format!("Unexpected check response: {}", e))
        })?;
        if let Some(message) = parsed.error.filter(|m| !m.trim().is_empty()) {
            return Err(ScoutError::upstream(PROVIDER, message));
        }
        Ok(parsed.statuses)
    }
}

#[async_trait]
impl Driver for ResellerDriver {
    fn id(&self) -> ProviderId {
        PROVIDER
    }

    fn canonicalize(&self, query: &str) -> Option<String> {
        canonicalize_domain(query, None).ok()
    }

    async fn search(&self, query: &str, _options: &SearchOptions) -> ProviderOutcome {
        let result = match canonicalize_domain(query, None) {
            Ok(domain) => self.check(vec![domain]).await,
            Err(e) => Err(e),
        };
        ProviderOutcome::from_result(PROVIDER, result)
    }

    async fn bulk_search(&self, domains: &[String], _options: &SearchOptions) -> ProviderOutcome {
        let result = match canonicalize_all(domains, None) {
            Ok(domains) => self.check(domains).await,
            Err(e) => Err(e),
        };
        ProviderOutcome::from_result(PROVIDER, result)
    }
}

fn parse_prepare(body: &str) -> Result<Vec<PrepareEntry>, ScoutError> {
    let response: PrepareResponse = serde_json::from_str(body).map_err(|e| {
        ScoutError::parse(PROVIDER, format!("Unexpected prepare response: {}", e))
    })?;

    if let Some(message) = response.error.filter(|m| !m.trim().is_empty()) {
        return Err(ScoutError::upstream(PROVIDER, message));
    }

    Ok(response.domains)
}

/// Replace `&#NN;` and `&#xNN;` entities with the characters they encode.
fn decode_numeric_entities(raw: &str) -> String {
    NUMERIC_ENTITY
        .replace_all(raw, |caps: &Captures| {
            let code = &caps[1];
            let value = match code.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => code.parse::<u32>().ok(),
            };
            value
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Parse a display price such as `US&#36;1&#44;299&#46;00` into `1299.0`.
fn parse_price(raw: &str) -> Option<f64> {
    let decoded = decode_numeric_entities(raw);
    let cleaned: String = decoded
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let cleaned = cleaned.trim_matches('.');

    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|value| *value >= 0.0)
}
