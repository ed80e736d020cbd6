//! Marketplace driver: HTML session acquisition plus asynchronous status polling.
//!
//! Upstream contract (best effort, owned by the marketplace):
//!
//! - `GET {base}/domains/search?domain=<q>` returns an HTML page embedding a
//!   `searchId` and a `requestId`, and sets an `XSRF-TOKEN` cookie.
//! - `GET {base}/domains/bulk` returns a form with a hidden
//!   `__RequestVerificationToken` field; `POST {base}/domains/bulk` with the
//!   newline-joined list starts a batch job and returns a page embedding the
//!   same two identifiers.
//! - `POST {base}/api/domains/search/status` with both identifiers, the token
//!   header and the cookies returns
//!   `{"results": [{"domain", "result": AVAILABLE|UNAVAILABLE|PENDING, ...}]}`.
//!   Prices are integer cents.
//!
//! The upstream computes results in the background; items that are not ready
//! carry `PENDING` and the whole batch has to be polled again.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;
use std::sync::Arc;

use crate::concurrent::BackoffPolicy;
use crate::config::MarketplaceSettings;
use crate::error::ScoutError;
use crate::http::{fetch, HttpRequest, HttpTransport};
use crate::providers::Driver;
use crate::session::{CookieSet, Session};
use crate::types::{DomainResult, Price, ProviderId, ProviderOutcome, SearchOptions};
use crate::utils::{canonicalize_all, canonicalize_domain};

const PROVIDER: ProviderId = ProviderId::Marketplace;

const SEARCH_PATH: &str = "/domains/search";
const BULK_PATH: &str = "/domains/bulk";
const STATUS_PATH: &str = "/api/domains/search/status";

/// Cookie carrying the anti-forgery token on the single-search flow.
const ANTIFORGERY_COOKIE: &str = "XSRF-TOKEN";
/// Header the token is echoed back in.
const ANTIFORGERY_HEADER: &str = "X-XSRF-TOKEN";
/// Hidden form field carrying the token on the bulk flow.
const ANTIFORGERY_FIELD: &str = "__RequestVerificationToken";

/// Identifiers embedded in search pages, as (name, pattern) pairs.
const IDENTIFIER_PATTERNS: &[(&str, &str)] = &[
    (
        "searchId",
        r#"["']?searchId["']?\s*[:=]\s*["']([A-Za-z0-9_\-]+)["']"#,
    ),
    (
        "requestId",
        r#"["']?requestId["']?\s*[:=]\s*["']([A-Za-z0-9_\-]+)["']"#,
    ),
];

lazy_static! {
    static ref IDENTIFIER_REGEXES: Vec<(&'static str, Regex)> = IDENTIFIER_PATTERNS
        .iter()
        .map(|(name, pattern)| (*name, Regex::new(pattern).expect("identifier pattern is valid")))
        .collect();
    static ref ANTIFORGERY_SELECTOR: Selector =
        Selector::parse(&format!("input[name=\"{}\"]", ANTIFORGERY_FIELD))
            .expect("anti-forgery selector is valid");
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    results: Vec<StatusItem>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
enum ItemState {
    Available,
    Unavailable,
    Pending,
}

#[derive(Debug, Clone, Deserialize)]
struct StatusItem {
    domain: String,
    result: ItemState,
    /// Premium indicator; positive means premium
    #[serde(default)]
    premium: Option<f64>,
    /// Flat price in cents
    #[serde(default)]
    price: Option<i64>,
    /// Per-type prices in cents
    #[serde(default)]
    prices: Option<TypedPrices>,
    #[serde(default)]
    currency: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TypedPrices {
    #[serde(default)]
    registration: Option<i64>,
    #[serde(default)]
    renewal: Option<i64>,
}

/// Driver for the marketplace upstream.
pub struct MarketplaceDriver {
    transport: Arc<dyn HttpTransport>,
    settings: MarketplaceSettings,
    backoff: BackoffPolicy,
}

impl MarketplaceDriver {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        settings: MarketplaceSettings,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            transport,
            settings,
            backoff,
        }
    }

    fn base_url(&self) -> Result<&str, ScoutError> {
        self.settings
            .base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .ok_or_else(|| ScoutError::config("marketplace base_url is not configured"))
    }

    async fn search_domain(&self, query: &str) -> Result<Vec<DomainResult>, ScoutError> {
        let domain = canonicalize_domain(query, None)?;
        let session = self.acquire_search_session(&domain).await?;
        tracing::debug!(provider = %PROVIDER, domain = %domain, "session acquired");
        self.poll(&session).await
    }

    async fn search_bulk(&self, domains: &[String]) -> Result<Vec<DomainResult>, ScoutError> {
        let domains = canonicalize_all(domains, None)?;
        let session = self.acquire_bulk_session(&domains).await?;
        tracing::debug!(provider = %PROVIDER, count = domains.len(), "bulk job submitted");
        self.poll(&session).await
    }

    /// Single flow: identifiers from the page body, token from the cookie.
    async fn acquire_search_session(&self, domain: &str) -> Result<Session, ScoutError> {
        let url = format!("{}{}", self.base_url()?, SEARCH_PATH);
        let response = fetch(
            self.transport.as_ref(),
            HttpRequest::get(PROVIDER, url).query("domain", domain),
        )
        .await?;

        let cookies = CookieSet::from_set_cookie_headers(&response.set_cookies);
        let identifiers = extract_identifiers(&response.body)?;
        let token = cookies
            .get(ANTIFORGERY_COOKIE)
            .map(String::from)
            .ok_or_else(|| {
                ScoutError::session(PROVIDER, format!("{} cookie", ANTIFORGERY_COOKIE))
            })?;

        Ok(Session::new(identifiers, token, cookies))
    }

    /// Bulk flow: token from the form's hidden field, identifiers from the
    /// job submission response, cookies of both steps merged.
    async fn acquire_bulk_session(&self, domains: &[String]) -> Result<Session, ScoutError> {
        let url = format!("{}{}", self.base_url()?, BULK_PATH);

        let form_page = fetch(self.transport.as_ref(), HttpRequest::get(PROVIDER, url.clone())).await?;
        let form_cookies = CookieSet::from_set_cookie_headers(&form_page.set_cookies);
        let token = extract_form_token(&form_page.body).ok_or_else(|| {
            ScoutError::session(PROVIDER, format!("{} form field", ANTIFORGERY_FIELD))
        })?;

        let submitted = fetch(
            self.transport.as_ref(),
            HttpRequest::post(PROVIDER, url)
                .cookies(form_cookies.header_value())
                .form(vec![
                    ("domains".to_string(), domains.join("\n")),
                    (ANTIFORGERY_FIELD.to_string(), token.clone()),
                ]),
        )
        .await?;

        let cookies =
            form_cookies.merged(&CookieSet::from_set_cookie_headers(&submitted.set_cookies));
        let identifiers = extract_identifiers(&submitted.body)?;

        Ok(Session::new(identifiers, token, cookies))
    }

    fn status_request(&self, base_url: &str, session: &Session) -> HttpRequest {
        let body: serde_json::Map<String, serde_json::Value> = session
            .identifiers()
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();

        HttpRequest::post(PROVIDER, format!("{}{}", base_url, STATUS_PATH))
            .header(ANTIFORGERY_HEADER, session.token())
            .header("X-Requested-With", "XMLHttpRequest")
            .cookies(session.cookies().header_value())
            .json(serde_json::Value::Object(body))
    }

    /// Poll the status endpoint according to the backoff schedule.
    ///
    /// Unretrievable or empty responses and batches with pending items are
    /// retried while attempts remain. Exhausting every attempt without a
    /// single item yields an empty, successful result.
    async fn poll(&self, session: &Session) -> Result<Vec<DomainResult>, ScoutError> {
        let base_url = self.base_url()?;
        let attempts = self.backoff.max_attempts();
        let mut items: Vec<StatusItem> = Vec::new();

        for (attempt, delay) in self.backoff.delays().iter().enumerate() {
            tokio::time::sleep(*delay).await;
            let is_last = attempt + 1 == attempts;

            let response = match self.transport.send(self.status_request(base_url, session)).await {
                Ok(response) if response.is_success() => response,
                Ok(response) => {
                    tracing::warn!(provider = %PROVIDER, attempt, status = response.status, "status check failed");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(provider = %PROVIDER, attempt, error = %e, "status check failed");
                    continue;
                }
            };

            let parsed = parse_status(&response.body)?;
            if parsed.is_empty() {
                tracing::debug!(provider = %PROVIDER, attempt, "no items yet");
                continue;
            }

            let pending = parsed
                .iter()
                .filter(|item| item.result == ItemState::Pending)
                .count();
            items = parsed;

            if pending > 0 && !is_last {
                tracing::debug!(provider = %PROVIDER, attempt, pending, "items still pending");
                continue;
            }
            break;
        }

        if items.is_empty() {
            tracing::debug!(provider = %PROVIDER, attempts, "polling exhausted without results");
        }

        Ok(items
            .into_iter()
            .map(|item| self.to_result(item))
            .collect())
    }

    fn to_result(&self, item: StatusItem) -> DomainResult {
        let domain = item.domain.trim().to_lowercase();

        // Anything still pending after the last attempt is reported as taken
        if item.result == ItemState::Pending {
            return DomainResult::new(domain, false, PROVIDER);
        }

        let currency = item
            .currency
            .clone()
            .unwrap_or_else(|| self.settings.currency.clone());

        DomainResult::new(domain, item.result == ItemState::Available, PROVIDER)
            .with_premium(item.premium.map_or(false, |p| p > 0.0))
            .with_price(derive_price(&item, currency))
    }
}

#[async_trait]
impl Driver for MarketplaceDriver {
    fn id(&self) -> ProviderId {
        PROVIDER
    }

    fn canonicalize(&self, query: &str) -> Option<String> {
        canonicalize_domain(query, None).ok()
    }

    async fn search(&self, query: &str, _options: &SearchOptions) -> ProviderOutcome {
        ProviderOutcome::from_result(PROVIDER, self.search_domain(query).await)
    }

    async fn bulk_search(&self, domains: &[String], _options: &SearchOptions) -> ProviderOutcome {
        ProviderOutcome::from_result(PROVIDER, self.search_bulk(domains).await)
    }
}

/// Pull every identifier named in [`IDENTIFIER_PATTERNS`] out of a page body.
fn extract_identifiers(body: &str) -> Result<Vec<(String, String)>, ScoutError> {
    IDENTIFIER_REGEXES
        .iter()
        .map(|(name, regex)| {
            regex
                .captures(body)
                .and_then(|caps| caps.get(1))
                .map(|m| (name.to_string(), m.as_str().to_string()))
                .ok_or_else(|| ScoutError::session(PROVIDER, format!("{} identifier", name)))
        })
        .collect()
}

fn extract_form_token(body: &str) -> Option<String> {
    let document = Html::parse_document(body);
    document
        .select(&ANTIFORGERY_SELECTOR)
        .filter_map(|input| input.value().attr("value"))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(String::from)
}

fn parse_status(body: &str) -> Result<Vec<StatusItem>, ScoutError> {
    let response: StatusResponse = serde_json::from_str(body).map_err(|e| {
        ScoutError::parse(PROVIDER, format!("Unexpected status response: {}", e))
    })?;

    if let Some(message) = response.error.filter(|m| !m.trim().is_empty()) {
        return Err(ScoutError::upstream(PROVIDER, message));
    }

    Ok(response.results)
}

/// Registration from the per-type field, falling back to the flat price;
/// renewal from the per-type field, falling back to registration.
fn derive_price(item: &StatusItem, currency: String) -> Option<Price> {
    let typed = item.prices.clone().unwrap_or_default();
    let registration = typed.registration.or(item.price)?;
    Some(Price::from_cents(registration, typed.renewal, currency))
}
