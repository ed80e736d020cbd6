//! NIC Chile driver: scrapes the public WHOIS page of the `.cl` registry.
//!
//! `GET {base}/registry/Whois.do?d=<domain>` returns an HTML page. Marker
//! phrases in the body tell whether the name is free or about to be deleted;
//! for taken names a results table carries the registration details. The
//! registry has no bulk endpoint, so bulk lookups run one at a time with a
//! fixed delay in between.

use async_trait::async_trait;
use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use std::time::Duration;

use crate::concurrent::throttled_sequential;
use crate::config::NicChileSettings;
use crate::error::ScoutError;
use crate::http::{fetch, HttpRequest, HttpTransport};
use crate::providers::Driver;
use crate::types::{
    DomainResult, DomainStatus, Price, ProviderId, ProviderOutcome, SearchOptions, WhoisRecord,
};
use crate::utils::{canonicalize_all, canonicalize_domain};

const PROVIDER: ProviderId = ProviderId::NicChile;

const WHOIS_PATH: &str = "/registry/Whois.do";
const REGISTRY_SUFFIX: &str = "cl";

/// Result sentences meaning the name is not registered. Matched case-insensitively.
const AVAILABLE_MARKERS: &[&str] = &[
    "domain does not exist",
    "el dominio consultado no existe",
    "el dominio no existe",
];

/// Body phrases meaning the name is in its deletion grace period.
const PENDING_DELETION_MARKERS: &[&str] = &[
    "pending deletion",
    "en proceso de eliminación",
    "eliminación pendiente",
];

/// Label cell of the row that carries the website link.
const WEBSITE_MARKER: &str = "sitio web";

/// Results-table labels and the WHOIS field each one fills.
const WHOIS_LABELS: &[(&str, WhoisField)] = &[
    ("titular", WhoisField::Registrant),
    ("organización", WhoisField::Organization),
    ("agente registrador", WhoisField::Registrar),
    ("fecha de creación", WhoisField::CreationDate),
    ("fecha de última modificación", WhoisField::LastModified),
    ("fecha de expiración", WhoisField::ExpirationDate),
    ("servidor de nombre", WhoisField::Nameserver),
    ("servidores de nombre", WhoisField::Nameserver),
];

lazy_static! {
    static ref RESULT_ROWS: Selector =
        Selector::parse("table.tablabusqueda tr").expect("row selector is valid");
    static ref CELL: Selector = Selector::parse("td").expect("cell selector is valid");
    static ref LINK: Selector = Selector::parse("a").expect("link selector is valid");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WhoisField {
    Registrant,
    Organization,
    Registrar,
    CreationDate,
    LastModified,
    ExpirationDate,
    Nameserver,
}

/// Driver for the NIC Chile WHOIS page.
pub struct NicChileDriver {
    transport: Arc<dyn HttpTransport>,
    settings: NicChileSettings,
    throttle_delay: Duration,
}

impl NicChileDriver {
    pub fn new(transport: Arc<dyn HttpTransport>, settings: NicChileSettings, throttle_delay: Duration) -> Self {
        Self {
            transport,
            settings,
            throttle_delay,
        }
    }

    fn price(&self) -> Price {
        Price::new(
            self.settings.registration_price,
            Some(self.settings.renewal_price),
            self.settings.currency.clone(),
        )
    }

    async fn lookup(&self, domain: &str, include_whois: bool) -> Result<DomainResult, ScoutError> {
        let url = format!("{}{}", self.settings.base_url.trim_end_matches('/'), WHOIS_PATH);
        let response = fetch(
            self.transport.as_ref(),
            HttpRequest::get(PROVIDER, url).query("d", domain),
        )
        .await?;

        Ok(self.interpret(domain, &response.body, include_whois))
    }

    /// A failed lookup inside a bulk run becomes a conservative "taken" record.
    async fn lookup_or_fallback(&self, domain: String, include_whois: bool) -> DomainResult {
        match self.lookup(&domain, include_whois).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(provider = %PROVIDER, domain = %domain, error = %e, "lookup failed");
                DomainResult::new(domain, false, PROVIDER)
            }
        }
    }

    fn interpret(&self, domain: &str, body: &str, include_whois: bool) -> DomainResult {
        let available = contains_marker(body, AVAILABLE_MARKERS);
        let pending_deletion = !available && contains_marker(body, PENDING_DELETION_MARKERS);

        let mut result = DomainResult::new(domain, available, PROVIDER).with_price(Some(self.price()));
        if pending_deletion {
            result.status = DomainStatus::PendingDeletion;
        }

        if include_whois && !available && !pending_deletion {
            let record = extract_whois(body);
            if !record.is_empty() {
                result.whois = Some(record);
            }
        }

        result
    }
}

#[async_trait]
impl Driver for NicChileDriver {
    fn id(&self) -> ProviderId {
        PROVIDER
    }

    fn canonicalize(&self, query: &str) -> Option<String> {
        canonicalize_domain(query, Some(REGISTRY_SUFFIX)).ok()
    }

    async fn search(&self, query: &str, options: &SearchOptions) -> ProviderOutcome {
        let result = match canonicalize_domain(query, Some(REGISTRY_SUFFIX)) {
            Ok(domain) => self
                .lookup(&domain, options.include_whois)
                .await
                .map(|result| vec![result]),
            Err(e) => Err(e),
        };
        ProviderOutcome::from_result(PROVIDER, result)
    }

    async fn bulk_search(&self, domains: &[String], options: &SearchOptions) -> ProviderOutcome {
        let domains = match canonicalize_all(domains, Some(REGISTRY_SUFFIX)) {
            Ok(domains) => domains,
            Err(e) => return ProviderOutcome::failure(PROVIDER, &e),
        };

        let include_whois = options.include_whois;
        let results = throttled_sequential(&domains, self.throttle_delay, move |domain| async move {
            self.lookup_or_fallback(domain, include_whois).await
        })
        .await;

        ProviderOutcome::success(PROVIDER, results)
    }

    fn bulk_pacing(&self, count: usize) -> Option<Duration> {
        let gaps = u32::try_from(count.saturating_sub(1)).unwrap_or(u32::MAX);
        Some(self.throttle_delay.saturating_mul(gaps))
    }
}

fn contains_marker(body: &str, markers: &[&str]) -> bool {
    let body = body.to_lowercase();
    markers.iter().any(|marker| body.contains(marker))
}

fn cell_text(cell: &ElementRef) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn label_field(label: &str) -> Option<WhoisField> {
    let label = label.trim().trim_end_matches(':').trim().to_lowercase();
    WHOIS_LABELS
        .iter()
        .find(|(name, _)| *name == label)
        .map(|(_, field)| *field)
}

/// Walk the results table and fill a record from the rows it recognises.
fn extract_whois(body: &str) -> WhoisRecord {
    let document = Html::parse_document(body);
    let mut record = WhoisRecord::default();

    for row in document.select(&RESULT_ROWS) {
        let cells: Vec<ElementRef> = row.select(&CELL).collect();
        let Some(label_cell) = cells.first() else {
            continue;
        };
        let label = cell_text(label_cell);

        if label.to_lowercase().contains(WEBSITE_MARKER) {
            record.website = row
                .select(&LINK)
                .map(|link| cell_text(&link))
                .find(|text| !text.is_empty());
            continue;
        }

        let (Some(field), Some(value_cell)) = (label_field(&label), cells.get(1)) else {
            continue;
        };
        let value = cell_text(value_cell);
        if value.is_empty() {
            continue;
        }

        match field {
            WhoisField::Registrant => record.registrant = Some(value),
            WhoisField::Organization => record.organization = Some(value),
            WhoisField::Registrar => record.registrar = Some(value),
            WhoisField::CreationDate => record.creation_date = Some(value),
            WhoisField::LastModified => record.last_modified = Some(value),
            WhoisField::ExpirationDate => record.expiration_date = Some(value),
            WhoisField::Nameserver => record.nameservers.push(value),
        }
    }

    record
}
