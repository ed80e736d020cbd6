//! Core data types shared by every provider driver.
//!
//! This module defines the uniform result shape that heterogeneous upstream
//! responses are reconciled into: prices, WHOIS records, per-domain results
//! and per-provider outcomes. These types carry no logic beyond small
//! constructors that keep their invariants intact.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ScoutError;

/// Registration and renewal pricing for a domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Price {
    /// First-year registration price, in whole currency units
    pub registration: f64,

    /// Renewal price; equal to `registration` when the upstream reports none
    pub renewal: f64,

    /// ISO currency code as reported (or assumed) for the upstream
    pub currency: String,
}

impl Price {
    /// Build a price, falling back to the registration value for renewal.
    ///
    /// Negative inputs are clamped to zero.
    pub fn new<C: Into<String>>(registration: f64, renewal: Option<f64>, currency: C) -> Self {
        let registration = registration.max(0.0);
        Self {
            registration,
            renewal: renewal.map(|r| r.max(0.0)).unwrap_or(registration),
            currency: currency.into(),
        }
    }

    /// Build a price from upstream cent-integers.
    pub fn from_cents<C: Into<String>>(registration: i64, renewal: Option<i64>, currency: C) -> Self {
        Self::new(
            registration as f64 / 100.0,
            renewal.map(|r| r as f64 / 100.0),
            currency,
        )
    }
}

/// Registration details scraped for a taken domain.
///
/// All fields are free-form strings exactly as the upstream reported them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhoisRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registrant: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub registrar: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,

    /// One entry per nameserver row, in page order
    pub nameservers: Vec<String>,
}

impl WhoisRecord {
    /// True when no field was extracted at all.
    pub fn is_empty(&self) -> bool {
        self.registrant.is_none()
            && self.organization.is_none()
            && self.registrar.is_none()
            && self.creation_date.is_none()
            && self.last_modified.is_none()
            && self.expiration_date.is_none()
            && self.website.is_none()
            && self.nameservers.is_empty()
    }
}

/// Registry lifecycle status of a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DomainStatus {
    #[default]
    Normal,
    PendingDeletion,
}

/// Identifier of an upstream provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderId {
    /// Marketplace: HTML session token plus asynchronous status polling
    #[serde(rename = "marketplace")]
    Marketplace,

    /// Reseller: prepare call plus chunked secondary checks
    #[serde(rename = "reseller")]
    Reseller,

    /// NIC Chile: WHOIS page scraping
    #[serde(rename = "nic-cl")]
    NicChile,
}

impl ProviderId {
    /// Every known provider, in canonical order.
    pub fn all() -> Vec<ProviderId> {
        vec![
            ProviderId::Marketplace,
            ProviderId::Reseller,
            ProviderId::NicChile,
        ]
    }

    /// Stable wire name of the provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Marketplace => "marketplace",
            ProviderId::Reseller => "reseller",
            ProviderId::NicChile => "nic-cl",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ScoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "marketplace" | "a" => Ok(ProviderId::Marketplace),
            "reseller" | "b" => Ok(ProviderId::Reseller),
            "nic-cl" | "nic.cl" | "nic" | "c" => Ok(ProviderId::NicChile),
            other => Err(ScoutError::config(format!("Unknown provider '{}'", other))),
        }
    }
}

/// Availability and pricing of a single domain as seen by one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainResult {
    /// Fully-qualified, lower-cased domain name
    pub domain: String,

    /// Whether the domain can be registered
    pub available: bool,

    /// Whether the upstream flagged the name as premium
    pub premium: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,

    pub status: DomainStatus,

    /// Only present for taken domains, and only when the caller asked for it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whois: Option<WhoisRecord>,

    pub source_provider: ProviderId,
}

impl DomainResult {
    /// A plain result with no pricing, WHOIS or premium flag.
    pub fn new<D: Into<String>>(domain: D, available: bool, source_provider: ProviderId) -> Self {
        Self {
            domain: domain.into(),
            available,
            premium: false,
            price: None,
            status: DomainStatus::Normal,
            whois: None,
            source_provider,
        }
    }

    pub fn with_price(mut self, price: Option<Price>) -> Self {
        self.price = price;
        self
    }

    pub fn with_premium(mut self, premium: bool) -> Self {
        self.premium = premium;
        self
    }
}

/// Per-provider result of one query: either domains or an error, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderOutcome {
    pub provider_id: ProviderId,

    pub domains: Vec<DomainResult>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProviderOutcome {
    /// Successful outcome (possibly with zero domains).
    pub fn success(provider_id: ProviderId, domains: Vec<DomainResult>) -> Self {
        Self {
            provider_id,
            domains,
            error: None,
        }
    }

    /// Failed outcome; any partial progress is discarded.
    pub fn failure(provider_id: ProviderId, error: &ScoutError) -> Self {
        Self {
            provider_id,
            domains: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    /// Collapse a driver's internal result into an outcome.
    pub fn from_result(provider_id: ProviderId, result: crate::Result<Vec<DomainResult>>) -> Self {
        match result {
            Ok(domains) => Self::success(provider_id, domains),
            Err(e) => Self::failure(provider_id, &e),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Caller-selected options for a search or bulk search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    /// Scrape WHOIS details for taken domains where the provider supports it
    pub include_whois: bool,

    /// Keep only the result matching the query exactly (single search only)
    pub exact_only: bool,
}

impl SearchOptions {
    pub fn with_whois(mut self, enabled: bool) -> Self {
        self.include_whois = enabled;
        self
    }

    pub fn with_exact(mut self, enabled: bool) -> Self {
        self.exact_only = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_from_cents_defaults_renewal() {
        let price = Price::from_cents(1999, None, "USD");
        assert_eq!(price.registration, 19.99);
        assert_eq!(price.renewal, 19.99);
        assert_eq!(price.currency, "USD");
    }

    #[test]
    fn test_price_clamps_negative() {
        let price = Price::new(-5.0, Some(-1.0), "USD");
        assert_eq!(price.registration, 0.0);
        assert_eq!(price.renewal, 0.0);
    }

    #[test]
    fn test_provider_id_parsing() {
        assert_eq!("marketplace".parse::<ProviderId>().unwrap(), ProviderId::Marketplace);
        assert_eq!("B".parse::<ProviderId>().unwrap(), ProviderId::Reseller);
        assert_eq!(" nic-cl ".parse::<ProviderId>().unwrap(), ProviderId::NicChile);
        assert!("godaddy".parse::<ProviderId>().is_err());
    }

    #[test]
    fn test_failure_outcome_has_no_domains() {
        let err = ScoutError::parse(ProviderId::Reseller, "bad body");
        let outcome = ProviderOutcome::failure(ProviderId::Reseller, &err);
        assert!(outcome.domains.is_empty());
        assert!(outcome.error.unwrap().contains("bad body"));
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let result = DomainResult::new("example.cl", true, ProviderId::NicChile);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["sourceProvider"], "nic-cl");
        assert_eq!(json["status"], "normal");
        assert!(json.get("whois").is_none());
    }
}
