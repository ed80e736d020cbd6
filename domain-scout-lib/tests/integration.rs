// domain-scout-lib/tests/integration.rs

//! Integration tests for domain-scout-lib exports and aggregation behavior

use async_trait::async_trait;
use domain_scout_lib::{
    Aggregator, DomainResult, Driver, HttpRequest, HttpResponse, HttpTransport, ProviderId,
    ProviderOutcome, ScoutConfig, ScoutError, SearchOptions,
};
use std::sync::Arc;
use std::time::Duration;

/// Driver returning a fixed set of names for any query, like an upstream
/// that adds its own suggestions.
struct SuggestingDriver {
    id: ProviderId,
    names: Vec<&'static str>,
    fail: bool,
}

impl SuggestingDriver {
    fn new(id: ProviderId, names: Vec<&'static str>) -> Arc<dyn Driver> {
        Arc::new(Self {
            id,
            names,
            fail: false,
        })
    }

    fn failing(id: ProviderId) -> Arc<dyn Driver> {
        Arc::new(Self {
            id,
            names: Vec::new(),
            fail: true,
        })
    }

    fn outcome(&self) -> ProviderOutcome {
        if self.fail {
            return ProviderOutcome::failure(
                self.id,
                &ScoutError::transport(self.id, "connection refused"),
            );
        }
        let results = self
            .names
            .iter()
            .map(|name| DomainResult::new(*name, true, self.id))
            .collect();
        ProviderOutcome::success(self.id, results)
    }
}

#[async_trait]
impl Driver for SuggestingDriver {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn canonicalize(&self, query: &str) -> Option<String> {
        domain_scout_lib::canonicalize_domain(query, None).ok()
    }

    async fn search(&self, _query: &str, _options: &SearchOptions) -> ProviderOutcome {
        self.outcome()
    }

    async fn bulk_search(&self, _domains: &[String], _options: &SearchOptions) -> ProviderOutcome {
        self.outcome()
    }
}

/// Transport serving fixed NIC Chile pages keyed by the `d` query parameter.
struct NicPages;

#[async_trait]
impl HttpTransport for NicPages {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ScoutError> {
        match request.query_value("d") {
            Some("libre.cl") => Ok(HttpResponse::new(200, "<p>domain does not exist</p>")),
            Some("caido.cl") => Err(ScoutError::transport(request.provider, "reset")),
            Some(_) => Ok(HttpResponse::new(200, "<p>Titular: Alguien</p>")),
            None => Ok(HttpResponse::new(400, "missing query")),
        }
    }
}

fn names(outcome: &ProviderOutcome) -> Vec<&str> {
    outcome.domains.iter().map(|d| d.domain.as_str()).collect()
}

#[tokio::test]
async fn test_outcomes_match_requested_order() {
    let aggregator = Aggregator::with_drivers(
        ScoutConfig::default(),
        vec![
            SuggestingDriver::new(ProviderId::Marketplace, vec!["a.com"]),
            SuggestingDriver::new(ProviderId::Reseller, vec!["a.com"]),
            SuggestingDriver::new(ProviderId::NicChile, vec!["a.cl"]),
        ],
    );
    let requested = [ProviderId::NicChile, ProviderId::Marketplace];

    let outcomes = aggregator
        .query("a.com", &requested, &SearchOptions::default())
        .await;

    assert_eq!(outcomes.len(), requested.len());
    let ids: Vec<_> = outcomes.iter().map(|o| o.provider_id).collect();
    assert_eq!(ids, requested);
}

#[tokio::test]
async fn test_failed_provider_has_error_and_no_domains() {
    let aggregator = Aggregator::with_drivers(
        ScoutConfig::default(),
        vec![
            SuggestingDriver::failing(ProviderId::Marketplace),
            SuggestingDriver::new(ProviderId::Reseller, vec!["a.com"]),
        ],
    );

    let outcomes = aggregator
        .query(
            "a.com",
            &[ProviderId::Marketplace, ProviderId::Reseller],
            &SearchOptions::default(),
        )
        .await;

    assert!(outcomes[0].domains.is_empty());
    assert!(outcomes[0].error.as_ref().unwrap().contains("connection refused"));
    assert!(outcomes[1].error.is_none());
    assert_eq!(names(&outcomes[1]), vec!["a.com"]);
}

#[tokio::test]
async fn test_exact_filter_is_case_insensitive() {
    let aggregator = Aggregator::with_drivers(
        ScoutConfig::default(),
        vec![SuggestingDriver::new(
            ProviderId::Reseller,
            vec!["example.ai", "sub.example.ai", "example.io"],
        )],
    );

    let exact = aggregator
        .query(
            "Example.AI",
            &[ProviderId::Reseller],
            &SearchOptions::default().with_exact(true),
        )
        .await;
    assert_eq!(names(&exact[0]), vec!["example.ai"]);

    let loose = aggregator
        .query("Example.AI", &[ProviderId::Reseller], &SearchOptions::default())
        .await;
    assert_eq!(loose[0].domains.len(), 3);
}

#[tokio::test]
async fn test_bulk_keeps_only_requested_domains() {
    let aggregator = Aggregator::with_drivers(
        ScoutConfig::default(),
        vec![SuggestingDriver::new(
            ProviderId::Marketplace,
            vec!["alpha.com", "alpha.net", "beta.com", "suggested.com"],
        )],
    );
    let targets = vec!["ALPHA.com".to_string(), "beta.com".to_string()];

    let outcomes = aggregator
        .bulk_query(&targets, &[ProviderId::Marketplace], &SearchOptions::default())
        .await;

    assert_eq!(names(&outcomes[0]), vec!["alpha.com", "beta.com"]);
}

#[tokio::test]
async fn test_real_drivers_over_custom_transport() {
    let config = ScoutConfig::default().with_throttle_delay(Duration::ZERO);
    let aggregator = Aggregator::with_transport(config, Arc::new(NicPages)).unwrap();
    let targets = vec![
        "libre".to_string(),
        "caido".to_string(),
        "tomado.cl".to_string(),
    ];

    let outcomes = aggregator
        .bulk_query(
            &targets,
            &[ProviderId::NicChile, ProviderId::Marketplace],
            &SearchOptions::default(),
        )
        .await;

    let nic = &outcomes[0];
    assert!(nic.is_success());
    assert_eq!(names(nic), vec!["libre.cl", "caido.cl", "tomado.cl"]);
    let available: Vec<bool> = nic.domains.iter().map(|d| d.available).collect();
    assert_eq!(available, vec![true, false, false]);

    // no base URL configured for the marketplace
    let marketplace = &outcomes[1];
    assert!(marketplace.domains.is_empty());
    assert!(marketplace.error.as_ref().unwrap().contains("base_url"));
}

#[test]
fn test_outcome_serializes_camel_case() {
    let outcome = ProviderOutcome::success(
        ProviderId::NicChile,
        vec![DomainResult::new("ejemplo.cl", false, ProviderId::NicChile)],
    );
    let json = serde_json::to_value(&outcome).unwrap();

    assert_eq!(json["providerId"], "nic-cl");
    assert_eq!(json["domains"][0]["sourceProvider"], "nic-cl");
    assert_eq!(json["domains"][0]["status"], "normal");
    assert!(json.get("error").is_none());
}
