//! Fan-out over provider drivers.
//!
//! The `Aggregator` starts one query per requested provider, waits for all of
//! them under a per-provider budget, filters the results against what was
//! asked, and hands back one outcome per provider in request order.

use futures::future::join_all;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ScoutConfig;
use crate::error::ScoutError;
use crate::http::{HttpTransport, ReqwestTransport};
use crate::providers::{create_driver, enabled_providers, Driver};
use crate::types::{ProviderId, ProviderOutcome, SearchOptions};

/// Queries several providers at once and merges their outcomes.
///
/// # Example
///
/// ```rust,no_run
/// use domain_scout_lib::{Aggregator, ProviderId, SearchOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let aggregator = Aggregator::new()?;
///     let outcomes = aggregator
///         .query("ejemplo.cl", &[ProviderId::NicChile], &SearchOptions::default())
///         .await;
///     for outcome in outcomes {
///         println!("{}: {} result(s)", outcome.provider_id, outcome.domains.len());
///     }
///     Ok(())
/// }
/// ```
pub struct Aggregator {
    config: ScoutConfig,
    drivers: Vec<Arc<dyn Driver>>,
}

impl Aggregator {
    /// Create an aggregator with default configuration and every enabled driver.
    pub fn new() -> Result<Self, ScoutError> {
        Self::with_config(ScoutConfig::default())
    }

    /// Create an aggregator backed by a real HTTP client.
    pub fn with_config(config: ScoutConfig) -> Result<Self, ScoutError> {
        let transport = Arc::new(ReqwestTransport::new(config.request_timeout)?);
        Self::with_transport(config, transport)
    }

    /// Create an aggregator whose drivers share `transport`.
    pub fn with_transport(
        config: ScoutConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, ScoutError> {
        let drivers = enabled_providers()
            .into_iter()
            .map(|id| create_driver(id, &config, transport.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::with_drivers(config, drivers))
    }

    /// Create an aggregator over an explicit set of drivers.
    pub fn with_drivers(config: ScoutConfig, drivers: Vec<Arc<dyn Driver>>) -> Self {
        Self { config, drivers }
    }

    pub fn config(&self) -> &ScoutConfig {
        &self.config
    }

    /// Providers this aggregator can answer for.
    pub fn providers(&self) -> Vec<ProviderId> {
        self.drivers.iter().map(|driver| driver.id()).collect()
    }

    fn driver(&self, id: ProviderId) -> Option<&Arc<dyn Driver>> {
        self.drivers.iter().find(|driver| driver.id() == id)
    }

    /// Single-query search on each provider in `providers`.
    ///
    /// Returns exactly one outcome per requested provider, in the same order.
    /// With `exact_only`, each provider keeps only the result equal to the
    /// query as that provider canonicalizes it.
    pub async fn query(
        &self,
        target: &str,
        providers: &[ProviderId],
        options: &SearchOptions,
    ) -> Vec<ProviderOutcome> {
        let tasks = providers.iter().map(|&id| async move {
            let Some(driver) = self.driver(id) else {
                return missing_driver(id);
            };

            let budget = self.config.query_budget;
            let mut outcome = self.budgeted(id, budget, driver.search(target, options)).await;
            if options.exact_only {
                let wanted = driver.canonicalize(target);
                outcome.domains.retain(|result| {
                    wanted
                        .as_deref()
                        .map_or(false, |wanted| result.domain.eq_ignore_ascii_case(wanted))
                });
            }
            outcome
        });

        join_all(tasks).await
    }

    /// Bulk search on each provider in `providers`.
    ///
    /// Results for names outside the requested set (suggestions some
    /// upstreams add on their own) are dropped.
    pub async fn bulk_query(
        &self,
        targets: &[String],
        providers: &[ProviderId],
        options: &SearchOptions,
    ) -> Vec<ProviderOutcome> {
        let tasks = providers.iter().map(|&id| async move {
            let Some(driver) = self.driver(id) else {
                return missing_driver(id);
            };

            let budget = self.bulk_budget(driver.as_ref(), targets.len());
            let mut outcome = self
                .budgeted(id, budget, driver.bulk_search(targets, options))
                .await;
            let requested: HashSet<String> = targets
                .iter()
                .filter_map(|target| driver.canonicalize(target))
                .map(|domain| domain.to_lowercase())
                .collect();
            outcome
                .domains
                .retain(|result| requested.contains(&result.domain.to_lowercase()));
            outcome
        });

        join_all(tasks).await
    }

    /// [`query`](Self::query) over the configured default providers.
    pub async fn search(&self, target: &str, options: &SearchOptions) -> Vec<ProviderOutcome> {
        self.query(target, &self.config.providers, options).await
    }

    /// [`bulk_query`](Self::bulk_query) over the configured default providers.
    pub async fn bulk_search(&self, targets: &[String], options: &SearchOptions) -> Vec<ProviderOutcome> {
        self.bulk_query(targets, &self.config.providers, options).await
    }

    /// Budget for a bulk run of `count` domains on `driver`.
    ///
    /// A paced driver gets its pauses plus one request timeout per domain, so
    /// a throttled run is never cut short by the fixed query budget.
    fn bulk_budget(&self, driver: &dyn Driver, count: usize) -> Duration {
        match driver.bulk_pacing(count) {
            Some(pacing) => {
                let requests = u32::try_from(count).unwrap_or(u32::MAX);
                let worst_case = pacing.saturating_add(self.config.request_timeout.saturating_mul(requests));
                self.config.query_budget.max(worst_case)
            }
            None => self.config.query_budget,
        }
    }

    /// Bound one provider's whole query by `budget`.
    async fn budgeted<F>(&self, id: ProviderId, budget: Duration, query: F) -> ProviderOutcome
    where
        F: Future<Output = ProviderOutcome>,
    {
        match tokio::time::timeout(budget, query).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(provider = %id, ?budget, "provider query exceeded its budget");
                ProviderOutcome::failure(id, &ScoutError::timeout(format!("{} query", id), budget))
            }
        }
    }
}

fn missing_driver(id: ProviderId) -> ProviderOutcome {
    ProviderOutcome::failure(
        id,
        &ScoutError::config(format!("Provider '{}' is not configured", id)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DomainResult;
    use async_trait::async_trait;

    /// Driver that answers after a fixed delay.
    struct SlowDriver {
        id: ProviderId,
        delay: Duration,
    }

    #[async_trait]
    impl Driver for SlowDriver {
        fn id(&self) -> ProviderId {
            self.id
        }

        fn canonicalize(&self, query: &str) -> Option<String> {
            Some(query.trim().to_lowercase())
        }

        async fn search(&self, query: &str, _options: &SearchOptions) -> ProviderOutcome {
            tokio::time::sleep(self.delay).await;
            ProviderOutcome::success(self.id, vec![DomainResult::new(query, true, self.id)])
        }

        async fn bulk_search(&self, domains: &[String], _options: &SearchOptions) -> ProviderOutcome {
            tokio::time::sleep(self.delay).await;
            let results = domains
                .iter()
                .map(|d| DomainResult::new(d.clone(), true, self.id))
                .collect();
            ProviderOutcome::success(self.id, results)
        }
    }

    fn aggregator(drivers: Vec<(ProviderId, u64)>) -> Aggregator {
        let drivers = drivers
            .into_iter()
            .map(|(id, secs)| {
                Arc::new(SlowDriver {
                    id,
                    delay: Duration::from_secs(secs),
                }) as Arc<dyn Driver>
            })
            .collect();
        Aggregator::with_drivers(
            ScoutConfig::default().with_query_budget(Duration::from_secs(10)),
            drivers,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_only_fails_the_slow_provider() {
        let aggregator = aggregator(vec![
            (ProviderId::Marketplace, 1),
            (ProviderId::Reseller, 60),
        ]);
        let start = tokio::time::Instant::now();

        let outcomes = aggregator
            .query(
                "example.com",
                &[ProviderId::Reseller, ProviderId::Marketplace],
                &SearchOptions::default(),
            )
            .await;

        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert_eq!(outcomes[0].provider_id, ProviderId::Reseller);
        assert!(outcomes[0].domains.is_empty());
        assert!(outcomes[0].error.as_ref().unwrap().starts_with("Timeout"));
        assert!(outcomes[1].is_success());
        assert_eq!(outcomes[1].domains.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_providers_run_concurrently() {
        let aggregator = aggregator(vec![
            (ProviderId::Marketplace, 3),
            (ProviderId::Reseller, 3),
            (ProviderId::NicChile, 3),
        ]);
        let start = tokio::time::Instant::now();

        let outcomes = aggregator
            .bulk_query(
                &["a.cl".to_string(), "b.cl".to_string()],
                &ProviderId::all(),
                &SearchOptions::default(),
            )
            .await;

        assert_eq!(start.elapsed(), Duration::from_secs(3));
        assert!(outcomes.iter().all(|o| o.domains.len() == 2));
    }

    #[cfg(feature = "nic-cl")]
    #[tokio::test(start_paused = true)]
    async fn test_throttled_bulk_outlasts_query_budget() {
        use crate::http::testing::ScriptedTransport;
        use crate::http::HttpResponse;

        let transport = ScriptedTransport::new().on_url(
            "/registry/Whois.do",
            vec![Ok(HttpResponse::new(200, "<p>Titular: Alguien</p>"))],
        );
        let aggregator =
            Aggregator::with_transport(ScoutConfig::default(), Arc::new(transport)).unwrap();
        let targets: Vec<String> = (0..50).map(|i| format!("dominio{:02}", i)).collect();
        let start = tokio::time::Instant::now();

        let outcomes = aggregator
            .bulk_query(&targets, &[ProviderId::NicChile], &SearchOptions::default())
            .await;

        assert!(outcomes[0].error.is_none());
        assert_eq!(outcomes[0].domains.len(), 50);
        assert!(outcomes[0].domains.iter().all(|d| !d.available));
        // 49 throttle pauses at the default 1s, well past the 45s budget
        assert_eq!(start.elapsed(), Duration::from_secs(49));
    }

    #[test]
    fn test_bulk_budget_only_grows_for_paced_drivers() {
        struct Paced;

        #[async_trait]
        impl Driver for Paced {
            fn id(&self) -> ProviderId {
                ProviderId::NicChile
            }

            fn canonicalize(&self, query: &str) -> Option<String> {
                Some(query.to_string())
            }

            async fn search(&self, _query: &str, _options: &SearchOptions) -> ProviderOutcome {
                ProviderOutcome::success(ProviderId::NicChile, Vec::new())
            }

            async fn bulk_search(&self, _domains: &[String], _options: &SearchOptions) -> ProviderOutcome {
                ProviderOutcome::success(ProviderId::NicChile, Vec::new())
            }

            fn bulk_pacing(&self, count: usize) -> Option<Duration> {
                Some(Duration::from_secs(count.saturating_sub(1) as u64))
            }
        }

        let config = ScoutConfig::default()
            .with_query_budget(Duration::from_secs(45))
            .with_request_timeout(Duration::from_secs(15));
        let aggregator = Aggregator::with_drivers(config, Vec::new());
        let plain = SlowDriver {
            id: ProviderId::Reseller,
            delay: Duration::ZERO,
        };

        assert_eq!(aggregator.bulk_budget(&plain, 100), Duration::from_secs(45));
        assert_eq!(aggregator.bulk_budget(&Paced, 1), Duration::from_secs(45));
        // 9 pauses + 10 requests of 15s
        assert_eq!(aggregator.bulk_budget(&Paced, 10), Duration::from_secs(159));
    }

    #[tokio::test]
    async fn test_unknown_provider_yields_error_outcome() {
        let aggregator = aggregator(vec![(ProviderId::Marketplace, 0)]);

        let outcomes = aggregator
            .query("a.com", &[ProviderId::NicChile], &SearchOptions::default())
            .await;

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].provider_id, ProviderId::NicChile);
        assert!(outcomes[0].error.as_ref().unwrap().contains("not configured"));
    }

    #[tokio::test]
    async fn test_search_uses_default_providers() {
        let aggregator = Aggregator::with_drivers(
            ScoutConfig::default().with_providers(vec![ProviderId::Reseller]),
            vec![Arc::new(SlowDriver {
                id: ProviderId::Reseller,
                delay: Duration::ZERO,
            })],
        );

        let outcomes = aggregator.search("a.com", &SearchOptions::default()).await;

        assert_eq!(outcomes.len(), 1);
        assert_eq!(aggregator.providers(), vec![ProviderId::Reseller]);
    }
}
