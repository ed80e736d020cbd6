//! Provider drivers and the factory that builds them.
//!
//! Each driver speaks one upstream's protocol and reports through a
//! [`ProviderOutcome`]; errors never escape a driver.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ScoutConfig;
use crate::error::ScoutError;
use crate::http::HttpTransport;
use crate::types::{ProviderId, ProviderOutcome, SearchOptions};

#[cfg(feature = "marketplace")]
mod marketplace;
#[cfg(feature = "nic-cl")]
mod nic_chile;
#[cfg(feature = "reseller")]
mod reseller;

#[cfg(feature = "marketplace")]
pub use marketplace::MarketplaceDriver;
#[cfg(feature = "nic-cl")]
pub use nic_chile::NicChileDriver;
#[cfg(feature = "reseller")]
pub use reseller::ResellerDriver;

/// One upstream provider.
#[async_trait]
pub trait Driver: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Canonical form of a query for this provider, or `None` if invalid.
    ///
    /// The aggregator uses it to compare results against what was asked.
    fn canonicalize(&self, query: &str) -> Option<String>;

    /// Look up a single query (a domain or a keyword, depending on provider).
    async fn search(&self, query: &str, options: &SearchOptions) -> ProviderOutcome;

    /// Look up a list of domains.
    async fn bulk_search(&self, domains: &[String], options: &SearchOptions) -> ProviderOutcome;

    /// Total deliberate delay a bulk run over `count` domains spends between
    /// requests, for drivers that pace their upstream.
    fn bulk_pacing(&self, _count: usize) -> Option<Duration> {
        None
    }
}

/// Build the driver for `id` on top of a shared transport.
///
/// Fails when the provider was compiled out via feature flags.
pub fn create_driver(
    id: ProviderId,
    config: &ScoutConfig,
    transport: Arc<dyn HttpTransport>,
) -> Result<Arc<dyn Driver>, ScoutError> {
    match id {
        #[cfg(feature = "marketplace")]
        ProviderId::Marketplace => Ok(Arc::new(MarketplaceDriver::new(
            transport,
            config.marketplace.clone(),
            config.backoff.clone(),
        ))),
        #[cfg(feature = "reseller")]
        ProviderId::Reseller => Ok(Arc::new(ResellerDriver::new(
            transport,
            config.reseller.clone(),
            config.chunk_size,
        ))),
        #[cfg(feature = "nic-cl")]
        ProviderId::NicChile => Ok(Arc::new(NicChileDriver::new(
            transport,
            config.nic_chile.clone(),
            config.throttle_delay,
        ))),
        #[allow(unreachable_patterns)]
        other => {
            let _ = (config, transport);
            Err(ScoutError::config(format!(
                "Provider '{}' is not enabled in this build",
                other
            )))
        }
    }
}

/// Providers compiled into this build.
pub fn enabled_providers() -> Vec<ProviderId> {
    vec![
        #[cfg(feature = "marketplace")]
        ProviderId::Marketplace,
        #[cfg(feature = "reseller")]
        ProviderId::Reseller,
        #[cfg(feature = "nic-cl")]
        ProviderId::NicChile,
    ]
}
