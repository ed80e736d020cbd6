//! # Domain Scout Library
//!
//! A provider-query engine for domain availability and pricing.
//!
//! None of the upstreams it talks to offers a stable public API, so each one
//! gets a dedicated driver: a marketplace that needs an HTML session token and
//! asynchronous polling, a reseller with a two-phase pending resolution, and
//! the NIC Chile WHOIS page, scraped one domain at a time. The [`Aggregator`]
//! fans a query out to the requested drivers and always returns one
//! [`ProviderOutcome`] per provider, failed or not.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use domain_scout_lib::{Aggregator, ProviderId, ScoutConfig, SearchOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ScoutConfig::default().with_reseller_url("https://reseller.example");
//!     let aggregator = Aggregator::with_config(config)?;
//!
//!     let options = SearchOptions::default().with_whois(true).with_exact(true);
//!     let outcomes = aggregator
//!         .query("ejemplo", &[ProviderId::Reseller, ProviderId::NicChile], &options)
//!         .await;
//!
//!     for outcome in outcomes {
//!         match outcome.error {
//!             Some(error) => println!("{}: {}", outcome.provider_id, error),
//!             None => println!("{}: {:?}", outcome.provider_id, outcome.domains),
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **marketplace**: session token + status polling driver
//! - **reseller**: prepare call + chunked secondary checks
//! - **nic-cl**: NIC Chile WHOIS scraping with a throttled bulk mode

// Re-export main public API types and functions
pub use aggregator::Aggregator;
pub use concurrent::BackoffPolicy;
pub use config::{
    load_env_config, parse_duration_string, ConfigManager, EnvConfig, FileConfig,
    MarketplaceSettings, NicChileSettings, ResellerSettings, ScoutConfig, MAX_SECONDARY_CHUNK,
};
pub use error::ScoutError;
pub use http::{Body, HttpRequest, HttpResponse, HttpTransport, Method, ReqwestTransport};
pub use providers::{create_driver, enabled_providers, Driver};
pub use session::{CookieSet, Session};
pub use types::{
    DomainResult, DomainStatus, Price, ProviderId, ProviderOutcome, SearchOptions, WhoisRecord,
};
pub use utils::{canonicalize_all, canonicalize_domain, parse_domain_list, validate_domain};

// Public modules
pub mod providers;

// Internal modules - these are not part of the public API
mod aggregator;
mod concurrent;
mod config;
mod error;
mod http;
mod session;
mod types;
mod utils;

// Type alias for convenience
pub type Result<T> = std::result::Result<T, ScoutError>;

// Library version and metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library information for debugging or display purposes.
pub fn info() -> LibraryInfo {
    LibraryInfo {
        version: VERSION,
        providers: enabled_providers(),
    }
}

/// Information about the library build and its compiled-in providers
#[derive(Debug, Clone)]
pub struct LibraryInfo {
    pub version: &'static str,
    pub providers: Vec<ProviderId>,
}
