//! Domain Scout CLI Application
//!
//! A command-line adapter over domain-scout-lib. It resolves configuration,
//! runs a single or bulk query, and prints the provider outcomes as JSON on
//! stdout. Logs go to stderr.

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Args as ClapArgs, Parser, Subcommand};
use domain_scout_lib::{
    load_env_config, parse_domain_list, Aggregator, ConfigManager, ProviderId, ProviderOutcome,
    ScoutConfig, SearchOptions,
};
use std::process;
use tracing_subscriber::EnvFilter;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// CLI arguments for domain-scout
#[derive(Parser, Debug)]
#[command(name = "domain-scout")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Query domain availability and pricing across several providers")]
#[command(
    long_about = "Query domain availability and pricing across several providers.\n\nEvery requested provider yields one outcome, printed as JSON; a failing provider reports its error without affecting the others."
)]
#[command(styles = STYLES)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Use specific config file instead of automatic discovery
    #[arg(long = "config", value_name = "FILE", global = true, help_heading = "Configuration")]
    pub config: Option<String>,

    /// Marketplace site root (overrides config)
    #[arg(long = "marketplace-url", value_name = "URL", global = true, help_heading = "Configuration")]
    pub marketplace_url: Option<String>,

    /// Reseller site root (overrides config)
    #[arg(long = "reseller-url", value_name = "URL", global = true, help_heading = "Configuration")]
    pub reseller_url: Option<String>,

    /// Debug logging on stderr
    #[arg(short = 'v', long = "verbose", global = true, help_heading = "Configuration")]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Look up one domain or keyword
    Search {
        /// Domain or keyword to look up
        #[arg(value_name = "QUERY")]
        query: String,

        #[command(flatten)]
        query_args: QueryArgs,

        /// Keep only the result matching the query exactly
        #[arg(short = 'e', long = "exact")]
        exact: bool,
    },

    /// Look up a list of domains
    Bulk {
        /// Domains to look up
        #[arg(value_name = "DOMAINS")]
        domains: Vec<String>,

        /// Input file with domains (one per line, '#' starts a comment)
        #[arg(short = 'f', long = "file", value_name = "FILE")]
        file: Option<String>,

        #[command(flatten)]
        query_args: QueryArgs,
    },
}

/// Options shared by both subcommands
#[derive(ClapArgs, Debug, Default)]
pub struct QueryArgs {
    /// Providers to query (comma-separated: marketplace, reseller, nic-cl)
    #[arg(
        short = 'p',
        long = "providers",
        value_name = "PROVIDER",
        value_delimiter = ',',
        value_parser = parse_provider
    )]
    pub providers: Option<Vec<ProviderId>>,

    /// Scrape WHOIS details for taken domains where supported
    #[arg(short = 'w', long = "whois")]
    pub whois: bool,
}

fn parse_provider(value: &str) -> Result<ProviderId, String> {
    value.parse::<ProviderId>().map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("domain_scout_lib={0},domain_scout={0}", level))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = build_config(&args)?;
    tracing::debug!(providers = ?config.providers, "configuration resolved");

    let outcomes = match &args.command {
        Command::Search {
            query,
            query_args,
            exact,
        } => {
            let aggregator = Aggregator::with_config(config)?;
            let providers = selected_providers(query_args, aggregator.config());
            let options = SearchOptions::default()
                .with_whois(query_args.whois)
                .with_exact(*exact);
            aggregator.query(query, &providers, &options).await
        }
        Command::Bulk {
            domains,
            file,
            query_args,
        } => {
            let targets = collect_bulk_targets(domains, file.as_deref())?;
            let aggregator = Aggregator::with_config(config)?;
            let providers = selected_providers(query_args, aggregator.config());
            let options = SearchOptions::default().with_whois(query_args.whois);
            aggregator.bulk_query(&targets, &providers, &options).await
        }
    };

    print_outcomes(&outcomes)
}

/// Build configuration with proper precedence.
///
/// Precedence order (highest to lowest):
/// 1. CLI arguments
/// 2. Environment variables (DS_*)
/// 3. Explicit config file (--config or DS_CONFIG), or discovered files
/// 4. Built-in defaults
fn build_config(args: &Args) -> Result<ScoutConfig, Box<dyn std::error::Error>> {
    let config_manager = ConfigManager::new(args.verbose);

    let explicit_path = args
        .config
        .clone()
        .or_else(|| std::env::var("DS_CONFIG").ok().filter(|p| !p.trim().is_empty()));

    let file_config = match explicit_path {
        Some(path) => {
            tracing::debug!(path = %path, "using explicit config file");
            config_manager
                .load_file(&path)
                .map_err(|e| format!("Failed to load config file '{}': {}", path, e))?
        }
        None => config_manager.discover_and_load()?,
    };

    let config = file_config.apply(ScoutConfig::default())?;
    let config = load_env_config().apply(config);

    Ok(apply_cli_args_to_config(config, args))
}

fn apply_cli_args_to_config(mut config: ScoutConfig, args: &Args) -> ScoutConfig {
    if let Some(url) = &args.marketplace_url {
        config = config.with_marketplace_url(url.clone());
    }
    if let Some(url) = &args.reseller_url {
        config = config.with_reseller_url(url.clone());
    }
    config
}

fn selected_providers(query_args: &QueryArgs, config: &ScoutConfig) -> Vec<ProviderId> {
    query_args
        .providers
        .clone()
        .unwrap_or_else(|| config.providers.clone())
}

/// Merge positional domains with the ones read from `--file`.
fn collect_bulk_targets(
    domains: &[String],
    file: Option<&str>,
) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let mut targets = domains.to_vec();

    if let Some(path) = file {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read domain file '{}': {}", path, e))?;
        targets.extend(parse_domain_list(&content));
    }

    if targets.is_empty() {
        return Err("No domains given. Pass domains as arguments or use --file.".into());
    }

    Ok(targets)
}

fn print_outcomes(outcomes: &[ProviderOutcome]) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string_pretty(outcomes)?;
    println!("{}", json);
    Ok(())
}
