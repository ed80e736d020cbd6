//! Utility functions for domain processing and validation.
//!
//! Each driver canonicalizes its own inputs with these helpers: case-folding,
//! optional default suffix, and basic syntax checks.

use std::collections::HashSet;

use crate::error::ScoutError;

/// Validate a domain name format.
///
/// This is a basic syntax check; the upstream is the final authority.
pub fn validate_domain(domain: &str) -> Result<(), ScoutError> {
    let domain = domain.trim();

    if domain.is_empty() {
        return Err(ScoutError::invalid_domain(
            domain,
            "Domain name cannot be empty",
        ));
    }

    if domain.len() > 253 {
        return Err(ScoutError::invalid_domain(domain, "Domain name too long"));
    }

    if domain.starts_with('.') || domain.ends_with('.') || domain.contains("..") {
        return Err(ScoutError::invalid_domain(
            domain,
            "Domain name has an empty label",
        ));
    }

    for label in domain.split('.') {
        if label.len() > 63 {
            return Err(ScoutError::invalid_domain(domain, "Label longer than 63 characters"));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(ScoutError::invalid_domain(
                domain,
                "Label cannot start or end with a hyphen",
            ));
        }
        // Alphanumeric covers IDN labels (e.g. "ñandú.cl") as well as ASCII
        if !label.chars().all(|c| c.is_alphanumeric() || c == '-') {
            return Err(ScoutError::invalid_domain(
                domain,
                "Only letters, digits and hyphens are allowed",
            ));
        }
    }

    Ok(())
}

/// Canonicalize a query for a driver.
///
/// Trims and lower-cases the input, then appends `default_suffix` when the
/// name does not already end with it. A suffix is given without the leading
/// dot (e.g. `"cl"`).
pub fn canonicalize_domain(raw: &str, default_suffix: Option<&str>) -> Result<String, ScoutError> {
    let mut domain = raw.trim().to_lowercase();

    if let Some(suffix) = default_suffix {
        let dotted = format!(".{}", suffix);
        if !domain.is_empty() && !domain.ends_with(&dotted) {
            domain.push_str(&dotted);
        }
    }

    validate_domain(&domain)?;
    Ok(domain)
}

/// Canonicalize a list of bulk inputs, dropping duplicates but keeping order.
///
/// Fails on the first invalid entry.
pub fn canonicalize_all(
    domains: &[String],
    default_suffix: Option<&str>,
) -> Result<Vec<String>, ScoutError> {
    let mut seen = HashSet::new();
    let mut results = Vec::with_capacity(domains.len());

    for raw in domains {
        if raw.trim().is_empty() {
            continue;
        }
        let domain = canonicalize_domain(raw, default_suffix)?;
        if seen.insert(domain.clone()) {
            results.push(domain);
        }
    }

    if results.is_empty() {
        return Err(ScoutError::invalid_domain("", "No domains to query"));
    }

    Ok(results)
}

/// Read domain names from text: one per line, `#` starts a comment.
pub fn parse_domain_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}
