//! Registrable-domain extraction for the same-site admission check.
//!
//! The scheduler derives a primary domain from the seed request's host and
//! admits only requests whose host resolves to the same primary domain. An
//! IPv4 host is its own primary domain. Otherwise the host's public suffix is
//! matched against a fixed, ordered pattern list (compound suffixes like
//! `.co.uk` before bare gTLDs before bare two-letter ccTLDs) and the result
//! walks back one label to include the registrable portion:
//! `www.example.com` -> `example.com`, `a.b.example.co.uk` -> `example.co.uk`.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("the host is empty")]
    EmptyHost,
    #[error("unrecognized host: {0}")]
    UnrecognizedHost(String),
}

static IPV4_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}$").unwrap());

// Ordered by suffix length so `.co.uk` wins over `.uk`.
static SUFFIX_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"\.(com|net|org|gov|edu|me|biz|info|name|mobi|so|asia|tel|tv|cc|co)\.\w{2}$")
            .unwrap(),
        Regex::new(r"\.(com|net|org|gov|edu|me|biz|info|name|mobi|so|asia|tel|tv|cc|co)$").unwrap(),
        Regex::new(r"\.\w{2}$").unwrap(),
    ]
});

/// Extracts the registrable domain of `host`.
pub fn primary_domain(host: &str) -> Result<String, DomainError> {
    let host = host.trim();
    if host.is_empty() {
        return Err(DomainError::EmptyHost);
    }
    if IPV4_PATTERN.is_match(host) {
        return Ok(host.to_string());
    }
    let suffix_start = SUFFIX_PATTERNS
        .iter()
        .find_map(|pattern| pattern.find(host))
        .map(|m| m.start())
        .unwrap_or(0);
    if suffix_start == 0 {
        return Err(DomainError::UnrecognizedHost(host.to_string()));
    }
    let prefix = &host[..suffix_start];
    let label_start = prefix.rfind('.').map(|i| i + 1).unwrap_or(0);
    Ok(host[label_start..].to_string())
}
