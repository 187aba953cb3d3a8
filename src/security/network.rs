/*!
 * Network Rule Matching
 */

use crate::core::limits::{DEFAULT_HTTPS_PORT, DEFAULT_HTTP_PORT};
use url::Url;

/// Hostname equals `domain` or is a sub-domain of it
///
/// `api.example.com` matches `example.com`; `badexample.com` does not.
#[inline]
pub fn domain_matches(hostname: &str, domain: &str) -> bool {
    hostname == domain
        || hostname
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// First entry of `domains` matching `hostname`
pub fn find_matching_domain<'a>(hostname: &str, domains: &'a [String]) -> Option<&'a str> {
    domains
        .iter()
        .map(String::as_str)
        .find(|domain| domain_matches(hostname, domain))
}

/// Explicit port, or 443 for https and 80 for everything else
#[inline]
pub fn resolve_port(url: &Url) -> u16 {
    url.port().unwrap_or(if url.scheme() == "https" {
        DEFAULT_HTTPS_PORT
    } else {
        DEFAULT_HTTP_PORT
    })
}
