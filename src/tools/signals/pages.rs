//! Well-known policy and contact page probes.

use super::types::{PageProbe, PolicyPagesSignals};
use crate::services::fetch::{FetchContext, FetchOptions, PolicyFetcher};
use crate::tools::html::text_snippet;
use crate::types::DiscoveredBy;
use url::Url;

const SNIPPET_CHARS: usize = 500;

/// Fixed probe list: the common English paths plus the Shopify-style
/// `/pages/` variants.
pub const WELL_KNOWN_PATHS: &[&str] = &[
    "/privacy-policy",
    "/privacy",
    "/terms",
    "/terms-of-service",
    "/terms-and-conditions",
    "/refund-policy",
    "/returns",
    "/return-policy",
    "/shipping-policy",
    "/shipping",
    "/contact",
    "/contact-us",
    "/about",
    "/about-us",
    "/pages/privacy-policy",
    "/pages/terms-of-service",
    "/pages/refund-policy",
];

fn keeps_snippet(path: &str) -> bool {
    path.contains("privacy") || path.contains("terms") || path.contains("contact")
}

fn discovery_tag(path: &str) -> DiscoveredBy {
    if path.contains("contact") {
        DiscoveredBy::ContactPage
    } else {
        DiscoveredBy::PolicyCheck
    }
}

/// GET every well-known path concurrently. Paths disallowed for `*` are
/// skipped when the policy honors robots.
pub async fn probe_policy_pages(
    fetcher: &PolicyFetcher,
    ctx: &FetchContext,
    origin: &Url,
    disallowed_paths: &[String],
) -> PolicyPagesSignals {
    let honor_robots = ctx.policy.respect_robots && !ctx.policy.allow_robots_disallowed;

    let probes = WELL_KNOWN_PATHS.iter().map(|path| {
        let url = origin.join(path).map(|u| u.to_string());
        async move {
            let path = path.to_string();
            if honor_robots && is_disallowed(&path, disallowed_paths) {
                return (path, PageProbe::default(), None);
            }
            let Ok(url) = url else {
                return (path, PageProbe::default(), None);
            };
            let response = fetcher
                .fetch(&url, ctx, discovery_tag(&path), &FetchOptions::default())
                .await;
            let probe = PageProbe {
                exists: response.ok,
                status: response.status_code,
            };
            let snippet = if response.ok && keeps_snippet(&path) {
                response.body.as_deref().map(|b| text_snippet(b, SNIPPET_CHARS))
            } else {
                None
            };
            (path, probe, snippet)
        }
    });

    let mut signals = PolicyPagesSignals::default();
    for (path, probe, snippet) in futures::future::join_all(probes).await {
        if let Some(snippet) = snippet {
            if !snippet.is_empty() {
                signals.snippets.insert(path.clone(), snippet);
            }
        }
        signals.page_exists.insert(path, probe);
    }
    signals
}

fn is_disallowed(path: &str, disallowed: &[String]) -> bool {
    disallowed.iter().any(|prefix| path.starts_with(prefix.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_list_is_complete() {
        assert_eq!(WELL_KNOWN_PATHS.len(), 17);
        assert!(WELL_KNOWN_PATHS.contains(&"/pages/refund-policy"));
    }

    #[test]
    fn snippet_retention_is_limited_to_policyish_pages() {
        assert!(keeps_snippet("/privacy-policy"));
        assert!(keeps_snippet("/terms-of-service"));
        assert!(keeps_snippet("/contact-us"));
        assert!(!keeps_snippet("/shipping"));
        assert!(!keeps_snippet("/about"));
    }

    #[test]
    fn contact_pages_carry_their_own_discovery_tag() {
        assert_eq!(discovery_tag("/contact-us"), DiscoveredBy::ContactPage);
        assert_eq!(discovery_tag("/privacy"), DiscoveredBy::PolicyCheck);
    }

    #[test]
    fn disallow_matching_is_prefix_based() {
        let disallowed = vec!["/privacy".to_string(), "/pages/".to_string()];
        assert!(is_disallowed("/privacy-policy", &disallowed));
        assert!(is_disallowed("/pages/refund-policy", &disallowed));
        assert!(!is_disallowed("/terms", &disallowed));
    }
}
