//! Candidate-producing strategies, one per discovery method.

use super::patterns::{anchor_regex, common_paths, href_regex};
use super::{DiscoveryMethod, PolicyLinkCandidate, PolicyType, MAX_CANDIDATES_PER_TYPE};
use crate::selectors::LINK_SELECTOR;
use crate::services::llm::{LlmLink, LlmMatches};
use crate::types::Domain;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use url::Url;

const MAX_FOOTER_LLM_LINKS: usize = 30;
const MAX_OTHER_LLM_LINKS: usize = 20;

static PROXIMITY_CONTAINER_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("li, div, p, span, footer, section").expect("valid selector"));

/// Resolve an href against the page URL and keep it only when it stays on
/// the target site (`www`-normalized).
fn resolve_scoped(href: &str, base: &Url, target: &Domain) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    let url = Url::parse(href).or_else(|_| base.join(href)).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?;
    if !target.same_site(host) {
        return None;
    }
    Some(url)
}

fn is_in_footer(element: &ElementRef) -> bool {
    let mut node = Some(**element);
    while let Some(n) = node {
        if let Some(el) = ElementRef::wrap(n) {
            if el.value().name() == "footer" {
                return true;
            }
            if el
                .value()
                .attr("class")
                .map(|c| c.to_ascii_lowercase().contains("footer"))
                .unwrap_or(false)
            {
                return true;
            }
        }
        node = n.parent();
    }
    false
}

fn normalized_text(element: &ElementRef) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Rank every in-scope anchor per missing policy type.
///
/// `rank = 100·anchor_match + 50·href_match + 20·in_footer`; links matching
/// neither text nor href are skipped, and only the top three per type
/// survive for verification.
pub fn scan_anchors(
    html: &str,
    base_url: &str,
    target: &Domain,
    missing: &[PolicyType],
    method: DiscoveryMethod,
) -> Vec<PolicyLinkCandidate> {
    let Ok(base) = Url::parse(base_url) else {
        return Vec::new();
    };
    let doc = Html::parse_document(html);

    let mut all: Vec<PolicyLinkCandidate> = Vec::new();
    for link in doc.select(&LINK_SELECTOR) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Some(url) = resolve_scoped(href, &base, target) else {
            continue;
        };
        let text = normalized_text(&link);
        let in_footer = is_in_footer(&link);

        for policy_type in missing {
            let anchor_match = anchor_regex(*policy_type).is_match(&text);
            let href_match = href_regex(*policy_type).is_match(url.as_str());
            let base_rank = 100 * anchor_match as i32 + 50 * href_match as i32;
            if base_rank == 0 {
                continue;
            }
            all.push(PolicyLinkCandidate {
                url: url.to_string(),
                policy_type: *policy_type,
                anchor_text: if text.is_empty() { None } else { Some(text.clone()) },
                method,
                rank: base_rank + 20 * in_footer as i32,
                in_footer,
            });
        }
    }

    top_per_type(all)
}

fn top_per_type(mut candidates: Vec<PolicyLinkCandidate>) -> Vec<PolicyLinkCandidate> {
    candidates.sort_by(|a, b| b.rank.cmp(&a.rank));
    let mut out: Vec<PolicyLinkCandidate> = Vec::new();
    for candidate in candidates {
        let kept = out
            .iter()
            .filter(|c| c.policy_type == candidate.policy_type)
            .count();
        let duplicate = out
            .iter()
            .any(|c| c.policy_type == candidate.policy_type && c.url == candidate.url);
        if kept < MAX_CANDIDATES_PER_TYPE && !duplicate {
            out.push(candidate);
        }
    }
    out
}

/// Guessed origin-root paths, ranked by list position.
pub fn common_path_candidates(origin: &Url, missing: &[PolicyType]) -> Vec<PolicyLinkCandidate> {
    let mut out = Vec::new();
    for policy_type in missing {
        for (position, path) in common_paths(*policy_type).iter().enumerate() {
            let Ok(url) = origin.join(path) else {
                continue;
            };
            out.push(PolicyLinkCandidate {
                url: url.to_string(),
                policy_type: *policy_type,
                anchor_text: None,
                method: DiscoveryMethod::CommonPaths,
                rank: 100 - 10 * position as i32,
                in_footer: false,
            });
        }
    }
    out
}

/// Find text mentioning a policy type, then collect the links
/// inside its enclosing container.
pub fn keyword_proximity(
    html: &str,
    base_url: &str,
    target: &Domain,
    missing: &[PolicyType],
) -> Vec<PolicyLinkCandidate> {
    let Ok(base) = Url::parse(base_url) else {
        return Vec::new();
    };
    let doc = Html::parse_document(html);

    let mut all = Vec::new();
    for container in doc.select(&PROXIMITY_CONTAINER_SELECTOR) {
        // Only direct text nodes; descendants get their own containers.
        let own_text: String = container
            .children()
            .filter_map(|n| n.value().as_text().map(|t| t.to_string()))
            .collect();
        if own_text.trim().is_empty() {
            continue;
        }

        for policy_type in missing {
            if !anchor_regex(*policy_type).is_match(&own_text) {
                continue;
            }
            let in_footer = is_in_footer(&container);
            for link in container.select(&LINK_SELECTOR) {
                let Some(href) = link.value().attr("href") else {
                    continue;
                };
                let Some(url) = resolve_scoped(href, &base, target) else {
                    continue;
                };
                let rank = if href_regex(*policy_type).is_match(url.as_str()) {
                    80
                } else {
                    40
                };
                let text = normalized_text(&link);
                all.push(PolicyLinkCandidate {
                    url: url.to_string(),
                    policy_type: *policy_type,
                    anchor_text: if text.is_empty() { None } else { Some(text) },
                    method: DiscoveryMethod::KeywordProximity,
                    rank,
                    in_footer,
                });
            }
        }
    }
    top_per_type(all)
}

/// Link inventory for the semantic matcher: every in-scope, non-empty-text
/// link, footer links first, capped at 30 footer + 20 other.
pub fn collect_llm_links(html: &str, base_url: &str, target: &Domain) -> Vec<LlmLink> {
    let Ok(base) = Url::parse(base_url) else {
        return Vec::new();
    };
    let doc = Html::parse_document(html);

    let mut footer_links = Vec::new();
    let mut other_links = Vec::new();
    for link in doc.select(&LINK_SELECTOR) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Some(url) = resolve_scoped(href, &base, target) else {
            continue;
        };
        let text = normalized_text(&link);
        if text.is_empty() {
            continue;
        }
        let in_footer = is_in_footer(&link);
        let entry = LlmLink {
            url: url.to_string(),
            text,
            in_footer,
        };
        if in_footer {
            if footer_links.len() < MAX_FOOTER_LLM_LINKS {
                footer_links.push(entry);
            }
        } else if other_links.len() < MAX_OTHER_LLM_LINKS {
            other_links.push(entry);
        }
    }
    footer_links.extend(other_links);
    footer_links
}

/// Turn the model's index picks into candidates for the missing types.
pub fn llm_candidates(
    matches: &LlmMatches,
    links: &[LlmLink],
    missing: &[PolicyType],
) -> Vec<PolicyLinkCandidate> {
    let mut out = Vec::new();
    let picks = [
        (PolicyType::Privacy, matches.privacy),
        (PolicyType::Refund, matches.refund),
        (PolicyType::Terms, matches.terms),
    ];
    for (policy_type, index) in picks {
        if !missing.contains(&policy_type) {
            continue;
        }
        let Some(link) = index.and_then(|i| links.get(i)) else {
            continue;
        };
        out.push(PolicyLinkCandidate {
            url: link.url.clone(),
            policy_type,
            anchor_text: Some(link.text.clone()),
            method: DiscoveryMethod::LlmSemantic,
            rank: if link.in_footer { 90 } else { 70 },
            in_footer: link.in_footer,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOMEPAGE: &str = r#"
        <html><body>
        <nav><a href="/shop">Shop All</a></nav>
        <main>
            <a href="/products/red-shoe">Red Shoe</a>
            <a href="https://instagram.com/acme">Follow us</a>
        </main>
        <footer>
            <a href="/pages/privacy-policy">Privacy Policy</a>
            <a href="/refund-policy">Returns &amp; Refunds</a>
            <a href="/legal">Terms of Service</a>
            <a href="/contact">Contact</a>
        </footer>
        </body></html>
    "#;

    fn target() -> Domain {
        Domain::from_raw("example.com")
    }

    #[test]
    fn anchor_scan_finds_footer_policies() {
        let candidates = scan_anchors(
            HOMEPAGE,
            "https://example.com/",
            &target(),
            &PolicyType::ALL,
            DiscoveryMethod::HomepageHtml,
        );

        let privacy = candidates
            .iter()
            .find(|c| c.policy_type == PolicyType::Privacy)
            .expect("privacy candidate");
        assert_eq!(privacy.url, "https://example.com/pages/privacy-policy");
        // anchor (100) + href (50) + footer (20)
        assert_eq!(privacy.rank, 170);
        assert!(privacy.in_footer);

        let terms = candidates
            .iter()
            .find(|c| c.policy_type == PolicyType::Terms)
            .expect("terms candidate");
        // anchor (100) + href "legal" (50) + footer (20)
        assert_eq!(terms.rank, 170);

        // Off-domain and non-matching links never become candidates.
        assert!(candidates.iter().all(|c| c.url.starts_with("https://example.com/")));
        assert!(candidates.iter().all(|c| !c.url.contains("instagram")));
    }

    #[test]
    fn anchor_scan_only_considers_missing_types() {
        let candidates = scan_anchors(
            HOMEPAGE,
            "https://example.com/",
            &target(),
            &[PolicyType::Refund],
            DiscoveryMethod::HomepageHtml,
        );
        assert!(!candidates.is_empty());
        assert!(candidates.iter().all(|c| c.policy_type == PolicyType::Refund));
    }

    #[test]
    fn anchor_scan_caps_candidates_per_type() {
        let mut html = String::from("<html><body><footer>");
        for i in 0..6 {
            html.push_str(&format!("<a href=\"/privacy-{i}\">Privacy Policy {i}</a>"));
        }
        html.push_str("</footer></body></html>");
        let candidates = scan_anchors(
            &html,
            "https://example.com/",
            &target(),
            &[PolicyType::Privacy],
            DiscoveryMethod::HomepageHtml,
        );
        assert_eq!(candidates.len(), MAX_CANDIDATES_PER_TYPE);
    }

    #[test]
    fn common_paths_rank_decays_by_position() {
        let origin = Url::parse("https://example.com/").expect("url");
        let candidates = common_path_candidates(&origin, &[PolicyType::Privacy]);
        assert_eq!(candidates[0].url, "https://example.com/privacy-policy");
        assert_eq!(candidates[0].rank, 100);
        assert_eq!(candidates[1].rank, 90);
        assert!(candidates.iter().all(|c| c.rank >= 10));
    }

    #[test]
    fn keyword_proximity_ranks_href_matches_higher() {
        let html = r#"
            <div>Read our refund policy before ordering:
                <a href="/returns">here</a>
                <a href="/faq">or the FAQ</a>
            </div>
        "#;
        let candidates = keyword_proximity(
            html,
            "https://example.com/",
            &target(),
            &[PolicyType::Refund],
        );
        let returns = candidates.iter().find(|c| c.url.ends_with("/returns")).expect("returns");
        let faq = candidates.iter().find(|c| c.url.ends_with("/faq")).expect("faq");
        assert_eq!(returns.rank, 80);
        assert_eq!(faq.rank, 40);
    }

    #[test]
    fn llm_links_put_footer_first_and_cap() {
        let mut html = String::from("<html><body><main>");
        for i in 0..30 {
            html.push_str(&format!("<a href=\"/p{i}\">Product {i}</a>"));
        }
        html.push_str("</main><footer>");
        for i in 0..40 {
            html.push_str(&format!("<a href=\"/f{i}\">Footer {i}</a>"));
        }
        html.push_str("</footer></body></html>");

        let links = collect_llm_links(&html, "https://example.com/", &target());
        assert_eq!(links.len(), 50);
        assert!(links[..30].iter().all(|l| l.in_footer));
        assert!(links[30..].iter().all(|l| !l.in_footer));
    }

    #[test]
    fn llm_candidates_rank_by_footer_placement() {
        let links = vec![
            LlmLink {
                url: "https://example.com/privacy".into(),
                text: "Privacy".into(),
                in_footer: true,
            },
            LlmLink {
                url: "https://example.com/help".into(),
                text: "Help".into(),
                in_footer: false,
            },
        ];
        let matches = LlmMatches {
            privacy: Some(0),
            refund: Some(1),
            terms: None,
        };
        let candidates = llm_candidates(&matches, &links, &PolicyType::ALL);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].rank, 90);
        assert_eq!(candidates[1].rank, 70);
        assert_eq!(candidates[0].method, DiscoveryMethod::LlmSemantic);
    }
}
