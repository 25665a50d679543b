//! Policy-Link Tools
//!
//! Staged discovery of privacy / refund / terms pages: anchor scan over the
//! homepage artifact, well-known paths, headless re-render, keyword
//! proximity, and LLM semantic matching. Each stage runs only for the types
//! still missing, each candidate goes through the confidence-aware
//! verifier, and the first verified link per type wins.

pub mod patterns;
mod strategies;
mod verify;

pub use strategies::{collect_llm_links, scan_anchors};
pub use verify::{is_high_confidence, path_looks_like_policy, verify_candidate};

use crate::error::Result;
use crate::policy::DomainPolicy;
use crate::services::browser::{BrowserFetchOptions, BrowserFetcher};
use crate::services::fetch::{FetchContext, FetchOptions, PolicyFetcher};
use crate::services::llm::{build_link_prompt, parse_match_response, PolicyLinkLlm, LLM_MAX_TOKENS};
use crate::services::store::{ArtifactKind, ScanStore};
use crate::tools::html::{looks_js_rendered, looks_like_challenge};
use crate::types::{DiscoveredBy, Domain};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Minimum timeout for the homepage acquisition fetch.
const ACQUISITION_TIMEOUT_MS: u64 = 15_000;
/// Candidates kept per type from one anchor scan.
pub const MAX_CANDIDATES_PER_TYPE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyType {
    Privacy,
    Refund,
    Terms,
}

impl PolicyType {
    pub const ALL: [PolicyType; 3] = [PolicyType::Privacy, PolicyType::Refund, PolicyType::Terms];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMethod {
    HomepageHtml,
    CommonPaths,
    ChromiumRender,
    KeywordProximity,
    LlmSemantic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyLinkCandidate {
    pub url: String,
    pub policy_type: PolicyType,
    pub anchor_text: Option<String>,
    pub method: DiscoveryMethod,
    pub rank: i32,
    pub in_footer: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyLinkVerified {
    pub url: String,
    pub policy_type: PolicyType,
    pub anchor_text: Option<String>,
    pub method: DiscoveryMethod,
    pub rank: i32,
    pub in_footer: bool,
    pub discovered_on: String,
    pub verified_ok: bool,
    pub status_code: Option<u16>,
    pub content_type: Option<String>,
    pub verification_notes: Option<String>,
    pub title_snippet: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyLinkSummary {
    pub strategies_attempted: Vec<String>,
    pub candidates_considered: usize,
    pub verified_count: usize,
    pub used_browser: bool,
    pub extracted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct PolicyLinkOutcome {
    pub links: Vec<PolicyLinkVerified>,
    pub summary: PolicyLinkSummary,
}

pub(crate) struct HomepageAcquisition {
    pub(crate) html: String,
    pub(crate) source_url: String,
    pub(crate) used_browser: bool,
}

/// Reuse the stored homepage artifact unless its snippet may have lost the
/// footer to the size cap; refetch (and render) otherwise. Shared with the
/// SKU extractor, which passes its own discovery tags.
pub(crate) async fn acquire_homepage(
    scan_id: &str,
    target_url: &str,
    fetcher: &PolicyFetcher,
    ctx: &FetchContext,
    store: &dyn ScanStore,
    browser: Option<&dyn BrowserFetcher>,
    http_tag: DiscoveredBy,
    browser_tag: DiscoveredBy,
) -> Option<HomepageAcquisition> {
    if let Ok(Some(artifact)) = store.artifact(scan_id, ArtifactKind::HomepageHtml) {
        if !artifact.snippet_near_cap() && artifact.snippet.contains("</html>") {
            return Some(HomepageAcquisition {
                html: artifact.snippet,
                source_url: artifact.url,
                used_browser: false,
            });
        }
    }

    let response = fetcher
        .fetch(
            target_url,
            ctx,
            http_tag,
            &FetchOptions::default()
                .with_timeout_ms(ACQUISITION_TIMEOUT_MS.max(ctx.policy.request_timeout_ms)),
        )
        .await;

    let body = response.body.clone().unwrap_or_default();
    let gated = looks_like_challenge(&body)
        || matches!(response.status_code, Some(403) | Some(503))
        || (looks_js_rendered(&body) && !body.contains("<footer"));

    if gated {
        if let Some(driver) = browser {
            if let Ok(rendered) = driver
                .fetch(scan_id, target_url, browser_tag, &BrowserFetchOptions::full_render())
                .await
            {
                if !rendered.content.is_empty() {
                    return Some(HomepageAcquisition {
                        source_url: rendered.url.unwrap_or_else(|| target_url.to_string()),
                        html: rendered.content,
                        used_browser: true,
                    });
                }
            }
        }
    }

    if body.is_empty() {
        None
    } else {
        Some(HomepageAcquisition {
            html: body,
            source_url: response.final_url,
            used_browser: false,
        })
    }
}

fn missing_types(found: &[PolicyLinkVerified]) -> Vec<PolicyType> {
    PolicyType::ALL
        .into_iter()
        .filter(|t| !found.iter().any(|v| v.policy_type == *t && v.verified_ok))
        .collect()
}

/// Run the five strategies for one scan, verifying as it goes.
pub async fn extract_policy_links(
    scan_id: &str,
    target_url: &str,
    policy: &DomainPolicy,
    store: &dyn ScanStore,
    browser: Option<&dyn BrowserFetcher>,
    llm: Option<&dyn PolicyLinkLlm>,
) -> Result<PolicyLinkOutcome> {
    let (url, domain) = Domain::parse_from_url(target_url)?;
    let origin = url
        .join("/")
        .map_err(|_| crate::error::RiskIntelError::InvalidUrl(target_url.into()))?;

    let ctx = FetchContext::new(scan_id, domain.clone(), policy.clone());
    let fetcher = PolicyFetcher::new()?;

    let mut summary = PolicyLinkSummary::default();
    let mut verified: Vec<PolicyLinkVerified> = Vec::new();

    let acquisition = acquire_homepage(
        scan_id,
        target_url,
        &fetcher,
        &ctx,
        store,
        browser,
        DiscoveredBy::PolicyLinksHomepage,
        DiscoveredBy::PolicyLinksBrowser,
    )
    .await;
    summary.used_browser = acquisition.as_ref().map(|a| a.used_browser).unwrap_or(false);

    // Anchor scan over the acquired homepage.
    if let Some(acq) = &acquisition {
        summary.strategies_attempted.push("homepage_html".into());
        let candidates = strategies::scan_anchors(
            &acq.html,
            &acq.source_url,
            &domain,
            &missing_types(&verified),
            DiscoveryMethod::HomepageHtml,
        );
        summary.candidates_considered += candidates.len();
        verify_batch(&fetcher, &ctx, browser, &acq.source_url, candidates, &mut verified).await;
    }

    // Well-known paths for whatever is still missing.
    let missing = missing_types(&verified);
    if !missing.is_empty() {
        summary.strategies_attempted.push("common_paths".into());
        let candidates = strategies::common_path_candidates(&origin, &missing);
        summary.candidates_considered += candidates.len();
        verify_batch(&fetcher, &ctx, browser, origin.as_str(), candidates, &mut verified).await;
    }

    // Headless render, unless acquisition already rendered.
    let missing = missing_types(&verified);
    if !missing.is_empty() && !summary.used_browser {
        if let Some(driver) = browser {
            summary.strategies_attempted.push("chromium_render".into());
            if let Ok(rendered) = driver
                .fetch(
                    scan_id,
                    target_url,
                    DiscoveredBy::PolicyLinksChromium,
                    &BrowserFetchOptions::full_render(),
                )
                .await
            {
                if !rendered.content.is_empty() {
                    let source = rendered.url.as_deref().unwrap_or(target_url);
                    let candidates = strategies::scan_anchors(
                        &rendered.content,
                        source,
                        &domain,
                        &missing,
                        DiscoveryMethod::ChromiumRender,
                    );
                    summary.candidates_considered += candidates.len();
                    verify_batch(&fetcher, &ctx, browser, source, candidates, &mut verified)
                        .await;
                }
            }
        }
    }

    // Keyword proximity in the homepage DOM.
    let missing = missing_types(&verified);
    if !missing.is_empty() {
        if let Some(acq) = &acquisition {
            summary.strategies_attempted.push("keyword_proximity".into());
            let candidates = strategies::keyword_proximity(
                &acq.html,
                &acq.source_url,
                &domain,
                &missing,
            );
            summary.candidates_considered += candidates.len();
            verify_batch(&fetcher, &ctx, browser, &acq.source_url, candidates, &mut verified)
                .await;
        }
    }

    // LLM semantic match, with browser-first verification.
    let missing = missing_types(&verified);
    if !missing.is_empty() {
        if let (Some(acq), Some(client)) = (&acquisition, llm) {
            summary.strategies_attempted.push("llm_semantic".into());
            let links = strategies::collect_llm_links(&acq.html, &acq.source_url, &domain);
            if !links.is_empty() {
                let prompt = build_link_prompt(&links);
                match client.complete(&prompt, LLM_MAX_TOKENS).await {
                    Ok(reply) => {
                        if let Some(matches) = parse_match_response(&reply, links.len()) {
                            let candidates =
                                strategies::llm_candidates(&matches, &links, &missing);
                            summary.candidates_considered += candidates.len();
                            for candidate in candidates {
                                if !missing_types(&verified).contains(&candidate.policy_type) {
                                    continue;
                                }
                                let result = verify::verify_llm_candidate(
                                    &fetcher,
                                    &ctx,
                                    browser,
                                    &acq.source_url,
                                    candidate,
                                )
                                .await;
                                push_if_first(&mut verified, result);
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "llm semantic strategy failed");
                        ctx.record_error(&format!("llm semantic strategy failed: {e}"));
                    }
                }
            }
        }
    }

    summary.verified_count = verified.iter().filter(|v| v.verified_ok).count();
    summary.extracted_at = Some(Utc::now());

    // Persist only the winners, one per type.
    let winners: Vec<PolicyLinkVerified> =
        verified.iter().filter(|v| v.verified_ok).cloned().collect();
    store.replace_policy_links(scan_id, &winners)?;
    store.append_fetch_logs(scan_id, &ctx.fetch_logs())?;
    store.put_data_point(
        scan_id,
        &domain,
        "policy_links",
        "Verified policy links",
        &json!({ "links": &winners, "summary": &summary }),
        &[target_url.to_string()],
    )?;

    Ok(PolicyLinkOutcome {
        links: winners,
        summary,
    })
}

/// Verify candidates rank-first; stop per type at the first success.
async fn verify_batch(
    fetcher: &PolicyFetcher,
    ctx: &FetchContext,
    browser: Option<&dyn BrowserFetcher>,
    discovered_on: &str,
    mut candidates: Vec<PolicyLinkCandidate>,
    verified: &mut Vec<PolicyLinkVerified>,
) {
    candidates.sort_by(|a, b| b.rank.cmp(&a.rank));
    for candidate in candidates {
        if !missing_types(verified).contains(&candidate.policy_type) {
            continue;
        }
        let result =
            verify::verify_candidate(fetcher, ctx, browser, discovered_on, candidate, true).await;
        push_if_first(verified, result);
    }
}

fn push_if_first(verified: &mut Vec<PolicyLinkVerified>, result: PolicyLinkVerified) {
    if result.verified_ok
        && verified
            .iter()
            .any(|v| v.verified_ok && v.policy_type == result.policy_type)
    {
        return; // a winner already exists for this type
    }
    verified.push(result);
}
