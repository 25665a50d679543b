//! Confidence-aware candidate verification.

use super::patterns::{content_regex, PATH_POLICY_REGEX};
use super::{DiscoveryMethod, PolicyLinkCandidate, PolicyLinkVerified};
use crate::services::browser::{BrowserFetchOptions, BrowserFetcher};
use crate::services::fetch::{FetchContext, FetchOptions, FetchOutcome, PolicyFetcher};
use crate::tools::html::{content_type_is_html, extract_title, looks_like_challenge, strip_tags};
use crate::types::DiscoveredBy;
use url::Url;

const VERIFY_TIMEOUT_MS: u64 = 8_000;

/// Does the URL path alone read as a policy page?
pub fn path_looks_like_policy(url: &str) -> bool {
    Url::parse(url)
        .map(|u| PATH_POLICY_REGEX.is_match(u.path()))
        .unwrap_or_else(|_| PATH_POLICY_REGEX.is_match(url))
}

/// High confidence means the candidate came from rendered HTML (or the
/// model's read of it), not from guessed paths or loose proximity.
pub fn is_high_confidence(candidate: &PolicyLinkCandidate) -> bool {
    candidate.rank >= 70
        && matches!(
            candidate.method,
            DiscoveryMethod::HomepageHtml
                | DiscoveryMethod::ChromiumRender
                | DiscoveryMethod::LlmSemantic
        )
}

fn verdict(
    candidate: &PolicyLinkCandidate,
    discovered_on: &str,
    verified_ok: bool,
    status_code: Option<u16>,
    content_type: Option<String>,
    notes: &str,
    title_snippet: Option<String>,
) -> PolicyLinkVerified {
    PolicyLinkVerified {
        url: candidate.url.clone(),
        policy_type: candidate.policy_type,
        anchor_text: candidate.anchor_text.clone(),
        method: candidate.method,
        rank: candidate.rank,
        in_footer: candidate.in_footer,
        discovered_on: discovered_on.to_string(),
        verified_ok,
        status_code,
        content_type,
        verification_notes: Some(notes.to_string()),
        title_snippet,
    }
}

fn scope_blocked(outcome: &FetchOutcome) -> bool {
    outcome
        .error
        .as_deref()
        .map(|e| e.contains("disallowed domain") || e.contains("not authorized"))
        .unwrap_or(false)
}

/// Verify one candidate per the staged rules: HEAD (GET on transport
/// error), scope check, bot-gate escalation, content-type gate, then the
/// type-specific content or path check over the stripped body.
pub async fn verify_candidate(
    fetcher: &PolicyFetcher,
    ctx: &FetchContext,
    browser: Option<&dyn BrowserFetcher>,
    discovered_on: &str,
    candidate: PolicyLinkCandidate,
    try_browser_fallback: bool,
) -> PolicyLinkVerified {
    let head = fetcher
        .fetch(
            &candidate.url,
            ctx,
            DiscoveredBy::PolicyLinkCheck,
            &FetchOptions::head().with_timeout_ms(VERIFY_TIMEOUT_MS),
        )
        .await;

    let response = if head.status_code.is_none() && !scope_blocked(&head) {
        // HEAD transport failure; some origins only answer GET.
        fetcher
            .fetch(
                &candidate.url,
                ctx,
                DiscoveredBy::PolicyLinkCheck,
                &FetchOptions::default().with_timeout_ms(VERIFY_TIMEOUT_MS),
            )
            .await
    } else {
        head
    };

    if scope_blocked(&response) {
        return verdict(
            &candidate,
            discovered_on,
            false,
            response.status_code,
            None,
            "final URL out of scope",
            None,
        );
    }

    let Some(status) = response.status_code else {
        let reason = response.error.as_deref().unwrap_or("request failed");
        return verdict(&candidate, discovered_on, false, None, None, reason, None);
    };

    if status == 403 || status == 503 {
        return escalate(
            ctx,
            browser,
            discovered_on,
            candidate,
            status,
            try_browser_fallback,
        )
        .await;
    }

    if !(200..400).contains(&status) {
        return verdict(
            &candidate,
            discovered_on,
            false,
            Some(status),
            response.content_type().map(|s| s.to_string()),
            &format!("status {status}"),
            None,
        );
    }

    if let Some(ct) = response.content_type() {
        if !content_type_is_html(Some(ct)) {
            return verdict(
                &candidate,
                discovered_on,
                false,
                Some(status),
                Some(ct.to_string()),
                "non-HTML content type",
                None,
            );
        }
    }

    // HEAD carries no body; fetch the final URL for the content check.
    let body_response = if response.body.is_some() {
        response
    } else {
        fetcher
            .fetch(
                &response.final_url,
                ctx,
                DiscoveredBy::PolicyLinkCheck,
                &FetchOptions::default().with_timeout_ms(VERIFY_TIMEOUT_MS),
            )
            .await
    };

    let Some(body) = body_response.body.clone() else {
        let reason = body_response
            .error
            .as_deref()
            .unwrap_or("empty body")
            .to_string();
        return verdict(&candidate, discovered_on, false, Some(status), None, &reason, None);
    };

    if looks_like_challenge(&body) {
        return escalate(
            ctx,
            browser,
            discovered_on,
            candidate,
            status,
            try_browser_fallback,
        )
        .await;
    }

    let content_type = body_response.content_type().map(|s| s.to_string());
    let title_snippet = extract_title(&body);
    let text = strip_tags(&body);

    if content_regex(candidate.policy_type).is_match(&text) {
        return verdict(
            &candidate,
            discovered_on,
            true,
            body_response.status_code.or(Some(status)),
            content_type,
            "content matched",
            title_snippet,
        );
    }
    if path_looks_like_policy(&body_response.final_url) {
        return verdict(
            &candidate,
            discovered_on,
            true,
            body_response.status_code.or(Some(status)),
            content_type,
            "path looks like policy",
            title_snippet,
        );
    }
    verdict(
        &candidate,
        discovered_on,
        false,
        body_response.status_code.or(Some(status)),
        content_type,
        "content did not match",
        title_snippet,
    )
}

/// Bot-gated candidate: only high-confidence candidates earn a browser
/// look, and only policy-looking paths survive a browser failure.
async fn escalate(
    ctx: &FetchContext,
    browser: Option<&dyn BrowserFetcher>,
    discovered_on: &str,
    candidate: PolicyLinkCandidate,
    status: u16,
    try_browser_fallback: bool,
) -> PolicyLinkVerified {
    let high_confidence = is_high_confidence(&candidate);
    let path_ok = path_looks_like_policy(&candidate.url);

    if high_confidence && try_browser_fallback {
        if let Some(driver) = browser {
            match driver
                .fetch(
                    &ctx.scan_id,
                    &candidate.url,
                    DiscoveredBy::PolicyLinkBrowserVerify,
                    &BrowserFetchOptions::default(),
                )
                .await
            {
                Ok(rendered) if !rendered.content.is_empty() => {
                    let text = strip_tags(&rendered.content);
                    let title_snippet = extract_title(&rendered.content);
                    if content_regex(candidate.policy_type).is_match(&text) || path_ok {
                        return verdict(
                            &candidate,
                            discovered_on,
                            true,
                            rendered.status_code.or(Some(status)),
                            rendered.content_type,
                            "verified via browser",
                            title_snippet,
                        );
                    }
                    return verdict(
                        &candidate,
                        discovered_on,
                        false,
                        rendered.status_code.or(Some(status)),
                        rendered.content_type,
                        "browser content did not match",
                        title_snippet,
                    );
                }
                _ => {
                    if path_ok {
                        return verdict(
                            &candidate,
                            discovered_on,
                            true,
                            Some(status),
                            None,
                            "browser unavailable; path looks like policy",
                            None,
                        );
                    }
                }
            }
        } else if path_ok {
            // No driver configured; the path check is all we have.
            return verdict(
                &candidate,
                discovered_on,
                true,
                Some(status),
                None,
                "browser unavailable; path looks like policy",
                None,
            );
        }
    }

    verdict(
        &candidate,
        discovered_on,
        false,
        Some(status),
        None,
        &format!("bot protection (status {status})"),
        None,
    )
}

/// LLM candidates verify browser-first; the plain verifier runs once, with
/// no further browser fallback, only when the browser pass rejects.
pub async fn verify_llm_candidate(
    fetcher: &PolicyFetcher,
    ctx: &FetchContext,
    browser: Option<&dyn BrowserFetcher>,
    discovered_on: &str,
    candidate: PolicyLinkCandidate,
) -> PolicyLinkVerified {
    if let Some(driver) = browser {
        if let Ok(rendered) = driver
            .fetch(
                &ctx.scan_id,
                &candidate.url,
                DiscoveredBy::PolicyLinkBrowserVerify,
                &BrowserFetchOptions::default(),
            )
            .await
        {
            if !rendered.content.is_empty() {
                let text = strip_tags(&rendered.content);
                if content_regex(candidate.policy_type).is_match(&text)
                    || path_looks_like_policy(&candidate.url)
                {
                    let title_snippet = extract_title(&rendered.content);
                    return verdict(
                        &candidate,
                        discovered_on,
                        true,
                        rendered.status_code,
                        rendered.content_type,
                        "verified via browser",
                        title_snippet,
                    );
                }
            }
        }
    }
    verify_candidate(fetcher, ctx, browser, discovered_on, candidate, false).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::policy_links::PolicyType;

    fn candidate(method: DiscoveryMethod, rank: i32) -> PolicyLinkCandidate {
        PolicyLinkCandidate {
            url: "https://example.com/privacy-policy".into(),
            policy_type: PolicyType::Privacy,
            anchor_text: Some("Privacy".into()),
            method,
            rank,
            in_footer: true,
        }
    }

    #[test]
    fn high_confidence_needs_rank_and_rendered_method() {
        assert!(is_high_confidence(&candidate(DiscoveryMethod::HomepageHtml, 70)));
        assert!(is_high_confidence(&candidate(DiscoveryMethod::ChromiumRender, 170)));
        assert!(is_high_confidence(&candidate(DiscoveryMethod::LlmSemantic, 90)));
        assert!(!is_high_confidence(&candidate(DiscoveryMethod::HomepageHtml, 69)));
        assert!(!is_high_confidence(&candidate(DiscoveryMethod::CommonPaths, 100)));
        assert!(!is_high_confidence(&candidate(DiscoveryMethod::KeywordProximity, 80)));
    }

    #[test]
    fn policy_paths_are_recognized() {
        for url in [
            "https://example.com/privacy-policy",
            "https://example.com/legal/tos",
            "https://example.com/pages/refund-policy",
            "https://example.com/conditions-generales",
        ] {
            assert!(path_looks_like_policy(url), "missed {url}");
        }
        assert!(!path_looks_like_policy("https://example.com/products/red-shoe"));
        // Query strings do not make a policy path.
        assert!(!path_looks_like_policy("https://example.com/search?q=privacy"));
    }
}
