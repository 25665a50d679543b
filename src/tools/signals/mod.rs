//! Signal Tools
//!
//! The probe pipeline behind one `collect_signals` call: reachability
//! first, then the independent probes fanned out, browser escalation when
//! the homepage looks bot-gated, and finally artifact + log persistence.

mod emit;
mod net;
mod page;
mod pages;
mod robots;
pub mod types;

pub use emit::emit_signal_logs;
pub use net::{probe_dns, probe_tls};
pub use page::{
    analyze_content, analyze_forms, analyze_headers, analyze_redirects, analyze_third_party,
};
pub use pages::{probe_policy_pages, WELL_KNOWN_PATHS};
pub use robots::{parse_robots, probe_robots_and_sitemaps, MAX_SITEMAP_FETCHES};
pub use types::*;

use crate::error::Result;
use crate::policy::{validate_policy, DomainPolicy};
use crate::services::browser::{BrowserFetchOptions, BrowserFetcher};
use crate::services::fetch::{FetchContext, FetchOptions, PolicyFetcher};
use crate::services::store::{ArtifactKind, ScanArtifact, ScanStore};
use crate::tools::html::{extract_title, looks_like_challenge, strip_tags, word_count};
use crate::tools::registrar;
use crate::types::{DiscoveredBy, Domain};
use chrono::Utc;
use serde_json::json;

pub struct CollectOutcome {
    pub signals: DomainIntelSignals,
    /// The homepage body the downstream extractors should see (rendered
    /// when escalation succeeded).
    pub homepage_html: Option<String>,
    pub urls_checked: Vec<String>,
    pub errors: Vec<String>,
}

pub async fn collect_signals(
    scan_id: &str,
    target_url: &str,
    policy: &DomainPolicy,
    store: &dyn ScanStore,
    browser: Option<&dyn BrowserFetcher>,
) -> Result<CollectOutcome> {
    validate_policy(policy)?;
    let (url, domain) = Domain::parse_from_url(target_url)?;
    let origin = url.join("/").map_err(|_| crate::error::RiskIntelError::InvalidUrl(target_url.into()))?;

    let ctx = FetchContext::new(scan_id, domain.clone(), policy.clone());
    let fetcher = PolicyFetcher::new()?;

    // Reachability first; everything page-derived hangs off this response.
    let home = fetcher
        .fetch(
            target_url,
            &ctx,
            DiscoveredBy::RiskIntelHomepage,
            &FetchOptions::default(),
        )
        .await;

    let mut body = home.body.clone().unwrap_or_default();
    let mut reachability = ReachabilitySignals {
        is_active: home.ok,
        status_code: home.status_code,
        content_type: home.content_type().map(|s| s.to_string()),
        latency_ms: Some(home.latency_ms),
        bytes: Some(home.bytes),
        fetch_error: home.error.clone(),
        ..Default::default()
    };

    // Independent probes in parallel. Policy pages wait for robots because
    // they honor its disallow list.
    let (dns, tls, robots_out, rdap) = tokio::join!(
        net::probe_dns(&domain.0),
        net::probe_tls(&domain.0),
        robots::probe_robots_and_sitemaps(&fetcher, &ctx, &origin),
        registrar::lookup(&domain.0),
    );
    let policy_pages =
        pages::probe_policy_pages(&fetcher, &ctx, &origin, &robots_out.disallowed_paths).await;

    // Bot-protection flag is decided on the plain HTTP response and kept
    // even when the browser later succeeds.
    reachability.bot_protection_detected = matches!(home.status_code, Some(403) | Some(503))
        || looks_like_challenge(&body);

    let wants_escalation = dns.dns_ok
        && tls.https_ok
        && (home.status_code == Some(403) || !reachability.is_active);
    if wants_escalation {
        if let Some(driver) = browser {
            tracing::debug!(domain = %domain, "escalating reachability to browser");
            match driver
                .fetch(
                    scan_id,
                    target_url,
                    DiscoveredBy::ReachabilityFallback,
                    &BrowserFetchOptions::reachability_fallback(),
                )
                .await
            {
                Ok(rendered) if !rendered.content.is_empty() => {
                    reachability.is_active = true;
                    reachability.status_code = rendered.status_code.or(Some(200));
                    reachability.content_type =
                        rendered.content_type.clone().or(reachability.content_type);
                    reachability.latency_ms =
                        rendered.fetch_duration_ms.or(reachability.latency_ms);
                    reachability.bytes =
                        Some(rendered.content_length.unwrap_or(rendered.content.len()));
                    body = rendered.content;
                }
                Ok(_) => ctx.record_error("browser fallback returned empty content"),
                Err(e) => ctx.record_error(&format!("browser fallback failed: {e}")),
            }
        }
    }

    let text = strip_tags(&body);
    reachability.homepage_text_word_count = word_count(&text);
    reachability.html_title = extract_title(&body);

    let redirects = analyze_redirects(
        target_url,
        Some(home.final_url.as_str()),
        home.redirect_chain.clone(),
        &body,
        &domain,
    );
    let headers = analyze_headers(&home.headers);
    let forms = analyze_forms(&body, &domain);
    let third_party = analyze_third_party(&body, &domain, &home.final_url);
    let content = analyze_content(&text);

    let signals = DomainIntelSignals {
        schema_version: SCHEMA_VERSION,
        collected_at: Utc::now(),
        target_url: target_url.to_string(),
        target_domain: domain.0.clone(),
        reachability,
        redirects,
        dns,
        tls,
        headers,
        robots_sitemap: robots_out.signals,
        policy_pages,
        forms,
        third_party,
        content,
        rdap,
    };

    // Both homepage artifacts land together (rendered body when escalation
    // rewrote it).
    if !body.is_empty() {
        let html_artifact = ScanArtifact::new(
            ArtifactKind::HomepageHtml,
            &home.final_url,
            &body,
            signals.reachability.content_type.as_deref(),
        );
        let text_artifact =
            ScanArtifact::new(ArtifactKind::HomepageText, &home.final_url, &text, None);
        store.put_homepage_artifacts(scan_id, Some(html_artifact), Some(text_artifact))?;
    }

    ctx.log_signals(emit_signal_logs(&signals, &home.final_url));

    store.append_fetch_logs(scan_id, &ctx.fetch_logs())?;
    store.append_signal_logs(scan_id, &ctx.signal_logs())?;
    store.put_data_point(
        scan_id,
        &domain,
        "domain_intel_signals",
        "Domain intel signals",
        &json!(&signals),
        &[target_url.to_string()],
    )?;

    Ok(CollectOutcome {
        homepage_html: if body.is_empty() { None } else { Some(body) },
        urls_checked: ctx.urls_checked(),
        errors: ctx.errors(),
        signals,
    })
}
