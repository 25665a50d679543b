//! Pipeline Runner
//!
//! Orders the subsystems for one scan (signals, policy links, SKUs,
//! scoring) and guarantees the caller always gets an assessment back,
//! even when everything upstream failed.

use crate::error::{Result, RiskIntelError};
use crate::policy::{validate_policy, DomainPolicy};
use crate::services::browser::BrowserFetcher;
use crate::services::llm::PolicyLinkLlm;
use crate::services::store::ScanStore;
use crate::tools::policy_links::{extract_policy_links, PolicyLinkVerified};
use crate::tools::score::{
    failed_assessment, score_assessment, AiContentLikelihood, ContactDetails, RiskAssessment,
    ScoreInputs,
};
use crate::tools::signals::{collect_signals, DomainIntelSignals};
use crate::tools::skus::extract_homepage_skus;
use crate::types::Domain;
use serde_json::json;

#[derive(Default)]
pub struct PipelineComponents<'a> {
    pub browser: Option<&'a dyn BrowserFetcher>,
    pub llm: Option<&'a dyn PolicyLinkLlm>,
}

#[derive(Debug)]
pub struct PipelineOutcome {
    pub assessment: RiskAssessment,
    pub signals: Option<DomainIntelSignals>,
    pub policy_links: Vec<PolicyLinkVerified>,
    pub skus_detected: usize,
    pub error: Option<String>,
}

/// Give a bare hostname an https scheme; anything with a non-http scheme
/// is rejected outright.
pub fn normalize_target_url(raw: &str) -> Result<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(RiskIntelError::InvalidUrl(raw.into()));
    }
    if raw.starts_with("http://") || raw.starts_with("https://") {
        return Ok(raw.to_string());
    }
    if raw.contains("://") {
        return Err(RiskIntelError::InvalidUrl(raw.into()));
    }
    Ok(format!("https://{raw}"))
}

/// The outermost wrapper never raises: every failure becomes a
/// failed-assessment outcome.
pub async fn run_risk_intel_pipeline(
    scan_id: &str,
    url: &str,
    store: &dyn ScanStore,
    components: &PipelineComponents<'_>,
) -> PipelineOutcome {
    match run_inner(scan_id, url, store, components).await {
        Ok(outcome) => outcome,
        Err(e) => {
            let message = e.to_string();
            tracing::warn!(scan_id, error = %message, "pipeline failed");
            PipelineOutcome {
                assessment: failed_assessment(&message),
                signals: None,
                policy_links: Vec::new(),
                skus_detected: 0,
                error: Some(message),
            }
        }
    }
}

async fn run_inner(
    scan_id: &str,
    url: &str,
    store: &dyn ScanStore,
    components: &PipelineComponents<'_>,
) -> Result<PipelineOutcome> {
    let target_url = normalize_target_url(url)?;
    let (_, domain) = Domain::parse_from_url(&target_url)?;

    let mut policy = DomainPolicy::default();
    if let Some(stored) = store.domain_override(&domain)? {
        policy = policy.with_override(&stored);
    }
    validate_policy(&policy)?;

    let collected =
        collect_signals(scan_id, &target_url, &policy, store, components.browser).await?;
    let mut signals = collected.signals;

    // Policy links and SKUs run on partial data; their failures downgrade
    // to warnings rather than failing the scan.
    let policy_links = match extract_policy_links(
        scan_id,
        &target_url,
        &policy,
        store,
        components.browser,
        components.llm,
    )
    .await
    {
        Ok(outcome) => outcome.links,
        Err(e) => {
            tracing::warn!(scan_id, error = %e, "policy link extraction failed");
            Vec::new()
        }
    };

    let skus_detected = match extract_homepage_skus(
        scan_id,
        &target_url,
        &policy,
        store,
        components.browser,
    )
    .await
    {
        Ok(outcome) => outcome.items.len(),
        Err(e) => {
            tracing::warn!(scan_id, error = %e, "sku extraction failed");
            0
        }
    };

    // The orchestrator may have reached the site through its own browser
    // pipeline after our probe failed. Honor that only when the persisted
    // row carries a status code (the freshness marker).
    if let Some(row) = store.scan_row(scan_id)? {
        let persisted_active =
            row.is_active.unwrap_or(false) || row.domain_is_active.unwrap_or(false);
        let persisted_status = row.status_code.or(row.domain_status_code);
        if persisted_active {
            if let Some(status) = persisted_status {
                signals.reachability.is_active = true;
                signals.reachability.status_code = Some(status);
            }
        }
    }

    let contact = store
        .data_point(scan_id, "contact_details")?
        .and_then(|v| ContactDetails::from_value(&v));
    let ai_content = store
        .data_point(scan_id, "ai_generated_likelihood")?
        .and_then(|v| AiContentLikelihood::from_value(&v));

    let mut urls_checked: Vec<String> = Vec::new();
    for entry in store.fetch_logs(scan_id)? {
        if entry.allowed_by_policy && !urls_checked.contains(&entry.url) {
            urls_checked.push(entry.url);
        }
    }

    let assessment = score_assessment(&ScoreInputs {
        signals: &signals,
        policy_links: &policy_links,
        contact,
        ai_content,
        urls_checked,
    });

    store.put_data_point(
        scan_id,
        &domain,
        "domain_risk_assessment",
        "Domain risk assessment",
        &json!(&assessment),
        &[target_url.clone()],
    )?;

    Ok(PipelineOutcome {
        assessment,
        signals: Some(signals),
        policy_links,
        skus_detected,
        error: None,
    })
}
