//! Typed signal-log emission.
//!
//! Every probe outcome becomes a [`SignalLogEntry`]; the severity table
//! below decides which ones are raised above `info`.

use super::types::DomainIntelSignals;
use crate::types::{Severity, SignalLogEntry};
use serde_json::json;

fn sev(flag: bool, raised: Severity) -> Severity {
    if flag {
        raised
    } else {
        Severity::Info
    }
}

/// Build the full signal-log set for one collected aggregate. Emission
/// order is deterministic: category by category, fields in struct order.
pub fn emit_signal_logs(signals: &DomainIntelSignals, evidence_url: &str) -> Vec<SignalLogEntry> {
    let mut out = Vec::new();
    let url = evidence_url;

    // reachability
    let r = &signals.reachability;
    out.push(SignalLogEntry::boolean("reachability", "is_active", r.is_active).with_evidence(url));
    if let Some(status) = r.status_code {
        out.push(SignalLogEntry::number("reachability", "status_code", status as f64));
    }
    out.push(
        SignalLogEntry::number(
            "reachability",
            "homepage_text_word_count",
            r.homepage_text_word_count as f64,
        )
        .with_severity(sev(r.homepage_text_word_count < 150, Severity::Warning)),
    );
    if let Some(title) = &r.html_title {
        out.push(SignalLogEntry::string("reachability", "html_title", title));
    }
    out.push(
        SignalLogEntry::boolean(
            "reachability",
            "bot_protection_detected",
            r.bot_protection_detected,
        )
        .with_severity(sev(r.bot_protection_detected, Severity::RiskHint))
        .with_evidence(url),
    );

    // redirects
    let rd = &signals.redirects;
    out.push(
        SignalLogEntry::number("redirects", "redirect_chain_length", rd.redirect_chain.len() as f64)
            .with_severity(sev(rd.redirect_chain.len() > 3, Severity::Warning)),
    );
    out.push(
        SignalLogEntry::boolean("redirects", "cross_domain_redirect", rd.cross_domain_redirect)
            .with_severity(sev(rd.cross_domain_redirect, Severity::RiskHint))
            .with_evidence(rd.final_url.as_deref().unwrap_or(url)),
    );
    out.push(
        SignalLogEntry::boolean(
            "redirects",
            "mismatch_input_vs_final_domain",
            rd.mismatch_input_vs_final_domain,
        )
        .with_severity(sev(rd.mismatch_input_vs_final_domain, Severity::RiskHint)),
    );
    out.push(
        SignalLogEntry::boolean("redirects", "meta_refresh_present", rd.meta_refresh_present)
            .with_severity(sev(rd.meta_refresh_present, Severity::Warning)),
    );
    out.push(
        SignalLogEntry::boolean("redirects", "js_redirect_hint", rd.js_redirect_hint)
            .with_severity(sev(rd.js_redirect_hint, Severity::Warning)),
    );

    // dns
    let d = &signals.dns;
    out.push(
        SignalLogEntry::boolean("dns", "dns_ok", d.dns_ok)
            .with_severity(sev(!d.dns_ok, Severity::RiskHint)),
    );
    out.push(SignalLogEntry::number("dns", "a_count", d.a_count as f64));
    out.push(SignalLogEntry::number("dns", "aaaa_count", d.aaaa_count as f64));
    out.push(SignalLogEntry::number("dns", "ns_count", d.ns_count as f64));
    out.push(
        SignalLogEntry::boolean("dns", "mx_present", d.mx_present)
            .with_severity(sev(!d.mx_present, Severity::Warning)),
    );

    // tls
    let t = &signals.tls;
    out.push(
        SignalLogEntry::boolean("tls", "https_ok", t.https_ok)
            .with_severity(sev(!t.https_ok, Severity::RiskHint)),
    );
    if let Some(issuer) = &t.issuer {
        out.push(SignalLogEntry::string("tls", "issuer", issuer));
    }
    if let Some(days) = t.days_to_expiry {
        out.push(
            SignalLogEntry::number("tls", "days_to_expiry", days as f64)
                .with_severity(sev(t.expiring_soon, Severity::Warning)),
        );
    }

    // headers: any missing header is a warning
    let h = &signals.headers;
    for (name, present) in [
        ("strict_transport_security", h.strict_transport_security),
        ("content_security_policy", h.content_security_policy),
        ("x_frame_options", h.x_frame_options),
        ("x_content_type_options", h.x_content_type_options),
        ("referrer_policy", h.referrer_policy),
    ] {
        out.push(
            SignalLogEntry::boolean("headers", name, present)
                .with_severity(sev(!present, Severity::Warning))
                .with_evidence(url),
        );
    }

    // robots & sitemaps
    let rs = &signals.robots_sitemap;
    out.push(SignalLogEntry::boolean("robots_sitemap", "robots_found", rs.robots_found));
    out.push(SignalLogEntry::number(
        "robots_sitemap",
        "disallow_count",
        rs.disallow_count as f64,
    ));
    out.push(SignalLogEntry::boolean("robots_sitemap", "sitemap_found", rs.sitemap_found));
    out.push(SignalLogEntry::number(
        "robots_sitemap",
        "sitemap_url_count",
        rs.sitemap_url_count as f64,
    ));

    // policy pages
    let found: Vec<&str> = signals
        .policy_pages
        .page_exists
        .iter()
        .filter(|(_, probe)| probe.exists)
        .map(|(path, _)| path.as_str())
        .collect();
    out.push(SignalLogEntry::json("policy_pages", "pages_found", json!(found)));
    out.push(SignalLogEntry::number(
        "policy_pages",
        "pages_checked",
        signals.policy_pages.checked_count() as f64,
    ));

    // forms
    let f = &signals.forms;
    out.push(
        SignalLogEntry::number("forms", "password_input_count", f.password_input_count as f64)
            .with_severity(sev(f.password_input_count > 0, Severity::Warning)),
    );
    out.push(
        SignalLogEntry::boolean("forms", "login_form_present", f.login_form_present)
            .with_severity(sev(f.login_form_present, Severity::Warning)),
    );
    out.push(
        SignalLogEntry::json("forms", "external_form_actions", json!(f.external_form_actions))
            .with_severity(sev(!f.external_form_actions.is_empty(), Severity::RiskHint)),
    );

    // third-party scripts
    let tp = &signals.third_party;
    out.push(
        SignalLogEntry::json(
            "third_party",
            "external_script_domains",
            json!(tp.external_script_domains),
        )
        .with_severity(sev(tp.external_script_domains.len() > 10, Severity::Warning)),
    );
    out.push(
        SignalLogEntry::boolean("third_party", "obfuscation_hint", tp.obfuscation_hint)
            .with_severity(sev(tp.obfuscation_hint, Severity::RiskHint)),
    );
    out.push(
        SignalLogEntry::boolean("third_party", "eval_atob_hint", tp.eval_atob_hint)
            .with_severity(sev(tp.eval_atob_hint, Severity::RiskHint)),
    );

    // content
    let c = &signals.content;
    out.push(
        SignalLogEntry::number("content", "urgency_score", c.urgency_score as f64)
            .with_severity(sev(c.urgency_score > 5, Severity::Warning)),
    );
    out.push(
        SignalLogEntry::number("content", "extreme_discount_score", c.extreme_discount_score as f64)
            .with_severity(sev(c.extreme_discount_score > 5, Severity::Warning)),
    );
    out.push(SignalLogEntry::boolean(
        "content",
        "payment_keyword_hint",
        c.payment_keyword_hint,
    ));
    out.push(
        SignalLogEntry::boolean("content", "impersonation_hint", c.impersonation_hint)
            .with_severity(sev(c.impersonation_hint, Severity::Warning)),
    );

    // registrar
    let reg = &signals.rdap;
    out.push(
        SignalLogEntry::boolean("rdap", "rdap_available", reg.rdap_available)
            .with_severity(sev(!reg.rdap_available, Severity::Warning)),
    );
    if let Some(registrar) = &reg.registrar {
        out.push(SignalLogEntry::string("rdap", "registrar", registrar));
    }
    if let Some(days) = reg.domain_age_days {
        out.push(
            SignalLogEntry::number("rdap", "domain_age_days", days as f64)
                .with_severity(sev(days < 90, Severity::RiskHint)),
        );
    }
    if let Some(years) = reg.domain_age_years {
        out.push(
            SignalLogEntry::number("rdap", "domain_age_years", years)
                .with_severity(sev(years < 1.0, Severity::Warning)),
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::registrar::RegistrarInfo;
    use crate::tools::signals::types::*;
    use chrono::Utc;

    fn baseline() -> DomainIntelSignals {
        DomainIntelSignals {
            schema_version: SCHEMA_VERSION,
            collected_at: Utc::now(),
            target_url: "https://example.com/".into(),
            target_domain: "example.com".into(),
            reachability: ReachabilitySignals {
                is_active: true,
                status_code: Some(200),
                homepage_text_word_count: 800,
                ..Default::default()
            },
            redirects: RedirectSignals::default(),
            dns: DnsSignals {
                dns_ok: true,
                a_count: 1,
                mx_present: true,
                mx_count: 1,
                ..Default::default()
            },
            tls: TlsSignals {
                https_ok: true,
                days_to_expiry: Some(200),
                ..Default::default()
            },
            headers: HeaderSignals {
                strict_transport_security: true,
                content_security_policy: true,
                x_frame_options: true,
                x_content_type_options: true,
                referrer_policy: true,
            },
            robots_sitemap: RobotsSitemapSignals::default(),
            policy_pages: PolicyPagesSignals::default(),
            forms: FormsSignals::default(),
            third_party: ThirdPartySignals::default(),
            content: ContentSignals::default(),
            rdap: RegistrarInfo {
                rdap_available: true,
                domain_age_days: Some(2000),
                domain_age_years: Some(5.5),
                ..Default::default()
            },
        }
    }

    fn find<'a>(logs: &'a [SignalLogEntry], category: &str, name: &str) -> &'a SignalLogEntry {
        logs.iter()
            .find(|e| e.category == category && e.name == name)
            .unwrap_or_else(|| panic!("missing {category}.{name}"))
    }

    #[test]
    fn clean_site_emits_only_info() {
        let logs = emit_signal_logs(&baseline(), "https://example.com/");
        assert!(logs.iter().all(|e| e.severity == Severity::Info), "{:?}",
            logs.iter().filter(|e| e.severity != Severity::Info).collect::<Vec<_>>());
    }

    #[test]
    fn missing_headers_warn_individually() {
        let mut signals = baseline();
        signals.headers.content_security_policy = false;
        signals.headers.referrer_policy = false;
        let logs = emit_signal_logs(&signals, "https://example.com/");
        assert_eq!(
            find(&logs, "headers", "content_security_policy").severity,
            Severity::Warning
        );
        assert_eq!(find(&logs, "headers", "referrer_policy").severity, Severity::Warning);
        assert_eq!(
            find(&logs, "headers", "strict_transport_security").severity,
            Severity::Info
        );
    }

    #[test]
    fn risky_signals_raise_risk_hints() {
        let mut signals = baseline();
        signals.redirects.cross_domain_redirect = true;
        signals.dns.dns_ok = false;
        signals.forms.external_form_actions = vec!["evil.ru".into()];
        signals.third_party.eval_atob_hint = true;
        signals.rdap.domain_age_days = Some(30);
        let logs = emit_signal_logs(&signals, "https://example.com/");
        assert_eq!(
            find(&logs, "redirects", "cross_domain_redirect").severity,
            Severity::RiskHint
        );
        assert_eq!(find(&logs, "dns", "dns_ok").severity, Severity::RiskHint);
        assert_eq!(
            find(&logs, "forms", "external_form_actions").severity,
            Severity::RiskHint
        );
        assert_eq!(
            find(&logs, "third_party", "eval_atob_hint").severity,
            Severity::RiskHint
        );
        assert_eq!(find(&logs, "rdap", "domain_age_days").severity, Severity::RiskHint);
    }

    #[test]
    fn chain_over_three_hops_warns() {
        let mut signals = baseline();
        signals.redirects.redirect_chain =
            (0..4).map(|i| format!("https://example.com/{i}")).collect();
        let logs = emit_signal_logs(&signals, "https://example.com/");
        assert_eq!(
            find(&logs, "redirects", "redirect_chain_length").severity,
            Severity::Warning
        );
    }

    #[test]
    fn thin_page_and_young_domain_warn() {
        let mut signals = baseline();
        signals.reachability.homepage_text_word_count = 40;
        signals.rdap.domain_age_years = Some(0.3);
        signals.rdap.domain_age_days = Some(110);
        let logs = emit_signal_logs(&signals, "https://example.com/");
        assert_eq!(
            find(&logs, "reachability", "homepage_text_word_count").severity,
            Severity::Warning
        );
        assert_eq!(find(&logs, "rdap", "domain_age_years").severity, Severity::Warning);
        // 110 days is past the 90-day risk window.
        assert_eq!(find(&logs, "rdap", "domain_age_days").severity, Severity::Info);
    }
}
