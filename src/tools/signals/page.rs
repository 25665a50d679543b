//! Probes computed from the homepage response itself: redirect behavior,
//! security headers, forms, third-party scripts, and content red-flags.

use super::types::{
    ContentSignals, FormsSignals, HeaderSignals, RedirectSignals, ThirdPartySignals,
};
use crate::selectors::{
    EMAIL_INPUT_SELECTOR, FORM_SELECTOR, PASSWORD_INPUT_SELECTOR, SCRIPT_SELECTOR,
    SUBMIT_SELECTOR,
};
use crate::types::{normalize_hostname, Domain};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use std::collections::HashMap;
use url::Url;

const JS_REDIRECT_SCAN_BYTES: usize = 50 * 1024;
const MAX_EXTERNAL_SCRIPT_DOMAINS: usize = 20;
const LONG_INLINE_SCRIPT_CHARS: usize = 10_000;

static META_REFRESH_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta[^>]+http-equiv\s*=\s*["']?refresh"#).expect("valid regex")
});

static JS_REDIRECT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:window\.)?location(?:\.href)?\s*=|location\.replace\(|location\.assign\(")
        .expect("valid regex")
});

static URGENCY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)urgent|act now|limited time|hurry|last chance|don't miss|ending soon|final hours|today only|while supplies last")
        .expect("valid regex")
});

static EXTREME_DISCOUNT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\d{2,3}%\s*off|free shipping|clearance|closing down|everything must go|lowest price|best deal|flash sale")
        .expect("valid regex")
});

static PAYMENT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)payment|checkout|credit card|debit card|paypal|billing|pay now")
        .expect("valid regex")
});

static IMPERSONATION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(official|authorized|authorised|certified|licensed|genuine)\s+(dealer|seller|retailer|distributor|reseller|partner|store|outlet)")
        .expect("valid regex")
});

/// Compare input and final URLs and scan the body for client-side redirects.
pub fn analyze_redirects(
    input_url: &str,
    final_url: Option<&str>,
    redirect_chain: Vec<String>,
    body: &str,
    target: &Domain,
) -> RedirectSignals {
    let input_host = Url::parse(input_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_default();
    let final_host = final_url
        .and_then(|f| Url::parse(f).ok())
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| input_host.clone());

    // `example.com` and `www.example.com` are the same site.
    let cross_domain_redirect =
        normalize_hostname(&input_host) != normalize_hostname(&final_host);
    let mismatch_input_vs_final_domain = !target.same_site(&final_host);

    let mut scan_end = body.len().min(JS_REDIRECT_SCAN_BYTES);
    while scan_end > 0 && !body.is_char_boundary(scan_end) {
        scan_end -= 1;
    }
    let scan = &body[..scan_end];

    RedirectSignals {
        redirect_chain,
        final_url: final_url.map(|s| s.to_string()),
        cross_domain_redirect,
        mismatch_input_vs_final_domain,
        meta_refresh_present: META_REFRESH_REGEX.is_match(body),
        js_redirect_hint: JS_REDIRECT_REGEX.is_match(scan),
    }
}

/// Presence booleans for the five security headers, over the lowercased
/// homepage response headers.
pub fn analyze_headers(headers: &HashMap<String, String>) -> HeaderSignals {
    HeaderSignals {
        strict_transport_security: headers.contains_key("strict-transport-security"),
        content_security_policy: headers.contains_key("content-security-policy"),
        x_frame_options: headers.contains_key("x-frame-options"),
        x_content_type_options: headers.contains_key("x-content-type-options"),
        referrer_policy: headers.contains_key("referrer-policy"),
    }
}

/// Credential-capture surface: password/email inputs, submit controls, and
/// form actions pointing off-domain.
pub fn analyze_forms(html: &str, target: &Domain) -> FormsSignals {
    let doc = Html::parse_document(html);

    let form_count = doc.select(&FORM_SELECTOR).count();
    let password_input_count = doc.select(&PASSWORD_INPUT_SELECTOR).count();
    let email_input_count = doc.select(&EMAIL_INPUT_SELECTOR).count();
    let has_submit = doc.select(&SUBMIT_SELECTOR).next().is_some();

    let mut external_form_actions = Vec::new();
    for form in doc.select(&FORM_SELECTOR) {
        let Some(action) = form.value().attr("action") else {
            continue;
        };
        let Ok(url) = Url::parse(action) else {
            continue; // relative actions stay on-site
        };
        let Some(host) = url.host_str() else {
            continue;
        };
        if target.same_site(host) {
            continue;
        }
        let host = host.to_ascii_lowercase();
        if !external_form_actions.contains(&host) {
            external_form_actions.push(host);
        }
    }

    FormsSignals {
        form_count,
        password_input_count,
        email_input_count,
        login_form_present: password_input_count > 0 && has_submit,
        external_form_actions,
    }
}

/// Off-domain script sources plus inline-script heuristics.
pub fn analyze_third_party(html: &str, target: &Domain, base_url: &str) -> ThirdPartySignals {
    let doc = Html::parse_document(html);
    let base_scheme = Url::parse(base_url)
        .map(|u| u.scheme().to_string())
        .unwrap_or_else(|_| "https".to_string());

    let mut external_script_domains = Vec::new();
    let mut inline_script_count = 0;
    let mut obfuscation_hint = false;
    let mut eval_atob_hint = false;

    for script in doc.select(&SCRIPT_SELECTOR) {
        match script.value().attr("src") {
            Some(src) => {
                let absolute = if let Some(rest) = src.strip_prefix("//") {
                    format!("{base_scheme}://{rest}")
                } else if src.starts_with("http://") || src.starts_with("https://") {
                    src.to_string()
                } else {
                    continue; // same-origin relative source
                };
                let Some(host) = Url::parse(&absolute)
                    .ok()
                    .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
                else {
                    continue;
                };
                if target.same_site(&host) {
                    continue;
                }
                if !external_script_domains.contains(&host)
                    && external_script_domains.len() < MAX_EXTERNAL_SCRIPT_DOMAINS
                {
                    external_script_domains.push(host);
                }
            }
            None => {
                inline_script_count += 1;
                let body: String = script.text().collect();
                if body.len() > LONG_INLINE_SCRIPT_CHARS {
                    obfuscation_hint = true;
                }
                if body.contains("eval(") || body.contains("atob(") {
                    eval_atob_hint = true;
                }
            }
        }
    }

    ThirdPartySignals {
        external_script_domains,
        inline_script_count,
        obfuscation_hint,
        eval_atob_hint,
    }
}

/// Keyword red-flags over the HTML-stripped text.
pub fn analyze_content(text: &str) -> ContentSignals {
    ContentSignals {
        urgency_score: URGENCY_REGEX.find_iter(text).count(),
        extreme_discount_score: EXTREME_DISCOUNT_REGEX.find_iter(text).count(),
        payment_keyword_hint: PAYMENT_REGEX.is_match(text),
        impersonation_hint: IMPERSONATION_REGEX.is_match(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> Domain {
        Domain::from_raw("example.com")
    }

    #[test]
    fn www_redirect_is_not_cross_domain() {
        let s = analyze_redirects(
            "https://example.com/",
            Some("https://www.example.com/"),
            vec!["https://example.com/".into()],
            "",
            &target(),
        );
        assert!(!s.cross_domain_redirect);
        assert!(!s.mismatch_input_vs_final_domain);
    }

    #[test]
    fn off_domain_redirect_sets_both_flags() {
        let s = analyze_redirects(
            "https://example.com/",
            Some("https://evil.ru/login"),
            vec!["https://example.com/".into()],
            "",
            &target(),
        );
        assert!(s.cross_domain_redirect);
        assert!(s.mismatch_input_vs_final_domain);
    }

    #[test]
    fn subdomain_redirect_changes_host_but_stays_in_family() {
        let s = analyze_redirects(
            "https://example.com/",
            Some("https://shop.example.com/"),
            vec![],
            "",
            &target(),
        );
        assert!(s.cross_domain_redirect);
        assert!(!s.mismatch_input_vs_final_domain);
    }

    #[test]
    fn detects_meta_refresh_and_js_redirects() {
        let html = r#"<meta http-equiv="refresh" content="0; url=https://x.com">"#;
        let s = analyze_redirects("https://example.com/", None, vec![], html, &target());
        assert!(s.meta_refresh_present);

        for snippet in [
            "window.location = 'https://x.com';",
            "location.href = '/next';",
            "location.replace('https://x.com');",
            "location.assign('https://x.com');",
        ] {
            let s = analyze_redirects("https://example.com/", None, vec![], snippet, &target());
            assert!(s.js_redirect_hint, "missed: {snippet}");
        }

        let s = analyze_redirects(
            "https://example.com/",
            None,
            vec![],
            "var allocation = 1;",
            &target(),
        );
        assert!(!s.js_redirect_hint);
    }

    #[test]
    fn js_redirect_scan_is_limited_to_prefix() {
        let mut body = "x".repeat(JS_REDIRECT_SCAN_BYTES);
        body.push_str("location.replace('https://x.com')");
        let s = analyze_redirects("https://example.com/", None, vec![], &body, &target());
        assert!(!s.js_redirect_hint);
    }

    #[test]
    fn header_booleans_follow_presence() {
        let mut headers = HashMap::new();
        headers.insert("strict-transport-security".to_string(), "max-age=63072000".to_string());
        headers.insert("x-frame-options".to_string(), "DENY".to_string());
        let s = analyze_headers(&headers);
        assert!(s.strict_transport_security);
        assert!(s.x_frame_options);
        assert!(!s.content_security_policy);
        assert!(!s.x_content_type_options);
        assert!(!s.referrer_policy);
    }

    #[test]
    fn login_form_requires_password_and_submit() {
        let html = r#"<form action="/login"><input type="password"><button>Sign in</button></form>"#;
        let s = analyze_forms(html, &target());
        assert_eq!(s.password_input_count, 1);
        assert!(s.login_form_present);
        assert!(s.external_form_actions.is_empty());

        let bare = r#"<input type="password">"#;
        let s = analyze_forms(bare, &target());
        assert_eq!(s.password_input_count, 1);
        assert!(!s.login_form_present);
    }

    #[test]
    fn external_form_actions_deduped_first_seen() {
        let html = r#"
            <form action="https://evil.ru/submit"></form>
            <form action="https://evil.ru/other"></form>
            <form action="https://collector.io/f"></form>
            <form action="/local"></form>
            <form action="https://www.example.com/search"></form>
        "#;
        let s = analyze_forms(html, &target());
        assert_eq!(s.external_form_actions, vec!["evil.ru", "collector.io"]);
    }

    #[test]
    fn third_party_scripts_collected_and_capped() {
        let html = r#"
            <script src="https://cdn.vendor.com/a.js"></script>
            <script src="//tracker.net/t.js"></script>
            <script src="/local.js"></script>
            <script src="https://www.example.com/own.js"></script>
            <script src="https://cdn.vendor.com/b.js"></script>
        "#;
        let s = analyze_third_party(html, &target(), "https://example.com/");
        assert_eq!(s.external_script_domains, vec!["cdn.vendor.com", "tracker.net"]);
    }

    #[test]
    fn inline_script_hints() {
        let long = format!("<script>{}</script>", "a".repeat(10_001));
        let s = analyze_third_party(&long, &target(), "https://example.com/");
        assert!(s.obfuscation_hint);
        assert!(!s.eval_atob_hint);

        let evil = "<script>eval(atob('aGk='))</script>";
        let s = analyze_third_party(evil, &target(), "https://example.com/");
        assert!(s.eval_atob_hint);
        assert!(!s.obfuscation_hint);
        assert_eq!(s.inline_script_count, 1);
    }

    #[test]
    fn content_red_flags_count_matches() {
        let text = "URGENT! Act now - limited time offer. 90% off everything, free shipping. \
                    Official authorized dealer. Proceed to checkout.";
        let s = analyze_content(text);
        assert!(s.urgency_score >= 3);
        assert!(s.extreme_discount_score >= 2);
        assert!(s.payment_keyword_hint);
        assert!(s.impersonation_hint);

        let calm = analyze_content("We publish research papers about compilers.");
        assert_eq!(calm.urgency_score, 0);
        assert!(!calm.payment_keyword_hint);
        assert!(!calm.impersonation_hint);
    }
}
