use crate::tools::registrar::RegistrarInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SCHEMA_VERSION: u32 = 1;

/// The aggregate produced by one `collect_signals` run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainIntelSignals {
    pub schema_version: u32,
    pub collected_at: DateTime<Utc>,
    pub target_url: String,
    pub target_domain: String,
    pub reachability: ReachabilitySignals,
    pub redirects: RedirectSignals,
    pub dns: DnsSignals,
    pub tls: TlsSignals,
    pub headers: HeaderSignals,
    pub robots_sitemap: RobotsSitemapSignals,
    pub policy_pages: PolicyPagesSignals,
    pub forms: FormsSignals,
    pub third_party: ThirdPartySignals,
    pub content: ContentSignals,
    pub rdap: RegistrarInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReachabilitySignals {
    pub is_active: bool,
    pub status_code: Option<u16>,
    pub content_type: Option<String>,
    pub latency_ms: Option<u64>,
    pub bytes: Option<usize>,
    pub homepage_text_word_count: usize,
    pub html_title: Option<String>,
    pub bot_protection_detected: bool,
    pub fetch_error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedirectSignals {
    pub redirect_chain: Vec<String>,
    pub final_url: Option<String>,
    /// The `www.`-normalized hostname changed between input and final URL.
    pub cross_domain_redirect: bool,
    /// The final hostname left the target domain family entirely.
    pub mismatch_input_vs_final_domain: bool,
    pub meta_refresh_present: bool,
    pub js_redirect_hint: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DnsSignals {
    pub dns_ok: bool,
    pub a_count: usize,
    pub aaaa_count: usize,
    pub ns_count: usize,
    pub mx_count: usize,
    pub mx_present: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsSignals {
    pub https_ok: bool,
    pub issuer: Option<String>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub days_to_expiry: Option<i64>,
    pub expiring_soon: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeaderSignals {
    pub strict_transport_security: bool,
    pub content_security_policy: bool,
    pub x_frame_options: bool,
    pub x_content_type_options: bool,
    pub referrer_policy: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RobotsSitemapSignals {
    pub robots_found: bool,
    pub robots_status: Option<u16>,
    /// `Disallow:` lines inside the `User-agent: *` block.
    pub disallow_count: usize,
    pub sitemaps_declared: Vec<String>,
    pub sitemap_found: bool,
    pub sitemap_url_count: usize,
    pub sitemaps_fetched: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageProbe {
    pub exists: bool,
    pub status: Option<u16>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyPagesSignals {
    pub page_exists: BTreeMap<String, PageProbe>,
    /// First 500 chars of stripped body for privacy/terms/contact pages.
    pub snippets: BTreeMap<String, String>,
}

impl PolicyPagesSignals {
    pub fn checked_count(&self) -> usize {
        self.page_exists.len()
    }

    /// Does any probed path containing `needle` exist?
    pub fn has_page(&self, needle: &str) -> bool {
        self.page_exists
            .iter()
            .any(|(path, probe)| probe.exists && path.contains(needle))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormsSignals {
    pub form_count: usize,
    pub password_input_count: usize,
    pub email_input_count: usize,
    pub login_form_present: bool,
    /// Off-domain `<form action>` hosts, first-seen order.
    pub external_form_actions: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThirdPartySignals {
    pub external_script_domains: Vec<String>,
    pub inline_script_count: usize,
    pub obfuscation_hint: bool,
    pub eval_atob_hint: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentSignals {
    pub urgency_score: usize,
    pub extreme_discount_score: usize,
    pub payment_keyword_hint: bool,
    pub impersonation_hint: bool,
}
