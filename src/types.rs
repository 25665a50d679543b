//! Shared Types

use crate::error::{Result, RiskIntelError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// A lowercased registrable hostname.
///
/// All scope decisions in the crate compare against this form: trimmed,
/// ASCII-lowercased, punycoded when the input carries non-ASCII labels,
/// without a trailing dot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Domain(pub String);

impl Domain {
    pub fn from_url(u: &Url) -> Option<Self> {
        u.host_str().map(Self::from_raw)
    }

    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim().trim_end_matches('.').to_ascii_lowercase();
        let ascii = idna::domain_to_ascii(&trimmed).unwrap_or(trimmed);
        Domain(ascii)
    }

    pub fn parse_from_url(url: &str) -> Result<(Url, Self)> {
        let u = Url::parse(url).map_err(|_| RiskIntelError::InvalidUrl(url.into()))?;
        let d = Self::from_url(&u).ok_or(RiskIntelError::MissingDomain)?;
        Ok((u, d))
    }

    /// True when `host` is the domain itself or, if allowed, one of its
    /// subdomains. The scope rule used by every fetch in the crate.
    pub fn contains(&self, host: &str, allow_subdomains: bool) -> bool {
        let h = host.trim_end_matches('.').to_ascii_lowercase();
        h == self.0 || (allow_subdomains && h.ends_with(&format!(".{}", self.0)))
    }

    /// True when `host` is the domain, a subdomain, or a `www.`-variant of
    /// either. Used where `example.com` and `www.example.com` count as the
    /// same site (redirects, policy links, SKU scope).
    pub fn same_site(&self, host: &str) -> bool {
        let h = normalize_hostname(host);
        let t = normalize_hostname(&self.0);
        h == t || h.ends_with(&format!(".{}", t))
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strip a single leading `www.` and lowercase.
pub fn normalize_hostname(host: &str) -> String {
    let h = host.trim_end_matches('.').to_ascii_lowercase();
    h.strip_prefix("www.").map(|s| s.to_string()).unwrap_or(h)
}

/* ---------- fetch log records ---------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchMethod {
    #[serde(rename = "GET")]
    Get,
    #[serde(rename = "HEAD")]
    Head,
}

/// Which stage of the pipeline requested a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveredBy {
    RiskIntelHomepage,
    Robots,
    Sitemap,
    PolicyCheck,
    Crawl,
    ContactPage,
    PolicyLinkCheck,
    PolicyLinksHomepage,
    PolicyLinksBrowser,
    PolicyLinksChromium,
    PolicyLinkBrowserVerify,
    HomepageSkus,
    ReachabilityFallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchLogEntry {
    pub url: String,
    pub method: FetchMethod,
    pub status_code: Option<u16>,
    pub ok: bool,
    pub latency_ms: Option<u64>,
    pub bytes: Option<usize>,
    pub content_type: Option<String>,
    pub discovered_by: DiscoveredBy,
    pub allowed_by_policy: bool,
    pub blocked_reason: Option<String>,
    pub error: Option<String>,
}

/* ---------- signal log records ---------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    RiskHint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalValueType {
    Number,
    String,
    Boolean,
    Json,
}

/// One typed probe outcome. Exactly one of the `value_*` fields is set,
/// matching `value_type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalLogEntry {
    pub category: String,
    pub name: String,
    pub value_type: SignalValueType,
    pub value_number: Option<f64>,
    pub value_string: Option<String>,
    pub value_boolean: Option<bool>,
    pub value_json: Option<Value>,
    pub severity: Severity,
    pub evidence_url: Option<String>,
    pub notes: Option<String>,
}

impl SignalLogEntry {
    fn base(category: &str, name: &str, value_type: SignalValueType) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            value_type,
            value_number: None,
            value_string: None,
            value_boolean: None,
            value_json: None,
            severity: Severity::Info,
            evidence_url: None,
            notes: None,
        }
    }

    pub fn number(category: &str, name: &str, value: f64) -> Self {
        let mut e = Self::base(category, name, SignalValueType::Number);
        e.value_number = Some(value);
        e
    }

    pub fn string(category: &str, name: &str, value: &str) -> Self {
        let mut e = Self::base(category, name, SignalValueType::String);
        e.value_string = Some(value.to_string());
        e
    }

    pub fn boolean(category: &str, name: &str, value: bool) -> Self {
        let mut e = Self::base(category, name, SignalValueType::Boolean);
        e.value_boolean = Some(value);
        e
    }

    pub fn json(category: &str, name: &str, value: Value) -> Self {
        let mut e = Self::base(category, name, SignalValueType::Json);
        e.value_json = Some(value);
        e
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_evidence(mut self, url: &str) -> Self {
        self.evidence_url = Some(url.to_string());
        self
    }

    pub fn with_notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_from_raw_lowercases_and_trims() {
        assert_eq!(Domain::from_raw(" Example.COM. ").0, "example.com");
    }

    #[test]
    fn domain_from_raw_punycodes_unicode() {
        assert_eq!(Domain::from_raw("münchen.de").0, "xn--mnchen-3ya.de");
    }

    #[test]
    fn scope_exact_and_subdomain() {
        let d = Domain::from_raw("example.com");
        assert!(d.contains("example.com", false));
        assert!(d.contains("EXAMPLE.com", false));
        assert!(!d.contains("shop.example.com", false));
        assert!(d.contains("shop.example.com", true));
        assert!(!d.contains("example.com.evil.io", true));
        assert!(!d.contains("notexample.com", true));
    }

    #[test]
    fn same_site_ignores_www() {
        let d = Domain::from_raw("example.com");
        assert!(d.same_site("www.example.com"));
        assert!(d.same_site("example.com"));
        assert!(d.same_site("shop.example.com"));
        assert!(!d.same_site("evil.ru"));
    }

    #[test]
    fn normalize_hostname_strips_single_www() {
        assert_eq!(normalize_hostname("www.example.com"), "example.com");
        assert_eq!(normalize_hostname("www.www.example.com"), "www.example.com");
        assert_eq!(normalize_hostname("example.com"), "example.com");
    }

    #[test]
    fn signal_entry_builders_set_one_value() {
        let e = SignalLogEntry::number("dns", "a_count", 2.0).with_severity(Severity::Warning);
        assert_eq!(e.value_type, SignalValueType::Number);
        assert_eq!(e.value_number, Some(2.0));
        assert!(e.value_string.is_none() && e.value_boolean.is_none() && e.value_json.is_none());
        assert_eq!(e.severity, Severity::Warning);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn www_normalization_strips_exactly_one_prefix(
                host in "[a-z0-9]{1,10}(\\.[a-z0-9]{1,10}){1,3}"
            ) {
                prop_assume!(!host.starts_with("www."));
                prop_assert_eq!(normalize_hostname(&format!("www.{host}")), host.clone());
                prop_assert_eq!(normalize_hostname(&host), host);
            }

            #[test]
            fn subdomain_scope_is_suffix_anchored(label in "[a-z0-9]{1,10}") {
                let d = Domain::from_raw("example.com");
                let sub = format!("{}.example.com", label);
                let reversed = format!("example.com.{}", label);
                let glued = format!("{}example.com", label);
                prop_assert!(d.contains(&sub, true));
                prop_assert!(!d.contains(&sub, false));
                prop_assert!(!d.contains(&reversed, true));
                prop_assert!(!d.contains(&glued, true));
            }
        }
    }
}
