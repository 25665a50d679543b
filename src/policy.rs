//! Scan policy

use crate::error::{Result, RiskIntelError};
use serde::{Deserialize, Serialize};

/// Immutable per-scan crawl policy.
///
/// Built once by the pipeline runner from defaults plus any stored
/// per-domain override, then shared read-only by every probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainPolicy {
    pub is_authorized: bool,
    pub allow_subdomains: bool,
    pub respect_robots: bool,
    pub allow_robots_disallowed: bool,
    pub max_pages_per_run: u32,
    pub max_depth: u32,
    pub crawl_delay_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for DomainPolicy {
    fn default() -> Self {
        Self {
            is_authorized: true,
            allow_subdomains: true,
            respect_robots: true,
            allow_robots_disallowed: false,
            max_pages_per_run: 50,
            max_depth: 2,
            crawl_delay_ms: 1_000,
            request_timeout_ms: 8_000,
        }
    }
}

/// Stored per-domain override, merged over [`DomainPolicy::default`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainOverride {
    pub allow_subdomains: Option<bool>,
    pub respect_robots: Option<bool>,
    pub max_pages_per_scan: Option<u32>,
    pub crawl_delay_ms: Option<u64>,
}

impl DomainPolicy {
    pub fn with_override(mut self, o: &DomainOverride) -> Self {
        if let Some(v) = o.allow_subdomains {
            self.allow_subdomains = v;
        }
        if let Some(v) = o.respect_robots {
            self.respect_robots = v;
        }
        if let Some(v) = o.max_pages_per_scan {
            self.max_pages_per_run = v;
        }
        if let Some(v) = o.crawl_delay_ms {
            self.crawl_delay_ms = v;
        }
        self
    }
}

/// Quick syntactic checks (no defaults).
pub fn validate_policy(p: &DomainPolicy) -> Result<()> {
    if !p.is_authorized {
        return Err(RiskIntelError::validation_error(
            "is_authorized",
            "scan target is not authorized",
        ));
    }
    if p.max_pages_per_run == 0 {
        return Err(RiskIntelError::validation_error(
            "max_pages_per_run",
            "must be greater than zero",
        ));
    }
    if !(1_000..=10_000).contains(&p.request_timeout_ms) {
        return Err(RiskIntelError::validation_error(
            "request_timeout_ms",
            "must be between 1000 and 10000",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_runner_contract() {
        let p = DomainPolicy::default();
        assert!(p.allow_subdomains);
        assert!(p.respect_robots);
        assert_eq!(p.max_pages_per_run, 50);
        assert_eq!(p.crawl_delay_ms, 1_000);
        assert_eq!(p.request_timeout_ms, 8_000);
        assert_eq!(p.max_depth, 2);
        assert!(validate_policy(&p).is_ok());
    }

    #[test]
    fn override_merges_only_set_fields() {
        let o = DomainOverride {
            max_pages_per_scan: Some(10),
            crawl_delay_ms: Some(0),
            ..Default::default()
        };
        let p = DomainPolicy::default().with_override(&o);
        assert_eq!(p.max_pages_per_run, 10);
        assert_eq!(p.crawl_delay_ms, 0);
        assert!(p.allow_subdomains);
    }

    #[test]
    fn rejects_out_of_range_timeout() {
        let mut p = DomainPolicy::default();
        p.request_timeout_ms = 500;
        assert!(validate_policy(&p).is_err());
        p.request_timeout_ms = 10_001;
        assert!(validate_policy(&p).is_err());
        p.request_timeout_ms = 10_000;
        assert!(validate_policy(&p).is_ok());
    }

    #[test]
    fn rejects_unauthorized_and_zero_budget() {
        let mut p = DomainPolicy::default();
        p.is_authorized = false;
        assert!(validate_policy(&p).is_err());
        p.is_authorized = true;
        p.max_pages_per_run = 0;
        assert!(validate_policy(&p).is_err());
    }
}
