//! Registrar Tools
//!
//! Domain registration metadata: RDAP first, WHOIS subprocess fallback.
//! Registry endpoints are off-target by definition, so these lookups do not
//! pass through the policy-gated fetch engine.

mod rdap;
mod whois;

pub use rdap::rdap_base_for_tld;
pub use whois::{parse_whois_date, whois_binary_available};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupSource {
    Rdap,
    Whois,
}

/// Registrar metadata for the target domain, however obtained.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrarInfo {
    pub registrar: Option<String>,
    pub registration_date: Option<DateTime<Utc>>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub last_changed: Option<DateTime<Utc>>,
    pub domain_age_days: Option<i64>,
    pub domain_age_years: Option<f64>,
    pub rdap_available: bool,
    pub whois_available: bool,
    pub source: Option<LookupSource>,
    pub error: Option<String>,
}

impl RegistrarInfo {
    fn finish(mut self) -> Self {
        if let Some(reg) = self.registration_date {
            let days = (Utc::now() - reg).num_days();
            self.domain_age_days = Some(days);
            self.domain_age_years = Some(((days as f64 / 365.25) * 10.0).round() / 10.0);
        }
        self
    }
}

/// Look up registrar metadata for `domain`. Never fails the scan: every
/// error path degrades into flags on the returned record.
pub async fn lookup(domain: &str) -> RegistrarInfo {
    let domain = domain.trim().to_ascii_lowercase();
    let tld = domain.rsplit('.').next().unwrap_or("");

    if let Some(base) = rdap::rdap_base_for_tld(tld) {
        match rdap::rdap_lookup(base, &domain).await {
            Ok(mut info) => {
                info.rdap_available = true;
                info.source = Some(LookupSource::Rdap);
                return info.finish();
            }
            Err(e) => {
                tracing::debug!(domain = %domain, error = %e, "rdap lookup failed, trying whois");
            }
        }
    }

    match whois::whois_lookup(&domain).await {
        Ok(mut info) => {
            info.whois_available = true;
            info.source = Some(LookupSource::Whois);
            info.finish()
        }
        Err(e) => RegistrarInfo {
            error: Some(e.to_string()),
            ..Default::default()
        },
    }
}
