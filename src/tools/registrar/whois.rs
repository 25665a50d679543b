use super::RegistrarInfo;
use crate::error::{Result, RiskIntelError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

const WHOIS_TIMEOUT: Duration = Duration::from_secs(15);
const WHOIS_MAX_OUTPUT: usize = 1024 * 1024;

/// Field regexes tried in order; the first capture wins. Formats cover the
/// common gTLD layouts plus the bracketed JP registry style.
static REGISTRATION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?im)^\s*creation date\s*[:.]\s*(.+)$",
        r"(?im)^\s*registered(?: on)?\s*[:.]\s*(.+)$",
        r"(?im)^\s*created(?: on)?\s*[:.]\s*(.+)$",
        r"(?im)^\s*registration (?:date|time)\s*[:.]\s*(.+)$",
        r"(?im)^\s*domain record activated\s*[:.]\s*(.+)$",
        r"(?im)^\[Created on\]\s*(.+)$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

static EXPIRATION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?im)^\s*registry expiry date\s*[:.]\s*(.+)$",
        r"(?im)^\s*expir(?:y|ation) (?:date|time)\s*[:.]\s*(.+)$",
        r"(?im)^\s*expires(?: on)?\s*[:.]\s*(.+)$",
        r"(?im)^\s*paid-till\s*[:.]\s*(.+)$",
        r"(?im)^\s*renewal date\s*[:.]\s*(.+)$",
        r"(?im)^\[Expires on\]\s*(.+)$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

static REGISTRAR_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?im)^\s*registrar\s*:\s*(.+)$",
        r"(?im)^\s*registrar name\s*:\s*(.+)$",
        r"(?im)^\s*sponsoring registrar\s*:\s*(.+)$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

pub fn whois_binary_available() -> bool {
    which::which("whois").is_ok()
}

pub(super) async fn whois_lookup(domain: &str) -> Result<RegistrarInfo> {
    let binary = which::which("whois")
        .map_err(|_| RiskIntelError::lookup_error(domain, "whois binary not found on host"))?;

    let output = tokio::time::timeout(
        WHOIS_TIMEOUT,
        tokio::process::Command::new(binary)
            .arg(domain)
            .kill_on_drop(true)
            .output(),
    )
    .await
    .map_err(|_| RiskIntelError::lookup_error(domain, "whois timed out"))?
    .map_err(|e| RiskIntelError::lookup_error(domain, &e.to_string()))?;

    let mut stdout = output.stdout;
    stdout.truncate(WHOIS_MAX_OUTPUT);
    let text = String::from_utf8_lossy(&stdout);
    Ok(parse_whois(&text))
}

pub(super) fn parse_whois(text: &str) -> RegistrarInfo {
    RegistrarInfo {
        registrar: first_capture(&REGISTRAR_PATTERNS, text),
        registration_date: first_capture(&REGISTRATION_PATTERNS, text)
            .and_then(|raw| parse_whois_date(&raw)),
        expiration_date: first_capture(&EXPIRATION_PATTERNS, text)
            .and_then(|raw| parse_whois_date(&raw)),
        ..Default::default()
    }
}

fn first_capture(patterns: &[Regex], text: &str) -> Option<String> {
    for pattern in patterns {
        if let Some(caps) = pattern.captures(text) {
            let value = caps.get(1).map(|m| m.as_str().trim().to_string());
            if let Some(v) = value {
                if !v.is_empty() {
                    return Some(v);
                }
            }
        }
    }
    None
}

/// Parse one WHOIS date field, normalized to midnight UTC for date-only
/// formats. Registries disagree wildly; try the unambiguous layouts first.
pub fn parse_whois_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%SZ", "%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.and_utc());
        }
    }

    // Date-only forms; take the first token so trailing zone names
    // ("2020-01-24 UTC") don't break parsing.
    let first_token = raw.split_whitespace().next().unwrap_or(raw);
    for candidate in [raw, first_token] {
        for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y", "%d-%b-%Y"] {
            if let Ok(d) = NaiveDate::parse_from_str(candidate, fmt) {
                return Some(midnight_utc(d));
            }
        }
    }

    // "Jan 24, 2020" keeps its internal spaces.
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%b %d, %Y") {
        return Some(midnight_utc(d));
    }
    None
}

fn midnight_utc(d: NaiveDate) -> DateTime<Utc> {
    d.and_hms_opt(0, 0, 0).expect("valid midnight").and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_verisign_style_record() {
        let text = "\
Domain Name: EXAMPLE.COM
Registry Domain ID: 2336799_DOMAIN_COM-VRSN
Registrar: RESERVED-Internet Assigned Numbers Authority
Creation Date: 1995-08-14T04:00:00Z
Registry Expiry Date: 2026-08-13T04:00:00Z
";
        let info = parse_whois(text);
        assert_eq!(
            info.registrar.as_deref(),
            Some("RESERVED-Internet Assigned Numbers Authority")
        );
        assert_eq!(
            info.registration_date.map(|d| d.date_naive().to_string()),
            Some("1995-08-14".to_string())
        );
        assert!(info.expiration_date.is_some());
    }

    #[test]
    fn parses_jp_bracket_record() {
        let text = "\
[Domain Name]                   EXAMPLE.JP
[Created on]                    2004/05/20
[Expires on]                    2026/05/31
";
        let info = parse_whois(text);
        assert_eq!(
            info.registration_date.map(|d| d.date_naive().to_string()),
            Some("2004-05-20".to_string())
        );
        assert_eq!(
            info.expiration_date.map(|d| d.date_naive().to_string()),
            Some("2026-05-31".to_string())
        );
    }

    #[test]
    fn parses_registered_on_with_month_name() {
        let text = "Registered on: 24-Jan-2020\n";
        let info = parse_whois(text);
        assert_eq!(
            info.registration_date.map(|d| d.date_naive().to_string()),
            Some("2020-01-24".to_string())
        );
    }

    #[test]
    fn date_formats_normalize_to_midnight_utc() {
        for raw in ["2020-01-24", "2020/01/24", "24.01.2020", "24-Jan-2020", "Jan 24, 2020"] {
            let parsed = parse_whois_date(raw).unwrap_or_else(|| panic!("failed on {raw}"));
            assert_eq!(parsed.date_naive().to_string(), "2020-01-24", "input {raw}");
            assert_eq!(parsed.time().to_string(), "00:00:00", "input {raw}");
        }
    }

    #[test]
    fn iso_datetime_keeps_its_time() {
        let parsed = parse_whois_date("1995-08-14T04:00:00Z").expect("parsed");
        assert_eq!(parsed.to_rfc3339(), "1995-08-14T04:00:00+00:00");
    }

    #[test]
    fn trailing_zone_name_is_tolerated() {
        let parsed = parse_whois_date("2020-01-24 UTC").expect("parsed");
        assert_eq!(parsed.date_naive().to_string(), "2020-01-24");
    }

    #[test]
    fn unparseable_dates_are_none() {
        assert!(parse_whois_date("before 2001").is_none());
        assert!(parse_whois_date("").is_none());
    }
}
