use super::RegistrarInfo;
use crate::error::{Result, RiskIntelError};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;

const RDAP_TIMEOUT: Duration = Duration::from_secs(10);

/// Static snapshot of RDAP base URLs per TLD. `None` marks registries with
/// no usable RDAP service; those go straight to WHOIS.
const RDAP_BASES: &[(&str, Option<&str>)] = &[
    ("com", Some("https://rdap.verisign.com/com/v1")),
    ("net", Some("https://rdap.verisign.com/net/v1")),
    ("tv", Some("https://rdap.verisign.com/tv/v1")),
    ("cc", Some("https://rdap.verisign.com/cc/v1")),
    ("org", Some("https://rdap.publicinterestregistry.org/rdap")),
    ("info", Some("https://rdap.identitydigital.services/rdap")),
    ("pro", Some("https://rdap.identitydigital.services/rdap")),
    ("mobi", Some("https://rdap.identitydigital.services/rdap")),
    ("io", Some("https://rdap.identitydigital.services/rdap")),
    ("sh", Some("https://rdap.identitydigital.services/rdap")),
    ("ac", Some("https://rdap.identitydigital.services/rdap")),
    ("live", Some("https://rdap.identitydigital.services/rdap")),
    ("life", Some("https://rdap.identitydigital.services/rdap")),
    ("world", Some("https://rdap.identitydigital.services/rdap")),
    ("today", Some("https://rdap.identitydigital.services/rdap")),
    ("email", Some("https://rdap.identitydigital.services/rdap")),
    ("solutions", Some("https://rdap.identitydigital.services/rdap")),
    ("services", Some("https://rdap.identitydigital.services/rdap")),
    ("agency", Some("https://rdap.identitydigital.services/rdap")),
    ("digital", Some("https://rdap.identitydigital.services/rdap")),
    ("network", Some("https://rdap.identitydigital.services/rdap")),
    ("systems", Some("https://rdap.identitydigital.services/rdap")),
    ("dev", Some("https://www.registry.google/rdap")),
    ("app", Some("https://www.registry.google/rdap")),
    ("page", Some("https://www.registry.google/rdap")),
    ("xyz", Some("https://rdap.centralnic.com/xyz")),
    ("online", Some("https://rdap.centralnic.com/online")),
    ("site", Some("https://rdap.centralnic.com/site")),
    ("store", Some("https://rdap.centralnic.com/store")),
    ("tech", Some("https://rdap.centralnic.com/tech")),
    ("space", Some("https://rdap.centralnic.com/space")),
    ("website", Some("https://rdap.centralnic.com/website")),
    ("fun", Some("https://rdap.centralnic.com/fun")),
    ("icu", Some("https://rdap.centralnic.com/icu")),
    ("shop", Some("https://rdap.nic.shop/rdap")),
    ("top", Some("https://rdap.nic.top")),
    ("vip", Some("https://rdap.nic.vip")),
    ("club", Some("https://rdap.nic.club")),
    ("me", Some("https://rdap.nic.me")),
    ("de", Some("https://rdap.denic.de")),
    ("uk", Some("https://rdap.nominet.uk/uk")),
    ("fr", Some("https://rdap.nic.fr")),
    ("nl", Some("https://rdap.sidn.nl")),
    ("be", Some("https://rdap.dnsbelgium.be/rdap")),
    ("br", Some("https://rdap.registro.br")),
    ("ca", Some("https://rdap.ca.fury.ca/rdap")),
    ("au", Some("https://rdap.auda.org.au/rdap")),
    // Registries without public RDAP as of this snapshot.
    ("ai", None),
    ("jp", None),
    ("es", None),
    ("it", None),
    ("ch", None),
    ("cn", None),
    ("in", None),
    ("ru", None),
];

pub fn rdap_base_for_tld(tld: &str) -> Option<&'static str> {
    RDAP_BASES
        .iter()
        .find(|(t, _)| *t == tld)
        .and_then(|(_, base)| *base)
}

pub(super) async fn rdap_lookup(base: &str, domain: &str) -> Result<RegistrarInfo> {
    let url = format!("{base}/domain/{domain}");
    let client = reqwest::Client::builder().timeout(RDAP_TIMEOUT).build()?;
    let response = client
        .get(&url)
        .header(reqwest::header::ACCEPT, "application/rdap+json")
        .send()
        .await
        .map_err(|e| RiskIntelError::lookup_error(domain, &e.to_string()))?;

    if !response.status().is_success() {
        return Err(RiskIntelError::lookup_error(
            domain,
            &format!("rdap status {}", response.status().as_u16()),
        ));
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| RiskIntelError::lookup_error(domain, &e.to_string()))?;
    Ok(parse_rdap(&body))
}

pub(super) fn parse_rdap(body: &Value) -> RegistrarInfo {
    RegistrarInfo {
        registrar: registrar_name(body),
        registration_date: event_date(body, &["registration"]),
        expiration_date: event_date(body, &["expiration"]),
        last_changed: event_date(body, &["last changed", "last update of RDAP database"]),
        ..Default::default()
    }
}

fn event_date(body: &Value, actions: &[&str]) -> Option<DateTime<Utc>> {
    let events = body.get("events")?.as_array()?;
    for action in actions {
        for event in events {
            let matches = event
                .get("eventAction")
                .and_then(Value::as_str)
                .map(|a| a.eq_ignore_ascii_case(action))
                .unwrap_or(false);
            if matches {
                if let Some(date) = event
                    .get("eventDate")
                    .and_then(Value::as_str)
                    .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
                {
                    return Some(date.with_timezone(&Utc));
                }
            }
        }
    }
    None
}

fn registrar_name(body: &Value) -> Option<String> {
    let entities = body.get("entities")?.as_array()?;
    let registrar = entities.iter().find(|e| {
        e.get("roles")
            .and_then(Value::as_array)
            .map(|roles| {
                roles
                    .iter()
                    .any(|r| r.as_str().map(|s| s.eq_ignore_ascii_case("registrar")).unwrap_or(false))
            })
            .unwrap_or(false)
    })?;

    vcard_fn(registrar).or_else(|| {
        registrar
            .get("handle")
            .and_then(Value::as_str)
            .map(|s| s.to_string())
    })
}

/// `vcardArray[1]` is a list of `[name, params, type, value]` entries; the
/// formatted name lives under `fn`.
fn vcard_fn(entity: &Value) -> Option<String> {
    let entries = entity.get("vcardArray")?.as_array()?.get(1)?.as_array()?;
    for entry in entries {
        let fields = entry.as_array()?;
        if fields.first()?.as_str()? == "fn" {
            return fields.get(3)?.as_str().map(|s| s.to_string());
        }
    }
    None
}
