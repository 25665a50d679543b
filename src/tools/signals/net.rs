//! Network-level probes: DNS records and the TLS certificate.

use super::types::{DnsSignals, TlsSignals};
use chrono::{DateTime, TimeZone, Utc};
use hickory_resolver::TokioAsyncResolver;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_rustls::rustls::{self, client::ServerCertVerified, ServerName};
use tokio_rustls::TlsConnector;
use x509_parser::prelude::FromDer;

const TLS_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const EXPIRY_SOON_DAYS: i64 = 14;

/// Resolve A, AAAA, NS, and MX independently; a failing record type does
/// not fail the probe.
pub async fn probe_dns(domain: &str) -> DnsSignals {
    let resolver = match TokioAsyncResolver::tokio_from_system_conf() {
        Ok(r) => r,
        Err(e) => {
            return DnsSignals {
                error: Some(e.to_string()),
                ..Default::default()
            }
        }
    };

    let (a, aaaa, ns, mx) = tokio::join!(
        resolver.ipv4_lookup(domain),
        resolver.ipv6_lookup(domain),
        resolver.ns_lookup(domain),
        resolver.mx_lookup(domain),
    );

    let a_count = a.map(|l| l.iter().count()).unwrap_or(0);
    let aaaa_count = aaaa.map(|l| l.iter().count()).unwrap_or(0);
    let ns_count = ns.map(|l| l.iter().count()).unwrap_or(0);
    let mx_count = mx.map(|l| l.iter().count()).unwrap_or(0);

    DnsSignals {
        dns_ok: a_count + aaaa_count > 0,
        a_count,
        aaaa_count,
        ns_count,
        mx_count,
        mx_present: mx_count > 0,
        error: None,
    }
}

/// Open a TLS connection to `<domain>:443` with SNI and inspect the peer
/// certificate. Untrusted chains are accepted on purpose: this probe reads
/// the certificate, it does not enforce it.
pub async fn probe_tls(domain: &str) -> TlsSignals {
    let server_name = match ServerName::try_from(domain) {
        Ok(n) => n,
        Err(e) => {
            return TlsSignals {
                error: Some(format!("invalid SNI name: {e}")),
                ..Default::default()
            }
        }
    };

    let config = rustls::ClientConfig::builder()
        .with_safe_defaults()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCert))
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(config));

    let connect = async {
        let tcp = TcpStream::connect((domain, 443)).await?;
        connector.connect(server_name, tcp).await
    };

    let stream = match tokio::time::timeout(TLS_CONNECT_TIMEOUT, connect).await {
        Ok(Ok(s)) => s,
        Ok(Err(e)) => {
            return TlsSignals {
                error: Some(e.to_string()),
                ..Default::default()
            }
        }
        Err(_) => {
            return TlsSignals {
                error: Some("tls connect timed out".to_string()),
                ..Default::default()
            }
        }
    };

    let (_, session) = stream.get_ref();
    let peer_der = session
        .peer_certificates()
        .and_then(|certs| certs.first())
        .map(|c| c.0.clone());

    let mut signals = TlsSignals {
        https_ok: true,
        ..Default::default()
    };
    if let Some(der) = peer_der {
        inspect_certificate(&der, &mut signals);
    }
    signals
}

fn inspect_certificate(der: &[u8], signals: &mut TlsSignals) {
    let cert = match x509_parser::certificate::X509Certificate::from_der(der) {
        Ok((_, c)) => c,
        Err(e) => {
            signals.error = Some(format!("certificate parse error: {e}"));
            return;
        }
    };

    // Prefer O, then CN, then the serialized name.
    let issuer = cert
        .issuer()
        .iter_organization()
        .next()
        .and_then(|o| o.as_str().ok().map(|s| s.to_string()))
        .or_else(|| {
            cert.issuer()
                .iter_common_name()
                .next()
                .and_then(|cn| cn.as_str().ok().map(|s| s.to_string()))
        })
        .unwrap_or_else(|| cert.issuer().to_string());

    let valid_from = asn1_to_utc(cert.validity().not_before.timestamp());
    let valid_to = asn1_to_utc(cert.validity().not_after.timestamp());

    signals.issuer = Some(issuer);
    signals.valid_from = valid_from;
    signals.valid_to = valid_to;
    if let Some(to) = valid_to {
        let days = (to - Utc::now()).num_days();
        signals.days_to_expiry = Some(days);
        signals.expiring_soon = days < EXPIRY_SOON_DAYS;
    }
}

fn asn1_to_utc(timestamp: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(timestamp, 0).single()
}

/// Verifier that admits every certificate; inspection only.
struct AcceptAnyCert;

impl rustls::client::ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::Certificate,
        _intermediates: &[rustls::Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: std::time::SystemTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn expiry_signals(days_out: i64) -> TlsSignals {
        let to = Utc::now() + Duration::days(days_out) + Duration::seconds(5);
        let mut s = TlsSignals {
            https_ok: true,
            valid_to: Some(to),
            ..Default::default()
        };
        let days = (to - Utc::now()).num_days();
        s.days_to_expiry = Some(days);
        s.expiring_soon = days < EXPIRY_SOON_DAYS;
        s
    }

    #[test]
    fn expiring_soon_uses_strict_inequality() {
        // Exactly 14 days out is not yet "soon".
        assert!(!expiry_signals(14).expiring_soon);
        assert!(expiry_signals(13).expiring_soon);
        assert!(expiry_signals(0).expiring_soon);
    }

    #[test]
    fn invalid_sni_reports_error_not_panic() {
        let signals = crate::runtime::block_on(probe_tls("not a hostname"));
        assert!(!signals.https_ok);
        assert!(signals.error.is_some());
    }
}
