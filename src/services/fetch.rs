//! Fetch Service
//!
//! The policy-gated HTTP engine. Every network request the pipeline makes
//! goes through [`PolicyFetcher::fetch`], which enforces scope, the per-scan
//! page budget, redirect limits, the body-size cap, and the crawl delay, and
//! appends a typed log entry to the shared [`FetchContext`].

use crate::error::Result;
use crate::policy::DomainPolicy;
use crate::types::{DiscoveredBy, Domain, FetchLogEntry, FetchMethod, SignalLogEntry};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, LOCATION, USER_AGENT};
use reqwest::{Client, Method};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use url::Url;

/// Redirect hops followed before giving up.
pub const MAX_REDIRECT_FOLLOWS: usize = 10;

/// Response bodies are read up to this many bytes, then the stream is dropped.
pub const MAX_BODY_BYTES: usize = 512 * 1024;

/// Fixed desktop-Chrome user agent sent on every request.
pub const DESKTOP_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const ACCEPT_VALUE: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const ACCEPT_LANGUAGE_VALUE: &str = "en-US,en;q=0.9";

/* ===========================
CONTEXT
=========================== */

#[derive(Debug, Default)]
struct ContextInner {
    fetch_count: u32,
    fetch_logs: Vec<FetchLogEntry>,
    signal_logs: Vec<SignalLogEntry>,
    urls_checked: Vec<String>,
    errors: Vec<String>,
}

/// Mutable per-scan state shared by concurrent probes.
///
/// All mutation goes through one mutex so the budget invariant holds:
/// `fetch_count` never exceeds `policy.max_pages_per_run`, and a denied
/// fetch never increments it.
pub struct FetchContext {
    pub scan_id: String,
    pub policy: DomainPolicy,
    pub target_domain: Domain,
    inner: Mutex<ContextInner>,
}

impl FetchContext {
    pub fn new(scan_id: &str, target_domain: Domain, policy: DomainPolicy) -> Self {
        Self {
            scan_id: scan_id.to_string(),
            policy,
            target_domain,
            inner: Mutex::new(ContextInner::default()),
        }
    }

    pub fn fetch_count(&self) -> u32 {
        self.inner.lock().expect("context lock").fetch_count
    }

    /// Reserve one unit of the page budget and record the URL as checked.
    /// Returns the blocked reason when the budget is exhausted.
    fn begin_fetch(&self, url: &str) -> std::result::Result<(), String> {
        let mut inner = self.inner.lock().expect("context lock");
        if inner.fetch_count >= self.policy.max_pages_per_run {
            return Err("Max fetch count exceeded".to_string());
        }
        inner.fetch_count += 1;
        inner.urls_checked.push(url.to_string());
        Ok(())
    }

    pub fn log_fetch(&self, entry: FetchLogEntry) {
        self.inner.lock().expect("context lock").fetch_logs.push(entry);
    }

    pub fn log_signal(&self, entry: SignalLogEntry) {
        self.inner.lock().expect("context lock").signal_logs.push(entry);
    }

    pub fn log_signals(&self, entries: Vec<SignalLogEntry>) {
        self.inner
            .lock()
            .expect("context lock")
            .signal_logs
            .extend(entries);
    }

    pub fn record_error(&self, message: &str) {
        self.inner
            .lock()
            .expect("context lock")
            .errors
            .push(message.to_string());
    }

    pub fn fetch_logs(&self) -> Vec<FetchLogEntry> {
        self.inner.lock().expect("context lock").fetch_logs.clone()
    }

    pub fn signal_logs(&self) -> Vec<SignalLogEntry> {
        self.inner.lock().expect("context lock").signal_logs.clone()
    }

    pub fn urls_checked(&self) -> Vec<String> {
        self.inner.lock().expect("context lock").urls_checked.clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.inner.lock().expect("context lock").errors.clone()
    }
}

/* ===========================
OPTIONS & OUTCOME
=========================== */

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub method: FetchMethod,
    pub follow_redirects: bool,
    /// Overrides `policy.request_timeout_ms` when set (verification paths
    /// use their own deadlines).
    pub timeout_ms: Option<u64>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            method: FetchMethod::Get,
            follow_redirects: true,
            timeout_ms: None,
        }
    }
}

impl FetchOptions {
    pub fn head() -> Self {
        Self {
            method: FetchMethod::Head,
            ..Default::default()
        }
    }

    pub fn no_redirects() -> Self {
        Self {
            follow_redirects: false,
            ..Default::default()
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub ok: bool,
    pub status_code: Option<u16>,
    pub body: Option<String>,
    /// Response header names lowercased.
    pub headers: HashMap<String, String>,
    /// Pre-redirect URLs, in hop order.
    pub redirect_chain: Vec<String>,
    pub final_url: String,
    pub latency_ms: u64,
    pub bytes: usize,
    pub error: Option<String>,
}

impl FetchOutcome {
    fn failed(url: &str, latency_ms: u64, error: String) -> Self {
        Self {
            ok: false,
            status_code: None,
            body: None,
            headers: HashMap::new(),
            redirect_chain: Vec::new(),
            final_url: url.to_string(),
            latency_ms,
            bytes: 0,
            error: Some(error),
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(|s| s.as_str())
    }
}

/* ===========================
FETCHER
=========================== */

pub struct PolicyFetcher {
    client: Client,
}

impl PolicyFetcher {
    pub fn new() -> Result<Self> {
        // The engine owns the redirect loop so every hop is scope-checked.
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()?;
        Ok(Self { client })
    }

    pub async fn fetch(
        &self,
        url: &str,
        ctx: &FetchContext,
        discovered_by: DiscoveredBy,
        opts: &FetchOptions,
    ) -> FetchOutcome {
        let started = Instant::now();

        let parsed = match Url::parse(url) {
            Ok(u) => u,
            Err(_) => {
                let reason = format!("invalid url: {url}");
                ctx.log_fetch(error_entry(url, opts.method, discovered_by, &reason));
                ctx.record_error(&reason);
                return FetchOutcome::failed(url, elapsed_ms(started), reason);
            }
        };

        // Scope check: never counts against the budget.
        let host = parsed.host_str().unwrap_or("").to_ascii_lowercase();
        if !ctx
            .target_domain
            .contains(&host, ctx.policy.allow_subdomains)
        {
            let reason = format!(
                "Domain {} not authorized (target: {})",
                host, ctx.target_domain
            );
            ctx.log_fetch(blocked_entry(url, opts.method, discovered_by, &reason));
            return FetchOutcome::failed(url, elapsed_ms(started), reason);
        }

        // Budget check: increments before the network call.
        if let Err(reason) = ctx.begin_fetch(url) {
            ctx.log_fetch(blocked_entry(url, opts.method, discovered_by, &reason));
            return FetchOutcome::failed(url, elapsed_ms(started), reason);
        }

        let timeout =
            Duration::from_millis(opts.timeout_ms.unwrap_or(ctx.policy.request_timeout_ms));

        let mut current = parsed;
        let mut redirect_chain: Vec<String> = Vec::new();

        loop {
            let method = match opts.method {
                FetchMethod::Get => Method::GET,
                FetchMethod::Head => Method::HEAD,
            };
            let response = self
                .client
                .request(method, current.clone())
                .headers(default_headers())
                .timeout(timeout)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    let reason = e.to_string();
                    tracing::debug!(url = %current, error = %reason, "request failed");
                    ctx.log_fetch(error_entry(
                        current.as_str(),
                        opts.method,
                        discovered_by,
                        &reason,
                    ));
                    ctx.record_error(&reason);
                    let mut out =
                        FetchOutcome::failed(current.as_str(), elapsed_ms(started), reason);
                    out.redirect_chain = redirect_chain;
                    return out;
                }
            };

            let status = response.status();

            if status.is_redirection() && opts.follow_redirects {
                if let Some(location) = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                {
                    if redirect_chain.len() >= MAX_REDIRECT_FOLLOWS {
                        let reason = format!("too many redirects (> {MAX_REDIRECT_FOLLOWS})");
                        ctx.log_fetch(error_entry(
                            current.as_str(),
                            opts.method,
                            discovered_by,
                            &reason,
                        ));
                        let mut out =
                            FetchOutcome::failed(current.as_str(), elapsed_ms(started), reason);
                        out.redirect_chain = redirect_chain;
                        return out;
                    }
                    let next = match current.join(location) {
                        Ok(u) => u,
                        Err(_) => {
                            let reason = format!("invalid redirect location: {location}");
                            ctx.log_fetch(error_entry(
                                current.as_str(),
                                opts.method,
                                discovered_by,
                                &reason,
                            ));
                            let mut out = FetchOutcome::failed(
                                current.as_str(),
                                elapsed_ms(started),
                                reason,
                            );
                            out.redirect_chain = redirect_chain;
                            return out;
                        }
                    };
                    let next_host = next.host_str().unwrap_or("").to_ascii_lowercase();
                    redirect_chain.push(current.to_string());
                    if !ctx
                        .target_domain
                        .contains(&next_host, ctx.policy.allow_subdomains)
                    {
                        let reason = format!("Redirect to disallowed domain: {next}");
                        ctx.log_fetch(blocked_entry(
                            next.as_str(),
                            opts.method,
                            discovered_by,
                            &reason,
                        ));
                        let mut out =
                            FetchOutcome::failed(next.as_str(), elapsed_ms(started), reason);
                        out.redirect_chain = redirect_chain;
                        return out;
                    }
                    current = next;
                    continue;
                }
                // 3xx without a Location falls through as a final response.
            }

            let headers = lowercase_headers(response.headers());
            let content_type = headers.get("content-type").cloned();

            let (body, read_error) = match opts.method {
                FetchMethod::Get => read_capped(response).await,
                FetchMethod::Head => (None, None),
            };
            let bytes = body.as_ref().map(|b| b.len()).unwrap_or(0);
            let ok = (200..400).contains(&status.as_u16()) && read_error.is_none();
            let latency_ms = elapsed_ms(started);

            ctx.log_fetch(FetchLogEntry {
                url: url.to_string(),
                method: opts.method,
                status_code: Some(status.as_u16()),
                ok,
                latency_ms: Some(latency_ms),
                bytes: Some(bytes),
                content_type: content_type.clone(),
                discovered_by,
                allowed_by_policy: true,
                blocked_reason: None,
                error: read_error.clone(),
            });

            if ok && ctx.policy.crawl_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(ctx.policy.crawl_delay_ms)).await;
            }

            return FetchOutcome {
                ok,
                status_code: Some(status.as_u16()),
                body,
                headers,
                redirect_chain,
                final_url: current.to_string(),
                latency_ms,
                bytes,
                error: read_error,
            };
        }
    }
}

/* ---------- helpers ---------- */

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(DESKTOP_UA));
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_VALUE));
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static(ACCEPT_LANGUAGE_VALUE),
    );
    headers
}

fn lowercase_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(k, v)| {
            v.to_str()
                .ok()
                .map(|val| (k.as_str().to_ascii_lowercase(), val.to_string()))
        })
        .collect()
}

/// Read the body up to [`MAX_BODY_BYTES`], dropping the stream past the cap.
/// Decoded as UTF-8 with replacement.
async fn read_capped(mut response: reqwest::Response) -> (Option<String>, Option<String>) {
    let mut buf: Vec<u8> = Vec::new();
    let mut read_error = None;
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let remaining = MAX_BODY_BYTES - buf.len();
                if chunk.len() >= remaining {
                    buf.extend_from_slice(&chunk[..remaining]);
                    break;
                }
                buf.extend_from_slice(&chunk);
            }
            Ok(None) => break,
            Err(e) => {
                read_error = Some(e.to_string());
                break;
            }
        }
    }
    (
        Some(String::from_utf8_lossy(&buf).into_owned()),
        read_error,
    )
}

fn blocked_entry(
    url: &str,
    method: FetchMethod,
    discovered_by: DiscoveredBy,
    reason: &str,
) -> FetchLogEntry {
    FetchLogEntry {
        url: url.to_string(),
        method,
        status_code: None,
        ok: false,
        latency_ms: None,
        bytes: None,
        content_type: None,
        discovered_by,
        allowed_by_policy: false,
        blocked_reason: Some(reason.to_string()),
        error: Some(reason.to_string()),
    }
}

fn error_entry(
    url: &str,
    method: FetchMethod,
    discovered_by: DiscoveredBy,
    reason: &str,
) -> FetchLogEntry {
    FetchLogEntry {
        url: url.to_string(),
        method,
        status_code: None,
        ok: false,
        latency_ms: None,
        bytes: None,
        content_type: None,
        discovered_by,
        allowed_by_policy: true,
        blocked_reason: None,
        error: Some(reason.to_string()),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_ctx(max_pages: u32) -> FetchContext {
        let mut policy = DomainPolicy::default();
        policy.max_pages_per_run = max_pages;
        policy.crawl_delay_ms = 0;
        FetchContext::new("scan-1", Domain::from_raw("example.com"), policy)
    }

    #[tokio::test]
    async fn out_of_scope_fetch_is_blocked_without_budget_use() {
        let ctx = test_ctx(5);
        let fetcher = PolicyFetcher::new().expect("client");
        let out = fetcher
            .fetch(
                "https://evil.ru/login",
                &ctx,
                DiscoveredBy::RiskIntelHomepage,
                &FetchOptions::default(),
            )
            .await;

        assert!(!out.ok);
        assert!(out
            .error
            .as_deref()
            .unwrap()
            .contains("not authorized (target: example.com)"));
        assert_eq!(ctx.fetch_count(), 0);

        let logs = ctx.fetch_logs();
        assert_eq!(logs.len(), 1);
        assert!(!logs[0].allowed_by_policy);
        assert!(logs[0].blocked_reason.is_some());
    }

    #[tokio::test]
    async fn subdomain_scope_respects_policy_flag() {
        let mut policy = DomainPolicy::default();
        policy.allow_subdomains = false;
        policy.crawl_delay_ms = 0;
        let ctx = FetchContext::new("scan-1", Domain::from_raw("example.com"), policy);
        let fetcher = PolicyFetcher::new().expect("client");
        let out = fetcher
            .fetch(
                "https://shop.example.com/",
                &ctx,
                DiscoveredBy::Crawl,
                &FetchOptions::default(),
            )
            .await;
        assert!(!out.ok);
        assert_eq!(ctx.fetch_count(), 0);
    }

    #[tokio::test]
    async fn exhausted_budget_blocks_before_network() {
        let ctx = test_ctx(1);
        // Consume the only slot directly.
        ctx.begin_fetch("https://example.com/").expect("first slot");

        let fetcher = PolicyFetcher::new().expect("client");
        let out = fetcher
            .fetch(
                "https://example.com/page",
                &ctx,
                DiscoveredBy::Crawl,
                &FetchOptions::default(),
            )
            .await;

        assert!(!out.ok);
        assert_eq!(out.error.as_deref(), Some("Max fetch count exceeded"));
        assert_eq!(ctx.fetch_count(), 1);
        let logs = ctx.fetch_logs();
        assert_eq!(
            logs[0].blocked_reason.as_deref(),
            Some("Max fetch count exceeded")
        );
    }

    #[tokio::test]
    async fn invalid_url_is_an_error_not_a_block() {
        let ctx = test_ctx(5);
        let fetcher = PolicyFetcher::new().expect("client");
        let out = fetcher
            .fetch(
                "not a url",
                &ctx,
                DiscoveredBy::Crawl,
                &FetchOptions::default(),
            )
            .await;
        assert!(!out.ok);
        assert_eq!(ctx.fetch_count(), 0);
        let logs = ctx.fetch_logs();
        assert!(logs[0].allowed_by_policy);
        assert!(logs[0].error.is_some());
    }

    #[test]
    fn begin_fetch_is_monotonic_and_bounded() {
        let ctx = test_ctx(3);
        for i in 0..3 {
            assert!(ctx.begin_fetch(&format!("https://example.com/{i}")).is_ok());
        }
        assert!(ctx.begin_fetch("https://example.com/4").is_err());
        assert_eq!(ctx.fetch_count(), 3);
        assert_eq!(ctx.urls_checked().len(), 3);
    }

    #[test]
    fn lowercases_header_names() {
        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", HeaderValue::from_static("text/html"));
        headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
        let map = lowercase_headers(&headers);
        assert_eq!(map.get("content-type").map(|s| s.as_str()), Some("text/html"));
        assert_eq!(map.get("x-frame-options").map(|s| s.as_str()), Some("DENY"));
    }
}
