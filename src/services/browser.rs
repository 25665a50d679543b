//! Browser Service
//!
//! Seam for a headless renderer. The pipeline never drives a browser
//! directly; it calls through this trait so deployments can plug in a
//! Chromium driver (or nothing, in which case escalation paths degrade).

use crate::error::Result;
use crate::types::DiscoveredBy;
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct BrowserFetchOptions {
    pub wait_for_network_idle: bool,
    pub additional_wait_ms: u64,
    pub expand_sections: bool,
    pub scroll_to_bottom: bool,
    pub timeout_ms: u64,
}

impl Default for BrowserFetchOptions {
    fn default() -> Self {
        Self {
            wait_for_network_idle: true,
            additional_wait_ms: 0,
            expand_sections: false,
            scroll_to_bottom: false,
            timeout_ms: 30_000,
        }
    }
}

impl BrowserFetchOptions {
    /// Options for the reachability escalation: a quick render without
    /// waiting for network idle.
    pub fn reachability_fallback() -> Self {
        Self {
            wait_for_network_idle: false,
            additional_wait_ms: 3_000,
            ..Default::default()
        }
    }

    /// Options for policy-link/SKU homepage acquisition: full render with
    /// the footer scrolled into existence.
    pub fn full_render() -> Self {
        Self {
            wait_for_network_idle: true,
            additional_wait_ms: 3_000,
            scroll_to_bottom: true,
            timeout_ms: 60_000,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct BrowserFetchResult {
    pub content: String,
    pub status_code: Option<u16>,
    pub content_type: Option<String>,
    pub content_length: Option<usize>,
    pub fetch_duration_ms: Option<u64>,
    pub url: Option<String>,
}

#[async_trait]
pub trait BrowserFetcher: Send + Sync {
    async fn fetch(
        &self,
        scan_id: &str,
        url: &str,
        tag: DiscoveredBy,
        opts: &BrowserFetchOptions,
    ) -> Result<BrowserFetchResult>;

    /// Tear the renderer down. Drivers holding no resources can keep the
    /// default no-op.
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "browser"
    }
}
