//! Public Facade

use crate::pipeline::{run_risk_intel_pipeline, PipelineComponents, PipelineOutcome};
use crate::services::browser::BrowserFetcher;
use crate::services::llm::PolicyLinkLlm;
use crate::services::store::ScanStore;

/* ------------ facade components ------------ */

/// Optional collaborators a deployment can plug in: a headless-browser
/// driver and an LLM client. Both default to absent, in which case the
/// escalation paths degrade gracefully.
#[derive(Default)]
pub struct Components {
    pub browser: Option<Box<dyn BrowserFetcher>>,
    pub llm: Option<Box<dyn PolicyLinkLlm>>,
}

impl Components {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_browser(mut self, browser: Box<dyn BrowserFetcher>) -> Self {
        self.browser = Some(browser);
        self
    }

    pub fn with_llm(mut self, llm: Box<dyn PolicyLinkLlm>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub(crate) fn as_pipeline_components(&self) -> PipelineComponents<'_> {
        PipelineComponents {
            browser: self.browser.as_deref(),
            llm: self.llm.as_deref(),
        }
    }
}

/* ------------ entry points ------------ */

/// Run the full pipeline for one scan id against one URL.
pub async fn scan_url(
    store: &dyn ScanStore,
    scan_id: &str,
    url: &str,
    components: &Components,
) -> PipelineOutcome {
    run_risk_intel_pipeline(scan_id, url, store, &components.as_pipeline_components()).await
}
