//! Scan Store
//!
//! Persistence seam for everything a scan produces. Outputs are snapshot
//! per scan and mirrored latest-per-domain for the data points; list-valued
//! tables are replaced wholesale on re-scan so the store never accumulates
//! orphans.

use crate::error::{Result, RiskIntelError};
use crate::policy::DomainOverride;
use crate::tools::policy_links::PolicyLinkVerified;
use crate::tools::skus::HomepageSkuItem;
use crate::types::{Domain, FetchLogEntry, SignalLogEntry};
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

/// Stored HTML snippets are capped at 20 KiB.
pub const HTML_SNIPPET_MAX_BYTES: usize = 20 * 1024;
/// Stored text snippets are capped at 8 KiB.
pub const TEXT_SNIPPET_MAX_BYTES: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    HomepageHtml,
    HomepageText,
}

impl ArtifactKind {
    pub fn snippet_cap(&self) -> usize {
        match self {
            ArtifactKind::HomepageHtml => HTML_SNIPPET_MAX_BYTES,
            ArtifactKind::HomepageText => TEXT_SNIPPET_MAX_BYTES,
        }
    }
}

/// A persisted homepage blob. `sha256` is computed over the untruncated
/// original content; only the snippet is size-capped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanArtifact {
    pub kind: ArtifactKind,
    pub url: String,
    pub sha256: String,
    pub snippet: String,
    pub content_type: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl ScanArtifact {
    pub fn new(kind: ArtifactKind, url: &str, content: &str, content_type: Option<&str>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        let sha256 = format!("{:x}", hasher.finalize());
        Self {
            kind,
            url: url.to_string(),
            sha256,
            snippet: truncate_on_char_boundary(content, kind.snippet_cap()),
            content_type: content_type.map(|s| s.to_string()),
            fetched_at: Utc::now(),
        }
    }

    /// True when the snippet ran into its cap and may be missing the tail
    /// (footer links live there).
    pub fn snippet_near_cap(&self) -> bool {
        self.snippet.len() + 100 >= self.kind.snippet_cap()
    }
}

fn truncate_on_char_boundary(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

/// The orchestrator's view of a scan row, consulted for the `is_active`
/// override before scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRow {
    pub id: String,
    pub domain: Domain,
    pub is_active: Option<bool>,
    pub status_code: Option<u16>,
    pub domain_is_active: Option<bool>,
    pub domain_status_code: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPoint {
    pub scan_id: String,
    pub key: String,
    pub label: String,
    pub value: Value,
    pub sources: Vec<String>,
    pub extracted_at: DateTime<Utc>,
}

pub trait ScanStore: Send + Sync {
    fn scan_row(&self, scan_id: &str) -> Result<Option<ScanRow>>;
    fn put_scan_row(&self, row: &ScanRow) -> Result<()>;

    /// Longest-suffix match, so an override stored for `example.com` also
    /// covers `shop.example.com`.
    fn domain_override(&self, domain: &Domain) -> Result<Option<DomainOverride>>;
    fn put_domain_override(&self, domain: &Domain, o: &DomainOverride) -> Result<()>;

    /// Both homepage artifacts land together or not at all.
    fn put_homepage_artifacts(
        &self,
        scan_id: &str,
        html: Option<ScanArtifact>,
        text: Option<ScanArtifact>,
    ) -> Result<()>;
    fn artifact(&self, scan_id: &str, kind: ArtifactKind) -> Result<Option<ScanArtifact>>;

    fn append_fetch_logs(&self, scan_id: &str, logs: &[FetchLogEntry]) -> Result<()>;
    fn append_signal_logs(&self, scan_id: &str, logs: &[SignalLogEntry]) -> Result<()>;
    fn fetch_logs(&self, scan_id: &str) -> Result<Vec<FetchLogEntry>>;

    /// Upsert by `(scan_id, key)` and mirror latest-per-domain.
    fn put_data_point(
        &self,
        scan_id: &str,
        domain: &Domain,
        key: &str,
        label: &str,
        value: &Value,
        sources: &[String],
    ) -> Result<()>;
    fn data_point(&self, scan_id: &str, key: &str) -> Result<Option<Value>>;
    fn domain_data_point(&self, domain: &Domain, key: &str) -> Result<Option<Value>>;

    fn replace_policy_links(&self, scan_id: &str, links: &[PolicyLinkVerified]) -> Result<()>;
    fn policy_links(&self, scan_id: &str) -> Result<Vec<PolicyLinkVerified>>;

    fn replace_homepage_skus(&self, scan_id: &str, skus: &[HomepageSkuItem]) -> Result<()>;
    fn homepage_skus(&self, scan_id: &str) -> Result<Vec<HomepageSkuItem>>;
}

/* ===========================
MEMORY STORE
=========================== */

#[derive(Default)]
struct MemoryInner {
    rows: BTreeMap<String, ScanRow>,
    overrides: BTreeMap<String, DomainOverride>,
    artifacts: BTreeMap<(String, String), ScanArtifact>,
    fetch_logs: BTreeMap<String, Vec<FetchLogEntry>>,
    signal_logs: BTreeMap<String, Vec<SignalLogEntry>>,
    data_points: BTreeMap<(String, String), DataPoint>,
    domain_data_points: BTreeMap<(String, String), DataPoint>,
    policy_links: BTreeMap<String, Vec<PolicyLinkVerified>>,
    skus: BTreeMap<String, Vec<HomepageSkuItem>>,
}

/// In-memory store for tests and one-shot CLI runs.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn artifact_key(scan_id: &str, kind: ArtifactKind) -> (String, String) {
    let k = match kind {
        ArtifactKind::HomepageHtml => "homepage_html",
        ArtifactKind::HomepageText => "homepage_text",
    };
    (scan_id.to_string(), k.to_string())
}

fn suffix_lookup<'a, T>(map: &'a BTreeMap<String, T>, domain: &Domain) -> Option<&'a T> {
    if let Some(v) = map.get(&domain.0) {
        return Some(v);
    }
    // Walk parent domains: shop.example.com -> example.com -> com.
    let mut rest = domain.0.as_str();
    while let Some(idx) = rest.find('.') {
        rest = &rest[idx + 1..];
        if let Some(v) = map.get(rest) {
            return Some(v);
        }
    }
    None
}

impl ScanStore for MemoryStore {
    fn scan_row(&self, scan_id: &str) -> Result<Option<ScanRow>> {
        Ok(self.inner.lock().expect("store lock").rows.get(scan_id).cloned())
    }

    fn put_scan_row(&self, row: &ScanRow) -> Result<()> {
        self.inner
            .lock()
            .expect("store lock")
            .rows
            .insert(row.id.clone(), row.clone());
        Ok(())
    }

    fn domain_override(&self, domain: &Domain) -> Result<Option<DomainOverride>> {
        Ok(suffix_lookup(&self.inner.lock().expect("store lock").overrides, domain).cloned())
    }

    fn put_domain_override(&self, domain: &Domain, o: &DomainOverride) -> Result<()> {
        self.inner
            .lock()
            .expect("store lock")
            .overrides
            .insert(domain.0.clone(), o.clone());
        Ok(())
    }

    fn put_homepage_artifacts(
        &self,
        scan_id: &str,
        html: Option<ScanArtifact>,
        text: Option<ScanArtifact>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().expect("store lock");
        if let Some(a) = html {
            inner
                .artifacts
                .insert(artifact_key(scan_id, ArtifactKind::HomepageHtml), a);
        }
        if let Some(a) = text {
            inner
                .artifacts
                .insert(artifact_key(scan_id, ArtifactKind::HomepageText), a);
        }
        Ok(())
    }

    fn artifact(&self, scan_id: &str, kind: ArtifactKind) -> Result<Option<ScanArtifact>> {
        Ok(self
            .inner
            .lock()
            .expect("store lock")
            .artifacts
            .get(&artifact_key(scan_id, kind))
            .cloned())
    }

    fn append_fetch_logs(&self, scan_id: &str, logs: &[FetchLogEntry]) -> Result<()> {
        self.inner
            .lock()
            .expect("store lock")
            .fetch_logs
            .entry(scan_id.to_string())
            .or_default()
            .extend_from_slice(logs);
        Ok(())
    }

    fn append_signal_logs(&self, scan_id: &str, logs: &[SignalLogEntry]) -> Result<()> {
        self.inner
            .lock()
            .expect("store lock")
            .signal_logs
            .entry(scan_id.to_string())
            .or_default()
            .extend_from_slice(logs);
        Ok(())
    }

    fn fetch_logs(&self, scan_id: &str) -> Result<Vec<FetchLogEntry>> {
        Ok(self
            .inner
            .lock()
            .expect("store lock")
            .fetch_logs
            .get(scan_id)
            .cloned()
            .unwrap_or_default())
    }

    fn put_data_point(
        &self,
        scan_id: &str,
        domain: &Domain,
        key: &str,
        label: &str,
        value: &Value,
        sources: &[String],
    ) -> Result<()> {
        let point = DataPoint {
            scan_id: scan_id.to_string(),
            key: key.to_string(),
            label: label.to_string(),
            value: value.clone(),
            sources: sources.to_vec(),
            extracted_at: Utc::now(),
        };
        let mut inner = self.inner.lock().expect("store lock");
        inner
            .data_points
            .insert((scan_id.to_string(), key.to_string()), point.clone());
        inner
            .domain_data_points
            .insert((domain.0.clone(), key.to_string()), point);
        Ok(())
    }

    fn data_point(&self, scan_id: &str, key: &str) -> Result<Option<Value>> {
        Ok(self
            .inner
            .lock()
            .expect("store lock")
            .data_points
            .get(&(scan_id.to_string(), key.to_string()))
            .map(|p| p.value.clone()))
    }

    fn domain_data_point(&self, domain: &Domain, key: &str) -> Result<Option<Value>> {
        Ok(self
            .inner
            .lock()
            .expect("store lock")
            .domain_data_points
            .get(&(domain.0.clone(), key.to_string()))
            .map(|p| p.value.clone()))
    }

    fn replace_policy_links(&self, scan_id: &str, links: &[PolicyLinkVerified]) -> Result<()> {
        self.inner
            .lock()
            .expect("store lock")
            .policy_links
            .insert(scan_id.to_string(), links.to_vec());
        Ok(())
    }

    fn policy_links(&self, scan_id: &str) -> Result<Vec<PolicyLinkVerified>> {
        Ok(self
            .inner
            .lock()
            .expect("store lock")
            .policy_links
            .get(scan_id)
            .cloned()
            .unwrap_or_default())
    }

    fn replace_homepage_skus(&self, scan_id: &str, skus: &[HomepageSkuItem]) -> Result<()> {
        self.inner
            .lock()
            .expect("store lock")
            .skus
            .insert(scan_id.to_string(), skus.to_vec());
        Ok(())
    }

    fn homepage_skus(&self, scan_id: &str) -> Result<Vec<HomepageSkuItem>> {
        Ok(self
            .inner
            .lock()
            .expect("store lock")
            .skus
            .get(scan_id)
            .cloned()
            .unwrap_or_default())
    }
}

/* ===========================
LOCAL FS STORE
=========================== */

#[derive(Debug, Default, Serialize, Deserialize)]
struct ScanDoc {
    row: Option<ScanRow>,
    artifacts: BTreeMap<String, ScanArtifact>,
    fetch_logs: Vec<FetchLogEntry>,
    signal_logs: Vec<SignalLogEntry>,
    data_points: BTreeMap<String, DataPoint>,
    policy_links: Vec<PolicyLinkVerified>,
    skus: Vec<HomepageSkuItem>,
}

/// One JSON document per scan under the platform data dir.
pub struct LocalFsStore {
    root: PathBuf,
}

impl LocalFsStore {
    pub fn new() -> Result<Self> {
        let proj = ProjectDirs::from("io", "riskintel", "riskintel").ok_or_else(|| {
            RiskIntelError::storage_error("initialization", "could not resolve data dir")
        })?;
        let root = proj.data_local_dir().join("scans");
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn at(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn scan_path(&self, scan_id: &str) -> PathBuf {
        let safe: String = scan_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.root.join(format!("{safe}.json"))
    }

    fn overrides_path(&self) -> PathBuf {
        self.root.join("domains.json")
    }

    fn domain_points_path(&self) -> PathBuf {
        self.root.join("domain_datapoints.json")
    }

    fn read_doc(&self, scan_id: &str) -> Result<ScanDoc> {
        let path = self.scan_path(scan_id);
        if !path.exists() {
            return Ok(ScanDoc::default());
        }
        let file = fs::File::open(&path)?;
        Ok(serde_json::from_reader(file).unwrap_or_default())
    }

    fn write_doc(&self, scan_id: &str, doc: &ScanDoc) -> Result<()> {
        let file = fs::File::create(self.scan_path(scan_id))?;
        serde_json::to_writer_pretty(file, doc)?;
        Ok(())
    }

    fn update_doc<F: FnOnce(&mut ScanDoc)>(&self, scan_id: &str, f: F) -> Result<()> {
        let mut doc = self.read_doc(scan_id)?;
        f(&mut doc);
        self.write_doc(scan_id, &doc)
    }

    fn read_map<T: serde::de::DeserializeOwned>(&self, path: &PathBuf) -> BTreeMap<String, T> {
        if !path.exists() {
            return BTreeMap::new();
        }
        fs::File::open(path)
            .ok()
            .and_then(|f| serde_json::from_reader(f).ok())
            .unwrap_or_default()
    }

    fn write_map<T: Serialize>(&self, path: &PathBuf, map: &BTreeMap<String, T>) -> Result<()> {
        let file = fs::File::create(path)?;
        serde_json::to_writer_pretty(file, map)?;
        Ok(())
    }
}

impl ScanStore for LocalFsStore {
    fn scan_row(&self, scan_id: &str) -> Result<Option<ScanRow>> {
        Ok(self.read_doc(scan_id)?.row)
    }

    fn put_scan_row(&self, row: &ScanRow) -> Result<()> {
        self.update_doc(&row.id, |doc| doc.row = Some(row.clone()))
    }

    fn domain_override(&self, domain: &Domain) -> Result<Option<DomainOverride>> {
        let map: BTreeMap<String, DomainOverride> = self.read_map(&self.overrides_path());
        Ok(suffix_lookup(&map, domain).cloned())
    }

    fn put_domain_override(&self, domain: &Domain, o: &DomainOverride) -> Result<()> {
        let mut map: BTreeMap<String, DomainOverride> = self.read_map(&self.overrides_path());
        map.insert(domain.0.clone(), o.clone());
        self.write_map(&self.overrides_path(), &map)
    }

    fn put_homepage_artifacts(
        &self,
        scan_id: &str,
        html: Option<ScanArtifact>,
        text: Option<ScanArtifact>,
    ) -> Result<()> {
        self.update_doc(scan_id, |doc| {
            if let Some(a) = html {
                doc.artifacts.insert("homepage_html".to_string(), a);
            }
            if let Some(a) = text {
                doc.artifacts.insert("homepage_text".to_string(), a);
            }
        })
    }

    fn artifact(&self, scan_id: &str, kind: ArtifactKind) -> Result<Option<ScanArtifact>> {
        let key = match kind {
            ArtifactKind::HomepageHtml => "homepage_html",
            ArtifactKind::HomepageText => "homepage_text",
        };
        Ok(self.read_doc(scan_id)?.artifacts.get(key).cloned())
    }

    fn append_fetch_logs(&self, scan_id: &str, logs: &[FetchLogEntry]) -> Result<()> {
        self.update_doc(scan_id, |doc| doc.fetch_logs.extend_from_slice(logs))
    }

    fn append_signal_logs(&self, scan_id: &str, logs: &[SignalLogEntry]) -> Result<()> {
        self.update_doc(scan_id, |doc| doc.signal_logs.extend_from_slice(logs))
    }

    fn fetch_logs(&self, scan_id: &str) -> Result<Vec<FetchLogEntry>> {
        Ok(self.read_doc(scan_id)?.fetch_logs)
    }

    fn put_data_point(
        &self,
        scan_id: &str,
        domain: &Domain,
        key: &str,
        label: &str,
        value: &Value,
        sources: &[String],
    ) -> Result<()> {
        let point = DataPoint {
            scan_id: scan_id.to_string(),
            key: key.to_string(),
            label: label.to_string(),
            value: value.clone(),
            sources: sources.to_vec(),
            extracted_at: Utc::now(),
        };
        self.update_doc(scan_id, |doc| {
            doc.data_points.insert(key.to_string(), point.clone());
        })?;
        let mirror_path = self.domain_points_path();
        let mut map: BTreeMap<String, DataPoint> = self.read_map(&mirror_path);
        map.insert(format!("{}::{}", domain.0, key), point);
        self.write_map(&mirror_path, &map)
    }

    fn data_point(&self, scan_id: &str, key: &str) -> Result<Option<Value>> {
        Ok(self
            .read_doc(scan_id)?
            .data_points
            .get(key)
            .map(|p| p.value.clone()))
    }

    fn domain_data_point(&self, domain: &Domain, key: &str) -> Result<Option<Value>> {
        let map: BTreeMap<String, DataPoint> = self.read_map(&self.domain_points_path());
        Ok(map
            .get(&format!("{}::{}", domain.0, key))
            .map(|p| p.value.clone()))
    }

    fn replace_policy_links(&self, scan_id: &str, links: &[PolicyLinkVerified]) -> Result<()> {
        self.update_doc(scan_id, |doc| doc.policy_links = links.to_vec())
    }

    fn policy_links(&self, scan_id: &str) -> Result<Vec<PolicyLinkVerified>> {
        Ok(self.read_doc(scan_id)?.policy_links)
    }

    fn replace_homepage_skus(&self, scan_id: &str, skus: &[HomepageSkuItem]) -> Result<()> {
        self.update_doc(scan_id, |doc| doc.skus = skus.to_vec())
    }

    fn homepage_skus(&self, scan_id: &str) -> Result<Vec<HomepageSkuItem>> {
        Ok(self.read_doc(scan_id)?.skus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_hashes_full_content_but_caps_snippet() {
        let body = "x".repeat(HTML_SNIPPET_MAX_BYTES + 500);
        let a = ScanArtifact::new(ArtifactKind::HomepageHtml, "https://example.com/", &body, None);
        assert_eq!(a.snippet.len(), HTML_SNIPPET_MAX_BYTES);
        assert!(a.snippet_near_cap());

        let b = ScanArtifact::new(ArtifactKind::HomepageHtml, "https://example.com/", &body, None);
        // Same content, same hash: the hash covers the untruncated body.
        assert_eq!(a.sha256, b.sha256);

        let c = ScanArtifact::new(
            ArtifactKind::HomepageHtml,
            "https://example.com/",
            &format!("{body}y"),
            None,
        );
        assert_ne!(a.sha256, c.sha256);
        // Identical snippets despite different hashes proves the hash sees
        // past the cap.
        assert_eq!(a.snippet, c.snippet);
    }

    #[test]
    fn small_artifact_is_not_near_cap() {
        let a = ScanArtifact::new(
            ArtifactKind::HomepageHtml,
            "https://example.com/",
            "<html></html>",
            Some("text/html"),
        );
        assert!(!a.snippet_near_cap());
        assert_eq!(a.snippet, "<html></html>");
    }

    #[test]
    fn snippet_truncation_respects_char_boundaries() {
        let body = "é".repeat(TEXT_SNIPPET_MAX_BYTES); // 2 bytes per char
        let a = ScanArtifact::new(ArtifactKind::HomepageText, "https://example.com/", &body, None);
        assert!(a.snippet.len() <= TEXT_SNIPPET_MAX_BYTES);
        assert!(a.snippet.chars().all(|c| c == 'é'));
    }

    #[test]
    fn memory_store_upserts_artifacts_idempotently() {
        let store = MemoryStore::new();
        let first = ScanArtifact::new(
            ArtifactKind::HomepageHtml,
            "https://example.com/",
            "<html>v1</html>",
            None,
        );
        store
            .put_homepage_artifacts("s1", Some(first), None)
            .expect("put");
        let second = ScanArtifact::new(
            ArtifactKind::HomepageHtml,
            "https://example.com/",
            "<html>v2</html>",
            None,
        );
        store
            .put_homepage_artifacts("s1", Some(second.clone()), None)
            .expect("put");

        let got = store
            .artifact("s1", ArtifactKind::HomepageHtml)
            .expect("get")
            .expect("present");
        assert_eq!(got.sha256, second.sha256);
    }

    #[test]
    fn domain_override_suffix_matches() {
        let store = MemoryStore::new();
        let o = DomainOverride {
            max_pages_per_scan: Some(5),
            ..Default::default()
        };
        store
            .put_domain_override(&Domain::from_raw("example.com"), &o)
            .expect("put");

        let hit = store
            .domain_override(&Domain::from_raw("shop.example.com"))
            .expect("get");
        assert_eq!(hit.and_then(|o| o.max_pages_per_scan), Some(5));

        let miss = store
            .domain_override(&Domain::from_raw("example.org"))
            .expect("get");
        assert!(miss.is_none());
    }

    #[test]
    fn data_point_mirrors_latest_per_domain() {
        let store = MemoryStore::new();
        let d = Domain::from_raw("example.com");
        let v1 = serde_json::json!({"n": 1});
        let v2 = serde_json::json!({"n": 2});
        store
            .put_data_point("s1", &d, "k", "label", &v1, &[])
            .expect("put");
        store
            .put_data_point("s2", &d, "k", "label", &v2, &[])
            .expect("put");

        assert_eq!(store.data_point("s1", "k").expect("get"), Some(v1));
        assert_eq!(store.data_point("s2", "k").expect("get"), Some(v2.clone()));
        assert_eq!(store.domain_data_point(&d, "k").expect("get"), Some(v2));
    }
}
