use once_cell::sync::Lazy;
use regex::Regex;

static SCRIPT_BLOCK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script>").expect("valid regex"));

static STYLE_BLOCK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<style\b[^>]*>.*?</style>").expect("valid regex"));

static TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));

static TITLE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid regex"));

static WHITESPACE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Strip scripts, styles, and tags; decode entities; collapse whitespace.
///
/// Good enough for word counts, snippet previews, and keyword scans, not a
/// DOM reconstruction.
pub fn strip_tags(html: &str) -> String {
    let without_scripts = SCRIPT_BLOCK_REGEX.replace_all(html, " ");
    let without_styles = STYLE_BLOCK_REGEX.replace_all(&without_scripts, " ");
    let without_tags = TAG_REGEX.replace_all(&without_styles, " ");
    let decoded = html_escape::decode_html_entities(&without_tags);
    WHITESPACE_REGEX.replace_all(decoded.trim(), " ").to_string()
}

/// Content of the first `<title>` tag, entity-decoded and trimmed.
pub fn extract_title(html: &str) -> Option<String> {
    TITLE_REGEX.captures(html).map(|c| {
        let raw = c.get(1).map(|m| m.as_str()).unwrap_or("");
        let decoded = html_escape::decode_html_entities(raw);
        WHITESPACE_REGEX.replace_all(decoded.trim(), " ").to_string()
    })
}

/// Whitespace-split token count.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// First `max_chars` characters of the stripped body.
pub fn text_snippet(html: &str, max_chars: usize) -> String {
    strip_tags(html).chars().take(max_chars).collect()
}

/// True when the content type names an HTML document.
pub fn content_type_is_html(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| {
            let ct = ct.to_ascii_lowercase();
            ct.contains("text/html") || ct.contains("application/xhtml")
        })
        .unwrap_or(false)
}

/// Cloudflare-style interstitial detector. A routing signal for browser
/// escalation, not a security decision.
pub fn looks_like_challenge(body: &str) -> bool {
    body.contains("Just a moment...")
        || body.contains("_cf_chl_opt")
        || body.contains("challenge-platform")
        || (body.contains("Enable JavaScript") && body.len() < 10_240)
}

/// Markers of storefront platforms that render the page client-side.
pub fn looks_js_rendered(body: &str) -> bool {
    body.contains("cdn.shopify.com")
        || body.contains("Shopify.theme")
        || body.contains("shoplazza")
        || body.contains("window.SHOPLAZZA")
}
