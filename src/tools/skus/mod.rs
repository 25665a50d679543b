//! SKU Tools
//!
//! Heuristic extraction of product listings from the homepage artifact:
//! anchor filtering, product-card identification, field extraction, and a
//! deterministic confidence score per item.

mod card;
mod price;
pub mod types;

pub use card::{
    extract_availability, extract_card_image, extract_card_price, extract_card_title,
    find_product_card, in_navigation_chrome,
};
pub use price::{normalize_amount, parse_price, PriceMatch};
pub use types::*;

use crate::error::Result;
use crate::policy::DomainPolicy;
use crate::selectors::LINK_SELECTOR;
use crate::services::browser::BrowserFetcher;
use crate::services::fetch::{FetchContext, PolicyFetcher};
use crate::services::store::ScanStore;
use crate::tools::policy_links::acquire_homepage;
use crate::types::{DiscoveredBy, Domain};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use serde_json::json;
use std::collections::HashMap;
use url::Url;

/// Query parameters that identify a variant and survive normalization.
const KEPT_QUERY_PARAMS: &[&str] = &["id", "product_id", "item_id", "sku", "variant", "v"];

static PRODUCT_PATH_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)/products?/|/p/|/item/|/itm/|/sku/|/dp/|/listing/|/goods/|/prod/")
        .expect("valid regex")
});

/// Paths that are never product pages: storefront chrome, account flows,
/// content sections, and bare category indexes.
static EXCLUDED_PATH_REGEXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)/cart\b|/checkout\b|/basket\b",
        r"(?i)/account\b|/login\b|/register\b|/signin\b|/signup\b|/wishlist\b|/compare\b",
        r"(?i)/blog\b|/news\b|/article\b|/post/",
        r"(?i)/search\b|\?s=|/tag/|/page/\d+",
        r"(?i)/collections?/?$|/categor(y|ies)\b|/cat/?$",
        r"(?i)/about\b|/contact\b|/faq\b|/help\b|/support\b",
        r"(?i)/polic(y|ies)\b|/privacy\b|/terms\b|/shipping\b|/returns?\b|/refund\b|/legal\b",
        r"(?i)^/shop/?$|^/store/?$|^/$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

#[derive(Debug, Clone)]
pub struct SkuOutcome {
    pub items: Vec<HomepageSkuItem>,
    pub summary: HomepageSkuSummary,
}

/// Normalize a product link: absolute URL, fragment dropped, query reduced
/// to the variant-identifying parameters.
pub fn normalize_product_url(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    let mut url = Url::parse(href).or_else(|_| base.join(href)).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| KEPT_QUERY_PARAMS.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        let query: Vec<String> = kept.iter().map(|(k, v)| format!("{k}={v}")).collect();
        url.set_query(Some(&query.join("&")));
    }
    Some(url)
}

pub fn is_excluded_path(path: &str) -> bool {
    EXCLUDED_PATH_REGEXES.iter().any(|r| r.is_match(path))
}

pub fn is_product_path(path: &str) -> bool {
    PRODUCT_PATH_REGEX.is_match(path)
}

/// Scan one homepage document for product cards.
pub fn extract_sku_items(html: &str, source_url: &str, target: &Domain) -> Vec<HomepageSkuItem> {
    let Ok(base) = Url::parse(source_url) else {
        return Vec::new();
    };
    let doc = Html::parse_document(html);

    let mut by_url: HashMap<String, HomepageSkuItem> = HashMap::new();
    for anchor in doc.select(&LINK_SELECTOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(url) = normalize_product_url(href, &base) else {
            continue;
        };
        let Some(host) = url.host_str() else {
            continue;
        };
        if !target.same_site(host) {
            continue;
        }
        if in_navigation_chrome(&anchor) {
            continue;
        }
        let path = url.path().to_string();
        if is_excluded_path(&path) {
            continue;
        }

        let card = find_product_card(&anchor);
        let (title, price, image_url, availability_hint) = match &card {
            Some(card) => (
                extract_card_title(card, &anchor),
                extract_card_price(card),
                extract_card_image(card, &base),
                extract_availability(card),
            ),
            None => (
                extract_card_title(&anchor, &anchor),
                card::CardPrice::default(),
                None,
                None,
            ),
        };

        let product_url_is_product = is_product_path(&path);
        let has_price = price.price_text.is_some();
        if !product_url_is_product && !has_price {
            continue;
        }

        // A claimed sale must actually be cheaper.
        let is_on_sale = match (price.amount, price.original_amount) {
            (Some(a), Some(o)) => price.is_on_sale && o > a,
            _ => price.is_on_sale,
        };

        let confidence = sku_confidence(
            product_url_is_product,
            has_price,
            title.as_ref().map(|t| t.chars().count()),
            image_url.is_some(),
            availability_hint.is_some(),
            price.amount.is_some(),
        );

        let item = HomepageSkuItem {
            source_url: source_url.to_string(),
            product_url: url.to_string(),
            product_path: Some(path),
            title,
            price_text: price.price_text,
            currency: price.currency,
            amount: price.amount,
            original_price_text: price.original_price_text,
            original_amount: price.original_amount,
            is_on_sale,
            availability_hint,
            image_url,
            extraction_method: if price.method.is_empty() {
                "url_only".to_string()
            } else {
                price.method.to_string()
            },
            confidence,
        };

        // Dedupe by normalized URL, keeping the richer hit.
        match by_url.get(&item.product_url) {
            Some(existing) if existing.confidence >= item.confidence => {}
            _ => {
                by_url.insert(item.product_url.clone(), item);
            }
        }
    }

    let mut items: Vec<HomepageSkuItem> = by_url.into_values().collect();
    items.sort_by(|a, b| {
        b.confidence
            .cmp(&a.confidence)
            .then_with(|| a.product_url.cmp(&b.product_url))
    });
    items.truncate(MAX_SKUS_PER_SCAN);
    items
}

pub fn summarize(items: &[HomepageSkuItem], notes: Vec<String>) -> HomepageSkuSummary {
    let mut currency_counts: HashMap<&str, usize> = HashMap::new();
    for item in items {
        if let Some(currency) = &item.currency {
            *currency_counts.entry(currency.as_str()).or_default() += 1;
        }
    }
    let top_currency = currency_counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(code, _)| code.to_string());

    HomepageSkuSummary {
        total_detected: items.len(),
        with_price: items.iter().filter(|i| i.price_text.is_some()).count(),
        with_title: items.iter().filter(|i| i.title.is_some()).count(),
        with_image: items.iter().filter(|i| i.image_url.is_some()).count(),
        top_currency,
        extracted_at: Some(Utc::now()),
        method: SKU_EXTRACTION_METHOD.to_string(),
        notes,
    }
}

/// Acquire the homepage (artifact, fetch, or render) and persist the
/// normalized SKU list for one scan.
pub async fn extract_homepage_skus(
    scan_id: &str,
    target_url: &str,
    policy: &DomainPolicy,
    store: &dyn ScanStore,
    browser: Option<&dyn BrowserFetcher>,
) -> Result<SkuOutcome> {
    let (_, domain) = Domain::parse_from_url(target_url)?;
    let ctx = FetchContext::new(scan_id, domain.clone(), policy.clone());
    let fetcher = PolicyFetcher::new()?;

    let mut notes = Vec::new();
    let items = match acquire_homepage(
        scan_id,
        target_url,
        &fetcher,
        &ctx,
        store,
        browser,
        DiscoveredBy::HomepageSkus,
        DiscoveredBy::HomepageSkus,
    )
    .await
    {
        Some(acq) => {
            if acq.used_browser {
                notes.push("homepage acquired via browser render".to_string());
            }
            extract_sku_items(&acq.html, &acq.source_url, &domain)
        }
        None => {
            notes.push("homepage unavailable".to_string());
            Vec::new()
        }
    };

    let summary = summarize(&items, notes);

    store.replace_homepage_skus(scan_id, &items)?;
    store.append_fetch_logs(scan_id, &ctx.fetch_logs())?;
    store.put_data_point(
        scan_id,
        &domain,
        "homepage_sku_summary",
        "Homepage SKU summary",
        &json!(&summary),
        &[target_url.to_string()],
    )?;

    Ok(SkuOutcome { items, summary })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn target() -> Domain {
        Domain::from_raw("shop.example")
    }

    const LISTING: &str = r#"
        <html><body>
        <nav><a href="/products/nav-item">Nav</a></nav>
        <main><ul>
            <li class="product">
                <a href="https://shop.example/product/widget?variant=3&utm_source=feed">
                    <img src="/img/widget.jpg" alt="Widget">
                </a>
                <h3>Widget Deluxe</h3>
                <span class="price">$49.00</span>
                <p>Only 2 left</p>
            </li>
            <li class="product">
                <a href="/product/gadget">Gadget</a>
                <span class="price">
                    <del><span class="amount">$50.00</span></del>
                    <ins><span class="amount">$30.00</span></ins>
                </span>
            </li>
            <li><a href="/cart">Cart</a></li>
            <li><a href="https://other.example/product/foreign">Foreign</a></li>
        </ul></main>
        </body></html>
    "#;

    #[test]
    fn extracts_cards_and_filters_chrome_and_scope() {
        let items = extract_sku_items(LISTING, "https://shop.example/", &target());
        assert_eq!(items.len(), 2);

        let widget = items
            .iter()
            .find(|i| i.product_url.contains("widget"))
            .expect("widget");
        // utm_source dropped, variant kept.
        assert_eq!(
            widget.product_url,
            "https://shop.example/product/widget?variant=3"
        );
        assert_eq!(widget.title.as_deref(), Some("Widget Deluxe"));
        assert_eq!(widget.amount, Some(49.0));
        assert_eq!(widget.currency.as_deref(), Some("USD"));
        assert_eq!(widget.availability_hint.as_deref(), Some("only 2 left"));
        assert!(widget.image_url.as_deref().unwrap().ends_with("/img/widget.jpg"));
        // product URL + price + title + image + availability + amount
        assert_eq!(widget.confidence, 100);

        let gadget = items
            .iter()
            .find(|i| i.product_url.ends_with("/product/gadget"))
            .expect("gadget");
        assert!(gadget.is_on_sale);
        assert_eq!(gadget.amount, Some(30.0));
        assert_eq!(gadget.original_amount, Some(50.0));
        assert_eq!(gadget.extraction_method, "woo_del_ins");
    }

    #[test]
    fn items_sort_by_confidence() {
        let items = extract_sku_items(LISTING, "https://shop.example/", &target());
        assert!(items.windows(2).all(|w| w[0].confidence >= w[1].confidence));
    }

    #[test]
    fn url_normalization_keeps_variant_params_only() {
        let base = Url::parse("https://shop.example/").expect("url");
        let url = normalize_product_url("/p/1?sku=9&ref=home#gallery", &base).expect("url");
        assert_eq!(url.to_string(), "https://shop.example/p/1?sku=9");

        let bare = normalize_product_url("/p/1?ref=home", &base).expect("url");
        assert_eq!(bare.to_string(), "https://shop.example/p/1");

        assert!(normalize_product_url("javascript:void(0)", &base).is_none());
        assert!(normalize_product_url("#top", &base).is_none());
    }

    #[test]
    fn excluded_paths_are_rejected() {
        for path in [
            "/cart",
            "/checkout",
            "/account/login",
            "/blog/post-1",
            "/search",
            "/collections",
            "/shop",
            "/",
            "/pages/privacy-policy",
        ] {
            assert!(is_excluded_path(path), "should exclude {path}");
        }
        for path in ["/product/widget", "/p/123", "/item/9", "/dp/B000X"] {
            assert!(!is_excluded_path(path), "should keep {path}");
            assert!(is_product_path(path), "should be product path {path}");
        }
    }

    #[test]
    fn non_product_url_without_price_is_dropped() {
        let html = r#"<main><div><a href="/lookbook/summer">Summer Lookbook</a></div></main>"#;
        let items = extract_sku_items(html, "https://shop.example/", &target());
        assert!(items.is_empty());
    }

    #[test]
    fn priced_link_without_product_path_is_kept() {
        let html = r#"
            <main><li>
                <a href="/featured/widget-x">Widget X</a>
                <span class="price">$12.00</span>
            </li></main>
        "#;
        let items = extract_sku_items(html, "https://shop.example/", &target());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].amount, Some(12.0));
    }

    #[test]
    fn summary_counts_and_top_currency() {
        let items = extract_sku_items(LISTING, "https://shop.example/", &target());
        let summary = summarize(&items, vec![]);
        assert_eq!(summary.total_detected, 2);
        assert_eq!(summary.with_price, 2);
        assert_eq!(summary.top_currency.as_deref(), Some("USD"));
        assert_eq!(summary.method, SKU_EXTRACTION_METHOD);
    }

    #[test]
    fn dedupe_keeps_the_richer_item() {
        let html = r#"
            <main>
            <li><a href="/product/w">W</a></li>
            <li class="product">
                <a href="/product/w">Widget Full</a>
                <span class="price">$10.00</span>
                <img src="/w.jpg">
            </li>
            </main>
        "#;
        let items = extract_sku_items(html, "https://shop.example/", &target());
        assert_eq!(items.len(), 1);
        assert!(items[0].price_text.is_some());
    }
}
