//! Product-card identification and per-card field extraction.

use super::price::{normalize_amount, parse_price};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// How far above the anchor we look for a price+image container when no
/// recognized card class is present.
const FALLBACK_CARD_LEVELS: usize = 5;

static HEADING_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1, h2, h3, h4, h5, h6").expect("valid selector"));

static TITLE_CLASS_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"[class*="title"], [class*="name"], [class*="heading"]"#)
        .expect("valid selector")
});

static DEL_AMOUNT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("del").expect("valid selector"));

static INS_AMOUNT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("ins").expect("valid selector"));

static SNIPPET_MONEY_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"[class*="product-snippet__price"] [class*="money"]"#)
        .expect("valid selector")
});

static COMPARE_AT_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"[class*="compare-at-price"]"#).expect("valid selector")
});

static PRICE_CLASS_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"[class*="price"], [class*="cost"], [class*="amount"]"#)
        .expect("valid selector")
});

static CARD_IMAGE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("img, spz-img, [data-src]").expect("valid selector"));

static STYLED_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[style]").expect("valid selector"));

static BACKGROUND_IMAGE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"background-image\s*:\s*url\(['"]?([^'")]+)['"]?\)"#).expect("valid regex")
});

static AVAILABILITY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)sold out|out of stock|unavailable|in stock|pre-?order|back-?order|only \d+ left|low stock|coming soon")
        .expect("valid regex")
});

static NAV_CLASS_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(nav|navigation|menu|navbar|breadcrumb|sidebar|header|footer)\b")
        .expect("valid regex")
});

fn ancestors<'a>(element: &ElementRef<'a>) -> Vec<ElementRef<'a>> {
    let mut out = Vec::new();
    let mut node = element.parent();
    while let Some(n) = node {
        if let Some(el) = ElementRef::wrap(n) {
            out.push(el);
        }
        node = n.parent();
    }
    out
}

/// Links inside chrome (navigation, headers, footers, menus) are never
/// product cards.
pub fn in_navigation_chrome(anchor: &ElementRef) -> bool {
    for el in ancestors(anchor) {
        let tag = el.value().name();
        if matches!(tag, "nav" | "header" | "footer") {
            return true;
        }
        if let Some(class) = el.value().attr("class") {
            if NAV_CLASS_REGEX.is_match(class) {
                return true;
            }
        }
        if let Some(role) = el.value().attr("role") {
            if matches!(role, "navigation" | "banner" | "contentinfo") {
                return true;
            }
        }
    }
    false
}

fn class_contains(el: &ElementRef, needle: &str) -> bool {
    el.value()
        .attr("class")
        .map(|c| c.to_ascii_lowercase().contains(needle))
        .unwrap_or(false)
}

fn is_recognized_card(el: &ElementRef) -> bool {
    match el.value().name() {
        // Any <li> or <article> is a plausible card container; the class
        // checks below catch the div-based storefront themes.
        "li" | "article" => true,
        "div" => class_contains(el, "product-card"),
        _ => class_contains(el, "product-snippet") || class_contains(el, "grid-item"),
    }
}

fn has_price_marker(el: &ElementRef) -> bool {
    el.select(&PRICE_CLASS_SELECTOR).next().is_some()
        || el.select(&DEL_AMOUNT_SELECTOR).next().is_some()
        || el.select(&INS_AMOUNT_SELECTOR).next().is_some()
}

fn has_image(el: &ElementRef) -> bool {
    el.select(&CARD_IMAGE_SELECTOR).next().is_some()
}

/// Closest ancestor that looks like a product card; else the nearest
/// ancestor (within five levels) holding both a price marker and an image.
pub fn find_product_card<'a>(anchor: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    let chain = ancestors(anchor);
    for el in &chain {
        if is_recognized_card(el) {
            return Some(*el);
        }
    }
    for el in chain.iter().take(FALLBACK_CARD_LEVELS) {
        if has_price_marker(el) && has_image(el) {
            return Some(*el);
        }
    }
    None
}

fn normalized_text(el: &ElementRef) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Title priority: heading, title-ish class, anchor text, image alt,
/// aria-label. Length-gated to `[3, 200]`.
pub fn extract_card_title(card: &ElementRef, anchor: &ElementRef) -> Option<String> {
    let candidates = [
        card.select(&HEADING_SELECTOR).next().map(|el| normalized_text(&el)),
        card.select(&TITLE_CLASS_SELECTOR)
            .next()
            .map(|el| normalized_text(&el)),
        Some(normalized_text(anchor)),
        card.select(&CARD_IMAGE_SELECTOR)
            .next()
            .and_then(|el| el.value().attr("alt"))
            .map(|s| s.trim().to_string()),
        anchor.value().attr("aria-label").map(|s| s.trim().to_string()),
    ];
    candidates
        .into_iter()
        .flatten()
        .find(|t| (3..=200).contains(&t.chars().count()))
}

#[derive(Debug, Clone, Default)]
pub struct CardPrice {
    pub price_text: Option<String>,
    pub currency: Option<String>,
    pub amount: Option<f64>,
    pub original_price_text: Option<String>,
    pub original_amount: Option<f64>,
    pub is_on_sale: bool,
    pub method: &'static str,
}

fn price_from_text(text: &str) -> (Option<String>, Option<String>, Option<f64>) {
    match parse_price(text) {
        Some(m) => (Some(m.matched_text), Some(m.currency), m.amount),
        None => {
            // A bare number still carries the displayed price text.
            let trimmed = text.trim();
            if trimmed.is_empty() {
                (None, None, None)
            } else {
                (Some(trimmed.to_string()), None, normalize_amount(trimmed))
            }
        }
    }
}

fn inside_any(el: &ElementRef, predicate: impl Fn(&ElementRef) -> bool) -> bool {
    ancestors(el).iter().any(|a| predicate(a))
}

/// Price priority: WooCommerce `<del>/<ins>` sale markup, storefront
/// snippet money spans with an optional compare-at original, any
/// price-like class, then a plain text scan over the card.
pub fn extract_card_price(card: &ElementRef) -> CardPrice {
    // 1. <del> original + <ins> sale price.
    let del = card.select(&DEL_AMOUNT_SELECTOR).next();
    let ins = card.select(&INS_AMOUNT_SELECTOR).next();
    if let (Some(del), Some(ins)) = (del, ins) {
        let (original_text, _, original_amount) = price_from_text(&normalized_text(&del));
        let (price_text, currency, amount) = price_from_text(&normalized_text(&ins));
        let is_on_sale = match (amount, original_amount) {
            (Some(a), Some(o)) => o > a,
            _ => true, // the markup says sale even when amounts are unparseable
        };
        return CardPrice {
            price_text,
            currency,
            amount,
            original_price_text: original_text,
            original_amount,
            is_on_sale,
            method: "woo_del_ins",
        };
    }

    // 2. Shoplazza-style snippet price with optional compare-at original.
    if let Some(money) = card.select(&SNIPPET_MONEY_SELECTOR).next() {
        let (price_text, currency, amount) = price_from_text(&normalized_text(&money));
        let (original_price_text, original_amount) = card
            .select(&COMPARE_AT_SELECTOR)
            .next()
            .map(|el| {
                let (text, _, amount) = price_from_text(&normalized_text(&el));
                (text, amount)
            })
            .unwrap_or((None, None));
        let is_on_sale = matches!((amount, original_amount), (Some(a), Some(o)) if o > a);
        return CardPrice {
            price_text,
            currency,
            amount,
            original_price_text,
            original_amount,
            is_on_sale,
            method: "snippet_money",
        };
    }

    // 3. First price-like element outside sale/compare-at markup.
    for el in card.select(&PRICE_CLASS_SELECTOR) {
        if inside_any(&el, |a| a.value().name() == "del")
            || class_contains(&el, "compare-at-price")
            || inside_any(&el, |a| class_contains(a, "compare-at-price"))
        {
            continue;
        }
        let text = normalized_text(&el);
        if text.is_empty() {
            continue;
        }
        let (price_text, currency, amount) = price_from_text(&text);
        if price_text.is_some() {
            return CardPrice {
                price_text,
                currency,
                amount,
                method: "price_class",
                ..Default::default()
            };
        }
    }

    // 4. Currency scan over the whole card text.
    if let Some(m) = parse_price(&normalized_text(card)) {
        return CardPrice {
            price_text: Some(m.matched_text),
            currency: Some(m.currency),
            amount: m.amount,
            method: "text_scan",
            ..Default::default()
        };
    }

    CardPrice::default()
}

/// Image priority: `src` > `data-src` > `data-lazy-src` > `data-original`
/// > first `srcset` entry, then a CSS `background-image`. `data:` URIs are
/// skipped.
pub fn extract_card_image(card: &ElementRef, base: &Url) -> Option<String> {
    for el in card.select(&CARD_IMAGE_SELECTOR) {
        let raw = ["src", "data-src", "data-lazy-src", "data-original"]
            .iter()
            .find_map(|attr| el.value().attr(attr))
            .or_else(|| {
                el.value()
                    .attr("srcset")
                    .and_then(|s| s.split_whitespace().next())
            });
        if let Some(resolved) = raw.and_then(|r| resolve_image(r, base)) {
            return Some(resolved);
        }
    }

    for el in card.select(&STYLED_SELECTOR) {
        let style = el.value().attr("style").unwrap_or("");
        if let Some(caps) = BACKGROUND_IMAGE_REGEX.captures(style) {
            if let Some(resolved) = caps.get(1).and_then(|m| resolve_image(m.as_str(), base)) {
                return Some(resolved);
            }
        }
    }
    None
}

fn resolve_image(raw: &str, base: &Url) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with("data:") {
        return None;
    }
    if let Some(rest) = raw.strip_prefix("//") {
        return Some(format!("{}://{}", base.scheme(), rest));
    }
    Url::parse(raw)
        .or_else(|_| base.join(raw))
        .ok()
        .map(|u| u.to_string())
}

pub fn extract_availability(card: &ElementRef) -> Option<String> {
    AVAILABILITY_REGEX
        .find(&normalized_text(card))
        .map(|m| m.as_str().to_ascii_lowercase())
}
