use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_SKUS_PER_SCAN: usize = 200;
pub const SKU_EXTRACTION_METHOD: &str = "heuristic_v1";

/// One normalized product-card hit from the homepage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomepageSkuItem {
    pub source_url: String,
    pub product_url: String,
    pub product_path: Option<String>,
    pub title: Option<String>,
    pub price_text: Option<String>,
    pub currency: Option<String>,
    pub amount: Option<f64>,
    pub original_price_text: Option<String>,
    pub original_amount: Option<f64>,
    pub is_on_sale: bool,
    pub availability_hint: Option<String>,
    pub image_url: Option<String>,
    /// Which extraction path produced the price (`woo_del_ins`,
    /// `snippet_money`, `price_class`, `text_scan`, `url_only`).
    pub extraction_method: String,
    pub confidence: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HomepageSkuSummary {
    pub total_detected: usize,
    pub with_price: usize,
    pub with_title: usize,
    pub with_image: usize,
    /// Most frequent currency across detected items.
    pub top_currency: Option<String>,
    pub extracted_at: Option<DateTime<Utc>>,
    pub method: String,
    pub notes: Vec<String>,
}

/// The deterministic confidence formula, clamped to `[0, 100]`.
pub fn sku_confidence(
    is_product_url: bool,
    has_price: bool,
    title_len: Option<usize>,
    has_image: bool,
    has_availability: bool,
    amount_parsed: bool,
) -> u8 {
    let title_points = match title_len {
        Some(len) if (3..=120).contains(&len) => 20,
        Some(_) => 10,
        None => 0,
    };
    let score = 30 * is_product_url as i32
        + 30 * has_price as i32
        + title_points
        + 10 * has_image as i32
        + 5 * has_availability as i32
        + 5 * amount_parsed as i32;
    score.clamp(0, 100) as u8
}
