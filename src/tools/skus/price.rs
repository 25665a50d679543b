//! Price and currency parsing.
//!
//! Three pattern families, tried in order: symbol-first (multi-character
//! symbols before the bare `$`), ISO-code prefix, ISO-code suffix. Numbers
//! are normalized by stripping thousands separators and converting a
//! European comma decimal to a dot.

use once_cell::sync::Lazy;
use regex::Regex;

const NUMBER: &str = r"([0-9][0-9.,]*)";

/// Symbol-first patterns. Multi-character symbols must come before `$`.
const SYMBOL_CURRENCIES: &[(&str, &str)] = &[
    (r"R\$", "BRL"),
    (r"C\$", "CAD"),
    (r"A\$", "AUD"),
    (r"HK\$", "HKD"),
    (r"S\$", "SGD"),
    (r"NZ\$", "NZD"),
    (r"\$", "USD"),
    ("£", "GBP"),
    ("€", "EUR"),
    ("¥", "JPY"),
    ("₹", "INR"),
    ("₱", "PHP"),
    ("₩", "KRW"),
    ("₫", "VND"),
    ("฿", "THB"),
    ("₴", "UAH"),
];

/// ISO codes accepted as either prefix (`USD 10.00`) or suffix (`10,00 EUR`).
const ISO_CURRENCIES: &[&str] = &[
    "USD", "EUR", "GBP", "JPY", "CNY", "AUD", "CAD", "CHF", "HKD", "SGD", "NZD", "SEK", "NOK",
    "DKK", "PLN", "BRL", "MXN", "INR", "KRW", "PHP", "VND", "THB", "UAH", "RUB", "ZAR", "TRY",
    "AED", "SAR", "ILS",
];

/// All compiled patterns in match-priority order: 16 symbol + 29 prefix +
/// 29 suffix.
static CURRENCY_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    let mut patterns = Vec::with_capacity(SYMBOL_CURRENCIES.len() + 2 * ISO_CURRENCIES.len());
    for (symbol, code) in SYMBOL_CURRENCIES {
        patterns.push((
            Regex::new(&format!(r"{symbol}\s*{NUMBER}")).expect("valid regex"),
            *code,
        ));
    }
    for code in ISO_CURRENCIES {
        patterns.push((
            Regex::new(&format!(r"\b{code}\s*{NUMBER}")).expect("valid regex"),
            *code,
        ));
    }
    for code in ISO_CURRENCIES {
        patterns.push((
            Regex::new(&format!(r"{NUMBER}\s*{code}\b")).expect("valid regex"),
            *code,
        ));
    }
    patterns
});

#[derive(Debug, Clone, PartialEq)]
pub struct PriceMatch {
    pub currency: String,
    pub amount: Option<f64>,
    pub matched_text: String,
}

/// Find the first currency-tagged amount in `text`.
pub fn parse_price(text: &str) -> Option<PriceMatch> {
    for (pattern, code) in CURRENCY_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(text) {
            let raw_number = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            return Some(PriceMatch {
                currency: (*code).to_string(),
                amount: normalize_amount(raw_number),
                matched_text: caps.get(0).map(|m| m.as_str().trim().to_string())?,
            });
        }
    }
    None
}

/// Normalize `1,299.00` / `1.299,00` / `29,90` / `1299` to a float.
pub fn normalize_amount(raw: &str) -> Option<f64> {
    let raw = raw.trim().trim_matches(|c| c == '.' || c == ',');
    if raw.is_empty() {
        return None;
    }

    let last_comma = raw.rfind(',');
    let last_dot = raw.rfind('.');

    let normalized = match (last_comma, last_dot) {
        (Some(comma), Some(dot)) => {
            // The later separator is the decimal point.
            if comma > dot {
                raw.replace('.', "").replace(',', ".")
            } else {
                raw.replace(',', "")
            }
        }
        (Some(comma), None) => {
            let decimals = raw.len() - comma - 1;
            if decimals == 3 {
                raw.replace(',', "") // thousands: 1,299
            } else {
                raw.replace(',', ".") // European decimal: 29,90
            }
        }
        (None, Some(dot)) => {
            let decimals = raw.len() - dot - 1;
            if decimals == 3 && raw.matches('.').count() >= 2 {
                raw.replace('.', "") // 1.299.000
            } else if decimals == 3 && raw.len() > 5 {
                raw.replace('.', "") // 12.299
            } else {
                raw.to_string()
            }
        }
        (None, None) => raw.to_string(),
    };

    normalized.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_table_has_seventy_four_entries() {
        assert_eq!(CURRENCY_PATTERNS.len(), 74);
    }

    #[test]
    fn symbol_prices_resolve_currency() {
        let cases = [
            ("$19.99", "USD", 19.99),
            ("£8.50", "GBP", 8.5),
            ("€1.299,00", "EUR", 1299.0),
            ("¥1500", "JPY", 1500.0),
            ("₹2,499", "INR", 2499.0),
            ("₩12000", "KRW", 12000.0),
            ("฿350", "THB", 350.0),
        ];
        for (text, currency, amount) in cases {
            let m = parse_price(text).unwrap_or_else(|| panic!("no match for {text}"));
            assert_eq!(m.currency, currency, "{text}");
            assert_eq!(m.amount, Some(amount), "{text}");
        }
    }

    #[test]
    fn multi_char_symbols_win_over_bare_dollar() {
        assert_eq!(parse_price("R$ 49,90").expect("match").currency, "BRL");
        assert_eq!(parse_price("C$25.00").expect("match").currency, "CAD");
        assert_eq!(parse_price("A$ 30").expect("match").currency, "AUD");
        assert_eq!(parse_price("HK$88").expect("match").currency, "HKD");
        assert_eq!(parse_price("NZ$ 12.50").expect("match").currency, "NZD");
        assert_eq!(parse_price("$9.99").expect("match").currency, "USD");
    }

    #[test]
    fn iso_prefix_and_suffix_forms() {
        let prefix = parse_price("USD 149.00").expect("match");
        assert_eq!(prefix.currency, "USD");
        assert_eq!(prefix.amount, Some(149.0));

        let suffix = parse_price("149,00 EUR").expect("match");
        assert_eq!(suffix.currency, "EUR");
        assert_eq!(suffix.amount, Some(149.0));

        let chf = parse_price("ab 79.90 CHF inkl. MwSt").expect("match");
        assert_eq!(chf.currency, "CHF");
        assert_eq!(chf.amount, Some(79.9));
    }

    #[test]
    fn no_currency_means_no_match() {
        assert!(parse_price("fast shipping on 30 items").is_none());
        assert!(parse_price("").is_none());
    }

    #[test]
    fn amount_normalization_handles_separator_styles() {
        assert_eq!(normalize_amount("1,299.00"), Some(1299.0));
        assert_eq!(normalize_amount("1.299,00"), Some(1299.0));
        assert_eq!(normalize_amount("29,90"), Some(29.9));
        assert_eq!(normalize_amount("29.90"), Some(29.9));
        assert_eq!(normalize_amount("1299"), Some(1299.0));
        assert_eq!(normalize_amount("1.299.000"), Some(1299000.0));
        assert_eq!(normalize_amount("1,5"), Some(1.5));
        assert_eq!(normalize_amount(""), None);
    }

    #[test]
    fn trailing_separator_is_tolerated() {
        assert_eq!(normalize_amount("50."), Some(50.0));
        assert_eq!(normalize_amount("50,"), Some(50.0));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn plain_integers_parse_exactly(n in 0u64..10_000_000u64) {
                prop_assert_eq!(normalize_amount(&n.to_string()), Some(n as f64));
            }

            #[test]
            fn dollar_prices_always_resolve_to_usd(cents in 0u64..100u64, dollars in 0u64..100_000u64) {
                let text = format!("now ${dollars}.{cents:02} each");
                let m = parse_price(&text).expect("price");
                prop_assert_eq!(m.currency, "USD");
                let expected = dollars as f64 + cents as f64 / 100.0;
                let amount = m.amount.expect("amount");
                prop_assert!((amount - expected).abs() < 1e-6);
            }
        }
    }
}
