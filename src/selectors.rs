//! Shared Selectors

use once_cell::sync::Lazy;
use scraper::Selector;

/// Selector for anchor elements with hrefs.
pub static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("valid link selector"));

/// Selector for `<form>` elements.
pub static FORM_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("form").expect("valid form selector"));

/// Selector for password inputs.
pub static PASSWORD_INPUT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"input[type="password"]"#).expect("valid password selector"));

/// Selector for email inputs.
pub static EMAIL_INPUT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"input[type="email"]"#).expect("valid email selector"));

/// Selector for submit controls.
pub static SUBMIT_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"input[type="submit"], button"#).expect("valid submit selector")
});

/// Selector for script tags, external and inline.
pub static SCRIPT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("script").expect("valid script selector"));
