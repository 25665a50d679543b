//! Frozen weight table for the deterministic risk scorer.
//!
//! Values are part of the scoring contract; changing one changes every
//! historical comparison, so they live here as named constants rather than
//! inline literals.

pub mod phishing {
    pub const LOGIN_FORM_EXTERNAL_ACTION: i32 = 30;
    pub const PASSWORD_INPUT_EXTERNAL_ACTION: i32 = 25;
    pub const PASSWORD_INPUT_PRESENT: i32 = 12;
    pub const CROSS_DOMAIN_REDIRECT: i32 = 15;
    pub const META_REFRESH: i32 = 10;
    pub const JS_REDIRECT: i32 = 10;
    pub const INPUT_FINAL_DOMAIN_MISMATCH: i32 = 15;
    pub const NO_HTTPS: i32 = 8;
    pub const MISSING_SECURITY_HEADER: i32 = 5;
    pub const MISSING_SECURITY_HEADER_CAP: i32 = 20;
    pub const EVAL_ATOB_HINT: i32 = 5;
    pub const LONG_INLINE_SCRIPT: i32 = 5;
    pub const NON_LOGIN_EXTERNAL_FORM_ACTION: i32 = 8;
}

pub mod shell_company {
    pub const DOMAIN_AGE_UNDER_30_DAYS: i32 = 30;
    pub const DOMAIN_AGE_UNDER_90_DAYS: i32 = 18;
    pub const DOMAIN_AGE_UNDER_180_DAYS: i32 = 12;
    pub const DOMAIN_AGE_UNDER_1_YEAR: i32 = 8;
    pub const DOMAIN_AGE_UNDER_2_YEARS: i32 = 5;

    pub const AI_CONTENT_VERY_HIGH: i32 = 35;
    pub const AI_CONTENT_HIGH_CONFIDENT: i32 = 28;
    pub const AI_CONTENT_MEDIUM: i32 = 15;
    pub const AI_CONTENT_LOW: i32 = 6;

    pub const SUSPICIOUS_PATTERNS_MANY: i32 = 25;
    pub const SUSPICIOUS_PATTERNS_SOME: i32 = 12;

    pub const FREE_HOSTING: i32 = 12;
    pub const BOILERPLATE_CONTENT: i32 = 10;
    pub const LOW_SEO_SCORE: i32 = 4;
    pub const MISSING_ROBOTS: i32 = 3;
    pub const MISSING_SITEMAP: i32 = 3;

    pub const GENERIC_EMAIL_ONLY: i32 = 15;
    pub const NO_ADDRESS: i32 = 12;
    pub const NO_PHONE: i32 = 10;
    pub const NO_SOCIAL_PRESENCE: i32 = 10;
    pub const CONTACT_PENALTY_CAP: i32 = 25;
    pub const NO_LINKEDIN: i32 = 4;

    pub const SITE_SHELL: i32 = 25;
    pub const DNS_FAILURE: i32 = 25;
    pub const NO_MX: i32 = 5;
    pub const THIN_CONTENT: i32 = 4;
    pub const NO_CONTACT_OR_ABOUT_PAGE: i32 = 12;
    pub const CROSS_DOMAIN_REDIRECT: i32 = 12;
    pub const URGENCY_LANGUAGE: i32 = 5;
    pub const DISCOUNT_LANGUAGE: i32 = 5;
    pub const IMPERSONATION_HINT: i32 = 6;
}

pub mod compliance {
    pub const MISSING_PRIVACY_POLICY: i32 = 18;
    pub const MISSING_TERMS: i32 = 15;
    pub const MISSING_REFUND_POLICY: i32 = 12;
    pub const MISSING_SHIPPING_POLICY: i32 = 8;
    pub const MISSING_CONTACT: i32 = 10;
    pub const MISSING_ABOUT: i32 = 5;
    pub const PAYMENT_WITHOUT_POLICIES: i32 = 15;
    pub const MISSING_SITEMAP: i32 = 3;
    pub const EXCESSIVE_DISALLOW: i32 = 4;
}
