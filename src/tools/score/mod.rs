//! Risk Scoring Tools
//!
//! Three independent sub-scorers (phishing, shell-company, compliance)
//! reduce the collected signals plus auxiliary data points into a bounded
//! [`RiskAssessment`]. Everything here is deterministic: same inputs, same
//! scores, same reasons.

pub mod weights;

use crate::tools::policy_links::{PolicyLinkVerified, PolicyType};
use crate::tools::signals::types::DomainIntelSignals;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskType {
    Phishing,
    ShellCompany,
    Compliance,
}

impl RiskType {
    fn display(&self) -> &'static str {
        match self {
            RiskType::Phishing => "Phishing",
            RiskType::ShellCompany => "Shell Company",
            RiskType::Compliance => "Compliance",
        }
    }

    fn category(&self) -> &'static str {
        match self {
            RiskType::Phishing => "phishing",
            RiskType::ShellCompany => "shell_company",
            RiskType::Compliance => "compliance",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskTypeScores {
    pub phishing: u8,
    pub shell_company: u8,
    pub compliance: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Evidence {
    pub signal_paths: Vec<String>,
    pub urls_checked: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub overall_risk_score: u8,
    pub risk_type_scores: RiskTypeScores,
    pub primary_risk_type: RiskType,
    pub confidence: u8,
    pub reasons: Vec<String>,
    pub evidence: Evidence,
    pub notes: Option<String>,
}

/// A scoring failure still yields an assessment: all zeros, shell-company
/// primary, zero confidence, the error in the notes.
pub fn failed_assessment(error: &str) -> RiskAssessment {
    RiskAssessment {
        overall_risk_score: 0,
        risk_type_scores: RiskTypeScores {
            phishing: 0,
            shell_company: 0,
            compliance: 0,
        },
        primary_risk_type: RiskType::ShellCompany,
        confidence: 0,
        reasons: Vec::new(),
        evidence: Evidence::default(),
        notes: Some(error.to_string()),
    }
}

/* ---------- auxiliary data points ---------- */

/// Extracted contact details, read defensively from the `contact_details`
/// data point. Absent fields count as absent information, not as evidence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactDetails {
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub phones: Vec<String>,
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default)]
    pub social_links: Vec<String>,
}

const GENERIC_EMAIL_PROVIDERS: &[&str] = &[
    "gmail.com",
    "yahoo.com",
    "hotmail.com",
    "outlook.com",
    "aol.com",
    "icloud.com",
    "protonmail.com",
    "mail.com",
];

impl ContactDetails {
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    pub fn has_any(&self) -> bool {
        !self.emails.is_empty()
            || !self.phones.is_empty()
            || !self.addresses.is_empty()
            || !self.social_links.is_empty()
    }

    pub fn generic_email_only(&self) -> bool {
        !self.emails.is_empty()
            && self.emails.iter().all(|e| {
                e.rsplit('@')
                    .next()
                    .map(|d| GENERIC_EMAIL_PROVIDERS.contains(&d.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
    }

    pub fn has_linkedin(&self) -> bool {
        self.social_links
            .iter()
            .any(|s| s.to_ascii_lowercase().contains("linkedin.com"))
    }
}

/// The `ai_generated_likelihood` data point with its infrastructure
/// companions, read defensively.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiContentLikelihood {
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub free_hosting: bool,
    #[serde(default)]
    pub boilerplate: bool,
    #[serde(default)]
    pub seo_score: Option<f64>,
}

impl AiContentLikelihood {
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

/* ---------- scorer ---------- */

pub struct ScoreInputs<'a> {
    pub signals: &'a DomainIntelSignals,
    pub policy_links: &'a [PolicyLinkVerified],
    pub contact: Option<ContactDetails>,
    pub ai_content: Option<AiContentLikelihood>,
    pub urls_checked: Vec<String>,
}

#[derive(Debug, Clone)]
struct Application {
    category: RiskType,
    key: &'static str,
    points: i32,
    reason: String,
}

struct SubScore {
    score: i32,
    applications: Vec<Application>,
}

fn apply(
    applications: &mut Vec<Application>,
    category: RiskType,
    key: &'static str,
    points: i32,
    reason: impl Into<String>,
) -> i32 {
    applications.push(Application {
        category,
        key,
        points,
        reason: reason.into(),
    });
    points
}

fn score_phishing(inputs: &ScoreInputs) -> SubScore {
    use weights::phishing as w;
    let s = inputs.signals;
    let mut score = 0;
    let mut applications = Vec::new();
    let cat = RiskType::Phishing;
    let a = &mut applications;

    let has_external_action = !s.forms.external_form_actions.is_empty();
    if s.forms.login_form_present && has_external_action {
        score += apply(
            a,
            cat,
            "login_form_external_action",
            w::LOGIN_FORM_EXTERNAL_ACTION,
            "Login form posts to an external domain",
        );
    } else if s.forms.password_input_count > 0 && has_external_action {
        score += apply(
            a,
            cat,
            "password_input_external_action",
            w::PASSWORD_INPUT_EXTERNAL_ACTION,
            "Password input with an external form action",
        );
    } else if s.forms.password_input_count > 0 {
        score += apply(
            a,
            cat,
            "password_input_present",
            w::PASSWORD_INPUT_PRESENT,
            "Password input on the homepage",
        );
    }

    if s.redirects.cross_domain_redirect {
        score += apply(
            a,
            cat,
            "cross_domain_redirect",
            w::CROSS_DOMAIN_REDIRECT,
            "Homepage redirects across domains",
        );
    }
    if s.redirects.meta_refresh_present {
        score += apply(
            a,
            cat,
            "meta_refresh",
            w::META_REFRESH,
            "Meta-refresh redirect present",
        );
    }
    if s.redirects.js_redirect_hint {
        score += apply(
            a,
            cat,
            "js_redirect",
            w::JS_REDIRECT,
            "JavaScript redirect hint in page body",
        );
    }
    if s.redirects.mismatch_input_vs_final_domain {
        score += apply(
            a,
            cat,
            "input_final_domain_mismatch",
            w::INPUT_FINAL_DOMAIN_MISMATCH,
            "Final URL left the scanned domain",
        );
    }

    if !s.tls.https_ok {
        score += apply(a, cat, "no_https", w::NO_HTTPS, "HTTPS not available");
    }

    let missing_headers = [
        s.headers.strict_transport_security,
        s.headers.content_security_policy,
        s.headers.x_frame_options,
        s.headers.x_content_type_options,
        s.headers.referrer_policy,
    ]
    .iter()
    .filter(|present| !**present)
    .count() as i32;
    if missing_headers > 0 {
        let points =
            (missing_headers * w::MISSING_SECURITY_HEADER).min(w::MISSING_SECURITY_HEADER_CAP);
        score += apply(
            a,
            cat,
            "missing_security_headers",
            points,
            format!("{missing_headers} security headers missing"),
        );
    }

    if s.third_party.eval_atob_hint {
        score += apply(
            a,
            cat,
            "eval_atob_hint",
            w::EVAL_ATOB_HINT,
            "Inline script uses eval/atob",
        );
    }
    if s.third_party.obfuscation_hint {
        score += apply(
            a,
            cat,
            "long_inline_script",
            w::LONG_INLINE_SCRIPT,
            "Unusually long inline script",
        );
    }
    if has_external_action && !s.forms.login_form_present && s.forms.password_input_count == 0 {
        score += apply(
            a,
            cat,
            "external_form_action",
            w::NON_LOGIN_EXTERNAL_FORM_ACTION,
            "Form posts to an external domain",
        );
    }

    SubScore {
        score: score.clamp(0, 100),
        applications,
    }
}

fn score_shell_company(inputs: &ScoreInputs) -> SubScore {
    use weights::shell_company as w;
    let s = inputs.signals;
    let mut score = 0;
    let mut applications = Vec::new();
    let cat = RiskType::ShellCompany;
    let a = &mut applications;

    if let Some(age_days) = s.rdap.domain_age_days {
        let tier = match age_days {
            d if d < 30 => Some(("domain_age_under_30_days", w::DOMAIN_AGE_UNDER_30_DAYS)),
            d if d < 90 => Some(("domain_age_under_90_days", w::DOMAIN_AGE_UNDER_90_DAYS)),
            d if d < 180 => Some(("domain_age_under_180_days", w::DOMAIN_AGE_UNDER_180_DAYS)),
            d if d < 365 => Some(("domain_age_under_1_year", w::DOMAIN_AGE_UNDER_1_YEAR)),
            d if d < 730 => Some(("domain_age_under_2_years", w::DOMAIN_AGE_UNDER_2_YEARS)),
            _ => None,
        };
        if let Some((key, points)) = tier {
            score += apply(a, cat, key, points, format!("Domain is {age_days} days old"));
        }
    }

    if let Some(ai) = &inputs.ai_content {
        let tier = if ai.score >= 80.0 {
            Some(("ai_content_very_high", w::AI_CONTENT_VERY_HIGH))
        } else if ai.score >= 70.0 && ai.confidence >= 60.0 {
            Some(("ai_content_high_confident", w::AI_CONTENT_HIGH_CONFIDENT))
        } else if ai.score >= 60.0 {
            Some(("ai_content_medium", w::AI_CONTENT_MEDIUM))
        } else if ai.score >= 50.0 {
            Some(("ai_content_low", w::AI_CONTENT_LOW))
        } else {
            None
        };
        if let Some((key, points)) = tier {
            score += apply(
                a,
                cat,
                key,
                points,
                format!("Content looks AI-generated (score {:.0})", ai.score),
            );
        }

        if ai.free_hosting {
            score += apply(a, cat, "free_hosting", w::FREE_HOSTING, "Hosted on a free platform");
        }
        if ai.boilerplate {
            score += apply(
                a,
                cat,
                "boilerplate_content",
                w::BOILERPLATE_CONTENT,
                "Boilerplate template content",
            );
        }
        if ai.seo_score.map(|v| v < 30.0).unwrap_or(false) {
            score += apply(a, cat, "low_seo_score", w::LOW_SEO_SCORE, "Very low SEO score");
        }
    }

    let suspicious_patterns = (s.content.urgency_score > 0) as i32
        + (s.content.extreme_discount_score > 0) as i32
        + s.content.impersonation_hint as i32
        + s.content.payment_keyword_hint as i32;
    if suspicious_patterns >= 3 {
        score += apply(
            a,
            cat,
            "suspicious_patterns_many",
            w::SUSPICIOUS_PATTERNS_MANY,
            "Multiple suspicious content patterns",
        );
    } else if suspicious_patterns >= 1 {
        score += apply(
            a,
            cat,
            "suspicious_patterns_some",
            w::SUSPICIOUS_PATTERNS_SOME,
            "Suspicious content patterns present",
        );
    }

    if !s.robots_sitemap.robots_found {
        score += apply(a, cat, "missing_robots", w::MISSING_ROBOTS, "No robots.txt");
    }
    if !s.robots_sitemap.sitemap_found {
        score += apply(a, cat, "missing_sitemap", w::MISSING_SITEMAP, "No sitemap");
    }

    if let Some(contact) = &inputs.contact {
        let mut contact_penalty = 0;
        let mut contact_applications = Vec::new();
        if contact.generic_email_only() {
            contact_penalty += apply(
                &mut contact_applications,
                cat,
                "generic_email_only",
                w::GENERIC_EMAIL_ONLY,
                "Business uses only generic email providers",
            );
        }
        if contact.addresses.is_empty() {
            contact_penalty += apply(
                &mut contact_applications,
                cat,
                "no_address",
                w::NO_ADDRESS,
                "No physical address published",
            );
        }
        if contact.phones.is_empty() {
            contact_penalty += apply(
                &mut contact_applications,
                cat,
                "no_phone",
                w::NO_PHONE,
                "No phone number published",
            );
        }
        if contact.social_links.is_empty() {
            contact_penalty += apply(
                &mut contact_applications,
                cat,
                "no_social_presence",
                w::NO_SOCIAL_PRESENCE,
                "No social media presence",
            );
        }
        score += contact_penalty.min(w::CONTACT_PENALTY_CAP);
        a.extend(contact_applications);

        if !contact.has_linkedin() {
            score += apply(a, cat, "no_linkedin", w::NO_LINKEDIN, "No LinkedIn presence");
        }
    }

    if s.dns.dns_ok && !s.reachability.is_active {
        score += apply(
            a,
            cat,
            "site_shell",
            w::SITE_SHELL,
            "Domain resolves but serves no content",
        );
    }
    if !s.dns.dns_ok {
        score += apply(a, cat, "dns_failure", w::DNS_FAILURE, "DNS resolution failed");
    }
    if !s.dns.mx_present {
        score += apply(a, cat, "no_mx", w::NO_MX, "No MX records");
    }
    if s.reachability.homepage_text_word_count < 150 {
        score += apply(
            a,
            cat,
            "thin_content",
            w::THIN_CONTENT,
            "Very little homepage text",
        );
    }
    if !s.policy_pages.has_page("contact") && !s.policy_pages.has_page("about") {
        score += apply(
            a,
            cat,
            "no_contact_or_about_page",
            w::NO_CONTACT_OR_ABOUT_PAGE,
            "Neither contact nor about page found",
        );
    }
    if s.redirects.cross_domain_redirect {
        score += apply(
            a,
            cat,
            "cross_domain_redirect",
            w::CROSS_DOMAIN_REDIRECT,
            "Homepage redirects across domains",
        );
    }
    if s.content.urgency_score >= 3 {
        score += apply(
            a,
            cat,
            "urgency_language",
            w::URGENCY_LANGUAGE,
            "Heavy urgency language",
        );
    }
    if s.content.extreme_discount_score >= 3 {
        score += apply(
            a,
            cat,
            "discount_language",
            w::DISCOUNT_LANGUAGE,
            "Heavy discount language",
        );
    }
    if s.content.impersonation_hint {
        score += apply(
            a,
            cat,
            "impersonation_hint",
            w::IMPERSONATION_HINT,
            "Claims official/authorized status",
        );
    }

    SubScore {
        score: score.clamp(0, 100),
        applications,
    }
}

fn score_compliance(inputs: &ScoreInputs) -> SubScore {
    use weights::compliance as w;
    let s = inputs.signals;
    let mut score = 0;
    let mut applications = Vec::new();
    let cat = RiskType::Compliance;
    let a = &mut applications;

    let has_verified = |t: PolicyType| {
        inputs
            .policy_links
            .iter()
            .any(|l| l.policy_type == t && l.verified_ok)
    };
    let has_privacy = s.policy_pages.has_page("privacy") || has_verified(PolicyType::Privacy);
    let has_terms = s.policy_pages.has_page("terms") || has_verified(PolicyType::Terms);
    let has_refund = s.policy_pages.has_page("refund")
        || s.policy_pages.has_page("return")
        || has_verified(PolicyType::Refund);
    let has_shipping = s.policy_pages.has_page("shipping");

    let title = s
        .reachability
        .html_title
        .as_deref()
        .unwrap_or("")
        .to_ascii_lowercase();
    let is_ecommerce = s.content.payment_keyword_hint
        || [
            "checkout", "cart", "buy now", "add to cart", "shop now", "order now", "payment",
            "price", "$", "€", "£",
        ]
        .iter()
        .any(|kw| title.contains(kw));

    if !has_privacy {
        score += apply(
            a,
            cat,
            "missing_privacy_policy",
            w::MISSING_PRIVACY_POLICY,
            "No privacy policy found",
        );
    }
    if !has_terms {
        score += apply(a, cat, "missing_terms", w::MISSING_TERMS, "No terms of service found");
    }
    if is_ecommerce && !has_refund {
        score += apply(
            a,
            cat,
            "missing_refund_policy",
            w::MISSING_REFUND_POLICY,
            "E-commerce site without a refund policy",
        );
    }
    if is_ecommerce && !has_shipping {
        score += apply(
            a,
            cat,
            "missing_shipping_policy",
            w::MISSING_SHIPPING_POLICY,
            "E-commerce site without a shipping policy",
        );
    }

    let has_contact_info = inputs
        .contact
        .as_ref()
        .map(|c| c.has_any())
        .unwrap_or(false);
    if !s.policy_pages.has_page("contact") && !has_contact_info {
        score += apply(
            a,
            cat,
            "missing_contact",
            w::MISSING_CONTACT,
            "No contact page or contact details",
        );
    }
    if !s.policy_pages.has_page("about") {
        score += apply(a, cat, "missing_about", w::MISSING_ABOUT, "No about page");
    }

    if s.content.payment_keyword_hint && !has_privacy && !has_terms {
        score += apply(
            a,
            cat,
            "payment_without_policies",
            w::PAYMENT_WITHOUT_POLICIES,
            "Payment flow without privacy or terms",
        );
    }

    if !s.robots_sitemap.sitemap_found {
        score += apply(a, cat, "missing_sitemap", w::MISSING_SITEMAP, "No sitemap");
    }
    if s.robots_sitemap.disallow_count > 10 {
        score += apply(
            a,
            cat,
            "excessive_disallow",
            w::EXCESSIVE_DISALLOW,
            "Robots.txt hides most of the site",
        );
    }

    SubScore {
        score: score.clamp(0, 100),
        applications,
    }
}

/// Reduce signals + auxiliary data points into the final assessment.
pub fn score_assessment(inputs: &ScoreInputs) -> RiskAssessment {
    let phishing = score_phishing(inputs);
    let shell = score_shell_company(inputs);
    let compliance = score_compliance(inputs);

    let scores = [
        (RiskType::Phishing, phishing.score),
        (RiskType::ShellCompany, shell.score),
        (RiskType::Compliance, compliance.score),
    ];
    let max = scores.iter().map(|(_, s)| *s).max().unwrap_or(0);
    let mean = scores.iter().map(|(_, s)| *s as f64).sum::<f64>() / scores.len() as f64;
    let overall = (0.6 * max as f64 + 0.4 * mean).round() as u8;

    // Ties break in iteration order: phishing, shell_company, compliance.
    let primary = scores
        .iter()
        .fold((RiskType::Phishing, -1), |acc, (t, s)| {
            if *s > acc.1 {
                (*t, *s)
            } else {
                acc
            }
        })
        .0;

    let mut applications: Vec<&Application> = phishing
        .applications
        .iter()
        .chain(shell.applications.iter())
        .chain(compliance.applications.iter())
        .collect();
    applications.sort_by(|x, y| y.points.cmp(&x.points));

    let mut reasons: Vec<String> = Vec::new();
    for application in &applications {
        let formatted = format!("[{}] {}", application.category.display(), application.reason);
        if !reasons.contains(&formatted) {
            reasons.push(formatted);
        }
        if reasons.len() == 5 {
            break;
        }
    }

    let mut signal_paths: Vec<String> = Vec::new();
    for application in &applications {
        let path = format!("{}.{}", application.category.category(), application.key);
        if !signal_paths.contains(&path) {
            signal_paths.push(path);
        }
    }

    let s = inputs.signals;
    let mut confidence = 70i32;
    if s.robots_sitemap.robots_found {
        confidence += 10;
    }
    if s.policy_pages.checked_count() >= 4 {
        confidence += 5;
    }
    if !s.reachability.is_active {
        confidence -= 30;
    }
    if !crate::tools::html::content_type_is_html(s.reachability.content_type.as_deref()) {
        confidence -= 30;
    }
    if s.reachability.homepage_text_word_count < 150 {
        confidence -= 15;
    }

    RiskAssessment {
        overall_risk_score: overall,
        risk_type_scores: RiskTypeScores {
            phishing: phishing.score as u8,
            shell_company: shell.score as u8,
            compliance: compliance.score as u8,
        },
        primary_risk_type: primary,
        confidence: confidence.clamp(0, 90) as u8,
        reasons,
        evidence: Evidence {
            signal_paths,
            urls_checked: inputs.urls_checked.clone(),
        },
        notes: None,
    }
}
