//! Multilingual match tables for policy-link discovery.
//!
//! Three regex sets per policy type: `anchor` matches link text, `href`
//! matches the URL, `content` matches the body of the policy page itself.
//! Languages covered: English, Portuguese, Spanish, French, German, Italian.

use super::PolicyType;
use once_cell::sync::Lazy;
use regex::Regex;

fn rx(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid regex")
}

static PRIVACY_ANCHOR: Lazy<Regex> = Lazy::new(|| {
    rx(r"(?i)privacy|privacidade|privacidad|confidentialit[ée]|donn[ée]es personnelles|datenschutz|privatsph[äa]re|informativa sulla privacy|riservatezza")
});
static REFUND_ANCHOR: Lazy<Regex> = Lazy::new(|| {
    rx(r"(?i)refunds?|returns?|reembolsos?|devolu[çc][õo]?[ãa]?o|devoluç[õo]es|trocas?|devoluci[óo]n(?:es)?|remboursements?|retours?|r[üu]ckgabe|erstattung|widerruf|rimborso|resi\b|reso\b|exchanges?")
});
static TERMS_ANCHOR: Lazy<Regex> = Lazy::new(|| {
    rx(r"(?i)terms|termos|condi[çc][õo]es|t[ée]rminos|condiciones|conditions|mentions l[ée]gales|cgv\b|agb\b|nutzungsbedingungen|termini|condizioni|\btos\b")
});

static PRIVACY_HREF: Lazy<Regex> = Lazy::new(|| {
    rx(r"(?i)privacy|privacidade|privacidad|confidentialite|donnees-personnelles|datenschutz|riservatezza|informativa-privacy")
});
static REFUND_HREF: Lazy<Regex> = Lazy::new(|| {
    rx(r"(?i)refund|returns?|reembolso|devolucao|devolucoes|troca|devolucion|remboursement|retour|rueckgabe|widerruf|erstattung|rimborso|reso")
});
static TERMS_HREF: Lazy<Regex> = Lazy::new(|| {
    rx(r"(?i)terms|termos|condicoes|terminos|condiciones|conditions|cgv|legal|agb|termini|condizioni|tos")
});

static PRIVACY_CONTENT: Lazy<Regex> = Lazy::new(|| {
    rx(r"(?i)personal (?:data|information)|dados pessoais|datos personales|donn[ée]es personnelles|personenbezogene daten|dati personali|cookies?")
});
static REFUND_CONTENT: Lazy<Regex> = Lazy::new(|| {
    rx(r"(?i)refund|return polic|money.?back|\b\d{1,2} days\b|devolu[çc]|reembolso|remboursement|r[üu]ckerstattung|widerruf|rimborso|exchange")
});
static TERMS_CONTENT: Lazy<Regex> = Lazy::new(|| {
    rx(r"(?i)terms (?:of|and)|agreement|liability|governing law|condi[çc][õo]es gerais|t[ée]rminos y condiciones|conditions g[ée]n[ée]rales|gesch[äa]ftsbedingungen|haftung|termini e condizioni")
});

/// Paths that read as policy pages regardless of body content.
pub static PATH_POLICY_REGEX: Lazy<Regex> =
    Lazy::new(|| rx(r"(?i)policy|privacy|refund|return|terms|legal|tos|exchange|conditions"));

pub fn anchor_regex(policy_type: PolicyType) -> &'static Regex {
    match policy_type {
        PolicyType::Privacy => &PRIVACY_ANCHOR,
        PolicyType::Refund => &REFUND_ANCHOR,
        PolicyType::Terms => &TERMS_ANCHOR,
    }
}

pub fn href_regex(policy_type: PolicyType) -> &'static Regex {
    match policy_type {
        PolicyType::Privacy => &PRIVACY_HREF,
        PolicyType::Refund => &REFUND_HREF,
        PolicyType::Terms => &TERMS_HREF,
    }
}

pub fn content_regex(policy_type: PolicyType) -> &'static Regex {
    match policy_type {
        PolicyType::Privacy => &PRIVACY_CONTENT,
        PolicyType::Refund => &REFUND_CONTENT,
        PolicyType::Terms => &TERMS_CONTENT,
    }
}

/// Guessed origin-root paths, best first. Capped at ten entries per type so
/// the `100 - 10·position` rank never collapses to zero.
pub fn common_paths(policy_type: PolicyType) -> &'static [&'static str] {
    match policy_type {
        PolicyType::Privacy => &[
            "/privacy-policy",
            "/privacy",
            "/pages/privacy-policy",
            "/policies/privacy-policy",
            "/legal/privacy",
            "/politica-de-privacidade",
            "/politica-de-privacidad",
            "/politique-de-confidentialite",
            "/datenschutz",
            "/informativa-privacy",
        ],
        PolicyType::Refund => &[
            "/refund-policy",
            "/returns",
            "/return-policy",
            "/pages/refund-policy",
            "/policies/refund-policy",
            "/devolucoes",
            "/politica-de-devolucion",
            "/remboursement",
            "/widerruf",
            "/rimborso",
        ],
        PolicyType::Terms => &[
            "/terms",
            "/terms-of-service",
            "/terms-and-conditions",
            "/pages/terms-of-service",
            "/policies/terms-of-service",
            "/termos-e-condicoes",
            "/terminos-y-condiciones",
            "/conditions-generales",
            "/agb",
            "/termini-e-condizioni",
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::policy_links::PolicyType;

    // One representative anchor per language, per type.
    const MULTILINGUAL_ANCHORS: &[(PolicyType, &str)] = &[
        (PolicyType::Privacy, "Privacy Policy"),
        (PolicyType::Privacy, "Política de Privacidade"),
        (PolicyType::Privacy, "Política de privacidad"),
        (PolicyType::Privacy, "Politique de confidentialité"),
        (PolicyType::Privacy, "Datenschutz"),
        (PolicyType::Privacy, "Informativa sulla privacy"),
        (PolicyType::Refund, "Refund Policy"),
        (PolicyType::Refund, "Trocas e Devoluções"),
        (PolicyType::Refund, "Devoluciones"),
        (PolicyType::Refund, "Remboursement"),
        (PolicyType::Refund, "Widerruf & Rückgabe"),
        (PolicyType::Refund, "Politica di rimborso"),
        (PolicyType::Terms, "Terms of Service"),
        (PolicyType::Terms, "Termos e Condições"),
        (PolicyType::Terms, "Términos y condiciones"),
        (PolicyType::Terms, "Conditions générales de vente"),
        (PolicyType::Terms, "AGB"),
        (PolicyType::Terms, "Termini e condizioni"),
    ];

    #[test]
    fn anchor_regexes_cover_all_six_languages() {
        for (policy_type, anchor) in MULTILINGUAL_ANCHORS {
            assert!(
                anchor_regex(*policy_type).is_match(anchor),
                "{policy_type:?} anchor regex missed {anchor:?}"
            );
        }
    }

    #[test]
    fn anchor_regexes_do_not_cross_match_unrelated_text() {
        for text in ["Our Story", "Shop All", "Gift Cards", "Track Order"] {
            for policy_type in [PolicyType::Privacy, PolicyType::Refund, PolicyType::Terms] {
                assert!(
                    !anchor_regex(policy_type).is_match(text),
                    "{policy_type:?} anchor regex wrongly matched {text:?}"
                );
            }
        }
    }

    #[test]
    fn href_regexes_match_own_common_paths() {
        for policy_type in [PolicyType::Privacy, PolicyType::Refund, PolicyType::Terms] {
            for path in common_paths(policy_type) {
                assert!(
                    href_regex(policy_type).is_match(path),
                    "{policy_type:?} href regex missed its own path {path}"
                );
            }
        }
    }

    #[test]
    fn common_path_lists_fit_the_rank_formula() {
        for policy_type in [PolicyType::Privacy, PolicyType::Refund, PolicyType::Terms] {
            assert!(common_paths(policy_type).len() <= 10);
        }
    }

    #[test]
    fn content_regexes_match_policy_bodies() {
        assert!(content_regex(PolicyType::Privacy)
            .is_match("We process your personal data in accordance with the GDPR."));
        assert!(content_regex(PolicyType::Refund)
            .is_match("You may request a refund within 30 days of delivery."));
        assert!(content_regex(PolicyType::Terms)
            .is_match("These terms of service constitute a binding agreement."));
    }

    #[test]
    fn path_policy_regex_covers_known_slugs() {
        for path in ["/privacy", "/legal/tos", "/refund-policy", "/conditions", "/exchange"] {
            assert!(PATH_POLICY_REGEX.is_match(path), "missed {path}");
        }
        assert!(!PATH_POLICY_REGEX.is_match("/products/red-shoe"));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // The corpus anchors must keep matching however a theme pads
            // the link text around them.
            #[test]
            fn corpus_anchors_match_inside_arbitrary_link_text(
                prefix in "[a-zA-Z ]{0,12}",
                suffix in "[a-zA-Z ]{0,12}",
            ) {
                for (policy_type, anchor) in MULTILINGUAL_ANCHORS {
                    let text = format!("{prefix} {anchor} {suffix}");
                    prop_assert!(
                        anchor_regex(*policy_type).is_match(&text),
                        "{:?} lost {:?} inside {:?}", policy_type, anchor, text
                    );
                }
            }
        }
    }
}
