//! LLM Service
//!
//! Seam for the semantic policy-link strategy. The extractor builds a
//! strict-JSON prompt over the candidate links, sends it through
//! [`PolicyLinkLlm`], and parses the reply with tolerance for markdown
//! code fences. Deployments without an LLM simply configure no client and
//! the strategy is skipped.

use crate::error::Result;
use async_trait::async_trait;
use serde::Deserialize;

pub const LLM_MAX_TOKENS: u32 = 500;

#[async_trait]
pub trait PolicyLinkLlm: Send + Sync {
    /// Send one user message, return the raw completion text.
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String>;

    fn name(&self) -> &'static str {
        "llm"
    }
}

/// A link offered to the model for semantic matching.
#[derive(Debug, Clone)]
pub struct LlmLink {
    pub url: String,
    pub text: String,
    pub in_footer: bool,
}

/// Indices into the submitted link list, one per policy type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LlmMatches {
    pub privacy: Option<usize>,
    pub refund: Option<usize>,
    pub terms: Option<usize>,
}

pub fn build_link_prompt(links: &[LlmLink]) -> String {
    let mut prompt = String::from(
        "You are identifying site policy pages. Below is a numbered list of links \
         from a storefront homepage, formatted as `index. [anchor text] url` with \
         footer links marked (footer).\n\n",
    );
    for (i, link) in links.iter().enumerate() {
        let footer = if link.in_footer { " (footer)" } else { "" };
        prompt.push_str(&format!("{}. [{}] {}{}\n", i, link.text, link.url, footer));
    }
    prompt.push_str(
        "\nPick the best link for each policy type, or null when none fits. \
         Reply with ONLY a JSON object of this exact shape:\n\
         {\"matches\": {\"privacy\": <int|null>, \"refund\": <int|null>, \"terms\": <int|null>}, \
         \"reasoning\": \"<short explanation>\"}\n",
    );
    prompt
}

#[derive(Deserialize)]
struct RawResponse {
    matches: RawMatches,
    #[allow(dead_code)]
    reasoning: Option<String>,
}

#[derive(Deserialize)]
struct RawMatches {
    privacy: Option<i64>,
    refund: Option<i64>,
    terms: Option<i64>,
}

/// Parse the model reply. Out-of-range and negative indices are dropped,
/// not errors; a reply that is not JSON at all yields `None`.
pub fn parse_match_response(raw: &str, link_count: usize) -> Option<LlmMatches> {
    let stripped = strip_code_fences(raw);
    let parsed: RawResponse = serde_json::from_str(stripped.trim()).ok()?;
    let in_range = |v: Option<i64>| -> Option<usize> {
        v.and_then(|i| usize::try_from(i).ok()).filter(|&i| i < link_count)
    };
    Some(LlmMatches {
        privacy: in_range(parsed.matches.privacy),
        refund: in_range(parsed.matches.refund),
        terms: in_range(parsed.matches.terms),
    })
}

/// Remove a surrounding ``` or ```json fence when present.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json() {
        let raw = r#"{"matches": {"privacy": 0, "refund": null, "terms": 2}, "reasoning": "footer links"}"#;
        let m = parse_match_response(raw, 5).expect("parsed");
        assert_eq!(m.privacy, Some(0));
        assert_eq!(m.refund, None);
        assert_eq!(m.terms, Some(2));
    }

    #[test]
    fn parses_fenced_json() {
        let raw = "```json\n{\"matches\": {\"privacy\": 1, \"refund\": 3, \"terms\": null}, \"reasoning\": \"x\"}\n```";
        let m = parse_match_response(raw, 5).expect("parsed");
        assert_eq!(m.privacy, Some(1));
        assert_eq!(m.refund, Some(3));
    }

    #[test]
    fn drops_out_of_range_indices() {
        let raw = r#"{"matches": {"privacy": 9, "refund": -1, "terms": 1}, "reasoning": ""}"#;
        let m = parse_match_response(raw, 3).expect("parsed");
        assert_eq!(m.privacy, None);
        assert_eq!(m.refund, None);
        assert_eq!(m.terms, Some(1));
    }

    #[test]
    fn non_json_reply_is_none() {
        assert!(parse_match_response("I could not find any links.", 3).is_none());
    }

    #[test]
    fn prompt_numbers_links_and_marks_footer() {
        let links = vec![
            LlmLink {
                url: "https://example.com/privacy".into(),
                text: "Privacy".into(),
                in_footer: true,
            },
            LlmLink {
                url: "https://example.com/faq".into(),
                text: "FAQ".into(),
                in_footer: false,
            },
        ];
        let prompt = build_link_prompt(&links);
        assert!(prompt.contains("0. [Privacy] https://example.com/privacy (footer)"));
        assert!(prompt.contains("1. [FAQ] https://example.com/faq\n"));
        assert!(prompt.contains("\"matches\""));
    }
}
