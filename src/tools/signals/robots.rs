//! Robots and sitemap coverage.

use super::types::RobotsSitemapSignals;
use crate::services::fetch::{FetchContext, FetchOptions, PolicyFetcher};
use crate::types::DiscoveredBy;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::VecDeque;
use url::Url;

pub const MAX_SITEMAP_FETCHES: usize = 5;

static LOC_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<loc>\s*(.*?)\s*</loc>").expect("valid regex"));

#[derive(Debug, Default)]
pub struct ParsedRobots {
    pub disallow_count: usize,
    /// Path prefixes disallowed for `User-agent: *`.
    pub disallowed_paths: Vec<String>,
    pub sitemaps: Vec<String>,
}

/// Line-oriented, case-insensitive robots.txt parse. Only the `*` block
/// contributes to the disallow count.
pub fn parse_robots(body: &str) -> ParsedRobots {
    let mut parsed = ParsedRobots::default();
    let mut star_block = false;

    for line in body.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let Some((directive, value)) = line.split_once(':') else {
            continue;
        };
        let directive = directive.trim().to_ascii_lowercase();
        let value = value.trim();

        match directive.as_str() {
            "user-agent" => star_block = value == "*",
            "disallow" if star_block => {
                if !value.is_empty() {
                    parsed.disallow_count += 1;
                    parsed.disallowed_paths.push(value.to_string());
                }
            }
            "sitemap" => parsed.sitemaps.push(value.to_string()),
            _ => {}
        }
    }
    parsed
}

#[derive(Debug, Default)]
pub struct RobotsProbeOutcome {
    pub signals: RobotsSitemapSignals,
    pub disallowed_paths: Vec<String>,
}

/// Fetch `/robots.txt`, then walk declared (or default) sitemaps BFS,
/// bounded by [`MAX_SITEMAP_FETCHES`].
pub async fn probe_robots_and_sitemaps(
    fetcher: &PolicyFetcher,
    ctx: &FetchContext,
    origin: &Url,
) -> RobotsProbeOutcome {
    let mut out = RobotsProbeOutcome::default();

    let robots_url = origin.join("/robots.txt").map(|u| u.to_string());
    let mut parsed = ParsedRobots::default();
    if let Ok(robots_url) = robots_url {
        let response = fetcher
            .fetch(&robots_url, ctx, DiscoveredBy::Robots, &FetchOptions::default())
            .await;
        out.signals.robots_status = response.status_code;
        if response.ok {
            out.signals.robots_found = true;
            if let Some(body) = &response.body {
                parsed = parse_robots(body);
            }
        }
    }
    out.signals.disallow_count = parsed.disallow_count;
    out.signals.sitemaps_declared = parsed.sitemaps.clone();
    out.disallowed_paths = parsed.disallowed_paths;

    // Declared sitemaps win; only guess the well-known names when robots
    // declared none.
    let mut queue: VecDeque<String> = VecDeque::new();
    if parsed.sitemaps.is_empty() {
        for default in ["/sitemap.xml", "/sitemap_index.xml"] {
            if let Ok(u) = origin.join(default) {
                queue.push_back(u.to_string());
            }
        }
    } else {
        for declared in &parsed.sitemaps {
            match Url::parse(declared) {
                Ok(u) => queue.push_back(u.to_string()),
                Err(_) => {
                    if let Ok(u) = origin.join(declared) {
                        queue.push_back(u.to_string());
                    }
                }
            }
        }
    }

    let mut seen: Vec<String> = Vec::new();
    let mut fetched = 0usize;
    while let Some(sitemap_url) = queue.pop_front() {
        if fetched >= MAX_SITEMAP_FETCHES {
            break;
        }
        if seen.contains(&sitemap_url) {
            continue;
        }
        seen.push(sitemap_url.clone());
        fetched += 1;

        let response = fetcher
            .fetch(&sitemap_url, ctx, DiscoveredBy::Sitemap, &FetchOptions::default())
            .await;
        if !response.ok {
            continue;
        }
        out.signals.sitemap_found = true;
        let Some(body) = response.body else {
            continue;
        };

        if body.contains("<sitemapindex") {
            let budget = MAX_SITEMAP_FETCHES - fetched;
            for caps in LOC_REGEX.captures_iter(&body).take(budget) {
                if let Some(loc) = caps.get(1) {
                    queue.push_back(loc.as_str().to_string());
                }
            }
        } else {
            out.signals.sitemap_url_count += body.matches("<url>").count();
        }
    }
    out.signals.sitemaps_fetched = fetched;
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_disallows_only_in_star_block() {
        let robots = "\
User-agent: googlebot
Disallow: /private
Disallow: /tmp

User-agent: *
Disallow: /admin
Disallow: /cart
Sitemap: https://example.com/sitemap.xml
";
        let parsed = parse_robots(robots);
        assert_eq!(parsed.disallow_count, 2);
        assert_eq!(parsed.disallowed_paths, vec!["/admin", "/cart"]);
        assert_eq!(parsed.sitemaps, vec!["https://example.com/sitemap.xml"]);
    }

    #[test]
    fn parsing_is_case_insensitive_and_comment_aware() {
        let robots = "\
USER-AGENT: *
DISALLOW: /secret  # staging
disallow:
SITEMAP: https://example.com/map.xml
";
        let parsed = parse_robots(robots);
        // Empty Disallow means allow-all and is not counted.
        assert_eq!(parsed.disallow_count, 1);
        assert_eq!(parsed.sitemaps.len(), 1);
    }

    #[test]
    fn sitemap_value_keeps_url_colons() {
        let parsed = parse_robots("Sitemap: https://example.com:8443/sitemap.xml\n");
        assert_eq!(parsed.sitemaps, vec!["https://example.com:8443/sitemap.xml"]);
    }

    #[test]
    fn loc_regex_extracts_children() {
        let index = "<sitemapindex><sitemap><loc> https://example.com/a.xml </loc></sitemap>\
                     <sitemap><loc>https://example.com/b.xml</loc></sitemap></sitemapindex>";
        let locs: Vec<&str> = LOC_REGEX
            .captures_iter(index)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();
        assert_eq!(locs, vec!["https://example.com/a.xml", "https://example.com/b.xml"]);
    }

    #[test]
    fn url_count_ignores_urlset_tag() {
        let sitemap = "<urlset><url><loc>https://example.com/1</loc></url>\
                       <url><loc>https://example.com/2</loc></url></urlset>";
        assert_eq!(sitemap.matches("<url>").count(), 2);
    }
}
