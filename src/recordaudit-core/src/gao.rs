//! Best-effort GAO report search.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cost_estimate::decode_entities;
use crate::transport::{Transport, fetch_best_effort};

/// Most result links read from one search page.
const MAX_RESULTS: usize = 10;

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h3\b[^>]*>(.*?)</h3>").unwrap());
static ANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<a\b([^>]*)>(.*?)</a>").unwrap());
static HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#).unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// A related GAO report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportRef {
    pub title: String,
    pub url: String,
}

/// Search GAO for `bill_number`. Any transport failure yields no reports.
pub async fn find_reports(
    transport: &dyn Transport,
    gao_base: &str,
    bill_number: &str,
) -> Vec<ReportRef> {
    let base = gao_base.trim_end_matches('/');
    let url = format!("{}/search?query={}", base, bill_number.trim().replace(' ', "+"));

    let Some(page) = fetch_best_effort(transport, &url).await else {
        return Vec::new();
    };

    let reports = parse_search_results(&page, base);
    debug!(bill = %bill_number, count = reports.len(), "GAO search parsed");
    reports
}

/// Links inside `<h3>` result headings, first ten only.
pub fn parse_search_results(html: &str, gao_base: &str) -> Vec<ReportRef> {
    HEADING_RE
        .captures_iter(html)
        .flat_map(|heading| {
            ANCHOR_RE
                .captures_iter(heading.get(1).map_or("", |m| m.as_str()))
                .map(|anchor| (anchor[1].to_string(), anchor[2].to_string()))
                .collect::<Vec<_>>()
        })
        .take(MAX_RESULTS)
        .filter_map(|(attrs, inner)| {
            let href = href_value(&attrs)?;
            Some(ReportRef {
                title: anchor_text(&inner),
                url: absolutize(&href, gao_base),
            })
        })
        .collect()
}

fn href_value(attrs: &str) -> Option<String> {
    let caps = HREF_RE.captures(attrs)?;
    let raw = caps.get(1).or(caps.get(2)).or(caps.get(3))?.as_str().trim();
    if raw.is_empty() {
        return None;
    }
    Some(decode_entities(raw))
}

fn anchor_text(inner: &str) -> String {
    let text = TAG_RE.replace_all(inner, "");
    let text = decode_entities(&text);
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

fn absolutize(href: &str, gao_base: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else if href.starts_with('/') {
        format!("{}{}", gao_base, href)
    } else {
        format!("{}/{}", gao_base, href)
    }
}
