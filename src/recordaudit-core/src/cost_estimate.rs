//! Heuristic extraction from CBO cost-estimate pages.
//!
//! Two independent passes over the page text:
//! 1. locate the first monetary token whose surrounding window mentions a
//!    budget keyword and normalize it to dollars;
//! 2. collect sentences that quantify an affected group.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Characters inspected on each side of a monetary token.
const KEYWORD_WINDOW: usize = 200;
/// Upper bound on the stored score excerpt.
const MAX_SCORE_TEXT_CHARS: usize = 1000;
/// Upper bound on affected-group sentences kept per document.
const MAX_AFFECTED_SENTENCES: usize = 20;

const SCORE_KEYWORDS: &[&str] = &[
    "cost", "estimate", "increase", "decrease", "deficit", "savings", "budget", "net", "spending",
];

const GROUP_KEYWORDS: &[&str] = &[
    "uninsured",
    "household",
    "households",
    "families",
    "children",
    "seniors",
    "elderly",
    "low-income",
    "benefit",
    "beneficiaries",
    "workers",
    "employers",
    "individuals",
    "people",
];

static MONEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\$|USD)?\s*([0-9][0-9,]*(?:\.[0-9]+)?)\s*(thousand|million|billion)?")
        .unwrap()
});
static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d[\d,.]*\b").unwrap());
static SENTENCE_END_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]\s+").unwrap());

static INVISIBLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script[^>]*>.*?</script>|<style[^>]*>.*?</style>|<!--.*?-->").unwrap()
});
/// A tag must start right after `<`; a bare `<` or `>` in prose is text.
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[A-Za-z/!?][^>]*>").unwrap());
static NUMERIC_ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(x[0-9a-fA-F]+|\d+);").unwrap());
static BLANK_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s+\n").unwrap());

/// Result of a single extraction. All score fields are absent when no
/// qualifying monetary mention was found.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CostEstimateResult {
    pub score_text: Option<String>,
    pub score_value: Option<f64>,
    pub score_unit: Option<String>,
    pub affected_sentences: Vec<String>,
}

/// A monetary token accepted as the document's score.
#[derive(Debug, Clone, PartialEq)]
struct ScoreMatch {
    excerpt: String,
    literal: String,
    magnitude: Option<String>,
}

/// Run both passes over an HTML page or plain text.
pub fn extract(html_or_text: &str) -> CostEstimateResult {
    let text = html_to_text(html_or_text);

    let mut result = CostEstimateResult {
        affected_sentences: affected_sentences(&text),
        ..Default::default()
    };

    if let Some(score) = find_score(&text) {
        result.score_value = parse_amount(&score.literal, score.magnitude.as_deref());
        if result.score_value.is_some() {
            result.score_unit = Some("dollars".to_string());
        }
        result.score_text = Some(score.excerpt);
    }

    result
}

/// Strip markup down to text, one line per tag boundary.
pub fn html_to_text(html: &str) -> String {
    let visible = INVISIBLE_RE.replace_all(html, "");
    let text = TAG_RE.replace_all(&visible, "\n");
    let text = decode_entities(&text);
    BLANK_RUN_RE.replace_all(&text, "\n\n").into_owned()
}

/// Decode the handful of entities that show up in CBO and GAO markup.
pub(crate) fn decode_entities(text: &str) -> String {
    let named = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'");

    let numeric = NUMERIC_ENTITY_RE.replace_all(&named, |caps: &regex::Captures| {
        let code = &caps[1];
        let value = match code.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse::<u32>().ok(),
        };
        value
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });

    // &amp; last so "&amp;lt;" stays literal
    numeric.replace("&amp;", "&")
}

/// Pass 1: first monetary token with a budget keyword nearby.
fn find_score(text: &str) -> Option<ScoreMatch> {
    MONEY_RE.captures_iter(text).find_map(|caps| {
        let whole = caps.get(0)?;
        let excerpt = char_window(text, whole.start(), whole.end(), KEYWORD_WINDOW);
        let lowered = excerpt.to_lowercase();
        if !SCORE_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            return None;
        }

        Some(ScoreMatch {
            excerpt: excerpt.trim().chars().take(MAX_SCORE_TEXT_CHARS).collect(),
            literal: caps[2].to_string(),
            magnitude: caps.get(3).map(|m| m.as_str().to_string()),
        })
    })
}

/// Slice `radius` characters either side of `start..end`, clamped to the text.
fn char_window(text: &str, start: usize, end: usize, radius: usize) -> &str {
    let from = text[..start]
        .char_indices()
        .rev()
        .nth(radius.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let to = text[end..]
        .char_indices()
        .nth(radius)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());
    &text[from..to]
}

/// Convert a literal like `"1,200.5"` plus a magnitude word into dollars.
fn parse_amount(literal: &str, magnitude: Option<&str>) -> Option<f64> {
    let value: f64 = literal.replace(',', "").parse().ok()?;
    let multiplier = match magnitude.map(str::to_lowercase) {
        Some(m) if m.starts_with('b') => 1_000_000_000.0,
        Some(m) if m.starts_with('m') => 1_000_000.0,
        Some(m) if m.starts_with("th") => 1_000.0,
        _ => 1.0,
    };
    Some(value * multiplier)
}

/// Pass 2: sentences mentioning a number and an affected group.
fn affected_sentences(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();

    split_sentences(text)
        .into_iter()
        .filter(|s| is_affected_group_sentence(s))
        .filter(|s| seen.insert(s.to_string()))
        .take(MAX_AFFECTED_SENTENCES)
        .map(str::to_string)
        .collect()
}

fn is_affected_group_sentence(sentence: &str) -> bool {
    if !NUMBER_RE.is_match(sentence) {
        return false;
    }
    let lowered = sentence.to_lowercase();
    GROUP_KEYWORDS.iter().any(|k| lowered.contains(k))
}

/// Split after terminal punctuation that is followed by whitespace.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for m in SENTENCE_END_RE.find_iter(text) {
        // keep the punctuation mark, drop the whitespace
        let end = m.start() + 1;
        sentences.push(text[start..end].trim());
        start = m.end();
    }
    sentences.push(text[start..].trim());

    sentences.retain(|s| !s.is_empty());
    sentences
}
