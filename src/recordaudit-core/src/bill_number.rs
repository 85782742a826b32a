//! Bill-number normalization.
//!
//! Turns free-form identifiers such as `"H.R. 1"`, `"hr-12"` or `"S. 2"` into
//! a canonical `{chamber, number}` pair used to build deterministic URLs.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::AuditError;

static HOUSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:H\.?R\.?|H\.?)-?(\d+)$").unwrap());
static SENATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^S\.?-?(\d+)$").unwrap());
static FALLBACK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z]+).*?(\d+)$").unwrap());
static REPEATED_DOTS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.{2,}").unwrap());
static REPEATED_DASHES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-{2,}").unwrap());

/// Chamber a bill originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chamber {
    House,
    Senate,
}

impl Chamber {
    /// URL slug used by CBO (`hr` / `s`).
    pub fn slug(&self) -> &'static str {
        match self {
            Chamber::House => "hr",
            Chamber::Senate => "s",
        }
    }
}

/// Canonical bill identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BillId {
    pub chamber: Chamber,
    pub number: String,
}

impl fmt::Display for BillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.chamber.slug(), self.number)
    }
}

/// Normalize a raw bill number.
///
/// Rules are tried in a fixed order and the first match wins:
/// House forms, then Senate forms, then a loose `PREFIX...DIGITS` fallback.
pub fn normalize(raw: &str) -> Result<BillId, AuditError> {
    let unrecognized = || AuditError::UnrecognizedBillNumber(raw.to_string());

    let compact: String = raw
        .trim()
        .to_uppercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let compact = REPEATED_DOTS.replace_all(&compact, ".");
    let cleaned = REPEATED_DASHES.replace_all(&compact, "-");

    let (chamber, digits) = if let Some(caps) = HOUSE_RE.captures(&cleaned) {
        (Chamber::House, caps[1].to_string())
    } else if let Some(caps) = SENATE_RE.captures(&cleaned) {
        (Chamber::Senate, caps[1].to_string())
    } else {
        let undotted = cleaned.replace('.', "");
        let caps = FALLBACK_RE.captures(&undotted).ok_or_else(unrecognized)?;
        let chamber = match &caps[1] {
            p if p.starts_with('H') => Chamber::House,
            p if p.starts_with('S') => Chamber::Senate,
            _ => return Err(unrecognized()),
        };
        (chamber, caps[2].to_string())
    };

    let number = digits.trim_start_matches('0');
    if number.is_empty() {
        return Err(unrecognized());
    }

    Ok(BillId {
        chamber,
        number: number.to_string(),
    })
}

/// CBO cost-estimate URL for a raw bill number, if it can be normalized.
pub fn cbo_url(cbo_base: &str, raw: &str) -> Option<String> {
    let id = normalize(raw).ok()?;
    Some(format!(
        "{}/cost-estimates/{}/{}",
        cbo_base.trim_end_matches('/'),
        id.chamber.slug(),
        id.number
    ))
}
