//! Bill sources.
//!
//! Two interchangeable strategies behind [`BillSource`]: a Congress.gov-style
//! bills API and a manually supplied list. [`get_recent_bills`] applies the
//! fallback policy and never fails.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{AuditConfig, SourceKind};
use crate::transport::{Transport, fetch_best_effort};

/// A candidate bill before enrichment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BillStub {
    pub bill_number: Option<String>,
    pub title: Option<String>,
    pub status: Option<String>,
    pub raw_text_url: Option<String>,
}

const MANUAL_NUMBER_KEYS: &[&str] = &["bill_number", "bill", "number"];

impl BillStub {
    /// Build a stub from a loosely shaped JSON object.
    ///
    /// Returns `None` for anything that is not an object.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        Some(Self {
            bill_number: first_text(value, MANUAL_NUMBER_KEYS),
            title: first_text(value, &["title"]),
            status: first_text(value, &["status"]),
            raw_text_url: first_text(value, &["raw_text_url"]),
        })
    }
}

/// A strategy for producing recent bills.
#[async_trait]
pub trait BillSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Bills with activity since `since`. Failures yield an empty list.
    async fn fetch_bills(&self, since: DateTime<Utc>) -> Vec<BillStub>;
}

/// Gather recent bills according to `config`.
///
/// Manual mode reads only the manual list. API mode queries the bills API and
/// falls back to the manual list when that yields nothing.
pub async fn get_recent_bills(config: &AuditConfig, transport: Arc<dyn Transport>) -> Vec<BillStub> {
    let since = Utc::now()
        .checked_sub_signed(TimeDelta::hours(i64::from(config.target_hours)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    recent_bills_since(config, transport, since).await
}

/// [`get_recent_bills`] with an explicit window start.
pub async fn recent_bills_since(
    config: &AuditConfig,
    transport: Arc<dyn Transport>,
    since: DateTime<Utc>,
) -> Vec<BillStub> {
    info!(since = %since.to_rfc3339(), "gathering recent bills");

    let manual = ManualSource::from_config(config);
    if config.source == SourceKind::Manual {
        return manual.fetch_bills(since).await;
    }

    let api = CongressApiSource::from_config(config, transport);
    let bills = api.fetch_bills(since).await;
    if !bills.is_empty() {
        return bills;
    }

    info!(source = api.name(), "no bills from API; falling back to manual list");
    manual.fetch_bills(since).await
}

// ── Congress.gov-style API ──

/// Queries `{api_base}/bills` filtered by last action date.
pub struct CongressApiSource {
    transport: Arc<dyn Transport>,
    api_base: String,
    api_key: Option<String>,
}

impl CongressApiSource {
    pub fn new(
        transport: Arc<dyn Transport>,
        api_base: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            transport,
            api_base: api_base.into(),
            api_key,
        }
    }

    pub fn from_config(config: &AuditConfig, transport: Arc<dyn Transport>) -> Self {
        Self::new(transport, config.api_base.clone(), config.api_key.clone())
    }

    fn endpoint(&self, api_key: &str, since: DateTime<Utc>) -> Option<String> {
        let base = format!("{}/bills", self.api_base.trim_end_matches('/'));
        let date = since.format("%Y-%m-%d").to_string();
        reqwest::Url::parse_with_params(&base, &[("lastActionDate", date.as_str()), ("api_key", api_key)])
            .map_err(|e| warn!(base = %base, error = %e, "invalid bills API base URL"))
            .ok()
            .map(String::from)
    }
}

#[async_trait]
impl BillSource for CongressApiSource {
    fn name(&self) -> &str {
        "congress.gov"
    }

    async fn fetch_bills(&self, since: DateTime<Utc>) -> Vec<BillStub> {
        let Some(api_key) = self.api_key.as_deref() else {
            info!("no CONGRESS_GOV_API_KEY provided; skipping bills API");
            return Vec::new();
        };
        let Some(url) = self.endpoint(api_key, since) else {
            return Vec::new();
        };

        info!(
            endpoint = %self.api_base,
            last_action_date = %since.format("%Y-%m-%d"),
            "querying bills API"
        );
        let Some(body) = fetch_best_effort(self.transport.as_ref(), &url).await else {
            return Vec::new();
        };

        let data: Value = match serde_json::from_str(&body) {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "bills API returned invalid JSON");
                return Vec::new();
            }
        };

        let bills = parse_bills_response(&data);
        info!(count = bills.len(), "bills API returned bills");
        bills
    }
}

type Envelope = fn(&Value) -> Option<&Vec<Value>>;
type FieldStrategy = fn(&Value) -> Option<String>;

/// Envelope shapes, tried in order.
const ENVELOPES: &[(&str, Envelope)] = &[
    ("bills", bills_key),
    ("results", results_key),
    ("data.bills", nested_data_bills),
    ("top-level array", top_level_array),
];

const NUMBER_KEYS: &[&str] = &["number", "bill_number", "billNumber", "bill"];
const TYPE_KEYS: &[&str] = &["type", "billType"];
const TITLE_KEYS: &[&str] = &["title", "official_title", "short_title"];
const STATUS_KEYS: &[&str] = &["latestAction", "status", "latest_action"];

/// Raw-text URL locations, tried in order.
const RAW_TEXT_STRATEGIES: &[FieldStrategy] = &[url_field, document_list];

fn bills_key(data: &Value) -> Option<&Vec<Value>> {
    data.get("bills")?.as_array()
}

fn results_key(data: &Value) -> Option<&Vec<Value>> {
    data.get("results")?.as_array()
}

fn nested_data_bills(data: &Value) -> Option<&Vec<Value>> {
    data.get("data")?.get("bills")?.as_array()
}

fn top_level_array(data: &Value) -> Option<&Vec<Value>> {
    data.as_array()
}

/// Turn a bills API response into stubs, dropping items without a bill number.
pub fn parse_bills_response(data: &Value) -> Vec<BillStub> {
    let Some((shape, candidates)) = ENVELOPES
        .iter()
        .find_map(|(shape, probe)| probe(data).map(|items| (*shape, items)))
    else {
        debug!("bills API response has no recognizable bill list");
        return Vec::new();
    };
    debug!(shape, count = candidates.len(), "unwrapped bills API response");

    candidates.iter().filter_map(stub_from_api_item).collect()
}

fn stub_from_api_item(item: &Value) -> Option<BillStub> {
    let bill_number = api_bill_number(item)?;
    Some(BillStub {
        bill_number: Some(bill_number),
        title: first_text(item, TITLE_KEYS),
        status: Some(api_status(item)),
        raw_text_url: RAW_TEXT_STRATEGIES.iter().find_map(|strategy| strategy(item)),
    })
}

/// Bill number, prefixed with the bill type when the number is bare digits.
fn api_bill_number(item: &Value) -> Option<String> {
    let number = first_text(item, NUMBER_KEYS)?;
    if number.chars().all(|c| c.is_ascii_digit()) {
        if let Some(kind) = first_text(item, TYPE_KEYS) {
            return Some(format!("{} {}", kind, number));
        }
    }
    Some(number)
}

fn api_status(item: &Value) -> String {
    STATUS_KEYS
        .iter()
        .filter_map(|key| item.get(key))
        .find_map(|value| text_value(value).or_else(|| value.get("text").and_then(text_value)))
        .unwrap_or_default()
}

fn url_field(item: &Value) -> Option<String> {
    ["urls", "url", "document_url"]
        .iter()
        .filter_map(|key| item.get(key))
        .find_map(|value| match value {
            Value::Object(_) => first_text(value, &["text", "raw", "pdf"]),
            other => text_value(other),
        })
}

fn document_list(item: &Value) -> Option<String> {
    ["documents", "congressdotgov_url"]
        .iter()
        .filter_map(|key| item.get(key)?.as_array())
        .flatten()
        .find_map(|doc| first_text(doc, &["pdf_url", "document_url", "url"]))
}

fn first_text(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| text_value(value.get(key)?))
}

fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ── Manual list ──

/// Bills supplied inline through the environment or in a local JSON file.
pub struct ManualSource {
    inline: Option<String>,
    file: PathBuf,
}

impl ManualSource {
    pub fn new(inline: Option<String>, file: impl Into<PathBuf>) -> Self {
        Self {
            inline,
            file: file.into(),
        }
    }

    pub fn from_config(config: &AuditConfig) -> Self {
        Self::new(config.manual_json.clone(), config.manual_file.clone())
    }

    /// Inline payload first; a malformed payload falls through to the file.
    pub fn load(&self) -> Vec<BillStub> {
        if let Some(payload) = &self.inline {
            match serde_json::from_str::<Value>(payload) {
                Ok(data) => {
                    let bills = stubs_from_array(&data);
                    info!(count = bills.len(), "loaded manual bills from RECENT_BILLS_JSON");
                    return bills;
                }
                Err(e) => warn!(error = %e, "RECENT_BILLS_JSON parse failed"),
            }
        }

        if self.file.exists() {
            let data = fs::read_to_string(&self.file)
                .map_err(|e| e.to_string())
                .and_then(|content| {
                    serde_json::from_str::<Value>(&content).map_err(|e| e.to_string())
                });
            return match data {
                Ok(data) => {
                    let bills = stubs_from_array(&data);
                    info!(
                        count = bills.len(),
                        path = %self.file.display(),
                        "loaded manual bills from file"
                    );
                    bills
                }
                Err(e) => {
                    warn!(path = %self.file.display(), error = %e, "failed to read manual bills file");
                    Vec::new()
                }
            };
        }

        info!("no manual bills provided");
        Vec::new()
    }
}

#[async_trait]
impl BillSource for ManualSource {
    fn name(&self) -> &str {
        "manual"
    }

    async fn fetch_bills(&self, _since: DateTime<Utc>) -> Vec<BillStub> {
        self.load()
    }
}

fn stubs_from_array(data: &Value) -> Vec<BillStub> {
    match data.as_array() {
        Some(items) => items.iter().filter_map(BillStub::from_value).collect(),
        None => {
            warn!("manual bills payload is not a JSON array");
            Vec::new()
        }
    }
}
