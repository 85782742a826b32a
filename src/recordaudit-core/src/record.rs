//! Per-bill record compilation and persistence.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::bill_number::cbo_url;
use crate::config::AuditConfig;
use crate::cost_estimate::{self, CostEstimateResult};
use crate::error::AuditError;
use crate::gao::{self, ReportRef};
use crate::source::BillStub;
use crate::transport::{Transport, fetch_best_effort};

/// Structured output for one bill.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BillRecord {
    pub bill_number: Option<String>,
    pub title: Option<String>,
    pub status: Option<String>,
    pub raw_text_url: Option<String>,
    pub fetched_at: DateTime<Utc>,
    pub cbo_url: Option<String>,
    pub cbo: Option<CostEstimateResult>,
    pub gao_reports: Vec<ReportRef>,
}

/// Enriches bill stubs with CBO and GAO data.
pub struct RecordCompiler {
    transport: Arc<dyn Transport>,
    cbo_base: String,
    gao_base: String,
}

impl RecordCompiler {
    pub fn new(
        transport: Arc<dyn Transport>,
        cbo_base: impl Into<String>,
        gao_base: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            cbo_base: cbo_base.into(),
            gao_base: gao_base.into(),
        }
    }

    pub fn from_config(config: &AuditConfig, transport: Arc<dyn Transport>) -> Self {
        Self::new(transport, config.cbo_base.clone(), config.gao_base.clone())
    }

    /// Build the record for one stub. Lookups that fail leave their fields empty.
    pub async fn compile(&self, stub: &BillStub) -> BillRecord {
        let bill_number = stub.bill_number.clone();

        let cbo_url = bill_number
            .as_deref()
            .and_then(|number| cbo_url(&self.cbo_base, number));
        let cbo = match &cbo_url {
            Some(url) => self.fetch_cost_estimate(bill_number.as_deref(), url).await,
            None => None,
        };

        let gao_reports = match bill_number.as_deref() {
            Some(number) => gao::find_reports(self.transport.as_ref(), &self.gao_base, number).await,
            None => Vec::new(),
        };

        BillRecord {
            bill_number,
            title: stub.title.clone(),
            status: stub.status.clone(),
            raw_text_url: stub.raw_text_url.clone(),
            fetched_at: Utc::now(),
            cbo_url,
            cbo,
            gao_reports,
        }
    }

    async fn fetch_cost_estimate(&self, bill: Option<&str>, url: &str) -> Option<CostEstimateResult> {
        info!(bill = bill.unwrap_or("?"), url = %url, "fetching CBO cost estimate");
        match fetch_best_effort(self.transport.as_ref(), url).await {
            Some(page) => Some(cost_estimate::extract(&page)),
            None => {
                info!(url = %url, "no CBO page found");
                None
            }
        }
    }
}

/// Filesystem-safe form of a bill number.
pub fn sanitize_bill_number(bill_number: Option<&str>) -> String {
    match bill_number.map(str::trim).filter(|s| !s.is_empty()) {
        Some(number) => number
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect(),
        None => "unknown".to_string(),
    }
}

/// Compact UTC timestamp used in artifact names.
pub fn compact_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Write `record` as pretty JSON under `dir`, returning the file path.
pub fn save_record(record: &BillRecord, dir: &Path) -> Result<PathBuf, AuditError> {
    fs::create_dir_all(dir)?;

    let stem = format!(
        "record_{}_{}",
        sanitize_bill_number(record.bill_number.as_deref()),
        compact_timestamp(record.fetched_at)
    );
    let content = serde_json::to_string_pretty(record)?;

    // same bill within the same second gets a numeric suffix
    let mut suffix = 0;
    loop {
        let filename = match suffix {
            0 => format!("{stem}.json"),
            n => format!("{stem}_{n}.json"),
        };
        let path = dir.join(filename);
        match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(content.as_bytes())?;
                return Ok(path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => suffix += 1,
            Err(e) => return Err(e.into()),
        }
    }
}

/// The most recently fetched record in `dir`.
pub fn load_latest_record(dir: &Path) -> Result<BillRecord, AuditError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AuditError::NoRecords(dir.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    let mut latest: Option<BillRecord> = None;
    for entry in entries {
        let path = entry?.path();
        let is_record = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("record_") && n.ends_with(".json"));
        if !is_record {
            continue;
        }

        let record = match fs::read_to_string(&path)
            .map_err(AuditError::from)
            .and_then(|content| serde_json::from_str::<BillRecord>(&content).map_err(AuditError::from))
        {
            Ok(record) => record,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable record");
                continue;
            }
        };

        if latest.as_ref().is_none_or(|current| record.fetched_at > current.fetched_at) {
            latest = Some(record);
        }
    }

    latest.ok_or_else(|| AuditError::NoRecords(dir.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::fixtures::FixtureTransport;
    use chrono::TimeZone;

    const CBO_PAGE: &str = r#"<html><body>
        <h1>Cost Estimate</h1>
        <p>Enacting the bill would result in $3 million in net savings for beneficiaries.</p>
        <p>CBO expects 40,000 families to enroll.</p>
        </body></html>"#;

    fn compiler(transport: FixtureTransport) -> RecordCompiler {
        RecordCompiler::new(Arc::new(transport), "https://cbo.test", "https://gao.test")
    }

    fn stub(bill_number: Option<&str>) -> BillStub {
        BillStub {
            bill_number: bill_number.map(str::to_string),
            title: Some("A bill".to_string()),
            status: Some("Introduced".to_string()),
            raw_text_url: Some("https://example/text".to_string()),
        }
    }

    #[tokio::test]
    async fn test_compile_with_cbo_and_gao() {
        let transport = FixtureTransport::new()
            .with_page("https://cbo.test/cost-estimates/hr/1", CBO_PAGE)
            .with_page(
                "https://gao.test/search?query=H.R.+1",
                r#"<h3><a href="/products/gao-1">Report</a></h3>"#,
            );

        let record = compiler(transport).compile(&stub(Some("H.R. 1"))).await;

        assert_eq!(record.cbo_url.as_deref(), Some("https://cbo.test/cost-estimates/hr/1"));
        let cbo = record.cbo.unwrap();
        assert_eq!(cbo.score_value, Some(3_000_000.0));
        assert_eq!(cbo.score_unit.as_deref(), Some("dollars"));
        assert_eq!(cbo.affected_sentences.len(), 2);
        assert_eq!(record.gao_reports.len(), 1);
        assert_eq!(record.title.as_deref(), Some("A bill"));
    }

    #[tokio::test]
    async fn test_unresolvable_bill_number() {
        let transport = FixtureTransport::new();
        let record = compiler(transport).compile(&stub(Some("Amendment 12b"))).await;

        assert_eq!(record.cbo_url, None);
        assert_eq!(record.cbo, None);
        assert!(record.gao_reports.is_empty());
        assert_eq!(record.bill_number.as_deref(), Some("Amendment 12b"));
    }

    #[tokio::test]
    async fn test_missing_bill_number_skips_lookups() {
        let transport = Arc::new(FixtureTransport::new());
        let compiler = RecordCompiler::new(transport.clone(), "https://cbo.test", "https://gao.test");
        let record = compiler.compile(&stub(None)).await;

        assert_eq!(record.cbo_url, None);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_cbo_fetch_failure_leaves_cbo_null() {
        let record = compiler(FixtureTransport::new()).compile(&stub(Some("S. 2"))).await;
        assert_eq!(record.cbo_url.as_deref(), Some("https://cbo.test/cost-estimates/s/2"));
        assert_eq!(record.cbo, None);
    }

    #[test]
    fn test_sanitize_bill_number() {
        assert_eq!(sanitize_bill_number(Some("H.R. 1")), "H.R._1");
        assert_eq!(sanitize_bill_number(Some("S/2 a")), "S_2_a");
        assert_eq!(sanitize_bill_number(Some("  ")), "unknown");
        assert_eq!(sanitize_bill_number(None), "unknown");
    }

    fn sample_record(bill: &str, fetched_at: DateTime<Utc>) -> BillRecord {
        BillRecord {
            bill_number: Some(bill.to_string()),
            title: None,
            status: None,
            raw_text_url: None,
            fetched_at,
            cbo_url: None,
            cbo: None,
            gao_reports: Vec::new(),
        }
    }

    #[test]
    fn test_save_record_layout() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("artifacts");
        let at = Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 5).unwrap();

        let path = save_record(&sample_record("H.R. 1", at), &out).unwrap();
        assert_eq!(path, out.join("record_H.R._1_20261018T093005Z.json"));

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["bill_number"], "H.R. 1");
        assert_eq!(json["fetched_at"], "2026-10-18T09:30:05Z");
        assert!(json["cbo"].is_null());
        assert!(json["cbo_url"].is_null());
        assert_eq!(json["gao_reports"], serde_json::json!([]));
    }

    #[test]
    fn test_save_record_same_second_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let at = Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 5).unwrap();
        let mut second = sample_record("H.R. 1", at);
        second.title = Some("Second copy".to_string());

        let first_path = save_record(&sample_record("H.R. 1", at), dir.path()).unwrap();
        let second_path = save_record(&second, dir.path()).unwrap();
        let third_path = save_record(&sample_record("H.R. 1", at), dir.path()).unwrap();

        assert_eq!(first_path, dir.path().join("record_H.R._1_20261018T093005Z.json"));
        assert_eq!(second_path, dir.path().join("record_H.R._1_20261018T093005Z_1.json"));
        assert_eq!(third_path, dir.path().join("record_H.R._1_20261018T093005Z_2.json"));

        let first: BillRecord =
            serde_json::from_str(&fs::read_to_string(&first_path).unwrap()).unwrap();
        let second: BillRecord =
            serde_json::from_str(&fs::read_to_string(&second_path).unwrap()).unwrap();
        assert_eq!(first.title, None);
        assert_eq!(second.title.as_deref(), Some("Second copy"));
    }

    #[test]
    fn test_load_latest_record() {
        let dir = tempfile::tempdir().unwrap();
        let older = Utc.with_ymd_and_hms(2026, 10, 17, 8, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2026, 10, 18, 8, 0, 0).unwrap();

        save_record(&sample_record("S. 2", newer), dir.path()).unwrap();
        save_record(&sample_record("H.R. 1", older), dir.path()).unwrap();
        fs::write(dir.path().join("record_broken.json"), "{").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let latest = load_latest_record(dir.path()).unwrap();
        assert_eq!(latest.bill_number.as_deref(), Some("S. 2"));
    }

    #[test]
    fn test_load_latest_record_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_latest_record(dir.path()),
            Err(AuditError::NoRecords(_))
        ));
        assert!(matches!(
            load_latest_record(&dir.path().join("missing")),
            Err(AuditError::NoRecords(_))
        ));
    }
}
