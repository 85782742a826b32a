//! Collection run.
//!
//! Processes bills one at a time in source order: compile, persist, pause.
//! A failure on one bill is logged and counted and the loop moves on.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::AuditConfig;
use crate::error::AuditError;
use crate::record::{BillRecord, RecordCompiler, save_record};
use crate::source::{BillStub, get_recent_bills};
use crate::transport::Transport;

/// Callback for collection events.
pub type CollectCallback = Box<dyn Fn(CollectEvent) + Send + Sync>;

/// Events emitted during a run.
#[derive(Debug, Clone)]
pub enum CollectEvent {
    /// Sources have been queried.
    BillsFound { count: usize },
    /// A bill is about to be compiled.
    BillStart {
        index: usize,
        total: usize,
        bill_number: Option<String>,
    },
    /// A record was written.
    RecordSaved {
        bill_number: Option<String>,
        path: PathBuf,
        score_value: Option<f64>,
        gao_reports: usize,
    },
    /// A bill could not be processed.
    BillFailed {
        bill_number: Option<String>,
        error: String,
    },
}

/// Outcome of a run.
#[derive(Debug, Clone, Default)]
pub struct CollectSummary {
    pub found: usize,
    pub saved: Vec<PathBuf>,
    pub failed: usize,
}

/// Drives source selection, record compilation and persistence.
pub struct Collector {
    config: AuditConfig,
    transport: Arc<dyn Transport>,
    compiler: RecordCompiler,
    callback: Option<CollectCallback>,
}

impl Collector {
    pub fn new(config: AuditConfig, transport: Arc<dyn Transport>) -> Self {
        let compiler = RecordCompiler::from_config(&config, Arc::clone(&transport));
        Self {
            config,
            transport,
            compiler,
            callback: None,
        }
    }

    /// Set a callback for collection events.
    pub fn with_callback(mut self, callback: CollectCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Gather recent bills and process each of them.
    pub async fn run(&self) -> CollectSummary {
        let bills = get_recent_bills(&self.config, Arc::clone(&self.transport)).await;
        self.emit_event(CollectEvent::BillsFound { count: bills.len() });

        if bills.is_empty() {
            info!("no bills found by any source; nothing to write");
            return CollectSummary::default();
        }

        self.process_bills(&bills).await
    }

    /// Compile and persist `bills` sequentially with a pause between them.
    pub async fn process_bills(&self, bills: &[BillStub]) -> CollectSummary {
        info!(count = bills.len(), "processing bills");
        let mut summary = CollectSummary {
            found: bills.len(),
            ..Default::default()
        };

        for (index, stub) in bills.iter().enumerate() {
            if index > 0 && !self.config.pause.is_zero() {
                tokio::time::sleep(self.config.pause).await;
            }

            self.emit_event(CollectEvent::BillStart {
                index,
                total: bills.len(),
                bill_number: stub.bill_number.clone(),
            });

            match self.process_one(stub).await {
                Ok((record, path)) => {
                    self.emit_event(CollectEvent::RecordSaved {
                        bill_number: record.bill_number.clone(),
                        path: path.clone(),
                        score_value: record.cbo.as_ref().and_then(|c| c.score_value),
                        gao_reports: record.gao_reports.len(),
                    });
                    summary.saved.push(path);
                }
                Err(e) => {
                    warn!(bill = ?stub.bill_number, error = %e, "failed to process bill");
                    self.emit_event(CollectEvent::BillFailed {
                        bill_number: stub.bill_number.clone(),
                        error: e.to_string(),
                    });
                    summary.failed += 1;
                }
            }
        }

        info!(
            saved = summary.saved.len(),
            failed = summary.failed,
            dir = %self.config.artifacts_dir.display(),
            "collection finished"
        );
        summary
    }

    async fn process_one(&self, stub: &BillStub) -> Result<(BillRecord, PathBuf), AuditError> {
        let record = self.compiler.compile(stub).await;
        let path = save_record(&record, &self.config.artifacts_dir)?;
        Ok((record, path))
    }

    /// Emit an event if a callback is registered.
    fn emit_event(&self, event: CollectEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }
}
