//! Unfiltered Record core library.
//!
//! Collects recently-acted-upon congressional bills, enriches each with its
//! CBO cost estimate and related GAO reports, persists one JSON record per
//! bill, and narrates a record as a short audio brief.

pub mod audio;
pub mod bill_number;
pub mod collector;
pub mod config;
pub mod cost_estimate;
pub mod error;
pub mod gao;
pub mod narrator;
pub mod record;
pub mod source;
pub mod speech;
pub mod transport;

pub use audio::{AudioClip, AudioMixer, WavMixer};
pub use bill_number::{BillId, Chamber, normalize};
pub use collector::{CollectEvent, CollectSummary, Collector};
pub use config::{AuditConfig, NarrationConfig, ServiceEndpoints, SourceKind};
pub use cost_estimate::CostEstimateResult;
pub use error::AuditError;
pub use gao::ReportRef;
pub use narrator::{Narration, Narrator, OpenAiTextGenerator, TextGenerator};
pub use record::{BillRecord, RecordCompiler, load_latest_record, save_record};
pub use source::{BillSource, BillStub, get_recent_bills};
pub use speech::{HttpSpeechSynthesizer, SpeechSynthesizer};
pub use transport::{HttpTransport, Transport};
