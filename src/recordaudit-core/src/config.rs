//! Configuration: environment settings for collection and an optional TOML
//! file for narration.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::AuditError;

pub const DEFAULT_API_BASE: &str = "https://api.congress.gov/v3";
pub const DEFAULT_CBO_BASE: &str = "https://www.cbo.gov";
pub const DEFAULT_GAO_BASE: &str = "https://www.gao.gov";
pub const DEFAULT_OPENAI_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_USER_AGENT: &str =
    "unfiltered-record-audit-bot/1.0 (+https://github.com/unfilteredrecordofficial)";

/// Where recent bills come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Congress.gov-style bills API, falling back to the manual list.
    CongressApi,
    /// Manual list only.
    Manual,
}

impl From<&str> for SourceKind {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "manual" => SourceKind::Manual,
            _ => SourceKind::CongressApi,
        }
    }
}

/// Settings for the collection run.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub source: SourceKind,
    pub api_key: Option<String>,
    pub api_base: String,
    /// Recency window for the bills API.
    pub target_hours: u32,
    pub artifacts_dir: PathBuf,
    pub request_timeout: Duration,
    pub user_agent: String,
    /// Inline manual stubs (JSON array).
    pub manual_json: Option<String>,
    pub manual_file: PathBuf,
    pub cbo_base: String,
    pub gao_base: String,
    /// Pause between consecutive bills.
    pub pause: Duration,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::CongressApi,
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            target_hours: 48,
            artifacts_dir: PathBuf::from("artifacts"),
            request_timeout: Duration::from_secs(15),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            manual_json: None,
            manual_file: PathBuf::from("recent_bills.json"),
            cbo_base: DEFAULT_CBO_BASE.to_string(),
            gao_base: DEFAULT_GAO_BASE.to_string(),
            pause: Duration::from_secs(1),
        }
    }
}

impl AuditConfig {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, AuditError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AuditError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            source: get("BILLS_SOURCE")
                .map(|s| SourceKind::from(s.as_str()))
                .unwrap_or(defaults.source),
            api_key: get("CONGRESS_GOV_API_KEY"),
            api_base: get("CONGRESS_GOV_API_BASE").unwrap_or(defaults.api_base),
            target_hours: parse_number(get("TARGET_HOURS"), "TARGET_HOURS")?
                .unwrap_or(defaults.target_hours),
            artifacts_dir: get("ARTIFACTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.artifacts_dir),
            request_timeout: parse_number(get("REQUEST_TIMEOUT"), "REQUEST_TIMEOUT")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            user_agent: get("USER_AGENT").unwrap_or(defaults.user_agent),
            manual_json: get("RECENT_BILLS_JSON"),
            manual_file: get("RECENT_BILLS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.manual_file),
            cbo_base: get("CBO_BASE_URL").unwrap_or(defaults.cbo_base),
            gao_base: get("GAO_BASE_URL").unwrap_or(defaults.gao_base),
            pause: defaults.pause,
        })
    }
}

fn parse_number<T>(value: Option<String>, key: &str) -> Result<Option<T>, AuditError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|e| AuditError::Config(format!("{} must be a whole number: {}", key, e)))
        })
        .transpose()
}

/// Credentials and base URLs for the hosted narration services.
#[derive(Debug, Clone)]
pub struct ServiceEndpoints {
    pub openai_base: String,
    pub openai_key: String,
    pub tts_base: String,
    pub tts_key: String,
}

impl ServiceEndpoints {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let openai_base = get("OPENAI_API_BASE")
            .or_else(|| get("OPENAI_BASE_URL"))
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE.to_string());
        let openai_key = get("OPENAI_API_KEY").unwrap_or_default();

        Self {
            tts_base: get("TTS_API_BASE").unwrap_or_else(|| openai_base.clone()),
            tts_key: get("TTS_API_KEY").unwrap_or_else(|| openai_key.clone()),
            openai_base,
            openai_key,
        }
    }
}

/// Root narration configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NarrationConfig {
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
}

/// Text-generation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    pub model: String,
    pub max_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 450,
        }
    }
}

/// Speech-synthesis settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SpeechConfig {
    pub model: String,
    pub voice: String,
    /// Longest input sent in one synthesis request.
    #[serde(default = "default_chunk_chars")]
    pub max_chunk_chars: usize,
}

fn default_chunk_chars() -> usize {
    4000
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            model: "tts-1".to_string(),
            voice: "alloy".to_string(),
            max_chunk_chars: default_chunk_chars(),
        }
    }
}

/// Stitching settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    pub intro_path: PathBuf,
    pub gap_seconds: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            intro_path: PathBuf::from("assets/intro.wav"),
            gap_seconds: 0.5,
        }
    }
}

/// Prompt templates.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptsConfig {
    pub system: String,
    pub summary_template: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            system: DEFAULT_SYSTEM_PROMPT.to_string(),
            summary_template: DEFAULT_SUMMARY_TEMPLATE.to_string(),
        }
    }
}

impl Default for NarrationConfig {
    fn default() -> Self {
        default_config()
    }
}

impl NarrationConfig {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AuditError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| AuditError::Config(format!("Failed to read config: {}", e)))?;

        Self::from_str(&content)
    }

    /// Load configuration from string content.
    pub fn from_str(content: &str) -> Result<Self, AuditError> {
        toml::from_str(content)
            .map_err(|e| AuditError::Config(format!("Failed to parse config: {}", e)))
    }
}

/// Default configuration embedded in the binary.
pub fn default_config() -> NarrationConfig {
    NarrationConfig {
        generation: GenerationConfig::default(),
        speech: SpeechConfig::default(),
        audio: AudioConfig::default(),
        prompts: PromptsConfig::default(),
    }
}

const DEFAULT_SYSTEM_PROMPT: &str = r#"You are the narrator of a short daily audio brief about bills moving through the United States Congress.

STYLE:
- Plain, neutral, factual language suitable for a general audience
- Lead with what the bill does, then what it costs, then who it affects
- Quote dollar figures and counts exactly as given; never invent numbers
- If a cost estimate or oversight report is missing, say so briefly

CRITICAL OUTPUT RULES:
- Output ONLY the words to be spoken, in at most three short paragraphs
- Do NOT include headings, bullet points, stage directions or markdown
- Do NOT include text in parentheses or asterisks
"#;

const DEFAULT_SUMMARY_TEMPLATE: &str = r#"Write the narration for this bill.

BILL: {bill_number}
TITLE: {title}
LATEST STATUS: {status}

CBO COST ESTIMATE: {score}

AFFECTED GROUPS (sentences quoted from the CBO estimate):
{affected}

RELATED GAO REPORTS:
{gao}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AuditConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.source, SourceKind::CongressApi);
        assert_eq!(config.api_key, None);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.target_hours, 48);
        assert_eq!(config.artifacts_dir, PathBuf::from("artifacts"));
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert_eq!(config.manual_file, PathBuf::from("recent_bills.json"));
    }

    #[test]
    fn test_overrides() {
        let config = AuditConfig::from_lookup(lookup(&[
            ("BILLS_SOURCE", "Manual"),
            ("CONGRESS_GOV_API_KEY", "secret"),
            ("TARGET_HOURS", "72"),
            ("ARTIFACTS_DIR", "/tmp/out"),
            ("REQUEST_TIMEOUT", "5"),
            ("RECENT_BILLS_JSON", "[]"),
            ("USER_AGENT", "   "),
        ]))
        .unwrap();

        assert_eq!(config.source, SourceKind::Manual);
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.target_hours, 72);
        assert_eq!(config.artifacts_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.manual_json.as_deref(), Some("[]"));
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_invalid_number() {
        let err = AuditConfig::from_lookup(lookup(&[("TARGET_HOURS", "two days")])).unwrap_err();
        assert!(matches!(err, AuditError::Config(_)));
    }

    #[test]
    fn test_source_kind_parsing() {
        assert_eq!(SourceKind::from("manual"), SourceKind::Manual);
        assert_eq!(SourceKind::from("congress.gov"), SourceKind::CongressApi);
        assert_eq!(SourceKind::from("anything"), SourceKind::CongressApi);
    }

    #[test]
    fn test_service_endpoints_fallbacks() {
        let endpoints = ServiceEndpoints::from_lookup(lookup(&[
            ("OPENAI_BASE_URL", "http://localhost:11434/v1"),
            ("OPENAI_API_KEY", "k"),
        ]));
        assert_eq!(endpoints.openai_base, "http://localhost:11434/v1");
        assert_eq!(endpoints.tts_base, "http://localhost:11434/v1");
        assert_eq!(endpoints.tts_key, "k");
    }

    #[test]
    fn test_narration_config_partial_toml() {
        let config = NarrationConfig::from_str(
            r#"
            [speech]
            model = "tts-1-hd"
            voice = "nova"

            [audio]
            intro_path = "intro.wav"
            gap_seconds = 1.0
            "#,
        )
        .unwrap();

        assert_eq!(config.speech.voice, "nova");
        assert_eq!(config.speech.max_chunk_chars, 4000);
        assert_eq!(config.audio.intro_path, PathBuf::from("intro.wav"));
        assert_eq!(config.generation.model, "gpt-4o-mini");
        assert!(config.prompts.summary_template.contains("{bill_number}"));
    }

    #[test]
    fn test_narration_config_invalid_toml() {
        assert!(NarrationConfig::from_str("[speech\nvoice = 1").is_err());
    }
}
