//! Narration of a compiled bill record.
//!
//! Script generation and speech synthesis must both succeed; stitching the
//! intro is optional and falls back to the bare narration.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestUserMessage, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use tracing::{info, warn};

use crate::audio::{AudioMixer, write_wav};
use crate::config::{GenerationConfig, NarrationConfig, ServiceEndpoints};
use crate::error::AuditError;
use crate::record::{BillRecord, compact_timestamp, sanitize_bill_number};
use crate::speech::SpeechSynthesizer;

const REASONING_TAGS: &[&str] = &[
    "thinking",
    "think",
    "reflection",
    "reflect",
    "internal",
    "reasoning",
    "thought",
    "scratch",
    "scratchpad",
    "plan",
    "analysis",
];

static REASONING_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    REASONING_TAGS
        .iter()
        .map(|tag| Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}>")).unwrap())
        .collect()
});
static ORPHAN_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</?\w+[^>]*>").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Text capability: system prompt plus user prompt in, raw completion out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, AuditError>;
}

/// Chat completions against any OpenAI-compatible endpoint.
pub struct OpenAiTextGenerator {
    client: Client<OpenAIConfig>,
    config: GenerationConfig,
}

impl OpenAiTextGenerator {
    pub fn new(
        endpoints: &ServiceEndpoints,
        config: GenerationConfig,
        timeout: Duration,
    ) -> Result<Self, AuditError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        let openai_config = OpenAIConfig::new()
            .with_api_key(&endpoints.openai_key)
            .with_api_base(&endpoints.openai_base);

        Ok(Self {
            client: Client::with_config(openai_config).with_http_client(http_client),
            config,
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiTextGenerator {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, AuditError> {
        let messages = vec![
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: system.to_string().into(),
                name: None,
            }),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: prompt.to_string().into(),
                name: None,
            }),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.config.model)
            .max_completion_tokens(self.config.max_tokens)
            .messages(messages)
            .build()?;

        let response = self.client.chat().create(request).await?;
        Ok(response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default())
    }
}

/// A finished narration.
#[derive(Debug, Clone)]
pub struct Narration {
    pub bill_number: Option<String>,
    pub script: String,
    pub script_path: PathBuf,
    pub audio_path: PathBuf,
    /// Whether the intro was stitched in front.
    pub stitched: bool,
}

/// Turns a record into a spoken brief.
pub struct Narrator {
    config: NarrationConfig,
    generator: Box<dyn TextGenerator>,
    synthesizer: Box<dyn SpeechSynthesizer>,
    mixer: Box<dyn AudioMixer>,
}

impl Narrator {
    pub fn new(
        config: NarrationConfig,
        generator: Box<dyn TextGenerator>,
        synthesizer: Box<dyn SpeechSynthesizer>,
        mixer: Box<dyn AudioMixer>,
    ) -> Self {
        Self {
            config,
            generator,
            synthesizer,
            mixer,
        }
    }

    /// Fill the summary template from `record`.
    pub fn build_prompt(&self, record: &BillRecord) -> String {
        self.config
            .prompts
            .summary_template
            .replace("{bill_number}", record.bill_number.as_deref().unwrap_or("unknown"))
            .replace("{title}", record.title.as_deref().unwrap_or("not available"))
            .replace("{status}", record.status.as_deref().unwrap_or("not available"))
            .replace("{score}", &describe_score(record))
            .replace("{affected}", &describe_affected(record))
            .replace("{gao}", &describe_reports(record))
    }

    /// Generate, synthesize and stitch the narration for `record` into `out_dir`.
    pub async fn narrate(&self, record: &BillRecord, out_dir: &Path) -> Result<Narration, AuditError> {
        let bill = record.bill_number.as_deref().unwrap_or("unknown");
        info!(bill = %bill, model = %self.config.generation.model, "generating script");

        let prompt = self.build_prompt(record);
        let raw = self.generator.generate(&self.config.prompts.system, &prompt).await?;
        let script = sanitize_response(&raw);
        if script.is_empty() {
            return Err(AuditError::EmptyScript);
        }

        let narration = self.synthesizer.synthesize(&script).await?;

        let intro_path = &self.config.audio.intro_path;
        let (clip, stitched) = match self.mixer.stitch(intro_path, &narration) {
            Ok(clip) => (clip, true),
            Err(e) => {
                warn!(intro = %intro_path.display(), error = %e, "intro unavailable; keeping bare narration");
                (narration, false)
            }
        };

        fs::create_dir_all(out_dir)?;
        let stem = format!(
            "narration_{}_{}",
            sanitize_bill_number(record.bill_number.as_deref()),
            compact_timestamp(Utc::now())
        );
        let script_path = out_dir.join(format!("{stem}.txt"));
        let audio_path = out_dir.join(format!("{stem}.wav"));

        fs::write(&script_path, &script)?;
        write_wav(&audio_path, &clip)?;
        info!(
            bill = %bill,
            path = %audio_path.display(),
            seconds = clip.duration_secs(),
            stitched,
            "narration written"
        );

        Ok(Narration {
            bill_number: record.bill_number.clone(),
            script,
            script_path,
            audio_path,
            stitched,
        })
    }
}

fn describe_score(record: &BillRecord) -> String {
    match &record.cbo {
        None => "No CBO cost estimate was available.".to_string(),
        Some(cbo) => match cbo.score_value {
            Some(value) => match &cbo.score_text {
                Some(excerpt) => format!("{}. Source excerpt: {}", format_dollars(value), excerpt),
                None => format_dollars(value),
            },
            None => "A CBO page was found but no dollar figure was identified.".to_string(),
        },
    }
}

fn describe_affected(record: &BillRecord) -> String {
    let sentences = record
        .cbo
        .as_ref()
        .map(|cbo| cbo.affected_sentences.as_slice())
        .unwrap_or_default();
    if sentences.is_empty() {
        return "None identified.".to_string();
    }
    sentences
        .iter()
        .map(|s| format!("- {s}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn describe_reports(record: &BillRecord) -> String {
    if record.gao_reports.is_empty() {
        return "None found.".to_string();
    }
    record
        .gao_reports
        .iter()
        .map(|r| format!("- {} ({})", r.title, r.url))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Spoken-style dollar amount.
pub fn format_dollars(value: f64) -> String {
    let magnitude = value.abs();
    let (scaled, suffix) = if magnitude >= 1e9 {
        (value / 1e9, " billion")
    } else if magnitude >= 1e6 {
        (value / 1e6, " million")
    } else {
        (value, "")
    };

    let digits = if suffix.is_empty() || scaled.fract() == 0.0 {
        format!("{scaled:.0}")
    } else {
        format!("{scaled:.1}")
    };
    format!("${digits}{suffix}")
}

/// Strip reasoning blocks, stray tags and asterisks, then collapse whitespace.
pub fn sanitize_response(response: &str) -> String {
    let mut result = response.to_string();
    for re in REASONING_RES.iter() {
        result = re.replace_all(&result, "").into_owned();
    }
    result = ORPHAN_TAG_RE.replace_all(&result, "").into_owned();
    result = result.replace('*', "");
    WHITESPACE_RE.replace_all(&result, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioClip;
    use crate::cost_estimate::CostEstimateResult;
    use crate::gao::ReportRef;
    use chrono::TimeZone;
    use std::sync::{Arc, Mutex};

    struct FakeGenerator {
        reply: Result<String, String>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl TextGenerator for FakeGenerator {
        async fn generate(&self, _system: &str, prompt: &str) -> Result<String, AuditError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone().map_err(AuditError::Config)
        }
    }

    struct FakeSynthesizer {
        fail: bool,
        calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl SpeechSynthesizer for FakeSynthesizer {
        async fn synthesize(&self, text: &str) -> Result<AudioClip, AuditError> {
            self.calls.lock().unwrap().push(text.to_string());
            if self.fail {
                return Err(AuditError::Tts("quota exceeded".to_string()));
            }
            Ok(AudioClip {
                samples: vec![0.25; 100],
                sample_rate: 8000,
            })
        }
    }

    struct FakeMixer {
        intro_present: bool,
    }

    impl AudioMixer for FakeMixer {
        fn stitch(&self, _intro: &Path, narration: &AudioClip) -> Result<AudioClip, AuditError> {
            if !self.intro_present {
                return Err(AuditError::Io(std::io::Error::from(std::io::ErrorKind::NotFound)));
            }
            let mut samples = vec![0.5; 50];
            samples.extend(&narration.samples);
            Ok(AudioClip {
                samples,
                sample_rate: narration.sample_rate,
            })
        }
    }

    struct Harness {
        prompts: Arc<Mutex<Vec<String>>>,
        spoken: Arc<Mutex<Vec<String>>>,
    }

    fn narrator(reply: Result<&str, &str>, tts_fails: bool, intro_present: bool) -> (Narrator, Harness) {
        let harness = Harness {
            prompts: Arc::new(Mutex::new(Vec::new())),
            spoken: Arc::new(Mutex::new(Vec::new())),
        };
        let narrator = Narrator::new(
            NarrationConfig::default(),
            Box::new(FakeGenerator {
                reply: reply.map(str::to_string).map_err(str::to_string),
                prompts: Arc::clone(&harness.prompts),
            }),
            Box::new(FakeSynthesizer {
                fail: tts_fails,
                calls: Arc::clone(&harness.spoken),
            }),
            Box::new(FakeMixer { intro_present }),
        );
        (narrator, harness)
    }

    fn record() -> BillRecord {
        BillRecord {
            bill_number: Some("H.R. 1".to_string()),
            title: Some("Lower Costs Act".to_string()),
            status: Some("Passed House".to_string()),
            raw_text_url: None,
            fetched_at: Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap(),
            cbo_url: Some("https://www.cbo.gov/cost-estimates/hr/1".to_string()),
            cbo: Some(CostEstimateResult {
                score_text: Some("a $1.2 billion increase in spending".to_string()),
                score_value: Some(1_200_000_000.0),
                score_unit: Some("dollars".to_string()),
                affected_sentences: vec!["About 40,000 families would enroll.".to_string()],
            }),
            gao_reports: vec![ReportRef {
                title: "Medicaid Oversight".to_string(),
                url: "https://www.gao.gov/products/gao-24-1".to_string(),
            }],
        }
    }

    #[test]
    fn test_build_prompt_fills_template() {
        let (narrator, _) = narrator(Ok("x"), false, true);
        let prompt = narrator.build_prompt(&record());

        assert!(prompt.contains("BILL: H.R. 1"));
        assert!(prompt.contains("TITLE: Lower Costs Act"));
        assert!(prompt.contains("$1.2 billion"));
        assert!(prompt.contains("- About 40,000 families would enroll."));
        assert!(prompt.contains("- Medicaid Oversight (https://www.gao.gov/products/gao-24-1)"));
        assert!(!prompt.contains('{'));
    }

    #[test]
    fn test_build_prompt_without_cbo() {
        let (narrator, _) = narrator(Ok("x"), false, true);
        let mut bare = record();
        bare.cbo = None;
        bare.gao_reports.clear();

        let prompt = narrator.build_prompt(&bare);
        assert!(prompt.contains("No CBO cost estimate was available."));
        assert!(prompt.contains("None identified."));
        assert!(prompt.contains("None found."));
    }

    #[tokio::test]
    async fn test_narrate_stitches_and_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let (narrator, harness) = narrator(
            Ok("<thinking>draft</thinking> The **Lower Costs Act** passed the House."),
            false,
            true,
        );

        let narration = narrator.narrate(&record(), dir.path()).await.unwrap();

        assert!(narration.stitched);
        assert_eq!(narration.script, "The Lower Costs Act passed the House.");
        assert_eq!(harness.prompts.lock().unwrap().len(), 1);
        assert_eq!(
            *harness.spoken.lock().unwrap(),
            vec!["The Lower Costs Act passed the House.".to_string()]
        );
        assert_eq!(fs::read_to_string(&narration.script_path).unwrap(), narration.script);

        let clip = crate::audio::read_wav(&narration.audio_path).unwrap();
        assert_eq!(clip.samples.len(), 150);
        assert!(
            narration
                .audio_path
                .file_name()
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("narration_H.R._1_")
        );
    }

    #[tokio::test]
    async fn test_missing_intro_returns_bare_narration() {
        let dir = tempfile::tempdir().unwrap();
        let (narrator, _) = narrator(Ok("Short brief."), false, false);

        let narration = narrator.narrate(&record(), dir.path()).await.unwrap();
        assert!(!narration.stitched);
        let clip = crate::audio::read_wav(&narration.audio_path).unwrap();
        assert_eq!(clip.samples.len(), 100);
    }

    #[tokio::test]
    async fn test_generation_failure_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let (narrator, harness) = narrator(Err("model offline"), false, true);

        assert!(narrator.narrate(&record(), dir.path()).await.is_err());
        assert!(harness.spoken.lock().unwrap().is_empty());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_empty_script_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let (narrator, harness) = narrator(Ok("<think>only reasoning</think> **"), false, true);

        let err = narrator.narrate(&record(), dir.path()).await.unwrap_err();
        assert!(matches!(err, AuditError::EmptyScript));
        assert!(harness.spoken.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_synthesis_failure_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let (narrator, _) = narrator(Ok("A brief."), true, true);

        let err = narrator.narrate(&record(), dir.path()).await.unwrap_err();
        assert!(matches!(err, AuditError::Tts(_)));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_format_dollars() {
        assert_eq!(format_dollars(1_200_000_000.0), "$1.2 billion");
        assert_eq!(format_dollars(3_000_000.0), "$3 million");
        assert_eq!(format_dollars(45_000.0), "$45000");
    }

    #[test]
    fn test_sanitize_response() {
        assert_eq!(
            sanitize_response("<thinking>\nplan\n</thinking>Final answer here."),
            "Final answer here."
        );
        assert_eq!(
            sanitize_response("<plan>p</plan>Then <reasoning>r</reasoning> finally."),
            "Then finally."
        );
        assert_eq!(sanitize_response("No tags, just *text*."), "No tags, just text.");
        let nested = sanitize_response("Start <think>nested <inner>tags</inner></think> end");
        assert_eq!(nested, "Start end");
    }
}
