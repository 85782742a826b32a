//! Hosted speech synthesis over an OpenAI-compatible `/audio/speech` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use crate::audio::{AudioClip, decode_wav};
use crate::config::{ServiceEndpoints, SpeechConfig};
use crate::error::AuditError;

/// Speech capability: text in, mono audio out.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<AudioClip, AuditError>;
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'static str,
}

/// Calls the speech endpoint once per chunk and concatenates the clips.
pub struct HttpSpeechSynthesizer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    config: SpeechConfig,
}

impl HttpSpeechSynthesizer {
    pub fn new(
        endpoints: &ServiceEndpoints,
        config: SpeechConfig,
        timeout: Duration,
    ) -> Result<Self, AuditError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/audio/speech", endpoints.tts_base.trim_end_matches('/')),
            api_key: endpoints.tts_key.clone(),
            config,
        })
    }

    async fn synthesize_chunk(&self, chunk: &str) -> Result<AudioClip, AuditError> {
        let request = SpeechRequest {
            model: &self.config.model,
            input: chunk,
            voice: &self.config.voice,
            response_format: "wav",
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuditError::Tts(format!(
                "{} returned {}: {}",
                self.endpoint,
                status.as_u16(),
                body.chars().take(200).collect::<String>()
            )));
        }

        let bytes = response.bytes().await?;
        decode_wav(&bytes)
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSpeechSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<AudioClip, AuditError> {
        let chunks = split_into_chunks(text, self.config.max_chunk_chars);
        if chunks.is_empty() {
            return Err(AuditError::EmptyScript);
        }
        info!(chunks = chunks.len(), voice = %self.config.voice, "synthesizing narration");

        let mut combined: Option<AudioClip> = None;
        for chunk in &chunks {
            let clip = self.synthesize_chunk(chunk).await?;
            debug!(samples = clip.samples.len(), rate = clip.sample_rate, "chunk synthesized");

            combined = Some(match combined {
                None => clip,
                Some(mut acc) => {
                    let clip = clip.resampled(acc.sample_rate);
                    acc.samples.extend(clip.samples);
                    acc
                }
            });
        }

        combined.ok_or(AuditError::EmptyScript)
    }
}

/// Split text at sentence boundaries into chunks of at most `max_chars`
/// characters. Overlong sentences break at commas, then anywhere.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in text.split_inclusive(&['.', '!', '?', ';'][..]) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }

        if char_len(&current) + char_len(sentence) + 1 <= max_chars {
            push_piece(&mut current, sentence);
            continue;
        }
        flush(&mut chunks, &mut current);

        if char_len(sentence) <= max_chars {
            push_piece(&mut current, sentence);
            continue;
        }

        for part in sentence.split_inclusive(',') {
            let part = part.trim();
            if char_len(&current) + char_len(part) + 1 > max_chars {
                flush(&mut chunks, &mut current);
            }
            if char_len(part) > max_chars {
                let chars: Vec<char> = part.chars().collect();
                for piece in chars.chunks(max_chars) {
                    chunks.push(piece.iter().collect());
                }
            } else {
                push_piece(&mut current, part);
            }
        }
    }

    flush(&mut chunks, &mut current);
    chunks
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn push_piece(current: &mut String, piece: &str) {
    if !current.is_empty() {
        current.push(' ');
    }
    current.push_str(piece);
}

fn flush(chunks: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
    current.clear();
}
