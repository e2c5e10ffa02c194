use std::env;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::SpeechError;

#[derive(Clone, Debug)]
pub struct SpeechConfig {
    pub base_url: String,
    pub api_key: String,
    pub voice: String,
}

impl SpeechConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("SPEECH_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        let base_url = env::var("SPEECH_API_URL")
            .unwrap_or_else(|_| "https://texttospeech.googleapis.com/v1".into());
        let voice = env::var("SPEECH_VOICE").unwrap_or_else(|_| "en-US-Standard-C".into());
        Some(Self {
            base_url,
            api_key,
            voice,
        })
    }
}

/// Text-to-speech collaborator for word pronunciation.
///
/// Synthesis failures are expected to be non-fatal: callers fall back to
/// silence rather than failing the study action.
#[derive(Clone)]
pub struct SpeechService {
    client: Client,
    config: Option<SpeechConfig>,
}

impl SpeechService {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(SpeechConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<SpeechConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    /// Synthesize speech for a word or phrase. Returns the base64 audio
    /// payload as delivered by the provider.
    ///
    /// # Errors
    ///
    /// Returns `SpeechError` when the service is disabled, the request fails,
    /// or the response carries no audio.
    pub async fn synthesize(&self, text: &str) -> Result<String, SpeechError> {
        let config = self.config.as_ref().ok_or(SpeechError::Disabled)?;

        let url = format!(
            "{}/text:synthesize?key={}",
            config.base_url.trim_end_matches('/'),
            config.api_key
        );
        let payload = SynthesizeRequest {
            text: text.to_owned(),
            voice: config.voice.clone(),
        };

        let response = self.client.post(url).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(SpeechError::HttpStatus(response.status()));
        }

        let body: SynthesizeResponse = response.json().await?;
        let audio = body
            .audio_content
            .filter(|content| !content.is_empty())
            .ok_or(SpeechError::EmptyResponse)?;
        Ok(audio)
    }
}

#[derive(Debug, Serialize)]
struct SynthesizeRequest {
    text: String,
    voice: String,
}

#[derive(Debug, Deserialize)]
struct SynthesizeResponse {
    #[serde(rename = "audioContent")]
    audio_content: Option<String>,
}
