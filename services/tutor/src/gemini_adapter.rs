//! REST client for the Gemini `generateContent` endpoint.
//!
//! One client serves both remote collaborators of a lesson: the chat model is
//! the [`DialogueEngine`] and the TTS model is the [`SpeechSynthesizer`].

use crate::config::Config;
use anyhow::{Context, Result};
use async_trait::async_trait;
use lesson_core::dialogue::{DialogueEngine, DialogueError};
use lesson_core::speech::SpeechSynthesizer;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    fn text(role: Option<&str>, text: &str) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part {
                text: Some(text.to_string()),
                inline_data: None,
            }],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(default)]
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

impl GenerateContentResponse {
    fn first_parts(&self) -> &[Part] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or_default()
    }

    /// All text parts of the first candidate, concatenated.
    pub fn text(&self) -> String {
        self.first_parts()
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect()
    }

    /// The base64 payload of the first candidate's first part, if it carries audio.
    pub fn inline_audio(&self) -> Option<&str> {
        self.first_parts()
            .first()
            .and_then(|p| p.inline_data.as_ref())
            .map(|d| d.data.as_str())
    }
}

pub struct GeminiClient {
    client: Client,
    api_key: SecretString,
    base_url: String,
    chat_model: String,
    tts_model: String,
    tts_voice: String,
    temperature: f64,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            api_key: config.gemini_api_key.clone(),
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            chat_model: config.chat_model.clone(),
            tts_model: config.tts_model.clone(),
            tts_voice: config.tts_voice.clone(),
            temperature: config.temperature,
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    pub fn chat_request(&self, prompt: &str, system_instruction: &str) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content::text(Some("user"), prompt)],
            system_instruction: Some(Content::text(None, system_instruction)),
            generation_config: Some(GenerationConfig {
                temperature: Some(self.temperature),
                ..Default::default()
            }),
        }
    }

    pub fn speech_request(&self, text: &str) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content::text(None, text)],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["AUDIO".to_string()]),
                speech_config: Some(SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: self.tts_voice.clone(),
                        },
                    },
                }),
                ..Default::default()
            }),
        }
    }

    async fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let resp = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", model))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("{} returned {}: {}", model, status, body);
        }
        resp.json::<GenerateContentResponse>()
            .await
            .with_context(|| format!("Malformed response from {}", model))
    }
}

#[async_trait]
impl DialogueEngine for GeminiClient {
    async fn reply(&self, prompt: &str, system_instruction: &str) -> Result<String, DialogueError> {
        let request = self.chat_request(prompt, system_instruction);
        let resp = self
            .generate(&self.chat_model, &request)
            .await
            .map_err(|e| DialogueError::Unavailable(format!("{e:#}")))?;
        Ok(resp.text())
    }
}

#[async_trait]
impl SpeechSynthesizer for GeminiClient {
    async fn synthesize(&self, text: &str) -> Option<Vec<u8>> {
        let request = self.speech_request(text);
        let resp = match self.generate(&self.tts_model, &request).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!("Speech generation error: {:#}", e);
                return None;
            }
        };
        let Some(payload) = resp.inline_audio() else {
            tracing::warn!("Speech response carried no audio");
            return None;
        };
        match lesson_native_utils::audio::decode_base64(payload) {
            Ok(audio) if !audio.is_empty() => Some(audio),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Speech generation error: {:#}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(base_url: &str) -> GeminiClient {
        let config = Config::from_lookup(|key| match key {
            "GEMINI_API_KEY" => Some("test-key".to_string()),
            "GEMINI_BASE_URL" => Some(base_url.to_string()),
            _ => None,
        })
        .unwrap();
        GeminiClient::new(&config)
    }

    #[test]
    fn test_client_carries_the_configured_key() {
        let gemini = client("https://example.test");
        assert_eq!(gemini.api_key.expose_secret(), "test-key");
        assert!(!format!("{:?}", gemini.api_key).contains("test-key"));
    }

    #[test]
    fn test_chat_request_shape() {
        let gemini = client("https://example.test/v1beta/");
        let body = serde_json::to_value(gemini.chat_request("red", "You are Super Miss")).unwrap();

        assert_eq!(
            body,
            json!({
                "contents": [{"role": "user", "parts": [{"text": "red"}]}],
                "systemInstruction": {"parts": [{"text": "You are Super Miss"}]},
                "generationConfig": {"temperature": 0.8}
            })
        );
        assert_eq!(
            gemini.endpoint("gemini-3-flash-preview"),
            "https://example.test/v1beta/models/gemini-3-flash-preview:generateContent"
        );
    }

    #[test]
    fn test_speech_request_asks_for_audio_in_configured_voice() {
        let gemini = client("https://example.test");
        let body = serde_json::to_value(gemini.speech_request("Hello!")).unwrap();

        assert_eq!(body["contents"][0]["parts"][0]["text"], "Hello!");
        assert!(body.get("systemInstruction").is_none());
        assert_eq!(body["generationConfig"]["responseModalities"], json!(["AUDIO"]));
        assert_eq!(
            body["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]
                ["voiceName"],
            "Kore"
        );
    }

    #[test]
    fn test_response_text_joins_parts() {
        let resp: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Great job! "}, {"text": "يعني شاطر"}]},
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        assert_eq!(resp.text(), "Great job! يعني شاطر");
        assert_eq!(resp.inline_audio(), None);

        let empty: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.text(), "");
    }

    #[test]
    fn test_response_inline_audio() {
        let resp: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"parts": [{"inlineData": {"mimeType": "audio/L16;codec=pcm;rate=24000", "data": "AAD/fw=="}}]}
            }]
        }))
        .unwrap();
        assert_eq!(resp.inline_audio(), Some("AAD/fw=="));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_reported_not_raised() {
        let gemini = client("http://127.0.0.1:9");

        let reply = gemini.reply("hello", "system").await;
        assert!(matches!(reply, Err(DialogueError::Unavailable(_))));
        assert_eq!(gemini.synthesize("hello").await, None);
    }
}
