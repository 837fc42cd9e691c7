//! Cloud Text-to-Speech adapter (Gemini TTS voices).

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::{Value, json};

use genmedia_registry::VoiceInfo;
use genmedia_storage::TokenProvider;
use genmedia_types::{GeneratedAsset, MediaDomain};

use crate::error::BackendError;
use crate::types::{GenerationBackend, GenerationRequest, SpeechRequest, Submission};

pub struct CloudTtsBackend {
    http: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
    endpoint: String,
    /// Billed project, sent as `x-goog-user-project`.
    project: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiVoice {
    name: String,
    #[serde(default)]
    language_codes: Vec<String>,
    #[serde(default)]
    ssml_gender: Option<String>,
}

#[derive(Deserialize)]
struct VoiceList {
    #[serde(default)]
    voices: Vec<ApiVoice>,
}

impl CloudTtsBackend {
    pub fn new(
        http: reqwest::Client,
        tokens: Arc<dyn TokenProvider>,
        endpoint: impl Into<String>,
        project: impl Into<String>,
    ) -> Self {
        Self {
            http,
            tokens,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            project: project.into(),
        }
    }

    async fn synthesize(&self, req: &SpeechRequest) -> Result<GeneratedAsset, BackendError> {
        let token = self.tokens.token().await?;
        let body = synthesize_body(req);

        let resp = self
            .http
            .post(format!("{}/v1/text:synthesize", self.endpoint))
            .bearer_auth(token)
            .header("x-goog-user-project", &self.project)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let json: Value = resp.json().await.unwrap_or_default();
        if !status.is_success() {
            return Err(BackendError::from_body(status.as_u16(), &json));
        }

        let audio = json
            .get("audioContent")
            .and_then(|a| a.as_str())
            .ok_or_else(|| BackendError::InvalidResponse("missing audioContent".into()))?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(audio)
            .map_err(|e| BackendError::InvalidResponse(format!("invalid audioContent: {e}")))?;
        if bytes.is_empty() {
            return Err(BackendError::InvalidResponse("empty audioContent".into()));
        }

        tracing::info!(voice = %req.voice, bytes = bytes.len(), "Speech synthesized");
        Ok(GeneratedAsset::from_bytes(bytes, req.encoding.mime_type()))
    }
}

/// Request body for `text:synthesize`.
fn synthesize_body(req: &SpeechRequest) -> Value {
    let mut input = json!({ "text": req.text });
    if let Some(prompt) = req.style_prompt.as_deref().filter(|p| !p.is_empty()) {
        input["prompt"] = json!(prompt);
    }
    json!({
        "input": input,
        "voice": {
            "languageCode": req.language_code,
            "name": req.voice,
            "modelName": req.model,
        },
        "audioConfig": { "audioEncoding": req.encoding.as_str() },
    })
}

#[async_trait]
impl GenerationBackend for CloudTtsBackend {
    fn id(&self) -> &str {
        "cloud-tts"
    }

    fn domain(&self) -> MediaDomain {
        MediaDomain::Speech
    }

    async fn submit(&self, request: &GenerationRequest) -> Result<Submission, BackendError> {
        let GenerationRequest::Speech(req) = request else {
            return Err(BackendError::Unsupported("speech"));
        };
        Ok(Submission::Ready(vec![self.synthesize(req).await?]))
    }

    async fn list_voices(&self) -> Result<Vec<VoiceInfo>, BackendError> {
        let token = self.tokens.token().await?;
        let resp = self
            .http
            .get(format!("{}/v1/voices", self.endpoint))
            .bearer_auth(token)
            .header("x-goog-user-project", &self.project)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let json: Value = resp.json().await.unwrap_or_default();
            return Err(BackendError::from_body(status.as_u16(), &json));
        }
        let list: VoiceList = resp.json().await?;
        Ok(list
            .voices
            .into_iter()
            .map(|v| VoiceInfo {
                name: v.name,
                language_codes: v.language_codes,
                gender: v.ssml_gender,
            })
            .collect())
    }
}
