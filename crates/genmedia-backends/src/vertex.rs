//! Vertex AI adapters: Veo (long-running), Imagen and Gemini image (synchronous).

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use serde_json::{Value, json};

use genmedia_registry::is_gemini_image_model;
use genmedia_storage::TokenProvider;
use genmedia_types::{GeneratedAsset, MediaDomain, OperationHandle, OperationStatus};

use crate::error::BackendError;
use crate::types::{GenerationBackend, GenerationRequest, ImageRequest, ReferenceImage, Submission};

/// Shared REST plumbing for `publishers/google/models/*` endpoints.
pub struct VertexClient {
    http: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
    api_base: String,
    project: String,
    location: String,
}

impl VertexClient {
    pub fn new(
        http: reqwest::Client,
        tokens: Arc<dyn TokenProvider>,
        api_base: impl Into<String>,
        project: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            http,
            tokens,
            api_base: api_base.into(),
            project: project.into(),
            location: location.into(),
        }
    }

    pub fn model_url(&self, model: &str, verb: &str) -> String {
        format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:{}",
            self.api_base, self.project, self.location, model, verb
        )
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value, BackendError> {
        let token = self.tokens.token().await?;
        let resp = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        let json: Value = resp.json().await.unwrap_or_default();
        if !status.is_success() {
            return Err(BackendError::from_body(status.as_u16(), &json));
        }
        Ok(json)
    }
}

fn decode_base64(data: &str) -> Result<Bytes, BackendError> {
    base64::engine::general_purpose::STANDARD
        .decode(data)
        .map(Bytes::from)
        .map_err(|e| BackendError::InvalidResponse(format!("invalid base64 payload: {e}")))
}

/// An entry carrying either inline bytes or a storage URI.
fn asset_from_entry(entry: &Value, default_mime: &str) -> Result<Option<GeneratedAsset>, BackendError> {
    let mime = entry
        .get("mimeType")
        .and_then(|m| m.as_str())
        .unwrap_or(default_mime);
    if let Some(data) = entry.get("bytesBase64Encoded").and_then(|d| d.as_str()) {
        let mut asset = GeneratedAsset::from_bytes(decode_base64(data)?, mime);
        asset.locator = entry
            .get("gcsUri")
            .and_then(|u| u.as_str())
            .map(String::from);
        return Ok(Some(asset));
    }
    Ok(entry
        .get("gcsUri")
        .and_then(|u| u.as_str())
        .map(|uri| GeneratedAsset::from_locator(uri, mime)))
}

// ──────────────────── Veo ────────────────────

pub struct VeoBackend {
    client: Arc<VertexClient>,
}

impl VeoBackend {
    pub fn new(client: Arc<VertexClient>) -> Self {
        Self { client }
    }
}

/// Turn a `fetchPredictOperation` body into a status.
pub fn parse_operation(body: &Value) -> Result<OperationStatus, BackendError> {
    if !body.get("done").and_then(|d| d.as_bool()).unwrap_or(false) {
        return Ok(OperationStatus::Pending);
    }

    if let Some(error) = body.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("operation failed without a message");
        if let Some(code) = error.get("code").and_then(|c| c.as_i64()) {
            tracing::warn!(code, "Video operation finished with an error");
        }
        return Ok(OperationStatus::DoneError(message.to_string()));
    }

    let response = body.get("response").cloned().unwrap_or_default();
    let videos = response
        .get("videos")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    let mut assets = Vec::with_capacity(videos.len());
    for video in &videos {
        if let Some(asset) = asset_from_entry(video, "video/mp4")? {
            assets.push(asset);
        }
    }

    if assets.is_empty() {
        let filtered = response
            .get("raiMediaFilteredCount")
            .and_then(|c| c.as_u64())
            .unwrap_or(0);
        let reasons = response
            .get("raiMediaFilteredReasons")
            .and_then(|r| r.as_array())
            .map(|r| {
                r.iter()
                    .filter_map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join("; ")
            })
            .unwrap_or_default();
        let message = if filtered > 0 {
            format!("{filtered} video(s) were filtered by responsible AI policies: {reasons}")
        } else {
            "operation completed but returned no videos".to_string()
        };
        return Ok(OperationStatus::DoneError(message));
    }

    Ok(OperationStatus::DoneOk(assets))
}

#[async_trait]
impl GenerationBackend for VeoBackend {
    fn id(&self) -> &str {
        "vertex-veo"
    }

    fn domain(&self) -> MediaDomain {
        MediaDomain::Video
    }

    async fn submit(&self, request: &GenerationRequest) -> Result<Submission, BackendError> {
        let GenerationRequest::Video(req) = request else {
            return Err(BackendError::Unsupported("video"));
        };

        let mut instance = json!({});
        if let Some(prompt) = &req.prompt {
            instance["prompt"] = json!(prompt);
        }
        if let Some(image) = &req.image {
            instance["image"] = json!({ "gcsUri": image.uri, "mimeType": image.mime_type });
        }

        let mut parameters = json!({
            "sampleCount": req.params.count,
            "generateAudio": req.params.generate_audio,
        });
        if let Some(duration) = req.params.duration {
            parameters["durationSeconds"] = json!(duration);
        }
        if let Some(ratio) = &req.params.aspect_ratio {
            parameters["aspectRatio"] = json!(ratio);
        }
        if let Some(uri) = &req.storage_uri {
            parameters["storageUri"] = json!(uri);
        }

        let url = self.client.model_url(&req.params.model, "predictLongRunning");
        let body = json!({ "instances": [instance], "parameters": parameters });
        let resp = self.client.post(&url, &body).await?;

        let name = resp
            .get("name")
            .and_then(|n| n.as_str())
            .ok_or_else(|| BackendError::InvalidResponse("missing operation name".into()))?;
        tracing::info!(operation = %name, model = %req.params.model, "Video generation submitted");
        Ok(Submission::Pending(OperationHandle::new(name, &req.params.model)))
    }

    async fn poll(&self, handle: &OperationHandle) -> Result<OperationStatus, BackendError> {
        let url = self.client.model_url(&handle.model, "fetchPredictOperation");
        let resp = self
            .client
            .post(&url, &json!({ "operationName": handle.name }))
            .await?;
        parse_operation(&resp)
    }
}

// ──────────────────── Imagen ────────────────────

/// Image generation. Imagen models go through `predict`; Gemini image
/// models go through `generateContent` on their own client.
pub struct ImagenBackend {
    client: Arc<VertexClient>,
    gemini: Arc<VertexClient>,
}

impl ImagenBackend {
    pub fn new(client: Arc<VertexClient>) -> Self {
        Self {
            gemini: client.clone(),
            client,
        }
    }

    /// Client for Gemini image models, usually bound to the `global` location.
    pub fn with_gemini_client(mut self, client: Arc<VertexClient>) -> Self {
        self.gemini = client;
        self
    }

    async fn predict(&self, req: &ImageRequest) -> Result<Vec<GeneratedAsset>, BackendError> {
        let mut parameters = json!({ "sampleCount": req.params.count });
        if let Some(ratio) = &req.params.aspect_ratio {
            parameters["aspectRatio"] = json!(ratio);
        }
        if let Some(size) = &req.params.image_size {
            parameters["sampleImageSize"] = json!(size);
        }
        if let Some(negative) = &req.negative_prompt {
            parameters["negativePrompt"] = json!(negative);
        }

        let url = self.client.model_url(&req.params.model, "predict");
        let body = json!({ "instances": [{ "prompt": req.prompt }], "parameters": parameters });
        let resp = self.client.post(&url, &body).await?;
        parse_predictions(&resp)
    }

    async fn generate_content(&self, req: &ImageRequest) -> Result<Vec<GeneratedAsset>, BackendError> {
        let url = self.gemini.model_url(&req.params.model, "generateContent");
        let resp = self.gemini.post(&url, &gemini_image_body(req)).await?;
        parse_generate_content(&resp)
    }
}

/// `generateContent` body: prompt text, then reference images, asking for image output.
pub fn gemini_image_body(req: &ImageRequest) -> Value {
    let mut parts = vec![json!({ "text": req.prompt })];
    for image in &req.reference_images {
        parts.push(match image {
            ReferenceImage::Stored(input) => json!({
                "fileData": { "mimeType": input.mime_type, "fileUri": input.uri }
            }),
            ReferenceImage::Inline { data, mime_type } => json!({
                "inlineData": {
                    "mimeType": mime_type,
                    "data": base64::engine::general_purpose::STANDARD.encode(data),
                }
            }),
        });
    }

    let mut image_config = serde_json::Map::new();
    if let Some(ratio) = &req.params.aspect_ratio {
        image_config.insert("aspectRatio".into(), json!(ratio));
    }
    if let Some(size) = &req.params.image_size {
        image_config.insert("imageSize".into(), json!(size));
    }
    let mut generation_config = json!({ "responseModalities": ["TEXT", "IMAGE"] });
    if !image_config.is_empty() {
        generation_config["imageConfig"] = Value::Object(image_config);
    }

    json!({
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": generation_config,
    })
}

/// Turn a `generateContent` body into image assets. Text parts only
/// surface when no image came back.
pub fn parse_generate_content(body: &Value) -> Result<Vec<GeneratedAsset>, BackendError> {
    if let Some(reason) = body
        .pointer("/promptFeedback/blockReason")
        .and_then(|r| r.as_str())
    {
        return Err(BackendError::InvalidResponse(format!(
            "the prompt was blocked ({reason})"
        )));
    }

    let mut assets = Vec::new();
    let mut texts = Vec::new();
    let mut reasons = Vec::new();
    for candidate in body
        .get("candidates")
        .and_then(|c| c.as_array())
        .into_iter()
        .flatten()
    {
        if let Some(reason) = candidate.get("finishReason").and_then(|r| r.as_str()) {
            if reason != "STOP" {
                reasons.push(reason.to_string());
            }
        }
        let parts = candidate
            .pointer("/content/parts")
            .and_then(|p| p.as_array())
            .into_iter()
            .flatten();
        for part in parts {
            if let Some(inline) = part.get("inlineData") {
                let mime = inline
                    .get("mimeType")
                    .and_then(|m| m.as_str())
                    .unwrap_or("image/png");
                if let Some(data) = inline.get("data").and_then(|d| d.as_str()) {
                    assets.push(GeneratedAsset::from_bytes(decode_base64(data)?, mime));
                }
            } else if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                texts.push(text.trim().to_string());
            }
        }
    }

    if assets.is_empty() {
        let detail = if !reasons.is_empty() {
            format!("finish reason: {}", reasons.join(", "))
        } else if !texts.is_empty() {
            format!("model replied: {}", texts.join(" "))
        } else {
            "empty response".to_string()
        };
        return Err(BackendError::InvalidResponse(format!(
            "no images were generated ({detail})"
        )));
    }
    if !texts.is_empty() {
        tracing::debug!(text = %texts.join(" "), "Gemini image model returned text alongside images");
    }
    Ok(assets)
}

/// Turn a `predict` body into assets.
pub fn parse_predictions(body: &Value) -> Result<Vec<GeneratedAsset>, BackendError> {
    let predictions = body
        .get("predictions")
        .and_then(|p| p.as_array())
        .cloned()
        .unwrap_or_default();

    let mut assets = Vec::new();
    let mut filtered = Vec::new();
    for prediction in &predictions {
        if let Some(reason) = prediction.get("raiFilteredReason").and_then(|r| r.as_str()) {
            filtered.push(reason.to_string());
            continue;
        }
        if let Some(asset) = asset_from_entry(prediction, "image/png")? {
            assets.push(asset);
        }
    }

    if assets.is_empty() {
        let detail = if filtered.is_empty() {
            "possibly filtered by safety settings".to_string()
        } else {
            filtered.join("; ")
        };
        return Err(BackendError::InvalidResponse(format!(
            "no images were generated ({detail})"
        )));
    }
    Ok(assets)
}

#[async_trait]
impl GenerationBackend for ImagenBackend {
    fn id(&self) -> &str {
        "vertex-imagen"
    }

    fn domain(&self) -> MediaDomain {
        MediaDomain::Image
    }

    async fn submit(&self, request: &GenerationRequest) -> Result<Submission, BackendError> {
        let GenerationRequest::Image(req) = request else {
            return Err(BackendError::Unsupported("image"));
        };

        let assets = if is_gemini_image_model(&req.params.model) {
            self.generate_content(req).await?
        } else {
            self.predict(req).await?
        };
        tracing::info!(model = %req.params.model, images = assets.len(), "Images generated");
        Ok(Submission::Ready(assets))
    }
}
