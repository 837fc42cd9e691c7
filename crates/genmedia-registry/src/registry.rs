//! The immutable capability registry.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::json;

use genmedia_types::MediaDomain;

use crate::error::{RegistryError, ValidationError};
use crate::languages::LanguageTable;
use crate::model::{ModelDescriptor, builtin_models};
use crate::voices::VoiceCatalog;

// ──────────────────── Parameters ────────────────────

/// Raw generation knobs as decoded from a tool call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationParams {
    pub count: Option<i64>,
    pub duration: Option<i64>,
    pub aspect_ratio: Option<String>,
    pub image_size: Option<String>,
    pub generate_audio: Option<bool>,
    /// Character count of the text to synthesize (speech only).
    pub text_chars: Option<usize>,
}

/// Parameters after validation: every field resolved against the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedParams {
    pub model: String,
    pub count: u32,
    pub duration: Option<u32>,
    pub aspect_ratio: Option<String>,
    pub image_size: Option<String>,
    pub generate_audio: bool,
}

impl From<NormalizedParams> for GenerationParams {
    fn from(n: NormalizedParams) -> Self {
        Self {
            count: Some(i64::from(n.count)),
            duration: n.duration.map(i64::from),
            aspect_ratio: n.aspect_ratio,
            image_size: n.image_size,
            generate_audio: Some(n.generate_audio),
            text_chars: None,
        }
    }
}

// ──────────────────── Builder ────────────────────

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    models: Vec<ModelDescriptor>,
    voices: Option<VoiceCatalog>,
    languages: Option<LanguageTable>,
}

#[derive(Deserialize)]
struct CatalogFile {
    models: Vec<ModelDescriptor>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtin_models(mut self) -> Self {
        self.models.extend(builtin_models());
        self
    }

    pub fn model(mut self, model: ModelDescriptor) -> Self {
        self.models.push(model);
        self
    }

    /// Load models from a JSON file shaped `{ "models": [ ... ] }`.
    pub fn with_catalog_file(mut self, path: &Path) -> Result<Self, RegistryError> {
        let content = std::fs::read_to_string(path)?;
        let file: CatalogFile = serde_json::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            models = file.models.len(),
            "Loaded model catalog from file"
        );
        self.models.extend(file.models);
        Ok(self)
    }

    pub fn voices(mut self, voices: VoiceCatalog) -> Self {
        self.voices = Some(voices);
        self
    }

    pub fn languages(mut self, languages: LanguageTable) -> Self {
        self.languages = Some(languages);
        self
    }

    /// Freeze the catalog, rejecting name collisions and inconsistent descriptors.
    pub fn build(self) -> Result<CapabilityRegistry, RegistryError> {
        let mut models = BTreeMap::new();
        let mut names: HashMap<String, String> = HashMap::new();

        for model in self.models {
            if model.max_outputs == 0 {
                return Err(RegistryError::ZeroOutputs(model.canonical_name));
            }
            if let Some(duration) = model
                .default_duration
                .filter(|d| !model.supported_durations.contains(d))
            {
                return Err(RegistryError::DefaultDurationUnsupported {
                    model: model.canonical_name,
                    duration,
                    supported: model.supported_durations,
                });
            }
            if models.contains_key(&model.canonical_name) {
                return Err(RegistryError::DuplicateModel(model.canonical_name));
            }
            let canonical = model.canonical_name.clone();
            for key in std::iter::once(&canonical).chain(model.aliases.iter()) {
                let lowered = key.to_lowercase();
                match names.get(&lowered) {
                    Some(existing) if existing != &canonical => {
                        return Err(RegistryError::AliasCollision {
                            alias: key.clone(),
                            first: existing.clone(),
                            second: canonical,
                        });
                    }
                    Some(_) => {}
                    None => {
                        names.insert(lowered, canonical.clone());
                    }
                }
            }
            models.insert(canonical, model);
        }

        Ok(CapabilityRegistry {
            models,
            names,
            voices: self.voices.unwrap_or_else(VoiceCatalog::builtin),
            languages: self.languages.unwrap_or_default(),
        })
    }
}

// ──────────────────── Registry ────────────────────

/// Read-only catalog of models, voices and languages.
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    models: BTreeMap<String, ModelDescriptor>,
    /// Lowercased canonical names and aliases to canonical name.
    names: HashMap<String, String>,
    voices: VoiceCatalog,
    languages: LanguageTable,
}

impl CapabilityRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Built-in models, built-in voices.
    pub fn builtin() -> Result<Self, RegistryError> {
        RegistryBuilder::new().with_builtin_models().build()
    }

    /// Case-insensitive lookup over canonical names and aliases.
    pub fn resolve(&self, input: &str) -> Option<&str> {
        self.names
            .get(&input.trim().to_lowercase())
            .map(String::as_str)
    }

    /// Resolve within one domain; a model from another domain counts as unknown.
    pub fn resolve_in(&self, domain: MediaDomain, input: &str) -> Result<&ModelDescriptor, ValidationError> {
        self.resolve(input)
            .and_then(|canonical| self.models.get(canonical))
            .filter(|m| m.domain == domain)
            .ok_or_else(|| ValidationError::UnknownModel {
                input: input.to_string(),
                domain: domain.to_string(),
                known: self.model_names(domain),
            })
    }

    pub fn get(&self, canonical: &str) -> Option<&ModelDescriptor> {
        self.models.get(canonical)
    }

    pub fn models(&self, domain: MediaDomain) -> impl Iterator<Item = &ModelDescriptor> {
        self.models.values().filter(move |m| m.domain == domain)
    }

    pub fn model_names(&self, domain: MediaDomain) -> Vec<String> {
        self.models(domain).map(|m| m.canonical_name.clone()).collect()
    }

    pub fn voices(&self) -> &VoiceCatalog {
        &self.voices
    }

    pub fn languages(&self) -> &LanguageTable {
        &self.languages
    }

    /// Check `params` against a model and fill in defaults.
    ///
    /// Unsupported duration, aspect ratio, image size or audio are errors.
    /// An excessive count is clamped to the model maximum with only a log line.
    pub fn validate(
        &self,
        canonical: &str,
        params: &GenerationParams,
    ) -> Result<NormalizedParams, ValidationError> {
        let model = self
            .models
            .get(canonical)
            .ok_or_else(|| ValidationError::UnknownModel {
                input: canonical.to_string(),
                domain: "any".to_string(),
                known: self.models.keys().cloned().collect(),
            })?;

        let requested = params.count.unwrap_or(1);
        let count = if requested < 1 {
            1
        } else if requested > i64::from(model.max_outputs) {
            tracing::warn!(
                requested,
                model = %model.canonical_name,
                max = model.max_outputs,
                "Requested more outputs than the model supports, adjusting to max"
            );
            model.max_outputs
        } else {
            requested as u32
        };

        let duration = if model.supported_durations.is_empty() {
            None
        } else {
            let wanted = params
                .duration
                .or(model.default_duration.map(i64::from))
                .unwrap_or_else(|| i64::from(model.supported_durations[0]));
            match u32::try_from(wanted)
                .ok()
                .filter(|d| model.supported_durations.contains(d))
            {
                Some(d) => Some(d),
                None => {
                    return Err(ValidationError::UnsupportedDuration {
                        duration: wanted,
                        model: model.canonical_name.clone(),
                        supported: model.supported_durations.clone(),
                    });
                }
            }
        };

        let aspect_ratio = if model.supported_aspect_ratios.is_empty() {
            None
        } else {
            match params.aspect_ratio.as_deref().map(str::trim) {
                None | Some("") => model.supported_aspect_ratios.first().cloned(),
                Some(ratio) if model.supported_aspect_ratios.iter().any(|r| r == ratio) => {
                    Some(ratio.to_string())
                }
                Some(ratio) => {
                    return Err(ValidationError::UnsupportedAspectRatio {
                        ratio: ratio.to_string(),
                        model: model.canonical_name.clone(),
                        supported: model.supported_aspect_ratios.clone(),
                    });
                }
            }
        };

        let image_size = match params.image_size.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(size) => {
                match model
                    .supported_image_sizes
                    .iter()
                    .find(|s| s.eq_ignore_ascii_case(size))
                {
                    Some(s) => Some(s.clone()),
                    None => {
                        return Err(ValidationError::UnsupportedImageSize {
                            size: size.to_string(),
                            model: model.canonical_name.clone(),
                            supported: model.supported_image_sizes.clone(),
                        });
                    }
                }
            }
        };

        let generate_audio = match params.generate_audio {
            Some(true) if !model.supports_audio => {
                return Err(ValidationError::AudioUnsupported {
                    model: model.canonical_name.clone(),
                });
            }
            Some(flag) => flag,
            None => model.supports_audio,
        };

        if let (Some(max), Some(actual)) = (model.max_text_chars, params.text_chars) {
            if actual > max {
                return Err(ValidationError::TextTooLong { max, actual });
            }
        }

        Ok(NormalizedParams {
            model: model.canonical_name.clone(),
            count,
            duration,
            aspect_ratio,
            image_size,
            generate_audio,
        })
    }

    /// Markdown bullet list of the models in one domain, for tool descriptions.
    pub fn describe(&self, domain: MediaDomain) -> String {
        let noun = match domain {
            MediaDomain::Video => "video generation",
            MediaDomain::Image => "image generation",
            MediaDomain::Speech => "speech synthesis",
            MediaDomain::Transform => "media processing",
        };
        let mut out = format!(
            "Model for {noun}. Can be a full model ID or a common name. Supported models:\n"
        );
        for model in self.models(domain) {
            out.push_str(&model.summary_line());
            out.push('\n');
        }
        out
    }

    /// The whole catalog as a JSON document.
    pub fn catalog_json(&self) -> serde_json::Value {
        let models: Vec<&ModelDescriptor> = self.models.values().collect();
        json!({
            "models": models,
            "voices": self.voices.all(),
        })
    }
}
