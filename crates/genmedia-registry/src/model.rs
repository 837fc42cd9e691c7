//! Model descriptors and the built-in catalog.

use serde::{Deserialize, Serialize};

use genmedia_types::MediaDomain;

/// Per-model constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub canonical_name: String,
    pub domain: MediaDomain,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Accepted clip lengths in seconds. Empty for non-video models.
    #[serde(default)]
    pub supported_durations: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_duration: Option<u32>,
    /// First entry is the default.
    #[serde(default)]
    pub supported_aspect_ratios: Vec<String>,
    #[serde(default)]
    pub supported_image_sizes: Vec<String>,
    #[serde(default = "default_max_outputs")]
    pub max_outputs: u32,
    #[serde(default)]
    pub supports_audio: bool,
    /// Input length ceiling for speech models.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_text_chars: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_max_outputs() -> u32 {
    1
}

const VIDEO_RATIOS_WIDE: &[&str] = &["16:9"];
const VIDEO_RATIOS_BOTH: &[&str] = &["16:9", "9:16"];
const IMAGE_RATIOS: &[&str] = &["1:1", "3:4", "4:3", "9:16", "16:9"];
const IMAGE_SIZES: &[&str] = &["1K", "2K"];
const GEMINI_IMAGE_RATIOS: &[&str] = &[
    "1:1", "2:3", "3:2", "3:4", "4:3", "4:5", "5:4", "9:16", "16:9", "21:9",
];
const GEMINI_IMAGE_SIZES: &[&str] = &["1K", "2K", "4K"];

/// Image models served by `generateContent` rather than Imagen's `predict`.
pub fn is_gemini_image_model(canonical_name: &str) -> bool {
    canonical_name.starts_with("gemini-") && canonical_name.contains("-image")
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl ModelDescriptor {
    fn video(
        name: &str,
        aliases: &[&str],
        durations: &[u32],
        max_outputs: u32,
        ratios: &[&str],
        supports_audio: bool,
    ) -> Self {
        Self {
            canonical_name: name.to_string(),
            domain: MediaDomain::Video,
            aliases: strings(aliases),
            supported_durations: durations.to_vec(),
            default_duration: Some(8),
            supported_aspect_ratios: strings(ratios),
            supported_image_sizes: Vec::new(),
            max_outputs,
            supports_audio,
            max_text_chars: None,
            description: None,
        }
    }

    fn image(name: &str, aliases: &[&str], max_outputs: u32, sizes: &[&str]) -> Self {
        Self {
            canonical_name: name.to_string(),
            domain: MediaDomain::Image,
            aliases: strings(aliases),
            supported_durations: Vec::new(),
            default_duration: None,
            supported_aspect_ratios: strings(IMAGE_RATIOS),
            supported_image_sizes: strings(sizes),
            max_outputs,
            supports_audio: false,
            max_text_chars: None,
            description: None,
        }
    }

    fn gemini_image(name: &str, aliases: &[&str], sizes: &[&str], description: &str) -> Self {
        Self {
            supported_aspect_ratios: strings(GEMINI_IMAGE_RATIOS),
            description: Some(description.to_string()),
            ..Self::image(name, aliases, 1, sizes)
        }
    }

    fn speech(name: &str, aliases: &[&str], description: &str) -> Self {
        Self {
            canonical_name: name.to_string(),
            domain: MediaDomain::Speech,
            aliases: strings(aliases),
            supported_durations: Vec::new(),
            default_duration: None,
            supported_aspect_ratios: Vec::new(),
            supported_image_sizes: Vec::new(),
            max_outputs: 1,
            supports_audio: true,
            max_text_chars: Some(800),
            description: Some(description.to_string()),
        }
    }

    /// One bullet line for tool descriptions, e.g.
    /// `- *veo-3.0-generate-001* (Durations: [4, 6, 8]s, Max Videos: 2, Ratios: 16:9) Aliases: *Veo 3.0*`.
    pub fn summary_line(&self) -> String {
        let mut line = format!("- *{}*", self.canonical_name);
        match self.domain {
            MediaDomain::Video => {
                let durations = self
                    .supported_durations
                    .iter()
                    .map(|d| d.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                line.push_str(&format!(
                    " (Durations: [{durations}]s, Max Videos: {}, Ratios: {})",
                    self.max_outputs,
                    self.supported_aspect_ratios.join(", ")
                ));
                if self.supports_audio {
                    line.push_str(" (Audio)");
                }
            }
            MediaDomain::Image => {
                line.push_str(&format!(
                    " (Max Images: {}, Ratios: {})",
                    self.max_outputs,
                    self.supported_aspect_ratios.join(", ")
                ));
                if !self.supported_image_sizes.is_empty() {
                    line.push_str(&format!(
                        " (Sizes: {})",
                        self.supported_image_sizes.join(", ")
                    ));
                }
            }
            MediaDomain::Speech => {
                if let Some(max) = self.max_text_chars {
                    line.push_str(&format!(" (Max Characters: {max})"));
                }
            }
            MediaDomain::Transform => {}
        }
        if !self.aliases.is_empty() {
            line.push_str(&format!(" Aliases: *{}*", self.aliases.join("*, *")));
        }
        if let Some(desc) = &self.description {
            line.push_str(&format!(" - {desc}"));
        }
        line
    }
}

/// The catalog shipped with the gateway.
pub fn builtin_models() -> Vec<ModelDescriptor> {
    vec![
        // Video
        ModelDescriptor::video("veo-2.0-generate-001", &["Veo 2"], &[5, 6, 7, 8], 4, VIDEO_RATIOS_BOTH, false),
        ModelDescriptor::video("veo-2.0-generate-exp", &["Veo 2.0 Exp"], &[5, 6, 7, 8], 4, VIDEO_RATIOS_BOTH, false),
        ModelDescriptor::video("veo-2.0-generate-preview", &["Veo 2.0 Preview"], &[5, 6, 7, 8], 4, VIDEO_RATIOS_BOTH, false),
        ModelDescriptor::video("veo-3.0-generate-001", &["Veo 3.0"], &[4, 6, 8], 2, VIDEO_RATIOS_WIDE, true),
        ModelDescriptor::video("veo-3.0-fast-generate-001", &["Veo 3.0 Fast"], &[4, 6, 8], 2, VIDEO_RATIOS_WIDE, true),
        ModelDescriptor::video("veo-3.0-generate-preview", &["Veo 3"], &[4, 6, 8], 2, VIDEO_RATIOS_WIDE, true),
        ModelDescriptor::video("veo-3.0-fast-generate-preview", &["Veo 3 Fast"], &[4, 6, 8], 2, VIDEO_RATIOS_WIDE, true),
        ModelDescriptor::video("veo-3.1-generate-preview", &["Veo 3.1"], &[4, 6, 8], 2, VIDEO_RATIOS_BOTH, true),
        ModelDescriptor::video("veo-3.1-fast-generate-preview", &["Veo 3.1 Fast"], &[4, 6, 8], 2, VIDEO_RATIOS_BOTH, true),
        // Image
        ModelDescriptor::image("imagen-3.0-generate-001", &[], 4, &[]),
        ModelDescriptor::image("imagen-3.0-fast-generate-001", &["Imagen 3 Fast"], 4, &[]),
        ModelDescriptor::image("imagen-3.0-generate-002", &["Imagen 3"], 4, &[]),
        ModelDescriptor::image("imagen-4.0-generate-001", &["Imagen 4", "Imagen4"], 4, IMAGE_SIZES),
        ModelDescriptor::image("imagen-4.0-fast-generate-001", &["Imagen 4 Fast", "Imagen4 Fast"], 4, IMAGE_SIZES),
        ModelDescriptor::image("imagen-4.0-ultra-generate-001", &["Imagen 4 Ultra", "Imagen4 Ultra"], 1, IMAGE_SIZES),
        ModelDescriptor::gemini_image("gemini-2.5-flash-image", &["Nano Banana", "nano-banana"], &[], "Fast image generation and editing from text and reference images."),
        ModelDescriptor::gemini_image("gemini-3-pro-image-preview", &["Nano Banana Pro", "Gemini 3 Pro Image"], GEMINI_IMAGE_SIZES, "Reasoning-driven image generation and multi-image editing (preview)."),
        // Speech
        ModelDescriptor::speech("gemini-2.5-flash-tts", &["Gemini Flash TTS"], "Low-latency, controllable speech generation."),
        ModelDescriptor::speech("gemini-2.5-pro-tts", &["Gemini Pro TTS"], "Highest quality controllable speech generation."),
        ModelDescriptor::speech("gemini-2.5-flash-lite-preview-tts", &["Gemini Flash Lite TTS"], "Cost-efficient speech generation (preview)."),
    ]
}
