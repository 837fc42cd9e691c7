//! Speech voice catalog.

use serde::{Deserialize, Serialize};

pub const DEFAULT_VOICE: &str = "Callirrhoe";

const GEMINI_VOICES: &[&str] = &[
    "Achernar",
    "Achird",
    "Algenib",
    "Algieba",
    "Alnilam",
    "Aoede",
    "Autonoe",
    "Callirrhoe",
    "Charon",
    "Despina",
    "Enceladus",
    "Erinome",
    "Fenrir",
    "Gacrux",
    "Iapetus",
    "Kore",
    "Laomedeia",
    "Leda",
    "Orus",
    "Pulcherrima",
    "Puck",
    "Rasalgethi",
    "Sadachbia",
    "Sadaltager",
    "Schedar",
    "Sulafat",
    "Umbriel",
    "Vindemiatrix",
    "Zephyr",
    "Zubenelgenubi",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceInfo {
    pub name: String,
    /// Empty means the voice speaks every supported language.
    #[serde(default)]
    pub language_codes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
}

impl VoiceInfo {
    /// The short voice name, e.g. `Kore` for `en-US-Chirp3-HD-Kore`.
    pub fn short_name(&self) -> &str {
        self.name.rsplit('-').next().unwrap_or(&self.name)
    }

    pub fn speaks(&self, code: &str) -> bool {
        self.language_codes.is_empty()
            || self
                .language_codes
                .iter()
                .any(|lc| lc.eq_ignore_ascii_case(code))
    }
}

/// Voices known to the speech backend, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct VoiceCatalog {
    voices: Vec<VoiceInfo>,
}

impl VoiceCatalog {
    pub fn new(mut voices: Vec<VoiceInfo>) -> Self {
        voices.sort_by(|a, b| a.name.cmp(&b.name));
        voices.dedup_by(|a, b| a.name == b.name);
        Self { voices }
    }

    /// The documented Gemini TTS voices, all multilingual.
    pub fn builtin() -> Self {
        Self::new(
            GEMINI_VOICES
                .iter()
                .map(|name| VoiceInfo {
                    name: name.to_string(),
                    language_codes: Vec::new(),
                    gender: None,
                })
                .collect(),
        )
    }

    /// Collapse a raw backend listing into Gemini voice names.
    ///
    /// Gemini TTS voices share their names with the Chirp3-HD family, which the
    /// listing reports once per locale (`en-US-Chirp3-HD-Kore`). Those entries are
    /// merged into one voice per short name carrying every locale seen.
    pub fn from_listing(listing: Vec<VoiceInfo>) -> Self {
        let mut merged: std::collections::BTreeMap<String, VoiceInfo> = Default::default();
        for voice in listing {
            if !voice.name.contains("-Chirp3-HD-") {
                continue;
            }
            let short = voice.short_name().to_string();
            let entry = merged.entry(short.clone()).or_insert_with(|| VoiceInfo {
                name: short,
                language_codes: Vec::new(),
                gender: voice.gender.clone(),
            });
            for code in voice.language_codes {
                if !entry.language_codes.contains(&code) {
                    entry.language_codes.push(code);
                }
            }
        }
        Self::new(merged.into_values().collect())
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn all(&self) -> &[VoiceInfo] {
        &self.voices
    }

    /// Case-insensitive lookup by full or short name.
    pub fn find(&self, name: &str) -> Option<&VoiceInfo> {
        let name = name.trim();
        self.voices
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(name))
            .or_else(|| {
                self.voices
                    .iter()
                    .find(|v| v.short_name().eq_ignore_ascii_case(name))
            })
    }

    pub fn for_language(&self, code: &str) -> Vec<&VoiceInfo> {
        self.voices.iter().filter(|v| v.speaks(code)).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.voices.iter().map(|v| v.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_contains_default() {
        let catalog = VoiceCatalog::builtin();
        assert_eq!(catalog.len(), 30);
        assert!(catalog.find(DEFAULT_VOICE).is_some());
        assert!(catalog.find("callirrhoe").is_some());
        assert!(catalog.find("Nobody").is_none());
    }

    #[test]
    fn test_find_by_short_name() {
        let catalog = VoiceCatalog::new(vec![VoiceInfo {
            name: "en-US-Chirp3-HD-Kore".into(),
            language_codes: vec!["en-US".into()],
            gender: Some("FEMALE".into()),
        }]);
        let voice = catalog.find("kore").unwrap();
        assert_eq!(voice.name, "en-US-Chirp3-HD-Kore");
    }

    #[test]
    fn test_from_listing_collapses_locales() {
        let listing = vec![
            VoiceInfo {
                name: "en-US-Chirp3-HD-Kore".into(),
                language_codes: vec!["en-US".into()],
                gender: Some("FEMALE".into()),
            },
            VoiceInfo {
                name: "de-DE-Chirp3-HD-Kore".into(),
                language_codes: vec!["de-DE".into()],
                gender: Some("FEMALE".into()),
            },
            VoiceInfo {
                name: "en-US-Standard-A".into(),
                language_codes: vec!["en-US".into()],
                gender: None,
            },
        ];
        let catalog = VoiceCatalog::from_listing(listing);
        assert_eq!(catalog.names(), vec!["Kore"]);
        let kore = catalog.find("Kore").unwrap();
        assert_eq!(kore.language_codes, vec!["en-US", "de-DE"]);
        assert!(kore.speaks("de-de"));
        assert!(!kore.speaks("fr-FR"));
    }

    #[test]
    fn test_for_language() {
        let catalog = VoiceCatalog::new(vec![
            VoiceInfo {
                name: "en-US-Chirp3-HD-Kore".into(),
                language_codes: vec!["en-US".into()],
                gender: None,
            },
            VoiceInfo {
                name: "de-DE-Chirp3-HD-Puck".into(),
                language_codes: vec!["de-DE".into()],
                gender: None,
            },
            VoiceInfo {
                name: "Zephyr".into(),
                language_codes: Vec::new(),
                gender: None,
            },
        ]);
        let names: Vec<&str> = catalog
            .for_language("en-us")
            .iter()
            .map(|v| v.name.as_str())
            .collect();
        assert_eq!(names, vec!["Zephyr", "en-US-Chirp3-HD-Kore"]);
    }
}
