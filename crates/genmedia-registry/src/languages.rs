//! Language name to BCP-47 code table used by `list-voices` and served as a resource.

use std::collections::BTreeMap;

use crate::error::ValidationError;

/// Lowercased language names and their codes.
const LANGUAGES: &[(&str, &str)] = &[
    ("afrikaans (south africa)", "af-ZA"),
    ("albanian (albania)", "sq-AL"),
    ("amharic (ethiopia)", "am-ET"),
    ("arabic (egypt)", "ar-EG"),
    ("arabic (world)", "ar-001"),
    ("armenian (armenia)", "hy-AM"),
    ("azerbaijani (azerbaijan)", "az-AZ"),
    ("bangla (bangladesh)", "bn-BD"),
    ("basque (spain)", "eu-ES"),
    ("belarusian (belarus)", "be-BY"),
    ("bulgarian (bulgaria)", "bg-BG"),
    ("burmese (myanmar)", "my-MM"),
    ("catalan (spain)", "ca-ES"),
    ("cebuano (philippines)", "ceb-PH"),
    ("chinese, mandarin (china)", "cmn-CN"),
    ("chinese, mandarin (taiwan)", "cmn-TW"),
    ("croatian (croatia)", "hr-HR"),
    ("czech (czech republic)", "cs-CZ"),
    ("danish (denmark)", "da-DK"),
    ("dutch (netherlands)", "nl-NL"),
    ("english (australia)", "en-AU"),
    ("english (india)", "en-IN"),
    ("english (united kingdom)", "en-GB"),
    ("english (united states)", "en-US"),
    ("estonian (estonia)", "et-EE"),
    ("filipino (philippines)", "fil-PH"),
    ("finnish (finland)", "fi-FI"),
    ("french (canada)", "fr-CA"),
    ("french (france)", "fr-FR"),
    ("galician (spain)", "gl-ES"),
    ("georgian (georgia)", "ka-GE"),
    ("german (germany)", "de-DE"),
    ("greek (greece)", "el-GR"),
    ("gujarati (india)", "gu-IN"),
    ("haitian creole (haiti)", "ht-HT"),
    ("hebrew (israel)", "he-IL"),
    ("hindi (india)", "hi-IN"),
    ("hungarian (hungary)", "hu-HU"),
    ("icelandic (iceland)", "is-IS"),
    ("indonesian (indonesia)", "id-ID"),
    ("italian (italy)", "it-IT"),
    ("japanese (japan)", "ja-JP"),
    ("javanese (java)", "jv-JV"),
    ("kannada (india)", "kn-IN"),
    ("konkani (india)", "kok-IN"),
    ("korean (south korea)", "ko-KR"),
    ("lao (laos)", "lo-LA"),
    ("latin (vatican city)", "la-VA"),
    ("latvian (latvia)", "lv-LV"),
    ("lithuanian (lithuania)", "lt-LT"),
    ("luxembourgish (luxembourg)", "lb-LU"),
    ("macedonian (north macedonia)", "mk-MK"),
    ("maithili (india)", "mai-IN"),
    ("malagasy (madagascar)", "mg-MG"),
    ("malay (malaysia)", "ms-MY"),
    ("malayalam (india)", "ml-IN"),
    ("marathi (india)", "mr-IN"),
    ("mongolian (mongolia)", "mn-MN"),
    ("nepali (nepal)", "ne-NP"),
    ("norwegian, bokmål (norway)", "nb-NO"),
    ("norwegian, nynorsk (norway)", "nn-NO"),
    ("odia (india)", "or-IN"),
    ("pashto (afghanistan)", "ps-AF"),
    ("persian (iran)", "fa-IR"),
    ("polish (poland)", "pl-PL"),
    ("portuguese (brazil)", "pt-BR"),
    ("portuguese (portugal)", "pt-PT"),
    ("punjabi (india)", "pa-IN"),
    ("romanian (romania)", "ro-RO"),
    ("russian (russia)", "ru-RU"),
    ("serbian (serbia)", "sr-RS"),
    ("sindhi (india)", "sd-IN"),
    ("sinhala (sri lanka)", "si-LK"),
    ("slovak (slovakia)", "sk-SK"),
    ("slovenian (slovenia)", "sl-SI"),
    ("spanish (latin america)", "es-419"),
    ("spanish (mexico)", "es-MX"),
    ("spanish (spain)", "es-ES"),
    ("swahili (kenya)", "sw-KE"),
    ("swedish (sweden)", "sv-SE"),
    ("tamil (india)", "ta-IN"),
    ("telugu (india)", "te-IN"),
    ("thai (thailand)", "th-TH"),
    ("turkish (turkey)", "tr-TR"),
    ("ukrainian (ukraine)", "uk-UA"),
    ("urdu (pakistan)", "ur-PK"),
    ("vietnamese (vietnam)", "vi-VN"),
];

/// Result of resolving a free-form language query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageMatch {
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone)]
pub struct LanguageTable {
    entries: BTreeMap<String, String>,
}

impl Default for LanguageTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl LanguageTable {
    pub fn builtin() -> Self {
        Self {
            entries: LANGUAGES
                .iter()
                .map(|(name, code)| (name.to_string(), code.to_string()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a descriptive name or a BCP-47 code.
    ///
    /// Exact name, then exact code, then a unique substring match over both.
    /// Several substring matches are reported as ambiguous with the sorted candidates.
    pub fn resolve(&self, query: &str) -> Result<LanguageMatch, ValidationError> {
        let normalized = query.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(ValidationError::Language(
                "language query must not be empty".to_string(),
            ));
        }

        if let Some(code) = self.entries.get(&normalized) {
            return Ok(LanguageMatch {
                name: normalized,
                code: code.clone(),
            });
        }

        if let Some((name, code)) = self
            .entries
            .iter()
            .find(|(_, code)| code.to_lowercase() == normalized)
        {
            return Ok(LanguageMatch {
                name: name.clone(),
                code: code.clone(),
            });
        }

        let candidates: Vec<(&String, &String)> = self
            .entries
            .iter()
            .filter(|(name, code)| {
                name.contains(&normalized) || code.to_lowercase().contains(&normalized)
            })
            .collect();

        match candidates.as_slice() {
            [] => Err(ValidationError::Language(format!(
                "unsupported language query: '{query}'. No matching language names or BCP-47 codes found"
            ))),
            [(name, code)] => Ok(LanguageMatch {
                name: (*name).clone(),
                code: (*code).clone(),
            }),
            many => {
                // BTreeMap iteration is already sorted by name.
                let names: Vec<&str> = many.iter().map(|(name, _)| name.as_str()).collect();
                Err(ValidationError::Language(format!(
                    "your language query '{query}' is ambiguous. Please be more specific by choosing one of the following: {}",
                    names.join(", ")
                )))
            }
        }
    }

    /// The table as a JSON object keyed by language name.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.entries).unwrap_or_default()
    }
}
