//! Session configuration: languages, voice selection, and the system
//! instruction sent to the translation backend at connect time.

use serde::{Deserialize, Serialize};

// ── Language codes ─────────────────────────────────────────────────

/// Languages the translator can speak and understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    En, // English
    Es, // Spanish
    Fr, // French
    De, // German
    It, // Italian
    Pt, // Portuguese
    Nl, // Dutch
    Pl, // Polish
    Ru, // Russian
    Uk, // Ukrainian
    Tr, // Turkish
    Ar, // Arabic
    Hi, // Hindi
    Ja, // Japanese
    Ko, // Korean
    Zh, // Chinese (Simplified)
    Vi, // Vietnamese
    Th, // Thai
}

impl Language {
    /// Get the ISO 639-1 code string.
    pub fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Es => "es",
            Self::Fr => "fr",
            Self::De => "de",
            Self::It => "it",
            Self::Pt => "pt",
            Self::Nl => "nl",
            Self::Pl => "pl",
            Self::Ru => "ru",
            Self::Uk => "uk",
            Self::Tr => "tr",
            Self::Ar => "ar",
            Self::Hi => "hi",
            Self::Ja => "ja",
            Self::Ko => "ko",
            Self::Zh => "zh",
            Self::Vi => "vi",
            Self::Th => "th",
        }
    }

    /// Get the human-readable language name.
    pub fn label(self) -> &'static str {
        match self {
            Self::En => "English",
            Self::Es => "Spanish",
            Self::Fr => "French",
            Self::De => "German",
            Self::It => "Italian",
            Self::Pt => "Portuguese",
            Self::Nl => "Dutch",
            Self::Pl => "Polish",
            Self::Ru => "Russian",
            Self::Uk => "Ukrainian",
            Self::Tr => "Turkish",
            Self::Ar => "Arabic",
            Self::Hi => "Hindi",
            Self::Ja => "Japanese",
            Self::Ko => "Korean",
            Self::Zh => "Chinese (Simplified)",
            Self::Vi => "Vietnamese",
            Self::Th => "Thai",
        }
    }

    /// Parse from an ISO code (case-insensitive).
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_lowercase().as_str() {
            "en" => Some(Self::En),
            "es" => Some(Self::Es),
            "fr" => Some(Self::Fr),
            "de" => Some(Self::De),
            "it" => Some(Self::It),
            "pt" => Some(Self::Pt),
            "nl" => Some(Self::Nl),
            "pl" => Some(Self::Pl),
            "ru" => Some(Self::Ru),
            "uk" => Some(Self::Uk),
            "tr" => Some(Self::Tr),
            "ar" => Some(Self::Ar),
            "hi" => Some(Self::Hi),
            "ja" => Some(Self::Ja),
            "ko" => Some(Self::Ko),
            "zh" => Some(Self::Zh),
            "vi" => Some(Self::Vi),
            "th" => Some(Self::Th),
            _ => None,
        }
    }

    /// All supported languages.
    pub fn all() -> &'static [Language] {
        &[
            Self::En,
            Self::Es,
            Self::Fr,
            Self::De,
            Self::It,
            Self::Pt,
            Self::Nl,
            Self::Pl,
            Self::Ru,
            Self::Uk,
            Self::Tr,
            Self::Ar,
            Self::Hi,
            Self::Ja,
            Self::Ko,
            Self::Zh,
            Self::Vi,
            Self::Th,
        ]
    }
}

// ── Source language (may be auto-detected) ─────────────────────────

/// The language the speaker is expected to use. `Auto` lets the backend
/// detect it from the audio itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SourceLanguage {
    #[default]
    Auto,
    Fixed(Language),
}

impl SourceLanguage {
    /// Human-readable label for the history log and UI.
    pub fn label(self) -> &'static str {
        match self {
            Self::Auto => "Auto-detect",
            Self::Fixed(lang) => lang.label(),
        }
    }
}

// ── Voice selection ────────────────────────────────────────────────

/// Coarse voice preference, mapped to one of two prebuilt voices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VoiceGender {
    Male,
    #[default]
    Female,
}

impl VoiceGender {
    /// Prebuilt voice identity for the streaming backend.
    pub fn voice_name(self) -> &'static str {
        match self {
            Self::Male => "Puck",
            Self::Female => "Aoede",
        }
    }
}

// ── Translator configuration ───────────────────────────────────────

/// Configuration for one translation session. Held in memory by the UI
/// shell; any change while a session is live restarts the session rather
/// than reconfiguring it mid-stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    /// Source language (input), or auto-detect.
    pub source: SourceLanguage,
    /// Target language (output).
    pub target: Language,
    /// Voice preference for synthesized output.
    pub voice: VoiceGender,
    /// API key for the translation backend.
    pub api_key: String,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            source: SourceLanguage::Auto,
            target: Language::Es,
            voice: VoiceGender::default(),
            api_key: String::new(),
        }
    }
}

impl TranslatorConfig {
    /// Build the system instruction describing the translation task.
    ///
    /// Sent once at connect time; the backend applies it to every turn.
    pub fn build_system_prompt(&self) -> String {
        let source_clause = match self.source {
            SourceLanguage::Auto => {
                "Detect the language the speaker is using.".to_string()
            }
            SourceLanguage::Fixed(lang) => {
                format!("The speaker is using {}.", lang.label())
            }
        };

        format!(
            "You are a live speech translator. {source_clause} \
             Translate everything the speaker says into {target} and speak \
             the translation aloud. Speak ONLY the translated words — never \
             explain, never comment, never answer questions directed at you. \
             Preserve the speaker's tone and intent.",
            target = self.target.label(),
        )
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_code_roundtrip() {
        for lang in Language::all() {
            assert_eq!(Language::from_code(lang.code()), Some(*lang));
        }
    }

    #[test]
    fn language_parse_case_insensitive() {
        assert_eq!(Language::from_code("KO"), Some(Language::Ko));
        assert_eq!(Language::from_code("Es"), Some(Language::Es));
        assert_eq!(Language::from_code("xx"), None);
    }

    #[test]
    fn source_language_labels() {
        assert_eq!(SourceLanguage::Auto.label(), "Auto-detect");
        assert_eq!(SourceLanguage::Fixed(Language::Fr).label(), "French");
    }

    #[test]
    fn voice_gender_maps_to_distinct_voices() {
        assert_ne!(
            VoiceGender::Male.voice_name(),
            VoiceGender::Female.voice_name()
        );
    }

    #[test]
    fn system_prompt_fixed_source() {
        let config = TranslatorConfig {
            source: SourceLanguage::Fixed(Language::De),
            target: Language::En,
            ..Default::default()
        };
        let prompt = config.build_system_prompt();
        assert!(prompt.contains("German"));
        assert!(prompt.contains("English"));
        assert!(prompt.contains("translator"));
    }

    #[test]
    fn system_prompt_auto_source() {
        let config = TranslatorConfig {
            source: SourceLanguage::Auto,
            target: Language::Ja,
            ..Default::default()
        };
        let prompt = config.build_system_prompt();
        assert!(prompt.contains("Detect the language"));
        assert!(prompt.contains("Japanese"));
    }
}
