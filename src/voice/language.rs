//! Languages offered for recognition and synthesis

use serde::Serialize;

/// Language used when nothing else is configured
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// A selectable language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Language {
    /// BCP-47 tag
    pub code: &'static str,
    /// Human-readable name
    pub name: &'static str,
}

/// Catalogue of languages offered to the user
pub const SUPPORTED_LANGUAGES: &[Language] = &[
    Language {
        code: "en-US",
        name: "English (US)",
    },
    Language {
        code: "en-GB",
        name: "English (UK)",
    },
    Language {
        code: "es-ES",
        name: "Spanish (Spain)",
    },
    Language {
        code: "es-MX",
        name: "Spanish (Mexico)",
    },
    Language {
        code: "fr-FR",
        name: "French",
    },
    Language {
        code: "de-DE",
        name: "German",
    },
    Language {
        code: "it-IT",
        name: "Italian",
    },
    Language {
        code: "pt-BR",
        name: "Portuguese (Brazil)",
    },
    Language {
        code: "ru-RU",
        name: "Russian",
    },
    Language {
        code: "ja-JP",
        name: "Japanese",
    },
    Language {
        code: "ko-KR",
        name: "Korean",
    },
    Language {
        code: "zh-CN",
        name: "Chinese (Simplified)",
    },
    Language {
        code: "hi-IN",
        name: "Hindi",
    },
    Language {
        code: "ar-SA",
        name: "Arabic",
    },
];

/// Look up a catalogue entry, ignoring case
#[must_use]
pub fn find(code: &str) -> Option<&'static Language> {
    SUPPORTED_LANGUAGES
        .iter()
        .find(|lang| lang.code.eq_ignore_ascii_case(code.trim()))
}

#[must_use]
pub fn is_supported(code: &str) -> bool {
    find(code).is_some()
}

/// Primary subtag of a language tag ("en" for "en-US")
#[must_use]
pub fn primary_subtag(code: &str) -> &str {
    code.split(['-', '_']).next().unwrap_or(code)
}

/// Whether two tags name the same language, ignoring case and `_` vs `-`
#[must_use]
pub fn same_language(a: &str, b: &str) -> bool {
    let normalize = |s: &str| s.trim().replace('_', "-").to_ascii_lowercase();
    normalize(a) == normalize(b)
}
