//! Localized text handling.
//!
//! Localizable columns store a JSON object mapping language codes to text.
//! Values are resolved against the request language, then the node default
//! language, then fall back to the empty string.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A language the web client ships translations for.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SupportedLanguage {
    pub code: &'static str,
    pub name: &'static str,
}

impl SupportedLanguage {
    const fn new(code: &'static str, name: &'static str) -> Self {
        Self { code, name }
    }
}

pub const LANGUAGES_SUPPORTED: &[SupportedLanguage] = &[
    SupportedLanguage::new("ar", "Arabic"),
    SupportedLanguage::new("bs", "Bosnian"),
    SupportedLanguage::new("ca", "Catalan"),
    SupportedLanguage::new("cs", "Czech"),
    SupportedLanguage::new("da", "Danish"),
    SupportedLanguage::new("de", "German"),
    SupportedLanguage::new("el", "Greek"),
    SupportedLanguage::new("en", "English"),
    SupportedLanguage::new("es", "Spanish"),
    SupportedLanguage::new("fa", "Persian"),
    SupportedLanguage::new("fr", "French"),
    SupportedLanguage::new("he", "Hebrew"),
    SupportedLanguage::new("hr", "Croatian"),
    SupportedLanguage::new("hu", "Hungarian"),
    SupportedLanguage::new("it", "Italian"),
    SupportedLanguage::new("ja", "Japanese"),
    SupportedLanguage::new("ka", "Georgian"),
    SupportedLanguage::new("nb", "Norwegian Bokmål"),
    SupportedLanguage::new("nl", "Dutch"),
    SupportedLanguage::new("pl", "Polish"),
    SupportedLanguage::new("pt_BR", "Portuguese (Brazil)"),
    SupportedLanguage::new("pt_PT", "Portuguese (Portugal)"),
    SupportedLanguage::new("ro", "Romanian"),
    SupportedLanguage::new("ru", "Russian"),
    SupportedLanguage::new("sq", "Albanian"),
    SupportedLanguage::new("sr_RS", "Serbian"),
    SupportedLanguage::new("sv", "Swedish"),
    SupportedLanguage::new("tr", "Turkish"),
    SupportedLanguage::new("uk", "Ukrainian"),
    SupportedLanguage::new("zh_CN", "Chinese (China)"),
    SupportedLanguage::new("zh_TW", "Chinese (Taiwan)"),
];

/// Text translated into any number of languages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalizedText(BTreeMap<String, String>);

impl LocalizedText {
    /// Parse a stored localized column. Missing or malformed values yield no translations.
    pub fn from_column(raw: Option<&str>) -> Self {
        raw.and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default()
    }

    /// Resolve the text for `language`, falling back to `default_language`, then to "".
    pub fn resolve(&self, language: &str, default_language: &str) -> String {
        self.0
            .get(language)
            .or_else(|| self.0.get(default_language))
            .cloned()
            .unwrap_or_default()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LocalizedText {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Pick the response language.
///
/// The requested language is honoured only when enabled on the node,
/// otherwise the node default language is used.
pub fn negotiate_language(
    requested: Option<&str>,
    enabled: &[String],
    default_language: &str,
) -> String {
    requested
        .map(str::trim)
        .filter(|lang| enabled.iter().any(|e| e == lang))
        .unwrap_or(default_language)
        .to_string()
}

/// Extract the primary language tag of an `Accept-Language` header value.
///
/// Region subtags are normalised to the underscore form used by language
/// codes (`pt-BR` becomes `pt_BR`).
pub fn primary_accept_language(header: &str) -> Option<String> {
    let first = header.split(',').next()?.split(';').next()?.trim();
    if first.is_empty() || first == "*" {
        return None;
    }
    Some(first.replace('-', "_"))
}
