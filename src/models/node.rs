//! Node (global configuration) models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::l10n::SupportedLanguage;

/// Localized node texts exported by the public endpoint, in this order.
pub const NODE_L10N_KEYS: &[&str] = &[
    "description",
    "presentation",
    "footer",
    "security_awareness_title",
    "security_awareness_text",
    "whistleblowing_question",
    "whistleblowing_button",
    "custom_privacy_badge_text",
    "context_selector_label",
];

/// Well-known files served inline with the node description.
pub const NODE_FILES: &[&str] = &["logo", "css", "homepage", "script"];

/// The singleton node configuration row.
///
/// Every field here is public and exported verbatim by the node serializer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeSettings {
    pub name: String,
    pub public_site: String,
    pub hidden_service: String,
    pub tb_download_link: String,
    pub default_language: String,
    pub maximum_namesize: i64,
    pub maximum_textsize: i64,
    pub maximum_filesize: i64,
    pub submission_minimum_delay: i64,
    pub submission_maximum_ttl: i64,
    pub allow_indexing: bool,
    pub ahmia: bool,
    pub simplified_login: bool,
    pub tor2web_unauth: bool,
    pub enable_custom_privacy_badge: bool,
    pub wizard_done: bool,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            public_site: String::new(),
            hidden_service: String::new(),
            tb_download_link: "https://www.torproject.org/download/".to_string(),
            default_language: "en".to_string(),
            maximum_namesize: 128,
            maximum_textsize: 4096,
            maximum_filesize: 30,
            submission_minimum_delay: 10,
            submission_maximum_ttl: 10800,
            allow_indexing: false,
            ahmia: false,
            simplified_login: false,
            tor2web_unauth: true,
            enable_custom_privacy_badge: false,
            wizard_done: false,
        }
    }
}

/// Serialized node description.
#[derive(Debug, Clone, Serialize)]
pub struct NodeView {
    #[serde(flatten)]
    pub settings: NodeSettings,
    #[serde(flatten)]
    pub texts: BTreeMap<String, String>,
    pub languages_enabled: Vec<String>,
    pub languages_supported: &'static [SupportedLanguage],
    pub configured: bool,
    pub accept_submissions: bool,
    pub logo: String,
    pub css: String,
    pub homepage: String,
    pub script: String,
}

/// Descriptor consumed by the ahmia.fi onion search engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AhmiaDescriptor {
    pub title: String,
    pub description: String,
    pub keywords: String,
    pub relation: String,
    pub language: String,
    #[serde(rename = "contactInformation")]
    pub contact_information: String,
    #[serde(rename = "type")]
    pub kind: String,
}
