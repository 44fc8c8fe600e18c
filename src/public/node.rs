//! Node description and ahmia descriptor.

use crate::l10n::LANGUAGES_SUPPORTED;
use crate::models::{AhmiaDescriptor, NodeSnapshot, NodeView, NODE_L10N_KEYS};

use super::{Localizer, RuntimeFlags};

pub const PLATFORM_NAME: &str = "Leakdrop";

/// Serialize the node: public settings, localized texts and misc info.
pub fn serialize_node(node: &NodeSnapshot, language: &str, flags: RuntimeFlags) -> NodeView {
    let loc = Localizer::new(language, node.default_language());

    let mut settings = node.settings.clone();
    if flags.devel_mode {
        settings.submission_minimum_delay = 0;
    }

    let texts = NODE_L10N_KEYS
        .iter()
        .map(|key| {
            let value = node.texts.get(*key).map(|t| loc.text(t)).unwrap_or_default();
            (key.to_string(), value)
        })
        .collect();

    let file = |id: &str| node.files.get(id).cloned().unwrap_or_default();

    NodeView {
        settings,
        texts,
        languages_enabled: node.enabled_languages.clone(),
        languages_supported: LANGUAGES_SUPPORTED,
        configured: node.configured,
        accept_submissions: flags.accept_submissions,
        logo: file("logo"),
        css: file("css"),
        homepage: file("homepage"),
        script: file("script"),
    }
}

/// Serialize the descriptor published for the ahmia.fi search engine.
pub fn serialize_ahmia(node: &NodeSnapshot, language: &str) -> AhmiaDescriptor {
    let loc = Localizer::new(language, node.default_language());
    let settings = &node.settings;

    AhmiaDescriptor {
        title: settings.name.clone(),
        description: node
            .texts
            .get("description")
            .map(|t| loc.text(t))
            .unwrap_or_default(),
        keywords: format!("{} ({} instance)", settings.name, PLATFORM_NAME),
        relation: settings.public_site.clone(),
        language: settings.default_language.clone(),
        contact_information: String::new(),
        kind: PLATFORM_NAME.to_string(),
    }
}
