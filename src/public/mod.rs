//! Projection of the stored entity tree into the public, localized views.
//!
//! Everything here is synchronous and works on snapshots loaded by the
//! repository, so a response never mixes rows from two transactions.

mod context;
mod node;
mod questionnaire;
mod receiver;

pub use context::*;
pub use node::*;
pub use questionnaire::*;
pub use receiver::*;

use serde::Serialize;

use crate::config::Config;
use crate::l10n::LocalizedText;
use crate::models::{ContextView, NodeView, PublicSnapshot, ReceiverView};

/// Resolves localized texts for one request.
#[derive(Debug, Clone, Copy)]
pub struct Localizer<'a> {
    pub language: &'a str,
    pub default_language: &'a str,
}

impl<'a> Localizer<'a> {
    pub fn new(language: &'a str, default_language: &'a str) -> Self {
        Self {
            language,
            default_language,
        }
    }

    pub fn text(&self, text: &LocalizedText) -> String {
        text.resolve(self.language, self.default_language)
    }
}

/// Process-level settings that shape the node description.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeFlags {
    pub devel_mode: bool,
    pub accept_submissions: bool,
}

impl From<&Config> for RuntimeFlags {
    fn from(config: &Config) -> Self {
        Self {
            devel_mode: config.devel_mode,
            accept_submissions: config.accept_submissions,
        }
    }
}

/// Body of the public resources endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct PublicResources {
    pub node: NodeView,
    pub contexts: Vec<ContextView>,
    pub receivers: Vec<ReceiverView>,
}

pub fn serialize_public_resources(
    snapshot: &PublicSnapshot,
    language: &str,
    flags: RuntimeFlags,
) -> PublicResources {
    let forms = FormIndex::new(snapshot);

    PublicResources {
        node: serialize_node(&snapshot.node, language, flags),
        contexts: public_context_list(snapshot, &forms, language),
        receivers: public_receiver_list(snapshot, language),
    }
}
