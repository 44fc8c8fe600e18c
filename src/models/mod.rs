//! Data models for the Leakdrop public API.
//!
//! Row types mirror the stored entities; view types are the JSON shapes
//! served to the whistleblower-facing web client.

mod context;
mod node;
mod notification;
mod questionnaire;
mod receiver;
mod snapshot;
mod submission;

pub use context::*;
pub use node::*;
pub use notification::*;
pub use questionnaire::*;
pub use receiver::*;
pub use snapshot::*;
pub use submission::*;
