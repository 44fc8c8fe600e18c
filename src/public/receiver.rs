//! Receiver serialization.

use crate::models::{PublicSnapshot, ReceiverRow, ReceiverView, USER_STATE_DISABLED};

use super::Localizer;

pub fn serialize_receiver(
    snapshot: &PublicSnapshot,
    receiver: &ReceiverRow,
    loc: &Localizer<'_>,
) -> ReceiverView {
    let contexts = snapshot
        .contexts
        .iter()
        .filter(|context| {
            snapshot
                .receiver_contexts
                .iter()
                .any(|link| link.receiver_id == receiver.id && link.context_id == context.id)
        })
        .map(|context| context.id.clone())
        .collect();

    // Usernames are only public when receivers log in by picking their name.
    let username = if snapshot.node.settings.simplified_login {
        receiver.username.clone()
    } else {
        String::new()
    };

    ReceiverView {
        id: receiver.id.clone(),
        name: receiver.public_name.clone(),
        username,
        state: receiver.state.clone(),
        configuration: receiver.configuration.clone(),
        presentation_order: receiver.presentation_order,
        contexts,
        picture: receiver
            .picture_id
            .as_ref()
            .and_then(|id| snapshot.pictures.get(id))
            .cloned()
            .unwrap_or_default(),
        description: loc.text(&receiver.description),
    }
}

pub fn public_receiver_list(snapshot: &PublicSnapshot, language: &str) -> Vec<ReceiverView> {
    let loc = Localizer::new(language, snapshot.node.default_language());

    snapshot
        .receivers
        .iter()
        .filter(|receiver| receiver.state != USER_STATE_DISABLED)
        .map(|receiver| serialize_receiver(snapshot, receiver, &loc))
        .collect()
}
