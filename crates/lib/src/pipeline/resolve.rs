//! Attachment resolver: pick the remote-file references a submission carries.

use crate::channels::{AttachmentRef, InboundMessage};
use std::collections::HashSet;

/// The single reference a message contributes, by priority photo > document >
/// video; for photos, the largest (last) resolution variant. None when the
/// message carries no recognized attachment kind.
pub fn primary_attachment(message: &InboundMessage) -> Option<AttachmentRef> {
    if let Some(photo) = message.photo_variants.last() {
        return Some(photo.clone());
    }
    if let Some(ref document) = message.document {
        return Some(document.clone());
    }
    message.video.clone()
}

/// References for the whole submission: the triggering message plus whatever
/// group siblings are available at call time. Ordered by message id,
/// deduplicated by file id. An empty result is not an error.
pub fn resolve(message: &InboundMessage, siblings: &[InboundMessage]) -> Vec<AttachmentRef> {
    let mut entries: Vec<(i64, AttachmentRef)> = Vec::new();
    if let Some(reference) = primary_attachment(message) {
        entries.push((message.message_id, reference));
    }
    for sibling in siblings {
        if sibling.message_id == message.message_id {
            continue;
        }
        if let Some(reference) = primary_attachment(sibling) {
            entries.push((sibling.message_id, reference));
        }
    }
    entries.sort_by_key(|(id, _)| *id);

    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|(_, r)| seen.insert(r.file_id.clone()))
        .map(|(_, r)| r)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::AttachmentKind;

    fn empty_message(message_id: i64) -> InboundMessage {
        InboundMessage {
            channel_id: "telegram".to_string(),
            conversation_id: "1".to_string(),
            message_id,
            text: None,
            caption: None,
            media_group_id: None,
            photo_variants: Vec::new(),
            document: None,
            video: None,
            topic: None,
        }
    }

    fn reference(file_id: &str, kind: AttachmentKind) -> AttachmentRef {
        AttachmentRef {
            file_id: file_id.to_string(),
            kind,
            file_name: None,
        }
    }

    #[test]
    fn photo_takes_priority_and_largest_variant_wins() {
        let mut msg = empty_message(1);
        msg.photo_variants = vec![
            reference("small", AttachmentKind::Photo),
            reference("large", AttachmentKind::Photo),
        ];
        msg.document = Some(reference("doc", AttachmentKind::Document));
        msg.video = Some(reference("vid", AttachmentKind::Video));

        let picked = primary_attachment(&msg).expect("reference");
        assert_eq!(picked.file_id, "large");
    }

    #[test]
    fn document_beats_video() {
        let mut msg = empty_message(1);
        msg.document = Some(reference("doc", AttachmentKind::Document));
        msg.video = Some(reference("vid", AttachmentKind::Video));
        assert_eq!(primary_attachment(&msg).unwrap().file_id, "doc");
    }

    #[test]
    fn no_attachment_resolves_to_empty_list() {
        let msg = empty_message(1);
        assert!(primary_attachment(&msg).is_none());
        assert!(resolve(&msg, &[]).is_empty());
    }

    #[test]
    fn group_collects_one_reference_per_sibling_in_message_order() {
        let mut trigger = empty_message(3);
        trigger.caption = Some("#bug album".to_string());

        let mut first = empty_message(1);
        first.photo_variants = vec![reference("p1", AttachmentKind::Photo)];
        let mut second = empty_message(2);
        second.photo_variants = vec![reference("p2", AttachmentKind::Photo)];

        let refs = resolve(&trigger, &[second, first]);
        let ids: Vec<&str> = refs.iter().map(|r| r.file_id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2"]);
    }

    #[test]
    fn trigger_message_listed_among_siblings_is_not_duplicated() {
        let mut trigger = empty_message(1);
        trigger.photo_variants = vec![reference("p1", AttachmentKind::Photo)];

        let refs = resolve(&trigger, std::slice::from_ref(&trigger));
        assert_eq!(refs.len(), 1);
    }
}
