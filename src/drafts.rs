use crate::config::DraftSettings;
use crate::folder::{FolderId, merge_labels_with_folder};
use crate::models::{DraftSession, Message};
use crate::store::MessageStore;
use crate::wire::make_preview;
use chrono::Utc;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Builds the list entry shown for a draft that has not been sent yet.
pub fn synthesize_draft(draft: &DraftSession, settings: &DraftSettings) -> Message {
    let subject = if draft.subject.trim().is_empty() {
        settings.untitled_subject.clone()
    } else {
        draft.subject.clone()
    };

    Message {
        id: draft.id.clone(),
        context_id: draft.id.clone(),
        from: settings.sender_name.clone(),
        from_email: settings.sender_email.clone(),
        to: draft.to.clone(),
        to_email: draft.to.clone(),
        subject,
        content_raw: draft.body.clone(),
        content_text: draft.body.clone(),
        content_markdown: draft.body.clone(),
        content_html: None,
        timestamp: settings.just_now_label.clone(),
        timestamp_iso: Utc::now().to_rfc3339(),
        labels: BTreeSet::from([FolderId::Drafts.as_str().to_string()]),
        starred: false,
        read: true,
        preview: make_preview(&draft.body),
        context_for_ai: None,
    }
}

/// Inserts or refreshes the draft's list entry and files it under drafts.
/// Returns the stored message.
pub fn save_draft_session(
    store: &mut MessageStore,
    draft: &DraftSession,
    settings: &DraftSettings,
) -> Option<Message> {
    if draft.id.trim().is_empty() {
        debug!("Draft without id ignored");
        return None;
    }

    let message = synthesize_draft(draft, settings);
    let inserted = store.upsert_front(message, |existing, update| {
        existing.to = update.to;
        existing.to_email = update.to_email;
        existing.subject = update.subject;
        existing.content_raw = update.content_raw;
        existing.content_text = update.content_text;
        existing.content_markdown = update.content_markdown;
        existing.preview = update.preview;
        existing.timestamp = update.timestamp;
        existing.timestamp_iso = update.timestamp_iso;
        existing.labels = update.labels;
    });
    store.assign_folder(&draft.id, FolderId::Drafts);

    if inserted {
        info!("Draft {} created", draft.id);
    } else {
        debug!("Draft {} updated", draft.id);
    }
    store.get(&draft.id).cloned()
}

/// Files a draft under sent once transmission succeeded elsewhere.
pub fn mark_draft_as_sent(store: &mut MessageStore, draft_id: &str) -> bool {
    let Some(labels) = store
        .get(draft_id)
        .map(|m| merge_labels_with_folder(&m.labels, FolderId::Sent))
    else {
        debug!("Draft {} not found, nothing to mark as sent", draft_id);
        return false;
    };

    store.set_labels(draft_id, labels);
    store.assign_folder(draft_id, FolderId::Sent);
    info!("Draft {} marked as sent", draft_id);
    true
}

pub fn delete_draft_message(store: &mut MessageStore, draft_id: &str) -> bool {
    match store.remove(draft_id) {
        Some(_) => {
            info!("Draft {} deleted", draft_id);
            true
        }
        None => {
            debug!("Draft {} not found, nothing to delete", draft_id);
            false
        }
    }
}
