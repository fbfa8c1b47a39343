use crate::folder::{FolderId, build_effective_folder_map, normalize_folder_id};
use crate::models::{MailboxSnapshot, MovePayload};
use crate::store::MessageStore;
use crate::wire::{MessageItem, normalize_messages};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Anything the server tells us about mailbox state. Absent fields mean
/// "unknown", never "empty".
#[derive(Debug, Clone, Default)]
pub struct ReconcilePayload {
    pub messages: Option<Vec<MessageItem>>,
    pub folder_counts: Option<HashMap<String, usize>>,
    pub placements: Option<HashMap<String, String>>,
    pub effective_folders: Option<HashMap<String, String>>,
    pub updated_message: Option<MessageItem>,
}

impl From<MailboxSnapshot> for ReconcilePayload {
    fn from(snapshot: MailboxSnapshot) -> Self {
        Self {
            messages: snapshot.messages,
            folder_counts: snapshot.folder_counts,
            placements: snapshot.placements,
            effective_folders: snapshot.effective_folders,
            updated_message: None,
        }
    }
}

impl From<MovePayload> for ReconcilePayload {
    fn from(payload: MovePayload) -> Self {
        Self {
            messages: payload.messages,
            folder_counts: payload.folder_counts,
            placements: payload.placements,
            effective_folders: payload.effective_folders,
            updated_message: payload.updated_message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The list was replaced wholesale.
    Replaced { messages: usize },
    /// Only folder entries were merged.
    MergedFolders { entries: usize },
    /// A single message was refreshed in place.
    UpdatedMessage { id: String },
    /// Nothing usable; local state left as it was.
    Skipped,
}

/// Server-side bookkeeping kept next to the store.
#[derive(Debug, Default)]
pub struct SyncState {
    pub mailbox_id: Option<String>,
    pub currently_loading: Option<String>,
    /// Last counts the server reported. Informational; counters are always recomputed.
    pub server_counts: Option<HashMap<String, usize>>,
    pub last_outcome: Option<ReconcileOutcome>,
}

impl SyncState {
    pub fn record(&mut self, counts: Option<&HashMap<String, usize>>, outcome: &ReconcileOutcome) {
        if let Some(counts) = counts {
            self.server_counts = Some(counts.clone());
        }
        self.last_outcome = Some(outcome.clone());
    }
}

/// Folds a server payload into the store.
pub fn reconcile(store: &mut MessageStore, payload: ReconcilePayload) -> ReconcileOutcome {
    let outcome = match (payload.messages, payload.effective_folders, payload.updated_message) {
        (Some(items), effective, _) => {
            let messages = normalize_messages(items);
            let folders = build_effective_folder_map(effective.as_ref(), &messages);
            let placements = build_placements(payload.placements.as_ref(), &folders);
            let count = messages.len();
            store.replace_all(messages, folders, placements);
            ReconcileOutcome::Replaced { messages: count }
        }
        (None, effective, updated) => {
            let mut outcome = ReconcileOutcome::Skipped;
            if let Some(item) = updated {
                let id = item.id().to_string();
                if store.replace(item.into_message()) {
                    outcome = ReconcileOutcome::UpdatedMessage { id };
                } else {
                    debug!("Updated message {} is not loaded, ignoring", id);
                }
            }
            if let Some(effective) = effective {
                let entries: HashMap<String, FolderId> = effective
                    .iter()
                    .map(|(id, folder)| (id.clone(), normalize_folder_id(folder)))
                    .collect();
                let count = entries.len();
                store.merge_folders(entries);
                if outcome == ReconcileOutcome::Skipped {
                    outcome = ReconcileOutcome::MergedFolders { entries: count };
                }
            }
            outcome
        }
    };

    if let Some(counts) = payload.folder_counts.as_ref() {
        check_server_counts(store, counts);
    }

    match &outcome {
        ReconcileOutcome::Skipped => debug!("Reconcile skipped: payload carried no state"),
        other => info!("Reconciled: {:?}", other),
    }
    outcome
}

/// Server placements win; every other non-inbox folder entry is filled in.
fn build_placements(
    server: Option<&HashMap<String, String>>,
    folders: &HashMap<String, FolderId>,
) -> HashMap<String, FolderId> {
    let mut placements: HashMap<String, FolderId> = server
        .map(|entries| {
            entries
                .iter()
                .map(|(id, folder)| (id.clone(), normalize_folder_id(folder)))
                .filter(|(_, folder)| *folder != FolderId::Inbox)
                .collect()
        })
        .unwrap_or_default();

    for (id, folder) in folders {
        if *folder != FolderId::Inbox {
            placements.entry(id.clone()).or_insert(*folder);
        }
    }
    placements
}

fn check_server_counts(store: &MessageStore, counts: &HashMap<String, usize>) {
    for (folder, expected) in counts {
        let canonical = normalize_folder_id(folder);
        if canonical.as_str() != folder.trim().to_lowercase() {
            continue;
        }
        let local = store.counters().get(canonical);
        if local != *expected {
            warn!(
                "Server reports {} messages in {}, local list has {}",
                expected, folder, local
            );
        }
    }
}
