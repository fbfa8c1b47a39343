use crate::folder::FolderId;
use crate::store::MessageStore;
use std::collections::BTreeSet;

/// Local state of a message captured right before an optimistic move,
/// so a failed move can be put back exactly as it was.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveSnapshot {
    pub message_id: String,
    pub labels: BTreeSet<String>,
    /// Explicit folder entry; `None` when the folder was label-derived.
    pub folder: Option<FolderId>,
    pub placement: Option<FolderId>,
}

impl MoveSnapshot {
    pub fn capture(store: &MessageStore, message_id: &str) -> Option<Self> {
        let message = store.get(message_id)?;
        Some(Self {
            message_id: message_id.to_string(),
            labels: message.labels.clone(),
            folder: store.folders().get(message_id).copied(),
            placement: store.placements().get(message_id).copied(),
        })
    }

    /// Folder the message resolved to before the move.
    pub fn previous_folder(&self) -> FolderId {
        self.folder
            .unwrap_or_else(|| crate::folder::derive_folder_from_labels(&self.labels))
    }

    /// Returns false when the message is no longer in the list.
    pub fn restore(self, store: &mut MessageStore) -> bool {
        if !store.set_labels(&self.message_id, self.labels) {
            return false;
        }
        store.restore_folder_state(&self.message_id, self.folder, self.placement)
    }
}
