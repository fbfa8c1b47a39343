use crate::models::Message;
use inflections::case::to_title_case;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Labels that place a message in exactly one folder.
pub const EXCLUSIVE_LABELS: [&str; 7] = [
    "archive", "archived", "trash", "deleted", "sent", "drafts", "draft",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FolderId {
    #[default]
    Inbox,
    Archive,
    Trash,
    Sent,
    Drafts,
}

impl FolderId {
    pub const ALL: [FolderId; 5] = [
        FolderId::Inbox,
        FolderId::Archive,
        FolderId::Trash,
        FolderId::Sent,
        FolderId::Drafts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FolderId::Inbox => "inbox",
            FolderId::Archive => "archive",
            FolderId::Trash => "trash",
            FolderId::Sent => "sent",
            FolderId::Drafts => "drafts",
        }
    }

    /// The label a message carries while it sits in this folder. Inbox has none.
    pub fn label(&self) -> Option<&'static str> {
        match self {
            FolderId::Inbox => None,
            other => Some(other.as_str()),
        }
    }

    pub fn display_name(&self) -> String {
        to_title_case(self.as_str())
    }
}

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for FolderId {
    fn from(raw: &str) -> Self {
        normalize_folder_id(raw)
    }
}

/// Canonicalizes a folder identifier. Anything outside the fixed set is inbox.
pub fn normalize_folder_id(raw: &str) -> FolderId {
    match raw.trim().to_lowercase().as_str() {
        "archive" => FolderId::Archive,
        "trash" => FolderId::Trash,
        "sent" => FolderId::Sent,
        "drafts" => FolderId::Drafts,
        _ => FolderId::Inbox,
    }
}

/// Picks a single folder from a label set.
///
/// Precedence is trash > archive > sent > drafts > inbox. A message carrying
/// several exclusive labels resolves by this order, so it must not change.
pub fn derive_folder_from_labels<I, S>(labels: I) -> FolderId
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut trash = false;
    let mut archive = false;
    let mut sent = false;
    let mut drafts = false;

    for label in labels {
        match label.as_ref().trim().to_lowercase().as_str() {
            "trash" | "deleted" => trash = true,
            "archive" | "archived" => archive = true,
            "sent" => sent = true,
            "drafts" | "draft" => drafts = true,
            _ => {}
        }
    }

    if trash {
        FolderId::Trash
    } else if archive {
        FolderId::Archive
    } else if sent {
        FolderId::Sent
    } else if drafts {
        FolderId::Drafts
    } else {
        FolderId::Inbox
    }
}

/// Strips every exclusive label and adds the one implied by `target`.
pub fn merge_labels_with_folder(labels: &BTreeSet<String>, target: FolderId) -> BTreeSet<String> {
    let mut merged: BTreeSet<String> = labels
        .iter()
        .filter(|label| !EXCLUSIVE_LABELS.contains(&label.as_str()))
        .cloned()
        .collect();
    if let Some(label) = target.label() {
        merged.insert(label.to_string());
    }
    merged
}

pub fn resolve_folder_from_map(map: &HashMap<String, FolderId>, message: &Message) -> FolderId {
    map.get(&message.id)
        .copied()
        .unwrap_or_else(|| derive_folder_from_labels(&message.labels))
}

/// Normalizes the server's explicit entries and fills in a label-derived entry
/// for every message the server did not mention.
pub fn build_effective_folder_map(
    server_map: Option<&HashMap<String, String>>,
    messages: &[Message],
) -> HashMap<String, FolderId> {
    let mut map: HashMap<String, FolderId> = server_map
        .map(|entries| {
            entries
                .iter()
                .map(|(id, folder)| (id.clone(), normalize_folder_id(folder)))
                .collect()
        })
        .unwrap_or_default();

    for message in messages {
        map.entry(message.id.clone())
            .or_insert_with(|| derive_folder_from_labels(&message.labels));
    }

    map
}
