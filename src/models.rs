use crate::wire::MessageItem;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// A message in canonical shape.
///
/// `from`, `subject` and `content_text` carry no serde default: their presence
/// is what marks an incoming item as already canonical.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub context_id: String,
    pub from: String,
    #[serde(default)]
    pub from_email: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub to_email: String,
    pub subject: String,
    #[serde(default)]
    pub content_raw: String,
    pub content_text: String,
    #[serde(default)]
    pub content_markdown: String,
    #[serde(default)]
    pub content_html: Option<String>,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub timestamp_iso: String,
    #[serde(default)]
    pub labels: BTreeSet<String>,
    #[serde(default)]
    pub starred: bool,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub preview: String,
    #[serde(default)]
    pub context_for_ai: Option<String>,
}

impl Message {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }
}

/// A locally authored draft as handed over by the compose surface.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSession {
    pub id: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

/// Full mailbox state as returned by the remote state query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxSnapshot {
    #[serde(default)]
    pub mailbox_id: String,
    #[serde(default)]
    pub messages: Option<Vec<MessageItem>>,
    #[serde(default)]
    pub folder_counts: Option<HashMap<String, usize>>,
    #[serde(default)]
    pub placements: Option<HashMap<String, String>>,
    #[serde(default)]
    pub effective_folders: Option<HashMap<String, String>>,
}

/// Response of the remote move endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovePayload {
    #[serde(default)]
    pub mailbox_id: String,
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub previous_folder_id: Option<String>,
    #[serde(default)]
    pub current_folder_id: Option<String>,
    #[serde(default)]
    pub updated_message: Option<MessageItem>,
    #[serde(default)]
    pub folder_counts: Option<HashMap<String, usize>>,
    #[serde(default)]
    pub placements: Option<HashMap<String, String>>,
    #[serde(default)]
    pub messages: Option<Vec<MessageItem>>,
    #[serde(default)]
    pub effective_folders: Option<HashMap<String, String>>,
}

/// A caller's request to move one message.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    #[serde(default)]
    pub mailbox_id: String,
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub target_folder_id: String,
}

impl MoveRequest {
    pub fn new(mailbox_id: &str, message_id: &str, target_folder_id: &str) -> Self {
        Self {
            mailbox_id: mailbox_id.to_string(),
            message_id: message_id.to_string(),
            target_folder_id: target_folder_id.to_string(),
        }
    }
}
