use crate::folder::{FolderId, build_effective_folder_map, merge_labels_with_folder};
use crate::models::{MailboxSnapshot, Message, MovePayload};
use crate::store::MailboxCounters;
use crate::wire::{MessageItem, normalize_messages};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

/// The remote mailbox service as seen by the engine.
#[async_trait]
pub trait MailboxApi: Send + Sync {
    async fn load_snapshot(&self, mailbox_id: &str) -> Result<MailboxSnapshot>;

    async fn submit_move(
        &self,
        mailbox_id: &str,
        message_id: &str,
        target: FolderId,
    ) -> Result<MovePayload>;
}

#[derive(Debug, Default)]
struct ServerState {
    messages: Vec<Message>,
    folders: HashMap<String, FolderId>,
}

impl ServerState {
    fn counts(&self) -> HashMap<String, usize> {
        MailboxCounters::recompute(&self.messages, &self.folders)
            .total
            .into_iter()
            .map(|(folder, count)| (folder.as_str().to_string(), count))
            .collect()
    }

    fn placements(&self) -> HashMap<String, String> {
        self.folders
            .iter()
            .filter(|(_, folder)| **folder != FolderId::Inbox)
            .map(|(id, folder)| (id.clone(), folder.as_str().to_string()))
            .collect()
    }

    fn effective_folders(&self) -> HashMap<String, String> {
        self.folders
            .iter()
            .map(|(id, folder)| (id.clone(), folder.as_str().to_string()))
            .collect()
    }

    fn items(&self) -> Vec<MessageItem> {
        self.messages.iter().cloned().map(MessageItem::from).collect()
    }
}

/// An in-memory mailbox that answers the way the remote service does.
#[derive(Debug)]
pub struct LocalMailbox {
    mailbox_id: String,
    state: Mutex<ServerState>,
}

impl LocalMailbox {
    pub fn new(mailbox_id: &str, snapshot: MailboxSnapshot) -> Self {
        let messages = normalize_messages(snapshot.messages.unwrap_or_default());
        let folders = build_effective_folder_map(snapshot.effective_folders.as_ref(), &messages);
        Self {
            mailbox_id: mailbox_id.to_string(),
            state: Mutex::new(ServerState { messages, folders }),
        }
    }

    pub async fn from_json_file<P: AsRef<Path>>(mailbox_id: &str, path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        let snapshot: MailboxSnapshot =
            serde_json::from_str(&content).context("Failed to parse snapshot")?;
        Ok(Self::new(mailbox_id, snapshot))
    }

    fn check_mailbox(&self, mailbox_id: &str) -> Result<()> {
        if mailbox_id != self.mailbox_id {
            return Err(anyhow!("Unknown mailbox {}", mailbox_id));
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl MailboxApi for LocalMailbox {
    async fn load_snapshot(&self, mailbox_id: &str) -> Result<MailboxSnapshot> {
        self.check_mailbox(mailbox_id)?;
        let state = self.lock();
        Ok(MailboxSnapshot {
            mailbox_id: mailbox_id.to_string(),
            messages: Some(state.items()),
            folder_counts: Some(state.counts()),
            placements: Some(state.placements()),
            effective_folders: Some(state.effective_folders()),
        })
    }

    async fn submit_move(
        &self,
        mailbox_id: &str,
        message_id: &str,
        target: FolderId,
    ) -> Result<MovePayload> {
        self.check_mailbox(mailbox_id)?;
        let mut state = self.lock();

        let previous = {
            let ServerState { messages, folders } = &mut *state;
            let message = messages
                .iter_mut()
                .find(|m| m.id == message_id)
                .ok_or_else(|| anyhow!("Message {} not found", message_id))?;
            let previous = crate::folder::resolve_folder_from_map(folders, message);
            message.labels = merge_labels_with_folder(&message.labels, target);
            folders.insert(message_id.to_string(), target);
            previous
        };
        debug!("Moved {} from {} to {}", message_id, previous, target);

        let updated = state
            .messages
            .iter()
            .find(|m| m.id == message_id)
            .cloned()
            .map(MessageItem::from);

        Ok(MovePayload {
            mailbox_id: mailbox_id.to_string(),
            message_id: message_id.to_string(),
            previous_folder_id: Some(previous.as_str().to_string()),
            current_folder_id: Some(target.as_str().to_string()),
            updated_message: updated,
            folder_counts: Some(state.counts()),
            placements: Some(state.placements()),
            messages: Some(state.items()),
            effective_folders: Some(state.effective_folders()),
        })
    }
}
