use crate::folder::{FolderId, resolve_folder_from_map};
use crate::models::Message;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Per-folder totals derived from the message list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxCounters {
    pub total: BTreeMap<FolderId, usize>,
    pub unread: BTreeMap<FolderId, usize>,
}

impl MailboxCounters {
    pub fn recompute(messages: &[Message], folders: &HashMap<String, FolderId>) -> Self {
        let mut total: BTreeMap<FolderId, usize> = FolderId::ALL.iter().map(|f| (*f, 0)).collect();
        let mut unread = total.clone();

        for message in messages {
            let folder = resolve_folder_from_map(folders, message);
            *total.entry(folder).or_default() += 1;
            if !message.read {
                *unread.entry(folder).or_default() += 1;
            }
        }

        Self { total, unread }
    }

    pub fn get(&self, folder: FolderId) -> usize {
        self.total.get(&folder).copied().unwrap_or(0)
    }

    pub fn unread(&self, folder: FolderId) -> usize {
        self.unread.get(&folder).copied().unwrap_or(0)
    }
}

/// Canonical message list plus the folder state derived alongside it.
#[derive(Debug, Default)]
pub struct MessageStore {
    messages: Vec<Message>,
    folders: HashMap<String, FolderId>,
    placements: HashMap<String, FolderId>,
    counters: MailboxCounters,
}

impl MessageStore {
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn folders(&self) -> &HashMap<String, FolderId> {
        &self.folders
    }

    pub fn placements(&self) -> &HashMap<String, FolderId> {
        &self.placements
    }

    pub fn counters(&self) -> &MailboxCounters {
        &self.counters
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn resolve_folder(&self, message: &Message) -> FolderId {
        resolve_folder_from_map(&self.folders, message)
    }

    pub fn folder_of(&self, id: &str) -> Option<FolderId> {
        self.get(id).map(|m| self.resolve_folder(m))
    }

    /// Drops the list and all folder state, installing new ones.
    pub fn replace_all(
        &mut self,
        messages: Vec<Message>,
        folders: HashMap<String, FolderId>,
        placements: HashMap<String, FolderId>,
    ) {
        self.messages = messages;
        self.folders = folders;
        self.placements = placements;
        self.refresh_counters();
    }

    /// Replaces a message in place. Returns false when the id is unknown.
    pub fn replace(&mut self, message: Message) -> bool {
        match self.messages.iter_mut().find(|m| m.id == message.id) {
            Some(slot) => {
                *slot = message;
                self.refresh_counters();
                true
            }
            None => false,
        }
    }

    /// Inserts at the head when new, otherwise lets `merge` update the existing entry.
    /// Returns true when the message was inserted.
    pub fn upsert_front<F>(&mut self, message: Message, merge: F) -> bool
    where
        F: FnOnce(&mut Message, Message),
    {
        let inserted = match self.messages.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => {
                merge(existing, message);
                false
            }
            None => {
                self.messages.insert(0, message);
                true
            }
        };
        self.refresh_counters();
        inserted
    }

    pub fn remove(&mut self, id: &str) -> Option<Message> {
        let index = self.messages.iter().position(|m| m.id == id)?;
        let removed = self.messages.remove(index);
        self.folders.remove(id);
        self.placements.remove(id);
        self.refresh_counters();
        Some(removed)
    }

    pub fn set_labels(&mut self, id: &str, labels: BTreeSet<String>) -> bool {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                message.labels = labels;
                self.refresh_counters();
                true
            }
            None => false,
        }
    }

    pub fn set_read(&mut self, id: &str, read: bool) -> bool {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                message.read = read;
                self.refresh_counters();
                true
            }
            None => false,
        }
    }

    /// Assigns a folder explicitly; placement only records non-inbox folders.
    pub fn assign_folder(&mut self, id: &str, folder: FolderId) {
        self.folders.insert(id.to_string(), folder);
        self.set_placement(id, Some(folder));
        self.refresh_counters();
    }

    /// Merges explicit folder entries without touching the message list.
    pub fn merge_folders(&mut self, entries: HashMap<String, FolderId>) {
        for (id, folder) in entries {
            self.set_placement(&id, Some(folder));
            self.folders.insert(id, folder);
        }
        self.refresh_counters();
    }

    /// Puts folder and placement entries back exactly as captured.
    /// Messages that left the list stay gone.
    pub fn restore_folder_state(
        &mut self,
        id: &str,
        folder: Option<FolderId>,
        placement: Option<FolderId>,
    ) -> bool {
        if !self.contains(id) {
            return false;
        }
        match folder {
            Some(folder) => self.folders.insert(id.to_string(), folder),
            None => self.folders.remove(id),
        };
        self.set_placement(id, placement);
        self.refresh_counters();
        true
    }

    fn set_placement(&mut self, id: &str, folder: Option<FolderId>) {
        match folder {
            Some(folder) if folder != FolderId::Inbox => {
                self.placements.insert(id.to_string(), folder);
            }
            _ => {
                self.placements.remove(id);
            }
        }
    }

    /// The only writer of `counters`.
    fn refresh_counters(&mut self) {
        self.counters = MailboxCounters::recompute(&self.messages, &self.folders);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::normalize_labels;

    fn message(id: &str, labels: &[&str], read: bool) -> Message {
        Message {
            id: id.to_string(),
            labels: normalize_labels(labels.iter().copied()),
            read,
            ..Message::default()
        }
    }

    fn store_with(messages: Vec<Message>) -> MessageStore {
        let mut store = MessageStore::default();
        store.replace_all(messages, HashMap::new(), HashMap::new());
        store
    }

    #[test]
    fn test_counters_follow_the_list() {
        let mut store = store_with(vec![
            message("m1", &["inbox"], false),
            message("m2", &["archive"], true),
            message("m3", &[], true),
        ]);
        assert_eq!(store.counters().get(FolderId::Inbox), 2);
        assert_eq!(store.counters().unread(FolderId::Inbox), 1);
        assert_eq!(store.counters().get(FolderId::Archive), 1);
        assert_eq!(store.counters().get(FolderId::Trash), 0);

        store.assign_folder("m1", FolderId::Trash);
        assert_eq!(store.counters().get(FolderId::Inbox), 1);
        assert_eq!(store.counters().get(FolderId::Trash), 1);

        store.remove("m2");
        assert_eq!(store.counters().get(FolderId::Archive), 0);
        assert_eq!(
            store.counters(),
            &MailboxCounters::recompute(store.messages(), store.folders())
        );
    }

    #[test]
    fn test_placement_only_holds_non_inbox() {
        let mut store = store_with(vec![message("m1", &[], false)]);
        store.assign_folder("m1", FolderId::Archive);
        assert_eq!(store.placements().get("m1"), Some(&FolderId::Archive));
        store.assign_folder("m1", FolderId::Inbox);
        assert!(store.placements().get("m1").is_none());
        assert_eq!(store.folders().get("m1"), Some(&FolderId::Inbox));
    }

    #[test]
    fn test_upsert_front_inserts_at_head() {
        let mut store = store_with(vec![message("m1", &[], false)]);
        assert!(store.upsert_front(message("d1", &["drafts"], true), |_, _| {}));
        assert_eq!(store.messages()[0].id, "d1");

        let inserted = store.upsert_front(message("d1", &["drafts"], false), |existing, update| {
            existing.read = update.read;
        });
        assert!(!inserted);
        assert_eq!(store.messages().len(), 2);
        assert_eq!(store.messages()[0].id, "d1");
        assert!(!store.messages()[0].read);
    }

    #[test]
    fn test_restore_folder_state_removes_absent_entries() {
        let mut store = store_with(vec![message("m1", &[], false)]);
        store.assign_folder("m1", FolderId::Sent);
        assert!(store.restore_folder_state("m1", None, None));
        assert!(store.folders().get("m1").is_none());
        assert!(store.placements().is_empty());
        assert_eq!(store.folder_of("m1"), Some(FolderId::Inbox));

        assert!(!store.restore_folder_state("gone", Some(FolderId::Trash), Some(FolderId::Trash)));
        assert!(store.folders().get("gone").is_none());
        assert!(store.placements().is_empty());
    }
}
