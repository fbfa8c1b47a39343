use crate::folder::{FolderId, resolve_folder_from_map};
use crate::models::Message;
use std::collections::HashMap;

/// What the active folder selection matches against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailboxView {
    Folder(FolderId),
    Starred,
    Snoozed,
    Other(String),
}

impl MailboxView {
    pub fn parse(selection: &str) -> Self {
        match selection.trim().to_lowercase().as_str() {
            "inbox" => MailboxView::Folder(FolderId::Inbox),
            "archive" => MailboxView::Folder(FolderId::Archive),
            "trash" => MailboxView::Folder(FolderId::Trash),
            "sent" => MailboxView::Folder(FolderId::Sent),
            "drafts" => MailboxView::Folder(FolderId::Drafts),
            "starred" => MailboxView::Starred,
            "snoozed" => MailboxView::Snoozed,
            _ => MailboxView::Other(selection.to_string()),
        }
    }

    pub fn matches(&self, message: &Message, folders: &HashMap<String, FolderId>) -> bool {
        match self {
            MailboxView::Folder(folder) => resolve_folder_from_map(folders, message) == *folder,
            MailboxView::Starred => message.starred,
            MailboxView::Snoozed => message.has_label("snoozed"),
            MailboxView::Other(raw) => {
                resolve_folder_from_map(folders, message).as_str() == raw.as_str()
            }
        }
    }
}

pub fn matches_search(message: &Message, query: &str) -> bool {
    let query = query.trim();
    if query.is_empty() {
        return true;
    }
    let haystack = format!("{} {} {}", message.subject, message.from, message.preview);
    haystack.to_lowercase().contains(&query.to_lowercase())
}

/// Messages visible for the active folder and search text, in list order.
pub fn filter_messages<'a>(
    messages: &'a [Message],
    folder: &str,
    search: &str,
    folders: &HashMap<String, FolderId>,
) -> Vec<&'a Message> {
    let view = MailboxView::parse(folder);
    messages
        .iter()
        .filter(|m| view.matches(m, folders))
        .filter(|m| matches_search(m, search))
        .collect()
}
