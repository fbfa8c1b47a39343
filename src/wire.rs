use crate::models::Message;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const PREVIEW_CHARS: usize = 140;

/// Message as the mailbox service sends it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    pub id: String,
    #[serde(default)]
    pub context_id: Option<String>,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub sender_email: Option<String>,
    #[serde(default)]
    pub recipient_name: Option<String>,
    #[serde(default)]
    pub recipient_email: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub email_body_raw: Option<String>,
    #[serde(default)]
    pub email_body_transformed_text: Option<String>,
    #[serde(default)]
    pub email_body_transformed_markdown: Option<String>,
    #[serde(default)]
    pub email_body_html: Option<String>,
    #[serde(default)]
    pub received_timestamp_iso: Option<String>,
    #[serde(default)]
    pub received_timestamp_display: Option<String>,
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    #[serde(default)]
    pub starred: Option<bool>,
    #[serde(default)]
    pub read: Option<bool>,
    #[serde(default)]
    pub context_for_ai: Option<String>,
}

/// Either shape may show up in a message list; canonical items are tried first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageItem {
    Canonical(Message),
    Raw(RawMessage),
}

impl MessageItem {
    pub fn id(&self) -> &str {
        match self {
            MessageItem::Canonical(m) => &m.id,
            MessageItem::Raw(r) => &r.id,
        }
    }

    pub fn into_message(self) -> Message {
        match self {
            MessageItem::Canonical(message) => message,
            MessageItem::Raw(raw) => normalize_message(raw),
        }
    }
}

impl From<Message> for MessageItem {
    fn from(message: Message) -> Self {
        MessageItem::Canonical(message)
    }
}

impl From<RawMessage> for MessageItem {
    fn from(raw: RawMessage) -> Self {
        MessageItem::Raw(raw)
    }
}

pub fn normalize_messages(items: Vec<MessageItem>) -> Vec<Message> {
    items.into_iter().map(MessageItem::into_message).collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

pub fn normalize_labels<I, S>(labels: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    labels
        .into_iter()
        .map(|l| l.as_ref().trim().to_lowercase())
        .filter(|l| !l.is_empty())
        .collect()
}

/// Collapses runs of whitespace and cuts the text down to a list preview.
pub fn make_preview(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(PREVIEW_CHARS).collect()
}

pub fn display_timestamp(iso: &str) -> Option<String> {
    DateTime::parse_from_rfc3339(iso.trim())
        .ok()
        .map(|date| {
            date.with_timezone(&Local)
                .format("%b %d %Y @ %-I:%M%p")
                .to_string()
        })
}

pub fn normalize_message(raw: RawMessage) -> Message {
    let from_email = raw.sender_email.unwrap_or_default();
    let from = non_empty(raw.sender_name)
        .or_else(|| non_empty(Some(from_email.clone())))
        .unwrap_or_else(|| "Unknown sender".to_string());
    let to_email = raw.recipient_email.unwrap_or_default();
    let to = non_empty(raw.recipient_name).unwrap_or_else(|| to_email.clone());

    let content_raw = raw.email_body_raw.unwrap_or_default();
    let content_text =
        non_empty(raw.email_body_transformed_text).unwrap_or_else(|| content_raw.clone());
    let content_markdown =
        non_empty(raw.email_body_transformed_markdown).unwrap_or_else(|| content_text.clone());

    let timestamp_iso = raw.received_timestamp_iso.unwrap_or_default();
    let timestamp = non_empty(raw.received_timestamp_display)
        .or_else(|| display_timestamp(&timestamp_iso))
        .unwrap_or_default();

    let preview = make_preview(&content_text);

    Message {
        context_id: non_empty(raw.context_id).unwrap_or_else(|| raw.id.clone()),
        id: raw.id,
        from,
        from_email,
        to,
        to_email,
        subject: non_empty(raw.subject).unwrap_or_else(|| "(no subject)".to_string()),
        content_raw,
        content_text,
        content_markdown,
        content_html: non_empty(raw.email_body_html),
        timestamp,
        timestamp_iso,
        labels: normalize_labels(raw.labels.unwrap_or_default()),
        starred: raw.starred.unwrap_or_default(),
        read: raw.read.unwrap_or_default(),
        preview,
        context_for_ai: raw.context_for_ai,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_item_is_normalized() {
        let item: MessageItem = serde_json::from_value(json!({
            "id": "m1",
            "senderName": "Ada",
            "senderEmail": "ada@example.com",
            "subject": "Hello",
            "emailBodyRaw": "raw body",
            "emailBodyTransformedText": "Hello   there\n\nfriend",
            "labels": ["Inbox", " Work ", ""],
            "starred": true
        }))
        .unwrap();
        assert!(matches!(item, MessageItem::Raw(_)));

        let m = item.into_message();
        assert_eq!(m.id, "m1");
        assert_eq!(m.context_id, "m1");
        assert_eq!(m.from, "Ada");
        assert_eq!(m.content_text, "Hello   there\n\nfriend");
        assert_eq!(m.content_markdown, m.content_text);
        assert_eq!(m.preview, "Hello there friend");
        assert_eq!(m.labels, normalize_labels(["inbox", "work"]));
        assert!(m.starred);
        assert!(!m.read);
    }

    #[test]
    fn test_sparse_raw_item_gets_defaults() {
        let item: MessageItem = serde_json::from_value(json!({"id": "m1", "labels": ["inbox"]})).unwrap();
        let m = item.into_message();
        assert_eq!(m.from, "Unknown sender");
        assert_eq!(m.subject, "(no subject)");
        assert_eq!(m.content_text, "");
        assert!(m.content_html.is_none());
    }

    #[test]
    fn test_null_flags_read_as_false() {
        let items: Vec<MessageItem> = serde_json::from_value(json!([
            {"id": "m1", "subject": "Hi", "starred": null, "read": null},
            {"id": "m2", "starred": true}
        ]))
        .unwrap();
        let messages = normalize_messages(items);
        assert!(!messages[0].starred);
        assert!(!messages[0].read);
        assert_eq!(messages[0].subject, "Hi");
        assert!(messages[1].starred);
    }

    #[test]
    fn test_sender_falls_back_to_email() {
        let m = normalize_message(RawMessage {
            id: "m1".to_string(),
            sender_email: Some("bob@example.com".to_string()),
            email_body_raw: Some("only raw".to_string()),
            ..RawMessage::default()
        });
        assert_eq!(m.from, "bob@example.com");
        assert_eq!(m.content_text, "only raw");
    }

    #[test]
    fn test_canonical_item_passes_through() {
        let draft = Message {
            id: "d1".to_string(),
            from: "You".to_string(),
            subject: "Hi".to_string(),
            content_text: "hello".to_string(),
            labels: normalize_labels(["drafts", "Custom"]),
            ..Message::default()
        };
        let value = serde_json::to_value(&draft).unwrap();
        let item: MessageItem = serde_json::from_value(value).unwrap();
        assert!(matches!(item, MessageItem::Canonical(_)));
        assert_eq!(item.into_message(), draft);
    }

    #[test]
    fn test_display_timestamp_from_iso() {
        let m = normalize_message(RawMessage {
            id: "m1".to_string(),
            received_timestamp_iso: Some("2024-03-05T10:15:00Z".to_string()),
            ..RawMessage::default()
        });
        assert!(m.timestamp.contains("2024"));
        assert_eq!(display_timestamp("not a date"), None);
    }

    #[test]
    fn test_preview_is_truncated() {
        let long = "word ".repeat(100);
        assert_eq!(make_preview(&long).chars().count(), 140);
    }
}
