use crate::api::MailboxApi;
use crate::config::Config;
use crate::drafts;
use crate::error::{MailError, Result};
use crate::filter::filter_messages;
use crate::folder::{FolderId, normalize_folder_id};
use crate::models::{DraftSession, MailboxSnapshot, Message, MovePayload, MoveRequest};
use crate::moves::{CANCELLED_ERROR, MoveCoordinator, MoveState, MoveTicket};
use crate::store::{MailboxCounters, MessageStore};
use crate::sync::{ReconcileOutcome, ReconcilePayload, SyncState, reconcile};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct EngineState {
    store: MessageStore,
    moves: MoveCoordinator,
    sync: SyncState,
    active_folder: String,
    search: String,
    selected_id: Option<String>,
}

/// A move waiting on the server. Dropped unsettled, it rolls the move back.
struct InFlightMove<'a> {
    engine: &'a MailEngine,
    ticket: Option<MoveTicket>,
}

impl InFlightMove<'_> {
    fn settle(mut self, result: anyhow::Result<MovePayload>) -> Result<Option<MovePayload>> {
        let Some(ticket) = self.ticket.take() else {
            return Ok(None);
        };
        let settled = {
            let mut state = self.engine.lock();
            let EngineState {
                store, moves, sync, ..
            } = &mut *state;
            match result {
                Ok(payload) => {
                    let outcome = moves.on_remote_success(store, ticket, &payload);
                    sync.record(payload.folder_counts.as_ref(), &outcome);
                    Ok(Some(payload))
                }
                Err(error) => {
                    moves.on_remote_failure(store, ticket, &error.to_string());
                    Err(MailError::Remote(error))
                }
            }
        };
        self.engine.notify();
        settled
    }
}

impl Drop for InFlightMove<'_> {
    fn drop(&mut self) {
        let Some(ticket) = self.ticket.take() else {
            return;
        };
        warn!("Move of {} dropped before the server answered", ticket.message_id());
        {
            let mut state = self.engine.lock();
            let EngineState { store, moves, .. } = &mut *state;
            moves.on_remote_failure(store, ticket, CANCELLED_ERROR);
        }
        self.engine.notify();
    }
}

/// Owns the message list and everything derived from it.
///
/// Cloning is cheap and every clone sees the same state. The lock is only
/// held for synchronous steps, never across a remote call, so readers observe
/// optimistic state while a move is in flight.
#[derive(Clone)]
pub struct MailEngine {
    state: Arc<Mutex<EngineState>>,
    api: Arc<dyn MailboxApi>,
    config: Arc<Config>,
    revision: Arc<watch::Sender<u64>>,
}

impl MailEngine {
    pub fn new(api: Arc<dyn MailboxApi>, config: Config) -> Self {
        let state = EngineState {
            active_folder: config.view.default_folder.clone(),
            ..EngineState::default()
        };
        let (revision, _) = watch::channel(0);
        Self {
            state: Arc::new(Mutex::new(state)),
            api,
            config: Arc::new(config),
            revision: Arc::new(revision),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Yields a new revision number after every state change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notify(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }

    // Views

    pub fn messages(&self) -> Vec<Message> {
        self.lock().store.messages().to_vec()
    }

    pub fn active_folder(&self) -> String {
        self.lock().active_folder.clone()
    }

    pub fn search(&self) -> String {
        self.lock().search.clone()
    }

    pub fn filtered(&self) -> Vec<Message> {
        let state = self.lock();
        filter_messages(
            state.store.messages(),
            &state.active_folder,
            &state.search,
            state.store.folders(),
        )
        .into_iter()
        .cloned()
        .collect()
    }

    pub fn counters(&self) -> MailboxCounters {
        self.lock().store.counters().clone()
    }

    pub fn server_counts(&self) -> Option<HashMap<String, usize>> {
        self.lock().sync.server_counts.clone()
    }

    pub fn placements(&self) -> HashMap<String, FolderId> {
        self.lock().store.placements().clone()
    }

    pub fn pending_moves(&self) -> HashSet<String> {
        self.lock().moves.pending_ids()
    }

    pub fn move_errors(&self) -> HashMap<String, String> {
        self.lock().moves.errors().clone()
    }

    pub fn move_state(&self, message_id: &str) -> MoveState {
        self.lock().moves.state(message_id)
    }

    pub fn selected(&self) -> Option<Message> {
        let state = self.lock();
        state
            .selected_id
            .as_deref()
            .and_then(|id| state.store.get(id))
            .cloned()
    }

    pub fn resolve_folder_for_message(&self, message: &Message) -> FolderId {
        self.lock().store.resolve_folder(message)
    }

    // Selection and read state

    pub fn select_mailbox(&self, folder: &str) {
        if folder.trim().is_empty() {
            return;
        }
        self.lock().active_folder = folder.trim().to_string();
        self.notify();
    }

    pub fn set_search(&self, text: &str) {
        self.lock().search = text.to_string();
        self.notify();
    }

    /// Opens a message, marking it read.
    pub fn select_email_by_id(&self, message_id: &str) -> Option<Message> {
        let selected = {
            let mut state = self.lock();
            if !state.store.set_read(message_id, true) {
                debug!("Cannot select {}: not loaded", message_id);
                return None;
            }
            state.selected_id = Some(message_id.to_string());
            state.store.get(message_id).cloned()
        };
        self.notify();
        selected
    }

    pub fn mark_read(&self, message_id: &str, read: bool) -> bool {
        let changed = self.lock().store.set_read(message_id, read);
        if changed {
            self.notify();
        }
        changed
    }

    pub fn toggle_read(&self, message_id: &str) -> bool {
        let changed = {
            let mut state = self.lock();
            match state.store.get(message_id).map(|m| !m.read) {
                Some(read) => state.store.set_read(message_id, read),
                None => false,
            }
        };
        if changed {
            self.notify();
        }
        changed
    }

    // Reconciliation

    pub fn reconcile(&self, payload: ReconcilePayload) -> ReconcileOutcome {
        let outcome = {
            let mut state = self.lock();
            let EngineState { store, sync, .. } = &mut *state;
            let counts = payload.folder_counts.clone();
            let outcome = reconcile(store, payload);
            sync.record(counts.as_ref(), &outcome);
            outcome
        };
        self.notify();
        outcome
    }

    pub fn hydrate(&self, snapshot: MailboxSnapshot) -> ReconcileOutcome {
        if !snapshot.mailbox_id.is_empty() {
            self.lock().sync.mailbox_id = Some(snapshot.mailbox_id.clone());
        }
        self.reconcile(snapshot.into())
    }

    /// Fetches the mailbox state and replaces local state with it.
    /// `Ok(None)` when no mailbox id was given.
    pub async fn load_mailbox(&self, mailbox_id: &str) -> Result<Option<ReconcileOutcome>> {
        if mailbox_id.trim().is_empty() {
            debug!("Load ignored: no mailbox id");
            return Ok(None);
        }
        self.lock().sync.currently_loading = Some(mailbox_id.to_string());

        let result = self.api.load_snapshot(mailbox_id).await;
        self.lock().sync.currently_loading = None;

        match result {
            Ok(mut snapshot) => {
                snapshot.mailbox_id = mailbox_id.to_string();
                let outcome = self.hydrate(snapshot);
                info!("Mailbox {} loaded", mailbox_id);
                Ok(Some(outcome))
            }
            Err(error) => {
                warn!("Loading mailbox {} failed: {}", mailbox_id, error);
                Err(MailError::Remote(error))
            }
        }
    }

    // Moves

    /// Moves a message optimistically and confirms with the server.
    ///
    /// Resolves to `Ok(None)` without doing anything when an argument is
    /// missing or a move for the message is already in flight. On remote
    /// failure the local move is undone before the error is returned; the
    /// same happens if this future is dropped before the server answers.
    pub async fn move_message_remote(&self, request: MoveRequest) -> Result<Option<MovePayload>> {
        let MoveRequest {
            mailbox_id,
            message_id,
            target_folder_id,
        } = request;
        if mailbox_id.trim().is_empty()
            || message_id.trim().is_empty()
            || target_folder_id.trim().is_empty()
        {
            debug!("Move ignored: missing mailbox, message or target");
            return Ok(None);
        }
        let target = normalize_folder_id(&target_folder_id);

        let ticket = {
            let mut state = self.lock();
            let EngineState { store, moves, .. } = &mut *state;
            moves.request_move(store, &message_id, target)
        };
        let Some(ticket) = ticket else {
            return Ok(None);
        };
        self.notify();

        let in_flight = InFlightMove {
            engine: self,
            ticket: Some(ticket),
        };
        let result = self.api.submit_move(&mailbox_id, &message_id, target).await;
        in_flight.settle(result)
    }

    // Drafts

    pub fn save_draft_session(&self, draft: &DraftSession) -> Option<Message> {
        let saved = {
            let mut state = self.lock();
            drafts::save_draft_session(&mut state.store, draft, &self.config.drafts)
        };
        if saved.is_some() {
            self.notify();
        }
        saved
    }

    pub fn mark_draft_as_sent(&self, draft_id: &str) -> bool {
        let changed = drafts::mark_draft_as_sent(&mut self.lock().store, draft_id);
        if changed {
            self.notify();
        }
        changed
    }

    pub fn delete_draft_message(&self, draft_id: &str) -> bool {
        let changed = {
            let mut state = self.lock();
            let removed = drafts::delete_draft_message(&mut state.store, draft_id);
            if removed && state.selected_id.as_deref() == Some(draft_id) {
                state.selected_id = None;
            }
            removed
        };
        if changed {
            self.notify();
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::LocalMailbox;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::Notify;

    fn snapshot(value: serde_json::Value) -> MailboxSnapshot {
        serde_json::from_value(value).unwrap()
    }

    fn local(value: serde_json::Value) -> Arc<LocalMailbox> {
        Arc::new(LocalMailbox::new("primary", snapshot(value)))
    }

    /// Holds every move until the test opens the gate.
    struct GatedMailbox {
        inner: LocalMailbox,
        gate: Notify,
    }

    #[async_trait]
    impl MailboxApi for GatedMailbox {
        async fn load_snapshot(&self, mailbox_id: &str) -> anyhow::Result<MailboxSnapshot> {
            self.inner.load_snapshot(mailbox_id).await
        }

        async fn submit_move(
            &self,
            mailbox_id: &str,
            message_id: &str,
            target: FolderId,
        ) -> anyhow::Result<MovePayload> {
            self.gate.notified().await;
            self.inner.submit_move(mailbox_id, message_id, target).await
        }
    }

    /// Serves a snapshot but rejects every move.
    struct FailingMailbox {
        inner: LocalMailbox,
        reason: &'static str,
    }

    #[async_trait]
    impl MailboxApi for FailingMailbox {
        async fn load_snapshot(&self, mailbox_id: &str) -> anyhow::Result<MailboxSnapshot> {
            self.inner.load_snapshot(mailbox_id).await
        }

        async fn submit_move(
            &self,
            _mailbox_id: &str,
            _message_id: &str,
            _target: FolderId,
        ) -> anyhow::Result<MovePayload> {
            Err(anyhow!(self.reason))
        }
    }

    fn ids(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_load_then_filter_by_folder() {
        let engine = MailEngine::new(
            local(json!({"messages": [{"id": "m1", "labels": ["inbox"]}], "folderCounts": {"inbox": 1}})),
            Config::default(),
        );
        engine.load_mailbox("primary").await.unwrap();

        assert_eq!(ids(&engine.filtered()), vec!["m1"]);
        engine.select_mailbox("archive");
        assert!(engine.filtered().is_empty());
        assert_eq!(engine.counters().get(FolderId::Inbox), 1);
    }

    #[tokio::test]
    async fn test_hydrate_filters_directly() {
        let engine = MailEngine::new(local(json!({})), Config::default());
        engine.hydrate(snapshot(json!({
            "messages": [{"id": "m1", "labels": ["inbox"]}],
            "folderCounts": {"inbox": 1}
        })));
        assert_eq!(ids(&engine.filtered()), vec!["m1"]);
        assert_eq!(engine.server_counts().unwrap()["inbox"], 1);
    }

    #[tokio::test]
    async fn test_label_only_snapshot_resolves_archive() {
        let engine = MailEngine::new(local(json!({})), Config::default());
        engine.hydrate(snapshot(json!({
            "messages": [
                {"id": "a1", "labels": ["archive"]},
                {"id": "a2", "labels": ["archive", "work"]}
            ]
        })));
        for message in engine.messages() {
            assert_eq!(engine.resolve_folder_for_message(&message), FolderId::Archive);
        }
    }

    #[tokio::test]
    async fn test_missing_arguments_are_noops() {
        let engine = MailEngine::new(local(json!({"messages": [{"id": "m1"}]})), Config::default());
        engine.load_mailbox("primary").await.unwrap();

        for request in [
            MoveRequest::new("", "m1", "archive"),
            MoveRequest::new("primary", "", "archive"),
            MoveRequest::new("primary", "m1", " "),
        ] {
            assert!(engine.move_message_remote(request).await.unwrap().is_none());
        }
        assert!(engine.load_mailbox("").await.unwrap().is_none());
        assert!(engine.pending_moves().is_empty());
        assert_eq!(engine.counters().get(FolderId::Inbox), 1);
    }

    #[tokio::test]
    async fn test_move_overrides_counts_with_server_state() {
        let engine = MailEngine::new(
            local(json!({"messages": [{"id": "m1", "labels": ["inbox"]}]})),
            Config::default(),
        );
        engine.load_mailbox("primary").await.unwrap();

        let payload = engine
            .move_message_remote(MoveRequest::new("primary", "m1", "archive"))
            .await
            .unwrap()
            .unwrap();

        let server = payload.folder_counts.unwrap();
        assert_eq!(server["archive"], 1);
        assert_eq!(server["inbox"], 0);
        let counters = engine.counters();
        for (folder, count) in &server {
            assert_eq!(counters.get(normalize_folder_id(folder)), *count);
        }
        assert_eq!(engine.server_counts(), Some(server));
        assert_eq!(engine.move_state("m1"), MoveState::Committed);
        assert!(engine.pending_moves().is_empty());
        assert!(engine.move_errors().is_empty());
    }

    #[tokio::test]
    async fn test_second_move_while_pending_is_rejected() {
        let api = Arc::new(GatedMailbox {
            inner: LocalMailbox::new("primary", snapshot(json!({"messages": [{"id": "m1"}]}))),
            gate: Notify::new(),
        });
        let engine = MailEngine::new(api.clone(), Config::default());
        engine.load_mailbox("primary").await.unwrap();

        let first = engine.move_message_remote(MoveRequest::new("primary", "m1", "archive"));
        futures::pin_mut!(first);
        assert!(futures::poll!(first.as_mut()).is_pending());

        assert_eq!(engine.pending_moves(), HashSet::from(["m1".to_string()]));
        assert_eq!(engine.move_state("m1"), MoveState::Pending);
        engine.select_mailbox("archive");
        assert_eq!(ids(&engine.filtered()), vec!["m1"]);

        let second = engine
            .move_message_remote(MoveRequest::new("primary", "m1", "archive"))
            .await
            .unwrap();
        assert!(second.is_none());
        assert_eq!(engine.pending_moves().len(), 1);

        api.gate.notify_one();
        assert!(first.await.unwrap().is_some());
        assert!(engine.pending_moves().is_empty());
        assert_eq!(engine.counters().get(FolderId::Archive), 1);
    }

    #[tokio::test]
    async fn test_failed_move_rolls_back() {
        let api = Arc::new(FailingMailbox {
            inner: LocalMailbox::new(
                "primary",
                snapshot(json!({"messages": [{"id": "m1", "labels": []}]})),
            ),
            reason: "timeout",
        });
        let engine = MailEngine::new(api, Config::default());
        engine.load_mailbox("primary").await.unwrap();
        let mut revisions = engine.subscribe();

        let err = engine
            .move_message_remote(MoveRequest::new("primary", "m1", "trash"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "timeout");

        let messages = engine.messages();
        let m1 = &messages[0];
        assert_eq!(engine.resolve_folder_for_message(m1), FolderId::Inbox);
        assert!(m1.labels.is_empty());
        assert_eq!(engine.move_errors()["m1"], "timeout");
        assert!(!engine.pending_moves().contains("m1"));
        assert_eq!(engine.move_state("m1"), MoveState::RolledBack);
        assert_eq!(engine.counters().get(FolderId::Trash), 0);
        assert!(engine.placements().is_empty());
        assert!(revisions.has_changed().unwrap());
        assert!(*revisions.borrow_and_update() > 0);
    }

    #[tokio::test]
    async fn test_abandoned_move_rolls_back() {
        let api = Arc::new(GatedMailbox {
            inner: LocalMailbox::new("primary", snapshot(json!({"messages": [{"id": "m1"}]}))),
            gate: Notify::new(),
        });
        let engine = MailEngine::new(api.clone(), Config::default());
        engine.load_mailbox("primary").await.unwrap();

        let attempt = tokio::time::timeout(
            Duration::from_millis(20),
            engine.move_message_remote(MoveRequest::new("primary", "m1", "trash")),
        )
        .await;
        assert!(attempt.is_err());

        assert!(engine.pending_moves().is_empty());
        assert_eq!(engine.move_state("m1"), MoveState::RolledBack);
        assert_eq!(engine.move_errors()["m1"], CANCELLED_ERROR);
        let messages = engine.messages();
        assert_eq!(engine.resolve_folder_for_message(&messages[0]), FolderId::Inbox);
        assert!(!messages[0].has_label("trash"));
        assert_eq!(engine.counters().get(FolderId::Trash), 0);

        api.gate.notify_one();
        let retried = engine
            .move_message_remote(MoveRequest::new("primary", "m1", "trash"))
            .await
            .unwrap();
        assert!(retried.is_some());
        assert_eq!(engine.move_state("m1"), MoveState::Committed);
        assert_eq!(engine.counters().get(FolderId::Trash), 1);
    }

    #[tokio::test]
    async fn test_draft_deleted_while_move_pending_leaves_no_trace() {
        let api = Arc::new(GatedMailbox {
            inner: LocalMailbox::new("primary", snapshot(json!({"messages": [{"id": "m1"}]}))),
            gate: Notify::new(),
        });
        let engine = MailEngine::new(api.clone(), Config::default());
        engine.load_mailbox("primary").await.unwrap();
        engine.save_draft_session(&DraftSession {
            id: "d1".to_string(),
            subject: "Hi".to_string(),
            ..DraftSession::default()
        });

        let moving = engine.move_message_remote(MoveRequest::new("primary", "d1", "trash"));
        futures::pin_mut!(moving);
        assert!(futures::poll!(moving.as_mut()).is_pending());
        assert!(engine.delete_draft_message("d1"));

        api.gate.notify_one();
        assert!(moving.await.is_err());

        assert_eq!(ids(&engine.messages()), vec!["m1"]);
        assert!(engine.placements().get("d1").is_none());
        assert!(engine.pending_moves().is_empty());
        assert_eq!(engine.counters().get(FolderId::Drafts), 0);
        assert_eq!(engine.counters().get(FolderId::Trash), 0);
    }

    #[tokio::test]
    async fn test_failed_load_keeps_state() {
        let engine = MailEngine::new(local(json!({"messages": [{"id": "m1"}]})), Config::default());
        engine.load_mailbox("primary").await.unwrap();
        assert!(engine.load_mailbox("elsewhere").await.is_err());
        assert_eq!(ids(&engine.messages()), vec!["m1"]);
    }

    #[tokio::test]
    async fn test_draft_lifecycle() {
        let engine = MailEngine::new(local(json!({})), Config::default());
        let draft = DraftSession {
            id: "d1".to_string(),
            to: "a@b.com".to_string(),
            subject: "Hi".to_string(),
            body: "hello".to_string(),
        };

        let saved = engine.save_draft_session(&draft).unwrap();
        assert_eq!(saved.labels.iter().collect::<Vec<_>>(), vec!["drafts"]);
        assert_eq!(engine.resolve_folder_for_message(&saved), FolderId::Drafts);
        assert_eq!(engine.counters().get(FolderId::Drafts), 1);
        assert_eq!(engine.placements().get("d1"), Some(&FolderId::Drafts));

        engine.select_mailbox("drafts");
        assert_eq!(ids(&engine.filtered()), vec!["d1"]);

        assert!(engine.mark_draft_as_sent("d1"));
        assert!(engine.filtered().is_empty());
        engine.select_mailbox("sent");
        assert_eq!(ids(&engine.filtered()), vec!["d1"]);

        assert!(engine.delete_draft_message("d1"));
        assert!(engine.messages().is_empty());
        assert_eq!(engine.counters().get(FolderId::Sent), 0);
    }

    #[tokio::test]
    async fn test_full_reload_discards_local_drafts() {
        let engine = MailEngine::new(local(json!({"messages": [{"id": "m1"}]})), Config::default());
        engine.save_draft_session(&DraftSession {
            id: "d1".to_string(),
            ..DraftSession::default()
        });
        assert_eq!(engine.messages().len(), 1);

        engine.load_mailbox("primary").await.unwrap();
        assert_eq!(ids(&engine.messages()), vec!["m1"]);
        assert!(engine.placements().get("d1").is_none());
    }

    #[tokio::test]
    async fn test_selection_marks_read_and_search_filters() {
        let engine = MailEngine::new(
            local(json!({"messages": [
                {"id": "m1", "subject": "Invoice due", "read": false},
                {"id": "m2", "subject": "Team lunch", "senderName": "Kim"}
            ]})),
            Config::default(),
        );
        engine.load_mailbox("primary").await.unwrap();
        assert_eq!(engine.counters().unread(FolderId::Inbox), 2);

        let selected = engine.select_email_by_id("m1").unwrap();
        assert!(selected.read);
        assert_eq!(engine.selected().map(|m| m.id), Some("m1".to_string()));
        assert_eq!(engine.counters().unread(FolderId::Inbox), 1);
        assert!(engine.select_email_by_id("missing").is_none());

        assert!(engine.toggle_read("m1"));
        assert!(!engine.messages()[0].read);
        assert!(engine.mark_read("m1", true));
        assert!(!engine.mark_read("missing", true));

        engine.set_search("kim");
        assert_eq!(ids(&engine.filtered()), vec!["m2"]);
        engine.set_search("  ");
        assert_eq!(engine.filtered().len(), 2);
        assert_eq!(engine.search(), "  ");
    }

    #[tokio::test]
    async fn test_blank_mailbox_selection_is_ignored() {
        let engine = MailEngine::new(local(json!({})), Config::default());
        engine.select_mailbox("starred");
        engine.select_mailbox("   ");
        assert_eq!(engine.active_folder(), "starred");
    }
}
