use crate::folder::{FolderId, merge_labels_with_folder};
use crate::models::MovePayload;
use crate::store::MessageStore;
use crate::sync::{ReconcileOutcome, reconcile};
use crate::undo::MoveSnapshot;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

const FALLBACK_ERROR: &str = "Unable to move message";
pub const CANCELLED_ERROR: &str = "Move cancelled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MoveState {
    #[default]
    Idle,
    Pending,
    Committed,
    RolledBack,
}

/// Handed out by `request_move`; settles the move it was issued for.
#[derive(Debug)]
pub struct MoveTicket {
    pub target: FolderId,
    snapshot: MoveSnapshot,
}

impl MoveTicket {
    pub fn message_id(&self) -> &str {
        &self.snapshot.message_id
    }

    pub fn previous_folder(&self) -> FolderId {
        self.snapshot.previous_folder()
    }
}

/// Tracks in-flight moves and their last failure per message.
#[derive(Debug, Default)]
pub struct MoveCoordinator {
    pending: HashMap<String, FolderId>,
    errors: HashMap<String, String>,
    settled: HashMap<String, MoveState>,
}

impl MoveCoordinator {
    pub fn is_pending(&self, message_id: &str) -> bool {
        self.pending.contains_key(message_id)
    }

    pub fn pending_ids(&self) -> HashSet<String> {
        self.pending.keys().cloned().collect()
    }

    pub fn pending(&self) -> &HashMap<String, FolderId> {
        &self.pending
    }

    pub fn errors(&self) -> &HashMap<String, String> {
        &self.errors
    }

    pub fn state(&self, message_id: &str) -> MoveState {
        if self.is_pending(message_id) {
            return MoveState::Pending;
        }
        self.settled.get(message_id).copied().unwrap_or_default()
    }

    /// Starts a move and applies it locally. `None` if a move for this message
    /// is already in flight or the message is unknown.
    pub fn request_move(
        &mut self,
        store: &mut MessageStore,
        message_id: &str,
        target: FolderId,
    ) -> Option<MoveTicket> {
        if self.is_pending(message_id) {
            debug!("Move of {} rejected: already pending", message_id);
            return None;
        }
        let Some(snapshot) = MoveSnapshot::capture(store, message_id) else {
            debug!("Move of {} ignored: message not loaded", message_id);
            return None;
        };

        self.pending.insert(message_id.to_string(), target);
        self.errors.remove(message_id);

        let labels = merge_labels_with_folder(&snapshot.labels, target);
        store.set_labels(message_id, labels);
        store.assign_folder(message_id, target);

        info!(
            "Move of {} requested: {} -> {}",
            message_id,
            snapshot.previous_folder(),
            target
        );
        Some(MoveTicket { target, snapshot })
    }

    pub fn on_remote_success(
        &mut self,
        store: &mut MessageStore,
        ticket: MoveTicket,
        payload: &MovePayload,
    ) -> ReconcileOutcome {
        let outcome = reconcile(store, payload.clone().into());
        let id = ticket.snapshot.message_id;
        self.pending.remove(&id);
        self.errors.remove(&id);
        info!("Move of {} to {} committed ({:?})", id, ticket.target, outcome);
        self.settled.insert(id, MoveState::Committed);
        outcome
    }

    /// Puts the message back where it was and records why the move failed.
    pub fn on_remote_failure(&mut self, store: &mut MessageStore, ticket: MoveTicket, error: &str) {
        let id = ticket.snapshot.message_id.clone();
        if !ticket.snapshot.restore(store) {
            debug!("Move of {} settled after the message left the list", id);
        }
        self.pending.remove(&id);

        let message = if error.trim().is_empty() {
            FALLBACK_ERROR.to_string()
        } else {
            error.to_string()
        };
        warn!("Move of {} to {} rolled back: {}", id, ticket.target, message);
        self.errors.insert(id.clone(), message);
        self.settled.insert(id, MoveState::RolledBack);
    }
}
