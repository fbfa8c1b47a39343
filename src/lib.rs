pub mod api;
pub mod config;
pub mod drafts;
pub mod engine;
pub mod error;
pub mod filter;
pub mod folder;
pub mod models;
pub mod moves;
pub mod store;
pub mod sync;
pub mod undo;
pub mod wire;

pub use api::{LocalMailbox, MailboxApi};
pub use config::Config;
pub use engine::MailEngine;
pub use error::{MailError, Result};
pub use folder::FolderId;
pub use models::{DraftSession, MailboxSnapshot, Message, MovePayload, MoveRequest};
pub use moves::MoveState;
pub use store::MailboxCounters;
