//! Per-thread conversation state and the pluggable session store.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use sopforge_core::domain::block::BlockId;
use sopforge_core::domain::document::{DocumentId, DocumentType, OrgId, UserId};

use crate::graph::NodeName;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    pub ts: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: MessageRole::User, content: content.into(), ts: Utc::now() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: MessageRole::Assistant, content: content.into(), ts: Utc::now() }
    }
}

/// Message log, open questions, and the visited-node trace are append-only;
/// no turn rewrites history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationState {
    pub thread_id: String,
    pub document_id: Option<DocumentId>,
    pub document_type: DocumentType,
    pub org_id: OrgId,
    pub user_id: UserId,
    pub messages: Vec<ChatMessage>,
    pub open_questions: Vec<BlockId>,
    /// Logical step number to block id, for quick step lookups.
    pub step_index: BTreeMap<u32, BlockId>,
    pub visited_nodes: Vec<NodeName>,
}

impl ConversationState {
    pub fn new(
        thread_id: impl Into<String>,
        document_type: DocumentType,
        org_id: OrgId,
        user_id: UserId,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            document_id: None,
            document_type,
            org_id,
            user_id,
            messages: Vec::new(),
            open_questions: Vec::new(),
            step_index: BTreeMap::new(),
            visited_nodes: Vec::new(),
        }
    }

    pub fn last_message(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn last_user_message(&self) -> Option<&ChatMessage> {
        self.messages.iter().rev().find(|m| m.role == MessageRole::User)
    }

    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant)
            .map(|m| m.content.as_str())
    }
}

/// Thread-id keyed state store. The in-memory implementation is the default;
/// a durable one can be substituted without touching orchestration logic.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, thread_id: &str) -> Option<ConversationState>;
    async fn set(&self, state: ConversationState);
}

#[derive(Default)]
pub struct InMemorySessionStore {
    inner: RwLock<HashMap<String, ConversationState>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, thread_id: &str) -> Option<ConversationState> {
        self.inner.read().await.get(thread_id).cloned()
    }

    async fn set(&self, state: ConversationState) {
        self.inner.write().await.insert(state.thread_id.clone(), state);
    }
}
