//! Conversational SOP drafting - orchestration, tools, and sessions
//!
//! This crate drives the guided drafting loop that turns a conversation into
//! a block-structured SOP document:
//! - Classifies free text into a coarse drafting intent (`conversation`)
//! - Wraps durable document mutations in a typed tool catalog (`tools`)
//! - Routes each turn through a supervisor/specialist state machine (`graph`)
//! - Tracks per-thread conversation state (`session`)
//! - Writes rendered documents and mermaid diagrams to disk (`artifacts`)
//!
//! # Architecture
//!
//! A turn follows a fixed path:
//! 1. **Session lookup** (`session`) - resolve thread id to conversation state
//! 2. **Supervisor dispatch** (`graph`) - pick exactly one specialist node
//! 3. **Tool execution** (`tools`) - the node mutates blocks through the catalog
//! 4. **State patch** - the node's command is applied back onto the session
//!
//! # Key Types
//!
//! - `AgentRuntime` - request-facing facade (see `runtime` module)
//! - `ConversationGraph` - the supervisor/interviewer/writer/researcher/qc graph
//! - `SopTools` - the validated tool catalog over the block service
//! - `SessionStore` - pluggable thread-id keyed state store
//!
//! # Determinism Principle
//!
//! Routing and document mutation are fully deterministic: the classifier is a
//! keyword matcher and every node's behavior is a pure function of the
//! conversation state plus the store contents. Nothing here calls a language
//! model.

pub mod artifacts;
pub mod conversation;
pub mod graph;
pub mod runtime;
pub mod schemas;
pub mod session;
pub mod tools;

pub use conversation::{Intent, IntentClassifier};
pub use graph::{ConversationGraph, NodeCommand, NodeName, StatePatch};
pub use runtime::AgentRuntime;
pub use session::{ChatMessage, ConversationState, InMemorySessionStore, MessageRole, SessionStore};
pub use tools::{SopTools, ToolError, TOOL_CATALOG};
