//! Request and response shapes for the chat operations.

use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_document_type() -> String {
    "sop".to_string()
}

fn default_format() -> String {
    "html".to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatStartRequest {
    pub thread_id: String,
    #[serde(default)]
    pub document_key: Option<String>,
    #[serde(default = "default_document_type")]
    pub document_type: String,
    #[serde(default)]
    pub document_name: Option<String>,
    pub org_id: String,
    pub user_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatStartResponse {
    pub thread_id: String,
    pub document_id: String,
    pub assistant: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessageRequest {
    pub thread_id: String,
    #[serde(default)]
    pub document_id: Option<String>,
    pub user_id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub audio_b64: Option<String>,
    #[serde(default)]
    pub assemble: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockSnapshot {
    pub id: String,
    #[serde(rename = "type")]
    pub block_type: String,
    pub content: Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessageResponse {
    pub assistant: String,
    pub document_id: Option<String>,
    #[serde(default)]
    pub open_questions: Vec<String>,
    #[serde(default)]
    pub blocks_snapshot: Vec<BlockSnapshot>,
    pub next: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatAssembleRequest {
    pub thread_id: String,
    pub document_id: String,
    #[serde(default = "default_format")]
    pub format: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatAssembleResponse {
    pub preview: String,
    pub rendered_path: String,
    pub topology_mermaid_path: String,
    pub trace_mermaid_path: String,
}
