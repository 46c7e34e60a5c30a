//! Request-facing facade over the orchestration graph, session store, and
//! artifact sinks.

use std::path::PathBuf;
use std::sync::Arc;

use sopforge_core::assembly::AssemblyFormat;
use sopforge_core::domain::document::{DocumentId, DocumentKey, DocumentType, OrgId, UserId};

use sopforge_db::DbPool;

use crate::artifacts;
use crate::graph::{topology_mermaid, ConversationGraph};
use crate::schemas::{
    BlockSnapshot, ChatAssembleRequest, ChatAssembleResponse, ChatMessageRequest,
    ChatMessageResponse, ChatStartRequest, ChatStartResponse,
};
use crate::session::{ChatMessage, ConversationState, InMemorySessionStore, SessionStore};
use crate::tools::{CreateOrGetDocumentInput, SopTools, ToolError};

pub struct AgentRuntime {
    graph: ConversationGraph,
    tools: SopTools,
    sessions: Arc<dyn SessionStore>,
    artifacts_dir: PathBuf,
}

impl AgentRuntime {
    pub fn new(pool: &DbPool, artifacts_dir: impl Into<PathBuf>) -> Self {
        Self::with_session_store(pool, artifacts_dir, Arc::new(InMemorySessionStore::new()))
    }

    pub fn with_session_store(
        pool: &DbPool,
        artifacts_dir: impl Into<PathBuf>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let tools = SopTools::from_pool(pool);
        Self {
            graph: ConversationGraph::new(tools.clone()),
            tools,
            sessions,
            artifacts_dir: artifacts_dir.into(),
        }
    }

    /// Initializes session state and runs the first turn. A plain start gets
    /// the interviewer greeting; a start that names an existing document key
    /// binds that document and the supervisor quality-checks it instead.
    pub async fn start(&self, req: ChatStartRequest) -> Result<ChatStartResponse, ToolError> {
        let document_type = DocumentType::parse(&req.document_type)?;
        let mut state = ConversationState::new(
            req.thread_id.clone(),
            document_type,
            OrgId(req.org_id),
            UserId(req.user_id),
        );

        if req.document_key.is_some() || req.document_name.is_some() {
            let created = self
                .tools
                .create_or_get_document(CreateOrGetDocumentInput {
                    document_key: req.document_key.map(DocumentKey),
                    document_type,
                    org_id: state.org_id.clone(),
                    user_id: state.user_id.clone(),
                    document_name: req.document_name,
                })
                .await?;
            state.document_id = Some(created.document_id);
        }

        self.graph.run_turn(&mut state).await?;

        let document_id = state
            .document_id
            .clone()
            .ok_or_else(|| ToolError::Internal("no document bound after start".to_string()))?;
        let assistant = state.last_assistant_text().unwrap_or_default().to_string();
        tracing::info!(
            event_name = "chat_started",
            thread_id = %state.thread_id,
            document_id = %document_id.0,
            "started drafting session"
        );
        self.sessions.set(state).await;

        Ok(ChatStartResponse { thread_id: req.thread_id, document_id: document_id.0, assistant })
    }

    /// Drives one state-machine turn. A turn without user text (no message,
    /// or audio the stub cannot transcribe) hands control to quality-check.
    pub async fn message(&self, req: ChatMessageRequest) -> Result<ChatMessageResponse, ToolError> {
        let mut state = self
            .sessions
            .get(&req.thread_id)
            .await
            .ok_or_else(|| ToolError::NotFound(format!("thread {}", req.thread_id)))?;

        if state.document_id.is_none() {
            state.document_id = req.document_id.clone().map(DocumentId);
        }

        let text = match req.text {
            Some(text) => text,
            None => artifacts::transcribe_audio_stub(req.audio_b64.as_deref()),
        };
        if !text.trim().is_empty() {
            state.messages.push(ChatMessage::user(text));
        }

        self.graph.run_turn(&mut state).await?;

        let blocks_snapshot = match &state.document_id {
            Some(document_id) => self.snapshot_blocks(document_id).await?,
            None => Vec::new(),
        };
        let response = ChatMessageResponse {
            assistant: state.last_assistant_text().unwrap_or_default().to_string(),
            document_id: state.document_id.as_ref().map(|id| id.0.clone()),
            open_questions: state.open_questions.iter().map(|id| id.0.clone()).collect(),
            blocks_snapshot,
            next: if req.assemble { "assemble" } else { "ask_clarification" }.to_string(),
        };
        self.sessions.set(state).await;
        Ok(response)
    }

    /// Renders the document in the requested format and writes it alongside
    /// the topology and per-thread trace diagrams.
    pub async fn assemble(
        &self,
        req: ChatAssembleRequest,
    ) -> Result<ChatAssembleResponse, ToolError> {
        let state = self
            .sessions
            .get(&req.thread_id)
            .await
            .ok_or_else(|| ToolError::NotFound(format!("thread {}", req.thread_id)))?;

        let format: AssemblyFormat = req.format.parse()?;
        let document_id = DocumentId(req.document_id);
        let document = self.tools.load_document(&document_id).await?;
        let assembled = self.tools.assemble_document(&document_id, format, true, true).await?;

        let internal = |e: std::io::Error| ToolError::Internal(e.to_string());
        let rendered_path = artifacts::write_rendered_document(
            &self.artifacts_dir,
            &document.id.0,
            document.version,
            extension_for(format),
            &assembled.content,
        )
        .map_err(internal)?;
        let topology_path =
            artifacts::write_mermaid_topology(&self.artifacts_dir, &topology_mermaid())
                .map_err(internal)?;
        let trace_path = artifacts::write_mermaid_trace(
            &self.artifacts_dir,
            &state.thread_id,
            &state.visited_nodes,
        )
        .map_err(internal)?;

        tracing::info!(
            event_name = "document_assembled",
            thread_id = %state.thread_id,
            document_id = %document.id.0,
            format = %format,
            "assembled document preview"
        );
        Ok(ChatAssembleResponse {
            preview: assembled.content,
            rendered_path: rendered_path.to_string_lossy().into_owned(),
            topology_mermaid_path: topology_path.to_string_lossy().into_owned(),
            trace_mermaid_path: trace_path.to_string_lossy().into_owned(),
        })
    }

    async fn snapshot_blocks(
        &self,
        document_id: &DocumentId,
    ) -> Result<Vec<BlockSnapshot>, ToolError> {
        let blocks = self.tools.get_document_blocks(document_id).await?;
        blocks
            .into_iter()
            .map(|block| {
                let content = serde_json::to_value(&block.content)
                    .map_err(|e| ToolError::Internal(e.to_string()))?;
                Ok(BlockSnapshot {
                    id: block.id.0,
                    block_type: block.block_type.as_str().to_string(),
                    content,
                })
            })
            .collect()
    }
}

fn extension_for(format: AssemblyFormat) -> &'static str {
    match format {
        AssemblyFormat::Html => "html",
        AssemblyFormat::Markdown => "md",
        AssemblyFormat::PlainText => "txt",
        AssemblyFormat::Json => "json",
        AssemblyFormat::Pdf => "pdf",
    }
}
