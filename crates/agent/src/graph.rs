//! The supervisor/specialist orchestration state machine.
//!
//! A turn begins at the supervisor, dispatches to exactly one specialist
//! node, and yields back to the caller once that node returns control. Nodes
//! report their outcome as a `NodeCommand` carrying the next node and a
//! state patch; the driver applies the patch before dispatching further.

use std::fmt;

use serde::{Deserialize, Serialize};

use sopforge_core::domain::block::BlockId;
use sopforge_core::domain::document::DocumentId;

use crate::conversation::{Intent, IntentClassifier};
use crate::session::{ChatMessage, ConversationState, MessageRole};
use crate::tools::{CreateOrGetDocumentInput, SopTools, StepInput, ToolError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeName {
    Supervisor,
    Interviewer,
    Writer,
    Researcher,
    Qc,
    End,
}

impl NodeName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Supervisor => "supervisor",
            Self::Interviewer => "interviewer",
            Self::Writer => "writer",
            Self::Researcher => "researcher",
            Self::Qc => "qc",
            Self::End => "end",
        }
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Monotonic additions to the conversation state; nothing here removes or
/// edits prior entries.
#[derive(Clone, Debug, Default)]
pub struct StatePatch {
    pub bind_document: Option<DocumentId>,
    pub assistant: Option<String>,
    pub new_open_questions: Vec<BlockId>,
    pub step_bindings: Vec<(u32, BlockId)>,
}

#[derive(Clone, Debug)]
pub struct NodeCommand {
    pub next: NodeName,
    pub patch: StatePatch,
}

impl NodeCommand {
    fn back_to_supervisor(patch: StatePatch) -> Self {
        Self { next: NodeName::Supervisor, patch }
    }
}

const EDGES: &[(NodeName, NodeName)] = &[
    (NodeName::Supervisor, NodeName::Interviewer),
    (NodeName::Supervisor, NodeName::Writer),
    (NodeName::Supervisor, NodeName::Researcher),
    (NodeName::Supervisor, NodeName::Qc),
    (NodeName::Interviewer, NodeName::Supervisor),
    (NodeName::Writer, NodeName::Supervisor),
    (NodeName::Researcher, NodeName::Supervisor),
    (NodeName::Qc, NodeName::Supervisor),
    (NodeName::Qc, NodeName::End),
];

/// Mermaid rendering of the static node/edge structure.
pub fn topology_mermaid() -> String {
    let mut lines = vec!["graph TD".to_string()];
    for (from, to) in EDGES {
        lines.push(format!("    {from} --> {to}"));
    }
    lines.join("\n")
}

pub struct ConversationGraph {
    tools: SopTools,
    classifier: IntentClassifier,
}

impl ConversationGraph {
    pub fn new(tools: SopTools) -> Self {
        Self { tools, classifier: IntentClassifier::new() }
    }

    /// Deterministic supervisor routing:
    /// 1. No bound document: interview.
    /// 2. Latest message from the user: write if the intent is concrete,
    ///    otherwise interview.
    /// 3. Latest message from a role: quality-check.
    pub fn route(&self, state: &ConversationState) -> NodeName {
        if state.document_id.is_none() {
            return NodeName::Interviewer;
        }
        match state.last_message() {
            Some(message) if message.role == MessageRole::User => {
                match self.classifier.classify(&message.content) {
                    Intent::Title | Intent::Description | Intent::Steps => NodeName::Writer,
                    Intent::Ambiguous => NodeName::Interviewer,
                }
            }
            _ => NodeName::Qc,
        }
    }

    /// One supervisor-dispatch-to-leaf-and-back cycle. The loop does not
    /// auto-iterate further role turns within a single external request.
    pub async fn run_turn(&self, state: &mut ConversationState) -> Result<(), ToolError> {
        state.visited_nodes.push(NodeName::Supervisor);
        let target = self.route(state);
        state.visited_nodes.push(target);
        tracing::debug!(
            event_name = "turn_dispatched",
            thread_id = %state.thread_id,
            node = %target,
            "supervisor dispatched turn"
        );

        let command = match target {
            NodeName::Interviewer => self.interviewer(state).await?,
            NodeName::Writer => self.writer(state).await?,
            NodeName::Researcher => self.researcher(state).await?,
            NodeName::Qc => self.qc(state).await?,
            // Routing never selects these; yield the turn unchanged.
            NodeName::Supervisor | NodeName::End => {
                NodeCommand::back_to_supervisor(StatePatch::default())
            }
        };

        let next = command.next;
        apply_patch(state, command.patch);
        if next == NodeName::End {
            state.visited_nodes.push(NodeName::End);
        }
        Ok(())
    }

    /// Binds a document (creating one with defaults when the session has
    /// none) and asks exactly one clarifying question, persisted as an open
    /// question block.
    async fn interviewer(&self, state: &ConversationState) -> Result<NodeCommand, ToolError> {
        let mut patch = StatePatch::default();
        let (document_id, just_created) = match &state.document_id {
            Some(id) => (id.clone(), false),
            None => {
                let created = self
                    .tools
                    .create_or_get_document(CreateOrGetDocumentInput {
                        document_key: None,
                        document_type: state.document_type,
                        org_id: state.org_id.clone(),
                        user_id: state.user_id.clone(),
                        document_name: None,
                    })
                    .await?;
                patch.bind_document = Some(created.document_id.clone());
                (created.document_id, true)
            }
        };

        let question = if just_created {
            "Hi! Let's draft a new SOP. What is this process called?"
        } else {
            "Could you provide a short description or the next steps?"
        };
        let result = self.tools.add_question(&document_id, question, &state.user_id).await?;
        patch.new_open_questions.push(result.block_id);
        patch.assistant = Some(question.to_string());
        Ok(NodeCommand::back_to_supervisor(patch))
    }

    /// Re-classifies the latest user message and upserts the matching blocks;
    /// an ambiguous message gets a clarification request and no mutation.
    async fn writer(&self, state: &ConversationState) -> Result<NodeCommand, ToolError> {
        let mut patch = StatePatch::default();
        let clarify = "Got it. Could you clarify the process name or provide a description?";

        let (Some(document_id), Some(message)) =
            (state.document_id.clone(), state.last_user_message())
        else {
            patch.assistant = Some(clarify.to_string());
            return Ok(NodeCommand::back_to_supervisor(patch));
        };

        let ack = match self.classifier.classify(&message.content) {
            Intent::Title => {
                let title = self
                    .classifier
                    .extract_title(&message.content)
                    .unwrap_or_else(|| message.content.clone());
                self.tools.add_or_update_title(&document_id, &title, &state.user_id).await?;
                "Title captured. Please share a one-sentence description."
            }
            Intent::Description => {
                self.tools
                    .add_or_update_description(&document_id, &message.content, &state.user_id)
                    .await?;
                "Description saved. List the steps briefly."
            }
            Intent::Steps => {
                let steps = self.classifier.parse_steps(&message.content);
                for (index, description) in steps.iter().enumerate() {
                    let step_number = index as u32 + 1;
                    let result = self
                        .tools
                        .add_or_update_step(
                            &document_id,
                            step_number,
                            StepInput::described(description),
                            &state.user_id,
                        )
                        .await?;
                    patch.step_bindings.push((step_number, result.block_id));
                }
                "Steps added. Any PPE or safety warnings to include?"
            }
            Intent::Ambiguous => clarify,
        };

        patch.assistant = Some(ack.to_string());
        Ok(NodeCommand::back_to_supervisor(patch))
    }

    /// Suggests terminology from other documents in the same organization,
    /// referencing up to five titles, most recently created first.
    async fn researcher(&self, state: &ConversationState) -> Result<NodeCommand, ToolError> {
        let titles = self.tools.get_all_document_titles(&state.org_id).await?;
        let top_titles = if titles.is_empty() {
            "no prior SOPs".to_string()
        } else {
            titles.iter().take(5).cloned().collect::<Vec<_>>().join(", ")
        };
        let suggestion = format!(
            "Related SOPs in org: {top_titles}. Consider aligning terminology and safety sections."
        );
        let mut patch = StatePatch::default();
        patch.assistant = Some(suggestion);
        Ok(NodeCommand::back_to_supervisor(patch))
    }

    /// Validates document structure. Missing required block types each get an
    /// open question; a complete structure ends the drafting loop.
    async fn qc(&self, state: &ConversationState) -> Result<NodeCommand, ToolError> {
        let Some(document_id) = state.document_id.clone() else {
            return Ok(NodeCommand::back_to_supervisor(StatePatch::default()));
        };

        let document = self.tools.load_document(&document_id).await?;
        let validation = self.tools.validate_structure(&document);
        let mut patch = StatePatch::default();

        if validation.is_valid {
            patch.assistant =
                Some("Structure looks complete. Say 'assemble' to generate a preview.".to_string());
            return Ok(NodeCommand { next: NodeName::End, patch });
        }

        for block_type in &validation.missing_required {
            let result = self
                .tools
                .add_question(&document_id, &format!("Please provide {block_type}."), &state.user_id)
                .await?;
            patch.new_open_questions.push(result.block_id);
        }
        let missing = validation
            .missing_required
            .iter()
            .map(|bt| bt.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        patch.assistant = Some(format!("We still need: {missing}. What should we add next?"));
        Ok(NodeCommand::back_to_supervisor(patch))
    }
}

fn apply_patch(state: &mut ConversationState, patch: StatePatch) {
    if let Some(document_id) = patch.bind_document {
        state.document_id = Some(document_id);
    }
    if let Some(assistant) = patch.assistant {
        state.messages.push(ChatMessage::assistant(assistant));
    }
    state.open_questions.extend(patch.new_open_questions);
    for (step_number, block_id) in patch.step_bindings {
        state.step_index.insert(step_number, block_id);
    }
}

#[cfg(test)]
mod tests {
    use sopforge_core::domain::block::{BlockContent, BlockType};
    use sopforge_core::domain::document::{DocumentType, OrgId, UserId};

    use super::{topology_mermaid, ConversationGraph, NodeName};
    use crate::session::{ChatMessage, ConversationState};
    use crate::tools::{CreateOrGetDocumentInput, SopTools};
    use sopforge_db::{connect_with_settings, migrations, DbPool};

    async fn setup() -> (ConversationGraph, SopTools, DbPool) {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let tools = SopTools::from_pool(&pool);
        (ConversationGraph::new(SopTools::from_pool(&pool)), tools, pool)
    }

    fn fresh_state(thread_id: &str) -> ConversationState {
        ConversationState::new(
            thread_id,
            DocumentType::Sop,
            OrgId("org-1".to_string()),
            UserId("user-1".to_string()),
        )
    }

    async fn started_state(graph: &ConversationGraph, thread_id: &str) -> ConversationState {
        let mut state = fresh_state(thread_id);
        graph.run_turn(&mut state).await.expect("start turn");
        state
    }

    #[tokio::test]
    async fn routing_is_deterministic_over_state() {
        let (graph, tools, _pool) = setup().await;

        let unbound = fresh_state("t-route");
        assert_eq!(graph.route(&unbound), NodeName::Interviewer);
        assert_eq!(graph.route(&unbound), NodeName::Interviewer);

        let mut bound = fresh_state("t-route");
        let created = tools
            .create_or_get_document(CreateOrGetDocumentInput {
                document_key: None,
                document_type: DocumentType::Sop,
                org_id: bound.org_id.clone(),
                user_id: bound.user_id.clone(),
                document_name: None,
            })
            .await
            .expect("create");
        bound.document_id = Some(created.document_id);

        bound.messages.push(ChatMessage::user("Call it Spill Cleanup"));
        assert_eq!(graph.route(&bound), NodeName::Writer);

        bound.messages.push(ChatMessage::user("hmm"));
        assert_eq!(graph.route(&bound), NodeName::Interviewer);

        bound.messages.push(ChatMessage::assistant("Title captured."));
        assert_eq!(graph.route(&bound), NodeName::Qc);
    }

    #[tokio::test]
    async fn first_turn_creates_document_and_greets() {
        let (graph, tools, _pool) = setup().await;
        let state = started_state(&graph, "t-start").await;

        let document_id = state.document_id.clone().expect("document bound");
        assert_eq!(
            state.last_assistant_text(),
            Some("Hi! Let's draft a new SOP. What is this process called?")
        );
        assert_eq!(state.open_questions.len(), 1);
        assert_eq!(state.visited_nodes, vec![NodeName::Supervisor, NodeName::Interviewer]);

        let blocks = tools.get_document_blocks(&document_id).await.expect("blocks");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].block_type, BlockType::Question);
    }

    #[tokio::test]
    async fn title_message_upserts_title_block_at_order_one() {
        let (graph, tools, _pool) = setup().await;
        let mut state = started_state(&graph, "t-title").await;

        state.messages.push(ChatMessage::user("Call it Spill Cleanup Procedure."));
        graph.run_turn(&mut state).await.expect("writer turn");

        assert_eq!(
            state.last_assistant_text(),
            Some("Title captured. Please share a one-sentence description.")
        );
        let document_id = state.document_id.clone().expect("bound");
        let blocks = tools.get_document_blocks(&document_id).await.expect("blocks");
        let title = blocks.iter().find(|b| b.block_type == BlockType::Title).expect("title block");
        assert_eq!(title.block_order, 1);
        assert_eq!(title.content.display_text(), "Call it Spill Cleanup Procedure");
    }

    #[tokio::test]
    async fn steps_message_creates_numbered_step_blocks() {
        let (graph, tools, _pool) = setup().await;
        let mut state = started_state(&graph, "t-steps").await;

        state.messages.push(ChatMessage::user(
            "First put on gloves. Then seal the area. Finally notify the supervisor.",
        ));
        graph.run_turn(&mut state).await.expect("writer turn");

        assert_eq!(
            state.last_assistant_text(),
            Some("Steps added. Any PPE or safety warnings to include?")
        );
        let document_id = state.document_id.clone().expect("bound");
        let mut steps: Vec<(u32, String)> = tools
            .get_document_blocks(&document_id)
            .await
            .expect("blocks")
            .into_iter()
            .filter_map(|b| match b.content {
                BlockContent::Step(step) => Some((step.step_number, step.step_description)),
                _ => None,
            })
            .collect();
        steps.sort_by_key(|(n, _)| *n);
        assert_eq!(
            steps,
            vec![
                (1, "First put on gloves".to_string()),
                (2, "Then seal the area".to_string()),
                (3, "Finally notify the supervisor".to_string()),
            ]
        );
        assert_eq!(state.step_index.len(), 3);
    }

    #[tokio::test]
    async fn qc_opens_questions_for_missing_required_types() {
        let (graph, tools, _pool) = setup().await;
        let mut state = started_state(&graph, "t-qc").await;

        state.messages.push(ChatMessage::user("Call it Spill Cleanup Procedure."));
        graph.run_turn(&mut state).await.expect("writer turn");
        let questions_before = state.open_questions.len();

        // No new user input; the supervisor hands the turn to qc.
        graph.run_turn(&mut state).await.expect("qc turn");

        assert_eq!(
            state.last_assistant_text(),
            Some("We still need: description. What should we add next?")
        );
        assert_eq!(state.open_questions.len(), questions_before + 1);
        assert_eq!(state.visited_nodes.last(), Some(&NodeName::Qc));

        let document_id = state.document_id.clone().expect("bound");
        let blocks = tools.get_document_blocks(&document_id).await.expect("blocks");
        let question_texts: Vec<String> = blocks
            .iter()
            .filter(|b| b.block_type == BlockType::Question)
            .map(|b| b.content.display_text())
            .collect();
        assert!(question_texts.contains(&"Please provide description.".to_string()));
    }

    #[tokio::test]
    async fn qc_ends_the_loop_when_structure_is_complete() {
        let (graph, tools, _pool) = setup().await;
        let mut state = started_state(&graph, "t-done").await;

        state.messages.push(ChatMessage::user("Call it Spill Cleanup Procedure."));
        graph.run_turn(&mut state).await.expect("title turn");
        state.messages.push(ChatMessage::user("It is about cleaning chemical spills safely."));
        graph.run_turn(&mut state).await.expect("description turn");

        graph.run_turn(&mut state).await.expect("qc turn");

        assert_eq!(
            state.last_assistant_text(),
            Some("Structure looks complete. Say 'assemble' to generate a preview.")
        );
        assert_eq!(state.visited_nodes.last(), Some(&NodeName::End));

        let document_id = state.document_id.clone().expect("bound");
        let blocks = tools.get_document_blocks(&document_id).await.expect("blocks");
        assert!(blocks.iter().any(|b| b.block_type == BlockType::Title));
        assert!(blocks.iter().any(|b| b.block_type == BlockType::Description));
    }

    #[tokio::test]
    async fn researcher_suggests_recent_org_titles() {
        let (graph, tools, _pool) = setup().await;
        let state = fresh_state("t-research");

        let empty = graph.researcher(&state).await.expect("no documents yet");
        assert_eq!(
            empty.patch.assistant.as_deref(),
            Some(
                "Related SOPs in org: no prior SOPs. Consider aligning terminology and safety \
                 sections."
            )
        );

        for name in ["Forklift Inspection", "Spill Cleanup"] {
            tools
                .create_or_get_document(CreateOrGetDocumentInput {
                    document_key: None,
                    document_type: DocumentType::Sop,
                    org_id: state.org_id.clone(),
                    user_id: state.user_id.clone(),
                    document_name: Some(name.to_string()),
                })
                .await
                .expect("seed document");
        }

        let command = graph.researcher(&state).await.expect("researcher");
        let suggestion = command.patch.assistant.expect("suggestion");
        assert!(suggestion.starts_with("Related SOPs in org: "));
        assert!(suggestion.contains("Forklift Inspection"));
        assert!(suggestion.contains("Spill Cleanup"));
    }

    #[test]
    fn topology_lists_every_edge_once() {
        let mermaid = topology_mermaid();
        assert!(mermaid.starts_with("graph TD"));
        assert!(mermaid.contains("    supervisor --> interviewer"));
        assert!(mermaid.contains("    qc --> end"));
        assert_eq!(mermaid.lines().count(), 10);
    }
}
