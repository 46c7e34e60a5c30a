//! Typed tool catalog over the block service.
//!
//! Every operation validates its input before any write and returns a
//! structured result. Nodes in the orchestration graph only touch the store
//! through this catalog.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use sopforge_core::assembly::{
    AssembledDocument, AssemblyConfig, AssemblyError, AssemblyFormat, DocumentAssembler,
    StructureValidation,
};
use sopforge_core::domain::block::{
    Block, BlockContent, BlockId, BlockType, QuestionContent, QuestionStatus, StepContent,
};
use sopforge_core::domain::document::{
    Document, DocumentId, DocumentKey, DocumentStatus, DocumentTier, DocumentType, OrgId, UserId,
};
use sopforge_core::errors::DomainError;

use sopforge_db::repositories::{DocumentRepository, RepositoryError, SqlDocumentRepository};
use sopforge_db::{BlockService, DbPool, ServiceError};

/// Names of the operations callable from the orchestration graph.
pub const TOOL_CATALOG: &[&str] = &[
    "create_or_get_document",
    "add_or_update_title",
    "add_or_update_description",
    "add_or_update_step",
    "insert_step_before",
    "delete_step",
    "add_question",
    "answer_question",
    "add_safety_block",
    "get_document_blocks",
    "get_all_document_titles",
    "assemble_document",
];

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Storage(RepositoryError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for ToolError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::DocumentNotFound(id) => Self::NotFound(format!("document {id}")),
            ServiceError::BlockNotFound(id) => Self::NotFound(format!("block {id}")),
            ServiceError::Repository(inner) => Self::Storage(inner),
        }
    }
}

impl From<RepositoryError> for ToolError {
    fn from(error: RepositoryError) -> Self {
        Self::Storage(error)
    }
}

impl From<DomainError> for ToolError {
    fn from(error: DomainError) -> Self {
        Self::InvalidInput(error.to_string())
    }
}

impl From<AssemblyError> for ToolError {
    fn from(error: AssemblyError) -> Self {
        match error {
            AssemblyError::UnknownFormat(_) | AssemblyError::UnsupportedFormat(_) => {
                Self::InvalidInput(error.to_string())
            }
            AssemblyError::Serialization(message) => Self::Internal(message),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CreateOrGetDocumentInput {
    pub document_key: Option<DocumentKey>,
    pub document_type: DocumentType,
    pub org_id: OrgId,
    pub user_id: UserId,
    pub document_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateOrGetDocumentOutput {
    pub document_id: DocumentId,
    pub document_key: DocumentKey,
    pub version: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockResult {
    pub block_id: BlockId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepResult {
    pub block_id: BlockId,
    pub step_number: u32,
}

#[derive(Clone, Debug)]
pub struct StepInput {
    pub step_description: String,
    pub step_instructions: String,
    pub step_expected_result: String,
    pub step_who_responsible: String,
    pub ppe_required: bool,
}

impl StepInput {
    pub fn described(step_description: impl Into<String>) -> Self {
        Self {
            step_description: step_description.into(),
            step_instructions: String::new(),
            step_expected_result: String::new(),
            step_who_responsible: String::new(),
            ppe_required: false,
        }
    }

    fn into_content(self, step_number: u32) -> StepContent {
        StepContent {
            step_number,
            step_description: self.step_description,
            step_instructions: self.step_instructions,
            step_expected_result: self.step_expected_result,
            step_who_responsible: self.step_who_responsible,
            ppe_required: self.ppe_required,
            step_image_url: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnswerQuestionOutput {
    pub block_id: BlockId,
    pub status: QuestionStatus,
}

#[derive(Clone)]
pub struct SopTools {
    service: BlockService,
    documents: Arc<dyn DocumentRepository>,
    assembler: DocumentAssembler,
}

impl SopTools {
    pub fn new(service: BlockService, documents: Arc<dyn DocumentRepository>) -> Self {
        Self { service, documents, assembler: DocumentAssembler::new() }
    }

    pub fn from_pool(pool: &DbPool) -> Self {
        Self::new(
            BlockService::from_pool(pool),
            Arc::new(SqlDocumentRepository::new(pool.clone())),
        )
    }

    /// Looks up the newest version under the given key, or creates version 1
    /// with a generated key when none matches.
    pub async fn create_or_get_document(
        &self,
        input: CreateOrGetDocumentInput,
    ) -> Result<CreateOrGetDocumentOutput, ToolError> {
        if let Some(key) = &input.document_key {
            if let Some(existing) = self.documents.find_latest_by_key(key).await? {
                return Ok(CreateOrGetDocumentOutput {
                    document_id: existing.id,
                    document_key: existing.document_key,
                    version: existing.version,
                });
            }
        }

        let now = Utc::now();
        let document = Document {
            id: DocumentId(Uuid::new_v4().to_string()),
            document_key: input
                .document_key
                .unwrap_or_else(|| DocumentKey(Uuid::new_v4().to_string())),
            version: 1,
            name: input.document_name.unwrap_or_else(|| "Untitled SOP".to_string()),
            document_type: input.document_type,
            tier: DocumentTier::Free,
            status: DocumentStatus::Draft,
            org_id: input.org_id,
            created_by: input.user_id.clone(),
            updated_by: input.user_id,
            metadata: Default::default(),
            created_at: now,
            updated_at: now,
            blocks: Vec::new(),
        };
        self.documents.save(&document).await?;
        tracing::debug!(
            event_name = "document_created",
            document_id = %document.id.0,
            document_type = %document.document_type,
            "created new document"
        );
        Ok(CreateOrGetDocumentOutput {
            document_id: document.id,
            document_key: document.document_key,
            version: document.version,
        })
    }

    /// Updates the first title block in place, or inserts a new one at the
    /// top of the document.
    pub async fn add_or_update_title(
        &self,
        document_id: &DocumentId,
        text: &str,
        user_id: &UserId,
    ) -> Result<BlockResult, ToolError> {
        let content = BlockContent::text(text);
        content.validate_for(BlockType::Title)?;

        if let Some(existing) = self.first_of_type(document_id, BlockType::Title).await? {
            let updated = self.service.update_block(&existing.id, content, user_id, None).await?;
            return Ok(BlockResult { block_id: updated.id });
        }
        let block = self
            .service
            .add_block(document_id, BlockType::Title, content, user_id, Some(1), None)
            .await?;
        Ok(BlockResult { block_id: block.id })
    }

    /// Updates the first description block in place, or appends one.
    pub async fn add_or_update_description(
        &self,
        document_id: &DocumentId,
        text: &str,
        user_id: &UserId,
    ) -> Result<BlockResult, ToolError> {
        let content = BlockContent::text(text);
        content.validate_for(BlockType::Description)?;

        if let Some(existing) = self.first_of_type(document_id, BlockType::Description).await? {
            let updated = self.service.update_block(&existing.id, content, user_id, None).await?;
            return Ok(BlockResult { block_id: updated.id });
        }
        let block = self
            .service
            .add_block(document_id, BlockType::Description, content, user_id, None, None)
            .await?;
        Ok(BlockResult { block_id: block.id })
    }

    /// Matches an existing step by its `step_number` payload field and
    /// replaces the content, or appends a new step block.
    pub async fn add_or_update_step(
        &self,
        document_id: &DocumentId,
        step_number: u32,
        input: StepInput,
        user_id: &UserId,
    ) -> Result<StepResult, ToolError> {
        if input.step_description.trim().is_empty() {
            return Err(ToolError::InvalidInput("step description must not be empty".to_string()));
        }
        let content = BlockContent::Step(input.into_content(step_number));

        if let Some(existing) = self.step_by_number(document_id, step_number).await? {
            let updated = self.service.update_block(&existing.id, content, user_id, None).await?;
            return Ok(StepResult { block_id: updated.id, step_number });
        }
        let block = self
            .service
            .add_block(document_id, BlockType::Step, content, user_id, None, None)
            .await?;
        Ok(StepResult { block_id: block.id, step_number })
    }

    /// Bumps the `step_number` of every step at or after the target, then
    /// appends a new step numbered at the gap.
    pub async fn insert_step_before(
        &self,
        document_id: &DocumentId,
        before_step: u32,
        input: StepInput,
        user_id: &UserId,
    ) -> Result<StepResult, ToolError> {
        if input.step_description.trim().is_empty() {
            return Err(ToolError::InvalidInput("step description must not be empty".to_string()));
        }

        for block in self.steps_sorted(document_id).await? {
            if let BlockContent::Step(step) = &block.content {
                if step.step_number >= before_step {
                    let mut renumbered = step.clone();
                    renumbered.step_number += 1;
                    self.service
                        .update_block(&block.id, BlockContent::Step(renumbered), user_id, None)
                        .await?;
                }
            }
        }

        let content = BlockContent::Step(input.into_content(before_step));
        let block = self
            .service
            .add_block(document_id, BlockType::Step, content, user_id, None, None)
            .await?;
        Ok(StepResult { block_id: block.id, step_number: before_step })
    }

    /// Deletes the step with the given number and renumbers the survivors to
    /// 1..K by their current numbering.
    pub async fn delete_step(
        &self,
        document_id: &DocumentId,
        step_number: u32,
        user_id: &UserId,
    ) -> Result<(), ToolError> {
        let target = self
            .step_by_number(document_id, step_number)
            .await?
            .ok_or_else(|| ToolError::NotFound(format!("step {step_number}")))?;
        self.service.delete_block(&target.id).await?;

        for (index, block) in self.steps_sorted(document_id).await?.into_iter().enumerate() {
            if let BlockContent::Step(step) = &block.content {
                let expected = index as u32 + 1;
                if step.step_number != expected {
                    let mut renumbered = step.clone();
                    renumbered.step_number = expected;
                    self.service
                        .update_block(&block.id, BlockContent::Step(renumbered), user_id, None)
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// Appends an open question block.
    pub async fn add_question(
        &self,
        document_id: &DocumentId,
        question: &str,
        user_id: &UserId,
    ) -> Result<BlockResult, ToolError> {
        let content = BlockContent::Question(QuestionContent::open(question));
        let block = self
            .service
            .add_block(document_id, BlockType::Question, content, user_id, None, None)
            .await?;
        Ok(BlockResult { block_id: block.id })
    }

    /// Records the answer on an open question block; the target must be a
    /// question block.
    pub async fn answer_question(
        &self,
        block_id: &BlockId,
        answer: &str,
        answered_by: &UserId,
    ) -> Result<AnswerQuestionOutput, ToolError> {
        let block = self
            .service
            .get_block(block_id)
            .await?
            .ok_or_else(|| ToolError::NotFound(format!("block {}", block_id.0)))?;
        let BlockContent::Question(mut question) = block.content else {
            return Err(ToolError::InvalidInput(format!(
                "block {} is not a question block",
                block_id.0
            )));
        };

        question.answer = Some(answer.to_string());
        question.status = QuestionStatus::Answered;
        question.answered_by = Some(answered_by.clone());
        question.answered_at = Some(Utc::now());
        let updated = self
            .service
            .update_block(block_id, BlockContent::Question(question), answered_by, None)
            .await?;
        Ok(AnswerQuestionOutput { block_id: updated.id, status: QuestionStatus::Answered })
    }

    /// Appends a safety notice; `safety_type` must be one of `ppe_required`,
    /// `warning`, or `caution`.
    pub async fn add_safety_block(
        &self,
        document_id: &DocumentId,
        safety_type: &str,
        text: &str,
        user_id: &UserId,
    ) -> Result<BlockResult, ToolError> {
        let block_type = match safety_type.to_lowercase().as_str() {
            "ppe_required" => BlockType::PpeRequired,
            "warning" => BlockType::Warning,
            "caution" => BlockType::Caution,
            other => {
                return Err(ToolError::InvalidInput(format!("unknown safety type: {other}")));
            }
        };
        let block = self
            .service
            .add_block(document_id, block_type, BlockContent::text(text), user_id, None, None)
            .await?;
        Ok(BlockResult { block_id: block.id })
    }

    pub async fn get_document_blocks(
        &self,
        document_id: &DocumentId,
    ) -> Result<Vec<Block>, ToolError> {
        Ok(self.service.get_document_blocks(document_id).await?)
    }

    /// Document names in the organization, most recently created first.
    pub async fn get_all_document_titles(&self, org_id: &OrgId) -> Result<Vec<String>, ToolError> {
        Ok(self.documents.list_names_for_org(org_id).await?)
    }

    pub async fn load_document(&self, document_id: &DocumentId) -> Result<Document, ToolError> {
        Ok(self.service.load_document(document_id).await?)
    }

    pub fn validate_structure(&self, document: &Document) -> StructureValidation {
        self.assembler.validate_document_structure(document)
    }

    pub async fn assemble_document(
        &self,
        document_id: &DocumentId,
        format: AssemblyFormat,
        include_toc: bool,
        include_metadata: bool,
    ) -> Result<AssembledDocument, ToolError> {
        let document = self.service.load_document(document_id).await?;
        let config = AssemblyConfig { format, include_toc, include_metadata };
        Ok(self.assembler.assemble_document(&document, &config)?)
    }

    async fn first_of_type(
        &self,
        document_id: &DocumentId,
        block_type: BlockType,
    ) -> Result<Option<Block>, ToolError> {
        let blocks = self.service.get_document_blocks(document_id).await?;
        Ok(blocks.into_iter().find(|b| b.block_type == block_type))
    }

    async fn step_by_number(
        &self,
        document_id: &DocumentId,
        step_number: u32,
    ) -> Result<Option<Block>, ToolError> {
        let blocks = self.service.get_document_blocks(document_id).await?;
        Ok(blocks.into_iter().find(|b| {
            matches!(&b.content, BlockContent::Step(step) if step.step_number == step_number)
        }))
    }

    /// Step blocks sorted by their logical step number.
    async fn steps_sorted(&self, document_id: &DocumentId) -> Result<Vec<Block>, ToolError> {
        let mut steps: Vec<Block> = self
            .service
            .get_document_blocks(document_id)
            .await?
            .into_iter()
            .filter(|b| b.block_type == BlockType::Step)
            .collect();
        steps.sort_by_key(|b| match &b.content {
            BlockContent::Step(step) => step.step_number,
            _ => 0,
        });
        Ok(steps)
    }
}
