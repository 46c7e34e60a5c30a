use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::document::{DocumentId, UserId};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Title,
    Description,
    SectionHeader,
    Step,
    Question,
    PpeRequired,
    Warning,
    Caution,
    Note,
    Checklist,
    ChecklistItem,
    Image,
    Video,
    Diagram,
    Table,
    List,
    Code,
    Definition,
    Reference,
    Prerequisites,
    Materials,
    Equipment,
    Tools,
    SafetySummary,
    RevisionHistory,
    ApprovalSignature,
    Appendix,
    Attachment,
    Divider,
    AdditionalInfo,
}

impl BlockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Description => "description",
            Self::SectionHeader => "section_header",
            Self::Step => "step",
            Self::Question => "question",
            Self::PpeRequired => "ppe_required",
            Self::Warning => "warning",
            Self::Caution => "caution",
            Self::Note => "note",
            Self::Checklist => "checklist",
            Self::ChecklistItem => "checklist_item",
            Self::Image => "image",
            Self::Video => "video",
            Self::Diagram => "diagram",
            Self::Table => "table",
            Self::List => "list",
            Self::Code => "code",
            Self::Definition => "definition",
            Self::Reference => "reference",
            Self::Prerequisites => "prerequisites",
            Self::Materials => "materials",
            Self::Equipment => "equipment",
            Self::Tools => "tools",
            Self::SafetySummary => "safety_summary",
            Self::RevisionHistory => "revision_history",
            Self::ApprovalSignature => "approval_signature",
            Self::Appendix => "appendix",
            Self::Attachment => "attachment",
            Self::Divider => "divider",
            Self::AdditionalInfo => "additional_info",
        }
    }

    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "title" => Ok(Self::Title),
            "description" => Ok(Self::Description),
            "section_header" => Ok(Self::SectionHeader),
            "step" => Ok(Self::Step),
            "question" => Ok(Self::Question),
            "ppe_required" => Ok(Self::PpeRequired),
            "warning" => Ok(Self::Warning),
            "caution" => Ok(Self::Caution),
            "note" => Ok(Self::Note),
            "checklist" => Ok(Self::Checklist),
            "checklist_item" => Ok(Self::ChecklistItem),
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            "diagram" => Ok(Self::Diagram),
            "table" => Ok(Self::Table),
            "list" => Ok(Self::List),
            "code" => Ok(Self::Code),
            "definition" => Ok(Self::Definition),
            "reference" => Ok(Self::Reference),
            "prerequisites" => Ok(Self::Prerequisites),
            "materials" => Ok(Self::Materials),
            "equipment" => Ok(Self::Equipment),
            "tools" => Ok(Self::Tools),
            "safety_summary" => Ok(Self::SafetySummary),
            "revision_history" => Ok(Self::RevisionHistory),
            "approval_signature" => Ok(Self::ApprovalSignature),
            "appendix" => Ok(Self::Appendix),
            "attachment" => Ok(Self::Attachment),
            "divider" => Ok(Self::Divider),
            "additional_info" => Ok(Self::AdditionalInfo),
            other => Err(DomainError::UnknownBlockType(other.to_owned())),
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionStatus {
    Open,
    Answered,
    Declined,
}

impl Default for QuestionStatus {
    fn default() -> Self {
        Self::Open
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepContent {
    pub step_number: u32,
    pub step_description: String,
    #[serde(default)]
    pub step_instructions: String,
    #[serde(default)]
    pub step_expected_result: String,
    #[serde(default)]
    pub step_who_responsible: String,
    #[serde(default)]
    pub ppe_required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_image_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuestionContent {
    pub question: String,
    #[serde(default)]
    pub status: QuestionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answered_by: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answered_at: Option<DateTime<Utc>>,
}

impl QuestionContent {
    pub fn open(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            status: QuestionStatus::Open,
            answer: None,
            answered_by: None,
            answered_at: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub text: String,
    #[serde(default)]
    pub checked: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChecklistContent {
    pub items: Vec<ChecklistItem>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageContent {
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub text: String,
}

/// Payload shape is keyed by the block type on the wire; no enum tag is
/// stored. Variant order matters for untagged deserialization: the
/// structured shapes carry required fields the plain text shape lacks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockContent {
    Step(StepContent),
    Question(QuestionContent),
    Checklist(ChecklistContent),
    Image(ImageContent),
    Text(TextContent),
}

impl BlockContent {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(TextContent { text: value.into() })
    }

    /// Schema check applied at the tool boundary before any write.
    pub fn accepts(&self, block_type: BlockType) -> bool {
        match self {
            Self::Step(_) => block_type == BlockType::Step,
            Self::Question(_) => block_type == BlockType::Question,
            Self::Checklist(_) => block_type == BlockType::Checklist,
            Self::Image(_) => block_type == BlockType::Image,
            Self::Text(_) => !matches!(
                block_type,
                BlockType::Step | BlockType::Question | BlockType::Checklist | BlockType::Image
            ),
        }
    }

    pub fn validate_for(&self, block_type: BlockType) -> Result<(), DomainError> {
        if self.accepts(block_type) {
            return Ok(());
        }
        Err(DomainError::ContentShapeMismatch { block_type: block_type.as_str().to_owned() })
    }

    /// Free text carried by the payload, or a stringified fallback for the
    /// structured shapes.
    pub fn display_text(&self) -> String {
        match self {
            Self::Text(content) => content.text.clone(),
            Self::Step(content) => content.step_description.clone(),
            Self::Question(content) => content.question.clone(),
            Self::Checklist(content) => content
                .items
                .iter()
                .map(|item| item.text.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            Self::Image(content) => content.image_url.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub document_id: DocumentId,
    pub block_type: BlockType,
    /// Dense position among the document's active blocks: 1..N, no gaps.
    pub block_order: i64,
    pub content: BlockContent,
    pub metadata: BTreeMap<String, Value>,
    pub is_active: bool,
    pub created_by: UserId,
    pub updated_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
