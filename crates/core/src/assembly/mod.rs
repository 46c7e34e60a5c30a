mod render;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::block::{Block, BlockType};
use crate::domain::document::{Document, DocumentType};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssemblyFormat {
    Html,
    Markdown,
    PlainText,
    Json,
    /// Accepted as a format name but has no renderer.
    Pdf,
}

impl AssemblyFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Markdown => "markdown",
            Self::PlainText => "plain_text",
            Self::Json => "json",
            Self::Pdf => "pdf",
        }
    }
}

impl fmt::Display for AssemblyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssemblyFormat {
    type Err = AssemblyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "html" => Ok(Self::Html),
            "markdown" => Ok(Self::Markdown),
            "plain_text" => Ok(Self::PlainText),
            "json" => Ok(Self::Json),
            "pdf" => Ok(Self::Pdf),
            other => Err(AssemblyError::UnknownFormat(other.to_owned())),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("unknown assembly format: {0}")]
    UnknownFormat(String),
    #[error("unsupported assembly format: {0}")]
    UnsupportedFormat(AssemblyFormat),
    #[error("assembly serialization failed: {0}")]
    Serialization(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssemblyConfig {
    pub format: AssemblyFormat,
    pub include_toc: bool,
    pub include_metadata: bool,
}

impl AssemblyConfig {
    pub fn new(format: AssemblyFormat) -> Self {
        Self { format, include_toc: true, include_metadata: true }
    }
}

/// Rendered output plus a metadata map describing what produced it:
/// `document_type`, `document_tier`, the `assembly_config` used, and
/// `block_count`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssembledDocument {
    pub document_id: String,
    pub content: String,
    pub format: AssemblyFormat,
    pub metadata: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StructureValidation {
    pub is_valid: bool,
    pub missing_required: Vec<BlockType>,
    pub has_optional_blocks: bool,
    pub block_count: usize,
    pub block_types: Vec<BlockType>,
}

struct StructureTemplate {
    required: &'static [BlockType],
    optional: &'static [BlockType],
}

fn template_for(document_type: DocumentType) -> StructureTemplate {
    use BlockType::{
        Caution, Checklist, Description, PpeRequired, SectionHeader, Step, Title, Warning,
    };
    match document_type {
        DocumentType::Sop => StructureTemplate {
            required: &[Title, Description],
            optional: &[Step, PpeRequired, Warning, Caution],
        },
        DocumentType::Procedure => StructureTemplate {
            required: &[Title, Description, Step],
            optional: &[PpeRequired, Warning, Caution],
        },
        DocumentType::Checklist => StructureTemplate {
            required: &[Title, Checklist],
            optional: &[Description, PpeRequired],
        },
        DocumentType::Workflow => {
            StructureTemplate { required: &[Title, Step], optional: &[Description, SectionHeader] }
        }
        DocumentType::Manual => StructureTemplate {
            required: &[Title, Description, SectionHeader],
            optional: &[Step, Warning, Caution],
        },
        DocumentType::Policy | DocumentType::Guideline => {
            StructureTemplate { required: &[Title, Description], optional: &[SectionHeader] }
        }
        DocumentType::Template | DocumentType::Other => {
            StructureTemplate { required: &[Title], optional: &[Description, SectionHeader, Step] }
        }
    }
}

/// Renders an ordered block list into a target output format and checks
/// structural completeness against the per-document-type template.
#[derive(Clone, Debug, Default)]
pub struct DocumentAssembler;

impl DocumentAssembler {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_document_structure(&self, document: &Document) -> StructureValidation {
        let template = template_for(document.document_type);
        let active_blocks: Vec<&Block> =
            document.blocks.iter().filter(|b| b.is_active).collect();

        let mut block_types: Vec<BlockType> = Vec::new();
        for block in &active_blocks {
            if !block_types.contains(&block.block_type) {
                block_types.push(block.block_type);
            }
        }

        let missing_required: Vec<BlockType> = template
            .required
            .iter()
            .copied()
            .filter(|required| !block_types.contains(required))
            .collect();
        let has_optional_blocks =
            template.optional.iter().any(|optional| block_types.contains(optional));

        StructureValidation {
            is_valid: missing_required.is_empty(),
            missing_required,
            has_optional_blocks,
            block_count: active_blocks.len(),
            block_types,
        }
    }

    pub fn assemble_document(
        &self,
        document: &Document,
        config: &AssemblyConfig,
    ) -> Result<AssembledDocument, AssemblyError> {
        let mut blocks: Vec<&Block> = document.blocks.iter().filter(|b| b.is_active).collect();
        blocks.sort_by_key(|b| b.block_order);

        let content = match config.format {
            AssemblyFormat::Html => render::html(document, &blocks, config),
            AssemblyFormat::Markdown => render::markdown(document, &blocks, config),
            AssemblyFormat::PlainText => render::plain_text(document, &blocks),
            AssemblyFormat::Json => render::json(document, &blocks)?,
            AssemblyFormat::Pdf => {
                return Err(AssemblyError::UnsupportedFormat(AssemblyFormat::Pdf));
            }
        };

        let config_value = serde_json::to_value(config)
            .map_err(|error| AssemblyError::Serialization(error.to_string()))?;
        let mut metadata = BTreeMap::new();
        metadata.insert(
            "document_type".to_string(),
            Value::String(document.document_type.as_str().to_string()),
        );
        metadata
            .insert("document_tier".to_string(), Value::String(document.tier.as_str().to_string()));
        metadata.insert("assembly_config".to_string(), config_value);
        metadata.insert("block_count".to_string(), Value::from(blocks.len() as u64));

        Ok(AssembledDocument {
            document_id: document.id.0.clone(),
            content,
            format: config.format,
            metadata,
        })
    }
}
