pub mod assembly;
pub mod config;
pub mod domain;
pub mod errors;

pub use assembly::{
    AssembledDocument, AssemblyConfig, AssemblyError, AssemblyFormat, DocumentAssembler,
    StructureValidation,
};
pub use domain::block::{
    Block, BlockContent, BlockId, BlockType, ChecklistContent, ChecklistItem, ImageContent,
    QuestionContent, QuestionStatus, StepContent, TextContent,
};
pub use domain::document::{
    Document, DocumentId, DocumentKey, DocumentStatus, DocumentTier, DocumentType, OrgId, UserId,
};
pub use errors::DomainError;
