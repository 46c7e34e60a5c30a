use async_trait::async_trait;
use thiserror::Error;

use sopforge_core::domain::block::{Block, BlockId};
use sopforge_core::domain::document::{Document, DocumentId, DocumentKey, OrgId};

pub mod block;
pub mod document;

pub use block::SqlBlockRepository;
pub use document::SqlDocumentRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Loads the document row only; blocks are fetched separately.
    async fn find_by_id(&self, id: &DocumentId) -> Result<Option<Document>, RepositoryError>;

    /// Newest version first for the given stable key.
    async fn find_latest_by_key(
        &self,
        key: &DocumentKey,
    ) -> Result<Option<Document>, RepositoryError>;

    async fn save(&self, document: &Document) -> Result<(), RepositoryError>;

    /// Document names for an organization, most recently created first.
    async fn list_names_for_org(&self, org_id: &OrgId) -> Result<Vec<String>, RepositoryError>;
}

#[async_trait]
pub trait BlockRepository: Send + Sync {
    async fn find_by_id(&self, id: &BlockId) -> Result<Option<Block>, RepositoryError>;

    /// Active blocks only, ordered by `block_order` ascending.
    async fn list_active_for_document(
        &self,
        document_id: &DocumentId,
    ) -> Result<Vec<Block>, RepositoryError>;

    async fn max_order(&self, document_id: &DocumentId) -> Result<Option<i64>, RepositoryError>;

    async fn save(&self, block: &Block) -> Result<(), RepositoryError>;

    async fn delete_row(&self, id: &BlockId) -> Result<(), RepositoryError>;

    /// Shifts every active block with `block_order >= position` up by one.
    async fn shift_orders_from(
        &self,
        document_id: &DocumentId,
        position: i64,
    ) -> Result<(), RepositoryError>;

    async fn set_order(&self, id: &BlockId, order: i64) -> Result<(), RepositoryError>;
}
