//! Block Service: document-scoped block CRUD that maintains the dense
//! ordering invariant (active orders are exactly 1..N) across inserts and
//! deletes. Explicit reorder applies the caller's orders verbatim.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use sopforge_core::domain::block::{Block, BlockContent, BlockId, BlockType};
use sopforge_core::domain::document::{Document, DocumentId, UserId};

use crate::repositories::{
    BlockRepository, DocumentRepository, RepositoryError, SqlBlockRepository,
    SqlDocumentRepository,
};
use crate::DbPool;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("document not found: {0}")]
    DocumentNotFound(String),
    #[error("block not found: {0}")]
    BlockNotFound(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReorderEntry {
    pub block_id: BlockId,
    pub order: i64,
}

#[derive(Clone)]
pub struct BlockService {
    documents: Arc<dyn DocumentRepository>,
    blocks: Arc<dyn BlockRepository>,
}

impl BlockService {
    pub fn new(documents: Arc<dyn DocumentRepository>, blocks: Arc<dyn BlockRepository>) -> Self {
        Self { documents, blocks }
    }

    pub fn from_pool(pool: &DbPool) -> Self {
        Self::new(
            Arc::new(SqlDocumentRepository::new(pool.clone())),
            Arc::new(SqlBlockRepository::new(pool.clone())),
        )
    }

    async fn require_document(&self, document_id: &DocumentId) -> Result<Document, ServiceError> {
        self.documents
            .find_by_id(document_id)
            .await?
            .ok_or_else(|| ServiceError::DocumentNotFound(document_id.0.clone()))
    }

    async fn require_block(&self, block_id: &BlockId) -> Result<Block, ServiceError> {
        self.blocks
            .find_by_id(block_id)
            .await?
            .ok_or_else(|| ServiceError::BlockNotFound(block_id.0.clone()))
    }

    /// Appends when `position` is omitted; otherwise shifts every active
    /// block at or after `position` up by one before inserting.
    pub async fn add_block(
        &self,
        document_id: &DocumentId,
        block_type: BlockType,
        content: BlockContent,
        created_by: &UserId,
        position: Option<i64>,
        metadata: Option<BTreeMap<String, serde_json::Value>>,
    ) -> Result<Block, ServiceError> {
        self.require_document(document_id).await?;

        let block_order = match position {
            None => self.blocks.max_order(document_id).await?.unwrap_or(0) + 1,
            Some(position) => {
                self.blocks.shift_orders_from(document_id, position).await?;
                position
            }
        };

        let now = Utc::now();
        let block = Block {
            id: BlockId(Uuid::new_v4().to_string()),
            document_id: document_id.clone(),
            block_type,
            block_order,
            content,
            metadata: metadata.unwrap_or_default(),
            is_active: true,
            created_by: created_by.clone(),
            updated_by: created_by.clone(),
            created_at: now,
            updated_at: now,
        };
        self.blocks.save(&block).await?;
        Ok(block)
    }

    /// Replaces content (and metadata when given) in place; `block_order`
    /// never changes here.
    pub async fn update_block(
        &self,
        block_id: &BlockId,
        content: BlockContent,
        updated_by: &UserId,
        metadata: Option<BTreeMap<String, serde_json::Value>>,
    ) -> Result<Block, ServiceError> {
        let mut block = self.require_block(block_id).await?;
        block.content = content;
        if let Some(metadata) = metadata {
            block.metadata = metadata;
        }
        block.updated_by = updated_by.clone();
        block.updated_at = Utc::now();
        self.blocks.save(&block).await?;
        Ok(block)
    }

    /// Removes the row, then renumbers the survivors to 1..N in their
    /// current relative order.
    pub async fn delete_block(&self, block_id: &BlockId) -> Result<(), ServiceError> {
        let block = self.require_block(block_id).await?;
        self.blocks.delete_row(block_id).await?;

        let remaining = self.blocks.list_active_for_document(&block.document_id).await?;
        for (index, survivor) in remaining.iter().enumerate() {
            let expected = index as i64 + 1;
            if survivor.block_order != expected {
                self.blocks.set_order(&survivor.id, expected).await?;
            }
        }
        Ok(())
    }

    /// Bulk order replacement. The caller owns density here; unknown block
    /// ids and blocks belonging to other documents are skipped.
    pub async fn reorder_blocks(
        &self,
        document_id: &DocumentId,
        entries: &[ReorderEntry],
    ) -> Result<Vec<Block>, ServiceError> {
        self.require_document(document_id).await?;

        for entry in entries {
            let owned = self
                .blocks
                .find_by_id(&entry.block_id)
                .await?
                .is_some_and(|block| block.document_id == *document_id);
            if owned {
                self.blocks.set_order(&entry.block_id, entry.order).await?;
            }
        }
        Ok(self.blocks.list_active_for_document(document_id).await?)
    }

    /// Deep copy of content and metadata, appended at the end of the same
    /// document.
    pub async fn duplicate_block(
        &self,
        block_id: &BlockId,
        created_by: &UserId,
    ) -> Result<Block, ServiceError> {
        let original = self.require_block(block_id).await?;
        let new_order = self.blocks.max_order(&original.document_id).await?.unwrap_or(0) + 1;

        let now = Utc::now();
        let copy = Block {
            id: BlockId(Uuid::new_v4().to_string()),
            document_id: original.document_id.clone(),
            block_type: original.block_type,
            block_order: new_order,
            content: original.content.clone(),
            metadata: original.metadata.clone(),
            is_active: true,
            created_by: created_by.clone(),
            updated_by: created_by.clone(),
            created_at: now,
            updated_at: now,
        };
        self.blocks.save(&copy).await?;
        Ok(copy)
    }

    pub async fn get_document_blocks(
        &self,
        document_id: &DocumentId,
    ) -> Result<Vec<Block>, ServiceError> {
        self.require_document(document_id).await?;
        Ok(self.blocks.list_active_for_document(document_id).await?)
    }

    pub async fn get_block(&self, block_id: &BlockId) -> Result<Option<Block>, ServiceError> {
        Ok(self.blocks.find_by_id(block_id).await?)
    }

    /// Document row plus its active blocks in order.
    pub async fn load_document(&self, document_id: &DocumentId) -> Result<Document, ServiceError> {
        let mut document = self.require_document(document_id).await?;
        document.blocks = self.blocks.list_active_for_document(document_id).await?;
        Ok(document)
    }
}
