//! Builders and seed helpers shared by the crate's tests.

use std::collections::BTreeMap;

use chrono::Utc;

use sopforge_core::domain::block::{Block, BlockContent, BlockId, BlockType};
use sopforge_core::domain::document::{
    Document, DocumentId, DocumentKey, DocumentStatus, DocumentTier, DocumentType, OrgId, UserId,
};

use crate::repositories::{DocumentRepository, SqlDocumentRepository};
use crate::DbPool;

pub fn document_fixture(id: &str) -> Document {
    let now = Utc::now();
    Document {
        id: DocumentId(id.to_string()),
        document_key: DocumentKey(format!("key-{id}")),
        version: 1,
        name: "Untitled SOP".to_string(),
        document_type: DocumentType::Sop,
        tier: DocumentTier::Free,
        status: DocumentStatus::Draft,
        org_id: OrgId("org-1".to_string()),
        created_by: UserId("user-1".to_string()),
        updated_by: UserId("user-1".to_string()),
        metadata: BTreeMap::new(),
        created_at: now,
        updated_at: now,
        blocks: Vec::new(),
    }
}

pub fn block_fixture(id: &str, document_id: &str, block_type: BlockType, order: i64) -> Block {
    let now = Utc::now();
    Block {
        id: BlockId(id.to_string()),
        document_id: DocumentId(document_id.to_string()),
        block_type,
        block_order: order,
        content: BlockContent::text(format!("{block_type} {order}")),
        metadata: BTreeMap::new(),
        is_active: true,
        created_by: UserId("user-1".to_string()),
        updated_by: UserId("user-1".to_string()),
        created_at: now,
        updated_at: now,
    }
}

/// Seeds a parent document row so block writes satisfy the FK constraint.
pub async fn insert_document(pool: &DbPool, id: &str) {
    let repo = SqlDocumentRepository::new(pool.clone());
    repo.save(&document_fixture(id)).await.expect("insert parent document");
}
