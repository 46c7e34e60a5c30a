use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::Row;

use sopforge_core::domain::block::{Block, BlockContent, BlockId, BlockType};
use sopforge_core::domain::document::{DocumentId, UserId};

use super::{BlockRepository, RepositoryError};
use crate::DbPool;

pub struct SqlBlockRepository {
    pool: DbPool,
}

impl SqlBlockRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const BLOCK_COLUMNS: &str = "id, document_id, block_type, block_order, content, metadata, \
                             is_active, created_by, updated_by, created_at, updated_at";

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("bad timestamp {value:?}: {e}")))
}

fn row_to_block(row: &sqlx::sqlite::SqliteRow) -> Result<Block, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());

    let id: String = row.try_get("id").map_err(decode)?;
    let document_id: String = row.try_get("document_id").map_err(decode)?;
    let block_type_str: String = row.try_get("block_type").map_err(decode)?;
    let block_order: i64 = row.try_get("block_order").map_err(decode)?;
    let content_str: String = row.try_get("content").map_err(decode)?;
    let metadata_str: String = row.try_get("metadata").map_err(decode)?;
    let is_active: i64 = row.try_get("is_active").map_err(decode)?;
    let created_by: String = row.try_get("created_by").map_err(decode)?;
    let updated_by: String = row.try_get("updated_by").map_err(decode)?;
    let created_at_str: String = row.try_get("created_at").map_err(decode)?;
    let updated_at_str: String = row.try_get("updated_at").map_err(decode)?;

    let block_type =
        BlockType::parse(&block_type_str).map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let content: BlockContent =
        serde_json::from_str(&content_str).map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let metadata: BTreeMap<String, serde_json::Value> =
        serde_json::from_str(&metadata_str).map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Block {
        id: BlockId(id),
        document_id: DocumentId(document_id),
        block_type,
        block_order,
        content,
        metadata,
        is_active: is_active != 0,
        created_by: UserId(created_by),
        updated_by: UserId(updated_by),
        created_at: parse_timestamp(&created_at_str)?,
        updated_at: parse_timestamp(&updated_at_str)?,
    })
}

#[async_trait::async_trait]
impl BlockRepository for SqlBlockRepository {
    async fn find_by_id(&self, id: &BlockId) -> Result<Option<Block>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {BLOCK_COLUMNS} FROM document_block WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(ref r) => Ok(Some(row_to_block(r)?)),
            None => Ok(None),
        }
    }

    async fn list_active_for_document(
        &self,
        document_id: &DocumentId,
    ) -> Result<Vec<Block>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {BLOCK_COLUMNS} FROM document_block \
             WHERE document_id = ? AND is_active = 1 \
             ORDER BY block_order ASC"
        ))
        .bind(&document_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_block).collect()
    }

    async fn max_order(&self, document_id: &DocumentId) -> Result<Option<i64>, RepositoryError> {
        let row = sqlx::query(
            "SELECT MAX(block_order) AS max_order FROM document_block \
             WHERE document_id = ? AND is_active = 1",
        )
        .bind(&document_id.0)
        .fetch_one(&self.pool)
        .await?;

        row.try_get::<Option<i64>, _>("max_order")
            .map_err(|e| RepositoryError::Decode(e.to_string()))
    }

    async fn save(&self, block: &Block) -> Result<(), RepositoryError> {
        let content = serde_json::to_string(&block.content)
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let metadata = serde_json::to_string(&block.metadata)
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;

        sqlx::query(
            "INSERT INTO document_block (id, document_id, block_type, block_order, content,
                                         metadata, is_active, created_by, updated_by,
                                         created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 block_type = excluded.block_type,
                 block_order = excluded.block_order,
                 content = excluded.content,
                 metadata = excluded.metadata,
                 is_active = excluded.is_active,
                 updated_by = excluded.updated_by,
                 updated_at = excluded.updated_at",
        )
        .bind(&block.id.0)
        .bind(&block.document_id.0)
        .bind(block.block_type.as_str())
        .bind(block.block_order)
        .bind(&content)
        .bind(&metadata)
        .bind(i64::from(block.is_active))
        .bind(&block.created_by.0)
        .bind(&block.updated_by.0)
        .bind(block.created_at.to_rfc3339())
        .bind(block.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_row(&self, id: &BlockId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM document_block WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn shift_orders_from(
        &self,
        document_id: &DocumentId,
        position: i64,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE document_block SET block_order = block_order + 1, updated_at = ? \
             WHERE document_id = ? AND is_active = 1 AND block_order >= ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(&document_id.0)
        .bind(position)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_order(&self, id: &BlockId, order: i64) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE document_block SET block_order = ?, updated_at = ? WHERE id = ?")
            .bind(order)
            .bind(Utc::now().to_rfc3339())
            .bind(&id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
