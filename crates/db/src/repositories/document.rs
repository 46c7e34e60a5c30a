use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::Row;

use sopforge_core::domain::document::{
    Document, DocumentId, DocumentKey, DocumentStatus, DocumentTier, DocumentType, OrgId, UserId,
};

use super::{DocumentRepository, RepositoryError};
use crate::DbPool;

pub struct SqlDocumentRepository {
    pool: DbPool,
}

impl SqlDocumentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const DOCUMENT_COLUMNS: &str = "id, document_key, version, name, document_type, tier, status, \
                                org_id, created_by, updated_by, metadata, created_at, updated_at";

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("bad timestamp {value:?}: {e}")))
}

fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Result<Document, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());

    let id: String = row.try_get("id").map_err(decode)?;
    let document_key: String = row.try_get("document_key").map_err(decode)?;
    let version: i64 = row.try_get("version").map_err(decode)?;
    let name: String = row.try_get("name").map_err(decode)?;
    let document_type_str: String = row.try_get("document_type").map_err(decode)?;
    let tier_str: String = row.try_get("tier").map_err(decode)?;
    let status_str: String = row.try_get("status").map_err(decode)?;
    let org_id: String = row.try_get("org_id").map_err(decode)?;
    let created_by: String = row.try_get("created_by").map_err(decode)?;
    let updated_by: String = row.try_get("updated_by").map_err(decode)?;
    let metadata_str: String = row.try_get("metadata").map_err(decode)?;
    let created_at_str: String = row.try_get("created_at").map_err(decode)?;
    let updated_at_str: String = row.try_get("updated_at").map_err(decode)?;

    let document_type = DocumentType::parse(&document_type_str)
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let metadata: BTreeMap<String, serde_json::Value> =
        serde_json::from_str(&metadata_str).map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Document {
        id: DocumentId(id),
        document_key: DocumentKey(document_key),
        version,
        name,
        document_type,
        tier: DocumentTier::parse(&tier_str),
        status: DocumentStatus::parse(&status_str),
        org_id: OrgId(org_id),
        created_by: UserId(created_by),
        updated_by: UserId(updated_by),
        metadata,
        created_at: parse_timestamp(&created_at_str)?,
        updated_at: parse_timestamp(&updated_at_str)?,
        blocks: Vec::new(),
    })
}

#[async_trait::async_trait]
impl DocumentRepository for SqlDocumentRepository {
    async fn find_by_id(&self, id: &DocumentId) -> Result<Option<Document>, RepositoryError> {
        let row =
            sqlx::query(&format!("SELECT {DOCUMENT_COLUMNS} FROM document WHERE id = ?"))
                .bind(&id.0)
                .fetch_optional(&self.pool)
                .await?;
        match row {
            Some(ref r) => Ok(Some(row_to_document(r)?)),
            None => Ok(None),
        }
    }

    async fn find_latest_by_key(
        &self,
        key: &DocumentKey,
    ) -> Result<Option<Document>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM document WHERE document_key = ? \
             ORDER BY version DESC LIMIT 1"
        ))
        .bind(&key.0)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(ref r) => Ok(Some(row_to_document(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, document: &Document) -> Result<(), RepositoryError> {
        let metadata = serde_json::to_string(&document.metadata)
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;

        sqlx::query(
            "INSERT INTO document (id, document_key, version, name, document_type, tier, status,
                                   org_id, created_by, updated_by, metadata, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 document_type = excluded.document_type,
                 tier = excluded.tier,
                 status = excluded.status,
                 updated_by = excluded.updated_by,
                 metadata = excluded.metadata,
                 updated_at = excluded.updated_at",
        )
        .bind(&document.id.0)
        .bind(&document.document_key.0)
        .bind(document.version)
        .bind(&document.name)
        .bind(document.document_type.as_str())
        .bind(document.tier.as_str())
        .bind(document.status.as_str())
        .bind(&document.org_id.0)
        .bind(&document.created_by.0)
        .bind(&document.updated_by.0)
        .bind(&metadata)
        .bind(document.created_at.to_rfc3339())
        .bind(document.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_names_for_org(&self, org_id: &OrgId) -> Result<Vec<String>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT name FROM document WHERE org_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(&org_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{Duration, Utc};

    use sopforge_core::domain::document::{
        Document, DocumentId, DocumentKey, DocumentStatus, DocumentTier, DocumentType, OrgId,
        UserId,
    };

    use super::SqlDocumentRepository;
    use crate::repositories::{DocumentRepository, RepositoryError};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn sample_document(id: &str, key: &str, version: i64) -> Document {
        let now = Utc::now();
        Document {
            id: DocumentId(id.to_string()),
            document_key: DocumentKey(key.to_string()),
            version,
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

    #[tokio::test]
    async fn save_and_find_by_id() {
        let pool = setup().await;
        let repo = SqlDocumentRepository::new(pool);

        repo.save(&sample_document("doc-1", "key-1", 1)).await.expect("save");
        let found = repo
            .find_by_id(&DocumentId("doc-1".to_string()))
            .await
            .expect("find")
            .expect("should exist");

        assert_eq!(found.document_key.0, "key-1");
        assert_eq!(found.document_type, DocumentType::Sop);
        assert_eq!(found.status, DocumentStatus::Draft);
        assert!(found.blocks.is_empty());
    }

    #[tokio::test]
    async fn find_latest_by_key_returns_highest_version() {
        let pool = setup().await;
        let repo = SqlDocumentRepository::new(pool);

        repo.save(&sample_document("doc-1", "key-1", 1)).await.expect("save v1");
        repo.save(&sample_document("doc-2", "key-1", 2)).await.expect("save v2");

        let latest = repo
            .find_latest_by_key(&DocumentKey("key-1".to_string()))
            .await
            .expect("find")
            .expect("should exist");
        assert_eq!(latest.id.0, "doc-2");
        assert_eq!(latest.version, 2);
    }

    #[tokio::test]
    async fn save_upserts_mutable_fields() {
        let pool = setup().await;
        let repo = SqlDocumentRepository::new(pool);

        let mut doc = sample_document("doc-1", "key-1", 1);
        repo.save(&doc).await.expect("insert");

        doc.name = "Spill Cleanup".to_string();
        doc.status = DocumentStatus::ToUser;
        doc.updated_at = Utc::now();
        repo.save(&doc).await.expect("upsert");

        let found = repo
            .find_by_id(&DocumentId("doc-1".to_string()))
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(found.name, "Spill Cleanup");
        assert_eq!(found.status, DocumentStatus::ToUser);
    }

    #[tokio::test]
    async fn corrupt_timestamp_surfaces_decode_error() {
        let pool = setup().await;
        sqlx::query(
            "INSERT INTO document (id, document_key, version, name, document_type, tier, status,
                                   org_id, created_by, updated_by, metadata,
                                   created_at, updated_at)
             VALUES ('doc-bad', 'key-bad', 1, 'Bad', 'sop', 'free', 'draft',
                     'org-1', 'user-1', 'user-1', '{}', 'yesterday', 'yesterday')",
        )
        .execute(&pool)
        .await
        .expect("raw insert");
        let repo = SqlDocumentRepository::new(pool);

        let error = repo
            .find_by_id(&DocumentId("doc-bad".to_string()))
            .await
            .expect_err("decode should fail");
        assert!(matches!(error, RepositoryError::Decode(message) if message.contains("timestamp")));
    }

    #[tokio::test]
    async fn list_names_for_org_is_newest_first() {
        let pool = setup().await;
        let repo = SqlDocumentRepository::new(pool);

        let mut older = sample_document("doc-1", "key-1", 1);
        older.name = "Older".to_string();
        older.created_at = Utc::now() - Duration::hours(2);
        repo.save(&older).await.expect("save older");

        let mut newer = sample_document("doc-2", "key-2", 1);
        newer.name = "Newer".to_string();
        repo.save(&newer).await.expect("save newer");

        let mut other_org = sample_document("doc-3", "key-3", 1);
        other_org.org_id = OrgId("org-2".to_string());
        repo.save(&other_org).await.expect("save other org");

        let names =
            repo.list_names_for_org(&OrgId("org-1".to_string())).await.expect("list names");
        assert_eq!(names, vec!["Newer".to_string(), "Older".to_string()]);
    }
}
