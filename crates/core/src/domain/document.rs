use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::block::Block;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

/// Stable identifier shared across versions of conceptually the same document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentKey(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrgId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Sop,
    Procedure,
    Workflow,
    Checklist,
    Manual,
    Policy,
    Guideline,
    Template,
    Other,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sop => "sop",
            Self::Procedure => "procedure",
            Self::Workflow => "workflow",
            Self::Checklist => "checklist",
            Self::Manual => "manual",
            Self::Policy => "policy",
            Self::Guideline => "guideline",
            Self::Template => "template",
            Self::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "sop" => Ok(Self::Sop),
            "procedure" => Ok(Self::Procedure),
            "workflow" => Ok(Self::Workflow),
            "checklist" => Ok(Self::Checklist),
            "manual" => Ok(Self::Manual),
            "policy" => Ok(Self::Policy),
            "guideline" => Ok(Self::Guideline),
            "template" => Ok(Self::Template),
            "other" => Ok(Self::Other),
            other => Err(DomainError::UnknownDocumentType(other.to_owned())),
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gates feature availability at the product level; the core never enforces it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentTier {
    Free,
    Pro,
    Enterprise,
    Custom,
}

impl DocumentTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
            Self::Custom => "custom",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "pro" => Self::Pro,
            "enterprise" => Self::Enterprise,
            "custom" => Self::Custom,
            _ => Self::Free,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    ToUser,
    ToReviewer,
    ToLayReviewer,
    Approved,
    Published,
    Deleted,
    Archived,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::ToUser => "to_user",
            Self::ToReviewer => "to_reviewer",
            Self::ToLayReviewer => "to_lay_reviewer",
            Self::Approved => "approved",
            Self::Published => "published",
            Self::Deleted => "deleted",
            Self::Archived => "archived",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "to_user" => Self::ToUser,
            "to_reviewer" => Self::ToReviewer,
            "to_lay_reviewer" => Self::ToLayReviewer,
            "approved" => Self::Approved,
            "published" => Self::Published,
            "deleted" => Self::Deleted,
            "archived" => Self::Archived,
            _ => Self::Draft,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub document_key: DocumentKey,
    pub version: i64,
    pub name: String,
    pub document_type: DocumentType,
    pub tier: DocumentTier,
    pub status: DocumentStatus,
    pub org_id: OrgId,
    pub created_by: UserId,
    pub updated_by: UserId,
    pub metadata: BTreeMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub blocks: Vec<Block>,
}

impl Document {
    /// Review lifecycle moves forward only; deletion and archival are
    /// status transitions, never row removal.
    pub fn can_transition_to(&self, next: DocumentStatus) -> bool {
        use DocumentStatus::{
            Approved, Archived, Deleted, Draft, Published, ToLayReviewer, ToReviewer, ToUser,
        };
        matches!(
            (self.status, next),
            (Draft, ToUser)
                | (ToUser, ToReviewer)
                | (ToReviewer, ToLayReviewer)
                | (ToReviewer, Approved)
                | (ToLayReviewer, Approved)
                | (Approved, Published)
                | (_, Deleted)
                | (_, Archived)
        )
    }

    pub fn transition_to(&mut self, next: DocumentStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }
        Err(DomainError::InvalidStatusTransition { from: self.status, to: next })
    }

    pub fn block_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_active).count()
    }
}
