pub mod connection;
#[cfg(test)]
pub mod fixtures;
pub mod migrations;
pub mod repositories;
pub mod service;

pub use connection::{connect, connect_with_settings, DbPool};
pub use repositories::{
    BlockRepository, DocumentRepository, RepositoryError, SqlBlockRepository,
    SqlDocumentRepository,
};
pub use service::{BlockService, ReorderEntry, ServiceError};
