pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use repositories::{
    CatalogRepository, InMemoryStore, JobId, JobQueue, JobState, MessageJob, MessageStore,
    OrderCommitOutcome, OrderStore, RepositoryError, SqlCatalogRepository, SqlJobQueue,
    SqlMessageStore, SqlOrderStore,
};
