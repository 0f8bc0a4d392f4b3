pub mod models;
pub mod prediction_repository;

pub use prediction_repository::DynamoDbPredictionStore;

use async_trait::async_trait;
use models::PredictionRecord;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("DynamoDB error: {0}")]
    DynamoDb(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid data format: {0}")]
    InvalidData(String),
}

/// Record store keyed by prediction identity. The pipeline only needs
/// insert/lookup/update semantics; everything else is a collaborator concern.
#[async_trait]
pub trait PredictionStore: Send + Sync {
    /// Inserts the record, or returns the caller's pre-existing record for
    /// the same normalized image hash. Two racing first-time submissions may
    /// both reach this point; reconciling here keeps one identity per image.
    async fn insert_or_existing(
        &self,
        record: &PredictionRecord,
    ) -> Result<PredictionRecord, RepositoryError>;

    async fn get(
        &self,
        caller_id: Uuid,
        id: Uuid,
    ) -> Result<Option<PredictionRecord>, RepositoryError>;

    async fn update(&self, record: &PredictionRecord) -> Result<(), RepositoryError>;
}
