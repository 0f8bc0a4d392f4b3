pub mod s3_service;

pub use s3_service::S3ImageStore;

use async_trait::async_trait;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 error: {0}")]
    S3(String),
}

/// Blob storage seam for normalized image bytes. The pipeline only cares that
/// stored bytes get an addressable location back.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn store_image(
        &self,
        caller_id: Uuid,
        image_hash: &str,
        bytes: &[u8],
    ) -> Result<String, StorageError>;
}
