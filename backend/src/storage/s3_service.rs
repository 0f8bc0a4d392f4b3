use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use uuid::Uuid;

use super::{ImageStore, StorageError};

#[derive(Clone)]
pub struct S3ImageStore {
    client: Client,
    bucket_name: String,
}

impl S3ImageStore {
    pub fn new(client: Client, bucket_name: String) -> Self {
        Self {
            client,
            bucket_name,
        }
    }

    /// Keys are hash-addressed per caller, so re-uploads of the same
    /// normalized image overwrite in place instead of accumulating.
    fn object_key(caller_id: Uuid, image_hash: &str) -> String {
        format!("predictions/{}/{}.jpg", caller_id, image_hash)
    }
}

#[async_trait]
impl ImageStore for S3ImageStore {
    async fn store_image(
        &self,
        caller_id: Uuid,
        image_hash: &str,
        bytes: &[u8],
    ) -> Result<String, StorageError> {
        let key = Self::object_key(caller_id, image_hash);
        let body = ByteStream::from(bytes.to_vec());

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .body(body)
            .content_type("image/jpeg")
            .send()
            .await
            .map_err(|e| StorageError::S3(e.to_string()))?;

        Ok(format!("s3://{}/{}", self.bucket_name, key))
    }
}
