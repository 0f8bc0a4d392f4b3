use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

use super::models::PredictionRecord;
use super::{PredictionStore, RepositoryError};
use shared::{FinalStatus, ImageSource, WorkflowStep};

/// DynamoDB-backed prediction store. The table is keyed by the prediction
/// `id`; duplicate-submission reconciliation goes through a filtered scan on
/// `(caller_id, image_hash)`.
#[derive(Clone)]
pub struct DynamoDbPredictionStore {
    client: Client,
    table: String,
}

impl DynamoDbPredictionStore {
    pub fn new(client: Client, table: String) -> Self {
        Self { client, table }
    }

    async fn find_by_hash(
        &self,
        caller_id: Uuid,
        image_hash: &str,
    ) -> Result<Option<PredictionRecord>, RepositoryError> {
        let result = self
            .client
            .scan()
            .table_name(&self.table)
            .filter_expression("caller_id = :caller_id AND image_hash = :image_hash")
            .expression_attribute_values(":caller_id", AttributeValue::S(caller_id.to_string()))
            .expression_attribute_values(":image_hash", AttributeValue::S(image_hash.to_string()))
            .send()
            .await
            .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

        if let Some(items) = result.items {
            if let Some(item) = items.into_iter().next() {
                return Ok(Some(parse_record_from_item(item)?));
            }
        }
        Ok(None)
    }

    async fn put_record(&self, record: &PredictionRecord) -> Result<(), RepositoryError> {
        let mut item = HashMap::new();
        item.insert("id".to_string(), AttributeValue::S(record.id.to_string()));
        item.insert(
            "caller_id".to_string(),
            AttributeValue::S(record.caller_id.to_string()),
        );
        item.insert(
            "image_hash".to_string(),
            AttributeValue::S(record.image_hash.clone()),
        );
        item.insert(
            "image_size".to_string(),
            AttributeValue::N(record.image_size.to_string()),
        );
        item.insert(
            "image_source".to_string(),
            AttributeValue::S(record.image_source.to_string()),
        );
        if let Some(image_path) = &record.image_path {
            item.insert(
                "image_path".to_string(),
                AttributeValue::S(image_path.clone()),
            );
        }
        // Structured blobs cross the persistence boundary as JSON strings;
        // internal stages only ever see the typed forms.
        item.insert(
            "classification".to_string(),
            AttributeValue::S(serde_json::to_string(&record.classification)?),
        );
        if let Some(detections) = &record.detections {
            item.insert(
                "detections".to_string(),
                AttributeValue::S(serde_json::to_string(detections)?),
            );
        }
        item.insert(
            "workflow_step".to_string(),
            AttributeValue::S(record.workflow_step.to_string()),
        );
        item.insert(
            "final_status".to_string(),
            AttributeValue::S(record.final_status.to_string()),
        );
        if let Some(crop_coordinates) = &record.crop_coordinates {
            item.insert(
                "crop_coordinates".to_string(),
                AttributeValue::S(serde_json::to_string(crop_coordinates)?),
            );
        }
        item.insert(
            "processing_time_ms".to_string(),
            AttributeValue::N(record.processing_time_ms.to_string()),
        );
        item.insert(
            "created_at".to_string(),
            AttributeValue::S(record.created_at.to_rfc3339()),
        );
        item.insert(
            "updated_at".to_string(),
            AttributeValue::S(record.updated_at.to_rfc3339()),
        );

        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl PredictionStore for DynamoDbPredictionStore {
    async fn insert_or_existing(
        &self,
        record: &PredictionRecord,
    ) -> Result<PredictionRecord, RepositoryError> {
        if let Some(existing) = self.find_by_hash(record.caller_id, &record.image_hash).await? {
            log::info!(
                "prediction for hash {} already stored as {}, reusing",
                &record.image_hash[..8.min(record.image_hash.len())],
                existing.id
            );
            return Ok(existing);
        }

        self.put_record(record).await?;
        Ok(record.clone())
    }

    async fn get(
        &self,
        caller_id: Uuid,
        id: Uuid,
    ) -> Result<Option<PredictionRecord>, RepositoryError> {
        let mut key = HashMap::new();
        key.insert("id".to_string(), AttributeValue::S(id.to_string()));

        let result = self
            .client
            .get_item()
            .table_name(&self.table)
            .set_key(Some(key))
            .send()
            .await
            .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

        match result.item {
            Some(item) => {
                let record = parse_record_from_item(item)?;
                // Records are caller-owned; a foreign id behaves like a miss.
                if record.caller_id != caller_id {
                    return Ok(None);
                }
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn update(&self, record: &PredictionRecord) -> Result<(), RepositoryError> {
        self.put_record(record).await
    }
}

fn parse_record_from_item(
    item: HashMap<String, AttributeValue>,
) -> Result<PredictionRecord, RepositoryError> {
    let id = item
        .get("id")
        .and_then(|v| v.as_s().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| RepositoryError::InvalidData("Invalid id".to_string()))?;

    let caller_id = item
        .get("caller_id")
        .and_then(|v| v.as_s().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| RepositoryError::InvalidData("Invalid caller_id".to_string()))?;

    let image_hash = item
        .get("image_hash")
        .and_then(|v| v.as_s().ok())
        .ok_or_else(|| RepositoryError::InvalidData("Invalid image_hash".to_string()))?
        .clone();

    let image_size = item
        .get("image_size")
        .and_then(|v| v.as_n().ok())
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| RepositoryError::InvalidData("Invalid image_size".to_string()))?;

    let image_source = item
        .get("image_source")
        .and_then(|v| v.as_s().ok())
        .and_then(|s| ImageSource::from_str(s).ok())
        .ok_or_else(|| RepositoryError::InvalidData("Invalid image_source".to_string()))?;

    let image_path = item
        .get("image_path")
        .and_then(|v| v.as_s().ok())
        .cloned();

    let classification = item
        .get("classification")
        .and_then(|v| v.as_s().ok())
        .map(|s| serde_json::from_str(s))
        .transpose()?
        .ok_or_else(|| RepositoryError::InvalidData("Invalid classification".to_string()))?;

    let detections = item
        .get("detections")
        .and_then(|v| v.as_s().ok())
        .map(|s| serde_json::from_str(s))
        .transpose()?;

    let workflow_step = item
        .get("workflow_step")
        .and_then(|v| v.as_s().ok())
        .and_then(|s| WorkflowStep::from_str(s).ok())
        .ok_or_else(|| RepositoryError::InvalidData("Invalid workflow_step".to_string()))?;

    let final_status = item
        .get("final_status")
        .and_then(|v| v.as_s().ok())
        .and_then(|s| FinalStatus::from_str(s).ok())
        .ok_or_else(|| RepositoryError::InvalidData("Invalid final_status".to_string()))?;

    let crop_coordinates = item
        .get("crop_coordinates")
        .and_then(|v| v.as_s().ok())
        .map(|s| serde_json::from_str(s))
        .transpose()?;

    let processing_time_ms = item
        .get("processing_time_ms")
        .and_then(|v| v.as_n().ok())
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(0);

    let created_at = item
        .get("created_at")
        .and_then(|v| v.as_s().ok())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| RepositoryError::InvalidData("Invalid created_at".to_string()))?;

    let updated_at = item
        .get("updated_at")
        .and_then(|v| v.as_s().ok())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| RepositoryError::InvalidData("Invalid updated_at".to_string()))?;

    Ok(PredictionRecord {
        id,
        caller_id,
        image_hash,
        image_size,
        image_source,
        image_path,
        classification,
        detections,
        workflow_step,
        final_status,
        crop_coordinates,
        processing_time_ms,
        created_at,
        updated_at,
    })
}
