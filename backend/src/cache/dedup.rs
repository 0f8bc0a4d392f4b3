use chrono::{DateTime, Duration, Utc};
use shared::PredictionResponse;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

struct CachedPrediction {
    response: PredictionResponse,
    stored_at: DateTime<Utc>,
}

/// Short-TTL cache keyed by `(normalized image hash, caller)`. A hit returns
/// the fully assembled response without touching either model. There is no
/// cross-process coordination; two racing first-time submissions are
/// reconciled by the store, not here.
pub struct DedupCache {
    ttl: Duration,
    entries: Mutex<HashMap<(String, Uuid), CachedPrediction>>,
}

impl DedupCache {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_secs),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, image_hash: &str, caller_id: Uuid) -> Option<PredictionResponse> {
        let mut entries = self.entries.lock().unwrap();
        let key = (image_hash.to_string(), caller_id);
        match entries.get(&key) {
            Some(entry) if Utc::now() - entry.stored_at < self.ttl => {
                Some(entry.response.clone())
            }
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, image_hash: String, caller_id: Uuid, response: PredictionResponse) {
        let now = Utc::now();
        let mut entries = self.entries.lock().unwrap();
        // Expired entries only ever accumulate between inserts, so sweep them
        // while the lock is held anyway.
        entries.retain(|_, entry| now - entry.stored_at < self.ttl);
        entries.insert(
            (image_hash, caller_id),
            CachedPrediction {
                response,
                stored_at: now,
            },
        );
    }
}
