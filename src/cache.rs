//! Content-addressed review-result cache (spec.md §4.4, §6).
//!
//! Grounded in `selvage/src/cache/cache_manager.py` +
//! `cache_key_generator.py` + `cache/models.py`. Directory resolution follows
//! the teacher's platform-config-dir convention via the `dirs` crate.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::{EstimatedCost, ReviewRequest, ReviewResponse};

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not determine platform config directory")]
    NoConfigDir,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub cache_key: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub request_info: BTreeMap<String, serde_json::Value>,
    pub review_response: ReviewResponse,
    pub estimated_cost: Option<EstimatedCost>,
    pub log_id: Option<String>,
}

pub struct Cache {
    dir: PathBuf,
    ttl: Duration,
}

/// `sha256(utf8(json(sorted({"diff_content": S, "model": M,
/// "use_full_context": B}), ensure_ascii=false)))`, lowercase hex, 64 chars
/// (spec.md §6, grounded in `CacheKeyGenerator.generate_cache_key`).
pub fn cache_key(request: &ReviewRequest) -> String {
    let mut key_data = serde_json::Map::new();
    key_data.insert("diff_content".to_string(), serde_json::Value::String(request.diff_content.clone()));
    key_data.insert("model".to_string(), serde_json::Value::String(request.model.clone()));
    key_data.insert("use_full_context".to_string(), serde_json::Value::Bool(request.use_full_context));

    // BTreeMap sorts keys; re-derive a sorted Value so the serialized form is
    // canonical regardless of the `preserve_order` feature on `serde_json`.
    let sorted: BTreeMap<String, serde_json::Value> = key_data.into_iter().collect();
    let canonical = serde_json::to_string(&sorted).expect("cache key map always serializes");

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

impl Cache {
    pub fn new(dir: PathBuf, ttl_hours: i64) -> Self {
        Self { dir, ttl: Duration::hours(ttl_hours) }
    }

    /// Resolves the platform-standard per-user config directory's `cache/`
    /// subdirectory (spec.md §6), defaulting TTL to 1 hour.
    pub fn from_platform_dir(app_name: &str) -> Result<Self, CacheError> {
        let base = dirs::config_dir().ok_or(CacheError::NoConfigDir)?;
        let dir = base.join(app_name).join("cache");
        Ok(Self::new(dir, 1))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn ensure_dir(&self) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    /// `get(request) -> (ReviewResponse, EstimatedCost)?`. A missing file, an
    /// unparseable file, or an expired entry is a miss; an expired entry's
    /// file is also deleted.
    pub fn get(&self, request: &ReviewRequest) -> Option<(ReviewResponse, Option<EstimatedCost>)> {
        let key = cache_key(request);
        let path = self.path_for(&key);

        let raw = std::fs::read_to_string(&path).ok()?;
        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(_) => return None,
        };

        if Utc::now() > entry.expires_at {
            let _ = std::fs::remove_file(&path);
            return None;
        }

        Some((entry.review_response, entry.estimated_cost))
    }

    pub fn put(
        &self,
        request: &ReviewRequest,
        response: &ReviewResponse,
        cost: Option<&EstimatedCost>,
        log_id: Option<String>,
    ) -> Result<(), CacheError> {
        self.ensure_dir()?;
        let key = cache_key(request);
        let created_at = Utc::now();

        let mut request_info = BTreeMap::new();
        request_info.insert("model".to_string(), serde_json::Value::String(request.model.clone()));
        request_info.insert(
            "use_full_context".to_string(),
            serde_json::Value::Bool(request.use_full_context),
        );

        let entry = CacheEntry {
            cache_key: key.clone(),
            created_at,
            expires_at: created_at + self.ttl,
            request_info,
            review_response: response.clone(),
            estimated_cost: cost.cloned(),
            log_id,
        };

        let pretty = serde_json::to_string_pretty(&entry).expect("CacheEntry always serializes");
        std::fs::write(self.path_for(&key), pretty)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<(), CacheError> {
        if !self.dir.exists() {
            return Ok(());
        }
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if is_cache_json(&entry.path()) {
                let _ = std::fs::remove_file(entry.path());
            }
        }
        Ok(())
    }

    /// Scans the directory, deleting every entry that fails to parse or has
    /// already expired.
    pub fn cleanup_expired(&self) -> Result<usize, CacheError> {
        if !self.dir.exists() {
            return Ok(0);
        }
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if !is_cache_json(&path) {
                continue;
            }
            let should_remove = match std::fs::read_to_string(&path) {
                Ok(raw) => match serde_json::from_str::<CacheEntry>(&raw) {
                    Ok(parsed) => Utc::now() > parsed.expires_at,
                    Err(_) => true,
                },
                Err(_) => true,
            };
            if should_remove {
                let _ = std::fs::remove_file(&path);
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn is_cache_json(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("json")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> ReviewRequest {
        ReviewRequest {
            diff_content: "+x=1\n".to_string(),
            model: "gpt-4o".to_string(),
            use_full_context: true,
            file_paths: vec![],
        }
    }

    fn sample_response() -> ReviewResponse {
        ReviewResponse { issues: vec![], summary: "ok".to_string(), score: Some(9.0), recommendations: vec![] }
    }

    #[test]
    fn cache_key_is_deterministic_and_sorted() {
        let a = sample_request();
        let mut b = sample_request();
        // field order in construction must not matter
        b.model = a.model.clone();
        assert_eq!(cache_key(&a), cache_key(&b));
    }

    #[test]
    fn cache_key_changes_with_any_field() {
        let a = sample_request();
        let mut b = sample_request();
        b.use_full_context = false;
        assert_ne!(cache_key(&a), cache_key(&b));
    }

    #[test]
    fn miss_then_hit_after_put() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = Cache::new(tmp.path().to_path_buf(), 1);
        let req = sample_request();

        assert!(cache.get(&req).is_none());

        let cost = EstimatedCost::zero("gpt-4o", 10, 5);
        cache.put(&req, &sample_response(), Some(&cost), None).unwrap();

        let (resp, got_cost) = cache.get(&req).unwrap();
        assert_eq!(resp.summary, "ok");
        assert_eq!(got_cost.unwrap().input_tokens, 10);
    }

    #[test]
    fn expired_entry_is_miss_and_deletes_file() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = Cache::new(tmp.path().to_path_buf(), 1);
        let req = sample_request();
        cache.put(&req, &sample_response(), None, None).unwrap();

        let key = cache_key(&req);
        let path = tmp.path().join(format!("{key}.json"));
        let raw = std::fs::read_to_string(&path).unwrap();
        let mut entry: CacheEntry = serde_json::from_str(&raw).unwrap();
        entry.expires_at = Utc::now() - Duration::hours(2);
        std::fs::write(&path, serde_json::to_string_pretty(&entry).unwrap()).unwrap();

        assert!(cache.get(&req).is_none());
        assert!(!path.exists());
    }

    #[test]
    fn corrupted_entry_is_treated_as_expired() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = Cache::new(tmp.path().to_path_buf(), 1);
        let req = sample_request();
        std::fs::create_dir_all(tmp.path()).unwrap();
        let key = cache_key(&req);
        std::fs::write(tmp.path().join(format!("{key}.json")), "{not valid json").unwrap();

        assert!(cache.get(&req).is_none());
    }

    #[test]
    fn clear_removes_all_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = Cache::new(tmp.path().to_path_buf(), 1);
        cache.put(&sample_request(), &sample_response(), None, None).unwrap();
        cache.clear().unwrap();
        assert!(cache.get(&sample_request()).is_none());
    }
}
