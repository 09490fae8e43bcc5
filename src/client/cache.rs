//! Local cache store: last-known-good snapshots plus the durable mutation queue.
//!
//! Snapshot writes are full replacements (last writer wins). Reading a snapshot that was never
//! written yields `None`, not an error.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::models::{Activity, CreateTripRequest, Trip, TripStatistics};

/// Endpoint trip creations are replayed against.
pub const CREATE_TRIP_ENDPOINT: &str = "/trips";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Kind of write recorded while offline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum MutationKind {
    CreateTrip,
}

/// A write attempted while offline, pending replay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueuedMutation {
    pub id: String,
    pub kind: MutationKind,
    pub endpoint: String,
    pub method: String,
    /// The request body as submitted, before any upload rewrote it.
    pub payload: serde_json::Value,
    /// Id of the optimistic local record this write produced, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_id: Option<String>,
    pub queued_at: DateTime<Utc>,
}

impl QueuedMutation {
    /// A pending `POST /trips` carrying the original draft.
    pub fn create_trip(draft: &CreateTripRequest, local_id: &str) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: MutationKind::CreateTrip,
            endpoint: CREATE_TRIP_ENDPOINT.to_string(),
            method: "POST".to_string(),
            payload: serde_json::to_value(draft)?,
            local_id: Some(local_id.to_string()),
            queued_at: Utc::now(),
        })
    }
}

/// Client-local persistent store.
///
/// Each get/set pair covers an independent key, so concurrent operations on different
/// collections never interact.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn cached_trips(&self) -> Result<Option<Vec<Trip>>, CacheError>;
    async fn cache_trips(&self, trips: &[Trip]) -> Result<(), CacheError>;

    async fn cached_activities(&self) -> Result<Option<Vec<Activity>>, CacheError>;
    async fn cache_activities(&self, activities: &[Activity]) -> Result<(), CacheError>;

    async fn cached_statistics(&self) -> Result<Option<TripStatistics>, CacheError>;
    async fn cache_statistics(&self, statistics: &TripStatistics) -> Result<(), CacheError>;

    /// Append to the end of the queue.
    async fn enqueue_mutation(&self, mutation: QueuedMutation) -> Result<(), CacheError>;

    /// Queued mutations, oldest first.
    async fn pending_mutations(&self) -> Result<Vec<QueuedMutation>, CacheError>;

    /// Drop a replayed mutation. Unknown ids are ignored.
    async fn remove_mutation(&self, id: &str) -> Result<(), CacheError>;
}

#[derive(Debug, Default)]
struct MemoryState {
    trips: Option<Vec<Trip>>,
    activities: Option<Vec<Activity>>,
    statistics: Option<TripStatistics>,
    queue: Vec<QueuedMutation>,
}

/// Process-local cache. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryCache {
    state: Mutex<MemoryState>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn cached_trips(&self) -> Result<Option<Vec<Trip>>, CacheError> {
        Ok(self.state.lock().await.trips.clone())
    }

    async fn cache_trips(&self, trips: &[Trip]) -> Result<(), CacheError> {
        self.state.lock().await.trips = Some(trips.to_vec());
        Ok(())
    }

    async fn cached_activities(&self) -> Result<Option<Vec<Activity>>, CacheError> {
        Ok(self.state.lock().await.activities.clone())
    }

    async fn cache_activities(&self, activities: &[Activity]) -> Result<(), CacheError> {
        self.state.lock().await.activities = Some(activities.to_vec());
        Ok(())
    }

    async fn cached_statistics(&self) -> Result<Option<TripStatistics>, CacheError> {
        Ok(self.state.lock().await.statistics)
    }

    async fn cache_statistics(&self, statistics: &TripStatistics) -> Result<(), CacheError> {
        self.state.lock().await.statistics = Some(*statistics);
        Ok(())
    }

    async fn enqueue_mutation(&self, mutation: QueuedMutation) -> Result<(), CacheError> {
        self.state.lock().await.queue.push(mutation);
        Ok(())
    }

    async fn pending_mutations(&self) -> Result<Vec<QueuedMutation>, CacheError> {
        Ok(self.state.lock().await.queue.clone())
    }

    async fn remove_mutation(&self, id: &str) -> Result<(), CacheError> {
        self.state.lock().await.queue.retain(|m| m.id != id);
        Ok(())
    }
}

const TRIPS_FILE: &str = "trips.json";
const ACTIVITIES_FILE: &str = "activities.json";
const STATISTICS_FILE: &str = "statistics.json";
const QUEUE_FILE: &str = "mutations.json";

/// Cache persisted as one JSON document per key inside a directory.
///
/// Documents are replaced atomically, so the queue survives restarts and crashes mid-write.
pub struct FileCache {
    root: PathBuf,
    queue_lock: Mutex<()>,
}

impl FileCache {
    /// Open (and create if needed) a cache directory.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            queue_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, CacheError> {
        let path = self.root.join(name);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        let raw = tokio::fs::read(&path).await?;
        Ok(Some(serde_json::from_slice(&raw)?))
    }

    async fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(value)?;
        crate::db::write_atomic(&self.root.join(name), &bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl CacheStore for FileCache {
    async fn cached_trips(&self) -> Result<Option<Vec<Trip>>, CacheError> {
        self.read_json(TRIPS_FILE).await
    }

    async fn cache_trips(&self, trips: &[Trip]) -> Result<(), CacheError> {
        self.write_json(TRIPS_FILE, trips).await
    }

    async fn cached_activities(&self) -> Result<Option<Vec<Activity>>, CacheError> {
        self.read_json(ACTIVITIES_FILE).await
    }

    async fn cache_activities(&self, activities: &[Activity]) -> Result<(), CacheError> {
        self.write_json(ACTIVITIES_FILE, activities).await
    }

    async fn cached_statistics(&self) -> Result<Option<TripStatistics>, CacheError> {
        self.read_json(STATISTICS_FILE).await
    }

    async fn cache_statistics(&self, statistics: &TripStatistics) -> Result<(), CacheError> {
        self.write_json(STATISTICS_FILE, statistics).await
    }

    async fn enqueue_mutation(&self, mutation: QueuedMutation) -> Result<(), CacheError> {
        let _guard = self.queue_lock.lock().await;
        let mut queue: Vec<QueuedMutation> = self.read_json(QUEUE_FILE).await?.unwrap_or_default();
        queue.push(mutation);
        self.write_json(QUEUE_FILE, &queue).await
    }

    async fn pending_mutations(&self) -> Result<Vec<QueuedMutation>, CacheError> {
        let _guard = self.queue_lock.lock().await;
        Ok(self.read_json(QUEUE_FILE).await?.unwrap_or_default())
    }

    async fn remove_mutation(&self, id: &str) -> Result<(), CacheError> {
        let _guard = self.queue_lock.lock().await;
        let mut queue: Vec<QueuedMutation> = self.read_json(QUEUE_FILE).await?.unwrap_or_default();
        queue.retain(|m| m.id != id);
        self.write_json(QUEUE_FILE, &queue).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn trip(id: &str) -> Trip {
        Trip::from_request(id.to_string(), &CreateTripRequest::default())
    }

    fn draft(title: &str) -> CreateTripRequest {
        CreateTripRequest {
            title: Some(title.to_string()),
            photos: vec!["/tmp/a.jpg".to_string()],
            ..Default::default()
        }
    }

    async fn exercise_snapshots(cache: &dyn CacheStore) {
        assert!(cache.cached_trips().await.unwrap().is_none());
        assert!(cache.cached_activities().await.unwrap().is_none());
        assert!(cache.cached_statistics().await.unwrap().is_none());

        cache.cache_trips(&[trip("a"), trip("b")]).await.unwrap();
        cache.cache_trips(&[trip("c")]).await.unwrap();
        assert_eq!(cache.cached_trips().await.unwrap(), Some(vec![trip("c")]));

        let stats = TripStatistics {
            total_trips: 1,
            total_photos: 4,
            total_countries: 1,
        };
        cache.cache_statistics(&stats).await.unwrap();
        assert_eq!(cache.cached_statistics().await.unwrap(), Some(stats));

        cache.cache_activities(&[]).await.unwrap();
        assert_eq!(cache.cached_activities().await.unwrap(), Some(Vec::new()));
    }

    async fn exercise_queue(cache: &dyn CacheStore) {
        let first = QueuedMutation::create_trip(&draft("first"), "local-1").unwrap();
        let second = QueuedMutation::create_trip(&draft("second"), "local-2").unwrap();
        cache.enqueue_mutation(first.clone()).await.unwrap();
        cache.enqueue_mutation(second.clone()).await.unwrap();

        assert_eq!(
            cache.pending_mutations().await.unwrap(),
            vec![first.clone(), second.clone()]
        );

        cache.remove_mutation(&first.id).await.unwrap();
        cache.remove_mutation("unknown").await.unwrap();
        assert_eq!(cache.pending_mutations().await.unwrap(), vec![second]);
    }

    #[tokio::test]
    async fn test_memory_cache() {
        let cache = MemoryCache::new();
        exercise_snapshots(&cache).await;
        exercise_queue(&cache).await;
    }

    #[tokio::test]
    async fn test_file_cache() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::open(dir.path().join("cache")).await.unwrap();
        exercise_snapshots(&cache).await;
        exercise_queue(&cache).await;
    }

    #[tokio::test]
    async fn test_file_cache_queue_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let mutation = QueuedMutation::create_trip(&draft("kept"), "local-1").unwrap();

        {
            let cache = FileCache::open(dir.path()).await.unwrap();
            cache.enqueue_mutation(mutation.clone()).await.unwrap();
            cache.cache_trips(&[trip("a")]).await.unwrap();
        }

        let reopened = FileCache::open(dir.path()).await.unwrap();
        assert_eq!(reopened.pending_mutations().await.unwrap(), vec![mutation]);
        assert_eq!(reopened.cached_trips().await.unwrap(), Some(vec![trip("a")]));
    }

    #[tokio::test]
    async fn test_file_cache_concurrent_snapshot_writes() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::open(dir.path()).await.unwrap();
        let many: Vec<Trip> = (0..2000).map(|i| trip(&i.to_string())).collect();
        let few = vec![trip("only")];

        let (a, b) = tokio::join!(cache.cache_trips(&many), cache.cache_trips(&few));
        a.unwrap();
        b.unwrap();

        let cached = cache.cached_trips().await.unwrap().unwrap();
        assert!(cached == many || cached == few);
    }

    #[test]
    fn test_create_trip_mutation_shape() {
        let mutation = QueuedMutation::create_trip(&draft("Rome"), "local-xyz").unwrap();
        assert_eq!(mutation.kind, MutationKind::CreateTrip);
        assert_eq!(mutation.endpoint, "/trips");
        assert_eq!(mutation.method, "POST");
        assert_eq!(mutation.local_id.as_deref(), Some("local-xyz"));
        assert_eq!(mutation.payload["title"], "Rome");
        assert_eq!(mutation.payload["photos"][0], "/tmp/a.jpg");

        let json = serde_json::to_value(&mutation).unwrap();
        assert_eq!(json["kind"], "create-trip");
    }
}
