//! Offline-aware repository.
//!
//! Reads never fail from the caller's point of view: when offline, or when the remote call
//! fails in transport or parsing, they serve the cached snapshot tagged with status 500.
//! Trip creation either completes online, is queued offline, or returns the error; a partial
//! online failure is never silently queued.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::{
    CacheError, CacheStore, ClientError, ConnectivityOracle, MutationKind, QueuedMutation,
    RemoteDataService, RemoteResponse,
};
use crate::models::{Activity, CreateTripRequest, Trip, TripStatistics};

/// Status attached to results served from the cache.
pub const FALLBACK_STATUS: u16 = 500;

/// Prefix of ids assigned to trips created while offline.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Number of trips in the upcoming listing.
pub const UPCOMING_LIMIT: usize = 3;

/// A read result: fresh data with the server status, or cached data with [`FALLBACK_STATUS`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReadResult<T> {
    pub status: u16,
    pub data: T,
}

impl<T> ReadResult<T> {
    pub fn is_fallback(&self) -> bool {
        self.status == FALLBACK_STATUS
    }
}

/// How a trip creation was handled.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateTripOutcome {
    /// Created on the server.
    Created(Trip),
    /// Queued for replay; the trip carries a local id.
    Queued { trip: Trip, mutation_id: String },
}

impl CreateTripOutcome {
    pub fn trip(&self) -> &Trip {
        match self {
            CreateTripOutcome::Created(trip) | CreateTripOutcome::Queued { trip, .. } => trip,
        }
    }

    pub fn into_trip(self) -> Trip {
        match self {
            CreateTripOutcome::Created(trip) | CreateTripOutcome::Queued { trip, .. } => trip,
        }
    }
}

/// A queued trip that reached the server during replay.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub mutation_id: String,
    /// The optimistic id the caller was given while offline.
    pub local_id: Option<String>,
    pub trip: Trip,
}

/// Result of draining the mutation queue.
#[derive(Debug, Default)]
pub struct ReplayReport {
    pub reconciled: Vec<Reconciled>,
    /// Entries still queued after this pass.
    pub remaining: usize,
    /// Why the pass stopped early, if it did.
    pub failure: Option<ClientError>,
}

impl ReplayReport {
    pub fn is_empty(&self) -> bool {
        self.reconciled.is_empty() && self.remaining == 0
    }

    /// Server id assigned to a locally created trip.
    pub fn server_id_for(&self, local_id: &str) -> Option<&str> {
        self.reconciled
            .iter()
            .find(|r| r.local_id.as_deref() == Some(local_id))
            .map(|r| r.trip.id.as_str())
    }
}

/// Whether an id was generated locally rather than by the server.
pub fn is_local_id(id: &str) -> bool {
    id.starts_with(LOCAL_ID_PREFIX)
}

/// Repository mediating between callers, the backend and the local cache.
pub struct OfflineRepository {
    remote: Arc<dyn RemoteDataService>,
    cache: Arc<dyn CacheStore>,
    connectivity: Arc<dyn ConnectivityOracle>,
    replay_lock: Mutex<()>,
}

impl OfflineRepository {
    pub fn new(
        remote: Arc<dyn RemoteDataService>,
        cache: Arc<dyn CacheStore>,
        connectivity: Arc<dyn ConnectivityOracle>,
    ) -> Self {
        Self {
            remote,
            cache,
            connectivity,
            replay_lock: Mutex::new(()),
        }
    }

    pub async fn is_online(&self) -> bool {
        self.connectivity.is_online().await
    }

    // ==================== READS ====================

    /// All trips. A successful fetch replaces the cached snapshot.
    pub async fn trips(&self) -> ReadResult<Vec<Trip>> {
        match self.fetch("trips", self.remote.fetch_trips()).await {
            Some(resp) => {
                if let (true, Some(trips)) = (resp.is_success(), &resp.data) {
                    log_cache_write("trips", self.cache.cache_trips(trips).await);
                }
                fresh(resp)
            }
            None => fallback(
                self.cached("trips", self.cache.cached_trips())
                    .await
                    .unwrap_or_default(),
            ),
        }
    }

    /// The first trips of the collection in source order. Does not touch the cache.
    pub async fn upcoming_trips(&self) -> ReadResult<Vec<Trip>> {
        match self.fetch("upcoming trips", self.remote.fetch_upcoming_trips()).await {
            Some(resp) => {
                let mut result = fresh(resp);
                result.data.truncate(UPCOMING_LIMIT);
                result
            }
            None => {
                let mut cached = self
                    .cached("trips", self.cache.cached_trips())
                    .await
                    .unwrap_or_default();
                cached.truncate(UPCOMING_LIMIT);
                fallback(cached)
            }
        }
    }

    /// Trip statistics. The offline default is `None`.
    pub async fn statistics(&self) -> ReadResult<Option<TripStatistics>> {
        match self.fetch("statistics", self.remote.fetch_statistics()).await {
            Some(resp) => {
                if let (true, Some(stats)) = (resp.is_success(), &resp.data) {
                    log_cache_write("statistics", self.cache.cache_statistics(stats).await);
                }
                ReadResult {
                    status: resp.status,
                    data: resp.data,
                }
            }
            None => fallback(self.cached("statistics", self.cache.cached_statistics()).await),
        }
    }

    /// The activity feed. A successful fetch replaces the cached snapshot.
    pub async fn activities(&self) -> ReadResult<Vec<Activity>> {
        match self.fetch("activities", self.remote.fetch_activities()).await {
            Some(resp) => {
                if let (true, Some(activities)) = (resp.is_success(), &resp.data) {
                    log_cache_write("activities", self.cache.cache_activities(activities).await);
                }
                fresh(resp)
            }
            None => fallback(
                self.cached("activities", self.cache.cached_activities())
                    .await
                    .unwrap_or_default(),
            ),
        }
    }

    /// A single trip. Offline, it is looked up in the cached trip snapshot.
    pub async fn trip(&self, id: &str) -> ReadResult<Option<Trip>> {
        match self.fetch("trip", self.remote.fetch_trip(id)).await {
            Some(resp) => ReadResult {
                status: resp.status,
                data: resp.data,
            },
            None => fallback(
                self.cached("trips", self.cache.cached_trips())
                    .await
                    .and_then(|trips| trips.into_iter().find(|t| t.id == id)),
            ),
        }
    }

    /// Run a remote read if online. `None` means "serve the cache".
    async fn fetch<T>(
        &self,
        what: &str,
        call: impl Future<Output = Result<RemoteResponse<T>, ClientError>>,
    ) -> Option<RemoteResponse<T>> {
        if !self.connectivity.is_online().await {
            tracing::debug!("Offline, serving cached {}", what);
            return None;
        }

        match call.await {
            Ok(resp) => Some(resp),
            Err(e) => {
                tracing::warn!("Fetching {} failed, serving cached copy: {}", what, e);
                None
            }
        }
    }

    /// Read a snapshot; an unreadable cache counts as empty.
    async fn cached<T>(
        &self,
        what: &str,
        read: impl Future<Output = Result<Option<T>, CacheError>>,
    ) -> Option<T> {
        match read.await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Cached {} unreadable: {}", what, e);
                None
            }
        }
    }

    // ==================== WRITES ====================

    /// Create a trip. See [`OfflineRepository::create_trip_with`].
    pub async fn create_trip(
        &self,
        draft: CreateTripRequest,
    ) -> Result<CreateTripOutcome, ClientError> {
        self.create_trip_with(draft, |_| {}).await
    }

    /// Create a trip, calling `on_success` with the server copy when it is created online.
    ///
    /// Online: every photo is uploaded in order, the first upload becomes the cover image,
    /// then the trip is submitted with the uploaded URLs. Any failure is returned.
    /// Offline: the original draft is queued and a trip with a local id is returned.
    pub async fn create_trip_with<F>(
        &self,
        draft: CreateTripRequest,
        on_success: F,
    ) -> Result<CreateTripOutcome, ClientError>
    where
        F: FnOnce(&Trip) + Send,
    {
        if self.connectivity.is_online().await {
            let trip = self.create_online(&draft).await?;
            on_success(&trip);
            return Ok(CreateTripOutcome::Created(trip));
        }

        let local_id = format!("{}{}", LOCAL_ID_PREFIX, uuid::Uuid::new_v4());
        let mutation = QueuedMutation::create_trip(&draft, &local_id)?;
        let mutation_id = mutation.id.clone();
        self.cache.enqueue_mutation(mutation).await?;
        tracing::info!("Offline, queued trip creation as {}", local_id);

        Ok(CreateTripOutcome::Queued {
            trip: Trip::from_request(local_id, &draft),
            mutation_id,
        })
    }

    async fn create_online(&self, draft: &CreateTripRequest) -> Result<Trip, ClientError> {
        let mut uploaded = Vec::with_capacity(draft.photos.len());
        for photo in &draft.photos {
            uploaded.push(self.remote.upload_image(photo).await?);
        }

        let mut payload = draft.clone();
        if let Some(cover) = uploaded.first() {
            payload.image = Some(cover.clone());
        }
        payload.photos = uploaded;

        self.remote.create_trip(&payload).await
    }

    // ==================== REPLAY ====================

    /// Replay queued mutations oldest first, each at most once.
    ///
    /// An entry leaves the queue only after the server accepted it. The first failure stops
    /// the pass and leaves that entry and everything after it queued. Does nothing offline.
    pub async fn replay_pending(&self) -> Result<ReplayReport, ClientError> {
        let _guard = self.replay_lock.lock().await;

        let pending = self.cache.pending_mutations().await?;
        let mut report = ReplayReport {
            remaining: pending.len(),
            ..Default::default()
        };
        if pending.is_empty() || !self.connectivity.is_online().await {
            return Ok(report);
        }

        tracing::info!("Replaying {} queued mutations", pending.len());
        for mutation in pending {
            let result = match mutation.kind {
                MutationKind::CreateTrip => self.replay_create(&mutation).await,
            };

            match result {
                Ok(trip) => {
                    self.cache.remove_mutation(&mutation.id).await?;
                    report.remaining -= 1;
                    tracing::info!(
                        "Replayed {} as trip {} (was {:?})",
                        mutation.id,
                        trip.id,
                        mutation.local_id
                    );
                    report.reconciled.push(Reconciled {
                        mutation_id: mutation.id,
                        local_id: mutation.local_id,
                        trip,
                    });
                }
                Err(e) => {
                    tracing::warn!("Replay of {} failed, stopping: {}", mutation.id, e);
                    report.failure = Some(e);
                    break;
                }
            }
        }

        Ok(report)
    }

    async fn replay_create(&self, mutation: &QueuedMutation) -> Result<Trip, ClientError> {
        let draft: CreateTripRequest = serde_json::from_value(mutation.payload.clone())?;
        self.create_online(&draft).await
    }
}

/// Replay the queue on every offline-to-online transition, polling the oracle.
///
/// Starting while online counts as a transition. A replay that leaves entries behind is retried
/// on the next tick while still online. Abort the handle to stop.
pub fn spawn_replay_on_reconnect(
    repository: Arc<OfflineRepository>,
    poll_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        let mut was_online = false;

        loop {
            ticker.tick().await;
            let online = repository.is_online().await;

            if online && !was_online {
                // The edge completes only once the queue is drained.
                was_online = match repository.replay_pending().await {
                    Ok(report) => {
                        if !report.is_empty() {
                            tracing::info!(
                                "Reconnect replay: {} reconciled, {} remaining",
                                report.reconciled.len(),
                                report.remaining
                            );
                        }
                        report.failure.is_none() && report.remaining == 0
                    }
                    Err(e) => {
                        tracing::warn!("Reconnect replay failed: {}", e);
                        false
                    }
                };
            } else {
                was_online = online;
            }
        }
    })
}

fn fresh<T: Default>(resp: RemoteResponse<T>) -> ReadResult<T> {
    ReadResult {
        status: resp.status,
        data: resp.data.unwrap_or_default(),
    }
}

fn fallback<T>(data: T) -> ReadResult<T> {
    ReadResult {
        status: FALLBACK_STATUS,
        data,
    }
}

fn log_cache_write(what: &str, result: Result<(), CacheError>) {
    if let Err(e) = result {
        tracing::warn!("Failed to cache {}: {}", what, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MemoryCache, StaticConnectivity};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    /// Scripted backend double.
    #[derive(Default)]
    struct FakeRemote {
        trips: StdMutex<Vec<Trip>>,
        fail_reads: AtomicBool,
        read_status: StdMutex<Option<u16>>,
        fail_uploads_after: StdMutex<Option<usize>>,
        fail_create: AtomicBool,
        uploads: AtomicUsize,
        created: StdMutex<Vec<CreateTripRequest>>,
    }

    impl FakeRemote {
        fn with_trips(trips: Vec<Trip>) -> Self {
            let remote = Self::default();
            *remote.trips.lock().unwrap() = trips;
            remote
        }

        fn read<T>(&self, data: T) -> Result<RemoteResponse<T>, ClientError> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(ClientError::Json(
                    serde_json::from_str::<serde_json::Value>("{").unwrap_err(),
                ));
            }
            match *self.read_status.lock().unwrap() {
                Some(status) => Ok(RemoteResponse::status(status)),
                None => Ok(RemoteResponse::ok(data)),
            }
        }
    }

    #[async_trait]
    impl RemoteDataService for FakeRemote {
        async fn fetch_trips(&self) -> Result<RemoteResponse<Vec<Trip>>, ClientError> {
            let trips = self.trips.lock().unwrap().clone();
            self.read(trips)
        }

        async fn fetch_upcoming_trips(&self) -> Result<RemoteResponse<Vec<Trip>>, ClientError> {
            let trips = self.trips.lock().unwrap().iter().take(3).cloned().collect();
            self.read(trips)
        }

        async fn fetch_trip(&self, id: &str) -> Result<RemoteResponse<Trip>, ClientError> {
            let found = self.trips.lock().unwrap().iter().find(|t| t.id == id).cloned();
            match found {
                Some(trip) => self.read(trip),
                None => Ok(RemoteResponse::status(404)),
            }
        }

        async fn fetch_statistics(&self) -> Result<RemoteResponse<TripStatistics>, ClientError> {
            let stats = TripStatistics::from_trips(&self.trips.lock().unwrap());
            self.read(stats)
        }

        async fn fetch_activities(&self) -> Result<RemoteResponse<Vec<Activity>>, ClientError> {
            self.read(vec![Activity {
                kind: "trip".to_string(),
                description: "Created a trip".to_string(),
                time: "now".to_string(),
            }])
        }

        async fn upload_image(&self, photo: &str) -> Result<String, ClientError> {
            let n = self.uploads.fetch_add(1, Ordering::SeqCst);
            if let Some(limit) = *self.fail_uploads_after.lock().unwrap() {
                if n >= limit {
                    return Err(ClientError::Status {
                        status: 500,
                        message: "upload failed".to_string(),
                    });
                }
            }
            Ok(format!("http://remote/uploads/{}-{}", n, photo.trim_start_matches('/')))
        }

        async fn create_trip(&self, trip: &CreateTripRequest) -> Result<Trip, ClientError> {
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(ClientError::Status {
                    status: 500,
                    message: "create failed".to_string(),
                });
            }
            self.created.lock().unwrap().push(trip.clone());
            let created = Trip::from_request(uuid::Uuid::new_v4().to_string(), trip);
            self.trips.lock().unwrap().push(created.clone());
            Ok(created)
        }
    }

    struct Harness {
        remote: Arc<FakeRemote>,
        cache: Arc<MemoryCache>,
        connectivity: Arc<StaticConnectivity>,
        repo: Arc<OfflineRepository>,
    }

    fn harness(trips: Vec<Trip>, online: bool) -> Harness {
        let remote = Arc::new(FakeRemote::with_trips(trips));
        let cache = Arc::new(MemoryCache::new());
        let connectivity = Arc::new(StaticConnectivity::new(online));
        let repo = Arc::new(OfflineRepository::new(
            remote.clone(),
            cache.clone(),
            connectivity.clone(),
        ));
        Harness {
            remote,
            cache,
            connectivity,
            repo,
        }
    }

    fn trip(id: &str, destination: &str) -> Trip {
        let mut trip = Trip::from_request(id.to_string(), &CreateTripRequest::default());
        trip.destination = destination.to_string();
        trip
    }

    fn sample_trips(n: usize) -> Vec<Trip> {
        (0..n)
            .map(|i| trip(&format!("t{}", i), "Paris, France"))
            .collect()
    }

    fn draft_with_photos(photos: &[&str]) -> CreateTripRequest {
        CreateTripRequest {
            title: Some("Lisbon".to_string()),
            destination: Some("Lisbon, Portugal".to_string()),
            start_date: Some("2024-05-01".to_string()),
            end_date: Some("2024-05-07".to_string()),
            photos: photos.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_online_read_overwrites_cache() {
        let h = harness(sample_trips(2), true);
        h.cache.cache_trips(&sample_trips(5)).await.unwrap();

        let result = h.repo.trips().await;
        assert_eq!(result.status, 200);
        assert_eq!(result.data, sample_trips(2));
        assert_eq!(h.cache.cached_trips().await.unwrap(), Some(sample_trips(2)));
    }

    #[tokio::test]
    async fn test_offline_read_serves_cache_unchanged() {
        let h = harness(sample_trips(4), false);
        h.cache.cache_trips(&sample_trips(1)).await.unwrap();

        let result = h.repo.trips().await;
        assert_eq!(result.status, FALLBACK_STATUS);
        assert!(result.is_fallback());
        assert_eq!(result.data, sample_trips(1));
    }

    #[tokio::test]
    async fn test_offline_read_without_cache_returns_defaults() {
        let h = harness(sample_trips(4), false);

        assert_eq!(h.repo.trips().await.data, Vec::new());
        assert_eq!(h.repo.upcoming_trips().await.data, Vec::new());
        assert_eq!(h.repo.activities().await.data, Vec::new());
        assert_eq!(h.repo.statistics().await.data, None);
        assert_eq!(h.repo.trip("t0").await.data, None);
    }

    #[tokio::test]
    async fn test_failed_fetch_falls_back_to_cache() {
        let h = harness(sample_trips(4), true);
        h.cache.cache_trips(&sample_trips(2)).await.unwrap();
        h.remote.fail_reads.store(true, Ordering::SeqCst);

        let result = h.repo.trips().await;
        assert_eq!(result.status, FALLBACK_STATUS);
        assert_eq!(result.data, sample_trips(2));
        assert_eq!(h.cache.cached_trips().await.unwrap(), Some(sample_trips(2)));
    }

    #[tokio::test]
    async fn test_error_status_is_propagated_without_caching() {
        let h = harness(sample_trips(4), true);
        h.cache.cache_trips(&sample_trips(2)).await.unwrap();
        *h.remote.read_status.lock().unwrap() = Some(403);

        let result = h.repo.trips().await;
        assert_eq!(result.status, 403);
        assert!(result.data.is_empty());
        assert_eq!(h.cache.cached_trips().await.unwrap(), Some(sample_trips(2)));
    }

    #[tokio::test]
    async fn test_upcoming_is_prefix_online_and_offline() {
        let h = harness(sample_trips(5), true);

        let online = h.repo.upcoming_trips().await;
        assert_eq!(online.data, sample_trips(5)[..3].to_vec());
        // Upcoming never writes the trip snapshot.
        assert!(h.cache.cached_trips().await.unwrap().is_none());

        h.repo.trips().await;
        h.connectivity.set_online(false);
        let offline = h.repo.upcoming_trips().await;
        assert_eq!(offline.status, FALLBACK_STATUS);
        assert_eq!(offline.data, sample_trips(5)[..3].to_vec());
    }

    #[tokio::test]
    async fn test_statistics_and_activities_are_cached() {
        let trips = vec![trip("a", "Paris, France"), trip("b", "Kyoto, Japan")];
        let h = harness(trips, true);

        let stats = h.repo.statistics().await;
        assert_eq!(stats.data.unwrap().total_countries, 2);
        let activities = h.repo.activities().await;
        assert_eq!(activities.data.len(), 1);

        h.connectivity.set_online(false);
        assert_eq!(h.repo.statistics().await.data, stats.data);
        assert_eq!(h.repo.activities().await.data, activities.data);
    }

    #[tokio::test]
    async fn test_trip_by_id() {
        let h = harness(sample_trips(2), true);

        assert_eq!(h.repo.trip("t1").await.data.unwrap().id, "t1");

        let missing = h.repo.trip("nope").await;
        assert_eq!(missing.status, 404);
        assert!(missing.data.is_none());

        h.repo.trips().await;
        h.connectivity.set_online(false);
        let cached = h.repo.trip("t0").await;
        assert_eq!(cached.status, FALLBACK_STATUS);
        assert_eq!(cached.data.unwrap().id, "t0");
    }

    #[tokio::test]
    async fn test_online_create_uploads_photos_in_order() {
        let h = harness(Vec::new(), true);
        let mut seen = None;

        let outcome = h
            .repo
            .create_trip_with(draft_with_photos(&["/a.jpg", "/b.jpg"]), |t| {
                seen = Some(t.id.clone())
            })
            .await
            .unwrap();

        let CreateTripOutcome::Created(trip) = outcome else {
            panic!("expected an online creation");
        };
        assert_eq!(
            trip.photos,
            vec!["http://remote/uploads/0-a.jpg", "http://remote/uploads/1-b.jpg"]
        );
        assert_eq!(trip.image.as_deref(), Some("http://remote/uploads/0-a.jpg"));
        assert!(!is_local_id(&trip.id));
        assert_eq!(seen, Some(trip.id.clone()));
        assert!(h.cache.pending_mutations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_offline_create_is_queued() {
        let h = harness(Vec::new(), false);
        let draft = draft_with_photos(&["/a.jpg", "/b.jpg"]);
        let mut called = false;

        let outcome = h
            .repo
            .create_trip_with(draft.clone(), |_| called = true)
            .await
            .unwrap();

        let trip = outcome.trip().clone();
        assert!(is_local_id(&trip.id));
        assert_eq!(trip.title, "Lisbon");
        assert_eq!(trip.photos, vec!["/a.jpg", "/b.jpg"]);
        assert!(!called);
        assert_eq!(h.remote.uploads.load(Ordering::SeqCst), 0);

        let queue = h.cache.pending_mutations().await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].method, "POST");
        assert_eq!(queue[0].endpoint, "/trips");
        assert_eq!(queue[0].local_id.as_deref(), Some(trip.id.as_str()));
        assert_eq!(queue[0].payload, serde_json::to_value(&draft).unwrap());
    }

    #[tokio::test]
    async fn test_partial_online_failure_is_surfaced_not_queued() {
        let h = harness(Vec::new(), true);
        h.remote.fail_create.store(true, Ordering::SeqCst);

        let err = h
            .repo
            .create_trip(draft_with_photos(&["/a.jpg"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 500, .. }));
        assert_eq!(h.remote.uploads.load(Ordering::SeqCst), 1);
        assert!(h.cache.pending_mutations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replay_drains_in_order_and_reconciles() {
        let h = harness(Vec::new(), false);
        let first = h
            .repo
            .create_trip(CreateTripRequest {
                title: Some("first".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        let second = h
            .repo
            .create_trip(CreateTripRequest {
                title: Some("second".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        // Offline replay is a no-op.
        let report = h.repo.replay_pending().await.unwrap();
        assert!(report.reconciled.is_empty());
        assert_eq!(report.remaining, 2);

        h.connectivity.set_online(true);
        let report = h.repo.replay_pending().await.unwrap();
        assert_eq!(report.reconciled.len(), 2);
        assert_eq!(report.remaining, 0);
        assert!(report.failure.is_none());

        let titles: Vec<String> = h
            .remote
            .created
            .lock()
            .unwrap()
            .iter()
            .map(|d| d.title.clone().unwrap())
            .collect();
        assert_eq!(titles, vec!["first", "second"]);

        let server_id = report.server_id_for(&first.trip().id).unwrap();
        assert!(!is_local_id(server_id));
        assert!(report.server_id_for(&second.trip().id).is_some());

        // Exactly once: a second pass has nothing to do.
        let again = h.repo.replay_pending().await.unwrap();
        assert!(again.is_empty());
        assert_eq!(h.remote.created.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_replay_stops_at_first_failure() {
        let h = harness(Vec::new(), false);
        h.repo.create_trip(draft_with_photos(&["/a.jpg"])).await.unwrap();
        h.repo.create_trip(draft_with_photos(&["/b.jpg"])).await.unwrap();
        h.repo.create_trip(draft_with_photos(&["/c.jpg"])).await.unwrap();
        let queued = h.cache.pending_mutations().await.unwrap();

        h.connectivity.set_online(true);
        *h.remote.fail_uploads_after.lock().unwrap() = Some(1);

        let report = h.repo.replay_pending().await.unwrap();
        assert_eq!(report.reconciled.len(), 1);
        assert_eq!(report.remaining, 2);
        assert!(report.failure.is_some());

        let left = h.cache.pending_mutations().await.unwrap();
        assert_eq!(left, queued[1..].to_vec());
    }

    #[tokio::test]
    async fn test_reconnect_task_replays_on_edge() {
        let h = harness(Vec::new(), false);
        h.repo
            .create_trip(CreateTripRequest::default())
            .await
            .unwrap();

        let task = spawn_replay_on_reconnect(h.repo.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.cache.pending_mutations().await.unwrap().len(), 1);

        h.connectivity.set_online(true);
        let mut drained = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if h.cache.pending_mutations().await.unwrap().is_empty() {
                drained = true;
                break;
            }
        }
        task.abort();

        assert!(drained);
        assert_eq!(h.remote.created.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reconnect_task_retries_while_online() {
        let h = harness(Vec::new(), false);
        h.repo
            .create_trip(CreateTripRequest::default())
            .await
            .unwrap();
        h.remote.fail_create.store(true, Ordering::SeqCst);
        h.connectivity.set_online(true);

        let task = spawn_replay_on_reconnect(h.repo.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.cache.pending_mutations().await.unwrap().len(), 1);

        // Connectivity never drops; the server simply recovers.
        h.remote.fail_create.store(false, Ordering::SeqCst);
        let mut drained = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if h.cache.pending_mutations().await.unwrap().is_empty() {
                drained = true;
                break;
            }
        }
        task.abort();

        assert!(drained);
        assert_eq!(h.remote.created.lock().unwrap().len(), 1);
    }
}
