//! Trip dataset repository.
//!
//! Reads share a lock; every mutation holds the write lock across the disk write, so mutations
//! are applied one at a time and a failed write leaves the in-memory dataset untouched.

use std::path::PathBuf;

use tokio::sync::RwLock;

use crate::errors::AppError;
use crate::models::{Activity, CreateTripRequest, Trip, TripStatistics};

/// Number of trips served by the upcoming-trips listing.
pub const UPCOMING_LIMIT: usize = 3;

/// Repository for all dataset operations.
pub struct Repository {
    trips: RwLock<Vec<Trip>>,
    activities: Vec<Activity>,
    trips_path: PathBuf,
}

impl Repository {
    pub fn new(trips: Vec<Trip>, activities: Vec<Activity>, trips_path: PathBuf) -> Self {
        Self {
            trips: RwLock::new(trips),
            activities,
            trips_path,
        }
    }

    /// List all trips in stored order.
    pub async fn list_trips(&self) -> Vec<Trip> {
        self.trips.read().await.clone()
    }

    /// Get a trip by ID.
    pub async fn get_trip(&self, id: &str) -> Option<Trip> {
        self.trips.read().await.iter().find(|t| t.id == id).cloned()
    }

    /// The first trips in stored order. No date ordering is applied.
    pub async fn upcoming_trips(&self) -> Vec<Trip> {
        self.trips
            .read()
            .await
            .iter()
            .take(UPCOMING_LIMIT)
            .cloned()
            .collect()
    }

    pub fn list_activities(&self) -> Vec<Activity> {
        self.activities.clone()
    }

    /// Recompute statistics from the current trips.
    pub async fn statistics(&self) -> TripStatistics {
        TripStatistics::from_trips(&self.trips.read().await)
    }

    /// Create a trip with a fresh server ID and persist the dataset.
    pub async fn create_trip(&self, request: &CreateTripRequest) -> Result<Trip, AppError> {
        let trip = Trip::from_request(uuid::Uuid::new_v4().to_string(), request);

        let mut trips = self.trips.write().await;
        let mut next = trips.clone();
        next.push(trip.clone());
        self.persist(&next).await?;
        *trips = next;

        tracing::info!("Created trip {} ({})", trip.id, trip.title);
        Ok(trip)
    }

    /// Append a photo to a trip and persist the dataset.
    ///
    /// A missing or empty `uri` leaves the photos unchanged.
    pub async fn add_photo(&self, id: &str, uri: Option<&str>) -> Result<Vec<String>, AppError> {
        let mut trips = self.trips.write().await;
        let idx = trips
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(AppError::trip_not_found)?;

        let mut next = trips.clone();
        if let Some(uri) = uri.filter(|u| !u.is_empty()) {
            next[idx].photos.push(uri.to_string());
        }
        self.persist(&next).await?;
        *trips = next;

        Ok(trips[idx].photos.clone())
    }

    async fn persist(&self, trips: &[Trip]) -> Result<(), AppError> {
        let bytes = serde_json::to_vec_pretty(trips)?;
        super::write_atomic(&self.trips_path, &bytes)
            .await
            .map_err(|e| {
                tracing::error!("Failed to persist trips to {:?}: {}", self.trips_path, e);
                AppError::Persistence(format!("Failed to persist trips: {}", e))
            })
    }
}
