//! Client-local favorite trips.

use serde::{Deserialize, Serialize};

use crate::models::Trip;

/// Favorite trips in the order they were added. A trip id appears at most once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Favorites {
    list: Vec<Trip>,
}

impl Favorites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a trip unless one with the same id is already present.
    pub fn add(&mut self, trip: Trip) -> bool {
        if self.contains(&trip.id) {
            return false;
        }
        self.list.push(trip);
        true
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.list.len();
        self.list.retain(|t| t.id != id);
        self.list.len() != before
    }

    /// Add or remove; returns whether the trip is a favorite afterwards.
    pub fn toggle(&mut self, trip: Trip) -> bool {
        if self.remove(&trip.id) {
            false
        } else {
            self.add(trip)
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.list.iter().any(|t| t.id == id)
    }

    pub fn list(&self) -> &[Trip] {
        &self.list
    }
}
