//! Trip model shared by the mock backend and the client data layer.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};

/// Title given to trips created without one.
pub const DEFAULT_TITLE: &str = "Untitled";

/// Geographic position of a trip.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct TripLocation {
    pub lat: f64,
    pub lng: f64,
}

/// A journal trip.
///
/// `photos` only ever grows by appending, so its order is upload order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub location: TripLocation,
}

impl Trip {
    /// Build a trip from a create request, filling the server defaults.
    pub fn from_request(id: String, request: &CreateTripRequest) -> Self {
        Self {
            id,
            title: request
                .title
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            destination: request.destination.clone().unwrap_or_default(),
            start_date: request.start_date.clone().unwrap_or_default(),
            end_date: request.end_date.clone().unwrap_or_default(),
            description: request.description.clone().unwrap_or_default(),
            image: request.image.clone().filter(|i| !i.is_empty()),
            photos: request.photos.clone(),
            location: request.location.unwrap_or_default(),
        }
    }

    /// Country part of the destination: the second comma-separated segment, untrimmed.
    pub fn country(&self) -> Option<&str> {
        self.destination.split(',').nth(1)
    }
}

/// Request body for creating a trip. Also used by the client as the trip draft.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateTripRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "photos_or_empty")]
    pub photos: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<TripLocation>,
}

/// Request body for appending a photo to a trip.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AddPhotoRequest {
    #[serde(default)]
    pub uri: Option<String>,
}

/// Response body of a photo append.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotosResponse {
    pub ok: bool,
    pub photos: Vec<String>,
}

/// Aggregate counters derived from the full trip collection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TripStatistics {
    pub total_trips: usize,
    pub total_photos: usize,
    pub total_countries: usize,
}

impl TripStatistics {
    /// Compute the statistics projection of a trip collection.
    ///
    /// Destinations without a comma all share one "missing" country entry.
    pub fn from_trips(trips: &[Trip]) -> Self {
        let countries: HashSet<Option<&str>> = trips.iter().map(Trip::country).collect();

        Self {
            total_trips: trips.len(),
            total_photos: trips.iter().map(|t| t.photos.len()).sum(),
            total_countries: countries.len(),
        }
    }
}

/// Ids written by older clients may be numeric.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::invalid_type(
            serde::de::Unexpected::Other(&other.to_string()),
            &"a string or number id",
        )),
    }
}

/// Anything other than an array of strings becomes an empty photo list.
fn photos_or_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                serde_json::Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}
