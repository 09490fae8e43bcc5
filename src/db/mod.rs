//! Flat-file persistence for the mock backend.
//!
//! The dataset lives in two JSON documents that are rewritten wholesale after each mutation.

mod repository;

pub use repository::*;

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::errors::AppError;

/// Open the dataset at the given paths.
///
/// A missing document starts that collection empty. A document that fails to parse is moved
/// aside to `<name>.bad` first, so the next write cannot clobber it.
pub async fn init_dataset(trips_path: &Path, activities_path: &Path) -> Result<Repository, AppError> {
    // Ensure the parent directory exists
    if let Some(parent) = trips_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let trips = load_collection(trips_path, "trips").await;
    let activities = load_collection(activities_path, "activities").await;

    tracing::info!(
        "Loaded {} trips and {} activities",
        trips.len(),
        activities.len()
    );

    Ok(Repository::new(trips, activities, trips_path.to_path_buf()))
}

async fn load_collection<T: DeserializeOwned>(path: &Path, name: &str) -> Vec<T> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!("No {} found at {:?} ({}), starting empty", name, path, e);
            return Vec::new();
        }
    };

    match serde_json::from_slice(&raw) {
        Ok(items) => items,
        Err(e) => {
            let aside = sibling_path(path, ".bad");
            tracing::warn!(
                "Unreadable {} at {:?} ({}), moved to {:?} and starting empty",
                name,
                path,
                e,
                aside
            );
            if let Err(e) = tokio::fs::rename(path, &aside).await {
                tracing::error!("Failed to move {:?} aside: {}", path, e);
            }
            Vec::new()
        }
    }
}

/// Replace a file's contents atomically: write a sibling temp file, then rename it over the target.
///
/// Every call gets its own temp file, so concurrent writers to one path never share one.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = sibling_path(path, &format!(".{}.tmp", uuid::Uuid::new_v4()));
    if let Err(e) = tokio::fs::write(&tmp, bytes).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    tokio::fs::rename(&tmp, path).await
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}
