//! REST API module.
//!
//! Handlers for every mock backend endpoint. Listings are wrapped in a `{ "data": ... }` envelope.

mod activities;
mod auth;
mod trips;
mod uploads;

pub use activities::*;
pub use auth::*;
pub use trips::*;
pub use uploads::*;

use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::errors::AppError;

/// Success response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub data: T,
}

impl<T: Serialize> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

impl<T: Serialize> IntoResponse for DataResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// JSON request body that reports failures as [`AppError::BadRequest`].
///
/// An empty body deserializes as `T::default()`, so handlers apply their own field checks.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(JsonBody(T::default()));
        }

        serde_json::from_slice(&bytes)
            .map(JsonBody)
            .map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<T, AppError>;

/// Wrap data in the success envelope.
pub fn success<T: Serialize>(data: T) -> ApiResult<DataResponse<T>> {
    Ok(DataResponse::new(data))
}
