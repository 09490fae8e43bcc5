//! Remote data service: stateless HTTP calls against the trip journal backend.

use std::fmt::Display;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{IntoUrl, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::RwLock;

use super::ClientError;
use crate::api::UploadResponse;
use crate::errors::ErrorResponse;
use crate::models::{
    Activity, AddPhotoRequest, CreateTripRequest, LoginRequest, PhotosResponse, RefreshRequest,
    RefreshResponse, RegisterRequest, TokenResponse, Trip, TripStatistics,
};

/// Per-request timeout applied when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of a read that reached the server.
///
/// `data` is present only for 2xx answers.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResponse<T> {
    pub status: u16,
    pub data: Option<T>,
}

impl<T> RemoteResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: 200,
            data: Some(data),
        }
    }

    pub fn status(status: u16) -> Self {
        Self { status, data: None }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Calls the repository layer makes against the backend.
///
/// Reads return `Ok` for any HTTP answer and `Err` only for transport or parse failures.
/// Writes return `Err` for non-2xx answers as well.
#[async_trait]
pub trait RemoteDataService: Send + Sync {
    async fn fetch_trips(&self) -> Result<RemoteResponse<Vec<Trip>>, ClientError>;
    async fn fetch_upcoming_trips(&self) -> Result<RemoteResponse<Vec<Trip>>, ClientError>;
    async fn fetch_trip(&self, id: &str) -> Result<RemoteResponse<Trip>, ClientError>;
    async fn fetch_statistics(&self) -> Result<RemoteResponse<TripStatistics>, ClientError>;
    async fn fetch_activities(&self) -> Result<RemoteResponse<Vec<Activity>>, ClientError>;

    /// Upload a local image and return its remote URL.
    async fn upload_image(&self, photo: &str) -> Result<String, ClientError>;

    /// Submit a trip and return the server's copy.
    async fn create_trip(&self, trip: &CreateTripRequest) -> Result<Trip, ClientError>;
}

/// Settings for [`HttpRemote`].
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Default)]
struct Session {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

/// reqwest-backed remote holding the current session tokens.
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: String,
    base: Url,
    session: RwLock<Session>,
}

impl HttpRemote {
    pub fn new(config: RemoteConfig) -> Result<Self, ClientError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let base = Url::parse(&base_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url));
        }

        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url,
            base,
            session: RwLock::new(Session::default()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `/trips/<id>/<tail..>` with every segment percent-encoded.
    fn trip_url(&self, id: &str, tail: &[&str]) -> Url {
        let mut url = self.base.clone();
        // Cannot-be-a-base URLs are rejected in `new`.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("trips").push(id).extend(tail);
        }
        url
    }

    pub async fn access_token(&self) -> Option<String> {
        self.session.read().await.access_token.clone()
    }

    pub async fn set_access_token(&self, token: Option<String>) {
        self.session.write().await.access_token = token;
    }

    /// Register and keep the issued tokens.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<TokenResponse, ClientError> {
        let body = RegisterRequest {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
            name: Some(name.to_string()),
        };
        let resp = self.client.post(self.url("/auth/register")).json(&body).send().await?;
        let tokens: TokenResponse = parse_success(resp).await?;
        self.store_tokens(&tokens).await;
        Ok(tokens)
    }

    /// Log in and keep the issued tokens.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenResponse, ClientError> {
        let body = LoginRequest {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        };
        let resp = self.client.post(self.url("/auth/login")).json(&body).send().await?;
        let tokens: TokenResponse = parse_success(resp).await?;
        self.store_tokens(&tokens).await;
        Ok(tokens)
    }

    /// Exchange the stored refresh token for a new access token.
    pub async fn refresh(&self) -> Result<RefreshResponse, ClientError> {
        let refresh_token = self
            .session
            .read()
            .await
            .refresh_token
            .clone()
            .ok_or(ClientError::NotAuthenticated)?;
        let body = RefreshRequest {
            refresh_token: Some(refresh_token),
        };
        let resp = self.client.post(self.url("/auth/refresh")).json(&body).send().await?;
        let refreshed: RefreshResponse = parse_success(resp).await?;
        self.session.write().await.access_token = Some(refreshed.access_token.clone());
        Ok(refreshed)
    }

    /// Log out and forget the session.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let request = self.authorized(self.client.post(self.url("/auth/logout"))).await;
        let resp = request.send().await?;
        let _: serde_json::Value = parse_success(resp).await?;
        *self.session.write().await = Session::default();
        Ok(())
    }

    /// Append an already-remote photo reference to an existing trip.
    pub async fn add_photo(&self, trip_id: &str, uri: &str) -> Result<Vec<String>, ClientError> {
        let body = AddPhotoRequest {
            uri: Some(uri.to_string()),
        };
        let request = self
            .authorized(self.client.post(self.trip_url(trip_id, &["photos"])))
            .await;
        let resp = request.json(&body).send().await?;
        let photos: PhotosResponse = parse_success(resp).await?;
        Ok(photos.photos)
    }

    async fn store_tokens(&self, tokens: &TokenResponse) {
        let mut session = self.session.write().await;
        session.access_token = Some(tokens.access_token.clone());
        session.refresh_token = Some(tokens.refresh_token.clone());
    }

    async fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.access_token().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_data<T, U>(&self, url: U) -> Result<RemoteResponse<T>, ClientError>
    where
        T: DeserializeOwned,
        U: IntoUrl + Display + Send,
    {
        let target = url.to_string();
        let resp = self.authorized(self.client.get(url)).await.send().await?;
        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            tracing::debug!("GET {} answered {}", target, status);
            return Ok(RemoteResponse::status(status));
        }

        let bytes = resp.bytes().await?;
        let envelope: DataEnvelope<T> = serde_json::from_slice(&bytes)?;
        Ok(RemoteResponse {
            status,
            data: Some(envelope.data),
        })
    }
}

#[async_trait]
impl RemoteDataService for HttpRemote {
    async fn fetch_trips(&self) -> Result<RemoteResponse<Vec<Trip>>, ClientError> {
        self.get_data(self.url("/trips")).await
    }

    async fn fetch_upcoming_trips(&self) -> Result<RemoteResponse<Vec<Trip>>, ClientError> {
        self.get_data(self.url("/trips-upcoming")).await
    }

    async fn fetch_trip(&self, id: &str) -> Result<RemoteResponse<Trip>, ClientError> {
        self.get_data(self.trip_url(id, &[])).await
    }

    async fn fetch_statistics(&self) -> Result<RemoteResponse<TripStatistics>, ClientError> {
        self.get_data(self.url("/stats")).await
    }

    async fn fetch_activities(&self) -> Result<RemoteResponse<Vec<Activity>>, ClientError> {
        self.get_data(self.url("/activities")).await
    }

    async fn upload_image(&self, photo: &str) -> Result<String, ClientError> {
        let bytes = tokio::fs::read(photo).await?;
        let file_name = Path::new(photo)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("photo")
            .to_string();

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
        let form = reqwest::multipart::Form::new().part(crate::api::UPLOAD_FIELD, part);

        let resp = self
            .client
            .post(self.url("/uploads"))
            .multipart(form)
            .send()
            .await?;
        let uploaded: UploadResponse = parse_success(resp).await?;
        tracing::debug!("Uploaded {} as {}", photo, uploaded.url);
        Ok(uploaded.url)
    }

    async fn create_trip(&self, trip: &CreateTripRequest) -> Result<Trip, ClientError> {
        let request = self.authorized(self.client.post(self.url("/trips"))).await;
        let resp = request.json(trip).send().await?;
        parse_success(resp).await
    }
}

/// Decode a 2xx body, or turn any other answer into [`ClientError::Status`].
async fn parse_success<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
    let status = resp.status();
    let bytes = resp.bytes().await?;

    if !status.is_success() {
        let message = serde_json::from_slice::<ErrorResponse>(&bytes)
            .map(|body| body.error)
            .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned());
        return Err(ClientError::Status {
            status: status.as_u16(),
            message,
        });
    }

    Ok(serde_json::from_slice(&bytes)?)
}
