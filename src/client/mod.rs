//! The MibiTracker API client.
//!
//! [`MibiRequests`] owns an authenticated [`HttpClient`] and a base URL. All
//! verb methods take a route relative to that base URL; see [`prepare_route`].

mod auth;

use anyhow::Result;
use log::info;
use reqwest::{Method, Response};
use serde::de::DeserializeOwned;

use crate::config::{Config, Credentials};
use crate::http::{HttpClient, MultipartBody, RequestOptions, RetryPolicy};
use crate::upload::ChannelSource;

pub use auth::{AuthError, TOKEN_ROUTE, USER_AGENT, build_http_client, mask_token, request_token};

/// Route accepting channel uploads.
pub const UPLOAD_CHANNEL_ROUTE: &str = "/upload_channel/";

/// Content type of uploaded channel data.
pub const CHANNEL_CONTENT_TYPE: &str = "image/tiff";

/// Returns `route` with a leading `/`.
pub fn prepare_route(route: &str) -> String {
    if route.starts_with('/') {
        route.to_string()
    } else {
        format!("/{}", route)
    }
}

/// Client for one MibiTracker instance, authenticated at construction.
#[derive(Clone)]
pub struct MibiRequests {
    url: String,
    token: String,
    http: HttpClient,
}

impl std::fmt::Debug for MibiRequests {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MibiRequests")
            .field("url", &self.url)
            .field("token", &mask_token(&self.token))
            .finish_non_exhaustive()
    }
}

impl MibiRequests {
    /// Logs in with `email` and `password` and returns an authenticated client.
    pub async fn new(url: &str, email: &str, password: &str) -> Result<Self> {
        Self::new_with_policy(url, email, password, RetryPolicy::default()).await
    }

    #[tracing::instrument(skip(password, policy))]
    pub async fn new_with_policy(
        url: &str,
        email: &str,
        password: &str,
        policy: RetryPolicy,
    ) -> Result<Self> {
        let url = url.trim_end_matches('/');
        let anonymous = build_http_client(None, policy.clone())?;
        let token = request_token(&anonymous, url, email, password).await?;
        Self::with_token_and_policy(url, &token, policy)
    }

    /// Builds a client from a previously issued token, without network I/O.
    pub fn with_token(url: &str, token: &str) -> Result<Self> {
        Self::with_token_and_policy(url, token, RetryPolicy::default())
    }

    pub fn with_token_and_policy(url: &str, token: &str, policy: RetryPolicy) -> Result<Self> {
        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            http: build_http_client(Some(token), policy)?,
        })
    }

    /// Uses the configured token if there is one, otherwise logs in.
    pub async fn from_config(config: &Config) -> Result<Self> {
        match &config.credentials {
            Credentials::Token(token) => {
                Self::with_token_and_policy(&config.url, token, config.retry.clone())
            }
            Credentials::Password { email, password } => {
                Self::new_with_policy(&config.url, email, password, config.retry.clone()).await
            }
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        self.http.retry_policy()
    }

    /// Absolute URL for `route`.
    pub fn url_for(&self, route: &str) -> String {
        format!("{}{}", self.url, prepare_route(route))
    }

    pub async fn get(&self, route: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::GET, route, options).await
    }

    pub async fn post(&self, route: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::POST, route, options).await
    }

    pub async fn put(&self, route: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::PUT, route, options).await
    }

    pub async fn delete(&self, route: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::DELETE, route, options).await
    }

    /// GET `route` and deserialize the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        route: &str,
        options: RequestOptions,
    ) -> Result<T> {
        let response = self.get(route, options).await?;
        let url = response.url().clone();
        response
            .json::<T>()
            .await
            .map_err(|e| anyhow::Error::from(e).context(format!("Failed to parse JSON from {}", url)))
    }

    #[tracing::instrument(skip(self, options))]
    async fn request(&self, method: Method, route: &str, options: RequestOptions) -> Result<Response> {
        let url = self.url_for(route);
        self.http.send(method, &url, &options).await
    }

    /// Uploads channel data for image `image_id`.
    ///
    /// The filename sent to the server is `filename` if given, otherwise the
    /// final component of the source's path or name. Anonymous buffers and
    /// streams need an explicit filename; without one this fails with
    /// [`UploadError::MissingFilename`](crate::upload::UploadError) before
    /// anything is read or sent.
    #[tracing::instrument(skip(self, source))]
    pub async fn upload_channel(
        &self,
        image_id: u64,
        source: ChannelSource,
        filename: Option<&str>,
    ) -> Result<Response> {
        let filename = source.resolve_filename(filename)?;
        let payload = source.into_payload().await?;
        self.upload_channel_payload(image_id, payload, &filename).await
    }

    /// Posts `payload` as the `attachment` part of a multi-part upload.
    #[tracing::instrument(skip(self, payload))]
    pub async fn upload_channel_payload(
        &self,
        image_id: u64,
        payload: Vec<u8>,
        filename: &str,
    ) -> Result<Response> {
        info!(
            "Uploading {} ({} bytes) to image {}...",
            filename,
            payload.len(),
            image_id
        );

        let body = MultipartBody::new()
            .text("image_id", image_id.to_string())
            .file("attachment", filename, payload, CHANNEL_CONTENT_TYPE);

        self.post(UPLOAD_CHANNEL_ROUTE, RequestOptions::new().multipart(body))
            .await
    }
}
