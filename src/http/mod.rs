//! HTTP client module with retry logic and error handling.

mod client;
mod error;
mod request;
mod retry;

pub use client::HttpClient;
pub use error::{HttpStatusError, error_for_status, server_error_detail};
pub use request::{FilePart, MultipartBody, RequestBody, RequestOptions};
pub use retry::{BACKOFF_FACTOR_MS, MAX_RETRIES, RETRY_STATUSES, RetryPolicy};
