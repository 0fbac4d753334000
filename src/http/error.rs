//! Mapping of non-success responses to descriptive errors.

use log::debug;
use reqwest::{Method, Response, StatusCode, Url};
use serde_json::Value;

/// Field of a JSON error body carrying the server's explanation.
const ERROR_FIELD: &str = "Error";

/// A request the server answered with a 4xx or 5xx status.
#[derive(Debug)]
pub struct HttpStatusError {
    pub method: Method,
    pub url: Url,
    pub status: StatusCode,
    /// The `Error` field of the server's JSON body, if it sent one.
    pub detail: Option<String>,
}

impl std::fmt::Display for HttpStatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.status.is_client_error() {
            "HTTP status client error"
        } else {
            "HTTP status server error"
        };
        write!(f, "{} ({}) for url ({})", kind, self.status, self.url)?;
        if let Some(detail) = &self.detail {
            write!(f, ": {}", detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for HttpStatusError {}

/// Passes success responses through and turns failures into [`HttpStatusError`].
///
/// The failure body is consumed to look for an `Error` field; bodies that are
/// not JSON, or lack the field, leave the error without detail.
pub async fn error_for_status(
    method: &Method,
    response: Response,
) -> Result<Response, HttpStatusError> {
    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return Ok(response);
    }

    let url = response.url().clone();
    let detail = match response.text().await {
        Ok(body) => server_error_detail(&body),
        Err(e) => {
            debug!("Could not read error body from {}: {}", url, e);
            None
        }
    };

    Err(HttpStatusError {
        method: method.clone(),
        url,
        status,
        detail,
    })
}

/// Extracts the `Error` field from a JSON error body.
pub fn server_error_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get(ERROR_FIELD)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
