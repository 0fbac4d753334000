//! Token authentication against the MibiTracker API.

use anyhow::{Context, Result};
use log::{debug, info};
use reqwest::{
    Client, Method,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use serde::Deserialize;

use crate::http::{HttpClient, HttpStatusError, RequestOptions, RetryPolicy};

/// Route issuing JSON web tokens for email/password credentials.
pub const TOKEN_ROUTE: &str = "/api-token-auth/";

/// Sent with every request so the server can tell client versions apart.
pub const USER_AGENT: &str = concat!("mibitracker/", env!("MIBITRACKER_VERSION"));

/// Authentication failures. Never retried.
#[derive(Debug)]
pub enum AuthError {
    /// The token endpoint answered with an error status.
    Rejected(HttpStatusError),
    /// The token endpoint answered successfully but without a token.
    MissingToken,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::Rejected(e) => write!(f, "Authentication failed: {}", e),
            AuthError::MissingToken => {
                write!(f, "Authentication failed: the server did not return a token")
            }
        }
    }
}

impl std::error::Error for AuthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AuthError::Rejected(e) => Some(e),
            AuthError::MissingToken => None,
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    token: Option<String>,
}

/// Build an HTTP client, sending `Authorization: JWT <token>` when a token is given.
pub fn build_http_client(token: Option<&str>, policy: RetryPolicy) -> Result<HttpClient> {
    let mut headers = HeaderMap::new();

    if let Some(token) = token {
        let mut auth_value = HeaderValue::from_str(&format!("JWT {}", token))
            .context("Token contains characters not allowed in a header")?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);
        debug!("HTTP client configured with token {}", mask_token(token));
    }

    let client = Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .build()
        .context("Failed to build HTTP client")?;

    Ok(HttpClient::with_policy(client, policy))
}

/// Exchanges credentials for a token. The request is sent once.
#[tracing::instrument(skip(http, password))]
pub async fn request_token(
    http: &HttpClient,
    base_url: &str,
    email: &str,
    password: &str,
) -> Result<String> {
    info!("Authenticating {} against {}...", email, base_url);

    let options = RequestOptions::new().json(serde_json::json!({
        "email": email,
        "password": password,
    }));
    let url = format!("{}{}", base_url, TOKEN_ROUTE);

    let response = match http.send_once(Method::POST, &url, &options).await {
        Ok(response) => response,
        Err(e) => {
            return match e.downcast::<HttpStatusError>() {
                Ok(status_error) => Err(AuthError::Rejected(status_error).into()),
                Err(e) => Err(e.context("Failed to reach the authentication endpoint")),
            };
        }
    };

    let body: TokenResponse = response
        .json()
        .await
        .context("Failed to parse authentication response")?;

    let token = body.token.ok_or(AuthError::MissingToken)?;
    debug!("Received token {}", mask_token(&token));
    Ok(token)
}

/// Shortens a token for logs: first and last four characters only.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 12 {
        return "*********".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}*********{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("abcdefghijklmnop"), "abcd*********mnop");
        assert_eq!(mask_token("short"), "*********");
    }

    #[test]
    fn test_build_http_client_rejects_invalid_token() {
        assert!(build_http_client(Some("bad\ntoken"), RetryPolicy::default()).is_err());
    }

    #[tokio::test]
    async fn test_request_token_success() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("POST", TOKEN_ROUTE)
            .match_body(Matcher::Json(serde_json::json!({
                "email": "user@example.com",
                "password": "password"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"token": "eyJ0eXAiOiJKV1QifQ.payload.signature"}"#)
            .create_async()
            .await;

        let http = build_http_client(None, RetryPolicy::default()).unwrap();
        let token = request_token(&http, &url, "user@example.com", "password")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(token, "eyJ0eXAiOiJKV1QifQ.payload.signature");
    }

    #[tokio::test]
    async fn test_request_token_rejected_once() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("POST", TOKEN_ROUTE)
            .with_status(400)
            .with_body(r#"{"Error": "Unable to log in with provided credentials."}"#)
            .expect(1)
            .create_async()
            .await;

        let http = build_http_client(None, RetryPolicy::default()).unwrap();
        let err = request_token(&http, &url, "user@example.com", "wrong")
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert!(matches!(
            err.downcast_ref::<AuthError>(),
            Some(AuthError::Rejected(_))
        ));
        assert!(err.to_string().contains("Unable to log in"));
    }

    #[tokio::test]
    async fn test_request_token_not_retried_on_bad_gateway() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("POST", TOKEN_ROUTE)
            .with_status(502)
            .expect(1)
            .create_async()
            .await;

        let http = build_http_client(None, RetryPolicy::default()).unwrap();
        let result = request_token(&http, &url, "user@example.com", "password").await;

        mock.assert_async().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_request_token_missing_token() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let _mock = server
            .mock("POST", TOKEN_ROUTE)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"detail": "ok"}"#)
            .create_async()
            .await;

        let http = build_http_client(None, RetryPolicy::default()).unwrap();
        let err = request_token(&http, &url, "user@example.com", "password")
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<AuthError>(),
            Some(AuthError::MissingToken)
        ));
    }
}
