//! HTTP client with built-in retry logic and error handling.

use anyhow::{Context, Result};
use log::{debug, warn};
use reqwest::{Client, Method, Response};

use super::error::error_for_status;
use super::request::RequestOptions;
use super::retry::RetryPolicy;

/// HTTP client with built-in retry logic for network operations.
///
/// Every response passes through [`error_for_status`] once retries are
/// settled, so callers only ever see success responses or an error.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    policy: RetryPolicy,
}

impl HttpClient {
    /// Creates a new HTTP client wrapping the given reqwest Client.
    pub fn with_policy(client: Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Sends a request, retrying transient failures allowed by the policy.
    #[tracing::instrument(skip(self, options))]
    pub async fn send(&self, method: Method, url: &str, options: &RequestOptions) -> Result<Response> {
        debug!("{} {}...", method, url);

        let max_retries = self.policy.max_retries();
        let mut retry = 0;

        loop {
            let request = options.apply(self.client.request(method.clone(), url))?;

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if retry < max_retries && self.policy.is_retry(&method, status) {
                        retry += 1;
                        let delay = self.policy.backoff(retry);
                        warn!(
                            "{} {}: server answered {}, retry {}/{} in {}ms...",
                            method,
                            url,
                            status,
                            retry,
                            max_retries,
                            delay.as_millis()
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Ok(error_for_status(&method, response).await?);
                }
                Err(e) => {
                    if retry < max_retries && self.policy.is_transport_retry(&e) {
                        retry += 1;
                        let delay = self.policy.backoff(retry);
                        warn!(
                            "{} {}: attempt failed ({}), retry {}/{} in {}ms...",
                            method,
                            url,
                            e,
                            retry,
                            max_retries,
                            delay.as_millis()
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(e).with_context(|| format!("Failed to send {} request to {}", method, url));
                }
            }
        }
    }

    /// Sends a request exactly once, bypassing the retry policy.
    #[tracing::instrument(skip(self, options))]
    pub async fn send_once(
        &self,
        method: Method,
        url: &str,
        options: &RequestOptions,
    ) -> Result<Response> {
        debug!("{} {} (no retry)...", method, url);

        let response = options
            .apply(self.client.request(method.clone(), url))?
            .send()
            .await
            .with_context(|| format!("Failed to send {} request to {}", method, url))?;

        Ok(error_for_status(&method, response).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpStatusError;
    use mockito::Matcher;
    use reqwest::StatusCode;
    use std::time::Duration;

    fn fast_client(max_retries: usize) -> HttpClient {
        HttpClient::with_policy(
            Client::new(),
            RetryPolicy::default()
                .with_max_retries(max_retries)
                .with_backoff_factor(Duration::ZERO),
        )
    }

    #[tokio::test]
    async fn test_send_success() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/images")
            .match_query(Matcher::UrlEncoded("key".into(), "value".into()))
            .with_status(200)
            .with_body("[]")
            .expect(1)
            .create_async()
            .await;

        let client = fast_client(3);
        let response = client
            .send(
                Method::GET,
                &format!("{}/images", url),
                &RequestOptions::new().query("key", "value"),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.text().await.unwrap(), "[]");
    }

    #[test_log::test(tokio::test)]
    async fn test_send_retries_transient_get_until_exhausted() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/images")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let client = fast_client(2);
        let err = client
            .send(Method::GET, &format!("{}/images", url), &RequestOptions::new())
            .await
            .unwrap_err();

        mock.assert_async().await;
        let status_error = err.downcast_ref::<HttpStatusError>().unwrap();
        assert_eq!(status_error.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test_log::test(tokio::test)]
    async fn test_send_retries_transient_get_then_succeeds() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let unavailable = server
            .mock("GET", "/images")
            .with_status(503)
            .expect(1)
            .create_async()
            .await;
        let ok = server
            .mock("GET", "/images")
            .with_status(200)
            .with_body("[]")
            .expect(1)
            .create_async()
            .await;

        let client = fast_client(3);
        let response = client
            .send(Method::GET, &format!("{}/images", url), &RequestOptions::new())
            .await
            .unwrap();

        unavailable.assert_async().await;
        ok.assert_async().await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_send_retries_transient_post() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("POST", "/images/")
            .match_body(Matcher::UrlEncoded("key".into(), "value".into()))
            .with_status(502)
            .expect(2)
            .create_async()
            .await;

        let client = fast_client(1);
        let result = client
            .send(
                Method::POST,
                &format!("{}/images/", url),
                &RequestOptions::new().form_field("key", "value"),
            )
            .await;

        mock.assert_async().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_send_does_not_retry_put() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("PUT", "/images/1/")
            .with_status(503)
            .expect(1)
            .create_async()
            .await;

        let client = fast_client(3);
        let result = client
            .send(Method::PUT, &format!("{}/images/1/", url), &RequestOptions::new())
            .await;

        mock.assert_async().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_send_does_not_retry_client_error() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("POST", "/images/")
            .with_status(403)
            .with_body(r#"{"Error": "Helpful error description"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = fast_client(3);
        let err = client
            .send(Method::POST, &format!("{}/images/", url), &RequestOptions::new())
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert!(err.to_string().contains("403 Forbidden"));
        assert!(err.to_string().contains("Helpful error description"));
    }

    #[tokio::test]
    async fn test_send_once_does_not_retry() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/images")
            .with_status(502)
            .expect(1)
            .create_async()
            .await;

        let client = fast_client(3);
        let result = client
            .send_once(Method::GET, &format!("{}/images", url), &RequestOptions::new())
            .await;

        mock.assert_async().await;
        assert!(result.is_err());
    }

    #[test_log::test(tokio::test)]
    async fn test_send_connect_failure_exhausts_retries() {
        let client = fast_client(2);
        let err = client
            .send(Method::GET, "http://127.0.0.1:1/images", &RequestOptions::new())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Failed to send GET request"));
        assert!(err.downcast_ref::<reqwest::Error>().is_some());
    }
}
