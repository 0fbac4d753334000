//! Client configuration from command-line values and the environment.

use anyhow::{Context, Result, bail};
use log::debug;

use crate::client::mask_token;
use crate::http::RetryPolicy;
use crate::runtime::Runtime;

pub const URL_ENV: &str = "MIBITRACKER_URL";
pub const EMAIL_ENV: &str = "MIBITRACKER_EMAIL";
pub const PASSWORD_ENV: &str = "MIBITRACKER_PASSWORD";
pub const TOKEN_ENV: &str = "MIBITRACKER_TOKEN";
pub const MAX_RETRIES_ENV: &str = "MIBITRACKER_MAX_RETRIES";

/// How the client proves who it is.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// A token issued by an earlier login.
    Token(String),
    /// Credentials exchanged for a token when the client is built.
    Password { email: String, password: String },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Token(token) => f.debug_tuple("Token").field(&mask_token(token)).finish(),
            Credentials::Password { email, .. } => f
                .debug_struct("Password")
                .field("email", email)
                .field("password", &"*********")
                .finish(),
        }
    }
}

/// Values given explicitly, e.g. on the command line. They take precedence
/// over the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub url: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    pub max_retries: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub url: String,
    pub credentials: Credentials,
    pub retry: RetryPolicy,
}

impl Config {
    /// Merges `overrides` with the environment and validates the result.
    ///
    /// A token, when present, is preferred over email and password.
    pub fn load<R: Runtime>(runtime: &R, overrides: ConfigOverrides) -> Result<Self> {
        let lookup = |value: Option<String>, key: &str| -> Option<String> {
            value
                .or_else(|| runtime.env_var(key).ok())
                .filter(|v| !v.trim().is_empty())
        };

        let Some(url) = lookup(overrides.url, URL_ENV) else {
            bail!("MibiTracker URL not set. Pass --url or set {}.", URL_ENV)
        };

        let credentials = match lookup(overrides.token, TOKEN_ENV) {
            Some(token) => {
                debug!("Using token {} for authentication", mask_token(&token));
                Credentials::Token(token)
            }
            None => {
                let email = lookup(overrides.email, EMAIL_ENV);
                let password = lookup(overrides.password, PASSWORD_ENV);
                match (email, password) {
                    (Some(email), Some(password)) => Credentials::Password { email, password },
                    (Some(_), None) => bail!(
                        "Password not set. Pass --password or set {}.",
                        PASSWORD_ENV
                    ),
                    _ => bail!(
                        "No credentials. Pass --token (or set {}), or --email and --password (or set {} and {}).",
                        TOKEN_ENV,
                        EMAIL_ENV,
                        PASSWORD_ENV
                    ),
                }
            }
        };

        let max_retries = match overrides.max_retries {
            Some(n) => Some(n),
            None => lookup(None, MAX_RETRIES_ENV)
                .map(|value| {
                    value
                        .trim()
                        .parse::<usize>()
                        .with_context(|| format!("Invalid {}: {:?}", MAX_RETRIES_ENV, value))
                })
                .transpose()?,
        };

        let mut retry = RetryPolicy::default();
        if let Some(n) = max_retries {
            retry = retry.with_max_retries(n);
        }

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            credentials,
            retry,
        })
    }
}
