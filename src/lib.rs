//! Client for the MibiTracker image-management API.
//!
//! ```no_run
//! # async fn run() -> anyhow::Result<()> {
//! use mibitracker::{ChannelSource, MibiRequests, RequestOptions};
//!
//! let mr = MibiRequests::new("https://mibitracker.example.com", "user@example.com", "password").await?;
//! let images = mr.get("images", RequestOptions::new().query("run__label", "20180101_run")).await?;
//! println!("{}", images.text().await?);
//!
//! mr.upload_channel(42, ChannelSource::path("/data/run/CD45.tiff"), None).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod http;
pub mod runtime;
pub mod upload;

pub use client::{AuthError, MibiRequests, prepare_route};
pub use config::{Config, ConfigOverrides, Credentials};
pub use http::{HttpStatusError, MultipartBody, RequestOptions, RetryPolicy};
pub use upload::{ChannelSource, UploadError};
