//! Sources for channel uploads and filename resolution.

use anyhow::{Context, Result};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Errors raised before an upload reaches the network.
#[derive(Debug)]
pub enum UploadError {
    /// No explicit filename was given and the source has no name to derive one from.
    MissingFilename,
}

impl std::fmt::Display for UploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadError::MissingFilename => write!(
                f,
                "Cannot determine a filename for the upload. Pass one explicitly when uploading an in-memory buffer or unnamed stream."
            ),
        }
    }
}

impl std::error::Error for UploadError {}

/// Where the bytes of a channel upload come from.
pub enum ChannelSource {
    /// A file on disk, read when the upload starts.
    Path(PathBuf),
    /// An already opened reader, with the name of what it reads if known.
    Stream {
        reader: Box<dyn Read + Send>,
        name: Option<PathBuf>,
    },
    /// Bytes already in memory.
    Buffer(Vec<u8>),
}

impl std::fmt::Debug for ChannelSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            ChannelSource::Stream { name, .. } => {
                f.debug_struct("Stream").field("name", name).finish_non_exhaustive()
            }
            ChannelSource::Buffer(bytes) => f
                .debug_tuple("Buffer")
                .field(&format_args!("<{} bytes>", bytes.len()))
                .finish(),
        }
    }
}

impl ChannelSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        ChannelSource::Path(path.into())
    }

    /// An opened file together with the path it was opened from.
    pub fn file(file: std::fs::File, path: impl Into<PathBuf>) -> Self {
        Self::named_stream(file, path)
    }

    pub fn named_stream(reader: impl Read + Send + 'static, name: impl Into<PathBuf>) -> Self {
        ChannelSource::Stream {
            reader: Box::new(reader),
            name: Some(name.into()),
        }
    }

    pub fn stream(reader: impl Read + Send + 'static) -> Self {
        ChannelSource::Stream {
            reader: Box::new(reader),
            name: None,
        }
    }

    pub fn buffer(bytes: impl Into<Vec<u8>>) -> Self {
        ChannelSource::Buffer(bytes.into())
    }

    /// The name the source carries, if any.
    pub fn name(&self) -> Option<&Path> {
        match self {
            ChannelSource::Path(path) => Some(path),
            ChannelSource::Stream { name, .. } => name.as_deref(),
            ChannelSource::Buffer(_) => None,
        }
    }

    /// Picks the upload filename: `explicit` if given, otherwise the final
    /// component of the source's name.
    pub fn resolve_filename(&self, explicit: Option<&str>) -> Result<String, UploadError> {
        if let Some(filename) = explicit.filter(|f| !f.is_empty()) {
            return Ok(filename.to_string());
        }

        self.name()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or(UploadError::MissingFilename)
    }

    /// Reads the whole payload, consuming the source.
    pub async fn into_payload(self) -> Result<Vec<u8>> {
        match self {
            ChannelSource::Path(path) => tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {:?}", path)),
            ChannelSource::Stream { mut reader, name } => {
                let bytes = tokio::task::spawn_blocking(move || {
                    let mut bytes = Vec::new();
                    reader.read_to_end(&mut bytes).map(|_| bytes)
                })
                .await
                .context("Stream reader task failed")?;

                bytes.with_context(|| match name {
                    Some(name) => format!("Failed to read stream {:?}", name),
                    None => "Failed to read stream".to_string(),
                })
            }
            ChannelSource::Buffer(bytes) => Ok(bytes),
        }
    }
}

impl From<PathBuf> for ChannelSource {
    fn from(path: PathBuf) -> Self {
        ChannelSource::Path(path)
    }
}

impl From<Vec<u8>> for ChannelSource {
    fn from(bytes: Vec<u8>) -> Self {
        ChannelSource::Buffer(bytes)
    }
}
