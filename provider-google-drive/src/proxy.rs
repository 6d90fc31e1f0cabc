//! Upload and range-aware streaming in front of a Drive folder.
//!
//! Browsers seek in `<audio>` elements with `Range` requests, so the proxy
//! answers with `206 Partial Content` whenever a single satisfiable range
//! was asked for, `416` when it cannot be satisfied, and a plain `200`
//! otherwise.

use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::connector::GoogleDriveConnector;
use crate::error::{GoogleDriveError, Result};
use crate::range::{ByteRange, ResolvedRange};
use crate::types::DriveFile;

/// An HTTP response ready to hand to the host's web layer.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamResponse {
    pub status: u16,
    /// Header name/value pairs, in a stable order
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl StreamResponse {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn new(status: u16, content_type: &str, body: Bytes) -> Self {
        Self {
            status,
            headers: vec![
                ("Content-Type".to_string(), content_type.to_string()),
                ("Content-Length".to_string(), body.len().to_string()),
                ("Accept-Ranges".to_string(), "bytes".to_string()),
            ],
            body,
        }
    }

    fn with_content_range(mut self, value: String) -> Self {
        self.headers.push(("Content-Range".to_string(), value));
        self
    }
}

pub struct DriveProxy {
    connector: Arc<GoogleDriveConnector>,
    folder_id: Option<String>,
}

impl DriveProxy {
    /// `folder_id` is the parent of every uploaded file; `None` uploads to
    /// the Drive root.
    pub fn new(connector: Arc<GoogleDriveConnector>, folder_id: Option<String>) -> Self {
        Self { connector, folder_id }
    }

    pub fn connector(&self) -> &Arc<GoogleDriveConnector> {
        &self.connector
    }

    pub async fn upload(&self, name: &str, mime_type: &str, data: Bytes) -> Result<DriveFile> {
        self.connector
            .upload_multipart(name, mime_type, data, self.folder_id.as_deref())
            .await
    }

    /// Streams a file, honouring a single `bytes` range.
    ///
    /// Malformed or multi-range headers are ignored. So is any range when
    /// Drive reports no size for the file.
    ///
    /// # Errors
    ///
    /// [`GoogleDriveError::TruncatedContent`] when Drive sends nothing for a
    /// range its own metadata says exists.
    #[instrument(skip(self))]
    pub async fn stream(&self, file_id: &str, range_header: Option<&str>) -> Result<StreamResponse> {
        let file = self.connector.get_metadata(file_id).await?;
        let content_type = file.mime_type.as_str();

        let requested = range_header.and_then(|header| {
            let parsed = ByteRange::parse(header);
            if parsed.is_none() {
                debug!(header, "Ignoring unsupported Range header");
            }
            parsed
        });

        let resolved = match (requested, file.size_bytes()) {
            (Some(range), Some(size)) => match range.resolve(size) {
                Ok(resolved) => Some(resolved),
                Err(unsatisfiable) => {
                    debug!(size, "Range not satisfiable");
                    return Ok(StreamResponse::new(416, content_type, Bytes::new())
                        .with_content_range(unsatisfiable.content_range()));
                }
            },
            _ => None,
        };

        match resolved {
            Some(range) => {
                let download = self.connector.download(file_id, Some(range.to_request())).await?;
                let body = if download.partial {
                    download.body
                } else {
                    slice_full_body(download.body, &range)
                };
                if body.is_empty() {
                    warn!(start = range.start, size = range.size, "Upstream body shorter than range");
                    return Err(GoogleDriveError::TruncatedContent {
                        file_id: file_id.to_string(),
                        start: range.start,
                        size: range.size,
                    });
                }
                let range = ResolvedRange {
                    end: range.start + (body.len() as u64).saturating_sub(1),
                    ..range
                };
                Ok(StreamResponse::new(206, content_type, body).with_content_range(range.content_range()))
            }
            None => {
                let download = self.connector.download(file_id, None).await?;
                Ok(StreamResponse::new(200, content_type, download.body))
            }
        }
    }
}

/// Cuts the requested range out of a full-file body, for upstreams that
/// ignored the `Range` header.
fn slice_full_body(body: Bytes, range: &ResolvedRange) -> Bytes {
    let len = body.len() as u64;
    if range.start >= len {
        return Bytes::new();
    }
    let end = range.end.min(len - 1);
    body.slice(range.start as usize..=end as usize)
}
