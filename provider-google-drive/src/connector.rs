//! Google Drive API connector implementation
//!
//! Uploads, metadata lookups, deletes and ranged downloads against the
//! Google Drive API v3.

use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use bytes::{BufMut, Bytes, BytesMut};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{GoogleDriveError, Result};
use crate::range::ByteRange;
use crate::token::AccessTokenSource;
use crate::types::{DriveFile, ErrorResponse, NewFileMetadata};

/// Google Drive API base URL
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Google Drive upload base URL
pub const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Fields to request for file resources
const FILE_FIELDS: &str = "id,name,mimeType,size,createdTime,modifiedTime,md5Checksum,parents,trashed";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Media transfers can take a while on slow rehearsal-room connections.
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(300);

/// Used when a 429 carries no usable `Retry-After` header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 1;

/// Body of a (possibly partial) media download.
#[derive(Debug, Clone)]
pub struct DriveDownload {
    /// Drive answered 206 and `body` holds only the requested range.
    pub partial: bool,
    /// `Content-Range` reported by Drive for partial responses
    pub content_range: Option<String>,
    pub body: Bytes,
}

/// Google Drive API connector
///
/// # Features
///
/// - `multipart/related` uploads into an optional parent folder
/// - Ranged media downloads for seeking in the streaming proxy
/// - Bearer tokens from an [`AccessTokenSource`], refreshed once on 401
/// - Transport-level retries through the `HttpClient` retry policy
///
/// # Example
///
/// ```ignore
/// use provider_google_drive::{GoogleDriveConnector, StaticToken};
///
/// let connector = GoogleDriveConnector::new(http_client, Arc::new(StaticToken::new(token)));
/// let file = connector.upload_multipart("kyrie.mp3", "audio/mpeg", data, Some("folder")).await?;
/// ```
pub struct GoogleDriveConnector {
    http_client: Arc<dyn HttpClient>,
    tokens: Arc<dyn AccessTokenSource>,
    api_base: String,
    upload_base: String,
}

impl GoogleDriveConnector {
    pub fn new(http_client: Arc<dyn HttpClient>, tokens: Arc<dyn AccessTokenSource>) -> Self {
        Self {
            http_client,
            tokens,
            api_base: DRIVE_API_BASE.to_string(),
            upload_base: DRIVE_UPLOAD_BASE.to_string(),
        }
    }

    /// Points the connector at another API host (e.g. a local emulator).
    pub fn with_base_urls(mut self, api_base: impl Into<String>, upload_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self.upload_base = upload_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Uploads `data` as a new file.
    ///
    /// Uploads are never retried at the transport level: a retried POST
    /// could create the file twice.
    #[instrument(skip(self, data), fields(bytes = data.len()))]
    pub async fn upload_multipart(
        &self,
        name: &str,
        mime_type: &str,
        data: Bytes,
        folder_id: Option<&str>,
    ) -> Result<DriveFile> {
        info!("Uploading file to Google Drive");

        let metadata = NewFileMetadata {
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            parents: folder_id.map(|id| vec![id.to_string()]).unwrap_or_default(),
        };
        let boundary = format!("repertory-{}", uuid::Uuid::new_v4().simple());
        let body = multipart_body(&boundary, &metadata, &data)?;

        let url = format!(
            "{}/files?uploadType=multipart&fields={}",
            self.upload_base, FILE_FIELDS
        );
        let content_type = format!("multipart/related; boundary={}", boundary);

        let response = self
            .send(RetryPolicy::no_retry(), || {
                HttpRequest::new(HttpMethod::Post, url.clone())
                    .header("Content-Type", content_type.clone())
                    .header("Accept", "application/json")
                    .body(body.clone())
                    .timeout(TRANSFER_TIMEOUT)
            })
            .await?;
        let response = check_status(response, None)?;

        let file: DriveFile = parse_json(&response, "upload response")?;
        info!(file_id = %file.id, "Upload complete");
        Ok(file)
    }

    #[instrument(skip(self))]
    pub async fn get_metadata(&self, file_id: &str) -> Result<DriveFile> {
        debug!("Fetching file metadata");

        let url = format!(
            "{}/files/{}?fields={}",
            self.api_base,
            urlencoding::encode(file_id),
            FILE_FIELDS
        );

        let response = self
            .send(RetryPolicy::default(), || {
                HttpRequest::new(HttpMethod::Get, url.clone())
                    .header("Accept", "application/json")
                    .timeout(REQUEST_TIMEOUT)
            })
            .await?;
        let response = check_status(response, Some(file_id))?;

        parse_json(&response, "file metadata")
    }

    #[instrument(skip(self))]
    pub async fn delete_file(&self, file_id: &str) -> Result<()> {
        info!("Deleting file from Google Drive");

        let url = format!("{}/files/{}", self.api_base, urlencoding::encode(file_id));

        let response = self
            .send(RetryPolicy::default(), || {
                HttpRequest::new(HttpMethod::Delete, url.clone()).timeout(REQUEST_TIMEOUT)
            })
            .await?;
        check_status(response, Some(file_id))?;
        Ok(())
    }

    /// Downloads file content, forwarding `range` upstream.
    ///
    /// Drive may ignore the range and answer 200 with the whole file; check
    /// [`DriveDownload::partial`].
    #[instrument(skip(self))]
    pub async fn download(&self, file_id: &str, range: Option<ByteRange>) -> Result<DriveDownload> {
        debug!("Downloading file content");

        let url = format!(
            "{}/files/{}?alt=media",
            self.api_base,
            urlencoding::encode(file_id)
        );

        let response = self
            .send(RetryPolicy::default(), || {
                let request = HttpRequest::new(HttpMethod::Get, url.clone()).timeout(TRANSFER_TIMEOUT);
                match range {
                    Some(range) => request.header("Range", range.to_string()),
                    None => request,
                }
            })
            .await?;
        let response = check_status(response, Some(file_id))?;

        let partial = response.status == 206;
        Ok(DriveDownload {
            partial,
            content_range: response.header("Content-Range").map(str::to_string),
            body: response.body,
        })
    }

    /// Sends an authorised request. A 401 invalidates the token and the
    /// request is replayed once with a fresh one.
    async fn send<F>(&self, policy: RetryPolicy, build: F) -> Result<HttpResponse>
    where
        F: Fn() -> HttpRequest,
    {
        let token = self.tokens.access_token().await?;
        let response = self
            .http_client
            .execute_with_retry(build().bearer_token(token), policy.clone())
            .await?;

        if response.status != 401 {
            return Ok(response);
        }

        warn!("Access token rejected, refreshing");
        self.tokens.invalidate().await;
        let token = self.tokens.access_token().await?;
        let response = self
            .http_client
            .execute_with_retry(build().bearer_token(token), policy)
            .await?;

        if response.status == 401 {
            return Err(GoogleDriveError::AuthenticationFailed(error_message(&response)));
        }
        Ok(response)
    }
}

/// Builds a `multipart/related` body: JSON metadata part then media part.
fn multipart_body(boundary: &str, metadata: &NewFileMetadata, data: &[u8]) -> Result<Bytes> {
    let json = serde_json::to_vec(metadata)
        .map_err(|e| GoogleDriveError::ParseError(format!("Failed to encode file metadata: {}", e)))?;

    let mut body = BytesMut::with_capacity(data.len() + json.len() + 256);
    body.put_slice(format!("--{}\r\n", boundary).as_bytes());
    body.put_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.put_slice(&json);
    body.put_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.put_slice(format!("Content-Type: {}\r\n\r\n", metadata.mime_type).as_bytes());
    body.put_slice(data);
    body.put_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    Ok(body.freeze())
}

fn parse_json<T: serde::de::DeserializeOwned>(response: &HttpResponse, what: &str) -> Result<T> {
    serde_json::from_slice(&response.body)
        .map_err(|e| GoogleDriveError::ParseError(format!("Failed to parse {}: {}", what, e)))
}

/// Maps non-2xx responses onto [`GoogleDriveError`].
fn check_status(response: HttpResponse, file_id: Option<&str>) -> Result<HttpResponse> {
    if response.is_success() {
        return Ok(response);
    }

    let status = response.status;
    warn!(status, "Google Drive API request failed");

    match (status, file_id) {
        (404, Some(file_id)) => Err(GoogleDriveError::FileNotFound {
            file_id: file_id.to_string(),
        }),
        (429, _) => Err(GoogleDriveError::RateLimitExceeded {
            retry_after_seconds: response
                .header("Retry-After")
                .and_then(|value| value.trim().parse().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        }),
        _ => Err(GoogleDriveError::ApiError {
            status_code: status,
            message: error_message(&response),
        }),
    }
}

/// Prefers the message of a Drive error body over the raw body text.
fn error_message(response: &HttpResponse) -> String {
    match response.json::<ErrorResponse>() {
        Ok(error) => error.error.message,
        Err(_) => String::from_utf8_lossy(&response.body).trim().to_string(),
    }
}
