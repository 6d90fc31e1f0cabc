//! Google Drive API request and response types
//!
//! Data structures for the Google Drive API v3 payloads the connector uses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Google Drive API file resource
///
/// See: https://developers.google.com/drive/api/v3/reference/files#resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// File ID
    pub id: String,

    /// File name
    pub name: String,

    /// MIME type
    pub mime_type: String,

    /// File size in bytes, as a decimal string (omitted for folders and
    /// native Google documents)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    /// Creation time (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,

    /// Modification time (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,

    /// MD5 checksum (for files)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5_checksum: Option<String>,

    /// Parent folder IDs
    #[serde(default)]
    pub parents: Vec<String>,

    /// Whether file is trashed
    #[serde(default)]
    pub trashed: bool,
}

impl DriveFile {
    /// Size in bytes, when Drive reports one.
    pub fn size_bytes(&self) -> Option<u64> {
        self.size.as_deref().and_then(|s| s.parse().ok())
    }

    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        self.modified_time.as_deref().and_then(parse_timestamp)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_time.as_deref().and_then(parse_timestamp)
    }
}

fn parse_timestamp(rfc3339: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(rfc3339)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Metadata part of a multipart upload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFileMetadata {
    pub name: String,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
}

/// Error body returned by the Drive API
///
/// See: https://developers.google.com/drive/api/guides/handle-errors
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub code: u16,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_drive_file() {
        let json = r#"{
            "id": "abc123",
            "name": "Ave Verum - Tenor.mp3",
            "mimeType": "audio/mpeg",
            "size": "4194304",
            "createdTime": "2023-01-01T00:00:00.000Z",
            "modifiedTime": "2023-01-02T00:00:00.000Z",
            "md5Checksum": "d41d8cd98f00b204e9800998ecf8427e",
            "parents": ["folder1"],
            "trashed": false
        }"#;

        let file: DriveFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.id, "abc123");
        assert_eq!(file.mime_type, "audio/mpeg");
        assert_eq!(file.size_bytes(), Some(4_194_304));
        assert_eq!(
            file.modified_at().map(|t| t.to_rfc3339()),
            Some("2023-01-02T00:00:00+00:00".to_string())
        );
    }

    #[test]
    fn test_deserialize_minimal_file() {
        let json = r#"{"id": "x", "name": "notes", "mimeType": "application/vnd.google-apps.document"}"#;

        let file: DriveFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.size_bytes(), None);
        assert!(file.parents.is_empty());
        assert_eq!(file.created_at(), None);
    }

    #[test]
    fn test_serialize_new_file_metadata() {
        let metadata = NewFileMetadata {
            name: "gloria.mp3".to_string(),
            mime_type: "audio/mpeg".to_string(),
            parents: vec![],
        };

        assert_eq!(
            serde_json::to_string(&metadata).unwrap(),
            r#"{"name":"gloria.mp3","mimeType":"audio/mpeg"}"#
        );
    }

    #[test]
    fn test_deserialize_error_response() {
        let json = r#"{"error": {"code": 404, "message": "File not found: 1AbC.", "errors": []}}"#;

        let response: ErrorResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.error.code, 404);
        assert_eq!(response.error.message, "File not found: 1AbC.");
    }
}
