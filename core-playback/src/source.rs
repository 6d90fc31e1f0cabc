//! Audio source descriptor handed to a player slot.

use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};

/// Where a slot loads audio from, plus optional hints about its encoding.
///
/// Streaming URLs often carry no extension (`/api/stream/1AbC`), so hosts
/// pass the stored file name and MIME type along for the classifier.
///
/// ```
/// use core_playback::AudioSource;
///
/// let source = AudioSource::new("/api/stream/1AbC")
///     .unwrap()
///     .with_file_name_hint("Ave Verum - Tenor.opus");
///
/// assert!(source.identifier().contains(".opus"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSource {
    url: String,
    mime_hint: Option<String>,
    file_name_hint: Option<String>,
}

impl AudioSource {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(PlaybackError::InvalidSource("URL is empty".to_string()));
        }
        Ok(Self {
            url,
            mime_hint: None,
            file_name_hint: None,
        })
    }

    pub fn with_mime_hint(mut self, mime: impl Into<String>) -> Self {
        self.mime_hint = Some(mime.into());
        self
    }

    pub fn with_file_name_hint(mut self, name: impl Into<String>) -> Self {
        self.file_name_hint = Some(name.into());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn mime_hint(&self) -> Option<&str> {
        self.mime_hint.as_deref()
    }

    pub fn file_name_hint(&self) -> Option<&str> {
        self.file_name_hint.as_deref()
    }

    /// The string the format classifier inspects: the URL followed by any
    /// hints, space separated.
    pub fn identifier(&self) -> String {
        [
            Some(self.url.as_str()),
            self.file_name_hint.as_deref(),
            self.mime_hint.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_url_rejected() {
        assert!(matches!(
            AudioSource::new("  "),
            Err(PlaybackError::InvalidSource(_))
        ));
    }

    #[test]
    fn test_identifier_includes_hints() {
        let source = AudioSource::new("https://cdn.example/a")
            .unwrap()
            .with_mime_hint("audio/ogg; codecs=opus")
            .with_file_name_hint("kyrie.ogg");

        assert_eq!(
            source.identifier(),
            "https://cdn.example/a kyrie.ogg audio/ogg; codecs=opus"
        );
    }

    #[test]
    fn test_identifier_without_hints_is_url() {
        let source = AudioSource::new("/audio/gloria.mp3").unwrap();
        assert_eq!(source.identifier(), "/audio/gloria.mp3");
    }
}
