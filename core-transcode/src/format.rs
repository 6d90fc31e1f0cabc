//! # Upload Format Rules
//!
//! Decides whether an uploaded file must be re-encoded before it is stored.
//!
//! The universal target is MP3 (`audio/mpeg`), which every supported client
//! can decode natively. Files whose MIME type or extension is on the
//! deny-list are converted; everything else is stored as uploaded. A file
//! that matches neither list is assumed to be playable, so unknown formats
//! never block an upload.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// MIME type of converted files.
pub const TARGET_MIME_TYPE: &str = "audio/mpeg";

/// Extension of converted files, without the dot.
pub const TARGET_EXTENSION: &str = "mp3";

const TARGET_MIME_TYPES: &[&str] = &["audio/mpeg", "audio/mp3"];

const DENIED_MIME_TYPES: &[&str] = &[
    "audio/ogg",
    "audio/opus",
    "audio/webm",
    "audio/flac",
    "audio/x-flac",
    "audio/wav",
    "audio/x-wav",
    "audio/wave",
    "audio/vnd.wave",
    "audio/aiff",
    "audio/x-aiff",
    "audio/x-ms-wma",
    "audio/amr",
];

const DENIED_EXTENSIONS: &[&str] = &[
    "ogg", "oga", "opus", "webm", "flac", "wav", "aif", "aiff", "wma", "amr", "ape",
];

/// An uploaded or converted audio file held in memory.
///
/// Cloning is cheap: the payload is a reference-counted [`Bytes`] buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFile {
    pub name: String,
    /// As declared by the uploader; may be empty.
    pub mime_type: String,
    #[serde(skip)]
    pub data: Bytes,
}

impl AudioFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Lower-cased extension of the file name, without the dot.
    ///
    /// Names without a dot, or whose only dot is the first character
    /// (`.hidden`), have no extension.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.name).map(str::to_ascii_lowercase)
    }

    /// Declared MIME type without parameters, lower-cased.
    pub fn essence_mime_type(&self) -> String {
        self.mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

fn extension_of(name: &str) -> Option<&str> {
    match name.rfind('.') {
        Some(0) | None => None,
        Some(idx) if idx + 1 < name.len() => Some(&name[idx + 1..]),
        Some(_) => None,
    }
}

/// Whether `file` has to be converted to MP3 before it is stored.
///
/// ```
/// use core_transcode::format::{needs_conversion, AudioFile};
///
/// assert!(needs_conversion(&AudioFile::new("kyrie.wav", "audio/wav", vec![0u8; 4])));
/// assert!(needs_conversion(&AudioFile::new("gloria.OPUS", "", vec![])));
/// assert!(!needs_conversion(&AudioFile::new("sanctus.mp3", "audio/mpeg", vec![])));
/// assert!(!needs_conversion(&AudioFile::new("notes.m4a", "audio/mp4", vec![])));
/// ```
pub fn needs_conversion(file: &AudioFile) -> bool {
    let mime = file.essence_mime_type();
    let extension = file.extension();
    let extension = extension.as_deref();

    if TARGET_MIME_TYPES.contains(&mime.as_str()) || extension == Some(TARGET_EXTENSION) {
        return false;
    }

    DENIED_MIME_TYPES.contains(&mime.as_str())
        || extension.is_some_and(|ext| DENIED_EXTENSIONS.contains(&ext))
}

/// Name of the converted file: the base name with an `.mp3` extension.
///
/// ```
/// use core_transcode::format::converted_file_name;
///
/// assert_eq!(converted_file_name("Ave Verum - Tenor.wav"), "Ave Verum - Tenor.mp3");
/// assert_eq!(converted_file_name("take.2.flac"), "take.2.mp3");
/// assert_eq!(converted_file_name("rehearsal"), "rehearsal.mp3");
/// ```
pub fn converted_file_name(name: &str) -> String {
    let base = match extension_of(name) {
        Some(ext) => &name[..name.len() - ext.len() - 1],
        None => name,
    };
    format!("{base}.{TARGET_EXTENSION}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, mime: &str) -> AudioFile {
        AudioFile::new(name, mime, Bytes::from_static(b"RIFF"))
    }

    #[test]
    fn test_denied_mime_types_need_conversion() {
        for mime in DENIED_MIME_TYPES {
            assert!(needs_conversion(&file("upload", mime)), "{mime}");
        }
    }

    #[test]
    fn test_denied_extensions_need_conversion() {
        for ext in DENIED_EXTENSIONS {
            let name = format!("part.{ext}");
            assert!(needs_conversion(&file(&name, "")), "{name}");
        }
    }

    #[test]
    fn test_target_format_wins_over_deny_list() {
        // Browsers sometimes report odd MIME types for perfectly good MP3s.
        assert!(!needs_conversion(&file("bass.mp3", "audio/ogg")));
        assert!(!needs_conversion(&file("bass.wav", "audio/mpeg")));
        assert!(!needs_conversion(&file("bass", "audio/mp3")));
    }

    #[test]
    fn test_mime_parameters_and_case_are_ignored() {
        assert!(needs_conversion(&file("clip", "Audio/Ogg; codecs=opus")));
        assert!(needs_conversion(&file("CLIP.FLAC", "")));
    }

    #[test]
    fn test_unknown_or_missing_metadata_is_permissive() {
        assert!(!needs_conversion(&file("", "")));
        assert!(!needs_conversion(&file("recording", "application/octet-stream")));
        assert!(!needs_conversion(&file("alto.m4a", "audio/mp4")));
        assert!(!needs_conversion(&file(".wav", "")));
    }

    #[test]
    fn test_extension_edge_cases() {
        assert_eq!(file("a.tar.WAV", "").extension().as_deref(), Some("wav"));
        assert_eq!(file("trailing.", "").extension(), None);
        assert_eq!(file(".hidden", "").extension(), None);
    }

    #[test]
    fn test_converted_name_keeps_hidden_files_whole() {
        assert_eq!(converted_file_name(".hidden"), ".hidden.mp3");
        assert_eq!(converted_file_name("trailing."), "trailing..mp3");
    }
}
