//! Transcoding Engine Implementation using an ffmpeg subprocess
//!
//! The "virtual filesystem" of the engine is a private scratch directory.
//! Names passed by the core are plain file names inside that directory, and
//! ffmpeg runs with it as working directory so the same names can be used
//! in its arguments.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    transcode::{ProgressCallback, TranscodingEngine},
};
use bytes::Bytes;
use core_async::fs;
use core_async::sync::Mutex;
use std::collections::VecDeque;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Lines of ffmpeg diagnostics kept for error messages.
const ERROR_CONTEXT_LINES: usize = 4;

/// ffmpeg-backed [`TranscodingEngine`] for desktop hosts.
pub struct FfmpegEngine {
    ffmpeg_path: PathBuf,
    scratch: Mutex<Option<TempDir>>,
    loaded: AtomicBool,
}

impl FfmpegEngine {
    /// Engine running the `ffmpeg` found on `PATH`
    pub fn new() -> Self {
        Self::with_binary("ffmpeg")
    }

    pub fn with_binary(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            scratch: Mutex::new(None),
            loaded: AtomicBool::new(false),
        }
    }

    async fn check_binary(&self) -> Result<()> {
        let status = Command::new(&self.ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| {
                BridgeError::NotAvailable(format!(
                    "ffmpeg not runnable at {}: {}",
                    self.ffmpeg_path.display(),
                    e
                ))
            })?;

        if !status.success() {
            return Err(BridgeError::NotAvailable(format!(
                "ffmpeg at {} exited with {}",
                self.ffmpeg_path.display(),
                status
            )));
        }
        Ok(())
    }

    async fn prepare_scratch(&self) -> Result<()> {
        let mut scratch = self.scratch.lock().await;
        if scratch.is_none() {
            let dir = tempfile::Builder::new()
                .prefix("repertory-transcode-")
                .tempdir()?;
            debug!(path = ?dir.path(), "Created transcoding scratch directory");
            *scratch = Some(dir);
        }
        Ok(())
    }

    async fn scratch_dir(&self) -> Result<PathBuf> {
        self.scratch
            .lock()
            .await
            .as_ref()
            .map(|dir| dir.path().to_path_buf())
            .ok_or_else(|| BridgeError::NotAvailable("Transcoding engine is not loaded".to_string()))
    }

    async fn resolve(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.scratch_dir().await?.join(name))
    }
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranscodingEngine for FfmpegEngine {
    async fn load(&self) -> Result<()> {
        if self.is_loaded() {
            return Ok(());
        }
        self.check_binary().await?;
        self.prepare_scratch().await?;
        self.loaded.store(true, Ordering::SeqCst);
        info!(ffmpeg = %self.ffmpeg_path.display(), "ffmpeg engine loaded");
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    async fn write_file(&self, name: &str, data: Bytes) -> Result<()> {
        let path = self.resolve(name).await?;
        fs::write(&path, &data).await?;
        debug!(file = name, bytes = data.len(), "Wrote engine input");
        Ok(())
    }

    async fn exec(&self, args: &[String], progress: ProgressCallback) -> Result<()> {
        let dir = self.scratch_dir().await?;

        let mut child = Command::new(&self.ffmpeg_path)
            .args(["-hide_banner", "-nostdin", "-y"])
            .args(args)
            .current_dir(&dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to start ffmpeg: {}", e)))?;

        let diagnostics = match child.stderr.take() {
            Some(stderr) => follow_progress(stderr, &progress).await?,
            None => VecDeque::new(),
        };

        let status = child.wait().await?;
        if !status.success() {
            let detail = diagnostics.into_iter().collect::<Vec<_>>().join(" | ");
            warn!(%status, %detail, "ffmpeg failed");
            return Err(BridgeError::OperationFailed(format!(
                "ffmpeg exited with {}: {}",
                status, detail
            )));
        }

        progress(1.0);
        Ok(())
    }

    async fn read_file(&self, name: &str) -> Result<Bytes> {
        let path = self.resolve(name).await?;
        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(BridgeError::OperationFailed(
                format!("{} was not produced", name),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_file(&self, name: &str) -> Result<()> {
        let path = self.resolve(name).await?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn terminate(&self) -> Result<()> {
        self.loaded.store(false, Ordering::SeqCst);
        let dir = self.scratch.lock().await.take();
        if let Some(dir) = dir {
            core_async::task::spawn_blocking(move || dir.close())
                .await
                .map_err(|e| BridgeError::OperationFailed(e.to_string()))??;
            debug!("Removed transcoding scratch directory");
        }
        Ok(())
    }
}

/// Rejects names that would escape the scratch directory.
fn validate_name(name: &str) -> Result<()> {
    let path = Path::new(name);
    let plain = !name.is_empty()
        && path.file_name().is_some_and(|file| file == path.as_os_str())
        && name != "."
        && name != "..";
    if plain {
        Ok(())
    } else {
        Err(BridgeError::InvalidInput(format!(
            "Invalid engine file name: {:?}",
            name
        )))
    }
}

/// Reads ffmpeg's stderr to the end, reporting progress as it goes.
/// Returns the last diagnostic lines.
async fn follow_progress<R>(mut stderr: R, progress: &ProgressCallback) -> Result<VecDeque<String>>
where
    R: AsyncRead + Unpin,
{
    let mut tracker = ProgressTracker::default();
    let mut pending = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let read = stderr.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        pending.extend_from_slice(&chunk[..read]);

        // Progress lines end with '\r', everything else with '\n'.
        while let Some(pos) = pending.iter().position(|b| *b == b'\r' || *b == b'\n') {
            let line: Vec<u8> = pending.drain(..=pos).collect();
            if let Some(ratio) = tracker.observe(&String::from_utf8_lossy(&line)) {
                progress(ratio);
            }
        }
    }
    if !pending.is_empty() {
        tracker.observe(&String::from_utf8_lossy(&pending));
    }

    Ok(tracker.recent)
}

/// Parses ffmpeg's stderr into progress ratios.
#[derive(Debug, Default)]
struct ProgressTracker {
    total_seconds: Option<f64>,
    recent: VecDeque<String>,
}

impl ProgressTracker {
    fn observe(&mut self, line: &str) -> Option<f64> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        if self.total_seconds.is_none() {
            if let Some(total) = field_timestamp(line, "Duration:") {
                self.total_seconds = Some(total);
                return None;
            }
        }

        if let Some(current) = field_timestamp(line, "time=") {
            let total = self.total_seconds.filter(|t| *t > 0.0)?;
            return Some((current / total).clamp(0.0, 1.0));
        }

        if self.recent.len() == ERROR_CONTEXT_LINES {
            self.recent.pop_front();
        }
        self.recent.push_back(line.to_string());
        None
    }
}

/// Timestamp following `key` in `line`, e.g. `time=00:01:02.50`.
fn field_timestamp(line: &str, key: &str) -> Option<f64> {
    let start = line.find(key)? + key.len();
    let value = line[start..].trim_start();
    let end = value
        .find(|c: char| c == ',' || c.is_whitespace())
        .unwrap_or(value.len());
    parse_timestamp(&value[..end])
}

/// Parses `HH:MM:SS.ss` into seconds. `N/A` and malformed values yield
/// `None`.
fn parse_timestamp(value: &str) -> Option<f64> {
    let mut parts = value.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || hours < 0.0 || minutes < 0.0 || seconds < 0.0 {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("00:03:05.50"), Some(185.5));
        assert_eq!(parse_timestamp("01:00:00.00"), Some(3600.0));
        assert_eq!(parse_timestamp("N/A"), None);
        assert_eq!(parse_timestamp("12.5"), None);
    }

    #[test]
    fn test_progress_tracker() {
        let mut tracker = ProgressTracker::default();

        assert_eq!(
            tracker.observe("  Duration: 00:02:00.00, start: 0.000000, bitrate: 1411 kb/s"),
            None
        );
        let ratio = tracker.observe(
            "size=     512kB time=00:00:30.00 bitrate= 139.8kbits/s speed=60.1x",
        );
        assert_eq!(ratio, Some(0.25));

        // A later stream's duration does not replace the input duration.
        tracker.observe("  Duration: 00:00:10.00, start: 0.000000");
        assert_eq!(tracker.observe("time=00:01:00.00 bitrate=N/A"), Some(0.5));
    }

    #[test]
    fn test_progress_without_duration_is_silent() {
        let mut tracker = ProgressTracker::default();
        assert_eq!(tracker.observe("size=N/A time=00:00:05.00 bitrate=N/A"), None);
    }

    #[test]
    fn test_tracker_keeps_recent_diagnostics() {
        let mut tracker = ProgressTracker::default();
        for i in 0..6 {
            tracker.observe(&format!("line {i}"));
        }
        tracker.observe("input-1.ogg: Invalid data found when processing input");

        assert_eq!(tracker.recent.len(), ERROR_CONTEXT_LINES);
        assert_eq!(
            tracker.recent.back().map(String::as_str),
            Some("input-1.ogg: Invalid data found when processing input")
        );
    }

    #[tokio::test]
    async fn test_follow_progress_splits_carriage_returns() {
        let stderr: &[u8] = b"  Duration: 00:00:10.00, start: 0.0\n\
            size=1kB time=00:00:02.50 bitrate=1k\rsize=2kB time=00:00:05.00 bitrate=1k\r\
            Conversion failed!\n";
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        let progress: ProgressCallback = Arc::new(move |ratio| sink.lock().unwrap().push(ratio));

        let recent = follow_progress(stderr, &progress).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![0.25, 0.5]);
        assert_eq!(recent.back().map(String::as_str), Some("Conversion failed!"));
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("input-abc.wav").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("../etc/passwd").is_err());
        assert!(validate_name("nested/file.wav").is_err());
    }

    #[tokio::test]
    async fn test_virtual_files_live_in_scratch_dir() {
        let engine = FfmpegEngine::new();
        engine.prepare_scratch().await.unwrap();

        engine
            .write_file("input-1.wav", Bytes::from_static(b"RIFF"))
            .await
            .unwrap();
        assert_eq!(
            engine.read_file("input-1.wav").await.unwrap(),
            Bytes::from_static(b"RIFF")
        );

        engine.delete_file("input-1.wav").await.unwrap();
        engine.delete_file("input-1.wav").await.unwrap();
        assert!(matches!(
            engine.read_file("input-1.wav").await,
            Err(BridgeError::OperationFailed(_))
        ));

        let dir = engine.scratch_dir().await.unwrap();
        engine.terminate().await.unwrap();
        assert!(!dir.exists());
        assert!(engine.write_file("x.wav", Bytes::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_binary_is_not_available() {
        let engine = FfmpegEngine::with_binary("/nonexistent/ffmpeg-binary");

        let err = engine.load().await.unwrap_err();

        assert!(matches!(err, BridgeError::NotAvailable(_)));
        assert!(!engine.is_loaded());
    }
}
