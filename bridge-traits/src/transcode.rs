//! Transcoding engine bridge.
//!
//! Models an ffmpeg-style engine: inputs are written into a virtual
//! filesystem, a command line is executed against those names, and outputs
//! are read back. The engine is expensive to load and cheap to reuse, so the
//! core loads it once and shares it.
//!
//! Engines are not required to be re-entrant. Callers serialise access.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

use crate::error::Result;

/// Progress callback invoked with a ratio in `0.0..=1.0`.
pub type ProgressCallback = Arc<dyn Fn(f64) + Send + Sync>;

#[async_trait]
pub trait TranscodingEngine: Send + Sync {
    /// Load the engine core. Calling it on a loaded engine is a no-op.
    async fn load(&self) -> Result<()>;

    fn is_loaded(&self) -> bool;

    /// Store `data` under `name` in the engine's virtual filesystem.
    async fn write_file(&self, name: &str, data: Bytes) -> Result<()>;

    /// Run the engine with `args`, which reference virtual file names.
    async fn exec(&self, args: &[String], progress: ProgressCallback) -> Result<()>;

    async fn read_file(&self, name: &str) -> Result<Bytes>;

    async fn delete_file(&self, name: &str) -> Result<()>;

    /// Release the engine core. The engine may be loaded again afterwards.
    async fn terminate(&self) -> Result<()> {
        Ok(())
    }
}
