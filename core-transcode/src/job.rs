//! # Conversion Jobs
//!
//! Lifecycle of a single upload conversion.
//!
//! ```text
//! NotNeeded                (compatible upload, passed through)
//! Queued → Running → Done
//!    ↓        ↓
//!    └─────→ Failed
//! ```

use crate::error::{ConversionStage, Result, TranscodeError};
use crate::format::{needs_conversion, AudioFile};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversionJobId(Uuid);

impl ConversionJobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Short form used in virtual file names.
    pub fn simple(&self) -> String {
        self.0.simple().to_string()
    }
}

impl Default for ConversionJobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConversionJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Status & Progress
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionStatus {
    /// The upload is already in a compatible format.
    NotNeeded,
    Queued,
    Running,
    Done,
    Failed,
}

impl ConversionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConversionStatus::NotNeeded | ConversionStatus::Done | ConversionStatus::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionStatus::NotNeeded => "not_needed",
            ConversionStatus::Queued => "queued",
            ConversionStatus::Running => "running",
            ConversionStatus::Done => "done",
            ConversionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ConversionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse phase of a running conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversionMilestone {
    /// Engine loading and input staging.
    Preparing,
    Converting,
    /// Reading the output back and cleaning up.
    Finalizing,
}

/// Progress report delivered to callers of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionProgress {
    pub milestone: ConversionMilestone,
    /// 0..=100
    pub percent: u8,
}

impl ConversionProgress {
    pub fn new(milestone: ConversionMilestone, percent: u8) -> Self {
        Self {
            milestone,
            percent: percent.min(100),
        }
    }

    /// Converts an engine progress ratio into a `Converting` report.
    pub fn from_ratio(ratio: f64) -> Self {
        let percent = if ratio.is_finite() {
            (ratio.clamp(0.0, 1.0) * 100.0).round() as u8
        } else {
            0
        };
        Self::new(ConversionMilestone::Converting, percent)
    }
}

// ============================================================================
// Conversion Job
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionJob {
    pub id: ConversionJobId,
    pub source: AudioFile,
    pub status: ConversionStatus,
    pub progress_percent: u8,
    pub result: Option<AudioFile>,
    pub error_message: Option<String>,
    pub failed_stage: Option<ConversionStage>,
}

impl ConversionJob {
    /// Creates a job for `source`, already terminal when no conversion is
    /// needed.
    pub fn new(source: AudioFile) -> Self {
        let status = if needs_conversion(&source) {
            ConversionStatus::Queued
        } else {
            ConversionStatus::NotNeeded
        };
        Self {
            id: ConversionJobId::new(),
            source,
            status,
            progress_percent: 0,
            result: None,
            error_message: None,
            failed_stage: None,
        }
    }

    pub fn start(&mut self) -> Result<()> {
        self.transition(ConversionStatus::Running)
    }

    /// Progress never moves backwards.
    pub fn update_progress(&mut self, percent: u8) {
        if self.status == ConversionStatus::Running {
            self.progress_percent = self.progress_percent.max(percent.min(100));
        }
    }

    pub fn complete(&mut self, output: AudioFile) -> Result<()> {
        self.transition(ConversionStatus::Done)?;
        self.progress_percent = 100;
        self.result = Some(output);
        Ok(())
    }

    pub fn fail(&mut self, stage: ConversionStage, message: impl Into<String>) -> Result<()> {
        self.transition(ConversionStatus::Failed)?;
        self.failed_stage = Some(stage);
        self.error_message = Some(message.into());
        Ok(())
    }

    /// The file to store: the conversion result, or the source when no
    /// conversion was needed.
    pub fn into_output(self) -> Option<AudioFile> {
        match self.status {
            ConversionStatus::NotNeeded => Some(self.source),
            ConversionStatus::Done => self.result,
            _ => None,
        }
    }

    fn transition(&mut self, to: ConversionStatus) -> Result<()> {
        let valid = matches!(
            (self.status, to),
            (ConversionStatus::Queued, ConversionStatus::Running)
                | (ConversionStatus::Queued, ConversionStatus::Failed)
                | (ConversionStatus::Running, ConversionStatus::Done)
                | (ConversionStatus::Running, ConversionStatus::Failed)
        );
        if !valid {
            return Err(TranscodeError::InvalidStateTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        Ok(())
    }
}
