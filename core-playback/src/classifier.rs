//! # Format Classifier
//!
//! Decides whether a playback failure is explained by the client being unable
//! to decode the OPUS/Ogg codec family (iOS, iPadOS and desktop Safari).
//!
//! The classifier never blocks playback. Native decode is always attempted
//! first; the verdict only selects which message is shown once the attempt
//! has failed, because codec support cannot be queried reliably and has to
//! be inferred from the environment.

use crate::source::AudioSource;
use serde::{Deserialize, Serialize};

/// Shown when a restricted client fails on a restricted-codec source.
pub const INCOMPATIBLE_FORMAT_MESSAGE: &str = "This audio file uses the OPUS/Ogg format, which is not \
supported on iPhone, iPad or Safari. Please contact an administrator to upload an MP3 version of this file.";

/// Shown for every other failure.
pub const GENERIC_PLAYBACK_MESSAGE: &str =
    "The audio file could not be loaded. Please check your connection and try again.";

/// Substrings of a lower-cased URL or file name that indicate the
/// restricted codec family.
const INCOMPATIBLE_MARKERS: &[&str] = &["opus", ".ogg", ".oga", ".webm"];

/// Browser tokens that rule out desktop Safari even though the User-Agent
/// also contains `Safari`.
const NON_SAFARI_TOKENS: &[&str] = &["Chrome", "Chromium", "CriOS", "FxiOS", "Edg", "OPR", "Android"];

/// What the host knows about its client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientEnvironment {
    pub user_agent: String,
    /// `navigator.maxTouchPoints`, 0 on non-touch devices.
    pub max_touch_points: u32,
}

impl ClientEnvironment {
    pub fn new(user_agent: impl Into<String>, max_touch_points: u32) -> Self {
        Self {
            user_agent: user_agent.into(),
            max_touch_points,
        }
    }
}

/// `true` when the client is iOS, iPadOS in desktop mode, or desktop Safari.
///
/// Best-effort User-Agent heuristic.
pub fn is_restricted_playback_environment(env: &ClientEnvironment) -> bool {
    let ua = env.user_agent.as_str();

    let ios_device = ["iPhone", "iPad", "iPod"].iter().any(|t| ua.contains(t));
    // iPadOS 13+ reports a Macintosh User-Agent; only touch support gives it away.
    let ipad_desktop_mode = ua.contains("Macintosh") && env.max_touch_points > 1;
    let desktop_safari =
        ua.contains("Safari") && !NON_SAFARI_TOKENS.iter().any(|t| ua.contains(t));

    ios_device || ipad_desktop_mode || desktop_safari
}

/// `true` when `identifier` contains a restricted-codec marker.
///
/// False negatives are acceptable; see the module docs.
pub fn is_probably_incompatible_format(identifier: &str) -> bool {
    let lower = identifier.to_lowercase();
    INCOMPATIBLE_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Decoding capability of the client, as far as the core can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackCapability {
    Unrestricted,
    /// Native decode of OPUS/Ogg is expected to fail or hang.
    OpusRestricted,
}

impl PlaybackCapability {
    pub fn is_restricted(self) -> bool {
        self == PlaybackCapability::OpusRestricted
    }
}

/// Source of the [`PlaybackCapability`] verdict.
///
/// The default probe reads the User-Agent. Hosts that can run real feature
/// detection (e.g. `canPlayType('audio/ogg; codecs=opus')`) supply their own.
pub trait CapabilityProbe: Send + Sync {
    fn probe(&self) -> PlaybackCapability;
}

/// User-Agent based probe.
#[derive(Debug, Clone)]
pub struct UserAgentProbe {
    env: ClientEnvironment,
}

impl UserAgentProbe {
    pub fn new(env: ClientEnvironment) -> Self {
        Self { env }
    }
}

impl CapabilityProbe for UserAgentProbe {
    fn probe(&self) -> PlaybackCapability {
        if is_restricted_playback_environment(&self.env) {
            PlaybackCapability::OpusRestricted
        } else {
            PlaybackCapability::Unrestricted
        }
    }
}

/// Probe with a verdict fixed by the host.
#[derive(Debug, Clone, Copy)]
pub struct FixedCapability(pub PlaybackCapability);

impl CapabilityProbe for FixedCapability {
    fn probe(&self) -> PlaybackCapability {
        self.0
    }
}

/// How a playback attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// No readiness with a positive duration within the timeout.
    ReadinessTimeout,
    /// The engine reported an error (or could not be created or loaded).
    Engine(String),
}

/// Classified playback failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackFailure {
    IncompatibleEnvironment,
    Generic,
}

impl PlaybackFailure {
    /// User-facing message.
    pub fn message(&self) -> &'static str {
        match self {
            PlaybackFailure::IncompatibleEnvironment => INCOMPATIBLE_FORMAT_MESSAGE,
            PlaybackFailure::Generic => GENERIC_PLAYBACK_MESSAGE,
        }
    }

    pub fn is_incompatible(&self) -> bool {
        matches!(self, PlaybackFailure::IncompatibleEnvironment)
    }
}

/// Attribute a failure to the restricted environment or to a generic cause.
///
/// Timeouts and engine errors are classified the same way: only the pairing
/// of a restricted client with a restricted-codec source yields
/// [`PlaybackFailure::IncompatibleEnvironment`].
pub fn classify_failure(
    kind: &FailureKind,
    source: &AudioSource,
    capability: PlaybackCapability,
) -> PlaybackFailure {
    let failure = if capability.is_restricted() && is_probably_incompatible_format(&source.identifier()) {
        PlaybackFailure::IncompatibleEnvironment
    } else {
        PlaybackFailure::Generic
    };

    tracing::debug!(?kind, ?capability, ?failure, "Classified playback failure");
    failure
}
