mod controller;

use std::fmt::Display;

pub use controller::PlaybackController;

use crate::types::Progress;

/// Why a clip stopped playing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseCause {
    /// The user tapped the clip
    User,
    /// The clip left the viewport
    Inactive,
    /// An overlay, e.g. the comments panel, covers the clip
    Overlay,
    /// The clip reached its end and does not loop
    Ended,
}

impl PauseCause {
    /// Forced pauses never resume by themselves
    pub fn is_forced(self) -> bool {
        matches!(self, PauseCause::Inactive | PauseCause::Overlay)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Loading { progress: Progress },
    /// Playback has been requested, waiting for the media answer
    Ready,
    Playing,
    Paused(PauseCause),
    /// Terminal for the controller instance
    Errored,
}

impl PlaybackState {
    /// Whether the poster stands in for the video in this state
    pub fn shows_poster(self) -> bool {
        matches!(
            self,
            PlaybackState::Idle | PlaybackState::Loading { .. } | PlaybackState::Errored
        )
    }
}

impl Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Loading { progress } => write!(f, "loading {progress}"),
            PlaybackState::Ready => write!(f, "ready"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused(cause) => write!(f, "paused ({cause:?})"),
            PlaybackState::Errored => write!(f, "errored"),
        }
    }
}
