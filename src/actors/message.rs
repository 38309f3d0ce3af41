use crate::{media::MediaSignal, playback::PlaybackState, types::ClipId};

/// Everything the feed event loop reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// New scroll offset sample of the feed
    Scroll { offset: f64 },
    /// The height of one clip changed
    Resize { viewport_height: f64 },
    Intent(UserIntent),
    Media(MediaSignal),
    /// Stop the event loop
    Shutdown,
}

/// What the user asked for through the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserIntent {
    /// Tap on the active clip
    TogglePlayback,
    OpenOverlay,
    CloseOverlay,
}

/// Snapshot of one clip for display
#[derive(Debug, Clone, PartialEq)]
pub struct ClipView {
    pub index: usize,
    pub clip: ClipId,
    pub state: PlaybackState,
    /// Whether the clip source was warm when the snapshot was taken
    pub preloaded: bool,
    /// Poster to show in place of the video
    pub poster: Option<String>,
}

/// What the feed reports to the UI
#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    ActiveIndex { index: usize, clip: ClipId },
    Playback(ClipView),
}
