use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};

use crate::{
    catalog::ClipDescriptor,
    config::PlaybackSettings,
    media::{
        HandleId, MediaContext, MediaResource, MediaSignal, OpenOptions, ReadyState, SignalKind,
        Signals,
    },
    preload::PreloadRegistry,
    result::Error,
    timer::{TimerQueue, TimerTarget},
    types::{ClipId, Progress, SourceUri},
};

use super::{PauseCause, PlaybackState};

/// Drives the playback of the clip occupying the viewport.
///
/// A controller is bound to a single clip for its whole life: showing
/// another clip, or the same clip again, means building a fresh controller.
/// Signals and timers that arrive once the controller is not active anymore
/// are ignored.
#[derive(Debug)]
pub struct PlaybackController {
    index: usize,
    clip: ClipId,
    source: SourceUri,
    poster: String,

    load_timeout: Duration,
    looping: bool,
    muted: bool,

    state: PlaybackState,
    media: Option<(HandleId, Box<dyn MediaResource>)>,
    active: bool,
    overlay_open: bool,

    /// Transitions not yet reported to the UI
    updates: Vec<PlaybackState>,
}

impl PlaybackController {
    pub fn new(index: usize, clip: &ClipDescriptor, settings: &PlaybackSettings) -> Self {
        Self {
            index,
            clip: clip.id.clone(),
            source: clip.source.clone(),
            poster: clip.poster.clone(),
            load_timeout: settings.load_timeout(),
            looping: settings.looping,
            muted: settings.muted,
            state: PlaybackState::Idle,
            media: None,
            active: false,
            overlay_open: false,
            updates: Vec::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn clip(&self) -> &ClipId {
        &self.clip
    }

    pub fn source(&self) -> &SourceUri {
        &self.source
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn handle(&self) -> Option<HandleId> {
        self.media.as_ref().map(|(handle, _)| *handle)
    }

    /// The poster to display instead of the video, if any
    #[cfg(test)]
    pub fn poster_fallback(&self) -> Option<&str> {
        self.state.shows_poster().then_some(self.poster.as_str())
    }

    pub fn poster(&self) -> &str {
        &self.poster
    }

    pub fn take_updates(&mut self) -> Vec<PlaybackState> {
        std::mem::take(&mut self.updates)
    }

    fn transition(&mut self, next: PlaybackState) {
        if self.state == next {
            return;
        }

        debug!("Clip {} {}: {} -> {next}", self.index, self.clip, self.state);
        self.state = next;
        self.updates.push(next);
    }

    fn resource(&mut self) -> Option<&mut Box<dyn MediaResource>> {
        self.media.as_mut().map(|(_, resource)| resource)
    }

    fn fail(&mut self, err: Error) {
        error!("Clip {} {}: {err}", self.index, self.clip);
        self.transition(PlaybackState::Errored);
    }

    /// The clip became the active one: open its resource and either play it
    /// right away if it is warm, or start loading it.
    pub fn activate(
        &mut self,
        registry: &PreloadRegistry,
        media: &mut MediaContext,
        timers: &mut TimerQueue,
        now: Instant,
    ) {
        if self.state != PlaybackState::Idle {
            debug!("Clip {} already activated once, ignoring", self.index);
            return;
        }
        self.active = true;

        let options = OpenOptions {
            muted: self.muted,
            rendered: true,
            looping: self.looping,
        };

        let (handle, mut resource) = match media.open(&self.source, options) {
            Ok(opened) => opened,
            Err(err) => {
                self.transition(PlaybackState::Loading {
                    progress: Progress::default(),
                });
                self.fail(err);
                return;
            }
        };

        resource.subscribe(Signals::ENDED);

        let preloaded = registry.is_warm(&self.source);
        if preloaded && resource.ready_state() >= ReadyState::FutureData {
            info!("Clip {} is preloaded, playing it right away", self.index);
            self.media = Some((handle, resource));
            self.transition(PlaybackState::Loading {
                progress: Progress::COMPLETE,
            });
            self.attempt_play();
            return;
        }

        if preloaded {
            debug!("Clip {} is preloaded but not ready yet, waiting", self.index);
        } else {
            debug!("Clip {} is not preloaded, starting load", self.index);
        }

        resource.subscribe(Signals::PROGRESS | Signals::CAN_PLAY_THROUGH);
        resource.start_load();
        self.media = Some((handle, resource));
        timers.schedule(now, self.load_timeout, TimerTarget::Load(handle));

        self.transition(PlaybackState::Loading {
            progress: Progress::default(),
        });
    }

    /// The clip left the viewport
    pub fn deactivate(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;

        match self.state {
            PlaybackState::Playing | PlaybackState::Ready => self.pause(PauseCause::Inactive),
            // An unfinished load is abandoned, its late signals will be ignored
            PlaybackState::Loading { .. } => debug!("Clip {} load abandoned", self.index),
            _ => (),
        }
    }

    fn pause(&mut self, cause: PauseCause) {
        if let Some(resource) = self.resource() {
            resource.pause();
        }
        self.transition(PlaybackState::Paused(cause));
    }

    fn attempt_play(&mut self) {
        match self.resource() {
            Some(resource) => resource.play(),
            None => return,
        }
        self.transition(PlaybackState::Ready);
    }

    /// Route a signal of this controller's resource to its transition
    pub fn on_signal(&mut self, signal: &MediaSignal) {
        if self.handle() != Some(signal.handle) {
            trace!("Clip {}: signal of another resource, ignoring", self.index);
            return;
        }

        match &signal.kind {
            SignalKind::Progress => self.on_progress(),
            SignalKind::CanPlayThrough => self.on_data_sufficient(),
            SignalKind::Ended => self.on_ended(),
            SignalKind::Error(reason) => self.on_media_error(reason),
            SignalKind::PlayResolved(result) => self.on_play_resolved(result),
            SignalKind::LoadedData => (),
        }
    }

    fn on_progress(&mut self) {
        if !self.active || !matches!(self.state, PlaybackState::Loading { .. }) {
            return;
        }

        let Some(resource) = self.resource() else {
            return;
        };
        let (Some(end), Some(duration)) = (resource.buffered_end(), resource.duration()) else {
            return;
        };

        if let Some(progress) = Progress::from_buffered(end, duration) {
            self.transition(PlaybackState::Loading { progress });
        }
    }

    fn on_data_sufficient(&mut self) {
        if !self.active || !matches!(self.state, PlaybackState::Loading { .. }) {
            trace!("Clip {}: late data signal, ignoring", self.index);
            return;
        }

        info!("Clip {} can play through", self.index);
        self.attempt_play();
    }

    /// The deadline of the load ran out
    pub fn on_load_timeout(&mut self, handle: HandleId) {
        if self.handle() != Some(handle)
            || !self.active
            || !matches!(self.state, PlaybackState::Loading { .. })
        {
            trace!("Clip {}: late load timeout, ignoring", self.index);
            return;
        }

        warn!(
            "Clip {}: {}, attempting to play anyway",
            self.index,
            Error::LoadTimeout
        );
        self.attempt_play();
    }

    fn on_play_resolved(&mut self, result: &std::result::Result<(), String>) {
        match (self.state, result) {
            (PlaybackState::Ready, Ok(())) if self.overlay_open => {
                debug!("Clip {} started under the overlay, pausing it", self.index);
                self.pause(PauseCause::Overlay);
            }
            (PlaybackState::Ready, Ok(())) => {
                info!("Clip {} {} playing", self.index, self.clip);
                self.transition(PlaybackState::Playing);
            }
            (PlaybackState::Ready | PlaybackState::Playing, Err(reason)) => {
                self.fail(Error::DecodeOrNetworkFailure(reason.clone()));
            }
            (state, _) => trace!(
                "Clip {}: play answer while {state}, ignoring",
                self.index
            ),
        }
    }

    fn on_media_error(&mut self, reason: &str) {
        if !self.active || matches!(self.state, PlaybackState::Idle | PlaybackState::Errored) {
            trace!("Clip {}: late error, ignoring: {reason}", self.index);
            return;
        }

        self.fail(Error::DecodeOrNetworkFailure(reason.to_owned()));
    }

    fn on_ended(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }

        if self.looping {
            trace!("Clip {} looping", self.index);
            if let Some(resource) = self.resource() {
                resource.seek_to_start();
                resource.play();
            }
        } else {
            self.transition(PlaybackState::Paused(PauseCause::Ended));
        }
    }

    /// The user tapped the clip
    pub fn toggle(&mut self) {
        if !self.active || self.overlay_open {
            return;
        }

        match self.state {
            PlaybackState::Playing => self.pause(PauseCause::User),
            PlaybackState::Paused(cause) => {
                if cause == PauseCause::Ended {
                    if let Some(resource) = self.resource() {
                        resource.seek_to_start();
                    }
                }
                self.attempt_play();
            }
            state => debug!("Clip {}: tap while {state}, ignoring", self.index),
        }
    }

    /// An overlay now covers the clip
    pub fn open_overlay(&mut self) {
        self.overlay_open = true;
        if matches!(self.state, PlaybackState::Playing | PlaybackState::Ready) {
            self.pause(PauseCause::Overlay);
        }
    }

    /// The overlay went away. The clip stays paused until tapped.
    pub fn close_overlay(&mut self) {
        self.overlay_open = false;
    }
}
