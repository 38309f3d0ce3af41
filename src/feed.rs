use std::time::Instant;

use tracing::{debug, trace};

use crate::{
    actors::{ClipView, FeedEvent, UiUpdate, UserIntent},
    catalog::ClipCatalog,
    config::{PlaybackSettings, Settings},
    media::{MediaContext, MediaSignal},
    playback::PlaybackController,
    position::FeedPositionTracker,
    preload::{PreloadRegistry, PreloadScheduler},
    timer::{TimerQueue, TimerTarget},
};

/// The whole feed state.
///
/// Every event is processed to completion before returning, which makes
/// the feed the single place where preload and playback state is mutated.
#[derive(Debug)]
pub struct Feed {
    catalog: ClipCatalog,
    playback: PlaybackSettings,

    tracker: FeedPositionTracker,
    registry: PreloadRegistry,
    scheduler: PreloadScheduler,
    media: MediaContext,
    timers: TimerQueue,

    active: Option<PlaybackController>,
    /// The last active controller, paused, until the next index change
    previous: Option<PlaybackController>,

    updates: Vec<UiUpdate>,
}

impl Feed {
    pub fn new(catalog: ClipCatalog, settings: &Settings, media: MediaContext) -> Self {
        Self {
            tracker: FeedPositionTracker::new(settings.feed.viewport_height, catalog.len()),
            scheduler: PreloadScheduler::new(&settings.preload),
            playback: settings.playback.clone(),
            catalog,
            registry: PreloadRegistry::default(),
            media,
            timers: TimerQueue::default(),
            active: None,
            previous: None,
            updates: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn catalog(&self) -> &ClipCatalog {
        &self.catalog
    }

    pub fn registry(&self) -> &PreloadRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &PreloadScheduler {
        &self.scheduler
    }

    pub fn active(&self) -> Option<&PlaybackController> {
        self.active.as_ref()
    }

    pub fn active_index(&self) -> Option<usize> {
        self.tracker.active_index()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Updates produced since the last call, in order
    pub fn take_updates(&mut self) -> Vec<UiUpdate> {
        std::mem::take(&mut self.updates)
    }

    /// Show the top of the feed
    pub fn start(&mut self, now: Instant) {
        self.handle(FeedEvent::Scroll { offset: 0.0 }, now);
    }

    pub fn handle(&mut self, event: FeedEvent, now: Instant) {
        match event {
            FeedEvent::Scroll { offset } => {
                if let Some(index) = self.tracker.sample(offset) {
                    self.on_index_change(index, now);
                }
            }
            FeedEvent::Resize { viewport_height } => {
                if let Some(index) = self.tracker.resize(viewport_height) {
                    self.on_index_change(index, now);
                }
            }
            FeedEvent::Intent(intent) => self.on_intent(intent),
            FeedEvent::Media(signal) => self.on_media_signal(&signal),
            FeedEvent::Shutdown => (),
        }

        self.fire_due_timers(now);
    }

    /// Fire every timer whose deadline is reached
    pub fn fire_due_timers(&mut self, now: Instant) {
        while let Some(target) = self.timers.pop_due(now) {
            match target {
                TimerTarget::Warmup(handle) => self.scheduler.on_timeout(handle, &mut self.registry),
                TimerTarget::Load(handle) => {
                    for controller in self.controllers_mut() {
                        controller.on_load_timeout(handle);
                    }
                }
            }
            self.collect_updates();
        }
    }

    fn controllers_mut(&mut self) -> impl Iterator<Item = &mut PlaybackController> {
        self.active.iter_mut().chain(self.previous.iter_mut())
    }

    fn on_index_change(&mut self, index: usize, now: Instant) {
        let clip = match self.catalog.get(index) {
            Ok(clip) => clip,
            Err(err) => {
                debug!("Ignoring index change: {err}");
                return;
            }
        };
        debug!("Active index is now {index} ({})", clip.id);
        self.updates.push(UiUpdate::ActiveIndex {
            index,
            clip: clip.id.clone(),
        });

        self.scheduler.on_index_change(
            index,
            &self.catalog,
            &mut self.registry,
            &mut self.media,
            &mut self.timers,
            now,
        );

        if let Some(mut old) = self.active.take() {
            old.deactivate();
            // Dropping the former previous controller releases its resource
            self.previous = Some(old);
        }

        let mut controller = PlaybackController::new(index, &self.catalog[index], &self.playback);
        controller.activate(&self.registry, &mut self.media, &mut self.timers, now);
        self.active = Some(controller);

        self.collect_updates();
    }

    fn on_intent(&mut self, intent: UserIntent) {
        let Some(controller) = self.active.as_mut() else {
            debug!("No active clip for {intent:?}");
            return;
        };

        match intent {
            UserIntent::TogglePlayback => controller.toggle(),
            UserIntent::OpenOverlay => controller.open_overlay(),
            UserIntent::CloseOverlay => controller.close_overlay(),
        }
        self.collect_updates();
    }

    fn on_media_signal(&mut self, signal: &MediaSignal) {
        if self.scheduler.owns(signal.handle) {
            self.scheduler.on_signal(signal, &mut self.registry);
            return;
        }

        let mut routed = false;
        for controller in self.controllers_mut() {
            if controller.handle() == Some(signal.handle) {
                controller.on_signal(signal);
                routed = true;
            }
        }

        if routed {
            self.collect_updates();
        } else {
            trace!("{}: Dropping signal of a released resource", signal.handle);
        }
    }

    /// Turn the pending controller transitions into UI updates
    fn collect_updates(&mut self) {
        let registry = &self.registry;
        let updates = &mut self.updates;

        for controller in self.active.iter_mut().chain(self.previous.iter_mut()) {
            for state in controller.take_updates() {
                updates.push(UiUpdate::Playback(ClipView {
                    index: controller.index(),
                    clip: controller.clip().clone(),
                    state,
                    preloaded: registry.is_warm(controller.source()),
                    poster: state.shows_poster().then(|| controller.poster().to_owned()),
                }));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crossbeam_channel::unbounded;

    use super::*;
    use crate::{
        catalog::sample_catalog,
        media::{
            scripted::{Call, ScriptedBackend},
            HandleId, OpenOptions, SignalKind,
        },
        playback::{PauseCause, PlaybackState},
        preload::PreloadStatus,
        types::{Progress, SourceUri},
    };

    const HEIGHT: f64 = 800.0;

    const ACTIVE: OpenOptions = OpenOptions {
        muted: false,
        rendered: true,
        looping: true,
    };

    struct Fixture {
        feed: Feed,
        backend: ScriptedBackend,
        now: Instant,
    }

    impl Fixture {
        fn new(len: usize) -> Self {
            let backend = ScriptedBackend::default();
            let (send, _) = unbounded();
            let mut settings = Settings::default();
            settings.feed.viewport_height = HEIGHT;

            let media = MediaContext::new(Box::new(backend.clone()), send);
            let mut feed = Feed::new(sample_catalog(len), &settings, media);
            let now = Instant::now();
            feed.start(now);

            Self { feed, backend, now }
        }

        fn source(&self, index: usize) -> SourceUri {
            self.feed.catalog()[index].source.clone()
        }

        fn scroll_to(&mut self, index: usize) {
            let offset = index as f64 * HEIGHT;
            self.feed.handle(FeedEvent::Scroll { offset }, self.now);
        }

        fn warmup_handle(&self, index: usize) -> HandleId {
            self.backend.handles_with(&self.source(index), OpenOptions::WARMUP)[0]
        }

        fn player_handle(&self, index: usize) -> HandleId {
            *self
                .backend
                .handles_with(&self.source(index), ACTIVE)
                .last()
                .unwrap()
        }

        fn signal(&mut self, handle: HandleId, kind: SignalKind) {
            self.feed
                .handle(FeedEvent::Media(MediaSignal { handle, kind }), self.now);
        }

        fn intent(&mut self, intent: UserIntent) {
            self.feed.handle(FeedEvent::Intent(intent), self.now);
        }

        fn advance(&mut self, by: Duration) {
            self.now += by;
            self.feed.fire_due_timers(self.now);
        }

        fn active_state(&self) -> PlaybackState {
            self.feed.active().unwrap().state()
        }

        fn playback_updates(&mut self) -> Vec<PlaybackState> {
            self.feed
                .take_updates()
                .into_iter()
                .filter_map(|update| match update {
                    UiUpdate::Playback(view) => Some(view.state),
                    UiUpdate::ActiveIndex { .. } => None,
                })
                .collect()
        }
    }

    #[test]
    fn start_activates_first_clip() {
        let mut fx = Fixture::new(5);

        assert_eq!(fx.feed.active_index(), Some(0));
        assert_eq!(fx.feed.scheduler().window(5), vec![0, 1, 2]);
        assert_eq!(
            fx.feed.take_updates()[..2],
            [
                UiUpdate::ActiveIndex {
                    index: 0,
                    clip: fx.feed.catalog()[0].id.clone()
                },
                UiUpdate::Playback(ClipView {
                    index: 0,
                    clip: fx.feed.catalog()[0].id.clone(),
                    state: PlaybackState::Loading {
                        progress: Progress::default()
                    },
                    preloaded: false,
                    poster: Some("/posters/clip0.jpg".to_owned()),
                })
            ]
        );
    }

    #[test]
    fn empty_catalog_does_nothing() {
        let mut fx = Fixture::new(0);
        fx.feed.handle(FeedEvent::Scroll { offset: 1200.0 }, fx.now);

        assert!(fx.feed.active().is_none());
        assert!(fx.feed.take_updates().is_empty());
        assert!(fx.backend.calls().is_empty());
    }

    #[test]
    fn rapid_scroll_moves_the_window() {
        let mut fx = Fixture::new(5);
        fx.scroll_to(1);
        fx.scroll_to(2);

        let mut window = fx.feed.scheduler().window(5);
        window.sort_unstable();
        assert_eq!(window, vec![1, 2, 3, 4]);
        assert_eq!(fx.feed.scheduler().launched(), 5);
        assert_eq!(fx.feed.registry().count(PreloadStatus::InFlight), 5);
        fx.feed.take_updates();

        // Clip 0 is out of the window, its warm-up still completes
        let handle = fx.warmup_handle(0);
        fx.signal(handle, SignalKind::LoadedData);
        assert!(fx.feed.registry().is_warm(&fx.source(0)));
        assert!(fx.feed.take_updates().is_empty());
    }

    #[test]
    fn bouncing_scroll_is_idempotent() {
        let mut fx = Fixture::new(5);

        for offset in [10.0, 200.0, 350.0, 0.0, 399.0] {
            fx.feed.handle(FeedEvent::Scroll { offset }, fx.now);
        }
        assert_eq!(fx.feed.scheduler().launched(), 3);
        assert_eq!(fx.backend.handles_with(&fx.source(0), ACTIVE).len(), 1);
    }

    #[test]
    fn failure_while_loading_shows_poster() {
        let mut fx = Fixture::new(5);
        fx.feed.take_updates();
        let handle = fx.player_handle(0);

        fx.signal(handle, SignalKind::Error("HTTP 404".into()));
        assert_eq!(fx.active_state(), PlaybackState::Errored);

        let updates = fx.feed.take_updates();
        let Some(UiUpdate::Playback(view)) = updates.last() else {
            panic!("Expected a playback update, got {updates:?}");
        };
        assert_eq!(view.state, PlaybackState::Errored);
        assert_eq!(view.poster.as_deref(), Some("/posters/clip0.jpg"));

        // Nothing is retried, even once the load deadline passes
        fx.advance(Duration::from_secs(10));
        assert_eq!(fx.active_state(), PlaybackState::Errored);
        assert_eq!(fx.backend.count(|c| matches!(c, Call::Play(_))), 0);
        assert_eq!(fx.backend.handles_with(&fx.source(0), ACTIVE).len(), 1);
    }

    #[test]
    fn reentering_an_errored_clip_retries_it() {
        let mut fx = Fixture::new(5);
        let handle = fx.player_handle(0);
        fx.signal(handle, SignalKind::Error("HTTP 404".into()));

        fx.scroll_to(1);
        fx.scroll_to(0);
        assert_eq!(fx.active_state(), PlaybackState::Loading { progress: Progress::default() });
        assert_eq!(fx.backend.handles_with(&fx.source(0), ACTIVE).len(), 2);
    }

    #[test]
    fn warm_clip_plays_immediately() {
        let mut fx = Fixture::new(5);
        let warmup = fx.warmup_handle(1);
        fx.signal(warmup, SignalKind::LoadedData);
        fx.backend.cache(&fx.source(1));
        fx.feed.take_updates();

        fx.scroll_to(1);
        let handle = fx.player_handle(1);
        fx.signal(handle, SignalKind::PlayResolved(Ok(())));

        let updates = fx.feed.take_updates();
        let clip1: Vec<_> = updates
            .iter()
            .filter_map(|update| match update {
                UiUpdate::Playback(view) if view.index == 1 => Some(view),
                _ => None,
            })
            .collect();
        let states: Vec<_> = clip1.iter().map(|view| view.state).collect();
        assert_eq!(
            states,
            vec![
                PlaybackState::Loading {
                    progress: Progress::COMPLETE
                },
                PlaybackState::Ready,
                PlaybackState::Playing
            ]
        );
        assert!(clip1.iter().all(|view| view.preloaded));

        // The clip left behind was still loading, its load is simply abandoned
        assert!(!updates
            .iter()
            .any(|update| matches!(update, UiUpdate::Playback(ClipView { index: 0, .. }))));
    }

    #[test]
    fn cold_clip_plays_after_timeout() {
        let mut fx = Fixture::new(3);
        let handle = fx.player_handle(0);
        fx.feed.take_updates();

        fx.advance(Duration::from_millis(4999));
        assert!(matches!(fx.active_state(), PlaybackState::Loading { .. }));

        fx.advance(Duration::from_millis(1));
        assert_eq!(fx.active_state(), PlaybackState::Ready);
        assert!(fx.backend.calls().contains(&Call::Play(handle)));

        // Warm-ups of the window timed out at the same instant
        assert_eq!(fx.feed.registry().count(PreloadStatus::Warm), 3);

        fx.signal(handle, SignalKind::PlayResolved(Ok(())));
        assert_eq!(
            fx.playback_updates(),
            vec![PlaybackState::Ready, PlaybackState::Playing]
        );
    }

    #[test]
    fn overlay_forces_pause_without_resume() {
        let mut fx = Fixture::new(3);
        let handle = fx.player_handle(0);
        fx.signal(handle, SignalKind::CanPlayThrough);
        fx.signal(handle, SignalKind::PlayResolved(Ok(())));
        fx.feed.take_updates();

        fx.intent(UserIntent::OpenOverlay);
        assert_eq!(fx.active_state(), PlaybackState::Paused(PauseCause::Overlay));
        fx.intent(UserIntent::CloseOverlay);
        assert_eq!(fx.active_state(), PlaybackState::Paused(PauseCause::Overlay));
        assert_eq!(
            fx.playback_updates(),
            vec![PlaybackState::Paused(PauseCause::Overlay)]
        );

        fx.intent(UserIntent::TogglePlayback);
        assert_eq!(fx.active_state(), PlaybackState::Ready);
    }

    #[test]
    fn overlay_opened_while_loading_wins_over_late_playback() {
        let mut fx = Fixture::new(3);
        let handle = fx.player_handle(0);
        fx.feed.take_updates();

        fx.intent(UserIntent::OpenOverlay);
        fx.advance(Duration::from_secs(5));
        assert_eq!(fx.active_state(), PlaybackState::Ready);

        fx.signal(handle, SignalKind::PlayResolved(Ok(())));
        assert_eq!(fx.active_state(), PlaybackState::Paused(PauseCause::Overlay));
        assert!(!fx.playback_updates().contains(&PlaybackState::Playing));
    }

    #[test]
    fn leaving_a_playing_clip_pauses_it() {
        let mut fx = Fixture::new(3);
        let handle = fx.player_handle(0);
        fx.signal(handle, SignalKind::CanPlayThrough);
        fx.signal(handle, SignalKind::PlayResolved(Ok(())));
        fx.feed.take_updates();

        fx.scroll_to(1);
        assert!(fx.backend.calls().contains(&Call::Pause(handle)));
        assert!(fx.feed.take_updates().contains(&UiUpdate::Playback(ClipView {
            index: 0,
            clip: fx.feed.catalog()[0].id.clone(),
            state: PlaybackState::Paused(PauseCause::Inactive),
            preloaded: false,
            poster: None,
        })));

        // Coming back builds a fresh controller instead of resuming
        fx.scroll_to(0);
        assert!(matches!(fx.active_state(), PlaybackState::Loading { .. }));
    }

    #[test]
    fn late_signals_of_inactive_clip_are_noops() {
        let mut fx = Fixture::new(3);
        let handle = fx.player_handle(0);
        fx.scroll_to(1);
        fx.feed.take_updates();

        fx.signal(handle, SignalKind::CanPlayThrough);
        fx.signal(handle, SignalKind::Error("late".into()));
        fx.advance(Duration::from_secs(5));

        assert_eq!(fx.backend.count(|c| *c == Call::Play(handle)), 0);
        assert!(!fx
            .feed
            .take_updates()
            .iter()
            .any(|update| matches!(update, UiUpdate::Playback(ClipView { index: 0, .. }))));
    }

    #[test]
    fn signals_of_released_resources_are_dropped() {
        let mut fx = Fixture::new(4);
        let handle = fx.player_handle(0);
        fx.scroll_to(1);
        fx.scroll_to(2);
        fx.feed.take_updates();

        // Clip 0's controller has been dropped
        fx.signal(handle, SignalKind::PlayResolved(Ok(())));
        assert!(fx.feed.take_updates().is_empty());
    }

    #[test]
    fn progress_is_reported() {
        let mut fx = Fixture::new(3);
        let handle = fx.player_handle(0);
        fx.feed.take_updates();

        fx.backend.set_buffered(handle, 6.0, 8.0);
        fx.signal(handle, SignalKind::Progress);
        assert_eq!(
            fx.playback_updates(),
            vec![PlaybackState::Loading {
                progress: Progress::from_buffered(75.0, 100.0).unwrap()
            }]
        );
    }

    #[test]
    fn resize_can_change_the_active_clip() {
        let mut fx = Fixture::new(5);
        fx.scroll_to(1);

        fx.feed.handle(
            FeedEvent::Resize {
                viewport_height: HEIGHT / 2.0,
            },
            fx.now,
        );
        assert_eq!(fx.feed.active_index(), Some(2));
    }
}
