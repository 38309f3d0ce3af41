//! The media capability the feed drives.
//!
//! The core never talks to a concrete media stack: every clip is played
//! through a [`MediaResource`] created by a [`MediaBackend`], and every
//! asynchronous answer of that resource comes back as a [`MediaSignal`]
//! sent into the feed event channel.

#[cfg(test)]
pub mod scripted;
mod simulated;

use std::{
    fmt::Debug,
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    },
};

use bitflags::bitflags;
use crossbeam_channel::Sender;
use tracing::trace;

pub use simulated::SimulatedBackend;

use crate::{actors::FeedEvent, result::Result, types::SourceUri};

bitflags! {
    /// Optional signals a resource forwards once subscribed to.
    ///
    /// Errors and play resolutions are always forwarded.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Signals: u8 {
        const PROGRESS = 0b0000001;
        const LOADED_DATA = 0b0000010;
        const CAN_PLAY_THROUGH = 0b0000100;
        const ENDED = 0b0001000;
    }
}

/// How much of a source a resource can decode right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    Nothing,
    Metadata,
    CurrentData,
    FutureData,
    EnoughData,
}

/// Identifier of one opened resource. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

#[cfg(test)]
impl HandleId {
    pub fn for_tests(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for HandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "h{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignalKind {
    /// More data has been buffered
    Progress,
    /// Enough data to render the first frame
    LoadedData,
    /// Enough data to play to the end without stalling
    CanPlayThrough,
    /// Playback reached the end of the stream
    Ended,
    /// The source could not be fetched or decoded
    Error(String),
    /// Outcome of a previous [`MediaResource::play`] call
    PlayResolved(std::result::Result<(), String>),
}

impl SignalKind {
    fn required_subscription(&self) -> Option<Signals> {
        match self {
            SignalKind::Progress => Some(Signals::PROGRESS),
            SignalKind::LoadedData => Some(Signals::LOADED_DATA),
            SignalKind::CanPlayThrough => Some(Signals::CAN_PLAY_THROUGH),
            SignalKind::Ended => Some(Signals::ENDED),
            SignalKind::Error(_) | SignalKind::PlayResolved(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaSignal {
    pub handle: HandleId,
    pub kind: SignalKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenOptions {
    pub muted: bool,
    /// Whether the decoded frames are presented, false for warm-up handles
    pub rendered: bool,
    pub looping: bool,
}

impl OpenOptions {
    /// A muted handle that only buffers
    pub const WARMUP: OpenOptions = OpenOptions {
        muted: true,
        rendered: false,
        looping: false,
    };
}

/// Channel end a resource uses to report its signals back to the feed.
///
/// Can be cloned freely and moved to any thread: the signals are only
/// processed by the feed event loop.
#[derive(Debug, Clone)]
pub struct SignalSink {
    handle: HandleId,
    subscribed: Arc<AtomicU8>,
    events: Sender<FeedEvent>,
}

impl SignalSink {
    pub fn handle(&self) -> HandleId {
        self.handle
    }

    pub fn subscribe(&self, signals: Signals) {
        self.subscribed.fetch_or(signals.bits(), Ordering::Relaxed);
    }

    pub fn is_subscribed(&self, signals: Signals) -> bool {
        Signals::from_bits_truncate(self.subscribed.load(Ordering::Relaxed)).contains(signals)
    }

    /// Send a signal to the feed if it has been subscribed to.
    ///
    /// Return false if the feed is not listening anymore.
    pub fn emit(&self, kind: SignalKind) -> bool {
        if let Some(required) = kind.required_subscription() {
            if !self.is_subscribed(required) {
                trace!("{}: {kind:?} not subscribed, dropping it", self.handle);
                return true;
            }
        }

        self.events
            .send(FeedEvent::Media(MediaSignal {
                handle: self.handle,
                kind,
            }))
            .is_ok()
    }
}

/// One decode pipeline bound to a single source
pub trait MediaResource: Send + Debug {
    /// Register for optional signals
    fn subscribe(&mut self, signals: Signals);

    /// Start fetching the source
    fn start_load(&mut self);

    /// Request playback. The outcome arrives later as [`SignalKind::PlayResolved`].
    fn play(&mut self);

    fn pause(&mut self);

    fn seek_to_start(&mut self);

    fn ready_state(&self) -> ReadyState;

    /// End of the last buffered range, in seconds
    fn buffered_end(&self) -> Option<f64>;

    /// Total duration, in seconds, once known
    fn duration(&self) -> Option<f64>;
}

/// Interface for creating media resources
pub trait MediaBackend: Send + Debug {
    /// Open a resource for the source.
    ///
    /// Opening may already use cached data (see [`MediaResource::ready_state`])
    /// but must not start fetching until [`MediaResource::start_load`].
    fn open(
        &self,
        source: &SourceUri,
        options: OpenOptions,
        sink: SignalSink,
    ) -> Result<Box<dyn MediaResource>>;
}

/// The backend along with the bookkeeping needed to route signals back
#[derive(Debug)]
pub struct MediaContext {
    backend: Box<dyn MediaBackend>,
    events: Sender<FeedEvent>,
    next_handle: u64,
}

impl MediaContext {
    pub fn new(backend: Box<dyn MediaBackend>, events: Sender<FeedEvent>) -> Self {
        Self {
            backend,
            events,
            next_handle: 0,
        }
    }

    pub fn open(
        &mut self,
        source: &SourceUri,
        options: OpenOptions,
    ) -> Result<(HandleId, Box<dyn MediaResource>)> {
        let handle = HandleId(self.next_handle);
        self.next_handle += 1;

        let sink = SignalSink {
            handle,
            subscribed: Arc::new(AtomicU8::new(0)),
            events: self.events.clone(),
        };

        let resource = self.backend.open(source, options, sink)?;
        Ok((handle, resource))
    }
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::unbounded;

    use super::*;

    fn sink() -> (SignalSink, crossbeam_channel::Receiver<FeedEvent>) {
        let (send, receive) = unbounded();
        let sink = SignalSink {
            handle: HandleId(3),
            subscribed: Arc::new(AtomicU8::new(0)),
            events: send,
        };
        (sink, receive)
    }

    #[test]
    fn unsubscribed_signals_are_dropped() {
        let (sink, receive) = sink();

        assert!(sink.emit(SignalKind::Progress));
        assert!(receive.try_recv().is_err());

        sink.subscribe(Signals::PROGRESS | Signals::ENDED);
        assert!(sink.emit(SignalKind::Progress));
        assert!(matches!(
            receive.try_recv(),
            Ok(FeedEvent::Media(MediaSignal {
                kind: SignalKind::Progress,
                ..
            }))
        ));
    }

    #[test]
    fn errors_are_always_forwarded() {
        let (sink, receive) = sink();

        sink.emit(SignalKind::Error("boom".into()));
        sink.emit(SignalKind::PlayResolved(Ok(())));
        assert_eq!(receive.try_iter().count(), 2);
    }

    #[test]
    fn emitting_after_shutdown_reports_it() {
        let (sink, receive) = sink();
        sink.subscribe(Signals::all());
        drop(receive);

        assert!(!sink.emit(SignalKind::LoadedData));
    }
}
