use std::{
    collections::{HashMap, HashSet},
    ops::Range,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

use tracing::debug;

use crate::{result::Result, types::SourceUri, utils::MutexUtils};

use super::{
    MediaBackend, MediaResource, OpenOptions, ReadyState, SignalKind, SignalSink, Signals,
};

/// Number of progress steps a simulated download goes through
const LOAD_STEPS: u32 = 4;

/// A network-less media stack.
///
/// Every load takes a random time within the latency bounds and reports its
/// progress in steps. Sources fully downloaded once are kept in a shared
/// cache, so later resources for the same source open ready to play.
/// A random share of the sources are broken and fail to load.
#[derive(Debug, Clone)]
pub struct SimulatedBackend {
    latency_ms: Range<u64>,
    fail_rate: f64,
    clip_length: Duration,
    network: Arc<Mutex<Network>>,
}

#[derive(Debug, Default)]
struct Network {
    cached: HashSet<SourceUri>,
    broken: HashMap<SourceUri, bool>,
}

impl SimulatedBackend {
    pub fn new(latency_ms: Range<u64>, fail_rate: f64, clip_length: Duration) -> Self {
        Self {
            latency_ms,
            fail_rate,
            clip_length,
            network: Arc::new(Mutex::new(Network::default())),
        }
    }
}

impl MediaBackend for SimulatedBackend {
    fn open(
        &self,
        source: &SourceUri,
        options: OpenOptions,
        sink: SignalSink,
    ) -> Result<Box<dyn MediaResource>> {
        let fail_rate = self.fail_rate;
        let broken = self.network.with_lock(|mut network| {
            *network
                .broken
                .entry(source.clone())
                .or_insert_with(|| fastrand::f64() < fail_rate)
        });

        debug!(
            "{}: Opening simulated resource for {source} (muted: {}, rendered: {})",
            sink.handle(),
            options.muted,
            options.rendered
        );

        Ok(Box::new(SimulatedResource {
            source: source.clone(),
            broken,
            sink,
            latency_ms: self.latency_ms.clone(),
            clip_length: self.clip_length,
            network: self.network.clone(),
            buffered: Arc::new(AtomicU64::new(0)),
            generation: Arc::new(AtomicU64::new(0)),
            loading: false,
        }))
    }
}

#[derive(Debug)]
struct SimulatedResource {
    source: SourceUri,
    broken: bool,
    sink: SignalSink,
    latency_ms: Range<u64>,
    clip_length: Duration,
    network: Arc<Mutex<Network>>,

    /// Number of downloaded steps
    buffered: Arc<AtomicU64>,
    /// Bumped on every pause or seek, invalidates pending end-of-stream timers
    generation: Arc<AtomicU64>,
    loading: bool,
}

impl SimulatedResource {
    fn is_cached(&self) -> bool {
        self.network
            .with_lock(|network| network.cached.contains(&self.source))
    }
}

impl MediaResource for SimulatedResource {
    fn subscribe(&mut self, signals: Signals) {
        self.sink.subscribe(signals);
    }

    fn start_load(&mut self) {
        if self.loading {
            return;
        }
        self.loading = true;

        if self.is_cached() {
            self.buffered.store(u64::from(LOAD_STEPS), Ordering::Relaxed);
            self.sink.emit(SignalKind::LoadedData);
            self.sink.emit(SignalKind::CanPlayThrough);
            return;
        }

        let sink = self.sink.clone();
        let buffered = self.buffered.clone();
        let network = self.network.clone();
        let source = self.source.clone();
        let broken = self.broken;
        let total = fastrand::u64(self.latency_ms.clone());
        let step = Duration::from_millis(total / u64::from(LOAD_STEPS));

        thread::spawn(move || {
            for n in 1..=LOAD_STEPS {
                thread::sleep(step);

                if broken {
                    sink.emit(SignalKind::Error(format!("HTTP 404 while fetching {source}")));
                    return;
                }

                buffered.store(u64::from(n), Ordering::Relaxed);
                if !sink.emit(SignalKind::Progress) {
                    return;
                }
                if n == 1 {
                    sink.emit(SignalKind::LoadedData);
                }
            }

            network.with_lock(|mut network| network.cached.insert(source));
            sink.emit(SignalKind::CanPlayThrough);
        });
    }

    fn play(&mut self) {
        if self.broken {
            self.sink.emit(SignalKind::PlayResolved(Err(
                "The media could not be decoded".to_owned()
            )));
            return;
        }

        self.sink.emit(SignalKind::PlayResolved(Ok(())));

        let sink = self.sink.clone();
        let generation = self.generation.clone();
        let current = generation.load(Ordering::Relaxed);
        let clip_length = self.clip_length;
        thread::spawn(move || {
            thread::sleep(clip_length);
            if generation.load(Ordering::Relaxed) == current {
                sink.emit(SignalKind::Ended);
            }
        });
    }

    fn pause(&mut self) {
        self.generation.fetch_add(1, Ordering::Relaxed);
    }

    fn seek_to_start(&mut self) {
        self.generation.fetch_add(1, Ordering::Relaxed);
    }

    fn ready_state(&self) -> ReadyState {
        if self.is_cached() {
            return ReadyState::EnoughData;
        }

        match self.buffered.load(Ordering::Relaxed) {
            0 => ReadyState::Nothing,
            1 => ReadyState::CurrentData,
            n if n < u64::from(LOAD_STEPS) => ReadyState::FutureData,
            _ => ReadyState::EnoughData,
        }
    }

    fn buffered_end(&self) -> Option<f64> {
        let steps = if self.is_cached() {
            u64::from(LOAD_STEPS)
        } else {
            self.buffered.load(Ordering::Relaxed)
        };
        let ratio = steps as f64 / f64::from(LOAD_STEPS);
        Some(ratio * self.clip_length.as_secs_f64())
    }

    fn duration(&self) -> Option<f64> {
        Some(self.clip_length.as_secs_f64())
    }
}
