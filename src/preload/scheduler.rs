use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use tracing::{debug, error, info, warn};

use crate::{
    catalog::ClipCatalog,
    config::PreloadSettings,
    media::{HandleId, MediaContext, MediaResource, MediaSignal, OpenOptions, SignalKind, Signals},
    result::Error,
    timer::{TimerQueue, TimerTarget},
    types::SourceUri,
};

use super::{PreloadRegistry, PreloadStatus};

/// Compute the indices to warm around the active one, in priority order:
/// the active clip, then the clips behind it, then the clips ahead of it,
/// nearest first. Indices outside of `0..len` are skipped.
pub fn preload_window(index: usize, len: usize, behind: usize, ahead: usize) -> Vec<usize> {
    let behind = (1..=behind).filter_map(|n| index.checked_sub(n));
    let ahead = (1..=ahead).filter_map(|n| index.checked_add(n));

    std::iter::once(index)
        .chain(behind)
        .chain(ahead)
        .filter(|i| *i < len)
        .collect()
}

/// A muted, non-rendered resource buffering a source until it has enough
/// data to start, or until its deadline.
#[derive(Debug)]
struct Warmup {
    index: usize,
    source: SourceUri,
    // Kept alive until the warm-up settles, dropping it releases the decoder
    _resource: Box<dyn MediaResource>,
}

/// Decides which clips to warm up whenever the active index changes
#[derive(Debug)]
pub struct PreloadScheduler {
    behind: usize,
    ahead: usize,
    timeout: Duration,

    last_index: Option<usize>,
    warmups: HashMap<HandleId, Warmup>,
    launched: usize,
}

impl PreloadScheduler {
    pub fn new(settings: &PreloadSettings) -> Self {
        Self {
            behind: settings.behind,
            ahead: settings.ahead,
            timeout: settings.warmup_timeout(),
            last_index: None,
            warmups: HashMap::new(),
            launched: 0,
        }
    }

    /// The current preload window, empty before the first index change
    #[cfg(test)]
    pub fn window(&self, len: usize) -> Vec<usize> {
        self.last_index
            .map(|index| preload_window(index, len, self.behind, self.ahead))
            .unwrap_or_default()
    }

    /// Total number of warm-ups ever launched
    pub fn launched(&self) -> usize {
        self.launched
    }

    /// Number of warm-ups not settled yet
    pub fn pending(&self) -> usize {
        self.warmups.len()
    }

    /// Whether this handle belongs to a pending warm-up
    pub fn owns(&self, handle: HandleId) -> bool {
        self.warmups.contains_key(&handle)
    }

    /// Recompute the preload window and launch the warm-ups it needs.
    ///
    /// Calling it again with the same index does nothing.
    /// Return the number of launched warm-ups.
    pub fn on_index_change(
        &mut self,
        index: usize,
        catalog: &ClipCatalog,
        registry: &mut PreloadRegistry,
        media: &mut MediaContext,
        timers: &mut TimerQueue,
        now: Instant,
    ) -> usize {
        if self.last_index == Some(index) {
            debug!("Preload window of index {index} already computed");
            return 0;
        }
        self.last_index = Some(index);

        let window = preload_window(index, catalog.len(), self.behind, self.ahead);
        debug!("Preload window for index {index}: {window:?}");

        let mut launched = 0;
        for i in window {
            let source = &catalog[i].source;
            if !registry.begin(source) {
                continue;
            }

            self.launch(i, source, registry, media, timers, now);
            launched += 1;
        }

        self.launched += launched;
        launched
    }

    fn launch(
        &mut self,
        index: usize,
        source: &SourceUri,
        registry: &mut PreloadRegistry,
        media: &mut MediaContext,
        timers: &mut TimerQueue,
        now: Instant,
    ) {
        debug!("Preloading clip {index} ({source})");

        let (handle, mut resource) = match media.open(source, OpenOptions::WARMUP) {
            Ok(opened) => opened,
            Err(err) => {
                error!("Could not preload clip {index}: {err}");
                registry.settle(source, PreloadStatus::Failed);
                return;
            }
        };

        resource.subscribe(Signals::LOADED_DATA);
        resource.start_load();
        timers.schedule(now, self.timeout, TimerTarget::Warmup(handle));

        self.warmups.insert(
            handle,
            Warmup {
                index,
                source: source.clone(),
                _resource: resource,
            },
        );
    }

    /// Handle a signal of one of the warm-up resources.
    ///
    /// Signals of already settled warm-ups are ignored.
    pub fn on_signal(&mut self, signal: &MediaSignal, registry: &mut PreloadRegistry) {
        match &signal.kind {
            SignalKind::LoadedData => {
                if let Some(warmup) = self.warmups.remove(&signal.handle) {
                    info!("Clip {} preloaded", warmup.index);
                    registry.settle(&warmup.source, PreloadStatus::Warm);
                }
            }
            SignalKind::Error(reason) => {
                if let Some(warmup) = self.warmups.remove(&signal.handle) {
                    let err = Error::DecodeOrNetworkFailure(reason.clone());
                    error!("Error preloading clip {}: {err}", warmup.index);
                    registry.settle(&warmup.source, PreloadStatus::Failed);
                }
            }
            kind => debug!("{}: Ignoring warm-up signal {kind:?}", signal.handle),
        }
    }

    /// Handle the deadline of a warm-up.
    ///
    /// A timed out warm-up still counts as warm: the clip will try to play
    /// with whatever has been buffered instead of waiting longer.
    pub fn on_timeout(&mut self, handle: HandleId, registry: &mut PreloadRegistry) {
        if let Some(warmup) = self.warmups.remove(&handle) {
            warn!(
                "Preloading clip {}: {}, assuming it is ready anyway",
                warmup.index,
                Error::LoadTimeout
            );
            registry.settle(&warmup.source, PreloadStatus::Warm);
        }
    }
}
