use std::collections::HashMap;

use tracing::debug;

use crate::types::SourceUri;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadStatus {
    NotStarted,
    InFlight,
    /// Buffered enough, or gave up waiting, to be considered play-ready
    Warm,
    /// The warm-up hit a load or decode error. Never retried automatically.
    Failed,
}

/// Warm-up state of every source the scheduler has ever referenced.
///
/// Only the scheduler writes to it, controllers only query it.
/// Records are never evicted.
#[derive(Debug, Default)]
pub struct PreloadRegistry {
    records: HashMap<SourceUri, PreloadStatus>,
}

impl PreloadRegistry {
    pub fn status(&self, source: &SourceUri) -> PreloadStatus {
        self.records
            .get(source)
            .copied()
            .unwrap_or(PreloadStatus::NotStarted)
    }

    pub fn is_warm(&self, source: &SourceUri) -> bool {
        self.status(source) == PreloadStatus::Warm
    }

    /// Count the sources currently in the given state
    pub fn count(&self, status: PreloadStatus) -> usize {
        self.records.values().filter(|s| **s == status).count()
    }

    /// Mark the source as in-flight.
    ///
    /// Return false, leaving the record untouched, if a warm-up of the source
    /// already ran or is still running.
    pub(crate) fn begin(&mut self, source: &SourceUri) -> bool {
        let status = self
            .records
            .entry(source.clone())
            .or_insert(PreloadStatus::NotStarted);

        if *status != PreloadStatus::NotStarted {
            debug!("Not warming {source}, it is {status:?}");
            return false;
        }

        *status = PreloadStatus::InFlight;
        true
    }

    /// Record the end of an in-flight warm-up
    pub(crate) fn settle(&mut self, source: &SourceUri, status: PreloadStatus) {
        debug_assert!(matches!(
            status,
            PreloadStatus::Warm | PreloadStatus::Failed
        ));

        match self.records.get_mut(source) {
            Some(record) if *record == PreloadStatus::InFlight => *record = status,
            record => debug!("Ignoring settlement of {source}, record is {record:?}"),
        }
    }
}
