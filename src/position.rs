use tracing::trace;

/// Turns the continuous scroll offset of the feed into the index of the
/// clip occupying the viewport.
///
/// Only changes are reported, so the rest of the pipeline runs once per
/// settled transition instead of once per scroll tick.
#[derive(Debug)]
pub struct FeedPositionTracker {
    viewport_height: f64,
    len: usize,
    last_offset: f64,
    emitted: Option<usize>,
}

impl FeedPositionTracker {
    /// `viewport_height` must be finite and positive, this is checked when
    /// loading the settings.
    pub fn new(viewport_height: f64, len: usize) -> Self {
        Self {
            viewport_height,
            len,
            last_offset: 0.0,
            emitted: None,
        }
    }

    /// The last emitted index
    pub fn active_index(&self) -> Option<usize> {
        self.emitted
    }

    /// Feed a scroll offset sample.
    ///
    /// Return the new active index if it differs from the previously emitted one.
    pub fn sample(&mut self, offset: f64) -> Option<usize> {
        self.last_offset = offset;
        let index = self.index_at(offset)?;

        if self.emitted == Some(index) {
            return None;
        }

        trace!("Offset {offset} settled on index {index}");
        self.emitted = Some(index);
        Some(index)
    }

    /// Change the height of a clip, re-evaluating the last sampled offset.
    ///
    /// Invalid heights are ignored.
    pub fn resize(&mut self, viewport_height: f64) -> Option<usize> {
        if !viewport_height.is_finite() || viewport_height <= 0.0 {
            trace!("Ignoring invalid viewport height {viewport_height}");
            return None;
        }

        self.viewport_height = viewport_height;
        self.sample(self.last_offset)
    }

    fn index_at(&self, offset: f64) -> Option<usize> {
        let last = self.len.checked_sub(1)?;

        let raw = (offset / self.viewport_height).round();
        if raw.is_nan() || raw <= 0.0 {
            return Some(0);
        }

        // Float to int casts saturate, so infinities land on `last`
        Some((raw as usize).min(last))
    }
}
