use std::fmt::Display;

/// Buffered fraction of a clip, in percent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Progress(u8);

impl Progress {
    pub const COMPLETE: Progress = Progress(100);

    /// Compute the progress from the end of the last buffered range and
    /// the total duration, both in seconds.
    ///
    /// Return None when the duration is not known yet.
    pub fn from_buffered(buffered_end: f64, duration: f64) -> Option<Self> {
        if !duration.is_finite() || duration <= 0.0 || buffered_end.is_nan() {
            return None;
        }

        let percent = (buffered_end / duration * 100.0).round().clamp(0.0, 100.0);
        Some(Self(percent as u8))
    }

    pub fn percent(self) -> u8 {
        self.0
    }
}

impl Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.percent())
    }
}
