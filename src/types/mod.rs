mod ids;
mod progress;

pub use ids::{ClipId, SourceUri};
pub use progress::Progress;
