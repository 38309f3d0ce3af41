mod registry;
mod scheduler;

pub use registry::{PreloadRegistry, PreloadStatus};
pub use scheduler::PreloadScheduler;
