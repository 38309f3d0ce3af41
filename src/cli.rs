use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

macro_rules! arg_env {
    ($v:literal) => {
        concat!("REELFEED_", $v)
    };
}

/// Drive a short-video feed over a clip catalog with simulated media.
/// Swipe through the clips, preloading the neighbors of the active one,
/// and report what the UI would show.
#[derive(Parser, Debug)]
#[command(version)]
pub struct Args {
    /// The path to the JSON clip catalog
    #[arg(env=arg_env!("CATALOG"))]
    pub catalog: PathBuf,

    /// The path to a TOML settings file.
    /// Settings can also be overridden with `REELFEED_<SECTION>__<KEY>` variables
    #[arg(long, env=arg_env!("CONFIG"))]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t=LogLevel::Info, env=arg_env!("LOG_LEVEL"))]
    pub log_level: LogLevel,

    /// Number of swipes to the next clip. Defaults to the catalog length minus one
    #[arg(long, env=arg_env!("SWIPES"))]
    pub swipes: Option<usize>,

    /// Time spent on each clip before swiping, in milliseconds
    #[arg(long, default_value_t = 1500, env=arg_env!("DWELL_MS"))]
    pub dwell_ms: u64,

    /// Randomize the order of the catalog
    #[arg(long, env=arg_env!("SHUFFLE"))]
    pub shuffle: bool,

    /// Probability for a source to be unreachable, between 0 and 1
    #[arg(long, default_value_t = 0.0, env=arg_env!("FAIL_RATE"))]
    pub fail_rate: f64,

    /// Lower bound of the simulated time to fetch a chunk, in milliseconds
    #[arg(long, default_value_t = 50, env=arg_env!("MIN_LATENCY_MS"))]
    pub min_latency_ms: u64,

    /// Upper bound of the simulated time to fetch a chunk, in milliseconds
    #[arg(long, default_value_t = 400, env=arg_env!("MAX_LATENCY_MS"))]
    pub max_latency_ms: u64,

    /// Length of every simulated clip, in milliseconds
    #[arg(long, default_value_t = 4000, env=arg_env!("CLIP_LENGTH_MS"))]
    pub clip_length_ms: u64,

    /// Open the comments overlay on the clip at this index, then close it
    #[arg(long, env=arg_env!("COMMENTS_AT"))]
    pub comments_at: Option<usize>,
}
