use std::{path::Path, time::Duration};

use config::{Config, Environment, File};
use miette::{miette, Context, IntoDiagnostic};
use serde::Deserialize;

use crate::result::Result;

/// Prefix of the environment variables overriding the settings,
/// e.g. `REELFEED_PRELOAD__AHEAD=3`
const ENV_PREFIX: &str = "REELFEED";

/// Number of clips warmed around the active one, behind and ahead together
const MAX_NEIGHBORS: usize = 3;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub feed: FeedSettings,
    pub preload: PreloadSettings,
    pub playback: PlaybackSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    /// Height of one clip in the feed, in the same unit as the scroll offset
    pub viewport_height: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PreloadSettings {
    /// Number of clips warmed before the active one
    pub behind: usize,
    /// Number of clips warmed after the active one
    pub ahead: usize,
    pub warmup_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    pub load_timeout_ms: u64,
    /// Restart the clip from the beginning when it ends
    pub looping: bool,
    pub muted: bool,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            viewport_height: 844.0,
        }
    }
}

impl Default for PreloadSettings {
    fn default() -> Self {
        Self {
            behind: 1,
            ahead: 2,
            warmup_timeout_ms: 5000,
        }
    }
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            load_timeout_ms: 5000,
            looping: true,
            muted: false,
        }
    }
}

impl PreloadSettings {
    pub fn warmup_timeout(&self) -> Duration {
        Duration::from_millis(self.warmup_timeout_ms)
    }
}

impl PlaybackSettings {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }
}

impl Settings {
    /// Load the settings from the optional TOML file, then from the environment.
    ///
    /// Missing keys keep their default value.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .into_diagnostic()
            .wrap_err("Could not read the settings")?
            .try_deserialize()
            .into_diagnostic()
            .wrap_err("Invalid settings")?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        let height = self.feed.viewport_height;
        if !height.is_finite() || height <= 0.0 {
            return Err(miette!("feed.viewport_height must be a positive number, got {height}").into());
        }

        // Current clip plus neighbors, at most 4 warm-ups per index change
        if self.preload.behind + self.preload.ahead > MAX_NEIGHBORS {
            return Err(miette!(
                "preload.behind + preload.ahead must not exceed {MAX_NEIGHBORS}, got {}",
                self.preload.behind + self.preload.ahead
            )
            .into());
        }

        if self.preload.warmup_timeout_ms == 0 {
            return Err(miette!("preload.warmup_timeout_ms must not be 0").into());
        }

        if self.playback.load_timeout_ms == 0 {
            return Err(miette!("playback.load_timeout_ms must not be 0").into());
        }

        Ok(())
    }
}
