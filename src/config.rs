//! Engine tuning knobs.
//!
//! Defaults match the historical behavior of caption overlays on embedded
//! players: a 500 ms caption poll, a 3 s controls-hide delay and a 100 ms
//! probe while waiting for the player API to appear on the page.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppResult, Error};

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_CONTROLS_HIDE_DELAY_MS: u64 = 3_000;
pub const DEFAULT_API_POLL_INTERVAL_MS: u64 = 100;
pub const DEFAULT_SCRIPT_URL: &str = "https://www.youtube.com/iframe_api";
pub const DEFAULT_SCRIPT_FRAGMENT: &str = "youtube.com/iframe_api";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub poll_interval_ms: u64,
    pub controls_hide_delay_ms: u64,
    pub api_poll_interval_ms: u64,
    pub script_url: String,
    pub script_fragment: String,
    pub layout: LayoutTuning,
}

/// Placement constants used when positioning a caption inside its frame.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutTuning {
    /// Frames shorter than this are treated as compact embeds.
    pub short_frame_height: f64,
    /// Bottom padding for compact embeds while the controls are hidden.
    pub short_frame_padding: f64,
    /// Bottom padding in every other case.
    pub bottom_padding: f64,
    /// Horizontal slack subtracted from the frame width before wrapping.
    pub horizontal_margin: f64,
    /// Frame height is divided by this to get the caption font scale.
    pub font_scale_divisor: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            controls_hide_delay_ms: DEFAULT_CONTROLS_HIDE_DELAY_MS,
            api_poll_interval_ms: DEFAULT_API_POLL_INTERVAL_MS,
            script_url: DEFAULT_SCRIPT_URL.to_owned(),
            script_fragment: DEFAULT_SCRIPT_FRAGMENT.to_owned(),
            layout: LayoutTuning::default(),
        }
    }
}

impl Default for LayoutTuning {
    fn default() -> Self {
        Self {
            short_frame_height: 200.0,
            short_frame_padding: 20.0,
            bottom_padding: 60.0,
            horizontal_margin: 20.0,
            font_scale_divisor: 260.0,
        }
    }
}

impl Config {
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub const fn controls_hide_delay(&self) -> Duration {
        Duration::from_millis(self.controls_hide_delay_ms)
    }

    #[must_use]
    pub const fn api_poll_interval(&self) -> Duration {
        Duration::from_millis(self.api_poll_interval_ms)
    }

    /// # Errors
    ///
    /// Returns [`Error::Config`] when an interval is zero, the layout divisor
    /// is not a positive number, or the script fragment is empty.
    pub fn validate(&self) -> AppResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms must be at least 1".to_owned()));
        }
        if self.api_poll_interval_ms == 0 {
            return Err(Error::Config("api_poll_interval_ms must be at least 1".to_owned()));
        }
        if !(self.layout.font_scale_divisor > 0.0) {
            return Err(Error::Config(
                "layout.font_scale_divisor must be a positive number".to_owned(),
            ));
        }
        if self.script_fragment.is_empty() {
            return Err(Error::Config("script_fragment must not be empty".to_owned()));
        }
        Ok(())
    }
}

/// Optional overrides read from a scenario or config file. Unset fields keep
/// the [`Config`] defaults.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigOverrides {
    pub poll_interval_ms: Option<u64>,
    pub controls_hide_delay_ms: Option<u64>,
    pub api_poll_interval_ms: Option<u64>,
    pub script_url: Option<String>,
    pub script_fragment: Option<String>,
    pub layout: Option<LayoutTuning>,
}

impl ConfigOverrides {
    #[must_use]
    pub fn resolve(self) -> Config {
        let base = Config::default();
        Config {
            poll_interval_ms: self.poll_interval_ms.unwrap_or(base.poll_interval_ms),
            controls_hide_delay_ms: self
                .controls_hide_delay_ms
                .unwrap_or(base.controls_hide_delay_ms),
            api_poll_interval_ms: self.api_poll_interval_ms.unwrap_or(base.api_poll_interval_ms),
            script_url: self.script_url.unwrap_or(base.script_url),
            script_fragment: self.script_fragment.unwrap_or(base.script_fragment),
            layout: self.layout.unwrap_or(base.layout),
        }
    }
}
