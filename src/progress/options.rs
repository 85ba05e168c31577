use clap::ValueEnum;
use core::time::Duration;
use owo_colors::AnsiColors;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Idle window used when the caller does not configure one.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Foreground color hint for a bar.
///
/// The core never interprets these values, it only hands them to the renderer.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum, Deserialize, Serialize, Display, EnumString, IntoStaticStr,
)]
#[value(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BarColor {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    #[default]
    White,
}

impl BarColor {
    /// The equivalent ANSI color for direct terminal output.
    #[must_use]
    pub const fn ansi(self) -> AnsiColors {
        match self {
            Self::Black => AnsiColors::Black,
            Self::Red => AnsiColors::Red,
            Self::Green => AnsiColors::Green,
            Self::Yellow => AnsiColors::Yellow,
            Self::Blue => AnsiColors::Blue,
            Self::Magenta => AnsiColors::Magenta,
            Self::Cyan => AnsiColors::Cyan,
            Self::White => AnsiColors::White,
        }
    }
}

/// Construction-time settings for a progress bar.
///
/// Children spawned without explicit options inherit their parent's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressOptions {
    /// How long a bar may go without a tick before it is reported as stalled.
    pub idle_timeout: Duration,

    /// Hide or compact the bar once it has finished.
    pub collapse_when_finished: bool,

    /// Color used while the bar is running.
    pub foreground_color: BarColor,

    /// Color used once the bar is done; falls back to `foreground_color`.
    pub foreground_color_done: Option<BarColor>,
}

impl Default for ProgressOptions {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            collapse_when_finished: false,
            foreground_color: BarColor::default(),
            foreground_color_done: None,
        }
    }
}

impl ProgressOptions {
    #[must_use]
    pub const fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    #[must_use]
    pub const fn with_collapse_when_finished(mut self, collapse: bool) -> Self {
        self.collapse_when_finished = collapse;
        self
    }

    #[must_use]
    pub const fn with_foreground_color(mut self, color: BarColor) -> Self {
        self.foreground_color = color;
        self
    }

    #[must_use]
    pub const fn with_foreground_color_done(mut self, color: BarColor) -> Self {
        self.foreground_color_done = Some(color);
        self
    }
}
