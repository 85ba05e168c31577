use crate::Result;
use crate::progress::{BarColor, DEFAULT_IDLE_TIMEOUT, ProgressOptions};
use camino::{Utf8Path, Utf8PathBuf};
use core::time::Duration;
use ohno::{IntoAppError, app_err};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;

const LOG_TARGET: &str = "    config";

/// Name of the configuration file looked up when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "progress.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// How long a bar may go without a tick before it is reported as stalled
    #[serde(default = "default_idle_timeout", with = "humantime_serde")]
    pub idle_timeout: Duration,

    /// Hide finished bars
    #[serde(default)]
    pub collapse_when_finished: bool,

    /// Bar color while running
    #[serde(default)]
    pub foreground_color: BarColor,

    /// Bar color once finished (defaults to `foreground_color`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreground_color_done: Option<BarColor>,

    /// Delay between two simulated units of work
    #[serde(default = "default_tick_interval", with = "humantime_serde")]
    pub tick_interval: Duration,
}

const fn default_idle_timeout() -> Duration {
    DEFAULT_IDLE_TIMEOUT
}

const fn default_tick_interval() -> Duration {
    Duration::from_millis(100)
}

impl Config {
    /// Load configuration from a file or use defaults
    ///
    /// Without an explicit `config_path`, `progress.toml` in `base_dir` is used when present.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or holds invalid values
    pub fn load(base_dir: &Utf8Path, config_path: Option<&Utf8Path>) -> Result<Self> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading configuration file '{path}'"))?;
            (path.to_path_buf(), text)
        } else {
            let path = base_dir.join(DEFAULT_CONFIG_FILE);
            match fs::read_to_string(&path) {
                Ok(text) => (path, text),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Ok(Self::default());
                }
                Err(e) => return Err(e).into_app_err_with(|| format!("reading configuration file '{path}'")),
            }
        };

        let config: Self = toml::from_str(&text).into_app_err_with(|| format!("parsing configuration file '{final_path}'"))?;
        config.validate()?;

        log::debug!(target: LOG_TARGET, "Loaded configuration from '{final_path}'");
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error if a duration is zero
    pub fn validate(&self) -> Result<()> {
        if self.idle_timeout.is_zero() {
            return Err(app_err!("idle_timeout must be greater than zero"));
        }

        if self.tick_interval.is_zero() {
            return Err(app_err!("tick_interval must be greater than zero"));
        }

        Ok(())
    }

    /// The bar options described by this configuration.
    #[must_use]
    pub fn to_options(&self) -> ProgressOptions {
        let options = ProgressOptions::default()
            .with_idle_timeout(self.idle_timeout)
            .with_collapse_when_finished(self.collapse_when_finished)
            .with_foreground_color(self.foreground_color);

        match self.foreground_color_done {
            Some(color) => options.with_foreground_color_done(color),
            None => options,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            idle_timeout: default_idle_timeout(),
            collapse_when_finished: false,
            foreground_color: BarColor::default(),
            foreground_color_done: None,
            tick_interval: default_tick_interval(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> (tempfile::TempDir, Utf8PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        (tmp, path)
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.idle_timeout, DEFAULT_IDLE_TIMEOUT);
        assert_eq!(config.to_options(), ProgressOptions::default());
    }

    #[test]
    fn test_validate_zero_idle_timeout() {
        let config = Config {
            idle_timeout: Duration::ZERO,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_tick_interval() {
        let config = Config {
            tick_interval: Duration::ZERO,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_full_config() {
        let config: Config = toml::from_str(
            r#"
            idle_timeout = "2s 500ms"
            collapse_when_finished = true
            foreground_color = "yellow"
            foreground_color_done = "green"
            tick_interval = "20ms"
            "#,
        )
        .unwrap();

        assert_eq!(config.idle_timeout, Duration::from_millis(2500));
        assert!(config.collapse_when_finished);
        assert_eq!(config.foreground_color, BarColor::Yellow);
        assert_eq!(config.foreground_color_done, Some(BarColor::Green));
        assert_eq!(config.tick_interval, Duration::from_millis(20));

        let options = config.to_options();
        assert_eq!(options.idle_timeout, Duration::from_millis(2500));
        assert!(options.collapse_when_finished);
        assert_eq!(options.foreground_color_done, Some(BarColor::Green));
    }

    #[test]
    fn test_parse_partial_config_uses_defaults() {
        let config: Config = toml::from_str(r#"foreground_color = "cyan""#).unwrap();
        assert_eq!(config.foreground_color, BarColor::Cyan);
        assert_eq!(config.idle_timeout, DEFAULT_IDLE_TIMEOUT);
        assert_eq!(config.foreground_color_done, None);
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        assert!(toml::from_str::<Config>("idle_timeot = \"1s\"").is_err());
        assert!(toml::from_str::<Config>("foreground_color = \"purple\"").is_err());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_load_missing_config_uses_defaults() {
        let (_tmp, dir) = temp_dir();
        let config = Config::load(&dir, None).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_load_missing_explicit_config_fails() {
        let (_tmp, dir) = temp_dir();
        let missing = dir.join("nope.toml");
        assert!(Config::load(&dir, Some(&missing)).is_err());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_load_default_file_from_base_dir() {
        let (_tmp, dir) = temp_dir();
        fs::write(dir.join(DEFAULT_CONFIG_FILE), "idle_timeout = \"250ms\"\n").unwrap();

        let config = Config::load(&dir, None).unwrap();
        assert_eq!(config.idle_timeout, Duration::from_millis(250));
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_save_and_load_explicit_path() {
        let (_tmp, dir) = temp_dir();
        let path = dir.join("custom.toml");
        let config = Config {
            collapse_when_finished: true,
            foreground_color: BarColor::Magenta,
            foreground_color_done: Some(BarColor::Blue),
            ..Config::default()
        };
        fs::write(&path, toml::to_string(&config).unwrap()).unwrap();

        let loaded = Config::load(&dir, Some(&path)).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_load_invalid_values_fails() {
        let (_tmp, dir) = temp_dir();
        let path = dir.join("zero.toml");
        fs::write(&path, "tick_interval = \"0s\"\n").unwrap();

        assert!(Config::load(&dir, Some(&path)).is_err());
    }
}
