// ABOUTME: Configuration module for the story-slides application
// ABOUTME: Provides configuration settings and environment variable handling

use crate::controller::{ControllerConfig, RESIZE_DEBOUNCE_MS, SMALL_SCREEN_WIDTH, TRANSITION_MS};
use crate::slides::FALLBACK_LANGUAGE;
use std::env;
use std::path::PathBuf;

/// Global configuration for the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Library file; the embedded demo library is used when unset
    pub slides_path: Option<PathBuf>,
    pub prefs_path: PathBuf,
    pub viewport_width: u32,
    pub small_screen_width: u32,
    pub transition_ms: u64,
    pub resize_debounce_ms: u64,
    pub placeholder_image: String,
    pub probe_timeout_ms: u64,
    pub probe_attempts: u32,
    pub option_thumbnails: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            slides_path: None,
            prefs_path: PathBuf::from(".story-prefs.json"),
            viewport_width: 1280,
            small_screen_width: SMALL_SCREEN_WIDTH,
            transition_ms: TRANSITION_MS,
            resize_debounce_ms: RESIZE_DEBOUNCE_MS,
            placeholder_image: "images/fallback.png".to_string(),
            probe_timeout_ms: 10000, // 10 seconds
            probe_attempts: 3,
            option_thumbnails: ControllerConfig::default().option_thumbnails,
        }
    }
}

fn env_number<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}

impl Config {
    /// Create a new configuration instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let slides_path = env::var("STORY_SLIDES_PATH").ok().map(PathBuf::from);
        let prefs_path = env::var("STORY_PREFS_PATH")
            .ok()
            .map(PathBuf::from)
            .unwrap_or(defaults.prefs_path);
        let viewport_width =
            env_number("STORY_VIEWPORT_WIDTH").unwrap_or(defaults.viewport_width);
        let small_screen_width =
            env_number("STORY_SMALL_SCREEN_WIDTH").unwrap_or(defaults.small_screen_width);
        let transition_ms = env_number("STORY_TRANSITION_MS").unwrap_or(defaults.transition_ms);
        let resize_debounce_ms =
            env_number("STORY_RESIZE_DEBOUNCE_MS").unwrap_or(defaults.resize_debounce_ms);
        let placeholder_image =
            env::var("STORY_PLACEHOLDER_IMAGE").unwrap_or(defaults.placeholder_image);
        let probe_timeout_ms =
            env_number("STORY_PROBE_TIMEOUT_MS").unwrap_or(defaults.probe_timeout_ms);

        Self {
            slides_path,
            prefs_path,
            viewport_width,
            small_screen_width,
            transition_ms,
            resize_debounce_ms,
            placeholder_image,
            probe_timeout_ms,
            probe_attempts: defaults.probe_attempts,
            option_thumbnails: defaults.option_thumbnails,
        }
    }

    /// Get a controller configuration with defaults from this config
    pub fn get_controller_config(
        &self,
        default_language: Option<String>,
        small_screen_width: Option<u32>,
        transition_ms: Option<u64>,
    ) -> ControllerConfig {
        ControllerConfig {
            small_screen_width: small_screen_width.unwrap_or(self.small_screen_width),
            transition_ms: transition_ms.unwrap_or(self.transition_ms),
            resize_debounce_ms: self.resize_debounce_ms,
            default_language: default_language.unwrap_or_else(|| FALLBACK_LANGUAGE.to_string()),
            option_thumbnails: self.option_thumbnails.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_controller_constants() {
        let config = Config::new();
        let controller = config.get_controller_config(None, None, None);
        assert_eq!(controller, ControllerConfig::default());
        assert_eq!(config.viewport_width, 1280);
        assert!(config.slides_path.is_none());
    }

    #[test]
    fn test_overrides_win() {
        let config = Config {
            transition_ms: 50,
            ..Config::default()
        };
        let controller = config.get_controller_config(Some("hindi".to_string()), Some(600), None);
        assert_eq!(controller.default_language, "hindi");
        assert_eq!(controller.small_screen_width, 600);
        assert_eq!(controller.transition_ms, 50);
        assert_eq!(controller.resize_debounce_ms, RESIZE_DEBOUNCE_MS);
    }

    #[test]
    fn test_from_env() {
        env::set_var("STORY_SLIDES_PATH", "/tmp/library.json");
        env::set_var("STORY_SMALL_SCREEN_WIDTH", "640");
        env::set_var("STORY_TRANSITION_MS", "not-a-number");

        let config = Config::from_env();
        assert_eq!(config.slides_path, Some(PathBuf::from("/tmp/library.json")));
        assert_eq!(config.small_screen_width, 640);
        assert_eq!(config.transition_ms, TRANSITION_MS);

        env::remove_var("STORY_SLIDES_PATH");
        env::remove_var("STORY_SMALL_SCREEN_WIDTH");
        env::remove_var("STORY_TRANSITION_MS");
    }
}
