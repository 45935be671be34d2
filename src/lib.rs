// ABOUTME: Library module for the story-slides program.
// ABOUTME: Contains the slideshow controller, flip-book viewer and their drivers.

// Reexport modules
pub mod book;
pub mod config;
pub mod controller;
pub mod errors;
pub mod i18n;
pub mod media;
pub mod player;
pub mod prefs;
pub mod render;
pub mod serve;
pub mod slides;
pub mod timer;
pub mod utils;
pub mod view;

// Reexport common types and functions
pub use book::{FlipBook, Spread};
pub use config::Config;
pub use controller::{should_play_audio, Action, ControllerConfig, Effect, SlideshowController};
pub use errors::{Result, StoryError};
pub use media::{AssetProbe, LoadToken, MediaKind, MediaProbe};
pub use player::{Clock, ManualClock, MonotonicClock, Player};
pub use prefs::{JsonFileStore, MemoryStore, PreferenceStore};
pub use render::{render_spread, render_view};
pub use serve::{serve, ServeConfig};
pub use slides::{ForegroundMedia, Slide, SlideLibrary};
pub use view::SlideshowView;
