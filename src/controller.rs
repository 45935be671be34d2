// ABOUTME: Slideshow controller owning playback state and slide transitions
// ABOUTME: Coordinates word reveal, media preloading, audio sync and the option selector

use crate::i18n;
use crate::media::{self, Generation, LoadToken, MediaKind, MediaRequest};
use crate::prefs::PreferenceStore;
use crate::slides::{Slide, SlideLibrary, FALLBACK_LANGUAGE, FALLBACK_OPTION};
use crate::timer::{self, Deadline};
use log::{debug, error, info, warn};
use serde::Deserialize;

/// Viewports narrower than this use the small image variants.
pub const SMALL_SCREEN_WIDTH: u32 = 768;

/// Delay between starting a slide change and committing the new index.
pub const TRANSITION_MS: u64 = 500;

/// Quiet period before a resize is acted upon.
pub const RESIZE_DEBOUNCE_MS: u64 = 300;

/// Tunables for the controller
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub small_screen_width: u32,
    pub transition_ms: u64,
    pub resize_debounce_ms: u64,
    pub default_language: String,
    /// Thumbnails offered by the selector, one per option starting at 1.
    pub option_thumbnails: Vec<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            small_screen_width: SMALL_SCREEN_WIDTH,
            transition_ms: TRANSITION_MS,
            resize_debounce_ms: RESIZE_DEBOUNCE_MS,
            default_language: FALLBACK_LANGUAGE.to_string(),
            option_thumbnails: vec![
                "images/options/0.webp".to_string(),
                "images/options/0j.webp".to_string(),
                "images/options/video-option.jpg".to_string(),
            ],
        }
    }
}

/// The background asset in flight or on screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaState {
    pub src: String,
    pub kind: MediaKind,
    pub loaded: bool,
    /// Token of the outstanding load; results with any other token are stale.
    pub token: Option<LoadToken>,
}

/// Work the controller asks its environment to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Probe an image and report back with `media_loaded`/`media_failed`.
    PreloadImage { token: LoadToken, src: String },
    /// Hand a video to the renderer, which reports readiness with the token.
    LoadVideo { token: LoadToken, src: String },
    /// Start the narration clip from the beginning.
    PlayAudio { src: String, mime: String },
    /// Pause the narration and rewind it to zero.
    StopAudio,
}

/// A user or renderer event, as received from a front end.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Action {
    Reveal { to: i32 },
    ClickWord { index: usize },
    HoverWord { index: usize },
    UnhoverWord,
    Next,
    SelectOption { option: u32 },
    SelectLanguage { language: String },
    OpenSelector,
    CloseSelector,
    Retry,
    Resize { width: u32 },
    MediaLoaded { token: LoadToken },
    MediaFailed { token: LoadToken },
}

/// Whether the narration should be audible.
pub fn should_play_audio(current_index: usize, slider_value: i32, has_audio: bool) -> bool {
    current_index == 0 && slider_value >= 0 && has_audio
}

/// Playback state for one slideshow, mutated only through its operations.
pub struct SlideshowController<S: PreferenceStore> {
    config: ControllerConfig,
    library: SlideLibrary,
    store: S,
    language: String,
    option: Option<u32>,
    slides: Vec<Slide>,
    current_index: usize,
    slider_value: i32,
    total_words_read: u64,
    viewport_width: u32,
    small_screen: bool,
    media: MediaState,
    generation: Generation,
    switching: bool,
    transitioning: bool,
    play_video: bool,
    play_foreground_video: bool,
    error: Option<String>,
    selector_open: bool,
    hovering_last_word: bool,
    audio_playing: bool,
    commit: Deadline<usize>,
    resize: Deadline<u32>,
    effects: Vec<Effect>,
}

impl<S: PreferenceStore> SlideshowController<S> {
    pub fn new(library: SlideLibrary, store: S, config: ControllerConfig, viewport_width: u32) -> Self {
        let language = match store.preferred_language() {
            Ok(Some(language)) => language,
            Ok(None) => config.default_language.clone(),
            Err(e) => {
                warn!("Failed to read preferred language: {}", e);
                config.default_language.clone()
            }
        };
        let small_screen = viewport_width < config.small_screen_width;

        Self {
            config,
            library,
            store,
            language,
            option: None,
            slides: Vec::new(),
            current_index: 0,
            slider_value: -1,
            total_words_read: 0,
            viewport_width,
            small_screen,
            media: MediaState::default(),
            generation: Generation::default(),
            switching: false,
            transitioning: false,
            play_video: false,
            play_foreground_video: false,
            error: None,
            selector_open: false,
            hovering_last_word: false,
            audio_playing: false,
            commit: Deadline::new(),
            resize: Deadline::new(),
            effects: Vec::new(),
        }
    }

    /// Load a random option for the current language if nothing is loaded yet.
    pub fn mount(&mut self, rng: &mut fastrand::Rng) {
        if !self.slides.is_empty() {
            return;
        }

        let options = self.library.options(&self.language);
        let option = if options.is_empty() {
            warn!("No available options found for language: {}", self.language);
            FALLBACK_OPTION
        } else {
            options[rng.usize(..options.len())]
        };
        info!("Starting with {}/option{}", self.language, option);
        self.select_option(option);
    }

    /// Load the slide set for `option` in the current language and restart playback.
    pub fn select_option(&mut self, option: u32) {
        self.selector_open = false;

        let Some(resolved) = self.library.resolve(&self.language, option) else {
            error!("Slide library has no fallback set; nothing to show");
            return;
        };
        self.slides = resolved.slides.to_vec();
        self.option = Some(resolved.option);
        info!(
            "Selected {}/option{} ({} slides)",
            resolved.language,
            resolved.option,
            self.slides.len()
        );

        self.commit.cancel();
        self.switching = false;
        self.transitioning = false;
        self.current_index = 0;
        self.total_words_read = 0;
        self.slider_value = -1;
        self.error = None;
        self.hovering_last_word = false;
        self.play_video = false;
        self.play_foreground_video = false;

        self.begin_media(0);
        self.sync_audio();
    }

    /// Switch language, remember it, and reopen the selector with no slides loaded.
    pub fn select_language(&mut self, language: &str) {
        info!("Language changed to {}", language);
        self.language = language.to_string();
        if let Err(e) = self.store.set_preferred_language(language) {
            warn!("Failed to persist preferred language: {}", e);
        }

        self.option = None;
        self.selector_open = true;
        self.slides.clear();
        self.commit.cancel();
        self.switching = false;
        self.transitioning = false;
        self.current_index = 0;
        self.total_words_read = 0;
        self.slider_value = -1;
        self.error = None;
        self.hovering_last_word = false;
        self.media = MediaState::default();
        self.generation.invalidate();
        self.play_video = false;
        self.play_foreground_video = false;

        self.sync_audio();
    }

    /// Reveal words up to `n`. Revealing the last word moves on to the next slide.
    pub fn reveal_up_to(&mut self, n: i32, now_ms: u64) -> bool {
        if self.is_busy() || self.slides.is_empty() {
            return false;
        }

        let word_count = self.word_count() as i32;
        if n <= self.slider_value || n > word_count {
            return false;
        }

        if self.current_index == 0 && n == 0 && self.current_slide().is_some_and(Slide::has_audio) {
            debug!("First word revealed, arming autoplay");
            self.play_video = true;
            self.play_foreground_video = true;
        }

        if n == word_count {
            self.slider_value = n;
            self.advance(now_ms);
        } else {
            self.total_words_read += (n - self.slider_value) as u64;
            self.slider_value = n;
        }

        self.sync_audio();
        true
    }

    /// Clicking the next hidden word reveals it; any other word is ignored.
    pub fn click_word(&mut self, index: usize, now_ms: u64) -> bool {
        if self.is_busy() || index as i64 != self.slider_value as i64 + 1 {
            return false;
        }
        self.reveal_up_to(index as i32 + 1, now_ms)
    }

    pub fn hover_word(&mut self, index: usize) {
        let words = self.word_count();
        self.hovering_last_word = words > 0 && index == words - 1;
    }

    pub fn unhover_word(&mut self) {
        self.hovering_last_word = false;
    }

    /// The "Next Slide" button shown while hovering the last word.
    pub fn special_action(&mut self, now_ms: u64) -> bool {
        self.advance(now_ms)
    }

    /// Start moving to the next slide (wrapping after the last one).
    pub fn advance(&mut self, now_ms: u64) -> bool {
        if self.is_busy() || self.slides.is_empty() {
            return false;
        }

        self.switching = true;
        self.transitioning = true;
        let next_index = (self.current_index + 1) % self.slides.len();
        debug!("Advancing from slide {} to {}", self.current_index, next_index);

        self.slider_value = -1;
        self.hovering_last_word = false;
        self.error = None;
        self.play_video = false;
        self.play_foreground_video = false;

        self.begin_media(next_index);
        self.commit
            .schedule(now_ms + self.config.transition_ms, next_index);

        self.sync_audio();
        true
    }

    /// Record a viewport width; the media swap happens after the debounce period.
    pub fn resize(&mut self, width: u32, now_ms: u64) {
        self.resize
            .schedule(now_ms + self.config.resize_debounce_ms, width);
    }

    /// Fire every timer due at `now_ms`. Returns whether anything fired.
    pub fn tick(&mut self, now_ms: u64) -> bool {
        let mut fired = false;

        if let Some(next_index) = self.commit.take_due(now_ms) {
            self.current_index = next_index;
            self.switching = false;
            if self.media.kind == MediaKind::None {
                // nothing will report a load for this slide
                self.transitioning = false;
            }
            info!("Now showing slide {}", next_index);
            self.sync_audio();
            fired = true;
        }

        if let Some(width) = self.resize.take_due(now_ms) {
            self.apply_viewport(width);
            fired = true;
        }

        fired
    }

    /// Stop every pending timer.
    pub fn shutdown(&mut self) {
        self.commit.cancel();
        self.resize.cancel();
    }

    /// The background finished loading.
    pub fn media_loaded(&mut self, token: LoadToken) -> bool {
        if !self.accepts(token) {
            return false;
        }
        debug!("Media loaded: {}", self.media.src);
        self.media.loaded = true;
        self.error = None;
        self.transitioning = false;
        true
    }

    /// The background failed to load.
    pub fn media_failed(&mut self, token: LoadToken) -> bool {
        if !self.accepts(token) {
            return false;
        }
        error!("Failed to load {:?}: {}", self.media.kind, self.media.src);
        self.media.loaded = false;
        self.error = Some(i18n::translations(&self.language).error_loading_media.to_string());
        self.transitioning = false;
        true
    }

    /// Try the failed background again.
    pub fn retry(&mut self) -> bool {
        if self.error.is_none() {
            return false;
        }

        match self.media.kind {
            MediaKind::Image => {
                info!("Retrying image {}", self.media.src);
                let token = self.generation.next();
                self.media.token = Some(token);
                self.effects.push(Effect::PreloadImage {
                    token,
                    src: self.media.src.clone(),
                });
            }
            MediaKind::Video => {
                info!("Retrying video {}", self.media.src);
                let token = self.generation.next();
                self.media.loaded = false;
                self.media.token = Some(token);
                self.error = None;
                self.effects.push(Effect::LoadVideo {
                    token,
                    src: self.media.src.clone(),
                });
            }
            MediaKind::None => self.error = None,
        }
        true
    }

    /// Open the selector; only allowed from the first slide.
    pub fn open_selector(&mut self) -> bool {
        if self.current_index != 0 {
            return false;
        }
        self.selector_open = true;
        true
    }

    pub fn close_selector(&mut self) {
        self.selector_open = false;
    }

    /// Swap in a new library and restart the current option from it.
    pub fn replace_library(&mut self, library: SlideLibrary) {
        self.library = library;
        if let Some(option) = self.option {
            self.select_option(option);
        }
    }

    /// Dispatch a front-end event. Returns whether it was accepted.
    pub fn apply(&mut self, action: Action, now_ms: u64) -> bool {
        match action {
            Action::Reveal { to } => self.reveal_up_to(to, now_ms),
            Action::ClickWord { index } => self.click_word(index, now_ms),
            Action::HoverWord { index } => {
                self.hover_word(index);
                true
            }
            Action::UnhoverWord => {
                self.unhover_word();
                true
            }
            Action::Next => self.special_action(now_ms),
            Action::SelectOption { option } => {
                self.select_option(option);
                true
            }
            Action::SelectLanguage { language } => {
                self.select_language(&language);
                true
            }
            Action::OpenSelector => self.open_selector(),
            Action::CloseSelector => {
                self.close_selector();
                true
            }
            Action::Retry => self.retry(),
            Action::Resize { width } => {
                self.resize(width, now_ms);
                true
            }
            Action::MediaLoaded { token } => self.media_loaded(token),
            Action::MediaFailed { token } => self.media_failed(token),
        }
    }

    /// Take the effects queued since the last call.
    pub fn drain_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    /// When the next timer is due, if any.
    pub fn next_deadline_ms(&self) -> Option<u64> {
        timer::earliest(&[self.commit.due_ms(), self.resize.due_ms()])
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn library(&self) -> &SlideLibrary {
        &self.library
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn selected_option(&self) -> Option<u32> {
        self.option
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_slide(&self) -> Option<&Slide> {
        self.slides.get(self.current_index)
    }

    pub fn words(&self) -> Vec<&str> {
        self.current_slide().map(Slide::words).unwrap_or_default()
    }

    pub fn word_count(&self) -> usize {
        self.current_slide().map_or(0, Slide::word_count)
    }

    pub fn slider_value(&self) -> i32 {
        self.slider_value
    }

    pub fn total_words_read(&self) -> u64 {
        self.total_words_read
    }

    pub fn media(&self) -> &MediaState {
        &self.media
    }

    pub fn is_switching(&self) -> bool {
        self.switching
    }

    pub fn is_transitioning(&self) -> bool {
        self.transitioning
    }

    /// Either latch is set; slide changes and reveals are refused.
    pub fn is_busy(&self) -> bool {
        self.switching || self.transitioning
    }

    pub fn should_play_video(&self) -> bool {
        self.play_video
    }

    pub fn should_play_foreground_video(&self) -> bool {
        self.play_foreground_video
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_selector_open(&self) -> bool {
        self.selector_open
    }

    pub fn is_hovering_last_word(&self) -> bool {
        self.hovering_last_word
    }

    pub fn is_small_screen(&self) -> bool {
        self.small_screen
    }

    pub fn viewport_width(&self) -> u32 {
        self.viewport_width
    }

    pub fn is_audio_playing(&self) -> bool {
        self.audio_playing
    }

    fn accepts(&self, token: LoadToken) -> bool {
        let current = self.media.token == Some(token) && self.generation.is_current(token);
        if !current {
            debug!("Discarding stale media result (token {})", token.value());
        }
        current
    }

    // Point the background at slide `index` and ask for it to be loaded.
    fn begin_media(&mut self, index: usize) {
        let request = self
            .slides
            .get(index)
            .map(|slide| media::resolve_background(slide, self.small_screen))
            .unwrap_or_else(MediaRequest::none);

        self.error = None;
        self.media.loaded = false;
        self.media.src = request.src.clone();
        self.media.kind = request.kind;

        match request.kind {
            MediaKind::Image => {
                let token = self.generation.next();
                self.media.token = Some(token);
                self.effects.push(Effect::PreloadImage {
                    token,
                    src: request.src,
                });
            }
            MediaKind::Video => {
                let token = self.generation.next();
                self.media.token = Some(token);
                self.effects.push(Effect::LoadVideo {
                    token,
                    src: request.src,
                });
            }
            MediaKind::None => {
                self.generation.invalidate();
                self.media.token = None;
            }
        }
    }

    fn apply_viewport(&mut self, width: u32) {
        self.viewport_width = width;
        let small_screen = width < self.config.small_screen_width;
        if small_screen == self.small_screen {
            return;
        }

        info!(
            "Viewport {}px crossed the {}px threshold",
            width, self.config.small_screen_width
        );
        self.small_screen = small_screen;
        if self.slides.is_empty() {
            return;
        }
        // mid-transition the slide being loaded is the pending one
        let index = self.commit.payload().copied().unwrap_or(self.current_index);
        self.begin_media(index);
    }

    fn sync_audio(&mut self) {
        let narration = self.slides.first().and_then(|slide| slide.audio.as_ref());
        let playing = should_play_audio(self.current_index, self.slider_value, narration.is_some());
        if playing == self.audio_playing {
            return;
        }

        self.audio_playing = playing;
        match narration {
            Some(audio) if playing => self.effects.push(Effect::PlayAudio {
                src: audio.src.clone(),
                mime: audio.mime.clone(),
            }),
            _ => self.effects.push(Effect::StopAudio),
        }
    }
}
