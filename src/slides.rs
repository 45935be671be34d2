// ABOUTME: Slide data model and the per-language slide library
// ABOUTME: Loads, validates and resolves slide sets keyed by language and option number

use crate::errors::{Result, StoryError};
use crate::utils;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Language used when a requested slide set is missing.
pub const FALLBACK_LANGUAGE: &str = "english";

/// Option used when a requested slide set is missing.
pub const FALLBACK_OPTION: u32 = 1;

const OPTION_KEY_PREFIX: &str = "option";

const DEMO_LIBRARY: &str = include_str!("../demos/library.json");

/// Inline style properties handed through to renderers untouched.
pub type Style = BTreeMap<String, String>;

/// One unit of the story: background media, overlays, subtitle and narration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slide {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_small: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<Narration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreground: Option<ForegroundMedia>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_foreground: Option<ForegroundMedia>,
}

impl Slide {
    /// Subtitle words, split on whitespace.
    pub fn words(&self) -> Vec<&str> {
        self.subtitle
            .as_deref()
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn word_count(&self) -> usize {
        self.subtitle
            .as_deref()
            .map(|s| s.split_whitespace().count())
            .unwrap_or(0)
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }
}

/// Narration clip attached to a slide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narration {
    pub src: String,
    #[serde(rename = "type", default = "default_audio_mime")]
    pub mime: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Style>,
}

fn default_audio_mime() -> String {
    "audio/mpeg".to_string()
}

/// A source entry for a foreground video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSource {
    pub src: String,
    #[serde(rename = "type")]
    pub mime: String,
}

/// Foreground overlay, one variant per kind of media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ForegroundMedia {
    Image {
        src: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alt: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        style: Option<Style>,
    },
    Video {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        sources: Vec<VideoSource>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        src: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        style: Option<Style>,
    },
    Component {
        name: String,
        #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
        props: serde_json::Map<String, Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        style: Option<Style>,
    },
}

impl ForegroundMedia {
    pub fn is_video(&self) -> bool {
        matches!(self, ForegroundMedia::Video { .. })
    }

    /// Sources a video overlay should offer, falling back to `src` as webm.
    pub fn video_sources(&self) -> Vec<VideoSource> {
        match self {
            ForegroundMedia::Video { sources, src, .. } => {
                if !sources.is_empty() {
                    sources.clone()
                } else {
                    src.iter()
                        .map(|s| VideoSource {
                            src: s.clone(),
                            mime: "video/webm".to_string(),
                        })
                        .collect()
                }
            }
            _ => Vec::new(),
        }
    }
}

/// Ordered slides selected for one language and option.
pub type SlideSet = Vec<Slide>;

/// A slide set looked up for a language/option pair, after fallback.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedSet<'a> {
    pub language: &'a str,
    pub option: u32,
    pub slides: &'a [Slide],
    pub fell_back: bool,
}

/// Read-only mapping from language to option number to slide set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlideLibrary {
    languages: BTreeMap<String, BTreeMap<u32, SlideSet>>,
}

impl SlideLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a library from JSON of the form `{ "english": { "option1": [ ... ] } }`.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, BTreeMap<String, Value>> = serde_json::from_str(json)?;
        let mut library = SlideLibrary::new();

        for (language, options) in raw {
            for (key, value) in options {
                let Some(option) = parse_option_key(&key) else {
                    debug!("Ignoring non-option key {:?} for language {}", key, language);
                    continue;
                };
                let slides: SlideSet = serde_json::from_value(value).map_err(|e| {
                    StoryError::LibraryError(format!(
                        "Invalid slides for {}/{}: {}",
                        language, key, e
                    ))
                })?;
                library.insert(&language, option, slides);
            }
        }

        library.validate()?;
        Ok(library)
    }

    /// Load and validate a library from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading slide library: {:?}", path);
        utils::validate_file_exists(path)?;
        let json = fs::read_to_string(path).map_err(StoryError::FileReadError)?;
        Self::from_json(&json)
    }

    /// The library bundled with the binary.
    pub fn demo() -> Result<Self> {
        Self::from_json(DEMO_LIBRARY)
    }

    pub fn insert(&mut self, language: &str, option: u32, slides: SlideSet) {
        self.languages
            .entry(language.to_string())
            .or_default()
            .insert(option, slides);
    }

    /// Check the invariants the controller relies on.
    pub fn validate(&self) -> Result<()> {
        for (language, options) in &self.languages {
            for (option, slides) in options {
                if *option == 0 {
                    return Err(StoryError::ValidationError(format!(
                        "Option numbers start at 1 ({} has option 0)",
                        language
                    )));
                }
                if slides.is_empty() {
                    return Err(StoryError::ValidationError(format!(
                        "Slide set {}/option{} is empty",
                        language, option
                    )));
                }
            }
        }

        if self.get(FALLBACK_LANGUAGE, FALLBACK_OPTION).is_none() {
            return Err(StoryError::ValidationError(format!(
                "Library must contain {}/option{}",
                FALLBACK_LANGUAGE, FALLBACK_OPTION
            )));
        }

        Ok(())
    }

    pub fn languages(&self) -> Vec<&str> {
        self.languages.keys().map(String::as_str).collect()
    }

    /// Option numbers available for a language, in ascending order.
    pub fn options(&self, language: &str) -> Vec<u32> {
        self.languages
            .get(language)
            .map(|options| options.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn get(&self, language: &str, option: u32) -> Option<&[Slide]> {
        self.languages
            .get(language)
            .and_then(|options| options.get(&option))
            .filter(|slides| !slides.is_empty())
            .map(Vec::as_slice)
    }

    /// Look up a slide set, substituting the fallback set when it is missing.
    pub fn resolve(&self, language: &str, option: u32) -> Option<ResolvedSet<'_>> {
        if let Some((code, options)) = self.languages.get_key_value(language) {
            if let Some(slides) = options.get(&option).filter(|s| !s.is_empty()) {
                return Some(ResolvedSet {
                    language: code,
                    option,
                    slides,
                    fell_back: false,
                });
            }
        }

        warn!(
            "No slides for {}/option{}, falling back to {}/option{}",
            language, option, FALLBACK_LANGUAGE, FALLBACK_OPTION
        );
        let (code, options) = self.languages.get_key_value(FALLBACK_LANGUAGE)?;
        let slides = options.get(&FALLBACK_OPTION).filter(|s| !s.is_empty())?;
        Some(ResolvedSet {
            language: code,
            option: FALLBACK_OPTION,
            slides,
            fell_back: true,
        })
    }

    /// Total number of slides across every set.
    pub fn slide_count(&self) -> usize {
        self.languages
            .values()
            .flat_map(|options| options.values())
            .map(Vec::len)
            .sum()
    }
}

fn parse_option_key(key: &str) -> Option<u32> {
    key.strip_prefix(OPTION_KEY_PREFIX)?.parse().ok()
}
