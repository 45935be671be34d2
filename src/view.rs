// ABOUTME: Render-ready snapshot of the slideshow for front ends
// ABOUTME: Describes background, overlays, subtitle, counter, audio, selector and error props

use crate::controller::SlideshowController;
use crate::i18n;
use crate::media::{LoadToken, MediaKind};
use crate::prefs::PreferenceStore;
use crate::slides::{ForegroundMedia, Style};
use serde::Serialize;

/// Everything a renderer needs to draw the slideshow at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideshowView {
    pub language: String,
    pub option: Option<u32>,
    pub slide_index: usize,
    pub slide_count: usize,
    pub background: BackgroundView,
    pub foreground: Option<LayerView>,
    pub additional_foreground: Option<LayerView>,
    pub subtitle: SubtitleView,
    pub slider: SliderView,
    pub word_count: WordCountView,
    pub audio: Option<AudioView>,
    pub selector: SelectorView,
    pub error: Option<ErrorView>,
    /// Clicking the background or overlays opens the selector.
    pub selector_clickable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackgroundView {
    None,
    #[serde(rename_all = "camelCase")]
    Image {
        src: String,
        loaded: bool,
        label: String,
    },
    #[serde(rename_all = "camelCase")]
    Video {
        src: String,
        should_play: bool,
        loaded: bool,
        token: Option<LoadToken>,
        label: String,
    },
}

/// A foreground overlay and whether its video may play.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerView {
    pub media: ForegroundMedia,
    pub should_play: bool,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordView {
    pub text: String,
    pub visible: bool,
    pub clickable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleView {
    pub words: Vec<WordView>,
    pub show_next_button: bool,
    pub next_button_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SliderView {
    pub value: i32,
    pub max: usize,
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordCountView {
    pub label: String,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioView {
    pub src: String,
    pub mime: String,
    pub style: Option<Style>,
    pub playing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionView {
    pub number: u32,
    pub label: String,
    pub thumbnail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageView {
    pub code: String,
    pub name: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorView {
    pub open: bool,
    pub header: String,
    pub language_label: String,
    pub options: Vec<OptionView>,
    pub languages: Vec<LanguageView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorView {
    pub message: String,
    pub retry_label: String,
    pub retry_aria_label: String,
}

impl SlideshowView {
    pub fn capture<S: PreferenceStore>(controller: &SlideshowController<S>) -> Self {
        let text = i18n::translations(controller.language());
        let index = controller.current_index();
        let on_first_slide = index == 0;
        let slide = controller.current_slide();
        let media = controller.media();

        let background = match media.kind {
            MediaKind::None => BackgroundView::None,
            _ if media.src.is_empty() => BackgroundView::None,
            MediaKind::Image => BackgroundView::Image {
                src: media.src.clone(),
                loaded: media.loaded,
                label: text.background_image.to_string(),
            },
            MediaKind::Video => BackgroundView::Video {
                src: media.src.clone(),
                should_play: on_first_slide && controller.should_play_video(),
                loaded: media.loaded,
                token: media.token,
                label: text.background_video.to_string(),
            },
        };

        let foreground = slide.and_then(|s| s.foreground.clone()).map(|media| LayerView {
            should_play: media.is_video()
                && on_first_slide
                && controller.should_play_foreground_video(),
            media,
            label: text.foreground.to_string(),
        });

        let additional_foreground =
            slide
                .and_then(|s| s.additional_foreground.clone())
                .map(|media| LayerView {
                    media,
                    should_play: false,
                    label: text.additional_foreground.to_string(),
                });

        let slider_value = controller.slider_value();
        let words: Vec<WordView> = controller
            .words()
            .into_iter()
            .enumerate()
            .map(|(i, word)| WordView {
                text: word.to_string(),
                visible: slider_value >= i as i32,
                clickable: i as i32 == slider_value + 1,
            })
            .collect();

        let audio = slide.and_then(|s| s.audio.as_ref()).map(|narration| AudioView {
            src: narration.src.clone(),
            mime: narration.mime.clone(),
            style: narration.style.clone(),
            playing: controller.is_audio_playing(),
        });

        let options = controller
            .config()
            .option_thumbnails
            .iter()
            .enumerate()
            .map(|(i, thumbnail)| {
                let number = i as u32 + 1;
                OptionView {
                    number,
                    label: text.option_label(number),
                    thumbnail: thumbnail.clone(),
                }
            })
            .collect();

        let languages = controller
            .library()
            .languages()
            .into_iter()
            .map(|code| LanguageView {
                code: code.to_string(),
                name: text.language_name(code).to_string(),
                selected: code == controller.language(),
            })
            .collect();

        Self {
            language: controller.language().to_string(),
            option: controller.selected_option(),
            slide_index: index,
            slide_count: controller.slides().len(),
            background,
            foreground,
            additional_foreground,
            subtitle: SubtitleView {
                show_next_button: controller.is_hovering_last_word(),
                next_button_label: text.next_slide.to_string(),
                words,
            },
            slider: SliderView {
                value: slider_value,
                max: controller.word_count(),
                disabled: controller.is_busy(),
            },
            word_count: WordCountView {
                label: text.words_revealed.to_string(),
                total: controller.total_words_read(),
            },
            audio,
            selector: SelectorView {
                open: controller.is_selector_open(),
                header: text.selector_header.to_string(),
                language_label: text.select_language.to_string(),
                options,
                languages,
            },
            error: controller.error().map(|message| ErrorView {
                message: message.to_string(),
                retry_label: text.retry.to_string(),
                retry_aria_label: text.retry_label.to_string(),
            }),
            selector_clickable: on_first_slide,
        }
    }
}
