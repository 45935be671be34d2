// ABOUTME: Localized user-facing strings for the slideshow and selector
// ABOUTME: Falls back to English for languages without a translation table

/// Strings shown to the reader in one language.
#[derive(Debug)]
pub struct Translations {
    pub error_loading_media: &'static str,
    pub retry: &'static str,
    pub retry_label: &'static str,
    pub selector_header: &'static str,
    pub select_language: &'static str,
    pub option_prefix: &'static str,
    pub next_slide: &'static str,
    pub words_revealed: &'static str,
    pub background_image: &'static str,
    pub background_video: &'static str,
    pub foreground: &'static str,
    pub additional_foreground: &'static str,
    /// Display names of languages, by language code.
    pub languages: &'static [(&'static str, &'static str)],
}

static ENGLISH: Translations = Translations {
    error_loading_media: "Failed to load media.",
    retry: "Retry",
    retry_label: "Retry loading media",
    selector_header: "Select an Option",
    select_language: "Select Language:",
    option_prefix: "Option",
    next_slide: "Next Slide",
    words_revealed: "Total Words Revealed",
    background_image: "Background Image",
    background_video: "Background Video",
    foreground: "Foreground",
    additional_foreground: "Additional Foreground",
    languages: &[("english", "English"), ("hindi", "Hindi")],
};

static HINDI: Translations = Translations {
    error_loading_media: "मीडिया लोड करने में विफल रहा।",
    retry: "पुनः प्रयास करें",
    retry_label: "मीडिया लोड करने का पुनः प्रयास करें",
    selector_header: "एक विकल्प चुनें",
    select_language: "भाषा चुनें:",
    option_prefix: "विकल्प",
    next_slide: "अगली स्लाइड",
    words_revealed: "कुल प्रकट शब्द",
    background_image: "पृष्ठभूमि छवि",
    background_video: "पृष्ठभूमि वीडियो",
    foreground: "पूर्वभूमि",
    additional_foreground: "अतिरिक्त पूर्वभूमि",
    languages: &[("english", "अंग्रेज़ी"), ("hindi", "हिंदी")],
};

/// Translations for `language`, English when there is no table for it.
pub fn translations(language: &str) -> &'static Translations {
    match language {
        "hindi" => &HINDI,
        _ => &ENGLISH,
    }
}

impl Translations {
    pub fn option_label(&self, option: u32) -> String {
        format!("{} {}", self.option_prefix, option)
    }

    /// Name of a language in this table, or the raw code if unknown.
    pub fn language_name<'a>(&self, code: &'a str) -> &'a str {
        self.languages
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, name)| *name)
            .unwrap_or(code)
    }
}
