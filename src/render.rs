// ABOUTME: Terminal rendering module for the story-slides application
// ABOUTME: Draws slideshow views and flip-book spreads as text and parses console commands

use crate::book::{PageView, Spread};
use crate::controller::Action;
use crate::errors::{Result, StoryError};
use crate::slides::ForegroundMedia;
use crate::view::{BackgroundView, LayerView, SlideshowView};
use std::fmt::Write;

/// A line typed into the interactive slideshow session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Act(Action),
    Show,
    Help,
    Quit,
}

/// A line typed into the flip-book session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookCommand {
    Next,
    Prev,
    Show,
    Quit,
}

pub const PLAY_HELP: &str = "\
Commands:
  reveal N     reveal words up to N (0 reveals the first word)
  click N      click word N (only the next hidden word responds)
  hover N      hover word N
  unhover      stop hovering
  next         next slide
  option N     choose story option N
  lang L       switch language (e.g. english, hindi)
  menu         open the option selector (first slide only)
  close        close the option selector
  retry        retry loading failed media
  resize W     set the viewport width in pixels
  show         redraw
  quit         leave";

fn parse_number<T: std::str::FromStr>(command: &str, arg: Option<&str>) -> Result<T> {
    arg.ok_or_else(|| StoryError::ValidationError(format!("{} needs a number", command)))?
        .parse()
        .map_err(|_| StoryError::ValidationError(format!("{} needs a number", command)))
}

/// Parse one line of the slideshow console.
pub fn parse_command(line: &str) -> Result<Command> {
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return Ok(Command::Show);
    };
    let arg = parts.next();

    let parsed = match command.to_lowercase().as_str() {
        "reveal" | "r" => Command::Act(Action::Reveal {
            to: parse_number(command, arg)?,
        }),
        "click" | "c" => Command::Act(Action::ClickWord {
            index: parse_number(command, arg)?,
        }),
        "hover" => Command::Act(Action::HoverWord {
            index: parse_number(command, arg)?,
        }),
        "unhover" => Command::Act(Action::UnhoverWord),
        "next" | "n" => Command::Act(Action::Next),
        "option" | "o" => Command::Act(Action::SelectOption {
            option: parse_number(command, arg)?,
        }),
        "lang" | "language" => Command::Act(Action::SelectLanguage {
            language: arg
                .ok_or_else(|| StoryError::ValidationError("lang needs a language".to_string()))?
                .to_lowercase(),
        }),
        "menu" => Command::Act(Action::OpenSelector),
        "close" => Command::Act(Action::CloseSelector),
        "retry" => Command::Act(Action::Retry),
        "resize" => Command::Act(Action::Resize {
            width: parse_number(command, arg)?,
        }),
        "show" => Command::Show,
        "help" | "?" => Command::Help,
        "quit" | "q" | "exit" => Command::Quit,
        other => {
            return Err(StoryError::ValidationError(format!(
                "Unknown command: {} (try help)",
                other
            )))
        }
    };
    Ok(parsed)
}

/// Parse one line of the flip-book console.
pub fn parse_book_command(line: &str) -> Result<BookCommand> {
    match line.trim().to_lowercase().as_str() {
        "next" | "n" => Ok(BookCommand::Next),
        "prev" | "p" => Ok(BookCommand::Prev),
        "" | "show" => Ok(BookCommand::Show),
        "quit" | "q" | "exit" => Ok(BookCommand::Quit),
        other => Err(StoryError::ValidationError(format!(
            "Unknown command: {} (next, prev, show, quit)",
            other
        ))),
    }
}

fn describe_layer(name: &str, layer: &LayerView) -> String {
    let media = match &layer.media {
        ForegroundMedia::Image { src, alt, .. } => match alt {
            Some(alt) => format!("image {} ({})", src, alt),
            None => format!("image {}", src),
        },
        ForegroundMedia::Video { .. } => {
            let sources: Vec<String> = layer
                .media
                .video_sources()
                .into_iter()
                .map(|s| format!("{} [{}]", s.src, s.mime))
                .collect();
            format!(
                "video {} {}",
                sources.join(", "),
                if layer.should_play { "playing" } else { "paused" }
            )
        }
        ForegroundMedia::Component { name, props, .. } => {
            format!("component {} {}", name, serde_json::Value::Object(props.clone()))
        }
    };
    format!("{}: {}", name, media)
}

/// Render a slideshow view as plain text.
pub fn render_view(view: &SlideshowView) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "== {} / option {} == slide {}/{}",
        view.language,
        view.option.map_or("-".to_string(), |o| o.to_string()),
        if view.slide_count == 0 { 0 } else { view.slide_index + 1 },
        view.slide_count
    );

    let background = match &view.background {
        BackgroundView::None => "none".to_string(),
        BackgroundView::Image { src, loaded, .. } => format!(
            "image {}{}",
            src,
            if *loaded { "" } else { " (loading)" }
        ),
        BackgroundView::Video {
            src,
            should_play,
            loaded,
            ..
        } => format!(
            "video {}{}{}",
            src,
            if *should_play { " playing" } else { " paused" },
            if *loaded { "" } else { " (loading)" }
        ),
    };
    let _ = writeln!(out, "background: {}", background);

    if let Some(layer) = &view.foreground {
        let _ = writeln!(out, "{}", describe_layer("foreground", layer));
    }
    if let Some(layer) = &view.additional_foreground {
        let _ = writeln!(out, "{}", describe_layer("overlay", layer));
    }

    let words: Vec<String> = view
        .subtitle
        .words
        .iter()
        .enumerate()
        .map(|(i, word)| {
            if word.visible {
                word.text.clone()
            } else if word.clickable {
                format!("[{}]", i)
            } else {
                "_".repeat(word.text.chars().count().max(1))
            }
        })
        .collect();
    let _ = writeln!(out, "subtitle: {}", words.join(" "));
    if view.subtitle.show_next_button {
        let _ = writeln!(out, "  <{}>", view.subtitle.next_button_label);
    }
    let _ = writeln!(
        out,
        "slider: {}/{}{}",
        view.slider.value,
        view.slider.max,
        if view.slider.disabled { " (disabled)" } else { "" }
    );
    let _ = writeln!(out, "{}: {}", view.word_count.label, view.word_count.total);

    if let Some(audio) = &view.audio {
        let _ = writeln!(
            out,
            "narration: {} {}",
            audio.src,
            if audio.playing { "playing" } else { "stopped" }
        );
    }

    if let Some(error) = &view.error {
        let _ = writeln!(out, "!! {} ({}: retry)", error.message, error.retry_label);
    }

    if view.selector.open {
        let _ = writeln!(out, "-- {} --", view.selector.header);
        for option in &view.selector.options {
            let _ = writeln!(out, "  option {}: {} [{}]", option.number, option.label, option.thumbnail);
        }
        let languages: Vec<String> = view
            .selector
            .languages
            .iter()
            .map(|l| {
                if l.selected {
                    format!("*{}* ({})", l.name, l.code)
                } else {
                    format!("{} ({})", l.name, l.code)
                }
            })
            .collect();
        let _ = writeln!(out, "  {} {}", view.selector.language_label, languages.join(", "));
    }

    out
}

fn describe_page(page: &PageView) -> String {
    format!(
        "page {}: {}{}",
        page.number,
        page.src,
        if page.fallback { " (placeholder)" } else { "" }
    )
}

/// Render a flip-book spread as plain text.
pub fn render_spread(spread: &Spread) -> String {
    let right = spread
        .right
        .as_ref()
        .map(describe_page)
        .unwrap_or_else(|| "(empty page)".to_string());
    format!(
        "{}\n{}\n[{}prev] [{}next]\n",
        describe_page(&spread.left),
        right,
        if spread.prev_disabled { "x " } else { "" },
        if spread.next_disabled { "x " } else { "" }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::FlipBook;
    use crate::controller::{ControllerConfig, SlideshowController};
    use crate::prefs::MemoryStore;
    use crate::slides::{Slide, SlideLibrary};

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse_command("reveal 3").unwrap(),
            Command::Act(Action::Reveal { to: 3 })
        );
        assert_eq!(
            parse_command("LANG Hindi").unwrap(),
            Command::Act(Action::SelectLanguage {
                language: "hindi".to_string()
            })
        );
        assert_eq!(parse_command("").unwrap(), Command::Show);
        assert_eq!(parse_command("q").unwrap(), Command::Quit);
        assert!(parse_command("click").is_err());
        assert!(parse_command("option two").is_err());
        assert!(parse_command("dance").is_err());
    }

    #[test]
    fn test_parse_book_commands() {
        assert_eq!(parse_book_command(" next ").unwrap(), BookCommand::Next);
        assert_eq!(parse_book_command("p").unwrap(), BookCommand::Prev);
        assert!(parse_book_command("jump").is_err());
    }

    #[test]
    fn test_render_view_masks_hidden_words() {
        let mut library = SlideLibrary::new();
        library.insert(
            "english",
            1,
            vec![Slide {
                image: Some("bg.png".to_string()),
                subtitle: Some("Once upon time".to_string()),
                ..Slide::default()
            }],
        );
        let mut c = SlideshowController::new(library, MemoryStore::new(), ControllerConfig::default(), 1280);
        c.select_option(1);
        c.reveal_up_to(0, 0);

        let text = render_view(&SlideshowView::capture(&c));
        assert!(text.contains("slide 1/1"));
        assert!(text.contains("background: image bg.png (loading)"));
        assert!(text.contains("subtitle: Once [1] ____"));
        assert!(text.contains("Total Words Revealed: 1"));
    }

    #[test]
    fn test_render_spread_shows_empty_right_page() {
        let mut book = FlipBook::new(vec!["a.png".into(), "b.png".into(), "c.png".into()], "x.png");
        book.next();
        let text = render_spread(&book.spread().unwrap());
        assert!(text.contains("page 3: c.png"));
        assert!(text.contains("(empty page)"));
        assert!(text.contains("[x next]"));
    }
}
