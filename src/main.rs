// ABOUTME: Main entry point for the story-slides program.
// ABOUTME: Provides CLI interface and executes commands from the library.

use clap::{Args, Parser, Subcommand};
use log::info;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use story_slides::book::FlipBook;
use story_slides::media::{AssetProbe, LocalProbe};
use story_slides::player::{MonotonicClock, Player};
use story_slides::prefs::JsonFileStore;
use story_slides::render::{self, BookCommand, Command, PLAY_HELP};
use story_slides::{utils, Config, ServeConfig, SlideLibrary, SlideshowController};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a slideshow interactively in the terminal
    Play(PlayArgs),

    /// Page through a two-page flip-book
    Book(BookArgs),

    /// Serve the slideshow state and media over HTTP
    Serve(ServeArgs),

    /// Check a slide library file and report what it contains
    Validate(ValidateArgs),
}

#[derive(Args)]
struct PlayArgs {
    /// Slide library JSON (defaults to the built-in demo library)
    #[arg(short, long)]
    slides: Option<PathBuf>,

    /// Viewport width in pixels
    #[arg(short, long)]
    width: Option<u32>,

    /// Language to start in
    #[arg(short, long)]
    language: Option<String>,

    /// Option to start with instead of a random one
    #[arg(short, long)]
    option: Option<u32>,

    /// Where the preferred language is remembered
    #[arg(long)]
    prefs: Option<PathBuf>,

    /// Seed for picking the starting option
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args)]
struct BookArgs {
    /// Glob matching the page images, e.g. "pages/*.png"
    #[arg(short, long)]
    pages: String,

    /// Image shown in place of pages that fail to load
    #[arg(long)]
    placeholder: Option<String>,
}

#[derive(Args)]
struct ServeArgs {
    /// Slide library JSON (defaults to the built-in demo library)
    #[arg(short, long)]
    slides: Option<PathBuf>,

    /// Port for the local web server
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Reload the library when the file changes
    #[arg(long)]
    watch: bool,

    /// Viewport width in pixels
    #[arg(short, long)]
    width: Option<u32>,
}

#[derive(Args)]
struct ValidateArgs {
    /// Slide library JSON to check
    #[arg(short, long)]
    slides: PathBuf,
}

fn load_library(path: Option<&Path>) -> story_slides::Result<SlideLibrary> {
    match path {
        Some(path) => SlideLibrary::load(path),
        None => {
            info!("No library given, using the demo library");
            SlideLibrary::demo()
        }
    }
}

fn rng_for(seed: Option<u64>) -> fastrand::Rng {
    match seed {
        Some(seed) => fastrand::Rng::with_seed(seed),
        None => fastrand::Rng::new(),
    }
}

fn prompt() -> anyhow::Result<()> {
    print!("> ");
    io::stdout().flush()?;
    Ok(())
}

fn run_play(args: &PlayArgs, config: &Config) -> anyhow::Result<()> {
    let slides_path = args.slides.clone().or_else(|| config.slides_path.clone());
    let library = load_library(slides_path.as_deref())?;
    let prefs_path = args.prefs.clone().unwrap_or_else(|| config.prefs_path.clone());
    let store = JsonFileStore::open(&prefs_path)?;
    let probe = AssetProbe::new(
        utils::asset_root(slides_path.as_deref()),
        config.probe_timeout_ms,
        config.probe_attempts,
    )?;

    let mut controller = SlideshowController::new(
        library,
        store,
        config.get_controller_config(None, None, None),
        args.width.unwrap_or(config.viewport_width),
    );
    if let Some(language) = &args.language {
        controller.select_language(language);
    }
    if let Some(option) = args.option {
        controller.select_option(option);
    }

    let mut player = Player::new(controller, probe, MonotonicClock::default());
    player.start(&mut rng_for(args.seed));
    print!("{}", render::render_view(&player.view()));
    prompt()?;

    for line in io::stdin().lock().lines() {
        let line = line?;
        match render::parse_command(&line) {
            Ok(Command::Quit) => break,
            Ok(Command::Help) => println!("{}", PLAY_HELP),
            Ok(Command::Show) => print!("{}", render::render_view(&player.view())),
            Ok(Command::Act(action)) => {
                if !player.apply(action) {
                    println!("(ignored)");
                }
                player.settle();
                print!("{}", render::render_view(&player.view()));
            }
            Err(e) => eprintln!("{}", e),
        }
        prompt()?;
    }

    player.shutdown();
    println!();
    Ok(())
}

fn run_book(args: &BookArgs, config: &Config) -> anyhow::Result<()> {
    let placeholder = args
        .placeholder
        .clone()
        .unwrap_or_else(|| config.placeholder_image.clone());
    let mut book = FlipBook::from_glob(&args.pages, placeholder)?;
    let probe = LocalProbe::new(".");

    let show = |book: &mut FlipBook| {
        book.check_visible(&probe);
        if let Some(spread) = book.spread() {
            print!("{}", render::render_spread(&spread));
        }
    };

    show(&mut book);
    prompt()?;
    for line in io::stdin().lock().lines() {
        let line = line?;
        match render::parse_book_command(&line) {
            Ok(BookCommand::Quit) => break,
            Ok(BookCommand::Next) => {
                if !book.next() {
                    println!("(last page)");
                }
                show(&mut book);
            }
            Ok(BookCommand::Prev) => {
                if !book.prev() {
                    println!("(first page)");
                }
                show(&mut book);
            }
            Ok(BookCommand::Show) => show(&mut book),
            Err(e) => eprintln!("{}", e),
        }
        prompt()?;
    }
    println!();
    Ok(())
}

fn run_serve(args: &ServeArgs, config: &Config) -> anyhow::Result<()> {
    let slides_path = args.slides.clone().or_else(|| config.slides_path.clone());
    let library = load_library(slides_path.as_deref())?;
    let asset_root = utils::asset_root(slides_path.as_deref());
    let store = JsonFileStore::open(&config.prefs_path)?;
    let probe = AssetProbe::new(&asset_root, config.probe_timeout_ms, config.probe_attempts)?;

    let controller = SlideshowController::new(
        library,
        store,
        config.get_controller_config(None, None, None),
        args.width.unwrap_or(config.viewport_width),
    );
    let mut player = Player::new(controller, probe, MonotonicClock::default());
    player.start(&mut fastrand::Rng::new());

    let serve_config = ServeConfig {
        slides_path,
        asset_root,
        port: args.port,
        watch: args.watch,
        ..ServeConfig::default()
    };
    story_slides::serve(serve_config, player)?;
    Ok(())
}

fn run_validate(args: &ValidateArgs) -> anyhow::Result<()> {
    let library = SlideLibrary::load(&args.slides)?;
    println!("Library OK: {:?}", args.slides);
    for language in library.languages() {
        let counts: Vec<String> = library
            .options(language)
            .into_iter()
            .map(|option| {
                let slides = library.get(language, option).map_or(0, |s| s.len());
                format!("option{} ({} slides)", option, slides)
            })
            .collect();
        println!("  {}: {}", language, counts.join(", "));
    }
    println!("Total slides: {}", library.slide_count());
    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let config = Config::from_env();

    let result = match &cli.command {
        Some(Commands::Play(args)) => run_play(args, &config),
        Some(Commands::Book(args)) => run_book(args, &config),
        Some(Commands::Serve(args)) => run_serve(args, &config),
        Some(Commands::Validate(args)) => run_validate(args),
        None => {
            println!("No command specified. Use --help for usage information.");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
