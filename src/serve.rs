// ABOUTME: HTTP surface for the slideshow: view state, actions and static media
// ABOUTME: Optionally watches the slide library and hot-reloads it on change

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use notify::{RecursiveMode, Watcher};
use notify_debouncer_full::new_debouncer;
use serde_json::json;
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

use crate::controller::Action;
use crate::errors::{Result, StoryError};
use crate::media::MediaProbe;
use crate::player::{self, Clock, Player};
use crate::prefs::PreferenceStore;
use crate::slides::SlideLibrary;
use crate::utils;

/// Configuration for serve mode
#[derive(Debug, Clone)]
pub struct ServeConfig {
    /// Library file to hot-reload; `None` when serving the demo library
    pub slides_path: Option<PathBuf>,

    /// Directory static files are served from
    pub asset_root: PathBuf,

    /// Port for the local web server
    pub port: u16,

    /// Whether to reload the library when it changes on disk
    pub watch: bool,

    /// Debounce time for file events in milliseconds
    pub debounce_ms: u64,

    /// How often pending timers are checked, in milliseconds
    pub tick_ms: u64,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            slides_path: None,
            asset_root: PathBuf::from("."),
            port: 8080,
            watch: false,
            debounce_ms: 500,
            tick_ms: 50,
        }
    }
}

/// A response before it is handed to tiny_http.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Reply {
    fn json(status: u16, value: serde_json::Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: value.to_string().into_bytes(),
        }
    }

    fn text(status: u16, message: &str) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8",
            body: message.as_bytes().to_vec(),
        }
    }
}

type Shared<S, P, C> = Arc<Mutex<Player<S, P, C>>>;

/// Content type for a served file, by extension
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "html" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        _ => "application/octet-stream",
    }
}

/// Answer the JSON endpoints. Returns `None` for paths that are not part of the API.
pub fn route_api<S, P, C>(
    method: &Method,
    path: &str,
    body: &str,
    player: &Mutex<Player<S, P, C>>,
) -> Option<Reply>
where
    S: PreferenceStore,
    P: MediaProbe + Clone,
    C: Clock,
{
    match (method, path) {
        (Method::Get, "/state") => Some(state_reply(200, None, &player.lock())),
        (Method::Post, "/action") => {
            let reply = match serde_json::from_str::<Action>(body) {
                Ok(action) => {
                    let accepted = player.lock().dispatch(action);
                    run_loads(player);
                    state_reply(200, Some(accepted), &player.lock())
                }
                Err(e) => {
                    warn!("Rejected action {:?}: {}", body, e);
                    Reply::json(400, json!({ "error": format!("Invalid action: {}", e) }))
                }
            };
            Some(reply)
        }
        (_, "/state") | (_, "/action") => Some(Reply::text(405, "405 Method Not Allowed")),
        _ => None,
    }
}

/// Probe queued media without holding the lock, so slow remote loads never
/// stall state requests or the timers. Stale results are dropped by token.
pub fn run_loads<S, P, C>(player: &Mutex<Player<S, P, C>>)
where
    S: PreferenceStore,
    P: MediaProbe + Clone,
    C: Clock,
{
    loop {
        let (loads, probe) = {
            let mut player = player.lock();
            (player.take_loads(), player.probe().clone())
        };
        if loads.is_empty() {
            break;
        }
        for load in loads {
            let outcome = player::run_load(&probe, &load);
            player.lock().finish_load(&load, outcome);
        }
    }
}

fn state_reply<S, P, C>(status: u16, accepted: Option<bool>, player: &Player<S, P, C>) -> Reply
where
    S: PreferenceStore,
    P: MediaProbe,
    C: Clock,
{
    match serde_json::to_value(player.view()) {
        Ok(view) => match accepted {
            Some(accepted) => Reply::json(status, json!({ "accepted": accepted, "state": view })),
            None => Reply::json(status, view),
        },
        Err(e) => {
            error!("Failed to serialize view: {}", e);
            Reply::text(500, "500 Internal Server Error")
        }
    }
}

/// Serve a file under `root`, refusing paths that escape it.
pub fn serve_static(root: &Path, url_path: &str) -> Reply {
    let url_path = if url_path == "/" { "/index.html" } else { url_path };
    let Some(file_path) = utils::safe_join(root, url_path) else {
        warn!("Refusing path outside asset root: {}", url_path);
        return Reply::text(404, "404 Not Found");
    };

    debug!("Request for {:?} -> {:?}", url_path, file_path);

    if !file_path.is_file() {
        return Reply::text(404, "404 Not Found");
    }
    match fs::read(&file_path) {
        Ok(content) => Reply {
            status: 200,
            content_type: content_type_for(&file_path),
            body: content,
        },
        Err(e) => {
            error!("Failed to read file {:?}: {}", file_path, e);
            Reply::text(500, &format!("Failed to read file: {}", e))
        }
    }
}

fn respond(request: Request, reply: Reply) {
    let response = Response::from_data(reply.body).with_status_code(StatusCode(reply.status));
    let response = match Header::from_bytes("Content-Type", reply.content_type) {
        Ok(header) => response.with_header(header),
        Err(()) => {
            error!("Invalid content type header: {}", reply.content_type);
            response
        }
    };
    if let Err(e) = request.respond(response) {
        error!("Failed to send response: {}", e);
    }
}

fn handle<S, P, C>(mut request: Request, player: &Mutex<Player<S, P, C>>, root: &Path)
where
    S: PreferenceStore,
    P: MediaProbe + Clone,
    C: Clock,
{
    let path = request.url().split('?').next().unwrap_or("/").to_string();
    let method = request.method().clone();

    let mut body = String::new();
    if method == Method::Post {
        if let Err(e) = request.as_reader().read_to_string(&mut body) {
            warn!("Failed to read request body: {}", e);
            respond(request, Reply::text(400, "400 Bad Request"));
            return;
        }
    }

    let reply = match route_api(&method, &path, &body, player) {
        Some(reply) => reply,
        None if method == Method::Get => serve_static(root, &path),
        None => Reply::text(405, "405 Method Not Allowed"),
    };
    respond(request, reply);
}

fn start_ticker<S, P, C>(player: Shared<S, P, C>, tick_ms: u64)
where
    S: PreferenceStore + Send + 'static,
    P: MediaProbe + Clone + Send + 'static,
    C: Clock + Send + 'static,
{
    thread::spawn(move || loop {
        thread::sleep(Duration::from_millis(tick_ms));
        let fired = {
            let mut player = player.lock();
            let fired = player.fire_timers();
            if fired {
                debug!("Timer fired, now on slide {}", player.controller().current_index());
            }
            fired
        };
        if fired {
            run_loads(&player);
        }
    });
}

/// Reload the library and hand it to the running slideshow.
pub fn reload_library<S, P, C>(path: &Path, player: &Mutex<Player<S, P, C>>) -> Result<()>
where
    S: PreferenceStore,
    P: MediaProbe + Clone,
    C: Clock,
{
    let library = SlideLibrary::load(path)?;
    player.lock().controller_mut().replace_library(library);
    run_loads(player);
    info!("Slide library reloaded from {:?}", path);
    Ok(())
}

fn is_library_event(path: &Path, library_path: &Path) -> bool {
    if path == library_path {
        return true;
    }
    match (
        utils::get_absolute_path(path),
        utils::get_absolute_path(library_path),
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => path.file_name().is_some() && path.file_name() == library_path.file_name(),
    }
}

fn start_watcher<S, P, C>(
    library_path: PathBuf,
    debounce_ms: u64,
    player: Shared<S, P, C>,
) -> Result<()>
where
    S: PreferenceStore + Send + 'static,
    P: MediaProbe + Clone + Send + 'static,
    C: Clock + Send + 'static,
{
    utils::validate_file_exists(&library_path)?;

    let watch_path = match library_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let abs_watch_path = utils::get_absolute_path(&watch_path)?;

    let (tx, rx) = mpsc::channel();
    let mut debouncer = new_debouncer(Duration::from_millis(debounce_ms), None, tx)
        .map_err(|e| StoryError::WatchError(format!("Failed to create file watcher: {}", e)))?;
    debouncer
        .watcher()
        .watch(&abs_watch_path, RecursiveMode::NonRecursive)
        .map_err(|e| {
            StoryError::WatchError(format!(
                "Failed to start watching {:?}: {}",
                abs_watch_path, e
            ))
        })?;

    info!("Watching {:?} for library changes", library_path);

    thread::spawn(move || {
        // the debouncer stops watching when dropped
        let _debouncer = debouncer;
        for result in rx {
            match result {
                Ok(events) => {
                    let relevant = events
                        .iter()
                        .flat_map(|event| event.paths.iter())
                        .any(|path| is_library_event(path, &library_path));
                    if relevant {
                        if let Err(e) = reload_library(&library_path, &player) {
                            error!("Failed to reload slide library: {}", e);
                        }
                    }
                }
                Err(errors) => {
                    for e in errors {
                        error!("Watch error: {:?}", e);
                    }
                }
            }
        }
    });

    Ok(())
}

/// Serve the slideshow over HTTP until the process is stopped.
pub fn serve<S, P, C>(config: ServeConfig, player: Player<S, P, C>) -> Result<()>
where
    S: PreferenceStore + Send + 'static,
    P: MediaProbe + Clone + Send + 'static,
    C: Clock + Send + 'static,
{
    let server = Server::http(format!("0.0.0.0:{}", config.port))
        .map_err(|e| StoryError::ServeError(format!("Failed to start HTTP server: {}", e)))?;
    let player = Arc::new(Mutex::new(player));

    start_ticker(player.clone(), config.tick_ms);

    if config.watch {
        match &config.slides_path {
            Some(path) => start_watcher(path.clone(), config.debounce_ms, player.clone())?,
            None => warn!("--watch ignored: the demo library has no file to watch"),
        }
    }

    info!("HTTP server listening on http://localhost:{}", config.port);
    println!(
        "Serving slideshow on http://localhost:{} (Press Ctrl+C to stop)",
        config.port
    );

    for request in server.incoming_requests() {
        handle(request, &player, &config.asset_root);
    }

    player.lock().shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{ControllerConfig, SlideshowController};
    use crate::player::ManualClock;
    use crate::prefs::MemoryStore;
    use std::time::Instant;
    use tempfile::TempDir;

    #[derive(Clone)]
    struct AlwaysLoads;

    impl MediaProbe for AlwaysLoads {
        fn probe_image(&self, _src: &str) -> Result<()> {
            Ok(())
        }

        fn probe_video(&self, _src: &str) -> Result<()> {
            Ok(())
        }
    }

    /// Blocks on one image until the test releases it.
    struct GatedProbe {
        gated: String,
        entered: std::sync::Mutex<mpsc::Sender<()>>,
        release: std::sync::Mutex<mpsc::Receiver<()>>,
    }

    impl MediaProbe for GatedProbe {
        fn probe_image(&self, src: &str) -> Result<()> {
            if src == self.gated {
                let _ = self.entered.lock().unwrap().send(());
                let _ = self
                    .release
                    .lock()
                    .unwrap()
                    .recv_timeout(Duration::from_secs(5));
            }
            Ok(())
        }

        fn probe_video(&self, _src: &str) -> Result<()> {
            Ok(())
        }
    }

    fn controller() -> SlideshowController<MemoryStore> {
        let library = SlideLibrary::demo().unwrap();
        SlideshowController::new(library, MemoryStore::new(), ControllerConfig::default(), 1280)
    }

    fn player() -> Mutex<Player<MemoryStore, AlwaysLoads, ManualClock>> {
        let mut player = Player::new(controller(), AlwaysLoads, ManualClock::default());
        player.start(&mut fastrand::Rng::with_seed(7));
        Mutex::new(player)
    }

    fn body_json(reply: &Reply) -> serde_json::Value {
        serde_json::from_slice(&reply.body).unwrap()
    }

    #[test]
    fn test_get_state() {
        let mut player = player();
        let reply = route_api(&Method::Get, "/state", "", &player).unwrap();
        assert_eq!(reply.status, 200);
        assert_eq!(reply.content_type, "application/json");
        let state = body_json(&reply);
        assert_eq!(state["language"], "english");
        assert_eq!(state["slideIndex"], 0);
    }

    #[test]
    fn test_post_action() {
        let mut player = player();
        let reply = route_api(
            &Method::Post,
            "/action",
            r#"{"action":"reveal","to":0}"#,
            &player,
        )
        .unwrap();
        assert_eq!(reply.status, 200);
        let body = body_json(&reply);
        assert_eq!(body["accepted"], true);
        assert_eq!(body["state"]["slider"]["value"], 0);
        assert_eq!(body["state"]["wordCount"]["total"], 1);
    }

    #[test]
    fn test_bad_action_is_rejected() {
        let mut player = player();
        let reply = route_api(&Method::Post, "/action", "{\"action\":\"fly\"}", &player).unwrap();
        assert_eq!(reply.status, 400);
        assert!(body_json(&reply)["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid action"));

        let reply = route_api(&Method::Get, "/action", "", &player).unwrap();
        assert_eq!(reply.status, 405);
        assert!(route_api(&Method::Get, "/images/a.png", "", &player).is_none());
    }

    #[test]
    fn test_serve_static() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        fs::create_dir_all(dir.path().join("images")).unwrap();
        fs::write(dir.path().join("images/a.webp"), b"RIFF").unwrap();

        let reply = serve_static(dir.path(), "/images/a.webp");
        assert_eq!(reply.status, 200);
        assert_eq!(reply.content_type, "image/webp");
        assert_eq!(reply.body, b"RIFF");

        assert_eq!(serve_static(dir.path(), "/missing.png").status, 404);
        assert_eq!(serve_static(dir.path(), "/../secret").status, 404);
        assert_eq!(serve_static(dir.path(), "/").status, 404);
    }

    #[test]
    fn test_reload_library_keeps_language_and_option() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("library.json");
        fs::write(
            &path,
            r#"{"english": {"option1": [{"image": "new.png", "subtitle": "Fresh words"}]}}"#,
        )
        .unwrap();

        let shared = player();
        shared.lock().apply(Action::SelectOption { option: 1 });
        reload_library(&path, &shared).unwrap();

        let player = shared.lock();
        assert_eq!(player.controller().selected_option(), Some(1));
        assert_eq!(player.controller().words(), vec!["Fresh", "words"]);
        assert!(player.controller().media().loaded);
    }

    #[test]
    fn test_state_answers_while_media_is_loading() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let probe = Arc::new(GatedProbe {
            gated: "images/forest/1.webp".to_string(),
            entered: std::sync::Mutex::new(entered_tx),
            release: std::sync::Mutex::new(release_rx),
        });

        let mut controller = controller();
        controller.select_option(1);
        let mut player = Player::new(controller, probe, ManualClock::default());
        player.start(&mut fastrand::Rng::with_seed(7));
        let shared = Arc::new(Mutex::new(player));

        let worker = {
            let shared = shared.clone();
            thread::spawn(move || {
                route_api(&Method::Post, "/action", r#"{"action":"next"}"#, &*shared).unwrap()
            })
        };

        entered_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("media load never started");

        let started = Instant::now();
        let reply = route_api(&Method::Get, "/state", "", &*shared).unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(reply.status, 200);
        let state = body_json(&reply);
        assert_eq!(state["background"]["src"], "images/forest/1.webp");
        assert_eq!(state["background"]["loaded"], false);

        release_tx.send(()).unwrap();
        let reply = worker.join().unwrap();
        assert_eq!(body_json(&reply)["accepted"], true);
        assert!(shared.lock().controller().media().loaded);
    }
}
