// ABOUTME: Background media resolution and load probing for the slideshow
// ABOUTME: Handles generation tokens plus local and remote image/video probes

use crate::errors::{Result, StoryError};
use crate::slides::Slide;
use log::{debug, info};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Kind of background media currently shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    #[default]
    None,
}

/// A background asset chosen for a slide.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaRequest {
    pub src: String,
    pub kind: MediaKind,
}

impl MediaRequest {
    pub fn none() -> Self {
        Self::default()
    }
}

/// Pick the background for a slide: video wins over image, image over nothing.
/// Below the small-screen threshold the small image variant is used.
pub fn resolve_background(slide: &Slide, small_screen: bool) -> MediaRequest {
    if let Some(video) = &slide.video {
        return MediaRequest {
            src: video.clone(),
            kind: MediaKind::Video,
        };
    }

    if slide.image.is_some() || slide.image_small.is_some() {
        let preferred = if small_screen {
            slide.image_small.as_ref().or(slide.image.as_ref())
        } else {
            slide.image.as_ref().or(slide.image_small.as_ref())
        };
        if let Some(src) = preferred {
            return MediaRequest {
                src: src.clone(),
                kind: MediaKind::Image,
            };
        }
    }

    MediaRequest::none()
}

/// Identifies one load request; results carrying an older token are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoadToken(u64);

impl LoadToken {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Monotonic source of load tokens.
#[derive(Debug, Default)]
pub struct Generation {
    current: u64,
}

impl Generation {
    /// Start a new generation, invalidating every earlier token.
    pub fn next(&mut self) -> LoadToken {
        self.current += 1;
        LoadToken(self.current)
    }

    /// Invalidate outstanding tokens without issuing a new one.
    pub fn invalidate(&mut self) {
        self.current += 1;
    }

    pub fn is_current(&self, token: LoadToken) -> bool {
        token.0 == self.current
    }
}

/// Loads media to find out whether it can be shown.
pub trait MediaProbe {
    /// Succeeds when the image at `src` can be loaded.
    fn probe_image(&self, src: &str) -> Result<()>;

    /// Succeeds when the video at `src` can start playing.
    fn probe_video(&self, src: &str) -> Result<()>;
}

impl<P: MediaProbe + ?Sized> MediaProbe for Arc<P> {
    fn probe_image(&self, src: &str) -> Result<()> {
        (**self).probe_image(src)
    }

    fn probe_video(&self, src: &str) -> Result<()> {
        (**self).probe_video(src)
    }
}

/// Probes files on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalProbe {
    root: PathBuf,
}

impl LocalProbe {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, src: &str) -> PathBuf {
        let path = Path::new(src.trim_start_matches('/'));
        if Path::new(src).is_absolute() && Path::new(src).exists() {
            PathBuf::from(src)
        } else {
            self.root.join(path)
        }
    }

    fn probe_path(&self, path: &Path) -> Result<()> {
        if !path.is_file() {
            return Err(StoryError::PathNotFoundError(path.to_path_buf()));
        }
        Ok(())
    }

    pub fn probe_image_path(&self, path: &Path) -> Result<()> {
        self.probe_path(path)?;
        let dimensions = image::io::Reader::open(path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(StoryError::FileReadError)?
            .into_dimensions()
            .map_err(|e| StoryError::ImageError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        debug!("Image {:?} is {}x{}", path, dimensions.0, dimensions.1);
        Ok(())
    }

    pub fn probe_video_path(&self, path: &Path) -> Result<()> {
        self.probe_path(path)?;
        let len = path.metadata().map_err(StoryError::FileReadError)?.len();
        if len == 0 {
            return Err(StoryError::MediaUnavailable(format!(
                "Video file is empty: {:?}",
                path
            )));
        }
        Ok(())
    }
}

impl MediaProbe for LocalProbe {
    fn probe_image(&self, src: &str) -> Result<()> {
        self.probe_image_path(&self.resolve(src))
    }

    fn probe_video(&self, src: &str) -> Result<()> {
        self.probe_video_path(&self.resolve(src))
    }
}

/// Probes remote media with HEAD requests, retrying with backoff.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    attempts: u32,
    initial_backoff_ms: u64,
}

impl HttpProbe {
    pub fn new(timeout_ms: u64, attempts: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(StoryError::FetchError)?;
        Ok(Self {
            client,
            attempts: attempts.max(1),
            initial_backoff_ms: 200,
        })
    }

    fn probe_url(&self, url: &str, expected: &str) -> Result<()> {
        info!("Probing remote media: {}", url);

        let mut retry_delay = self.initial_backoff_ms;
        let mut last_error = None;

        for attempt in 1..=self.attempts {
            let outcome = self.client.head(url).send().and_then(|response| {
                let status = response.status();
                if status == StatusCode::METHOD_NOT_ALLOWED || status == StatusCode::NOT_IMPLEMENTED {
                    debug!("HEAD not supported for {}, falling back to GET", url);
                    self.client.get(url).send()
                } else {
                    Ok(response)
                }
            });

            match outcome {
                Ok(response) if response.status().is_success() => {
                    let content_type = response
                        .headers()
                        .get(reqwest::header::CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default();
                    if !accepts_content_type(content_type, expected) {
                        return Err(StoryError::MediaUnavailable(format!(
                            "{} has content type {}, expected {}/*",
                            url, content_type, expected
                        )));
                    }
                    return Ok(());
                }
                Ok(response) => {
                    last_error = Some(StoryError::MediaUnavailable(format!(
                        "HTTP error {} for {}",
                        response.status(),
                        url
                    )));
                }
                Err(e) => last_error = Some(StoryError::FetchError(e)),
            }

            if attempt < self.attempts {
                info!(
                    "Probe attempt {} failed, retrying in {} ms",
                    attempt, retry_delay
                );
                std::thread::sleep(Duration::from_millis(retry_delay));
                retry_delay *= 2;
            }
        }

        Err(last_error
            .unwrap_or_else(|| StoryError::MediaUnavailable(format!("Unknown error probing {}", url))))
    }
}

// Servers often label media generically; only an explicit other type is a failure.
fn accepts_content_type(content_type: &str, expected: &str) -> bool {
    content_type.is_empty()
        || content_type.starts_with(expected)
        || content_type.starts_with("application/octet-stream")
        || content_type.starts_with("binary/octet-stream")
}

impl MediaProbe for HttpProbe {
    fn probe_image(&self, src: &str) -> Result<()> {
        self.probe_url(src, "image")
    }

    fn probe_video(&self, src: &str) -> Result<()> {
        self.probe_url(src, "video")
    }
}

/// Where a media source points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaLocation {
    Remote(String),
    Local(PathBuf),
    Relative(String),
}

/// Classify a media source string by its URL scheme.
pub fn locate(src: &str) -> Result<MediaLocation> {
    if src.trim().is_empty() {
        return Err(StoryError::InvalidMediaSource("empty media source".to_string()));
    }

    match Url::parse(src) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(MediaLocation::Remote(url.to_string())),
            "file" => url.to_file_path().map(MediaLocation::Local).map_err(|_| {
                StoryError::InvalidMediaSource(format!("Invalid file URL: {}", src))
            }),
            other => Err(StoryError::InvalidMediaSource(format!(
                "Unsupported scheme {:?} in {}",
                other, src
            ))),
        },
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Ok(MediaLocation::Relative(src.to_string()))
        }
        Err(e) => Err(StoryError::InvalidMediaSource(format!("{}: {}", src, e))),
    }
}

/// Dispatches each source to the local or HTTP probe.
#[derive(Debug, Clone)]
pub struct AssetProbe {
    local: LocalProbe,
    http: HttpProbe,
}

impl AssetProbe {
    pub fn new(root: impl Into<PathBuf>, timeout_ms: u64, attempts: u32) -> Result<Self> {
        Ok(Self {
            local: LocalProbe::new(root),
            http: HttpProbe::new(timeout_ms, attempts)?,
        })
    }
}

impl MediaProbe for AssetProbe {
    fn probe_image(&self, src: &str) -> Result<()> {
        match locate(src)? {
            MediaLocation::Remote(url) => self.http.probe_image(&url),
            MediaLocation::Local(path) => self.local.probe_image_path(&path),
            MediaLocation::Relative(rel) => self.local.probe_image(&rel),
        }
    }

    fn probe_video(&self, src: &str) -> Result<()> {
        match locate(src)? {
            MediaLocation::Remote(url) => self.http.probe_video(&url),
            MediaLocation::Local(path) => self.local.probe_video_path(&path),
            MediaLocation::Relative(rel) => self.local.probe_video(&rel),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn slide_with(video: Option<&str>, image: Option<&str>, small: Option<&str>) -> Slide {
        Slide {
            video: video.map(String::from),
            image: image.map(String::from),
            image_small: small.map(String::from),
            ..Slide::default()
        }
    }

    #[test]
    fn test_video_takes_precedence_over_image() {
        let slide = slide_with(Some("v.mp4"), Some("i.png"), Some("s.png"));
        let media = resolve_background(&slide, true);
        assert_eq!(media.kind, MediaKind::Video);
        assert_eq!(media.src, "v.mp4");
    }

    #[test]
    fn test_small_screen_picks_small_variant() {
        let slide = slide_with(None, Some("i.png"), Some("s.png"));
        assert_eq!(resolve_background(&slide, true).src, "s.png");
        assert_eq!(resolve_background(&slide, false).src, "i.png");

        let only_large = slide_with(None, Some("i.png"), None);
        assert_eq!(resolve_background(&only_large, true).src, "i.png");

        let none = resolve_background(&Slide::default(), false);
        assert_eq!(none.kind, MediaKind::None);
        assert!(none.src.is_empty());
    }

    #[test]
    fn test_generation_invalidates_old_tokens() {
        let mut generation = Generation::default();
        let first = generation.next();
        assert!(generation.is_current(first));
        let second = generation.next();
        assert!(!generation.is_current(first));
        assert!(generation.is_current(second));
        generation.invalidate();
        assert!(!generation.is_current(second));
    }

    #[test]
    fn test_locate_classifies_sources() {
        assert_eq!(
            locate("https://example.com/a.png").unwrap(),
            MediaLocation::Remote("https://example.com/a.png".to_string())
        );
        assert_eq!(
            locate("images/a.png").unwrap(),
            MediaLocation::Relative("images/a.png".to_string())
        );
        assert!(matches!(locate("file:///tmp/a.png").unwrap(), MediaLocation::Local(_)));
        assert!(locate("ftp://example.com/a.png").is_err());
        assert!(locate("  ").is_err());
    }

    #[test]
    fn test_local_probe_decodes_image_header() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let png = dir.path().join("pixel.png");
        image::RgbImage::new(2, 2)
            .save(&png)
            .expect("Failed to write png");
        std::fs::write(dir.path().join("broken.png"), b"not an image").unwrap();

        let probe = LocalProbe::new(dir.path());
        assert!(probe.probe_image("pixel.png").is_ok());
        assert!(probe.probe_image("/pixel.png").is_ok());
        assert!(probe.probe_image("broken.png").is_err());
        assert!(matches!(
            probe.probe_image("missing.png"),
            Err(StoryError::PathNotFoundError(_))
        ));
    }

    #[test]
    fn test_local_probe_rejects_empty_video() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(dir.path().join("empty.mp4"), b"").unwrap();
        std::fs::write(dir.path().join("clip.mp4"), b"\x00\x00\x00\x18ftypmp42").unwrap();

        let probe = LocalProbe::new(dir.path());
        assert!(probe.probe_video("clip.mp4").is_ok());
        assert!(probe.probe_video("empty.mp4").is_err());
    }

    // Serves every request for a while, answering HEAD with `head_status`.
    fn media_server(
        head_status: u16,
        content_type: &'static str,
    ) -> (String, std::thread::JoinHandle<usize>) {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("Failed to bind test server");
        let port = server
            .server_addr()
            .to_ip()
            .expect("Test server should listen on TCP")
            .port();
        let handle = std::thread::spawn(move || {
            let mut served = 0;
            while let Ok(Some(request)) = server.recv_timeout(Duration::from_millis(500)) {
                let status = if *request.method() == tiny_http::Method::Head {
                    head_status
                } else {
                    200
                };
                let header = tiny_http::Header::from_bytes("Content-Type", content_type).unwrap();
                let response = tiny_http::Response::from_data(b"\x89PNG".to_vec())
                    .with_status_code(status)
                    .with_header(header);
                request.respond(response).unwrap();
                served += 1;
            }
            served
        });
        (format!("http://127.0.0.1:{}/page.png", port), handle)
    }

    #[test]
    fn test_http_probe_falls_back_to_get() {
        let (url, server) = media_server(405, "image/png");
        let probe = HttpProbe::new(2000, 1).unwrap();
        assert!(probe.probe_image(&url).is_ok());
        assert_eq!(server.join().unwrap(), 2);
    }

    #[test]
    fn test_http_probe_accepts_generic_content_type() {
        let (url, server) = media_server(200, "application/octet-stream");
        let probe = HttpProbe::new(2000, 1).unwrap();
        assert!(probe.probe_image(&url).is_ok());
        assert!(probe.probe_video(&url).is_ok());
        server.join().unwrap();
    }

    #[test]
    fn test_http_probe_rejects_other_media_kind() {
        let (url, server) = media_server(200, "text/html; charset=utf-8");
        let probe = HttpProbe::new(2000, 1).unwrap();
        assert!(matches!(
            probe.probe_image(&url),
            Err(StoryError::MediaUnavailable(_))
        ));
        server.join().unwrap();
    }

    #[test]
    fn test_accepts_content_type() {
        assert!(accepts_content_type("", "image"));
        assert!(accepts_content_type("image/webp", "image"));
        assert!(accepts_content_type("application/octet-stream", "video"));
        assert!(!accepts_content_type("video/mp4", "image"));
    }
}
