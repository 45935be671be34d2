// ABOUTME: Drives a slideshow controller against real media probes and a clock
// ABOUTME: Executes controller effects, feeds load results back and fires due timers

use crate::controller::{Action, Effect, SlideshowController};
use crate::errors::Result;
use crate::media::MediaProbe;
use crate::prefs::PreferenceStore;
use crate::view::SlideshowView;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Millisecond time source for the controller's timers.
pub trait Clock {
    fn now_ms(&self) -> u64;
    fn sleep_until(&self, due_ms: u64);
}

/// Wall-clock time measured from construction.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    start: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn sleep_until(&self, due_ms: u64) {
        let now = self.now_ms();
        if due_ms > now {
            std::thread::sleep(Duration::from_millis(due_ms - now));
        }
    }
}

/// A clock that only moves when told to; sleeping jumps straight to the deadline.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn sleep_until(&self, due_ms: u64) {
        self.now.fetch_max(due_ms, Ordering::SeqCst);
    }
}

/// What the narration output is doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioStatus {
    Stopped,
    Playing { src: String, mime: String },
}

/// Probe the media behind a load effect. Other effects need no probing.
pub fn run_load<P: MediaProbe + ?Sized>(probe: &P, load: &Effect) -> Result<()> {
    match load {
        Effect::PreloadImage { src, .. } => probe.probe_image(src),
        Effect::LoadVideo { src, .. } => probe.probe_video(src),
        Effect::PlayAudio { .. } | Effect::StopAudio => Ok(()),
    }
}

/// Owns a controller and performs the work it asks for.
pub struct Player<S: PreferenceStore, P: MediaProbe, C: Clock> {
    controller: SlideshowController<S>,
    probe: P,
    clock: C,
    audio: AudioStatus,
}

impl<S: PreferenceStore, P: MediaProbe, C: Clock> Player<S, P, C> {
    pub fn new(controller: SlideshowController<S>, probe: P, clock: C) -> Self {
        Self {
            controller,
            probe,
            clock,
            audio: AudioStatus::Stopped,
        }
    }

    /// Mount the controller (random first option) and load its media.
    pub fn start(&mut self, rng: &mut fastrand::Rng) {
        self.controller.mount(rng);
        self.pump();
    }

    pub fn controller(&self) -> &SlideshowController<S> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut SlideshowController<S> {
        &mut self.controller
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    pub fn probe_mut(&mut self) -> &mut P {
        &mut self.probe
    }

    pub fn audio(&self) -> &AudioStatus {
        &self.audio
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn view(&self) -> SlideshowView {
        SlideshowView::capture(&self.controller)
    }

    /// Apply a front-end action and run whatever it triggered.
    pub fn apply(&mut self, action: Action) -> bool {
        let accepted = self.dispatch(action);
        self.pump();
        accepted
    }

    /// Apply an action but leave the media loads it queued for the caller.
    pub fn dispatch(&mut self, action: Action) -> bool {
        debug!("Applying {:?}", action);
        let now = self.clock.now_ms();
        self.controller.apply(action, now)
    }

    /// Fire due timers and run the resulting effects.
    pub fn tick(&mut self) -> bool {
        let fired = self.fire_timers();
        if fired {
            self.pump();
        }
        fired
    }

    /// Fire due timers but leave the media loads they queued for the caller.
    pub fn fire_timers(&mut self) -> bool {
        self.controller.tick(self.clock.now_ms())
    }

    /// Wait out every pending timer, so the slideshow reaches a resting state.
    pub fn settle(&mut self) {
        while let Some(due) = self.controller.next_deadline_ms() {
            self.clock.sleep_until(due);
            self.tick();
        }
    }

    /// Run queued effects until the controller stops producing new ones.
    pub fn pump(&mut self) {
        loop {
            let loads = self.take_loads();
            if loads.is_empty() {
                break;
            }
            for load in loads {
                let outcome = run_load(&self.probe, &load);
                self.finish_load(&load, outcome);
            }
        }
    }

    /// Take the queued effects. Audio is handled here; media loads are returned
    /// so they can be probed without holding on to the player.
    pub fn take_loads(&mut self) -> Vec<Effect> {
        let mut loads = Vec::new();
        for effect in self.controller.drain_effects() {
            match effect {
                Effect::PlayAudio { src, mime } => {
                    info!("Playing narration {} ({})", src, mime);
                    self.audio = AudioStatus::Playing { src, mime };
                }
                Effect::StopAudio => {
                    if self.audio != AudioStatus::Stopped {
                        info!("Narration stopped and rewound");
                    }
                    self.audio = AudioStatus::Stopped;
                }
                load => loads.push(load),
            }
        }
        loads
    }

    /// Report how a load from `take_loads` went. Stale results are dropped by the controller.
    pub fn finish_load(&mut self, load: &Effect, outcome: Result<()>) {
        let token = match load {
            Effect::PreloadImage { token, .. } | Effect::LoadVideo { token, .. } => *token,
            _ => return,
        };
        match outcome {
            Ok(()) => {
                self.controller.media_loaded(token);
            }
            Err(e) => {
                warn!("Failed to load {:?}: {}", load, e);
                self.controller.media_failed(token);
            }
        }
    }

    /// Cancel timers before the player is dropped.
    pub fn shutdown(&mut self) {
        self.controller.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ControllerConfig;
    use crate::errors::StoryError;
    use crate::prefs::MemoryStore;
    use crate::slides::{Narration, Slide, SlideLibrary};
    use std::cell::RefCell;

    #[derive(Default)]
    struct FakeProbe {
        broken: Vec<String>,
        seen: RefCell<Vec<String>>,
    }

    impl MediaProbe for FakeProbe {
        fn probe_image(&self, src: &str) -> Result<()> {
            self.seen.borrow_mut().push(src.to_string());
            if self.broken.iter().any(|b| b == src) {
                Err(StoryError::MediaUnavailable(src.to_string()))
            } else {
                Ok(())
            }
        }

        fn probe_video(&self, src: &str) -> Result<()> {
            self.probe_image(src)
        }
    }

    fn library() -> SlideLibrary {
        let mut library = SlideLibrary::new();
        library.insert(
            "english",
            1,
            vec![
                Slide {
                    image: Some("start.png".to_string()),
                    subtitle: Some("START NOW".to_string()),
                    audio: Some(Narration {
                        src: "start.mp3".to_string(),
                        mime: "audio/mpeg".to_string(),
                        style: None,
                    }),
                    ..Slide::default()
                },
                Slide {
                    image: Some("one.png".to_string()),
                    subtitle: Some("Hello there".to_string()),
                    ..Slide::default()
                },
                Slide {
                    video: Some("two.mp4".to_string()),
                    subtitle: Some("Bye".to_string()),
                    ..Slide::default()
                },
            ],
        );
        library
    }

    fn player(probe: FakeProbe) -> Player<MemoryStore, FakeProbe, ManualClock> {
        let controller = SlideshowController::new(
            library(),
            MemoryStore::new(),
            ControllerConfig::default(),
            1280,
        );
        let mut player = Player::new(controller, probe, ManualClock::default());
        player.start(&mut fastrand::Rng::with_seed(1));
        player
    }

    #[test]
    fn test_start_loads_first_slide() {
        let player = player(FakeProbe::default());
        assert!(player.controller().media().loaded);
        assert_eq!(player.probe.seen.borrow().as_slice(), ["start.png"]);
    }

    #[test]
    fn test_story_scenario() {
        let mut player = player(FakeProbe::default());
        assert!(player.apply(Action::Reveal { to: 0 }));
        assert_eq!(
            player.audio(),
            &AudioStatus::Playing {
                src: "start.mp3".to_string(),
                mime: "audio/mpeg".to_string()
            }
        );
        assert!(player.apply(Action::Reveal { to: 2 }));
        assert_eq!(player.audio(), &AudioStatus::Stopped);
        assert_eq!(player.controller().current_index(), 0);

        player.settle();
        let c = player.controller();
        assert_eq!(c.current_index(), 1);
        assert_eq!(c.slider_value(), -1);
        assert!(!c.should_play_video());
        assert!(!c.should_play_foreground_video());
        assert!(!c.is_busy());
    }

    #[test]
    fn test_broken_image_surfaces_error_and_retry() {
        let probe = FakeProbe {
            broken: vec!["one.png".to_string()],
            ..FakeProbe::default()
        };
        let mut player = player(probe);
        player.apply(Action::Next);
        player.settle();
        assert_eq!(player.controller().current_index(), 1);
        assert_eq!(player.controller().error(), Some("Failed to load media."));
        assert!(!player.controller().is_busy());

        assert!(player.apply(Action::Retry));
        assert!(player.controller().error().is_some());
        assert_eq!(player.probe.seen.borrow().len(), 3);
    }

    #[test]
    fn test_resize_waits_for_debounce() {
        let mut player = player(FakeProbe::default());
        player.apply(Action::Resize { width: 500 });
        assert!(!player.controller().is_small_screen());
        player.clock.advance(299);
        assert!(!player.tick());
        player.clock.advance(1);
        assert!(player.tick());
        assert!(player.controller().is_small_screen());
    }

    #[test]
    fn test_loads_can_finish_outside_the_player() {
        let mut player = player(FakeProbe::default());
        assert!(player.dispatch(Action::Next));
        let loads = player.take_loads();
        assert_eq!(loads.len(), 1);
        assert!(!player.controller().media().loaded);

        // a newer option switch makes the outstanding load stale
        player.dispatch(Action::SelectOption { option: 1 });
        let outcome = run_load(&FakeProbe {
            broken: vec!["one.png".to_string()],
            ..FakeProbe::default()
        }, &loads[0]);
        assert!(outcome.is_err());
        player.finish_load(&loads[0], outcome);
        assert!(player.controller().error().is_none());

        player.pump();
        assert!(player.controller().media().loaded);
    }

    #[test]
    fn test_manual_clock_sleep_jumps_forward() {
        let clock = ManualClock::default();
        clock.sleep_until(500);
        assert_eq!(clock.now_ms(), 500);
        clock.sleep_until(100);
        assert_eq!(clock.now_ms(), 500);
    }
}
