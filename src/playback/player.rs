use super::registry::{PlaybackRegistry, PointId};
use crate::audio::source::FALLBACK_TONE_LABEL;
use crate::audio::{AudioHandle, MediaError, MediaSource, fallback_tone};
use std::cell::RefCell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub const LOAD_ERROR_MESSAGE: &str = "Unable to load sound";
pub const PLAY_ERROR_MESSAGE: &str = "Playback error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Loading,
    Playing,
    Errored,
}

/// Which source the player is on. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Primary,
    Fallback,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    Ended,
}

struct PlayerInner {
    point_id: PointId,
    media_ref: String,
    media_dir: Option<PathBuf>,
    handle: Box<dyn AudioHandle>,
    registry: PlaybackRegistry,
    state: PlayerState,
    source: SourceState,
    loaded: bool,
    error: Option<&'static str>,
    mounted: bool,
    fallback_assignments: u32,
}

impl PlayerInner {
    fn current_source(&self) -> Result<MediaSource, MediaError> {
        match self.source {
            SourceState::Primary => {
                MediaSource::resolve(&self.media_ref, self.media_dir.as_deref())
            }
            SourceState::Fallback | SourceState::Failed => Ok(fallback_tone()),
        }
    }

    fn current_label(&self) -> String {
        match self.source {
            SourceState::Primary => self.media_ref.clone(),
            SourceState::Fallback | SourceState::Failed => String::from(FALLBACK_TONE_LABEL),
        }
    }

    fn ensure_loaded(&mut self) -> Result<(), MediaError> {
        if self.loaded {
            return Ok(());
        }
        let source = self.current_source()?;
        self.handle.load(&source)?;
        self.loaded = true;
        Ok(())
    }

    fn fail(&mut self, message: &'static str) {
        self.handle.stop();
        self.loaded = false;
        self.source = SourceState::Failed;
        self.state = PlayerState::Errored;
        self.error = Some(message);
        self.registry.unregister(self.point_id);
        tracing::warn!(point_id = self.point_id, reason = message, "audio failed after fallback");
    }
}

/// The audio element behind one map popup (or tile modal).
///
/// Owns its handle and publishes itself to the shared [`PlaybackRegistry`] while
/// it plays. A broken primary source is swapped for the built-in tone once; if the
/// tone fails too the player ends up `Errored` with a short message. Once
/// [`teardown`](Self::teardown) ran every further call is ignored.
#[derive(Clone)]
pub struct PointPlayer {
    inner: Rc<RefCell<PlayerInner>>,
}

impl fmt::Debug for PointPlayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("PointPlayer")
            .field("point_id", &inner.point_id)
            .field("state", &inner.state)
            .field("source", &inner.source)
            .finish_non_exhaustive()
    }
}

impl PointPlayer {
    /// Creates the player and preloads its primary source, like an audio element
    /// with `preload = metadata`. A failing preload goes through the same error
    /// path as a later load error.
    pub fn mount(
        point_id: PointId,
        media_ref: &str,
        media_dir: Option<&Path>,
        handle: Box<dyn AudioHandle>,
        registry: PlaybackRegistry,
    ) -> Self {
        let player = Self {
            inner: Rc::new(RefCell::new(PlayerInner {
                point_id,
                media_ref: media_ref.to_string(),
                media_dir: media_dir.map(Path::to_path_buf),
                handle,
                registry,
                state: PlayerState::Idle,
                source: SourceState::Primary,
                loaded: false,
                error: None,
                mounted: true,
                fallback_assignments: 0,
            })),
        };

        let preload = player.inner.borrow_mut().ensure_loaded();
        if let Err(err) = preload {
            tracing::warn!(point_id, error = %err, "primary audio failed to load");
            player.handle_media_error();
        }
        player
    }

    /// Error event from the media element while nobody asked for playback.
    /// Only the first one on the primary source swaps in the fallback; later
    /// events leave the player as it is.
    pub fn handle_media_error(&self) {
        {
            let mut inner = self.inner.borrow_mut();
            if !inner.mounted {
                return;
            }
            if inner.source != SourceState::Primary {
                tracing::debug!(point_id = inner.point_id, "fallback already applied, media error ignored");
                return;
            }
            inner.state = PlayerState::Idle;
            inner.loaded = false;
            let point_id = inner.point_id;
            inner.registry.unregister(point_id);
        }
        self.recover(false, LOAD_ERROR_MESSAGE);
    }

    pub fn play(&self) -> bool {
        let attempt = {
            let mut inner = self.inner.borrow_mut();
            if !inner.mounted {
                return false;
            }
            inner.state = PlayerState::Loading;
            inner.error = None;
            inner.ensure_loaded().and_then(|()| inner.handle.play())
        };

        match attempt {
            Ok(()) => {
                self.on_started();
                true
            }
            Err(err) => {
                tracing::warn!(point_id = self.point_id(), error = %err, "audio playback failed");
                self.inner.borrow_mut().loaded = false;
                self.recover(true, PLAY_ERROR_MESSAGE)
            }
        }
    }

    pub fn pause(&self) {
        let mut inner = self.inner.borrow_mut();
        if !inner.mounted || !matches!(inner.state, PlayerState::Playing | PlayerState::Loading) {
            return;
        }
        inner.handle.pause();
        inner.state = PlayerState::Idle;
        let point_id = inner.point_id;
        inner.registry.unregister(point_id);
    }

    /// Play/pause button. Returns whether the player is playing afterwards.
    pub fn toggle(&self) -> bool {
        if self.state() == PlayerState::Playing {
            self.pause();
            false
        } else {
            self.play()
        }
    }

    /// Polls the handle for a natural end.
    pub fn tick(&self) -> Option<PlayerEvent> {
        let mut inner = self.inner.borrow_mut();
        if !inner.mounted || inner.state != PlayerState::Playing || !inner.handle.is_finished() {
            return None;
        }
        inner.state = PlayerState::Idle;
        let point_id = inner.point_id;
        inner.registry.unregister(point_id);
        Some(PlayerEvent::Ended)
    }

    /// Stops the audio and leaves the registry synchronously.
    pub fn teardown(&self) {
        let mut inner = self.inner.borrow_mut();
        if !inner.mounted {
            return;
        }
        inner.handle.stop();
        inner.mounted = false;
        inner.state = PlayerState::Idle;
        let point_id = inner.point_id;
        inner.registry.unregister(point_id);
    }

    pub fn set_volume(&self, volume: f32) {
        self.inner.borrow_mut().handle.set_volume(volume);
    }

    pub fn point_id(&self) -> PointId {
        self.inner.borrow().point_id
    }

    pub fn state(&self) -> PlayerState {
        self.inner.borrow().state
    }

    pub fn source_state(&self) -> SourceState {
        self.inner.borrow().source
    }

    pub fn error(&self) -> Option<&'static str> {
        self.inner.borrow().error
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.borrow().mounted
    }

    /// Loading, playing or errored: anything an autoplay must not trample.
    pub fn is_busy(&self) -> bool {
        self.state() != PlayerState::Idle
    }

    pub fn fallback_assignments(&self) -> u32 {
        self.inner.borrow().fallback_assignments
    }

    fn on_started(&self) {
        let weak = Rc::downgrade(&self.inner);
        let (registry, point_id, label) = {
            let mut inner = self.inner.borrow_mut();
            inner.state = PlayerState::Playing;
            inner.error = None;
            (inner.registry.clone(), inner.point_id, inner.current_label())
        };

        registry.register(point_id, label, move || {
            if let Some(inner) = weak.upgrade() {
                PointPlayer { inner }.pause();
            }
        });
    }

    /// Moves Primary -> Fallback once; a failed play after that is terminal.
    fn recover(&self, should_play: bool, message: &'static str) -> bool {
        let started = {
            let mut inner = self.inner.borrow_mut();
            if inner.source != SourceState::Primary {
                inner.fail(message);
                return false;
            }

            inner.source = SourceState::Fallback;
            inner.fallback_assignments += 1;
            inner.loaded = false;
            tracing::warn!(
                point_id = inner.point_id,
                media_ref = %inner.media_ref,
                "switching to built-in fallback tone"
            );

            if let Err(err) = inner.ensure_loaded() {
                tracing::warn!(point_id = inner.point_id, error = %err, "fallback tone failed to load");
                inner.fail(message);
                return false;
            }
            if !should_play {
                inner.state = PlayerState::Idle;
                return true;
            }

            inner.state = PlayerState::Loading;
            inner.handle.play()
        };

        match started {
            Ok(()) => {
                self.on_started();
                true
            }
            Err(err) => {
                let mut inner = self.inner.borrow_mut();
                tracing::warn!(point_id = inner.point_id, error = %err, "fallback tone failed to play");
                inner.fail(message);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::test_support::{ScriptedHandle, SharedScript};

    const PRIMARY: &str = "sounds/fontaine.wav";

    fn script() -> SharedScript {
        SharedScript::default()
    }

    fn mount(point_id: PointId, script: &SharedScript, registry: &PlaybackRegistry) -> PointPlayer {
        PointPlayer::mount(
            point_id,
            PRIMARY,
            None,
            Box::new(ScriptedHandle::new(Rc::clone(script))),
            registry.clone(),
        )
    }

    #[test]
    fn play_registers_and_pause_unregisters() {
        let script = script();
        let registry = PlaybackRegistry::new();
        let player = mount(1, &script, &registry);

        assert!(player.play());
        assert_eq!(player.state(), PlayerState::Playing);
        assert!(registry.is_registered(1));

        assert!(!player.toggle());
        assert_eq!(player.state(), PlayerState::Idle);
        assert!(!registry.is_registered(1));
    }

    #[test]
    fn resume_does_not_reload_primary() {
        let script = script();
        let registry = PlaybackRegistry::new();
        let player = mount(1, &script, &registry);

        player.play();
        player.pause();
        player.play();
        assert_eq!(script.borrow().loads, vec![PRIMARY.to_string()]);
    }

    #[test]
    fn load_error_assigns_fallback_without_playing() {
        let script = script();
        script.borrow_mut().failing_loads.insert(PRIMARY.to_string());
        let registry = PlaybackRegistry::new();
        let player = mount(1, &script, &registry);

        assert_eq!(player.source_state(), SourceState::Fallback);
        assert_eq!(player.state(), PlayerState::Idle);
        assert!(script.borrow().plays.is_empty());

        assert!(player.play());
        assert_eq!(
            script.borrow().plays,
            vec![FALLBACK_TONE_LABEL.to_string()]
        );
    }

    #[test]
    fn fallback_is_assigned_once_across_repeated_errors() {
        let script = script();
        let registry = PlaybackRegistry::new();
        let player = mount(1, &script, &registry);

        player.handle_media_error();
        player.handle_media_error();
        player.handle_media_error();

        assert_eq!(player.fallback_assignments(), 1);
        assert_eq!(player.state(), PlayerState::Idle);
        assert_eq!(player.source_state(), SourceState::Fallback);
        assert_eq!(player.error(), None);
        assert!(!player.is_busy());
        let fallback_loads = script
            .borrow()
            .loads
            .iter()
            .filter(|label| *label == FALLBACK_TONE_LABEL)
            .count();
        assert_eq!(fallback_loads, 1);
    }

    #[test]
    fn late_media_error_keeps_the_fallback_playing() {
        let script = script();
        script.borrow_mut().failing_loads.insert(PRIMARY.to_string());
        let registry = PlaybackRegistry::new();
        let player = mount(6, &script, &registry);
        assert!(player.play());

        player.handle_media_error();
        assert_eq!(player.state(), PlayerState::Playing);
        assert_eq!(player.source_state(), SourceState::Fallback);
        assert!(registry.is_registered(6));
        assert_eq!(player.fallback_assignments(), 1);
    }

    #[test]
    fn play_failure_retries_once_on_fallback() {
        let script = script();
        script.borrow_mut().failing_plays.insert(PRIMARY.to_string());
        let registry = PlaybackRegistry::new();
        let player = mount(4, &script, &registry);

        assert!(player.play());
        assert_eq!(player.source_state(), SourceState::Fallback);
        assert_eq!(player.state(), PlayerState::Playing);
        assert!(registry.is_registered(4));
    }

    #[test]
    fn failing_fallback_ends_errored_with_message() {
        let script = script();
        {
            let mut script = script.borrow_mut();
            script.failing_plays.insert(PRIMARY.to_string());
            script.failing_plays.insert(FALLBACK_TONE_LABEL.to_string());
        }
        let registry = PlaybackRegistry::new();
        let player = mount(2, &script, &registry);

        assert!(!player.play());
        assert_eq!(player.state(), PlayerState::Errored);
        assert_eq!(player.source_state(), SourceState::Failed);
        assert_eq!(player.error(), Some(PLAY_ERROR_MESSAGE));
        assert!(!registry.is_registered(2));
        assert!(player.is_busy());
    }

    #[test]
    fn manual_retry_uses_fallback_source() {
        let script = script();
        {
            let mut script = script.borrow_mut();
            script.failing_plays.insert(PRIMARY.to_string());
            script.failing_plays.insert(FALLBACK_TONE_LABEL.to_string());
        }
        let registry = PlaybackRegistry::new();
        let player = mount(2, &script, &registry);
        player.play();

        script
            .borrow_mut()
            .failing_plays
            .remove(FALLBACK_TONE_LABEL);
        script.borrow_mut().plays.clear();

        assert!(player.play());
        assert_eq!(player.error(), None);
        assert_eq!(
            script.borrow().plays,
            vec![FALLBACK_TONE_LABEL.to_string()]
        );
        assert_eq!(player.source_state(), SourceState::Failed);
        assert_eq!(player.fallback_assignments(), 1);
    }

    #[test]
    fn failing_fallback_load_reports_load_message() {
        let script = script();
        {
            let mut script = script.borrow_mut();
            script.failing_loads.insert(PRIMARY.to_string());
            script.failing_loads.insert(FALLBACK_TONE_LABEL.to_string());
        }
        let registry = PlaybackRegistry::new();
        let player = mount(3, &script, &registry);

        assert_eq!(player.state(), PlayerState::Errored);
        assert_eq!(player.error(), Some(LOAD_ERROR_MESSAGE));
    }

    #[test]
    fn natural_end_is_reported_once() {
        let script = script();
        let registry = PlaybackRegistry::new();
        let player = mount(1, &script, &registry);
        player.play();
        assert_eq!(player.tick(), None);

        script.borrow_mut().finished.insert(PRIMARY.to_string());
        assert_eq!(player.tick(), Some(PlayerEvent::Ended));
        assert_eq!(player.tick(), None);
        assert!(!registry.is_registered(1));
    }

    #[test]
    fn teardown_ignores_late_callbacks() {
        let script = script();
        let registry = PlaybackRegistry::new();
        let player = mount(1, &script, &registry);
        player.play();

        player.teardown();
        assert!(!registry.is_registered(1));
        assert!(!player.is_mounted());

        player.handle_media_error();
        assert!(!player.play());
        assert_eq!(player.fallback_assignments(), 0);
        assert_eq!(player.state(), PlayerState::Idle);
    }

    #[test]
    fn solo_stop_pauses_other_players() {
        let script = script();
        let registry = PlaybackRegistry::new();
        let a = mount(1, &script, &registry);
        let b = mount(2, &script, &registry);
        let c = mount(3, &script, &registry);
        for player in [&a, &b, &c] {
            player.play();
        }

        registry.solo_stop(1);
        assert_eq!(a.state(), PlayerState::Playing);
        assert_eq!(b.state(), PlayerState::Idle);
        assert_eq!(c.state(), PlayerState::Idle);
        assert_eq!(registry.playing_ids(), vec![1]);
        assert_eq!(script.borrow().pauses, 2);
    }
}
