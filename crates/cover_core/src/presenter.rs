//! Playback presenter contract.
//!
//! A presenter renders one media locator (waveform, play/pause, download)
//! and owns exactly one playback resource. This crate never decodes or
//! renders audio; it only hands presenters locators and forwards
//! lifecycle calls. `PresenterSlot` ties a presenter's lifetime to a view:
//! created on first load, destroyed exactly once on replacement or drop.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::status::MediaLocator;

/// Lifecycle notifications emitted by a presenter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenterEvent {
    Ready,
    Play,
    Pause,
    Finish,
}

/// Listener for presenter events.
pub type PresenterEventCallback = Box<dyn Fn(PresenterEvent) + Send + Sync>;

/// External playback component.
pub trait PlaybackPresenter: Send {
    /// Register the receiver of this presenter's events, replacing any
    /// earlier one. Events may be emitted from any thread.
    fn set_event_listener(&mut self, listener: PresenterEventCallback);

    /// Start loading `locator`. Emits `Ready` when playable.
    fn load(&mut self, locator: &MediaLocator);

    /// Toggle playback.
    fn play_pause(&mut self);

    /// Release the playback resource. Called exactly once per instance.
    fn destroy(&mut self);
}

/// Playback state as seen from presenter events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Finished,
}

impl PlaybackState {
    /// State after a load was requested.
    pub fn on_load(self) -> Self {
        PlaybackState::Loading
    }

    /// State after `event`. Events that make no sense in the current
    /// state are ignored.
    pub fn apply(self, event: PresenterEvent) -> Self {
        match (self, event) {
            (PlaybackState::Loading, PresenterEvent::Ready) => PlaybackState::Ready,
            (
                PlaybackState::Ready | PlaybackState::Paused | PlaybackState::Finished,
                PresenterEvent::Play,
            ) => PlaybackState::Playing,
            (PlaybackState::Playing, PresenterEvent::Pause) => PlaybackState::Paused,
            (PlaybackState::Playing, PresenterEvent::Finish) => PlaybackState::Finished,
            (state, _) => state,
        }
    }

    pub fn is_playing(&self) -> bool {
        *self == PlaybackState::Playing
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Loading => "loading",
            PlaybackState::Ready => "ready",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Finished => "finished",
        };
        f.write_str(label)
    }
}

type SharedListener = Arc<dyn Fn(PresenterEvent) + Send + Sync>;

/// Event state shared with the listener installed on the live presenter.
///
/// `generation` changes on every release, so a destroyed presenter that
/// still emits events no longer moves the slot's state.
#[derive(Default)]
struct EventHub {
    state: PlaybackState,
    generation: u64,
    listener: Option<SharedListener>,
}

/// Scoped owner of at most one presenter.
///
/// The presenter is created by `factory` on the first `load`. Replacing
/// it, releasing the slot or dropping the slot destroys the live
/// presenter exactly once. Presenter events drive `state()` and are
/// forwarded to the listener set with `on_event`.
pub struct PresenterSlot<P: PlaybackPresenter> {
    factory: Box<dyn FnMut() -> P + Send>,
    live: Option<P>,
    locator: Option<MediaLocator>,
    hub: Arc<Mutex<EventHub>>,
}

impl<P: PlaybackPresenter> PresenterSlot<P> {
    pub fn new(factory: impl FnMut() -> P + Send + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            live: None,
            locator: None,
            hub: Arc::new(Mutex::new(EventHub::default())),
        }
    }

    /// Forward presenter events to `listener`.
    pub fn on_event(&mut self, listener: impl Fn(PresenterEvent) + Send + Sync + 'static) {
        self.hub.lock().listener = Some(Arc::new(listener));
    }

    /// Playback state as reported by the live presenter's events.
    pub fn state(&self) -> PlaybackState {
        self.hub.lock().state
    }

    /// Load `locator`, creating the presenter if needed.
    ///
    /// Loading the locator that is already loaded is a no-op.
    pub fn load(&mut self, locator: &MediaLocator) {
        if self.live.is_some() && self.locator.as_ref() == Some(locator) {
            return;
        }
        if self.live.is_none() {
            let mut presenter = (self.factory)();
            presenter.set_event_listener(self.listener());
            self.live = Some(presenter);
        }
        {
            let mut hub = self.hub.lock();
            hub.state = hub.state.on_load();
        }
        if let Some(presenter) = self.live.as_mut() {
            presenter.load(locator);
        }
        self.locator = Some(locator.clone());
    }

    fn listener(&self) -> PresenterEventCallback {
        let hub = Arc::clone(&self.hub);
        let generation = hub.lock().generation;
        Box::new(move |event: PresenterEvent| {
            let forward = {
                let mut hub = hub.lock();
                if hub.generation != generation {
                    return;
                }
                hub.state = hub.state.apply(event);
                hub.listener.clone()
            };
            if let Some(forward) = forward {
                forward(event);
            }
        })
    }

    /// Destroy the current presenter and load `locator` into a fresh one.
    pub fn replace(&mut self, locator: &MediaLocator) {
        self.release();
        self.load(locator);
    }

    /// Toggle playback. Returns false when nothing is loaded.
    pub fn play_pause(&mut self) -> bool {
        match self.live.as_mut() {
            Some(presenter) => {
                presenter.play_pause();
                true
            }
            None => false,
        }
    }

    /// Destroy the live presenter, if any.
    pub fn release(&mut self) {
        if let Some(mut presenter) = self.live.take() {
            {
                let mut hub = self.hub.lock();
                hub.generation += 1;
                hub.state = PlaybackState::Idle;
            }
            presenter.destroy();
        }
        self.locator = None;
    }

    pub fn is_live(&self) -> bool {
        self.live.is_some()
    }

    pub fn locator(&self) -> Option<&MediaLocator> {
        self.locator.as_ref()
    }

    pub fn presenter(&self) -> Option<&P> {
        self.live.as_ref()
    }
}

impl<P: PlaybackPresenter> Drop for PresenterSlot<P> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    type Log = Arc<Mutex<Vec<String>>>;

    struct RecordingPresenter {
        id: usize,
        log: Log,
        listener: Option<PresenterEventCallback>,
        playing: bool,
    }

    impl RecordingPresenter {
        fn emit(&self, event: PresenterEvent) {
            if let Some(listener) = &self.listener {
                listener(event);
            }
        }
    }

    impl PlaybackPresenter for RecordingPresenter {
        fn set_event_listener(&mut self, listener: PresenterEventCallback) {
            self.listener = Some(listener);
        }

        fn load(&mut self, locator: &MediaLocator) {
            self.log.lock().push(format!("{}:load:{}", self.id, locator));
            self.playing = false;
            self.emit(PresenterEvent::Ready);
        }

        fn play_pause(&mut self) {
            self.log.lock().push(format!("{}:play_pause", self.id));
            self.playing = !self.playing;
            self.emit(if self.playing {
                PresenterEvent::Play
            } else {
                PresenterEvent::Pause
            });
        }

        fn destroy(&mut self) {
            self.log.lock().push(format!("{}:destroy", self.id));
        }
    }

    fn slot(log: &Log) -> PresenterSlot<RecordingPresenter> {
        let log = Arc::clone(log);
        let mut next_id = 0;
        PresenterSlot::new(move || {
            next_id += 1;
            RecordingPresenter {
                id: next_id,
                log: Arc::clone(&log),
                listener: None,
                playing: false,
            }
        })
    }

    #[test]
    fn presenter_is_created_on_first_load() {
        let log = Log::default();
        let mut slot = slot(&log);
        assert!(!slot.is_live());
        assert!(!slot.play_pause());

        slot.load(&"a.wav".into());
        assert!(slot.play_pause());
        assert_eq!(*log.lock(), vec!["1:load:a.wav", "1:play_pause"]);
    }

    #[test]
    fn replacing_destroys_old_presenter_once() {
        let log = Log::default();
        {
            let mut slot = slot(&log);
            slot.load(&"a.wav".into());
            slot.replace(&"b.wav".into());
            assert_eq!(slot.locator().map(|l| l.as_str()), Some("b.wav"));
        }

        assert_eq!(
            *log.lock(),
            vec!["1:load:a.wav", "1:destroy", "2:load:b.wav", "2:destroy"]
        );
    }

    #[test]
    fn release_then_drop_destroys_once() {
        let log = Log::default();
        {
            let mut slot = slot(&log);
            slot.load(&"a.wav".into());
            slot.release();
            slot.release();
        }
        let destroys = log.lock().iter().filter(|l| l.ends_with("destroy")).count();
        assert_eq!(destroys, 1);
    }

    #[test]
    fn reloading_same_locator_is_noop() {
        let log = Log::default();
        let mut slot = slot(&log);
        slot.load(&"a.wav".into());
        slot.load(&"a.wav".into());
        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn presenter_events_reach_the_slot_listener() {
        let log = Log::default();
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut slot = slot(&log);
        let sink = Arc::clone(&events);
        slot.on_event(move |event| sink.lock().push(event));

        slot.load(&"a.wav".into());
        assert_eq!(slot.state(), PlaybackState::Ready);
        slot.play_pause();
        assert!(slot.state().is_playing());
        slot.play_pause();
        assert_eq!(slot.state(), PlaybackState::Paused);

        assert_eq!(
            *events.lock(),
            vec![PresenterEvent::Ready, PresenterEvent::Play, PresenterEvent::Pause]
        );
    }

    #[test]
    fn events_from_a_replaced_presenter_are_ignored() {
        let log = Log::default();
        let mut slot = slot(&log);
        slot.load(&"a.wav".into());
        let stale = slot.listener();
        slot.release();
        assert_eq!(slot.state(), PlaybackState::Idle);

        stale(PresenterEvent::Play);
        assert_eq!(slot.state(), PlaybackState::Idle);

        slot.load(&"b.wav".into());
        assert_eq!(slot.state(), PlaybackState::Ready);
    }

    #[test]
    fn playback_state_follows_events() {
        let state = PlaybackState::default().on_load();
        assert_eq!(state, PlaybackState::Loading);
        let state = state.apply(PresenterEvent::Play);
        assert_eq!(state, PlaybackState::Loading);
        let state = state.apply(PresenterEvent::Ready).apply(PresenterEvent::Play);
        assert!(state.is_playing());
        let state = state.apply(PresenterEvent::Pause);
        assert_eq!(state, PlaybackState::Paused);
        let state = state
            .apply(PresenterEvent::Play)
            .apply(PresenterEvent::Finish);
        assert_eq!(state, PlaybackState::Finished);
    }
}
