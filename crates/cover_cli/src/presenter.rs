//! Terminal stand-in for the playback presenter.
//!
//! Prints each track's locator and its playback state. Audio decoding and
//! waveform rendering stay with a real player.

use cover_core::presenter::{
    PlaybackPresenter, PlaybackState, PresenterEvent, PresenterEventCallback, PresenterSlot,
};
use cover_core::status::MediaLocator;

type Output = Box<dyn FnMut(&str) + Send>;

pub struct TerminalPresenter {
    label: String,
    state: PlaybackState,
    out: Output,
    listener: Option<PresenterEventCallback>,
}

impl TerminalPresenter {
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_output(label, Box::new(|line| println!("{}", line)))
    }

    pub fn with_output(label: impl Into<String>, out: Output) -> Self {
        Self {
            label: label.into(),
            state: PlaybackState::default(),
            out,
            listener: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    fn emit(&mut self, event: PresenterEvent) {
        self.state = self.state.apply(event);
        if let Some(listener) = &self.listener {
            listener(event);
        }
    }
}

impl PlaybackPresenter for TerminalPresenter {
    fn set_event_listener(&mut self, listener: PresenterEventCallback) {
        self.listener = Some(listener);
    }

    fn load(&mut self, locator: &MediaLocator) {
        self.state = self.state.on_load();
        (self.out)(&format!("{:<14} {}", format!("{}:", self.label), locator));
        self.emit(PresenterEvent::Ready);
    }

    fn play_pause(&mut self) {
        let event = if self.state.is_playing() {
            PresenterEvent::Pause
        } else {
            PresenterEvent::Play
        };
        self.emit(event);
        let line = format!("{} [{}]", self.label, self.state);
        (self.out)(&line);
    }

    fn destroy(&mut self) {
        tracing::debug!("Released presenter for {}", self.label);
        self.state = PlaybackState::Idle;
    }
}

/// Print one line per track, each through its own presenter.
pub fn show_tracks<'a>(tracks: impl IntoIterator<Item = (&'a str, &'a MediaLocator)>) {
    for (label, locator) in tracks {
        let label = label.to_string();
        let mut slot = PresenterSlot::new({
            let label = label.clone();
            move || TerminalPresenter::new(label.clone())
        });
        slot.on_event(move |event| tracing::debug!("{}: {:?}", label, event));
        slot.load(locator);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording(label: &str) -> (TerminalPresenter, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        let presenter = TerminalPresenter::with_output(
            label,
            Box::new(move |line| sink.lock().unwrap().push(line.to_string())),
        );
        (presenter, lines)
    }

    #[test]
    fn load_prints_locator_and_becomes_ready() {
        let (mut presenter, lines) = recording("vocal");
        presenter.load(&"https://host/v.wav".into());

        assert_eq!(presenter.state(), PlaybackState::Ready);
        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("vocal:"));
        assert!(lines[0].ends_with("https://host/v.wav"));
    }

    #[test]
    fn play_pause_toggles() {
        let (mut presenter, lines) = recording("combined");
        presenter.load(&"c.wav".into());
        presenter.play_pause();
        assert!(presenter.state().is_playing());
        presenter.play_pause();
        assert_eq!(presenter.state(), PlaybackState::Paused);
        assert_eq!(lines.lock().unwrap().last().map(String::as_str), Some("combined [paused]"));
    }

    #[test]
    fn events_drive_the_slot_state() {
        let (presenter, _lines) = recording("vocal");
        let mut presenter = Some(presenter);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut slot = PresenterSlot::new(move || {
            presenter
                .take()
                .unwrap_or_else(|| TerminalPresenter::with_output("spare", Box::new(|_| {})))
        });
        slot.on_event(move |event| sink.lock().unwrap().push(event));

        slot.load(&"v.wav".into());
        slot.play_pause();
        slot.play_pause();

        assert_eq!(slot.state(), PlaybackState::Paused);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![PresenterEvent::Ready, PresenterEvent::Play, PresenterEvent::Pause]
        );
    }

    #[test]
    fn slot_destroys_presenter_on_drop() {
        let (presenter, _lines) = recording("instrumental");
        let mut presenter = Some(presenter);
        let mut slot = PresenterSlot::new(move || {
            presenter
                .take()
                .unwrap_or_else(|| TerminalPresenter::with_output("spare", Box::new(|_| {})))
        });
        slot.load(&"i.wav".into());
        assert_eq!(slot.presenter().map(|p| p.state()), Some(PlaybackState::Ready));
        slot.release();
        assert!(!slot.is_live());
    }
}
