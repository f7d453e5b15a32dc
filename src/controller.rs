use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::engine::params::{ParamChange, Parameters, Waveform};
use crate::keyboard::{physical_key, Keyboard};
use crate::synth::{SynthEvent, SynthSink};

/// Without release events a note is held this long after its last press.
/// Long enough to bridge the delay before keyboard autorepeat kicks in.
pub const TAP_HOLD: Duration = Duration::from_millis(600);

const PULSE_WIDTH_STEP: f32 = 0.05;
const INTENSITY_STEP: f32 = 0.1;


/// Translates terminal key events into synth events.
///
/// Note keys are looked up in the keyboard layout by key code. Function and
/// punctuation keys change parameters; the controller keeps its own copy of
/// the parameters so relative changes (one step wider, one partial more)
/// can be sent as absolute values.
#[derive(Clone, Debug)]
pub struct KeyboardController {
    keyboard: Keyboard,
    params: Parameters,
    reports_releases: bool,
    pressed: HashSet<u32>,
    held_until: HashMap<u32, Instant>,
}

impl KeyboardController {
    /// `reports_releases` says whether the terminal sends key release
    /// events. Without them notes are released on a timer, see [`TAP_HOLD`].
    pub fn new(keyboard: Keyboard, params: Parameters, reports_releases: bool) -> Self {
        Self {
            keyboard,
            params,
            reports_releases,
            pressed: HashSet::new(),
            held_until: HashMap::new(),
        }
    }

    pub fn parameters(&self) -> &Parameters {
        &self.params
    }

    fn key_code(code: KeyCode) -> Option<u32> {
        match code {
            KeyCode::Char(c) if c.is_ascii_alphanumeric() => Some(c.to_ascii_uppercase() as u32),
            _ => None,
        }
    }

    fn key_on(&mut self, key_code: u32, now: Instant, sink: &mut impl SynthSink) {
        let frequency = match self.keyboard.by_key_code(key_code) {
            Some(def) => def.frequency,
            None => return,
        };

        let already_pressed = if self.reports_releases {
            !self.pressed.insert(key_code)
        } else {
            self.held_until.insert(key_code, now + TAP_HOLD).is_some()
        };

        if !already_pressed {
            sink.handle_event(SynthEvent::NoteOn {
                key: physical_key(key_code),
                frequency,
            });
        }
    }

    fn key_repeat(&mut self, key_code: u32, now: Instant) {
        if let Some(until) = self.held_until.get_mut(&key_code) {
            *until = now + TAP_HOLD;
        }
    }

    fn key_off(&mut self, key_code: u32, sink: &mut impl SynthSink) {
        if self.pressed.remove(&key_code) {
            sink.handle_event(SynthEvent::NoteOff {
                key: physical_key(key_code),
            });
        }
    }

    fn change(&mut self, change: ParamChange, sink: &mut impl SynthSink) {
        self.params.apply(change);
        sink.handle_event(SynthEvent::ParamChange(change));
    }

    fn control_key(&mut self, code: KeyCode, sink: &mut impl SynthSink) {
        let p = &self.params;
        let change = match code {
            KeyCode::F(1) => ParamChange::Waveform(Waveform::Sine),
            KeyCode::F(2) => ParamChange::Waveform(Waveform::Square),
            KeyCode::F(3) => ParamChange::Waveform(Waveform::Sawtooth),
            KeyCode::F(4) => ParamChange::Waveform(Waveform::Triangle),
            KeyCode::F(5) => ParamChange::Waveform(Waveform::Pulse),
            KeyCode::F(6) => ParamChange::Additive(!p.additive),
            KeyCode::F(7) => ParamChange::Am(!p.am),
            KeyCode::F(8) => ParamChange::Fm(!p.fm),
            KeyCode::F(9) => ParamChange::Lfo(!p.lfo),
            KeyCode::F(10) => ParamChange::Crazy(!p.crazy),
            KeyCode::Char('[') => ParamChange::PulseWidth(p.pulse_width - PULSE_WIDTH_STEP),
            KeyCode::Char(']') => ParamChange::PulseWidth(p.pulse_width + PULSE_WIDTH_STEP),
            KeyCode::Char(',') => {
                ParamChange::DistortedFmIntensity(p.distorted_fm_intensity - INTENSITY_STEP)
            }
            KeyCode::Char('.') => {
                ParamChange::DistortedFmIntensity(p.distorted_fm_intensity + INTENSITY_STEP)
            }
            KeyCode::Char('-') => ParamChange::NumPartials(p.num_partials.saturating_sub(1)),
            KeyCode::Char('=') => ParamChange::NumPartials(p.num_partials + 1),
            _ => return,
        };
        self.change(change, sink);
    }

    /// Handle one key event. Breaks when the user asked to quit.
    pub fn handle_key_event(
        &mut self,
        event: KeyEvent,
        now: Instant,
        sink: &mut impl SynthSink,
    ) -> ControlFlow<()> {
        let quit = event.code == KeyCode::Esc
            || (event.code == KeyCode::Char('c') && event.modifiers.contains(KeyModifiers::CONTROL));
        if quit && event.kind == KeyEventKind::Press {
            return ControlFlow::Break(());
        }

        match (Self::key_code(event.code), event.kind) {
            (Some(code), KeyEventKind::Press) => self.key_on(code, now, sink),
            (Some(code), KeyEventKind::Repeat) => self.key_repeat(code, now),
            (Some(code), KeyEventKind::Release) => self.key_off(code, sink),
            (None, KeyEventKind::Press) => self.control_key(event.code, sink),
            (None, _) => {}
        }

        ControlFlow::Continue(())
    }

    /// Release held notes whose hold time ran out. Only does anything when
    /// the terminal does not report releases.
    pub fn tick(&mut self, now: Instant, sink: &mut impl SynthSink) {
        let mut expired: Vec<u32> = self
            .held_until
            .iter()
            .filter(|(_, &until)| until <= now)
            .map(|(&code, _)| code)
            .collect();
        expired.sort_unstable();

        for code in expired {
            self.held_until.remove(&code);
            sink.handle_event(SynthEvent::NoteOff {
                key: physical_key(code),
            });
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn press(c: char) -> KeyEvent {
        KeyEvent::new_with_kind(KeyCode::Char(c), KeyModifiers::NONE, KeyEventKind::Press)
    }

    fn release(c: char) -> KeyEvent {
        KeyEvent::new_with_kind(KeyCode::Char(c), KeyModifiers::NONE, KeyEventKind::Release)
    }

    fn function(n: u8) -> KeyEvent {
        KeyEvent::new_with_kind(KeyCode::F(n), KeyModifiers::NONE, KeyEventKind::Press)
    }

    fn controller(reports_releases: bool) -> KeyboardController {
        KeyboardController::new(Keyboard::default(), Parameters::default(), reports_releases)
    }

    #[test]
    fn press_and_release() {
        let mut ctrl = controller(true);
        let mut events = Vec::new();
        let now = Instant::now();

        ctrl.handle_key_event(press('z'), now, &mut events);
        ctrl.handle_key_event(press('z'), now, &mut events);
        ctrl.handle_key_event(release('z'), now, &mut events);
        ctrl.handle_key_event(release('z'), now, &mut events);

        assert_eq!(
            events,
            vec![
                SynthEvent::NoteOn {
                    key: "90".to_string(),
                    frequency: 261.63
                },
                SynthEvent::NoteOff {
                    key: "90".to_string()
                },
            ]
        );
    }

    #[test]
    fn unmapped_keys_are_ignored() {
        let mut ctrl = controller(true);
        let mut events = Vec::new();
        ctrl.handle_key_event(press('a'), Instant::now(), &mut events);
        ctrl.handle_key_event(press('!'), Instant::now(), &mut events);
        assert!(events.is_empty());
    }

    #[test]
    fn tap_mode_releases_on_timer() {
        let mut ctrl = controller(false);
        let mut events = Vec::new();
        let t0 = Instant::now();

        ctrl.handle_key_event(press('2'), t0, &mut events);
        // Autorepeat extends the hold.
        ctrl.handle_key_event(press('2'), t0 + Duration::from_millis(500), &mut events);
        assert_eq!(events.len(), 1);

        ctrl.tick(t0 + TAP_HOLD, &mut events);
        assert_eq!(events.len(), 1);

        ctrl.tick(t0 + Duration::from_millis(500) + TAP_HOLD, &mut events);
        assert_eq!(
            events[1],
            SynthEvent::NoteOff {
                key: "50".to_string()
            }
        );
    }

    #[test]
    fn control_keys_send_absolute_changes() {
        let mut ctrl = controller(true);
        let mut events = Vec::new();
        let now = Instant::now();

        ctrl.handle_key_event(function(5), now, &mut events);
        ctrl.handle_key_event(function(8), now, &mut events);
        ctrl.handle_key_event(function(8), now, &mut events);
        ctrl.handle_key_event(press(']'), now, &mut events);

        assert_eq!(
            events,
            vec![
                SynthEvent::ParamChange(ParamChange::Waveform(Waveform::Pulse)),
                SynthEvent::ParamChange(ParamChange::Fm(true)),
                SynthEvent::ParamChange(ParamChange::Fm(false)),
                SynthEvent::ParamChange(ParamChange::PulseWidth(0.55)),
            ]
        );
        assert_eq!(ctrl.parameters().waveform, Waveform::Pulse);
    }

    #[test]
    fn escape_quits() {
        let mut ctrl = controller(true);
        let mut events = Vec::new();
        let esc = KeyEvent::new_with_kind(KeyCode::Esc, KeyModifiers::NONE, KeyEventKind::Press);
        assert_eq!(
            ctrl.handle_key_event(esc, Instant::now(), &mut events),
            ControlFlow::Break(())
        );
    }
}
