use crate::engine::params::ParamChange;

/// What the input layer tells the engine.
#[derive(Clone, Debug, PartialEq)]
pub enum SynthEvent {
    NoteOn { key: String, frequency: f32 },
    NoteOff { key: String },
    ParamChange(ParamChange),
}

/// Anything that consumes synth events. The engine is the real one; a plain
/// `Vec` records events, which is handy for driving the input layer without
/// audio.
pub trait SynthSink {
    fn handle_event(&mut self, event: SynthEvent);
}

impl SynthSink for Vec<SynthEvent> {
    fn handle_event(&mut self, event: SynthEvent) {
        self.push(event);
    }
}
