//! The voice engine: turns note and parameter events into audio graph
//! changes.

pub mod builder;
pub mod crazy;
pub mod envelope;
pub mod output;
pub mod params;
pub mod registry;
pub mod voice;

use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::context::{AudioContext, ContextState};
use crate::graph::{AudioGraph, GraphError};
use crate::keyboard::{virtual_key, Keyboard};
use crate::synth::{SynthEvent, SynthSink};
use crate::util::log_if_error;

use crazy::{RandomTrigger, CRAZY_NOTE_LENGTH};
use envelope::Teardown;
use output::OutputChain;
use params::{NoteRequest, ParamChange, Parameters, Waveform};
use registry::VoiceRegistry;
use voice::Voice;

pub struct Engine {
    context: AudioContext,
    output: OutputChain,
    params: Parameters,
    voices: VoiceRegistry,
    teardown: Teardown,
    trigger: RandomTrigger,
}

impl Engine {
    /// Take ownership of a context and wire up the shared output chain.
    /// The keyboard provides the pool of notes for crazy mode.
    pub fn new(
        context: AudioContext,
        keyboard: &Keyboard,
        master_volume: f32,
    ) -> Result<Self, GraphError> {
        Self::with_trigger(context, RandomTrigger::new(keyboard), master_volume)
    }

    pub fn with_trigger(
        context: AudioContext,
        trigger: RandomTrigger,
        master_volume: f32,
    ) -> Result<Self, GraphError> {
        let output = OutputChain::build(&mut context.graph(), master_volume)?;

        Ok(Self {
            context,
            output,
            params: Parameters::default(),
            voices: VoiceRegistry::default(),
            teardown: Teardown::default(),
            trigger,
        })
    }

    pub fn context(&self) -> &AudioContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut AudioContext {
        &mut self.context
    }

    /// Lock the graph, for inspection.
    pub fn graph(&self) -> std::sync::MutexGuard<'_, AudioGraph> {
        self.context.graph()
    }

    pub fn output(&self) -> &OutputChain {
        &self.output
    }

    pub fn parameters(&self) -> &Parameters {
        &self.params
    }

    pub fn voice(&self, key: &str) -> Option<&Voice> {
        self.voices.get(key)
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.voices.contains(key)
    }

    pub fn num_voices(&self) -> usize {
        self.voices.len()
    }

    pub fn active_keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.voices.keys()
    }

    /// Voices released but still fading out.
    pub fn num_releasing(&self) -> usize {
        self.teardown.len()
    }

    /// When a randomly triggered note is due for release.
    pub fn scheduled_release(&self, key: &str) -> Option<Instant> {
        self.trigger.release_time(key)
    }

    fn resume_context(&mut self) {
        if self.context.state() == ContextState::Suspended {
            log_if_error("failed to resume audio context", self.context.resume());
        }
    }

    /// A key went down. Resumes the context if needed, then plays the note,
    /// or a random one in crazy mode.
    pub fn note_on(&mut self, key: &str, frequency: f32) {
        self.note_on_at(key, frequency, Instant::now());
    }

    /// [`Engine::note_on`] with an explicit wall clock time, which only
    /// matters for the automatic release of crazy mode notes.
    pub fn note_on_at(&mut self, key: &str, frequency: f32, now: Instant) {
        self.resume_context();

        if self.params.crazy {
            self.trigger_random(now);
            return;
        }

        if self.voices.contains(key) {
            debug!(key, "note already playing");
            return;
        }
        let request = NoteRequest::new(frequency, &self.params);
        self.play_note(key, &request);
    }

    fn trigger_random(&mut self, now: Instant) {
        let note = match self.trigger.choose() {
            Some(note) => note,
            None => {
                debug!("no white keys to choose from");
                return;
            }
        };

        let key = virtual_key(&note.note);
        if self.voices.contains(&key) {
            debug!(key = key.as_str(), "random note already playing");
            return;
        }

        let request = NoteRequest::new(note.frequency, &self.params);
        if self.play_note(&key, &request) {
            self.trigger.schedule_release(key, now + CRAZY_NOTE_LENGTH);
        }
    }

    /// Build and register a voice for `key` from an explicit request.
    /// Returns whether a voice was started; an active key is left alone.
    pub fn play_note(&mut self, key: &str, request: &NoteRequest) -> bool {
        if self.voices.contains(key) {
            return false;
        }
        if !request.is_finite() {
            warn!(key, ?request, "ignoring note with non-finite frequency");
            return false;
        }

        let built = {
            let mut graph = self.context.graph();
            builder::build_voice(key, request, &self.params, &mut graph, &self.output)
        };

        match built {
            Ok(voice) => {
                debug!(
                    key,
                    frequency = request.frequency,
                    partials = voice.partials().len(),
                    "note on"
                );
                self.register(voice)
            }
            Err(err) => {
                error!(key, "could not build voice: {}", err);
                false
            }
        }
    }

    fn register(&mut self, voice: Voice) -> bool {
        match self.voices.insert(voice) {
            Ok(()) => true,
            Err(voice) => {
                error!(key = voice.key(), "voice already registered, dropping the new one");
                let mut graph = self.context.graph();
                for id in voice.nodes() {
                    graph.remove_node(id);
                }
                false
            }
        }
    }

    /// A key went up. The voice fades out and its key is free again as soon
    /// as this returns; its nodes go away on a later [`Engine::tick`].
    pub fn note_off(&mut self, key: &str) {
        let voice = match self.voices.remove(key) {
            Some(voice) => voice,
            None => return,
        };

        let stop_at = envelope::release_voice(&voice, &mut self.context.graph());
        debug!(key, stop_at, "note off");
        self.teardown.push(voice, stop_at);
    }

    /// Housekeeping to call regularly from the event loop.
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// Release random notes that are due at `now` and reclaim the nodes of
    /// voices that finished fading out.
    ///
    /// Context time stands still unless the context runs, so released voices
    /// are dropped right away when it does not.
    pub fn tick_at(&mut self, now: Instant) {
        for key in self.trigger.take_due(now) {
            self.note_off(&key);
        }

        let mut graph = self.context.graph();
        if self.context.state() != ContextState::Running {
            if !self.teardown.is_empty() {
                debug!(
                    voices = self.teardown.len(),
                    "context not running, dropping released voices"
                );
                self.teardown.clear(&mut graph);
            }
            return;
        }

        let reclaimed = self.teardown.reclaim(&mut graph);
        if reclaimed > 0 {
            debug!(reclaimed, "voices reclaimed");
        }
    }

    fn update(&mut self, change: ParamChange) {
        self.params.apply(change);

        let mut graph = self.context.graph();
        let now = graph.current_time();
        for voice in self.voices.iter() {
            voice.apply_parameters(&self.params, &mut graph, now);
        }
    }

    pub fn set_parameter(&mut self, change: ParamChange) {
        if !change.is_finite() {
            warn!(?change, "ignoring non-finite parameter value");
            return;
        }
        debug!(?change, "parameter change");
        self.update(change);
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.set_parameter(ParamChange::Waveform(waveform));
    }

    pub fn set_pulse_width(&mut self, pulse_width: f32) {
        self.set_parameter(ParamChange::PulseWidth(pulse_width));
    }

    pub fn set_additive(&mut self, on: bool) {
        self.set_parameter(ParamChange::Additive(on));
    }

    pub fn set_num_partials(&mut self, partials: u32) {
        self.set_parameter(ParamChange::NumPartials(partials));
    }

    pub fn set_partial_spacing(&mut self, hz: f32) {
        self.set_parameter(ParamChange::PartialSpacing(hz));
    }

    pub fn set_am(&mut self, on: bool) {
        self.set_parameter(ParamChange::Am(on));
    }

    pub fn set_am_frequency(&mut self, hz: f32) {
        self.set_parameter(ParamChange::AmFrequency(hz));
    }

    pub fn set_fm(&mut self, on: bool) {
        self.set_parameter(ParamChange::Fm(on));
    }

    pub fn set_fm_frequency(&mut self, hz: f32) {
        self.set_parameter(ParamChange::FmFrequency(hz));
    }

    pub fn set_distorted_fm_intensity(&mut self, intensity: f32) {
        self.set_parameter(ParamChange::DistortedFmIntensity(intensity));
    }

    pub fn set_lfo(&mut self, on: bool) {
        self.set_parameter(ParamChange::Lfo(on));
    }

    pub fn set_lfo_frequency(&mut self, hz: f32) {
        self.set_parameter(ParamChange::LfoFrequency(hz));
    }

    pub fn set_crazy(&mut self, on: bool) {
        self.set_parameter(ParamChange::Crazy(on));
    }

    /// Drop every voice and close the audio context.
    pub fn shutdown(mut self) {
        {
            let mut graph = self.context.graph();
            for voice in self.voices.drain() {
                for id in voice.nodes() {
                    graph.remove_node(id);
                }
            }
            self.teardown.clear(&mut graph);
        }
        self.trigger.clear();
        self.context.close();
        info!("engine shut down");
    }
}

impl SynthSink for Engine {
    fn handle_event(&mut self, event: SynthEvent) {
        match event {
            SynthEvent::NoteOn { key, frequency } => self.note_on(&key, frequency),
            SynthEvent::NoteOff { key } => self.note_off(&key),
            SynthEvent::ParamChange(change) => self.set_parameter(change),
        }
    }
}
