use tracing::{debug, trace, warn};

use crate::graph::{AudioGraph, GraphError, ParamKind};

use super::voice::Voice;

/// Length of the release fade, in seconds.
pub const FADE_OUT: f64 = 0.3;
/// Exponential ramps cannot reach zero; this is close enough to silence.
pub const FADE_FLOOR: f32 = 0.0001;

/// Fade every gain of the voice out and schedule all of its oscillators to
/// stop when the fade ends. Returns that stop time.
///
/// Ramps still running (a fade-in that has not finished, for instance) are
/// cancelled first and the fade starts from wherever they were.
pub fn release_voice(voice: &Voice, graph: &mut AudioGraph) -> f64 {
    let now = graph.current_time();
    let stop_at = now + FADE_OUT;

    for gain in voice.gains() {
        if let Some(param) = graph.param_mut(gain, ParamKind::Gain) {
            param.cancel_and_hold(now);
            param.exponential_ramp_to_value_at_time(FADE_FLOOR, stop_at);
        }
    }

    for osc in voice.oscillators() {
        match graph.stop(osc, stop_at) {
            Ok(()) => {}
            Err(GraphError::AlreadyStopped) => trace!(key = voice.key(), "oscillator already stopped"),
            Err(err) => warn!(key = voice.key(), "could not stop oscillator: {}", err),
        }
    }

    stop_at
}

/// Released voices whose nodes are still fading out. Once the graph has
/// rendered past a voice's stop time its nodes are disconnected and
/// removed.
#[derive(Debug, Default)]
pub struct Teardown {
    pending: Vec<(Voice, f64)>,
}

impl Teardown {
    pub fn push(&mut self, voice: Voice, stop_at: f64) {
        self.pending.push((voice, stop_at));
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Remove the nodes of every voice that has finished. Returns how many
    /// voices were reclaimed.
    pub fn reclaim(&mut self, graph: &mut AudioGraph) -> usize {
        let now = graph.current_time();
        let before = self.pending.len();

        self.pending.retain(|(voice, stop_at)| {
            if now < *stop_at {
                return true;
            }

            for id in voice.nodes() {
                graph.disconnect(id);
                graph.remove_node(id);
            }
            debug!(key = voice.key(), "reclaimed voice nodes");
            false
        });

        before - self.pending.len()
    }

    /// Drop every pending voice right away.
    pub fn clear(&mut self, graph: &mut AudioGraph) {
        for (voice, _) in self.pending.drain(..) {
            for id in voice.nodes() {
                graph.remove_node(id);
            }
        }
    }
}
