use crate::graph::{pulse_curve, AudioGraph, NodeId, ParamKind};

use super::params::{Parameters, Waveform};

/// Depth of the amplitude modulation and of the LFO, added to the main
/// gain's level.
pub const AM_DEPTH: f32 = 0.5;
pub const LFO_DEPTH: f32 = 0.5;
/// Frequency deviation in Hz of the FM modulator.
pub const FM_INDEX: f32 = 100.0;
/// Level of the distorted FM signal at full intensity.
pub const DISTORTED_FM_SCALE: f32 = 100.0;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Partial {
    pub oscillator: NodeId,
    /// Present when the voice was started with the pulse waveform.
    pub shaper: Option<NodeId>,
}

/// An auxiliary oscillator and the gain that scales it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Modulator {
    pub oscillator: NodeId,
    pub gain: NodeId,
}

/// The nodes of one sounding note. The voice owns them: nothing else keeps
/// their ids, and they leave the graph only through the teardown path.
#[derive(Clone, Debug)]
pub struct Voice {
    pub(crate) key: String,
    pub(crate) frequency: f32,
    pub(crate) partials: Vec<Partial>,
    pub(crate) main_gain: NodeId,
    pub(crate) am: Option<Modulator>,
    pub(crate) fm: Option<Modulator>,
    pub(crate) distorted_fm: Option<Modulator>,
    pub(crate) lfo: Option<Modulator>,
}

impl Voice {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn partials(&self) -> &[Partial] {
        &self.partials
    }

    pub fn main_gain(&self) -> NodeId {
        self.main_gain
    }

    pub fn am(&self) -> Option<Modulator> {
        self.am
    }

    pub fn fm(&self) -> Option<Modulator> {
        self.fm
    }

    pub fn distorted_fm(&self) -> Option<Modulator> {
        self.distorted_fm
    }

    pub fn lfo(&self) -> Option<Modulator> {
        self.lfo
    }

    pub fn modulators(&self) -> impl Iterator<Item = Modulator> {
        [self.am, self.fm, self.distorted_fm, self.lfo]
            .into_iter()
            .flatten()
    }

    /// Partial oscillators first, then modulator oscillators.
    pub fn oscillators(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.partials
            .iter()
            .map(|p| p.oscillator)
            .chain(self.modulators().map(|m| m.oscillator))
    }

    /// The main gain followed by every modulator gain.
    pub fn gains(&self) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::once(self.main_gain).chain(self.modulators().map(|m| m.gain))
    }

    /// Every node the voice owns.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.oscillators()
            .chain(self.partials.iter().filter_map(|p| p.shaper))
            .chain(self.gains())
    }

    /// Push the current parameters into the running nodes. Oscillators keep
    /// playing; only their type, curves, modulator frequencies and the
    /// distorted FM level change.
    pub fn apply_parameters(&self, params: &Parameters, graph: &mut AudioGraph, now: f64) {
        for partial in &self.partials {
            if params.waveform != Waveform::Pulse {
                if let Some(osc) = graph.oscillator_mut(partial.oscillator) {
                    osc.set_kind(params.waveform.oscillator_type());
                }
            } else if let Some(shaper) = partial.shaper.and_then(|id| graph.wave_shaper_mut(id)) {
                shaper.set_curve(pulse_curve(params.pulse_width));
            }
        }

        let retune = [
            (self.am, params.am_frequency),
            (self.fm, params.fm_frequency),
            (self.lfo, params.lfo_frequency),
        ];
        for (modulator, frequency) in retune {
            if let Some(m) = modulator {
                if let Some(p) = graph.param_mut(m.oscillator, ParamKind::Frequency) {
                    p.set_value_at_time(frequency, now);
                    p.discard_before(now);
                }
            }
        }

        if let Some(m) = self.distorted_fm {
            if let Some(p) = graph.param_mut(m.gain, ParamKind::Gain) {
                p.set_value_at_time(DISTORTED_FM_SCALE * params.distorted_fm_intensity, now);
                p.discard_before(now);
            }
        }
    }
}
