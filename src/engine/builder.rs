use crate::graph::{pulse_curve, AudioGraph, GraphError, NodeId, OscillatorType, ParamKind};

use super::output::OutputChain;
use super::params::{NoteRequest, Parameters, Waveform};
use super::voice::{Modulator, Partial, Voice, AM_DEPTH, DISTORTED_FM_SCALE, FM_INDEX, LFO_DEPTH};

/// Length of the linear fade-in of the main gain, in seconds.
pub const FADE_IN: f64 = 0.1;

/// Keeps track of what was added so a failed build leaves no nodes behind.
struct Allocation<'a> {
    graph: &'a mut AudioGraph,
    created: Vec<NodeId>,
}

impl<'a> Allocation<'a> {
    fn track(&mut self, id: NodeId) -> NodeId {
        self.created.push(id);
        id
    }

    fn oscillator(&mut self, kind: OscillatorType, frequency: f32) -> NodeId {
        let id = self.graph.add_oscillator(kind, frequency);
        self.track(id)
    }

    fn gain(&mut self, gain: f32) -> NodeId {
        let id = self.graph.add_gain(gain);
        self.track(id)
    }

    fn wave_shaper(&mut self, curve: Vec<f32>) -> NodeId {
        let id = self.graph.add_wave_shaper(curve);
        self.track(id)
    }

    /// A sine modulator feeding a gain of the given level, already started.
    fn modulator(&mut self, frequency: f32, level: f32, now: f64) -> Result<Modulator, GraphError> {
        let oscillator = self.oscillator(OscillatorType::Sine, frequency);
        let gain = self.gain(level);
        self.graph.connect(oscillator, gain)?;
        self.graph.start(oscillator, now)?;
        Ok(Modulator { oscillator, gain })
    }

    fn rollback(self) {
        for id in self.created {
            self.graph.remove_node(id);
        }
    }
}

/// Build the nodes of a new voice and start them at the current context
/// time.
///
/// Partials sum into one main gain that fades in and feeds the output chain.
/// AM and LFO add to the main gain's level, FM deviates the frequency of
/// every partial. The distorted FM modulator is a separate audible signal
/// wired straight to the destination.
pub fn build_voice(
    key: &str,
    request: &NoteRequest,
    params: &Parameters,
    graph: &mut AudioGraph,
    output: &OutputChain,
) -> Result<Voice, GraphError> {
    let mut alloc = Allocation {
        graph,
        created: Vec::new(),
    };

    match build(key, request, params, &mut alloc, output) {
        Ok(voice) => Ok(voice),
        Err(err) => {
            alloc.rollback();
            Err(err)
        }
    }
}

fn build(
    key: &str,
    request: &NoteRequest,
    params: &Parameters,
    alloc: &mut Allocation<'_>,
    output: &OutputChain,
) -> Result<Voice, GraphError> {
    let now = alloc.graph.current_time();

    let mut partials = Vec::with_capacity(request.partials as usize);
    for frequency in request.partial_frequencies() {
        let oscillator = alloc.oscillator(params.waveform.oscillator_type(), frequency);
        let shaper = if params.waveform == Waveform::Pulse {
            let shaper = alloc.wave_shaper(pulse_curve(params.pulse_width));
            alloc.graph.connect(oscillator, shaper)?;
            Some(shaper)
        } else {
            None
        };
        partials.push(Partial { oscillator, shaper });
    }

    let main_gain = alloc.gain(0.0);
    if let Some(gain) = alloc.graph.param_mut(main_gain, ParamKind::Gain) {
        gain.set_value_at_time(0.0, now);
        gain.linear_ramp_to_value_at_time(1.0, now + FADE_IN);
    }
    for partial in &partials {
        alloc
            .graph
            .connect(partial.shaper.unwrap_or(partial.oscillator), main_gain)?;
        alloc.graph.start(partial.oscillator, now)?;
    }
    alloc.graph.connect(main_gain, output.input())?;

    let am = if request.am_frequency > 0.0 && params.am {
        let am = alloc.modulator(request.am_frequency, AM_DEPTH, now)?;
        alloc.graph.connect_param(am.gain, main_gain, ParamKind::Gain)?;
        Some(am)
    } else {
        None
    };

    let fm = if request.fm_frequency > 0.0 && params.fm {
        let fm = alloc.modulator(request.fm_frequency, FM_INDEX, now)?;
        for partial in &partials {
            alloc
                .graph
                .connect_param(fm.gain, partial.oscillator, ParamKind::Frequency)?;
        }
        Some(fm)
    } else {
        None
    };

    let distorted_fm =
        if request.fm_frequency > 0.0 && params.fm && params.distorted_fm_intensity > 0.0 {
            let level = DISTORTED_FM_SCALE * params.distorted_fm_intensity;
            let distorted = alloc.modulator(request.fm_frequency, level, now)?;
            alloc.graph.connect(distorted.gain, output.destination())?;
            Some(distorted)
        } else {
            None
        };

    let lfo = if request.lfo_frequency > 0.0 && params.lfo {
        let lfo = alloc.modulator(request.lfo_frequency, LFO_DEPTH, now)?;
        alloc.graph.connect_param(lfo.gain, main_gain, ParamKind::Gain)?;
        Some(lfo)
    } else {
        None
    };

    Ok(Voice {
        key: key.to_string(),
        frequency: request.frequency,
        partials,
        main_gain,
        am,
        fm,
        distorted_fm,
        lfo,
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Node, Target};

    fn setup() -> (AudioGraph, OutputChain) {
        let mut graph = AudioGraph::new(48_000.0);
        let output = OutputChain::build(&mut graph, 1.0).unwrap();
        (graph, output)
    }

    fn everything_on() -> Parameters {
        Parameters {
            am: true,
            fm: true,
            lfo: true,
            distorted_fm_intensity: 0.4,
            ..Parameters::default()
        }
    }

    #[test]
    fn plain_voice() {
        let (mut graph, output) = setup();
        let params = Parameters::default();
        let req = NoteRequest::new(440.0, &params);
        let voice = build_voice("90", &req, &params, &mut graph, &output).unwrap();

        assert_eq!(voice.partials().len(), 1);
        assert_eq!(voice.modulators().count(), 0);
        assert_eq!(graph.node_count(), 3 + 2);

        let osc = graph.oscillator(voice.partials()[0].oscillator).unwrap();
        assert_eq!(osc.kind(), OscillatorType::Sine);
        assert_eq!(osc.start_time(), Some(0.0));
        assert_eq!(
            graph.outputs(voice.main_gain()).collect::<Vec<_>>(),
            vec![Target::Input(output.input())]
        );

        let gain = &graph.gain(voice.main_gain()).unwrap().gain;
        assert_eq!(gain.value_at(0.0), 0.0);
        assert!((gain.value_at(0.05) - 0.5).abs() < 1e-4);
        assert_eq!(gain.value_at(FADE_IN), 1.0);
    }

    #[test]
    fn pulse_partials_go_through_shapers() {
        let (mut graph, output) = setup();
        let params = Parameters {
            waveform: Waveform::Pulse,
            pulse_width: 0.25,
            ..Parameters::default()
        };
        let req = NoteRequest::new(440.0, &params);
        let voice = build_voice("90", &req, &params, &mut graph, &output).unwrap();

        let partial = voice.partials()[0];
        let shaper = partial.shaper.unwrap();
        assert_eq!(
            graph.oscillator(partial.oscillator).unwrap().kind(),
            OscillatorType::Sawtooth
        );
        assert_eq!(graph.wave_shaper(shaper).unwrap().curve(), &pulse_curve(0.25)[..]);
        assert_eq!(
            graph.outputs(partial.oscillator).collect::<Vec<_>>(),
            vec![Target::Input(shaper)]
        );
        assert_eq!(
            graph.outputs(shaper).collect::<Vec<_>>(),
            vec![Target::Input(voice.main_gain())]
        );
    }

    #[test]
    fn modulation_wiring() {
        let (mut graph, output) = setup();
        let params = Parameters {
            additive: true,
            num_partials: 2,
            partial_spacing: 5.0,
            ..everything_on()
        };
        let req = NoteRequest::new(300.0, &params);
        let voice = build_voice("v", &req, &params, &mut graph, &output).unwrap();
        let main = voice.main_gain();

        let am = voice.am().unwrap();
        assert_eq!(graph.gain(am.gain).unwrap().gain.value_at(0.0), AM_DEPTH);
        assert_eq!(
            graph.outputs(am.gain).collect::<Vec<_>>(),
            vec![Target::Param(main, ParamKind::Gain)]
        );

        let lfo = voice.lfo().unwrap();
        assert_eq!(graph.gain(lfo.gain).unwrap().gain.value_at(0.0), LFO_DEPTH);
        assert_eq!(
            graph.outputs(lfo.gain).collect::<Vec<_>>(),
            vec![Target::Param(main, ParamKind::Gain)]
        );

        let fm = voice.fm().unwrap();
        assert_eq!(graph.gain(fm.gain).unwrap().gain.value_at(0.0), FM_INDEX);
        let fm_targets: Vec<_> = graph.outputs(fm.gain).collect();
        assert_eq!(fm_targets.len(), 2);
        for partial in voice.partials() {
            assert!(fm_targets.contains(&Target::Param(partial.oscillator, ParamKind::Frequency)));
        }

        let distorted = voice.distorted_fm().unwrap();
        assert!((graph.gain(distorted.gain).unwrap().gain.value_at(0.0) - 40.0).abs() < 1e-4);
        assert_eq!(
            graph.outputs(distorted.gain).collect::<Vec<_>>(),
            vec![Target::Input(output.destination())]
        );
        assert_ne!(distorted.oscillator, fm.oscillator);

        for m in voice.modulators() {
            assert_eq!(graph.oscillator(m.oscillator).unwrap().start_time(), Some(0.0));
        }
    }

    #[test]
    fn distorted_fm_needs_fm_and_intensity() {
        let (mut graph, output) = setup();

        let mut params = everything_on();
        params.fm = false;
        let req = NoteRequest::new(300.0, &params);
        let voice = build_voice("a", &req, &params, &mut graph, &output).unwrap();
        assert!(voice.fm().is_none());
        assert!(voice.distorted_fm().is_none());

        params.fm = true;
        params.distorted_fm_intensity = 0.0;
        let req = NoteRequest::new(300.0, &params);
        let voice = build_voice("b", &req, &params, &mut graph, &output).unwrap();
        assert!(voice.fm().is_some());
        assert!(voice.distorted_fm().is_none());
    }

    #[test]
    fn every_owned_node_is_in_the_graph() {
        let (mut graph, output) = setup();
        let params = Parameters {
            waveform: Waveform::Pulse,
            additive: true,
            num_partials: 3,
            ..everything_on()
        };
        let req = NoteRequest::new(300.0, &params);
        let voice = build_voice("v", &req, &params, &mut graph, &output).unwrap();

        // 3 oscillators, 3 shapers, main gain, 4 modulators of 2 nodes each.
        assert_eq!(voice.nodes().count(), 3 + 3 + 1 + 8);
        assert_eq!(graph.node_count(), 3 + 15);
        for id in voice.nodes() {
            assert!(!matches!(graph.node(id), None | Some(Node::Destination)));
        }
    }
}
