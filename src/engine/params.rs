use std::fmt;
use std::str::FromStr;

use crate::graph::OscillatorType;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
    /// A sawtooth shaped into a pulse of adjustable width.
    Pulse,
}

impl Waveform {
    /// Oscillator type behind the waveform.
    pub fn oscillator_type(self) -> OscillatorType {
        match self {
            Waveform::Sine => OscillatorType::Sine,
            Waveform::Square => OscillatorType::Square,
            Waveform::Sawtooth | Waveform::Pulse => OscillatorType::Sawtooth,
            Waveform::Triangle => OscillatorType::Triangle,
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Waveform::Pulse => f.write_str("pulse"),
            other => fmt::Display::fmt(&other.oscillator_type(), f),
        }
    }
}

impl FromStr for Waveform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "pulse" {
            return Ok(Waveform::Pulse);
        }
        match s.parse::<OscillatorType>()? {
            OscillatorType::Sine => Ok(Waveform::Sine),
            OscillatorType::Square => Ok(Waveform::Square),
            OscillatorType::Sawtooth => Ok(Waveform::Sawtooth),
            OscillatorType::Triangle => Ok(Waveform::Triangle),
        }
    }
}

/// A change to a single parameter, as sent by the input layer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ParamChange {
    Waveform(Waveform),
    PulseWidth(f32),
    Additive(bool),
    NumPartials(u32),
    PartialSpacing(f32),
    Am(bool),
    AmFrequency(f32),
    Fm(bool),
    FmFrequency(f32),
    DistortedFmIntensity(f32),
    Lfo(bool),
    LfoFrequency(f32),
    Crazy(bool),
}

impl ParamChange {
    /// False for a NaN or infinite value.
    pub fn is_finite(&self) -> bool {
        match *self {
            ParamChange::PulseWidth(x)
            | ParamChange::PartialSpacing(x)
            | ParamChange::AmFrequency(x)
            | ParamChange::FmFrequency(x)
            | ParamChange::DistortedFmIntensity(x)
            | ParamChange::LfoFrequency(x) => x.is_finite(),
            _ => true,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Parameters {
    pub waveform: Waveform,
    /// Duty cycle of the pulse waveform, in [0, 1].
    pub pulse_width: f32,

    pub additive: bool,
    pub num_partials: u32,
    /// Frequency offset between consecutive partials in Hz.
    pub partial_spacing: f32,

    pub am: bool,
    pub am_frequency: f32,

    pub fm: bool,
    pub fm_frequency: f32,
    /// Level of the distorted FM signal, in [0, 1]. Zero turns it off.
    pub distorted_fm_intensity: f32,

    pub lfo: bool,
    pub lfo_frequency: f32,

    pub crazy: bool,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            waveform: Waveform::Sine,
            pulse_width: 0.5,
            additive: false,
            num_partials: 50,
            partial_spacing: 50.0,
            am: false,
            am_frequency: 250.0,
            fm: false,
            fm_frequency: 250.0,
            distorted_fm_intensity: 0.0,
            lfo: false,
            lfo_frequency: 5.0,
            crazy: false,
        }
    }
}

impl Parameters {
    /// Changes carrying a NaN or infinite value are ignored.
    pub fn apply(&mut self, change: ParamChange) {
        if !change.is_finite() {
            return;
        }
        match change {
            ParamChange::Waveform(w) => self.waveform = w,
            ParamChange::PulseWidth(pw) => self.pulse_width = pw.clamp(0.0, 1.0),
            ParamChange::Additive(on) => self.additive = on,
            ParamChange::NumPartials(n) => self.num_partials = n.max(1),
            ParamChange::PartialSpacing(hz) => self.partial_spacing = hz,
            ParamChange::Am(on) => self.am = on,
            ParamChange::AmFrequency(hz) => self.am_frequency = hz,
            ParamChange::Fm(on) => self.fm = on,
            ParamChange::FmFrequency(hz) => self.fm_frequency = hz,
            ParamChange::DistortedFmIntensity(x) => {
                self.distorted_fm_intensity = x.clamp(0.0, 1.0)
            }
            ParamChange::Lfo(on) => self.lfo = on,
            ParamChange::LfoFrequency(hz) => self.lfo_frequency = hz,
            ParamChange::Crazy(on) => self.crazy = on,
        }
    }
}

/// Everything the graph builder needs to know about a new voice, read from
/// the parameters at the moment the note starts. A modulation frequency of
/// zero means that modulator is left out.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NoteRequest {
    pub frequency: f32,
    pub partials: u32,
    pub partial_spacing: f32,
    pub am_frequency: f32,
    pub fm_frequency: f32,
    pub lfo_frequency: f32,
}

impl NoteRequest {
    pub fn new(frequency: f32, params: &Parameters) -> Self {
        let (partials, partial_spacing) = if params.additive {
            (params.num_partials.max(1), params.partial_spacing)
        } else {
            (1, 0.0)
        };

        Self {
            frequency,
            partials,
            partial_spacing,
            am_frequency: if params.am { params.am_frequency } else { 0.0 },
            fm_frequency: if params.fm { params.fm_frequency } else { 0.0 },
            lfo_frequency: if params.lfo { params.lfo_frequency } else { 0.0 },
        }
    }

    pub fn is_finite(&self) -> bool {
        [
            self.frequency,
            self.partial_spacing,
            self.am_frequency,
            self.fm_frequency,
            self.lfo_frequency,
        ]
        .iter()
        .all(|x| x.is_finite())
    }

    /// Frequency of each partial oscillator, in order.
    pub fn partial_frequencies(&self) -> impl Iterator<Item = f32> + '_ {
        (0..self.partials).map(move |i| self.frequency + i as f32 * self.partial_spacing)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changes_are_clamped() {
        let mut p = Parameters::default();
        p.apply(ParamChange::PulseWidth(1.5));
        p.apply(ParamChange::NumPartials(0));
        p.apply(ParamChange::DistortedFmIntensity(-0.2));

        assert_eq!(p.pulse_width, 1.0);
        assert_eq!(p.num_partials, 1);
        assert_eq!(p.distorted_fm_intensity, 0.0);
    }

    #[test]
    fn non_finite_changes_are_ignored() {
        let mut p = Parameters::default();
        p.apply(ParamChange::FmFrequency(f32::INFINITY));
        p.apply(ParamChange::AmFrequency(f32::NAN));
        p.apply(ParamChange::PulseWidth(f32::NAN));
        p.apply(ParamChange::PartialSpacing(f32::NEG_INFINITY));
        assert_eq!(p, Parameters::default());

        assert!(ParamChange::Fm(true).is_finite());
        assert!(!NoteRequest::new(f32::INFINITY, &p).is_finite());
        assert!(NoteRequest::new(440.0, &p).is_finite());
    }

    #[test]
    fn request_ignores_disabled_modes() {
        let mut p = Parameters::default();
        p.am_frequency = 30.0;
        p.lfo = true;

        let req = NoteRequest::new(440.0, &p);
        assert_eq!(req.partials, 1);
        assert_eq!(req.partial_spacing, 0.0);
        assert_eq!(req.am_frequency, 0.0);
        assert_eq!(req.fm_frequency, 0.0);
        assert_eq!(req.lfo_frequency, 5.0);
    }

    #[test]
    fn additive_partials() {
        let mut p = Parameters::default();
        p.apply(ParamChange::Additive(true));
        p.apply(ParamChange::NumPartials(3));
        p.apply(ParamChange::PartialSpacing(10.0));

        let req = NoteRequest::new(200.0, &p);
        let freqs: Vec<f32> = req.partial_frequencies().collect();
        assert_eq!(freqs, vec![200.0, 210.0, 220.0]);
    }

    #[test]
    fn waveform_names_round_trip() {
        for name in ["sine", "square", "sawtooth", "triangle", "pulse"] {
            let w: Waveform = name.parse().unwrap();
            assert_eq!(w.to_string(), name);
        }
        assert_eq!(Waveform::Pulse.oscillator_type(), OscillatorType::Sawtooth);
        assert!("noise".parse::<Waveform>().is_err());
    }
}
