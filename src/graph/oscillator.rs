use std::f64::consts::TAU;
use std::fmt;
use std::str::FromStr;

use super::param::AudioParam;
use super::GraphError;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OscillatorType {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl fmt::Display for OscillatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OscillatorType::Sine => "sine",
            OscillatorType::Square => "square",
            OscillatorType::Sawtooth => "sawtooth",
            OscillatorType::Triangle => "triangle",
        };
        f.write_str(name)
    }
}

impl FromStr for OscillatorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sine" => Ok(OscillatorType::Sine),
            "square" => Ok(OscillatorType::Square),
            "sawtooth" => Ok(OscillatorType::Sawtooth),
            "triangle" => Ok(OscillatorType::Triangle),
            _ => Err(format!("unknown oscillator type '{}'", s)),
        }
    }
}

/// A periodic source. It is silent until its start time and after its stop
/// time; the phase only advances while it plays.
#[derive(Clone, Debug)]
pub struct Oscillator {
    kind: OscillatorType,
    pub frequency: AudioParam,
    phase: f64,
    start_time: Option<f64>,
    stop_time: Option<f64>,
}

impl Oscillator {
    pub fn new(kind: OscillatorType, frequency: f32) -> Self {
        Self {
            kind,
            frequency: AudioParam::new(frequency),
            phase: 0.0,
            start_time: None,
            stop_time: None,
        }
    }

    pub fn kind(&self) -> OscillatorType {
        self.kind
    }

    /// Switch the waveform without touching phase or schedule.
    pub fn set_kind(&mut self, kind: OscillatorType) {
        self.kind = kind;
    }

    pub fn start(&mut self, when: f64) -> Result<(), GraphError> {
        if self.start_time.is_some() {
            return Err(GraphError::AlreadyStarted);
        }
        self.start_time = Some(when);
        Ok(())
    }

    pub fn stop(&mut self, when: f64) -> Result<(), GraphError> {
        if self.start_time.is_none() {
            return Err(GraphError::NotStarted);
        }
        if self.stop_time.is_some() {
            return Err(GraphError::AlreadyStopped);
        }
        self.stop_time = Some(when);
        Ok(())
    }

    pub fn start_time(&self) -> Option<f64> {
        self.start_time
    }

    pub fn stop_time(&self) -> Option<f64> {
        self.stop_time
    }

    pub fn is_playing(&self, time: f64) -> bool {
        let started = self.start_time.map_or(false, |s| time >= s);
        let stopped = self.stop_time.map_or(false, |s| time >= s);
        started && !stopped
    }

    pub fn has_ended(&self, time: f64) -> bool {
        self.stop_time.map_or(false, |s| time >= s)
    }

    fn sample(&self) -> f32 {
        let t = self.phase;
        let value = match self.kind {
            OscillatorType::Sine => (t * TAU).sin(),
            OscillatorType::Square => {
                if t < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            // Starts at zero and rises, like the sine.
            OscillatorType::Sawtooth => 2.0 * ((t + 0.5) % 1.0) - 1.0,
            OscillatorType::Triangle => {
                if t < 0.25 {
                    4.0 * t
                } else if t < 0.75 {
                    2.0 - 4.0 * t
                } else {
                    4.0 * t - 4.0
                }
            }
        };
        value as f32
    }

    /// Produce one sample at `time` and advance the phase by one frame.
    /// `modulation` is the summed signal connected to the frequency param.
    pub fn next_sample(&mut self, time: f64, sample_rate: f32, modulation: f32) -> f32 {
        if !self.is_playing(time) {
            return 0.0;
        }

        let value = self.sample();
        let freq = self.frequency.computed(time, modulation) as f64;
        self.phase = (self.phase + freq / sample_rate as f64).rem_euclid(1.0);
        value
    }
}
