const DETECTOR_WINDOW_MS: f32 = 5.0;
const MIN_LEVEL_DB: f32 = -120.0;

fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        MIN_LEVEL_DB
    } else {
        (20.0 * linear.log10()).max(MIN_LEVEL_DB)
    }
}

fn db_to_linear(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

/// Feed-forward mono compressor. Level is detected as RMS over a short
/// window, gain reduction follows a soft knee and is smoothed with separate
/// attack and release rates. Makeup gain is derived from the static curve
/// the same way a browser's dynamics compressor does it, so the threshold
/// can sit very low without the output collapsing.
#[derive(Clone, Debug)]
pub struct Compressor {
    sample_rate: f32,
    ringbuffer: Vec<f32>,
    ringbuffer_idx: usize,
    rms2total: f32,

    threshold: f32,
    knee: f32,
    ratio: f32,
    att_rate: f32,
    rel_rate: f32,
    makeup: f32,

    reduction: f32,
}

impl Compressor {
    pub fn new(sample_rate: f32) -> Self {
        let window_size = ((sample_rate * DETECTOR_WINDOW_MS / 1000.0) as usize).max(1);

        let mut c = Self {
            sample_rate,
            ringbuffer: vec![0.0; window_size],
            ringbuffer_idx: 0,
            rms2total: 0.0,

            threshold: -24.0,
            knee: 30.0,
            ratio: 12.0,
            att_rate: 0.0, // Initialized later.
            rel_rate: 0.0, // Initialized later.
            makeup: 1.0,   // Initialized later.

            reduction: 0.0,
        };

        c.set_attack_time(0.003);
        c.set_release_time(0.25);
        c.update_makeup();
        c
    }

    /// Set the threshold in dB.
    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold;
        self.update_makeup();
    }

    /// Set the knee width in dB.
    pub fn set_knee(&mut self, knee: f32) {
        self.knee = knee.max(0.0);
        self.update_makeup();
    }

    pub fn set_ratio(&mut self, ratio: f32) {
        self.ratio = ratio.max(1.0);
        self.update_makeup();
    }

    /// Set the attack time in seconds.
    pub fn set_attack_time(&mut self, attack: f32) {
        self.att_rate = (-1.0 / (attack.max(1e-5) * self.sample_rate)).exp();
    }

    /// Set the release time in seconds.
    pub fn set_release_time(&mut self, release: f32) {
        self.rel_rate = (-1.0 / (release.max(1e-5) * self.sample_rate)).exp();
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Current gain reduction in dB (zero or negative).
    pub fn reduction(&self) -> f32 {
        self.reduction
    }

    /// Static gain reduction in dB for an input level in dB.
    fn static_reduction(&self, input_db: f32) -> f32 {
        let slope = 1.0 - 1.0 / self.ratio;
        let half_knee = self.knee / 2.0;
        let knee_start = self.threshold - half_knee;
        let knee_end = self.threshold + half_knee;

        if input_db <= knee_start {
            0.0
        } else if input_db >= knee_end || self.knee == 0.0 {
            (self.threshold - input_db) * slope
        } else {
            let x = input_db - knee_start;
            -slope * x * x / (2.0 * self.knee)
        }
    }

    fn update_makeup(&mut self) {
        let full_range = self.static_reduction(0.0);
        self.makeup = db_to_linear(-0.6 * full_range);
    }

    fn reset_detector(&mut self) {
        self.ringbuffer.fill(0.0);
        self.rms2total = 0.0;
    }

    /// Compress one sample. NaN or infinite input comes out as silence and
    /// is kept out of the level detector.
    pub fn process(&mut self, sample: f32) -> f32 {
        if !sample.is_finite() {
            return 0.0;
        }

        let sq = sample * sample;
        self.rms2total -= self.ringbuffer[self.ringbuffer_idx];
        self.rms2total += sq;
        self.ringbuffer[self.ringbuffer_idx] = sq;
        self.ringbuffer_idx = (self.ringbuffer_idx + 1) % self.ringbuffer.len();
        if !self.rms2total.is_finite() {
            self.reset_detector();
        }

        let rms2 = (self.rms2total / self.ringbuffer.len() as f32).max(0.0);
        let level_db = linear_to_db(rms2.sqrt());
        let target = self.static_reduction(level_db);

        // Falling reduction means more compression, which is the attack.
        let rate = if target < self.reduction {
            self.att_rate
        } else {
            self.rel_rate
        };
        self.reduction = target + (self.reduction - target) * rate;

        sample * db_to_linear(self.reduction) * self.makeup
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48_000.0;

    fn steady_gain(c: &mut Compressor, amplitude: f32) -> f32 {
        let mut out = 0.0;
        for n in 0..(SR as usize) {
            let sign = if n % 2 == 0 { 1.0 } else { -1.0 };
            out = c.process(sign * amplitude);
        }
        (out / amplitude).abs()
    }

    #[test]
    fn quiet_signal_untouched_but_made_up() {
        let mut c = Compressor::new(SR);
        c.set_threshold(-50.0);
        let gain = steady_gain(&mut c, 0.0001);
        assert!(c.reduction().abs() < 1e-3);
        assert!(gain > 1.0);
    }

    #[test]
    fn loud_signal_is_reduced() {
        let mut quiet = Compressor::new(SR);
        quiet.set_threshold(-50.0);
        let mut loud = quiet.clone();

        let quiet_gain = steady_gain(&mut quiet, 0.001);
        let loud_gain = steady_gain(&mut loud, 0.5);

        assert!(loud.reduction() < -20.0);
        assert!(loud_gain < quiet_gain);
    }

    #[test]
    fn hard_knee_above_threshold() {
        let mut c = Compressor::new(SR);
        c.set_knee(0.0);
        c.set_ratio(4.0);
        c.set_threshold(-20.0);
        assert_eq!(c.static_reduction(-30.0), 0.0);
        assert!((c.static_reduction(-10.0) + 7.5).abs() < 1e-4);
    }

    #[test]
    fn recovers_after_non_finite_input() {
        let mut c = Compressor::new(SR);
        c.set_threshold(-50.0);

        assert_eq!(c.process(f32::NAN), 0.0);
        assert_eq!(c.process(f32::INFINITY), 0.0);
        // Finite, but its square overflows.
        c.process(f32::MAX);
        assert!(c.rms2total.is_finite());

        steady_gain(&mut c, 0.5);
        assert!(c.reduction() < -20.0);
    }
}
