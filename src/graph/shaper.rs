pub const PULSE_CURVE_LEN: usize = 256;

/// Transfer curve that turns a sawtooth into a pulse wave of the given duty
/// cycle. The first half of the curve covers the falling part of the input
/// range, the second half the rising part.
pub fn pulse_curve(pulse_width: f32) -> Vec<f32> {
    let half = (PULSE_CURVE_LEN / 2) as f32;
    let mut curve = vec![0.0; PULSE_CURVE_LEN];

    for (i, v) in curve.iter_mut().enumerate().take(PULSE_CURVE_LEN / 2) {
        *v = if (i as f32) < half * pulse_width { -1.0 } else { 1.0 };
    }
    for (i, v) in curve.iter_mut().enumerate().skip(PULSE_CURVE_LEN / 2) {
        *v = if (i as f32) < half + half * pulse_width { 1.0 } else { -1.0 };
    }

    curve
}

/// Maps each input sample through a transfer curve spanning [-1, 1], with
/// linear interpolation between curve points.
#[derive(Clone, Debug)]
pub struct WaveShaper {
    curve: Vec<f32>,
}

impl WaveShaper {
    pub fn new(curve: Vec<f32>) -> Self {
        Self { curve }
    }

    pub fn curve(&self) -> &[f32] {
        &self.curve
    }

    /// Replace the curve in place; the shaper keeps its connections.
    pub fn set_curve(&mut self, curve: Vec<f32>) {
        self.curve = curve;
    }

    pub fn shape(&self, x: f32) -> f32 {
        let n = self.curve.len();
        match n {
            0 => return x,
            1 => return self.curve[0],
            _ => {}
        }

        let pos = ((n - 1) as f32 * 0.5 * (x + 1.0)).clamp(0.0, (n - 1) as f32);
        let idx = pos.floor() as usize;
        let frac = pos - idx as f32;

        match self.curve.get(idx + 1) {
            Some(&next) => self.curve[idx] + (next - self.curve[idx]) * frac,
            None => self.curve[idx],
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_duty_curve() {
        let curve = pulse_curve(0.5);
        assert_eq!(curve.len(), 256);
        assert!(curve[0..64].iter().all(|&v| v == -1.0));
        assert!(curve[64..128].iter().all(|&v| v == 1.0));
        assert!(curve[128..192].iter().all(|&v| v == 1.0));
        assert!(curve[192..256].iter().all(|&v| v == -1.0));
    }

    #[test]
    fn extreme_duty_cycles() {
        let zero = pulse_curve(0.0);
        assert!(zero[..128].iter().all(|&v| v == 1.0));
        assert!(zero[128..].iter().all(|&v| v == -1.0));

        let full = pulse_curve(1.0);
        assert!(full[..128].iter().all(|&v| v == -1.0));
        assert!(full[128..].iter().all(|&v| v == 1.0));
    }

    #[test]
    fn curve_is_deterministic() {
        assert_eq!(pulse_curve(0.3), pulse_curve(0.3));
    }

    #[test]
    fn shape_maps_ends_and_interpolates() {
        let shaper = WaveShaper::new(vec![-1.0, 0.0, 1.0]);
        assert_eq!(shaper.shape(-1.0), -1.0);
        assert_eq!(shaper.shape(0.0), 0.0);
        assert_eq!(shaper.shape(1.0), 1.0);
        assert_eq!(shaper.shape(0.5), 0.5);
        assert_eq!(shaper.shape(4.0), 1.0);
    }

    #[test]
    fn empty_curve_passes_through() {
        let shaper = WaveShaper::new(Vec::new());
        assert_eq!(shaper.shape(0.3), 0.3);
    }
}
