/// One entry on a parameter's automation timeline.
#[derive(Copy, Clone, Debug, PartialEq)]
enum Event {
    SetValue { time: f64, value: f32 },
    LinearRamp { time: f64, value: f32 },
    ExponentialRamp { time: f64, value: f32 },
}

impl Event {
    fn time(&self) -> f64 {
        match *self {
            Event::SetValue { time, .. }
            | Event::LinearRamp { time, .. }
            | Event::ExponentialRamp { time, .. } => time,
        }
    }

    fn value(&self) -> f32 {
        match *self {
            Event::SetValue { value, .. }
            | Event::LinearRamp { value, .. }
            | Event::ExponentialRamp { value, .. } => value,
        }
    }
}

/// A node parameter whose intrinsic value follows a schedule of set and ramp
/// events, in context time (seconds).
///
/// A ramp runs from the previous event (or the default value at time zero)
/// up to its own time and value; after the last event the parameter holds
/// the last value. Signals connected to the parameter are added on top of
/// the intrinsic value while rendering, see [`AudioParam::computed`].
#[derive(Clone, Debug)]
pub struct AudioParam {
    default: f32,
    events: Vec<Event>,
}

impl AudioParam {
    pub fn new(value: f32) -> Self {
        Self {
            default: value,
            events: Vec::new(),
        }
    }

    fn insert(&mut self, event: Event) {
        // Events at the same time keep their insertion order.
        let idx = self.events.partition_point(|e| e.time() <= event.time());
        self.events.insert(idx, event);
    }

    pub fn set_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(Event::SetValue { time, value });
    }

    pub fn linear_ramp_to_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(Event::LinearRamp { time, value });
    }

    pub fn exponential_ramp_to_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(Event::ExponentialRamp { time, value });
    }

    /// Drop every event scheduled at or after `time`.
    pub fn cancel_scheduled_values(&mut self, time: f64) {
        self.events.retain(|e| e.time() < time);
    }

    /// Pin the value the parameter has at `time` and discard everything
    /// scheduled from then on, so a new ramp can start from where the old
    /// one was interrupted.
    pub fn cancel_and_hold(&mut self, time: f64) {
        let value = self.value_at(time);
        self.cancel_scheduled_values(time);
        self.set_value_at_time(value, time);
    }

    /// Forget events that can no longer affect values at or after `time`.
    /// The last event at or before `time` stays as the starting point of
    /// whatever follows it.
    pub fn discard_before(&mut self, time: f64) {
        let anchor = self.events.partition_point(|e| e.time() <= time);
        if anchor > 1 {
            self.events.drain(..anchor - 1);
        }
    }

    /// Intrinsic value at `time`, ignoring connected modulation.
    pub fn value_at(&self, time: f64) -> f32 {
        let next = self.events.partition_point(|e| e.time() <= time);
        let (t0, v0) = match next.checked_sub(1) {
            Some(prev) => (self.events[prev].time(), self.events[prev].value()),
            None => (0.0, self.default),
        };

        match self.events.get(next) {
            Some(&Event::LinearRamp { time: t1, value: v1 }) => {
                if t1 <= t0 {
                    return v1;
                }
                let perc = ((time - t0) / (t1 - t0)) as f32;
                v0 + (v1 - v0) * perc
            }

            Some(&Event::ExponentialRamp { time: t1, value: v1 }) => {
                // Undefined through zero, hold the start value instead.
                if v0 * v1 <= 0.0 {
                    return v0;
                }
                if t1 <= t0 {
                    return v1;
                }
                let perc = (time - t0) / (t1 - t0);
                v0 * (v1 / v0).powf(perc as f32)
            }

            _ => v0,
        }
    }

    /// Value used while rendering: intrinsic value plus the summed signals
    /// of every node connected to this parameter.
    #[inline]
    pub fn computed(&self, time: f64, modulation: f32) -> f32 {
        self.value_at(time) + modulation
    }

    pub fn num_scheduled(&self) -> usize {
        self.events.len()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn holds_default_without_events() {
        let p = AudioParam::new(0.5);
        assert_eq!(p.value_at(0.0), 0.5);
        assert_eq!(p.value_at(12.0), 0.5);
        assert_eq!(p.computed(1.0, 0.25), 0.75);
    }

    #[test]
    fn linear_ramp_interpolates_then_holds() {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(0.0, 1.0);
        p.linear_ramp_to_value_at_time(1.0, 1.1);

        assert!(close(p.value_at(1.0), 0.0));
        assert!(close(p.value_at(1.05), 0.5));
        assert!(close(p.value_at(1.1), 1.0));
        assert!(close(p.value_at(5.0), 1.0));
    }

    #[test]
    fn exponential_ramp_is_geometric() {
        let mut p = AudioParam::new(1.0);
        p.set_value_at_time(1.0, 0.0);
        p.exponential_ramp_to_value_at_time(0.01, 2.0);

        assert!(close(p.value_at(1.0), 0.1));
        assert!(close(p.value_at(2.0), 0.01));
    }

    #[test]
    fn exponential_ramp_from_zero_holds() {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(0.0, 0.0);
        p.exponential_ramp_to_value_at_time(0.0001, 0.3);
        assert_eq!(p.value_at(0.15), 0.0);
    }

    #[test]
    fn cancel_and_hold_mid_attack() {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(0.0, 0.0);
        p.linear_ramp_to_value_at_time(1.0, 0.1);

        p.cancel_and_hold(0.05);
        p.exponential_ramp_to_value_at_time(0.0001, 0.35);

        assert!(close(p.value_at(0.05), 0.5));
        // The interrupted attack no longer pulls the value up.
        assert!(p.value_at(0.1) < 0.5);
        assert!(close(p.value_at(0.35), 0.0001));
        assert_eq!(p.num_scheduled(), 3);
    }

    #[test]
    fn cancel_scheduled_values_drops_future_only() {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(0.2, 1.0);
        p.set_value_at_time(0.7, 2.0);
        p.cancel_scheduled_values(2.0);

        assert_eq!(p.num_scheduled(), 1);
        assert_eq!(p.value_at(3.0), 0.2);
    }

    #[test]
    fn discard_before_keeps_running_ramp() {
        let mut p = AudioParam::new(0.0);
        for i in 0..10 {
            p.set_value_at_time(i as f32, i as f64 * 0.1);
        }
        p.linear_ramp_to_value_at_time(20.0, 2.0);
        let mid = p.value_at(1.5);

        p.discard_before(1.0);
        assert_eq!(p.num_scheduled(), 2);
        assert!(close(p.value_at(1.5), mid));
        assert!(close(p.value_at(2.0), 20.0));

        // Nothing at or before the cut: nothing to drop.
        let mut q = AudioParam::new(1.0);
        q.set_value_at_time(2.0, 5.0);
        q.discard_before(1.0);
        assert_eq!(q.num_scheduled(), 1);
        assert_eq!(q.value_at(0.5), 1.0);
    }
}
