use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::keyboard::{KeyDef, Keyboard};

/// How long a randomly triggered note sounds before it is released.
pub const CRAZY_NOTE_LENGTH: Duration = Duration::from_millis(300);

/// Picks random white keys for crazy mode and remembers when each of the
/// notes it started has to be released.
#[derive(Debug)]
pub struct RandomTrigger {
    pool: Vec<KeyDef>,
    rng: StdRng,
    pending: Vec<(String, Instant)>,
}

impl RandomTrigger {
    pub fn new(keyboard: &Keyboard) -> Self {
        Self::with_rng(keyboard, StdRng::from_entropy())
    }

    pub fn with_rng(keyboard: &Keyboard, rng: StdRng) -> Self {
        Self {
            pool: keyboard.white_keys().cloned().collect(),
            rng,
            pending: Vec::new(),
        }
    }

    /// Shuffle the white keys and take the first one.
    pub fn choose(&mut self) -> Option<KeyDef> {
        let mut keys = self.pool.clone();
        keys.shuffle(&mut self.rng);
        keys.into_iter().next()
    }

    pub fn schedule_release(&mut self, key: String, at: Instant) {
        self.pending.push((key, at));
    }

    pub fn release_time(&self, key: &str) -> Option<Instant> {
        self.pending
            .iter()
            .find(|(k, _)| k == key)
            .map(|&(_, at)| at)
    }

    /// Take the keys whose release time has come, oldest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<String> {
        let mut due = Vec::new();
        self.pending.retain(|(key, at)| {
            if *at <= now {
                due.push((key.clone(), *at));
                false
            } else {
                true
            }
        });
        due.sort_by_key(|&(_, at)| at);
        due.into_iter().map(|(key, _)| key).collect()
    }

    pub fn num_pending(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
