use std::collections::HashMap;

use super::voice::Voice;

/// Active voices by key. A key is present exactly while its voice sounds and
/// has not been released.
#[derive(Debug, Default)]
pub struct VoiceRegistry {
    voices: HashMap<String, Voice>,
}

impl VoiceRegistry {
    pub fn contains(&self, key: &str) -> bool {
        self.voices.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Voice> {
        self.voices.get(key)
    }

    /// Register a voice under its key. If the key is taken the registry is
    /// left alone and the voice is handed back.
    pub fn insert(&mut self, voice: Voice) -> Result<(), Voice> {
        if self.voices.contains_key(voice.key()) {
            return Err(voice);
        }
        self.voices.insert(voice.key().to_string(), voice);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Voice> {
        self.voices.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Voice> + '_ {
        self.voices.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.voices.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = Voice> + '_ {
        self.voices.drain().map(|(_, v)| v)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::AudioGraph;

    fn voice(key: &str, frequency: f32) -> Voice {
        let mut graph = AudioGraph::new(1000.0);
        Voice {
            key: key.to_string(),
            frequency,
            partials: Vec::new(),
            main_gain: graph.add_gain(0.0),
            am: None,
            fm: None,
            distorted_fm: None,
            lfo: None,
        }
    }

    #[test]
    fn one_voice_per_key() {
        let mut registry = VoiceRegistry::default();
        assert!(registry.insert(voice("90", 261.63)).is_ok());

        let rejected = registry.insert(voice("90", 440.0)).unwrap_err();
        assert_eq!(rejected.frequency(), 440.0);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("90").unwrap().frequency(), 261.63);
    }

    #[test]
    fn remove_unknown_is_none() {
        let mut registry = VoiceRegistry::default();
        assert!(registry.remove("nope").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn drain_empties() {
        let mut registry = VoiceRegistry::default();
        registry.insert(voice("a", 1.0)).unwrap();
        registry.insert(voice("b", 2.0)).unwrap();

        let mut keys: Vec<_> = registry.keys().map(str::to_string).collect();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);

        assert_eq!(registry.drain().count(), 2);
        assert!(registry.is_empty());
    }
}
