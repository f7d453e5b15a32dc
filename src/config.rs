use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::keyboard::{KeyDef, Keyboard};

/// Settings read from a TOML file. Every field is optional:
///
/// ```toml
/// master_volume = 0.8
///
/// [[keys]]
/// note = "A4"
/// frequency = 440.0
/// type = "white"
/// key_code = 65
/// ```
///
/// A `keys` table replaces the whole default layout.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub master_volume: f32,
    pub keys: Option<Vec<KeyDef>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            master_volume: 1.0,
            keys: None,
        }
    }
}

impl Config {
    pub fn from_toml(fname: &Path) -> Result<Self> {
        let mut file = File::open(fname)
            .with_context(|| format!("could not open config {}", fname.display()))?;
        let mut file_as_string = String::new();
        file.read_to_string(&mut file_as_string)?;
        Self::from_toml_str(&file_as_string)
            .with_context(|| format!("invalid config {}", fname.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn keyboard(&self) -> Keyboard {
        match &self.keys {
            Some(keys) => Keyboard::new(keys.clone()),
            None => Keyboard::default(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::KeyKind;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.master_volume, 1.0);
        assert_eq!(config.keyboard(), Keyboard::default());
    }

    #[test]
    fn keys_replace_layout() {
        let config = Config::from_toml_str(
            r#"
            master_volume = 0.5

            [[keys]]
            note = "A4"
            frequency = 440.0
            type = "white"
            key_code = 65

            [[keys]]
            note = "A#4"
            frequency = 466.16
            type = "black"
            key_code = 87
            "#,
        )
        .unwrap();

        assert_eq!(config.master_volume, 0.5);
        let kb = config.keyboard();
        assert_eq!(kb.keys().len(), 2);
        assert_eq!(kb.keys()[1].kind, KeyKind::Black);
        assert_eq!(kb.by_key_code(65).unwrap().note, "A4");
    }

    #[test]
    fn rejects_unknown_key_type() {
        let result = Config::from_toml_str(
            r#"
            [[keys]]
            note = "A4"
            frequency = 440.0
            type = "grey"
            key_code = 65
            "#,
        );
        assert!(result.is_err());
    }
}
