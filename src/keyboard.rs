use serde::Deserialize;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    White,
    Black,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct KeyDef {
    pub note: String,
    pub frequency: f32,
    #[serde(rename = "type")]
    pub kind: KeyKind,
    /// Code of the computer key that plays this note (the uppercase ASCII
    /// value for letters and digits).
    pub key_code: u32,
}

/// Registry key of a note played from the on-screen keyboard or chosen at
/// random.
pub fn virtual_key(note: &str) -> String {
    format!("virtual-{}", note)
}

/// Registry key of a physical key.
pub fn physical_key(key_code: u32) -> String {
    key_code.to_string()
}

#[derive(Clone, Debug, PartialEq)]
pub struct Keyboard {
    keys: Vec<KeyDef>,
}

impl Keyboard {
    pub fn new(keys: Vec<KeyDef>) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &[KeyDef] {
        &self.keys
    }

    pub fn white_keys(&self) -> impl Iterator<Item = &KeyDef> + '_ {
        self.keys.iter().filter(|k| k.kind == KeyKind::White)
    }

    pub fn by_key_code(&self, key_code: u32) -> Option<&KeyDef> {
        self.keys.iter().find(|k| k.key_code == key_code)
    }

    pub fn by_note(&self, note: &str) -> Option<&KeyDef> {
        self.keys.iter().find(|k| k.note == note)
    }
}

impl Default for Keyboard {
    /// Two octaves from C4 to C6 on the Z and Q rows of a QWERTY keyboard.
    fn default() -> Self {
        use KeyKind::*;

        const LAYOUT: [(&str, f32, KeyKind, char); 25] = [
            ("C4", 261.63, White, 'Z'),
            ("C#4", 277.18, Black, 'S'),
            ("D4", 293.66, White, 'X'),
            ("D#4", 311.13, Black, 'D'),
            ("E4", 329.63, White, 'C'),
            ("F4", 349.23, White, 'V'),
            ("F#4", 369.99, Black, 'G'),
            ("G4", 391.99, White, 'B'),
            ("G#4", 415.3, Black, 'H'),
            ("A4", 440.0, White, 'N'),
            ("A#4", 466.16, Black, 'J'),
            ("B4", 493.88, White, 'M'),
            ("C5", 523.25, White, 'Q'),
            ("C#5", 554.37, Black, '2'),
            ("D5", 587.33, White, 'W'),
            ("D#5", 622.25, Black, '3'),
            ("E5", 659.26, White, 'E'),
            ("F5", 698.46, White, 'R'),
            ("F#5", 739.99, Black, '5'),
            ("G5", 783.99, White, 'T'),
            ("G#5", 830.61, Black, '6'),
            ("A5", 880.0, White, 'Y'),
            ("A#5", 932.33, Black, '7'),
            ("B5", 987.77, White, 'U'),
            ("C6", 1046.5, White, 'I'),
        ];

        let keys = LAYOUT
            .iter()
            .map(|&(note, frequency, kind, key)| KeyDef {
                note: note.to_string(),
                frequency,
                kind,
                key_code: key as u32,
            })
            .collect();

        Self { keys }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout() {
        let kb = Keyboard::default();
        assert_eq!(kb.keys().len(), 25);
        assert_eq!(kb.white_keys().count(), 15);
        assert_eq!(kb.keys()[0].frequency, 261.63);
        assert_eq!(kb.keys()[24].frequency, 1046.5);

        let a4 = kb.by_key_code(78).unwrap();
        assert_eq!(a4.note, "A4");
        assert_eq!(a4.frequency, 440.0);
        assert_eq!(kb.by_key_code('2' as u32).unwrap().note, "C#5");
        assert_eq!(kb.by_note("C6").unwrap().key_code, 73);
        assert!(kb.by_key_code('A' as u32).is_none());
    }

    #[test]
    fn key_names() {
        assert_eq!(virtual_key("C#4"), "virtual-C#4");
        assert_eq!(physical_key(90), "90");
    }
}
