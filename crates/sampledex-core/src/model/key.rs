use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// One of the twelve pitch classes, spelled with sharps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl PitchClass {
    pub const ALL: [Self; 12] = [
        Self::C,
        Self::CSharp,
        Self::D,
        Self::DSharp,
        Self::E,
        Self::F,
        Self::FSharp,
        Self::G,
        Self::GSharp,
        Self::A,
        Self::ASharp,
        Self::B,
    ];

    /// Semitones above C.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Pitch class `index` semitones above C (wraps modulo 12).
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        Self::ALL[index % 12]
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::C => "C",
            Self::CSharp => "C#",
            Self::D => "D",
            Self::DSharp => "D#",
            Self::E => "E",
            Self::F => "F",
            Self::FSharp => "F#",
            Self::G => "G",
            Self::GSharp => "G#",
            Self::A => "A",
            Self::ASharp => "A#",
            Self::B => "B",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        let index = match name.to_ascii_uppercase().as_str() {
            "C" | "B#" => 0,
            "C#" | "DB" => 1,
            "D" => 2,
            "D#" | "EB" => 3,
            "E" | "FB" => 4,
            "F" | "E#" => 5,
            "F#" | "GB" => 6,
            "G" => 7,
            "G#" | "AB" => 8,
            "A" => 9,
            "A#" | "BB" => 10,
            "B" | "CB" => 11,
            _ => return None,
        };
        Some(Self::from_index(index))
    }
}

/// Major or minor tonality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Mode {
    Major,
    Minor,
}

impl Mode {
    #[must_use]
    pub const fn abbreviation(self) -> &'static str {
        match self {
            Self::Major => "maj",
            Self::Minor => "min",
        }
    }
}

/// A musical key such as `C maj` or `F# min`.
///
/// The display form is what gets persisted and what the key filter
/// compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MusicalKey {
    pub tonic: PitchClass,
    pub mode: Mode,
}

impl MusicalKey {
    #[must_use]
    pub const fn new(tonic: PitchClass, mode: Mode) -> Self {
        Self { tonic, mode }
    }

    /// All 24 keys, major before minor for each tonic.
    pub fn all() -> impl Iterator<Item = Self> {
        PitchClass::ALL.into_iter().flat_map(|tonic| {
            [Mode::Major, Mode::Minor]
                .into_iter()
                .map(move |mode| Self::new(tonic, mode))
        })
    }
}

impl fmt::Display for MusicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.tonic.name(), self.mode.abbreviation())
    }
}

impl FromStr for MusicalKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let (Some(tonic), Some(mode), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(Error::InvalidData(format!("invalid key: {s:?}")));
        };

        let tonic = PitchClass::parse(tonic)
            .ok_or_else(|| Error::InvalidData(format!("invalid tonic in key: {s:?}")))?;
        let mode = match mode.to_ascii_lowercase().as_str() {
            "maj" | "major" => Mode::Major,
            "min" | "minor" => Mode::Minor,
            _ => return Err(Error::InvalidData(format!("invalid mode in key: {s:?}"))),
        };

        Ok(Self { tonic, mode })
    }
}

impl TryFrom<String> for MusicalKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MusicalKey> for String {
    fn from(key: MusicalKey) -> Self {
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display() {
        let key = MusicalKey::new(PitchClass::FSharp, Mode::Minor);
        assert_eq!(key.to_string(), "F# min");
    }

    #[test]
    fn test_key_parse_variants() {
        let expected = MusicalKey::new(PitchClass::C, Mode::Major);
        assert_eq!("C maj".parse::<MusicalKey>().unwrap(), expected);
        assert_eq!("C Maj".parse::<MusicalKey>().unwrap(), expected);
        assert_eq!("c major".parse::<MusicalKey>().unwrap(), expected);
        assert_eq!(
            "C# minor".parse::<MusicalKey>().unwrap(),
            MusicalKey::new(PitchClass::CSharp, Mode::Minor)
        );
        assert_eq!(
            "Bb min".parse::<MusicalKey>().unwrap(),
            MusicalKey::new(PitchClass::ASharp, Mode::Minor)
        );
    }

    #[test]
    fn test_key_parse_rejects_garbage() {
        assert!("".parse::<MusicalKey>().is_err());
        assert!("H maj".parse::<MusicalKey>().is_err());
        assert!("C dorian".parse::<MusicalKey>().is_err());
        assert!("C maj extra".parse::<MusicalKey>().is_err());
    }

    #[test]
    fn test_all_keys() {
        let keys: Vec<_> = MusicalKey::all().collect();
        assert_eq!(keys.len(), 24);
        assert_eq!(keys[0].to_string(), "C maj");
        assert_eq!(keys[1].to_string(), "C min");
        assert_eq!(keys[23].to_string(), "B min");
    }

    #[test]
    fn test_pitch_class_wraps() {
        assert_eq!(PitchClass::from_index(12), PitchClass::C);
        assert_eq!(PitchClass::from_index(13).index(), 1);
    }
}
