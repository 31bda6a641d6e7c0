use serde::{Deserialize, Serialize};
use std::fmt;

/// Mono PCM at a fixed sample rate, as produced by the decoder.
#[derive(Clone, Debug)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Pitch class, C = 0 through B = 11.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    #[serde(rename = "C#")]
    CSharp,
    D,
    #[serde(rename = "D#")]
    DSharp,
    E,
    F,
    #[serde(rename = "F#")]
    FSharp,
    G,
    #[serde(rename = "G#")]
    GSharp,
    A,
    #[serde(rename = "A#")]
    ASharp,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Wraps any index into the 12 pitch classes.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % 12]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        const NAMES: [&str; 12] = [
            "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
        ];
        NAMES[self.index()]
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    Major,
    Minor,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Major => f.write_str("Major"),
            Mode::Minor => f.write_str("Minor"),
        }
    }
}

/// Energy band. Ordering is Low < Medium < High.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Energy {
    Low,
    Medium,
    High,
}

impl fmt::Display for Energy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Energy::Low => f.write_str("Low"),
            Energy::Medium => f.write_str("Medium"),
            Energy::High => f.write_str("High"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Genre {
    #[serde(rename = "Future House")]
    FutureHouse,
    #[serde(rename = "Tech House")]
    TechHouse,
    #[serde(rename = "Bass House")]
    BassHouse,
    #[serde(rename = "Deep House")]
    DeepHouse,
    #[serde(rename = "Progressive House")]
    ProgressiveHouse,
    House,
}

impl Genre {
    pub const ALL: [Genre; 6] = [
        Genre::FutureHouse,
        Genre::TechHouse,
        Genre::BassHouse,
        Genre::DeepHouse,
        Genre::ProgressiveHouse,
        Genre::House,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Genre::FutureHouse => "Future House",
            Genre::TechHouse => "Tech House",
            Genre::BassHouse => "Bass House",
            Genre::DeepHouse => "Deep House",
            Genre::ProgressiveHouse => "Progressive House",
            Genre::House => "House",
        }
    }

    /// Lowercase, underscore-joined form used in cache keys and config tables.
    pub fn slug(self) -> String {
        self.label().to_lowercase().replace(' ', "_")
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Descriptors derived from one track. Built once, never updated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackFeatures {
    pub name: String,
    pub bpm: u32,
    pub key: PitchClass,
    pub mode: Mode,
    pub energy: Energy,
    pub genre: Genre,
}

impl TrackFeatures {
    pub fn new(
        name: impl Into<String>,
        bpm: u32,
        key: PitchClass,
        mode: Mode,
        energy: Energy,
        genre: Genre,
    ) -> Self {
        Self {
            name: name.into(),
            bpm,
            key,
            mode,
            energy,
            genre,
        }
    }

    /// Complete record substituted when a track cannot be analyzed.
    pub fn fallback(name: impl Into<String>) -> Self {
        Self::new(
            name,
            128,
            PitchClass::C,
            Mode::Major,
            Energy::Medium,
            Genre::House,
        )
    }

    /// "C Major" style label.
    pub fn key_label(&self) -> String {
        format!("{} {}", self.key, self.mode)
    }
}
