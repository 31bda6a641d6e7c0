use super::features::{Energy, Genre};
use crate::config::{GenreConfig, GenreRule};

impl GenreRule {
    pub fn matches(&self, bpm: u32, energy: Energy, brightness_hz: f32) -> bool {
        if bpm < self.min_bpm || bpm > self.max_bpm {
            return false;
        }
        if let Some(required) = self.energy {
            if energy != required {
                return false;
            }
        }
        match self.min_brightness_hz {
            Some(min) => brightness_hz > min,
            None => true,
        }
    }
}

/// First matching rule wins; unmatched input falls through to the default label.
pub fn classify_genre(bpm: u32, energy: Energy, brightness_hz: f32, cfg: &GenreConfig) -> Genre {
    cfg.rules
        .iter()
        .find(|rule| rule.matches(bpm, energy, brightness_hz))
        .map(|rule| rule.genre)
        .unwrap_or(cfg.default)
}
