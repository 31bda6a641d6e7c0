pub mod analysis;
pub mod decode;
pub mod energy;
pub mod features;
pub mod genre;
pub mod hpss;
pub mod key;
pub mod spectrum;
pub mod tempo;
