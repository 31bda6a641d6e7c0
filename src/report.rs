use serde::Serialize;
use std::fmt::Write;

use crate::audio::features::TrackFeatures;
use crate::youtube::keywords::KeywordStat;
use crate::youtube::similar::SimilarTrack;

/// Everything produced for one input file.
#[derive(Debug, Serialize)]
pub struct TrackReport {
    #[serde(flatten)]
    pub features: TrackFeatures,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similar: Option<Vec<SimilarTrack>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<KeywordStat>>,
}

impl TrackReport {
    pub fn new(features: TrackFeatures) -> Self {
        Self {
            features,
            similar: None,
            keywords: None,
        }
    }
}

pub fn render_text(report: &TrackReport) -> String {
    let f = &report.features;
    let mut out = String::new();
    let _ = writeln!(out, "{}", f.name);
    let _ = writeln!(out, "  BPM:    {}", f.bpm);
    let _ = writeln!(out, "  Key:    {}", f.key_label());
    let _ = writeln!(out, "  Energy: {}", f.energy);
    let _ = writeln!(out, "  Genre:  {}", f.genre);

    if let Some(ref tracks) = report.similar {
        let _ = writeln!(out, "  Similar tracks:");
        for t in tracks {
            let _ = write!(out, "    {} ({})", t.title, t.channel);
            if let Some(views) = t.views {
                let _ = write!(out, " - {} views", views);
            }
            let _ = writeln!(out, "\n      {}", t.url);
        }
    }
    if let Some(ref keywords) = report.keywords {
        let _ = writeln!(out, "  Keywords:");
        for k in keywords {
            let _ = writeln!(
                out,
                "    {:>5.1}  {:<32} {:<6} competition, ~{} searches/month",
                k.score, k.keyword, k.competition, k.monthly_searches
            );
        }
    }
    out
}
