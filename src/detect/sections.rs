use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::history::RollingHistory;
use crate::audio::features::FeatureFrame;
use crate::config::SectionConfig;

/// Style hint handed to the renderer with every frame
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionLabel {
    #[default]
    Intro,
    Verse,
    Chorus,
    Drop,
    Buildup,
    Bridge,
    Breakdown,
    Outro,
}

impl SectionLabel {
    pub const ALL: [SectionLabel; 8] = [
        SectionLabel::Intro,
        SectionLabel::Verse,
        SectionLabel::Chorus,
        SectionLabel::Drop,
        SectionLabel::Buildup,
        SectionLabel::Bridge,
        SectionLabel::Breakdown,
        SectionLabel::Outro,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionLabel::Intro => "intro",
            SectionLabel::Verse => "verse",
            SectionLabel::Chorus => "chorus",
            SectionLabel::Drop => "drop",
            SectionLabel::Buildup => "buildup",
            SectionLabel::Bridge => "bridge",
            SectionLabel::Breakdown => "breakdown",
            SectionLabel::Outro => "outro",
        }
    }
}

impl fmt::Display for SectionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        SectionLabel::ALL
            .into_iter()
            .find(|label| label.as_str() == wanted)
            .ok_or_else(|| format!("Unknown section label: {}", s))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SectionTransition {
    pub from: SectionLabel,
    pub to: SectionLabel,
    /// Energy z-score against the baseline
    pub energy_deviation: f32,
    pub centroid_deviation: f32,
    pub timestamp_ms: u64,
}

/// Labels the current section from how far the newest frame sits outside
/// the long baseline.
pub struct SectionClassifier {
    config: SectionConfig,
    current: SectionLabel,
    last_transition_ms: Option<u64>,
}

impl SectionClassifier {
    pub fn new(config: SectionConfig) -> Self {
        Self {
            config,
            current: SectionLabel::Intro,
            last_transition_ms: None,
        }
    }

    pub fn current(&self) -> SectionLabel {
        self.current
    }

    /// `baseline` must already contain `frame`. Nothing happens until the
    /// baseline is full.
    pub fn on_frame(
        &mut self,
        frame: &FeatureFrame,
        baseline: &RollingHistory<FeatureFrame>,
    ) -> Option<SectionTransition> {
        if !baseline.is_full() {
            return None;
        }
        let now = frame.timestamp_ms;
        if self
            .last_transition_ms
            .is_some_and(|last| now.saturating_sub(last) < self.config.cooldown_ms)
        {
            return None;
        }

        let stats = baseline.summary();
        let energy_dev = deviation(frame.energy, stats.mean.energy, stats.std_dev.energy);
        let centroid_dev = deviation(frame.centroid, stats.mean.centroid, stats.std_dev.centroid);

        if energy_dev.abs() <= self.config.energy_sigma && centroid_dev.abs() <= self.config.centroid_sigma {
            return None;
        }

        self.last_transition_ms = Some(now);
        let from = self.current;
        let to = self.classify(frame, energy_dev, centroid_dev);
        self.current = to;

        log::debug!(
            "Section transition {} -> {} (energy {:.2}σ, centroid {:.2}σ)",
            from,
            to,
            energy_dev,
            centroid_dev
        );

        Some(SectionTransition {
            from,
            to,
            energy_deviation: energy_dev,
            centroid_deviation: centroid_dev,
            timestamp_ms: now,
        })
    }

    /// First matching rule wins.
    fn classify(&self, frame: &FeatureFrame, energy_dev: f32, centroid_dev: f32) -> SectionLabel {
        let c = &self.config;
        let energy = frame.energy;
        let low_ratio = frame.low / (frame.low + frame.mid + frame.high + 0.001);
        let within = |(lo, hi): (f32, f32)| energy > lo && energy < hi;

        if energy > c.drop.min_energy
            && low_ratio > c.drop.min_low_ratio
            && energy_dev > c.drop.min_energy_sigma
        {
            SectionLabel::Drop
        } else if energy_dev > c.buildup.min_energy_sigma
            && centroid_dev > c.buildup.min_centroid_sigma
            && energy > c.buildup.min_energy
        {
            SectionLabel::Buildup
        } else if within(c.chorus.energy) && frame.centroid > c.chorus.min_centroid {
            SectionLabel::Chorus
        } else if energy_dev < c.breakdown.max_energy_sigma && energy < c.breakdown.max_energy {
            SectionLabel::Breakdown
        } else if within(c.verse.energy) && energy_dev.abs() < c.verse.max_abs_energy_sigma {
            SectionLabel::Verse
        } else if centroid_dev.abs() > c.bridge.min_abs_centroid_sigma
            && energy_dev.abs() < c.bridge.max_abs_energy_sigma
        {
            SectionLabel::Bridge
        } else if energy < c.quiet_energy {
            if self.current == SectionLabel::Intro {
                SectionLabel::Intro
            } else {
                SectionLabel::Outro
            }
        } else {
            self.current
        }
    }

    pub fn reset(&mut self) {
        self.current = SectionLabel::Intro;
        self.last_transition_ms = None;
    }
}

fn deviation(value: f32, mean: f32, std_dev: f32) -> f32 {
    (value - mean) / (std_dev + 0.001)
}
