use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::detect::decision::ChangeReason;
use crate::detect::sections::SectionLabel;
use crate::styles::VisualPair;
use crate::timeline::model::Segment;

/// A switch decided by the live engine
#[derive(Clone, Debug, Serialize)]
pub struct LiveCue {
    pub timestamp_ms: u64,
    pub reason: ChangeReason,
    pub section: SectionLabel,
    pub bpm: f32,
    pub visual: VisualPair,
}

/// A segment boundary crossed on the precomputed timeline
#[derive(Clone, Debug, Serialize)]
pub struct TimelineCue {
    pub time_seconds: f32,
    pub index: usize,
    pub section: String,
    /// `section` parsed as a live label; `None` for names the detector does not use
    pub label: Option<SectionLabel>,
    pub intensity: String,
    pub visual_hint: u32,
}

impl TimelineCue {
    pub fn from_segment(index: usize, segment: &Segment) -> Self {
        Self {
            time_seconds: segment.start_time_seconds,
            index,
            section: segment.section.clone(),
            label: segment.label(),
            intensity: segment.intensity.clone(),
            visual_hint: segment.visual_hint,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Summary {
    pub frames: u64,
    pub switches: BTreeMap<String, usize>,
    pub final_bpm: f32,
    /// Frames spent under each section label
    pub sections: BTreeMap<String, u64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CueSheet {
    pub input: Option<PathBuf>,
    pub fps: u32,
    pub bin_count: usize,
    pub live: Vec<LiveCue>,
    pub timeline: Vec<TimelineCue>,
    pub summary: Summary,
}

impl CueSheet {
    pub fn new(input: Option<PathBuf>, fps: u32, bin_count: usize) -> Self {
        Self {
            input,
            fps,
            bin_count,
            live: Vec::new(),
            timeline: Vec::new(),
            summary: Summary::default(),
        }
    }

    pub fn record_live(&mut self, cue: LiveCue) {
        *self
            .summary
            .switches
            .entry(cue.reason.name().to_string())
            .or_default() += 1;
        self.live.push(cue);
    }

    pub fn record_timeline(&mut self, cue: TimelineCue) {
        self.timeline.push(cue);
    }

    /// Per-frame bookkeeping for the summary.
    pub fn tally_frame(&mut self, section: SectionLabel, bpm: f32) {
        self.summary.frames += 1;
        *self
            .summary
            .sections
            .entry(section.as_str().to_string())
            .or_default() += 1;
        self.summary.final_bpm = bpm;
    }

    /// Drop recorded cues, keeping the header.
    pub fn clear(&mut self) {
        self.live.clear();
        self.timeline.clear();
        self.summary = Summary::default();
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize cue sheet")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write cue sheet: {}", path.display()))?;
        log::info!(
            "Cue sheet written to {} ({} live, {} timeline cues)",
            path.display(),
            self.live.len(),
            self.timeline.len()
        );
        Ok(())
    }
}
