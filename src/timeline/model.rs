use serde::{Deserialize, Serialize};

use crate::detect::sections::SectionLabel;

/// Body returned by `POST /api/analyze`
#[derive(Debug, Deserialize)]
pub struct AnalysisResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub tempo: f32,
    /// Raw section records; only the timeline is consumed
    #[serde(default)]
    pub sections: Vec<serde_json::Value>,
    #[serde(default)]
    pub visualization_timeline: Vec<Segment>,
    pub error: Option<String>,
}

/// One labeled span of the precomputed timeline
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(rename = "time")]
    pub start_time_seconds: f32,
    #[serde(rename = "section_type")]
    pub section: String,
    #[serde(default)]
    pub intensity: String,
    #[serde(default)]
    pub energy: f32,
    #[serde(rename = "brightness", default)]
    pub brightness_hz: f32,
    #[serde(rename = "shader_index", default)]
    pub visual_hint: u32,
}

impl Segment {
    /// The live style label this segment maps to, if the service used a known one.
    pub fn label(&self) -> Option<SectionLabel> {
        self.section.parse().ok()
    }
}

/// Segments ordered by start time
#[derive(Clone, Debug, Default)]
pub struct Timeline {
    pub tempo: f32,
    segments: Vec<Segment>,
}

impl Timeline {
    pub fn new(tempo: f32, mut segments: Vec<Segment>) -> Self {
        segments.sort_by(|a, b| a.start_time_seconds.total_cmp(&b.start_time_seconds));
        Self { tempo, segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Index of the segment active at `time_seconds`.
    pub fn index_at(&self, time_seconds: f32) -> Option<usize> {
        let after = self
            .segments
            .partition_point(|s| s.start_time_seconds <= time_seconds);
        after.checked_sub(1)
    }
}

impl From<AnalysisResponse> for Timeline {
    fn from(response: AnalysisResponse) -> Self {
        Timeline::new(response.tempo, response.visualization_timeline)
    }
}
