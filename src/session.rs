use crate::audio::source::AudioFeatureSource;
use crate::config::DetectionConfig;
use crate::cues::{CueSheet, LiveCue, TimelineCue};
use crate::detect::detector::{FrameReport, MusicChangeDetector};
use crate::styles::{StylePicker, VisualPair};
use crate::timeline::cursor::TimelineCursor;
use crate::timeline::model::Timeline;

/// One playback session: pulls a snapshot per frame from the source, runs the
/// detector and picks new visuals whenever it says so.
pub struct VisualSession<S: AudioFeatureSource> {
    source: S,
    detector: MusicChangeDetector,
    picker: StylePicker,
    timeline: Option<TimelineCursor>,
    cues: CueSheet,
    visual: Option<VisualPair>,
    running: bool,
}

impl<S: AudioFeatureSource> VisualSession<S> {
    pub fn new(source: S, config: DetectionConfig, picker: StylePicker, cues: CueSheet) -> Self {
        Self {
            source,
            detector: MusicChangeDetector::new(config),
            picker,
            timeline: None,
            cues,
            visual: None,
            running: false,
        }
    }

    /// Follow a precomputed timeline alongside live detection.
    pub fn with_timeline(mut self, timeline: Timeline) -> Self {
        self.timeline = Some(TimelineCursor::new(timeline));
        self
    }

    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        let section = self.detector.current_section();
        let visual = self.picker.pick(section);
        self.visual = Some(visual);
        log::info!(
            "Session started: {} bins per frame, opening on {}/{} ({})",
            self.source.bin_count(),
            visual.sharp,
            visual.blurred,
            section
        );
    }

    pub fn stop(&mut self) {
        if self.running {
            self.running = false;
            log::info!(
                "Session stopped after {} frames, tempo {:.0} BPM",
                self.detector.frames_seen(),
                self.detector.estimated_bpm()
            );
        }
    }

    /// Stop, rewind the source and clear every transient buffer. The tempo
    /// estimate carries over to the next session.
    #[allow(dead_code)]
    pub fn reset(&mut self) {
        self.stop();
        self.detector.reset();
        self.source.rewind();
        if let Some(cursor) = self.timeline.as_mut() {
            cursor.rewind();
        }
        self.cues.clear();
        self.visual = None;
    }

    /// Process one frame. `None` when stopped or once the source runs dry.
    pub fn step(&mut self) -> Option<FrameReport> {
        if !self.running {
            return None;
        }
        let Some(snapshot) = self.source.current_snapshot() else {
            self.stop();
            return None;
        };

        let report = self.detector.process(&snapshot);
        self.cues.tally_frame(report.section, report.bpm);

        if let Some(transition) = &report.section_transition {
            log::debug!(
                "Section {} -> {} (energy dev {:.2}, centroid dev {:.2})",
                transition.from,
                transition.to,
                transition.energy_deviation,
                transition.centroid_deviation
            );
        }

        if let Some(reason) = report.decision.reason.filter(|_| report.decision.switch) {
            let visual = self.picker.pick(report.section);
            log::info!(
                "Visual switch at {:.2}s: {} | BPM {:.0} | {} -> {}/{}",
                report.timestamp_ms as f32 / 1000.0,
                reason,
                report.bpm,
                report.section,
                visual.sharp,
                visual.blurred
            );
            log::debug!("Active roles: {:?}", report.instrumentation.active_roles());
            self.visual = Some(visual);
            self.cues.record_live(LiveCue {
                timestamp_ms: report.timestamp_ms,
                reason,
                section: report.section,
                bpm: report.bpm,
                visual,
            });
        }

        if let Some(cursor) = self.timeline.as_mut() {
            let t = report.timestamp_ms as f32 / 1000.0;
            if let Some((index, segment)) = cursor.advance(t) {
                let cue = TimelineCue::from_segment(index, segment);
                log::info!(
                    "Timeline segment {} at {:.2}s: {} ({}), visual {}",
                    index,
                    cue.time_seconds,
                    cue.section,
                    cue.intensity,
                    cue.visual_hint
                );
                if cue.label.is_none() {
                    log::debug!("Timeline section '{}' has no live style", cue.section);
                }
                self.cues.record_timeline(cue);
            }
        }

        Some(report)
    }

    /// Start and step until the source is exhausted or the session stops.
    /// Returns the number of frames processed.
    pub fn run(&mut self, mut on_frame: impl FnMut(&FrameReport)) -> usize {
        self.start();
        let mut frames = 0;
        while let Some(report) = self.step() {
            on_frame(&report);
            frames += 1;
        }
        frames
    }

    pub fn into_cues(self) -> CueSheet {
        self.cues
    }
}

/// Inspection for hosts that drive the session frame by frame
#[allow(dead_code)]
impl<S: AudioFeatureSource> VisualSession<S> {
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn visual(&self) -> Option<VisualPair> {
        self.visual
    }

    pub fn detector(&self) -> &MusicChangeDetector {
        &self.detector
    }

    pub fn cues(&self) -> &CueSheet {
        &self.cues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::features::FrequencySnapshot;
    use crate::detect::decision::ChangeReason;
    use crate::detect::sections::SectionLabel;
    use crate::styles::StyleMap;
    use crate::timeline::model::Segment;

    struct SyntheticSource {
        frames: Vec<FrequencySnapshot>,
        cursor: usize,
    }

    impl SyntheticSource {
        /// One snapshot per level at 60 Hz, every bin set to that level
        fn from_levels(levels: &[u8]) -> Self {
            let frames = levels
                .iter()
                .enumerate()
                .map(|(i, &level)| FrequencySnapshot::new(vec![level; 1024], i as u64 * 1000 / 60))
                .collect();
            Self { frames, cursor: 0 }
        }
    }

    impl AudioFeatureSource for SyntheticSource {
        fn current_snapshot(&mut self) -> Option<FrequencySnapshot> {
            let snapshot = self.frames.get(self.cursor)?.clone();
            self.cursor += 1;
            Some(snapshot)
        }

        fn bin_count(&self) -> usize {
            1024
        }

        fn rewind(&mut self) {
            self.cursor = 0;
        }
    }

    fn session(levels: &[u8]) -> VisualSession<SyntheticSource> {
        VisualSession::new(
            SyntheticSource::from_levels(levels),
            DetectionConfig::default(),
            StylePicker::new(StyleMap::default(), Some(1)),
            CueSheet::new(None, 60, 1024),
        )
    }

    fn gap_levels() -> Vec<u8> {
        let mut levels = vec![100u8; 90];
        levels.extend([0u8; 10]);
        levels.extend([100u8; 200]);
        levels
    }

    #[test]
    fn short_gap_records_silence_cue() {
        let mut s = session(&gap_levels());
        let frames = s.run(|_| {});
        assert_eq!(frames, 300);
        assert!(!s.is_running());

        let live = &s.cues().live;
        assert!(!live.is_empty());
        assert_eq!(live[0].timestamp_ms, 1666);
        assert_eq!(live[0].reason, ChangeReason::SilenceTransition { silent_ms: 166 });
        assert_eq!(live[0].section, SectionLabel::Intro);
        let intro = StyleMap::default().candidates(SectionLabel::Intro).to_vec();
        assert!(intro.contains(&live[0].visual.sharp));
        assert_ne!(live[0].visual.sharp, live[0].visual.blurred);
        for pair in live.windows(2) {
            assert!(pair[1].timestamp_ms - pair[0].timestamp_ms >= 3000);
        }

        let summary = &s.cues().summary;
        assert_eq!(summary.frames, 300);
        assert_eq!(summary.switches.get("silence"), Some(&1));
        assert_eq!(s.visual(), Some(live[live.len() - 1].visual));
    }

    #[test]
    fn loudness_step_switches_once_per_cooldown() {
        let mut levels = vec![10u8; 60];
        levels.extend([100u8; 60]);
        let mut s = session(&levels);
        let mut switch_frames = Vec::new();
        let mut i = 0;
        s.run(|report| {
            if report.decision.switch {
                switch_frames.push(i);
            }
            i += 1;
        });
        assert_eq!(switch_frames.len(), 1, "{:?}", switch_frames);
        assert!(switch_frames[0] >= 60 && switch_frames[0] < 120);
        assert_eq!(s.cues().live.len(), 1);
    }

    #[test]
    fn steady_input_never_switches() {
        let mut s = session(&[80u8; 400]);
        s.run(|report| assert!(!report.decision.switch));
        assert!(s.cues().live.is_empty());
        assert_eq!(s.detector().frames_seen(), 400);
    }

    #[test]
    fn step_requires_start_and_stop_halts() {
        let mut s = session(&[50u8; 10]);
        assert!(s.step().is_none());
        assert!(s.visual().is_none());

        s.start();
        assert!(s.visual().is_some());
        assert!(s.step().is_some());
        assert!(s.step().is_some());
        s.stop();
        assert!(s.step().is_none());
        assert_eq!(s.detector().frames_seen(), 2);
    }

    #[test]
    fn reset_rewinds_and_clears() {
        let mut s = session(&gap_levels());
        s.run(|_| {});
        assert!(!s.cues().live.is_empty());

        s.reset();
        s.reset();
        assert!(s.cues().live.is_empty());
        assert_eq!(s.cues().summary.frames, 0);
        assert_eq!(s.detector().frames_seen(), 0);
        assert!(s.visual().is_none());

        // Same input replays to the same first cue
        assert_eq!(s.run(|_| {}), 300);
        assert_eq!(s.cues().live[0].timestamp_ms, 1666);
    }

    #[test]
    fn timeline_cues_follow_segments() {
        let segment = |start: f32, section: &str, hint: u32| Segment {
            start_time_seconds: start,
            section: section.to_string(),
            intensity: "medium".to_string(),
            energy: 0.1,
            brightness_hz: 2500.0,
            visual_hint: hint,
        };
        let timeline = Timeline::new(
            124.0,
            vec![segment(0.0, "intro", 1), segment(2.0, "verse", 4), segment(4.0, "chorus", 11)],
        );
        let mut s = session(&[60u8; 300]).with_timeline(timeline);
        s.run(|_| {});

        let cues = s.into_cues();
        let got: Vec<(usize, u32)> = cues.timeline.iter().map(|c| (c.index, c.visual_hint)).collect();
        assert_eq!(got, vec![(0, 1), (1, 4), (2, 11)]);
        assert_eq!(cues.timeline[2].section, "chorus");
        assert_eq!(cues.timeline[2].label, Some(SectionLabel::Chorus));
    }
}
