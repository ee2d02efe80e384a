use serde::Serialize;

use super::beat::BeatTracker;
use super::decision::{ChangeDecisionEngine, Decision, Signals};
use super::history::RollingStatistics;
use super::instruments::{InstrumentationDetector, InstrumentationState};
use super::sections::{SectionClassifier, SectionLabel, SectionTransition};
use super::silence::SilenceTransitionDetector;
use crate::audio::features::{extract, FeatureFrame, FrequencySnapshot};
use crate::config::DetectionConfig;

/// Everything the renderer side gets for one frame
#[derive(Clone, Debug, Serialize)]
pub struct FrameReport {
    pub timestamp_ms: u64,
    pub features: FeatureFrame,
    pub instrumentation: InstrumentationState,
    pub bpm: f32,
    pub beat: bool,
    pub section: SectionLabel,
    pub section_transition: Option<SectionTransition>,
    pub decision: Decision,
}

/// Per-session owner of every detector. Build one per session and feed it
/// one snapshot per animation frame.
pub struct MusicChangeDetector {
    stats: RollingStatistics,
    beat: BeatTracker,
    instruments: InstrumentationDetector,
    silence: SilenceTransitionDetector,
    sections: SectionClassifier,
    engine: ChangeDecisionEngine,
    frames_seen: u64,
}

impl MusicChangeDetector {
    pub fn new(config: DetectionConfig) -> Self {
        let stats = RollingStatistics::new(
            config.baseline_seconds,
            config.window_seconds,
            config.nominal_fps,
        );
        let window_capacity = stats.window.capacity();
        Self {
            beat: BeatTracker::new(config.beat.clone()),
            instruments: InstrumentationDetector::new(config.instruments.clone(), window_capacity),
            silence: SilenceTransitionDetector::new(config.silence.clone()),
            sections: SectionClassifier::new(config.sections.clone()),
            engine: ChangeDecisionEngine::new(&config),
            stats,
            frames_seen: 0,
        }
    }

    pub fn process(&mut self, snapshot: &FrequencySnapshot) -> FrameReport {
        self.ingest(extract(snapshot))
    }

    /// Run every detector on one frame, then decide whether to switch.
    pub fn ingest(&mut self, frame: FeatureFrame) -> FrameReport {
        let now = frame.timestamp_ms;
        self.frames_seen += 1;

        self.stats.push(frame);
        let instrumentation = self.instruments.observe(&frame);
        let silence_ended_ms = self
            .silence
            .on_frame(frame.energy, now)
            .then(|| self.silence.last_span_ms().unwrap_or_default());
        let beat = self.beat.on_frame(frame.low, now);
        let section_transition = self.sections.on_frame(&frame, &self.stats.baseline);

        let signals = Signals {
            window: &self.stats.window,
            silence_ended_ms,
            instruments: &self.instruments,
        };
        let decision = self.engine.should_change_visual(now, &signals);
        if decision.switch {
            log::debug!(
                "Switch decided over {}ms of history ({} frames)",
                self.stats.window.span_ms(),
                self.stats.window.len()
            );
        }

        FrameReport {
            timestamp_ms: now,
            features: frame,
            instrumentation,
            bpm: self.beat.estimated_bpm(),
            beat,
            section: self.sections.current(),
            section_transition,
            decision,
        }
    }

    pub fn estimated_bpm(&self) -> f32 {
        self.beat.estimated_bpm()
    }

    pub fn current_section(&self) -> SectionLabel {
        self.sections.current()
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    /// Clear transient state between sessions. Safe to call repeatedly; the
    /// tempo estimate survives.
    pub fn reset(&mut self) {
        self.stats.clear();
        self.beat.reset();
        self.instruments.reset();
        self.silence.reset();
        self.sections.reset();
        self.engine.reset();
        self.frames_seen = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::decision::{ChangeReason, EngineState};

    fn ts(i: u64) -> u64 {
        i * 1000 / 60
    }

    fn frame(energy: f32, centroid: f32, band: f32, i: u64) -> FeatureFrame {
        FeatureFrame {
            energy,
            centroid,
            low: band,
            mid: band,
            high: band,
            timestamp_ms: ts(i),
            ..FeatureFrame::default()
        }
    }

    #[test]
    fn step_change_switches_once_window_allows() {
        let mut det = MusicChangeDetector::new(DetectionConfig::default());
        let mut switches = Vec::new();
        for i in 0..120u64 {
            let f = if i < 60 { frame(0.02, 0.1, 0.05, i) } else { frame(0.3, 0.6, 0.4, i) };
            let report = det.ingest(f);
            if i < 59 {
                assert_eq!(report.decision.state, EngineState::WarmingUp);
            }
            if report.decision.switch {
                switches.push((i, report.decision.reason));
            }
        }
        assert_eq!(switches.len(), 1, "{:?}", switches);
        let (at, reason) = switches[0];
        assert!(at >= 60 && at < 120);
        assert!(matches!(reason, Some(ChangeReason::SpectralDrift { .. })));
    }

    #[test]
    fn empty_snapshots_are_silence() {
        let mut det = MusicChangeDetector::new(DetectionConfig::default());
        for i in 0..200u64 {
            let report = det.process(&FrequencySnapshot::new(Vec::new(), ts(i)));
            assert_eq!(report.features, FeatureFrame::silent(ts(i)));
            assert!(!report.decision.switch);
            assert!(!report.beat);
        }
        assert_eq!(det.stats.window.len(), 120);
        assert_eq!(det.estimated_bpm(), 120.0);
    }

    #[test]
    fn short_gap_switches_visual() {
        let mut det = MusicChangeDetector::new(DetectionConfig::default());
        let mut i = 0;
        for _ in 0..90 {
            assert!(!det.ingest(frame(0.3, 0.4, 0.3, i)).decision.switch);
            i += 1;
        }
        for _ in 0..10 {
            det.ingest(frame(0.0, 0.0, 0.0, i));
            i += 1;
        }
        let report = det.ingest(frame(0.3, 0.4, 0.3, i));
        assert!(report.decision.switch);
        assert_eq!(
            report.decision.reason,
            Some(ChangeReason::SilenceTransition { silent_ms: 166 })
        );
    }

    #[test]
    fn switches_respect_cooldown_under_chaos() {
        let mut det = MusicChangeDetector::new(DetectionConfig::default());
        let mut last: Option<u64> = None;
        for i in 0..1800u64 {
            // Flip between extremes every 40 frames
            let loud = (i / 40) % 2 == 0;
            let f = if loud { frame(0.9, 0.9, 0.9, i) } else { frame(0.0, 0.0, 0.0, i) };
            let report = det.ingest(f);
            if report.decision.switch {
                if let Some(prev) = last {
                    assert!(report.timestamp_ms - prev >= 3000);
                }
                last = Some(report.timestamp_ms);
            }
        }
        assert!(last.is_some());
    }

    #[test]
    fn reset_is_idempotent_and_keeps_tempo() {
        let mut det = MusicChangeDetector::new(DetectionConfig::default());
        // 400ms kick pulses for 12s
        for i in 0..720u64 {
            let t = ts(i);
            let low = if i > 0 && i % 24 == 0 { 0.8 } else { 0.1 };
            det.ingest(FeatureFrame { low, energy: 0.2, timestamp_ms: t, ..FeatureFrame::default() });
        }
        let bpm = det.estimated_bpm();
        assert!((bpm - 150.0).abs() <= 2.0, "bpm {}", bpm);

        det.reset();
        let once = (det.stats.window.len(), det.frames_seen(), det.current_section(), det.estimated_bpm());
        det.reset();
        let twice = (det.stats.window.len(), det.frames_seen(), det.current_section(), det.estimated_bpm());
        assert_eq!(once, twice);
        assert_eq!(once, (0, 0, SectionLabel::Intro, bpm));
    }
}
