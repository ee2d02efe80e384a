use std::collections::VecDeque;

use super::history::{median, RollingHistory};
use crate::config::BeatConfig;

/// Low-band beat detector with a stabilized tempo estimate.
///
/// Beats fire when the low band rises above `max(floor, mean + k·σ)` of its
/// recent history. Tempo comes from the median inter-beat interval, corrected
/// for octave errors against the last valid estimate, then smoothed through a
/// median of recent candidates.
pub struct BeatTracker {
    config: BeatConfig,
    support: RollingHistory<f32>,
    beat_times: VecDeque<u64>,
    bpm_candidates: VecDeque<f32>,
    last_beat_ms: Option<u64>,
    last_bpm_update_ms: Option<u64>,
    has_estimate: bool,
    estimated_bpm: f32,
    last_valid_bpm: f32,
}

impl BeatTracker {
    pub fn new(config: BeatConfig) -> Self {
        Self {
            support: RollingHistory::new(config.support_samples),
            beat_times: VecDeque::with_capacity(config.max_beats + 1),
            bpm_candidates: VecDeque::with_capacity(config.bpm_history + 1),
            last_beat_ms: None,
            last_bpm_update_ms: None,
            has_estimate: false,
            estimated_bpm: config.prior_bpm,
            last_valid_bpm: config.prior_bpm,
            config,
        }
    }

    /// Feed one low-band sample. Returns true when a beat fired on this frame.
    pub fn on_frame(&mut self, low: f32, now_ms: u64) -> bool {
        self.support.push(low);

        // Anchor the staleness clock at the first frame of a session
        let last_update = *self.last_bpm_update_ms.get_or_insert(now_ms);

        let mut fired = false;
        if self.support.len() >= self.config.min_samples {
            let threshold = self.threshold();
            let spaced = self
                .last_beat_ms
                .map_or(true, |last| now_ms.saturating_sub(last) >= self.config.min_interval_ms);

            if low > threshold && spaced {
                fired = true;
                self.register_beat(now_ms);
            }
        }

        if !fired && now_ms.saturating_sub(last_update) > self.config.stale_after_ms {
            self.estimated_bpm = self.last_valid_bpm;
        }

        fired
    }

    /// Current adaptive threshold over the support buffer.
    pub fn threshold(&self) -> f32 {
        let mean = self.support.mean();
        let std_dev = self.support.std_dev();
        (mean + self.config.threshold_sigma * std_dev).max(self.config.threshold_floor)
    }

    fn register_beat(&mut self, now_ms: u64) {
        self.last_beat_ms = Some(now_ms);
        self.beat_times.push_back(now_ms);
        while self.beat_times.len() > self.config.max_beats {
            self.beat_times.pop_front();
        }

        log::debug!("Beat at {}ms ({} tracked)", now_ms, self.beat_times.len());

        if self.beat_times.len() < self.config.min_beats_for_tempo {
            return;
        }

        let intervals: Vec<f32> = self
            .beat_times
            .iter()
            .zip(self.beat_times.iter().skip(1))
            .map(|(a, b)| b.saturating_sub(*a) as f32)
            .collect();
        let median_interval = median(&intervals).max(1.0);
        let raw_bpm = 60_000.0 / median_interval;
        let candidate = self.correct_octave(raw_bpm);

        if candidate < self.config.min_bpm || candidate > self.config.max_bpm {
            log::debug!("Rejected tempo candidate {:.1} BPM (raw {:.1})", candidate, raw_bpm);
            return;
        }

        self.accept_candidate(candidate, now_ms);
    }

    fn correct_octave(&self, raw_bpm: f32) -> f32 {
        if self.last_valid_bpm <= 0.0 {
            return raw_bpm;
        }
        let ratio = raw_bpm / self.last_valid_bpm;
        let (double_lo, double_hi) = self.config.double_ratio;
        let (half_lo, half_hi) = self.config.half_ratio;
        if ratio > double_lo && ratio < double_hi {
            raw_bpm / 2.0
        } else if ratio > half_lo && ratio < half_hi {
            raw_bpm * 2.0
        } else {
            raw_bpm
        }
    }

    fn accept_candidate(&mut self, candidate: f32, now_ms: u64) {
        self.bpm_candidates.push_back(candidate);
        while self.bpm_candidates.len() > self.config.bpm_history {
            self.bpm_candidates.pop_front();
        }
        let candidates: Vec<f32> = self.bpm_candidates.iter().copied().collect();
        let median_bpm = median(&candidates);

        let drift = (median_bpm - self.estimated_bpm).abs();
        let next = if !self.has_estimate {
            median_bpm
        } else if drift < self.config.small_drift_bpm {
            let w = self.config.small_drift_weight;
            self.estimated_bpm * (1.0 - w) + median_bpm * w
        } else if drift < self.config.large_drift_bpm {
            let w = self.config.medium_drift_weight;
            self.estimated_bpm * (1.0 - w) + median_bpm * w
        } else {
            // Track change: snap
            median_bpm
        };

        self.estimated_bpm = next.round();
        self.last_valid_bpm = self.estimated_bpm;
        self.last_bpm_update_ms = Some(now_ms);
        self.has_estimate = true;

        log::debug!(
            "Tempo candidate {:.1} BPM accepted, median {:.1}, estimate {:.0}",
            candidate,
            median_bpm,
            self.estimated_bpm
        );
    }

    pub fn estimated_bpm(&self) -> f32 {
        self.estimated_bpm
    }

    /// Clear beat and support history. The tempo estimate and last valid BPM
    /// survive so a restarted session continues from the known tempo.
    pub fn reset(&mut self) {
        self.support.clear();
        self.beat_times.clear();
        self.bpm_candidates.clear();
        self.last_beat_ms = None;
        self.last_bpm_update_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEP_MS: u64 = 10;

    /// Low band at 0.1 with a 0.8 pulse every `period_ms`, starting after one period.
    fn feed_pulses(tracker: &mut BeatTracker, period_ms: u64, duration_ms: u64) -> usize {
        let mut beats = 0;
        let mut t = 0;
        while t <= duration_ms {
            let low = if t > 0 && t % period_ms == 0 { 0.8 } else { 0.1 };
            if tracker.on_frame(low, t) {
                beats += 1;
            }
            t += STEP_MS;
        }
        beats
    }

    #[test]
    fn starts_from_prior_tempo() {
        let tracker = BeatTracker::new(BeatConfig::default());
        assert_eq!(tracker.estimated_bpm(), 120.0);
        assert_eq!(tracker.last_valid_bpm, 120.0);
    }

    #[test]
    fn no_beats_before_support_buffer_warms_up() {
        let mut tracker = BeatTracker::new(BeatConfig::default());
        for i in 0..29 {
            assert!(!tracker.on_frame(0.9, i * 400));
        }
        assert_eq!(tracker.beat_times.len(), 0);
    }

    #[test]
    fn steady_500ms_pulses_converge_to_120() {
        let mut tracker = BeatTracker::new(BeatConfig::default());
        let beats = feed_pulses(&mut tracker, 500, 10_000);
        assert!(beats >= 8, "only {} beats", beats);
        assert!((tracker.estimated_bpm() - 120.0).abs() <= 2.0);
    }

    #[test]
    fn steady_400ms_pulses_converge_to_150() {
        let mut tracker = BeatTracker::new(BeatConfig::default());
        feed_pulses(&mut tracker, 400, 12_000);
        assert!((tracker.estimated_bpm() - 150.0).abs() <= 2.0);
    }

    #[test]
    fn pulses_inside_min_spacing_register_every_other() {
        let mut tracker = BeatTracker::new(BeatConfig::default());
        feed_pulses(&mut tracker, 250, 10_000);
        assert!(
            (tracker.estimated_bpm() - 120.0).abs() <= 2.0,
            "estimate {}",
            tracker.estimated_bpm()
        );
    }

    #[test]
    fn double_time_against_slow_prior_is_halved() {
        let config = BeatConfig { prior_bpm: 60.0, ..BeatConfig::default() };
        let mut tracker = BeatTracker::new(config);
        let beats = feed_pulses(&mut tracker, 500, 10_000);
        assert!(beats >= 8, "only {} beats", beats);
        // Raw 120 BPM is twice the prior, so every candidate folds to 60
        assert_eq!(tracker.estimated_bpm(), 60.0);
        assert_eq!(tracker.last_valid_bpm, 60.0);
    }

    #[test]
    fn octave_correction_halves_and_doubles() {
        let tracker = BeatTracker::new(BeatConfig::default());
        assert_eq!(tracker.correct_octave(240.0), 120.0);
        assert_eq!(tracker.correct_octave(60.0), 120.0);
        assert_eq!(tracker.correct_octave(150.0), 150.0);
    }

    #[test]
    fn beats_respect_minimum_spacing() {
        let mut tracker = BeatTracker::new(BeatConfig::default());
        for i in 0..40 {
            tracker.on_frame(0.1, i * STEP_MS);
        }
        assert!(tracker.on_frame(0.9, 400));
        assert!(!tracker.on_frame(0.9, 500));
        assert!(!tracker.on_frame(0.9, 699));
        assert!(tracker.on_frame(0.9, 700));
    }

    #[test]
    fn reset_keeps_tempo_continuity() {
        let mut tracker = BeatTracker::new(BeatConfig::default());
        feed_pulses(&mut tracker, 400, 12_000);
        let bpm = tracker.estimated_bpm();
        assert_ne!(bpm, 120.0);

        tracker.reset();
        tracker.reset();
        assert_eq!(tracker.beat_times.len(), 0);
        assert_eq!(tracker.last_beat_ms, None);
        assert_eq!(tracker.estimated_bpm(), bpm);
        assert_eq!(tracker.last_valid_bpm, bpm);
    }
}
