use serde::Serialize;

use super::history::{FeatureStats, FeatureVector, RollingHistory};
use super::instruments::InstrumentationDetector;
use crate::audio::features::FeatureFrame;
use crate::config::{DetectionConfig, DriftConfig};

/// Where the engine stands before a frame is evaluated
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// A switch fired less than the cooldown ago
    Cooldown,
    /// Not enough history for trustworthy statistics
    WarmingUp,
    Armed,
}

/// The signal that justified a switch
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeReason {
    SilenceTransition { silent_ms: u64 },
    Instrumentation { score: f32, drift: f32 },
    SpectralDrift { global: f32, threshold: f32, spike: f32 },
}

impl std::fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeReason::SilenceTransition { silent_ms } => {
                write!(f, "silence transition ({}ms)", silent_ms)
            }
            ChangeReason::Instrumentation { score, drift } => {
                write!(f, "instrumentation (score={:.2}, drift={:.2})", score, drift)
            }
            ChangeReason::SpectralDrift { global, threshold, spike } => {
                write!(f, "spectral (global={:.2}, threshold={:.2}, spike={:.2})", global, threshold, spike)
            }
        }
    }
}

impl ChangeReason {
    pub fn name(&self) -> &'static str {
        match self {
            ChangeReason::SilenceTransition { .. } => "silence",
            ChangeReason::Instrumentation { .. } => "instrumentation",
            ChangeReason::SpectralDrift { .. } => "spectral",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Decision {
    pub switch: bool,
    pub reason: Option<ChangeReason>,
    /// State the frame was evaluated in
    pub state: EngineState,
}

impl Decision {
    fn hold(state: EngineState) -> Self {
        Self {
            switch: false,
            reason: None,
            state,
        }
    }
}

/// Per-frame inputs the engine fuses
pub struct Signals<'a> {
    pub window: &'a RollingHistory<FeatureFrame>,
    /// Span of a short silence that ended on this frame
    pub silence_ended_ms: Option<u64>,
    pub instruments: &'a InstrumentationDetector,
}

/// Three-way window comparison result
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SpectralDrift {
    pub global: f32,
    pub spike: f32,
    pub threshold: f32,
}

impl SpectralDrift {
    pub fn fired(&self, config: &DriftConfig) -> bool {
        self.global > self.threshold || self.spike > config.spike_threshold
    }
}

/// Weighted z-like distance between two per-feature means, each scaled by
/// `spread` floored at `min_std_dev`.
pub fn global_change(
    from: &FeatureVector,
    to: &FeatureVector,
    spread: &FeatureVector,
    config: &DriftConfig,
) -> f32 {
    let z = |a: f32, b: f32, s: f32| (b - a).abs() / s.max(config.min_std_dev);
    z(from.energy, to.energy, spread.energy) * config.energy_weight
        + z(from.centroid, to.centroid, spread.centroid) * config.centroid_weight
        + z(from.low, to.low, spread.low) * config.low_weight
        + z(from.mid, to.mid, spread.mid) * config.mid_weight
        + z(from.high, to.high, spread.high) * config.high_weight
}

/// Compare the first third of the window against the last (global drift)
/// and against the middle (energy spike).
pub fn spectral_drift(window: &RollingHistory<FeatureFrame>, config: &DriftConfig) -> SpectralDrift {
    let frames = window.to_vec();
    let third = frames.len() / 3;
    if third == 0 {
        return SpectralDrift::default();
    }

    let first = FeatureStats::of(&frames[..third]);
    let middle = FeatureStats::of(&frames[third..third * 2]);
    let last = FeatureStats::of(&frames[third * 2..]);
    let spread = FeatureStats::of(&frames).std_dev;

    let global = global_change(&first.mean, &last.mean, &spread, config);
    let spike = (middle.mean.energy - first.mean.energy).abs() / spread.energy.max(config.min_std_dev);
    let threshold = if spread.average() < config.quiet_std_dev {
        config.quiet_threshold
    } else {
        config.busy_threshold
    };

    SpectralDrift { global, spike, threshold }
}

/// Fuses silence, instrumentation and spectral signals into one switch
/// decision per frame, rate-limited by a wall-clock cooldown.
pub struct ChangeDecisionEngine {
    cooldown_ms: u64,
    min_history_frames: usize,
    drift: DriftConfig,
    last_change_ms: Option<u64>,
}

impl ChangeDecisionEngine {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            cooldown_ms: config.cooldown_ms,
            min_history_frames: config.min_history_frames,
            drift: config.drift.clone(),
            last_change_ms: None,
        }
    }

    pub fn state(&self, now_ms: u64, history_len: usize) -> EngineState {
        let cooling = self
            .last_change_ms
            .is_some_and(|last| now_ms.saturating_sub(last) < self.cooldown_ms);
        if cooling {
            EngineState::Cooldown
        } else if history_len < self.min_history_frames {
            EngineState::WarmingUp
        } else {
            EngineState::Armed
        }
    }

    /// First matching signal wins; a firing decision starts the cooldown.
    pub fn should_change_visual(&mut self, now_ms: u64, signals: &Signals<'_>) -> Decision {
        let state = self.state(now_ms, signals.window.len());
        if state != EngineState::Armed {
            return Decision::hold(state);
        }

        let reason = self.evaluate(signals);
        if reason.is_some() {
            self.last_change_ms = Some(now_ms);
        }
        Decision {
            switch: reason.is_some(),
            reason,
            state,
        }
    }

    fn evaluate(&self, signals: &Signals<'_>) -> Option<ChangeReason> {
        if let Some(silent_ms) = signals.silence_ended_ms {
            return Some(ChangeReason::SilenceTransition { silent_ms });
        }

        let change = signals.instruments.detect_change(signals.window, &self.drift);
        if change.changed {
            return Some(ChangeReason::Instrumentation {
                score: change.score,
                drift: change.drift,
            });
        }

        let drift = spectral_drift(signals.window, &self.drift);
        if drift.fired(&self.drift) {
            return Some(ChangeReason::SpectralDrift {
                global: drift.global,
                threshold: drift.threshold,
                spike: drift.spike,
            });
        }

        None
    }

    pub fn reset(&mut self) {
        self.last_change_ms = None;
    }
}
