use serde::Serialize;

use super::decision::global_change;
use super::history::{FeatureStats, RollingHistory};
use crate::audio::features::FeatureFrame;
use crate::config::{
    DriftConfig, InstrumentConfig, InstrumentThresholds, RoleChange, RoleChangeWeights,
};

/// Coarse instrument roles inferred from fine-band energy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Kick,
    Bassline,
    Snare,
    Hihat,
    Cymbal,
    Vocals,
    Guitar,
    Synth,
}

impl Role {
    pub const ALL: [Role; 8] = [
        Role::Kick,
        Role::Bassline,
        Role::Snare,
        Role::Hihat,
        Role::Cymbal,
        Role::Vocals,
        Role::Guitar,
        Role::Synth,
    ];
}

/// Which roles are audible in one frame
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct InstrumentationState {
    pub kick: bool,
    pub bassline: bool,
    pub snare: bool,
    pub hihat: bool,
    pub cymbal: bool,
    pub vocals: bool,
    pub guitar: bool,
    pub synth: bool,
    pub timestamp_ms: u64,
}

impl InstrumentationState {
    pub fn has(&self, role: Role) -> bool {
        match role {
            Role::Kick => self.kick,
            Role::Bassline => self.bassline,
            Role::Snare => self.snare,
            Role::Hihat => self.hihat,
            Role::Cymbal => self.cymbal,
            Role::Vocals => self.vocals,
            Role::Guitar => self.guitar,
            Role::Synth => self.synth,
        }
    }

    pub fn active_roles(&self) -> Vec<Role> {
        Role::ALL.into_iter().filter(|r| self.has(*r)).collect()
    }
}

/// Presence per role from fixed band thresholds. Snare, guitar and synth
/// read the fine 15-25% band, not the coarse mid.
pub fn classify(frame: &FeatureFrame, t: &InstrumentThresholds) -> InstrumentationState {
    InstrumentationState {
        kick: frame.sub_bass > t.kick_sub_bass && frame.bass > t.kick_bass,
        bassline: frame.bass > t.bassline_bass && frame.low_mid > t.bassline_low_mid,
        snare: frame.mid_band > t.snare_mid && frame.presence > t.snare_presence,
        hihat: frame.brilliance > t.hihat_brilliance || frame.air > t.hihat_air,
        cymbal: frame.presence > t.cymbal_presence && frame.brilliance > t.cymbal_brilliance,
        vocals: frame.high_mid > t.vocals_high_mid
            && frame.presence > t.vocals_presence
            && frame.centroid > t.vocals_centroid,
        guitar: frame.mid_band > t.guitar_mid && frame.high_mid > t.guitar_high_mid,
        synth: frame.low_mid > t.synth_low_mid && frame.mid_band > t.synth_mid,
        timestamp_ms: frame.timestamp_ms,
    }
}

impl RoleChangeWeights {
    pub fn for_role(&self, role: Role) -> RoleChange {
        match role {
            Role::Kick => self.kick,
            Role::Bassline => self.bassline,
            Role::Snare => self.snare,
            Role::Hihat => self.hihat,
            Role::Cymbal => self.cymbal,
            Role::Vocals => self.vocals,
            Role::Guitar => self.guitar,
            Role::Synth => self.synth,
        }
    }
}

/// Outcome of comparing the oldest and newest instrumentation in the window
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct InstrumentationChange {
    pub changed: bool,
    /// Weighted sum over roles whose presence rate moved past their threshold
    pub score: f32,
    /// Global spectral drift over the same two half-windows
    pub drift: f32,
}

pub struct InstrumentationDetector {
    config: InstrumentConfig,
    history: RollingHistory<InstrumentationState>,
}

impl InstrumentationDetector {
    pub fn new(config: InstrumentConfig, capacity: usize) -> Self {
        Self {
            config,
            history: RollingHistory::new(capacity),
        }
    }

    /// Classify and store one frame.
    pub fn observe(&mut self, frame: &FeatureFrame) -> InstrumentationState {
        let state = classify(frame, &self.config.presence);
        self.history.push(state);
        state
    }

    /// Score the change between the first and last `half_window` states, gated
    /// on spectral drift in `window` over the same frames.
    pub fn detect_change(
        &self,
        window: &RollingHistory<FeatureFrame>,
        drift: &DriftConfig,
    ) -> InstrumentationChange {
        let min = self.config.min_states;
        if self.history.len() < min || window.len() < min {
            return InstrumentationChange::default();
        }

        let half = self.config.half_window;
        let before = presence_rates(&self.history.first_n(half));
        let after = presence_rates(&self.history.last_n(half));

        let score: f32 = Role::ALL
            .iter()
            .enumerate()
            .filter_map(|(i, role)| {
                let rule = self.config.change.for_role(*role);
                ((after[i] - before[i]).abs() > rule.threshold).then_some(rule.weight)
            })
            .sum();

        let first = FeatureStats::of(&window.first_n(half));
        let last = FeatureStats::of(&window.last_n(half));
        let spread = FeatureStats::of(&window.last_n(min));
        let drift_score = global_change(&first.mean, &last.mean, &spread.std_dev, drift);

        InstrumentationChange {
            changed: score > self.config.score_threshold && drift_score > self.config.drift_threshold,
            score,
            drift: drift_score,
        }
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}

/// Fraction of states in which each role (in `Role::ALL` order) is present.
fn presence_rates(states: &[InstrumentationState]) -> [f32; 8] {
    let mut rates = [0.0f32; 8];
    if states.is_empty() {
        return rates;
    }
    for state in states {
        for (i, role) in Role::ALL.iter().enumerate() {
            if state.has(*role) {
                rates[i] += 1.0;
            }
        }
    }
    let n = states.len() as f32;
    rates.iter_mut().for_each(|r| *r /= n);
    rates
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A frame with every fine band and the coarse bands set to `level`.
    fn flat(level: f32, centroid: f32, ts: u64) -> FeatureFrame {
        FeatureFrame {
            energy: level,
            centroid,
            low: level,
            mid: level,
            high: level,
            sub_bass: level,
            bass: level,
            low_mid: level,
            mid_band: level,
            high_mid: level,
            presence: level,
            brilliance: level,
            air: level,
            sparkle: level,
            ultra: level,
            timestamp_ms: ts,
            ..FeatureFrame::default()
        }
    }

    #[test]
    fn silent_frame_has_no_roles() {
        let state = classify(&FeatureFrame::silent(5), &InstrumentThresholds::default());
        assert!(state.active_roles().is_empty());
        assert_eq!(state.timestamp_ms, 5);
    }

    #[test]
    fn kick_needs_sub_bass_and_bass() {
        let t = InstrumentThresholds::default();
        let mut frame = FeatureFrame { sub_bass: 0.5, bass: 0.1, ..FeatureFrame::default() };
        assert!(!classify(&frame, &t).kick);
        frame.bass = 0.3;
        let state = classify(&frame, &t);
        assert!(state.kick);
        assert!(!state.bassline);
    }

    #[test]
    fn hihat_is_either_band() {
        let t = InstrumentThresholds::default();
        let air_only = FeatureFrame { air: 0.13, ..FeatureFrame::default() };
        assert_eq!(classify(&air_only, &t).active_roles(), vec![Role::Hihat]);
    }

    #[test]
    fn vocals_need_bright_centroid() {
        let t = InstrumentThresholds::default();
        let mut frame = flat(0.31, 0.2, 0);
        assert!(!classify(&frame, &t).vocals);
        frame.centroid = 0.5;
        assert!(classify(&frame, &t).vocals);
        assert_eq!(classify(&frame, &t).active_roles().len(), 8);
    }

    #[test]
    fn thresholds_are_strict() {
        let t = InstrumentThresholds::default();
        // sub_bass sits exactly on the kick threshold
        let state = classify(&flat(0.3, 0.5, 0), &t);
        assert!(!state.kick);
        assert_eq!(state.active_roles().len(), 7);
    }

    #[test]
    fn needs_sixty_states() {
        let mut det = InstrumentationDetector::new(InstrumentConfig::default(), 120);
        let mut window = RollingHistory::new(120);
        for i in 0..59 {
            let frame = if i < 30 { flat(0.0, 0.1, i) } else { flat(0.5, 0.6, i) };
            det.observe(&frame);
            window.push(frame);
        }
        let change = det.detect_change(&window, &DriftConfig::default());
        assert_eq!(change, InstrumentationChange::default());
    }

    #[test]
    fn full_band_entry_is_a_change() {
        let mut det = InstrumentationDetector::new(InstrumentConfig::default(), 120);
        let mut window = RollingHistory::new(120);
        for i in 0..60 {
            let frame = if i < 30 { flat(0.01, 0.1, i * 16) } else { flat(0.5, 0.6, i * 16) };
            det.observe(&frame);
            window.push(frame);
        }
        let change = det.detect_change(&window, &DriftConfig::default());
        // Every role flips from absent to present
        assert!((change.score - 16.8).abs() < 1e-4);
        assert!(change.drift > 1.18);
        assert!(change.changed);
    }

    #[test]
    fn steady_instrumentation_is_not_a_change() {
        let mut det = InstrumentationDetector::new(InstrumentConfig::default(), 120);
        let mut window = RollingHistory::new(120);
        for i in 0..120 {
            let frame = flat(0.4, 0.5, i * 16);
            det.observe(&frame);
            window.push(frame);
        }
        let change = det.detect_change(&window, &DriftConfig::default());
        assert_eq!(change.score, 0.0);
        assert!(!change.changed);
    }

    #[test]
    fn presence_rates_average_booleans() {
        let on = InstrumentationState { kick: true, synth: true, ..Default::default() };
        let off = InstrumentationState::default();
        let rates = presence_rates(&[on, off, on, off]);
        assert_eq!(rates[0], 0.5);
        assert_eq!(rates[7], 0.5);
        assert_eq!(rates[1], 0.0);
    }
}
