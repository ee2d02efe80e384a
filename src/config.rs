use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    /// Section label -> candidate visual ids
    #[serde(default)]
    pub styles: BTreeMap<String, Vec<u32>>,
}

/// Analyser emulation settings for the file-driven snapshot source
#[derive(Debug, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
    #[serde(default = "default_min_decibels")]
    pub min_decibels: f32,
    #[serde(default = "default_max_decibels")]
    pub max_decibels: f32,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzerConfig {
    /// Base URL of the offline analysis service; the timeline path is off when unset
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            fft_size: default_fft_size(),
            smoothing: default_smoothing(),
            min_decibels: default_min_decibels(),
            max_decibels: default_max_decibels(),
        }
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_fps() -> u32 { 60 }
fn default_fft_size() -> usize { 2048 }
fn default_smoothing() -> f32 { 0.6 }
fn default_min_decibels() -> f32 { -100.0 }
fn default_max_decibels() -> f32 { -30.0 }
fn default_timeout_secs() -> u64 { 120 }

/// Every tunable of the live detection engine. `Default` reproduces the
/// stock tuning; a `[detection]` table in the config file overrides any subset.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Frame rate the count-bounded buffers are sized for
    pub nominal_fps: f32,
    /// Short window for spectral drift and instrumentation change
    pub window_seconds: f32,
    /// Long baseline for section z-scores
    pub baseline_seconds: f32,
    /// Frames required in the short window before any decision can fire
    pub min_history_frames: usize,
    /// Minimum wall-clock time between two visual switches
    pub cooldown_ms: u64,
    pub beat: BeatConfig,
    pub silence: SilenceConfig,
    pub instruments: InstrumentConfig,
    pub drift: DriftConfig,
    pub sections: SectionConfig,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            nominal_fps: 60.0,
            window_seconds: 2.0,
            baseline_seconds: 5.0,
            min_history_frames: 60,
            cooldown_ms: 3000,
            beat: BeatConfig::default(),
            silence: SilenceConfig::default(),
            instruments: InstrumentConfig::default(),
            drift: DriftConfig::default(),
            sections: SectionConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct BeatConfig {
    /// Low-band samples kept for the adaptive threshold
    pub support_samples: usize,
    /// Samples needed before beats can fire
    pub min_samples: usize,
    pub threshold_floor: f32,
    /// Std-devs above the mean a beat must reach
    pub threshold_sigma: f32,
    pub min_interval_ms: u64,
    pub max_beats: usize,
    pub min_beats_for_tempo: usize,
    pub min_bpm: f32,
    pub max_bpm: f32,
    /// Estimate before the first accepted candidate
    pub prior_bpm: f32,
    pub bpm_history: usize,
    pub small_drift_bpm: f32,
    pub large_drift_bpm: f32,
    pub small_drift_weight: f32,
    pub medium_drift_weight: f32,
    /// Fall back to the last valid BPM after this long without an update
    pub stale_after_ms: u64,
    /// raw/last ratio ranges (exclusive) that trigger halving / doubling
    pub double_ratio: (f32, f32),
    pub half_ratio: (f32, f32),
}

impl Default for BeatConfig {
    fn default() -> Self {
        Self {
            support_samples: 120,
            min_samples: 30,
            threshold_floor: 0.15,
            threshold_sigma: 1.5,
            min_interval_ms: 300,
            max_beats: 16,
            min_beats_for_tempo: 8,
            min_bpm: 60.0,
            max_bpm: 200.0,
            prior_bpm: 120.0,
            bpm_history: 10,
            small_drift_bpm: 10.0,
            large_drift_bpm: 30.0,
            small_drift_weight: 0.1,
            medium_drift_weight: 0.15,
            stale_after_ms: 5000,
            double_ratio: (1.8, 2.2),
            half_ratio: (0.45, 0.55),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SilenceConfig {
    pub energy_threshold: f32,
    /// Inclusive bounds on a silent span that counts as a transition. Both
    /// allow about one frame of clock jitter around 6..=20 frames at 60 Hz.
    pub min_silence_ms: u64,
    pub max_silence_ms: u64,
}

impl Default for SilenceConfig {
    fn default() -> Self {
        Self {
            energy_threshold: 0.03,
            min_silence_ms: 95,
            max_silence_ms: 340,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct InstrumentConfig {
    pub min_states: usize,
    /// States averaged at each end of the window
    pub half_window: usize,
    pub score_threshold: f32,
    pub drift_threshold: f32,
    pub presence: InstrumentThresholds,
    pub change: RoleChangeWeights,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            min_states: 60,
            half_window: 30,
            score_threshold: 3.4,
            drift_threshold: 1.18,
            presence: InstrumentThresholds::default(),
            change: RoleChangeWeights::default(),
        }
    }
}

/// Per-band presence thresholds. Heuristic and uncalibrated; tune freely.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct InstrumentThresholds {
    pub kick_sub_bass: f32,
    pub kick_bass: f32,
    pub bassline_bass: f32,
    pub bassline_low_mid: f32,
    pub snare_mid: f32,
    pub snare_presence: f32,
    pub hihat_brilliance: f32,
    pub hihat_air: f32,
    pub cymbal_presence: f32,
    pub cymbal_brilliance: f32,
    pub vocals_high_mid: f32,
    pub vocals_presence: f32,
    pub vocals_centroid: f32,
    pub guitar_mid: f32,
    pub guitar_high_mid: f32,
    pub synth_low_mid: f32,
    pub synth_mid: f32,
}

impl Default for InstrumentThresholds {
    fn default() -> Self {
        Self {
            kick_sub_bass: 0.30,
            kick_bass: 0.20,
            bassline_bass: 0.25,
            bassline_low_mid: 0.15,
            snare_mid: 0.25,
            snare_presence: 0.15,
            hihat_brilliance: 0.18,
            hihat_air: 0.12,
            cymbal_presence: 0.20,
            cymbal_brilliance: 0.15,
            vocals_high_mid: 0.20,
            vocals_presence: 0.18,
            vocals_centroid: 0.35,
            guitar_mid: 0.20,
            guitar_high_mid: 0.15,
            synth_low_mid: 0.18,
            synth_mid: 0.15,
        }
    }
}

/// Minimum presence-rate change for a role to count, and its score weight
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
pub struct RoleChange {
    pub threshold: f32,
    pub weight: f32,
}

impl RoleChange {
    const fn new(threshold: f32, weight: f32) -> Self {
        Self { threshold, weight }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct RoleChangeWeights {
    pub kick: RoleChange,
    pub bassline: RoleChange,
    pub snare: RoleChange,
    pub hihat: RoleChange,
    pub cymbal: RoleChange,
    pub vocals: RoleChange,
    pub guitar: RoleChange,
    pub synth: RoleChange,
}

impl Default for RoleChangeWeights {
    fn default() -> Self {
        Self {
            kick: RoleChange::new(0.25, 3.5),
            bassline: RoleChange::new(0.25, 3.5),
            snare: RoleChange::new(0.40, 1.5),
            hihat: RoleChange::new(0.35, 0.8),
            cymbal: RoleChange::new(0.25, 1.0),
            vocals: RoleChange::new(0.25, 3.0),
            guitar: RoleChange::new(0.25, 2.0),
            synth: RoleChange::new(0.25, 1.5),
        }
    }
}

/// Spectral-drift scoring shared by the decision engine and the
/// instrumentation detector
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct DriftConfig {
    pub energy_weight: f32,
    pub centroid_weight: f32,
    pub low_weight: f32,
    pub mid_weight: f32,
    pub high_weight: f32,
    /// Floor on every std-dev denominator
    pub min_std_dev: f32,
    pub spike_threshold: f32,
    /// Average std-dev below which the window counts as quiet
    pub quiet_std_dev: f32,
    pub quiet_threshold: f32,
    pub busy_threshold: f32,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            energy_weight: 0.25,
            centroid_weight: 0.20,
            low_weight: 0.20,
            mid_weight: 0.20,
            high_weight: 0.15,
            min_std_dev: 0.01,
            spike_threshold: 2.0,
            quiet_std_dev: 0.1,
            quiet_threshold: 1.18,
            busy_threshold: 1.75,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SectionConfig {
    pub cooldown_ms: u64,
    /// Deviations (in baseline std-devs) that trigger a reclassification
    pub energy_sigma: f32,
    pub centroid_sigma: f32,
    pub drop: DropRule,
    pub buildup: BuildupRule,
    pub chorus: ChorusRule,
    pub breakdown: BreakdownRule,
    pub verse: VerseRule,
    pub bridge: BridgeRule,
    /// Below this energy an unmatched frame is intro (if still in the intro) or outro
    pub quiet_energy: f32,
}

impl Default for SectionConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 2000,
            energy_sigma: 2.0,
            centroid_sigma: 1.5,
            drop: DropRule::default(),
            buildup: BuildupRule::default(),
            chorus: ChorusRule::default(),
            breakdown: BreakdownRule::default(),
            verse: VerseRule::default(),
            bridge: BridgeRule::default(),
            quiet_energy: 0.04,
        }
    }
}

/// Loud, bass-heavy and well above the baseline
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct DropRule {
    pub min_energy: f32,
    /// Share of low band in low + mid + high
    pub min_low_ratio: f32,
    pub min_energy_sigma: f32,
}

impl Default for DropRule {
    fn default() -> Self {
        Self { min_energy: 0.15, min_low_ratio: 0.5, min_energy_sigma: 2.5 }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct BuildupRule {
    pub min_energy_sigma: f32,
    pub min_centroid_sigma: f32,
    pub min_energy: f32,
}

impl Default for BuildupRule {
    fn default() -> Self {
        Self { min_energy_sigma: 1.5, min_centroid_sigma: 1.0, min_energy: 0.08 }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ChorusRule {
    /// Exclusive energy range
    pub energy: (f32, f32),
    pub min_centroid: f32,
}

impl Default for ChorusRule {
    fn default() -> Self {
        Self { energy: (0.10, 0.15), min_centroid: 0.3 }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakdownRule {
    /// Negative: how far below the baseline energy must fall
    pub max_energy_sigma: f32,
    pub max_energy: f32,
}

impl Default for BreakdownRule {
    fn default() -> Self {
        Self { max_energy_sigma: -2.0, max_energy: 0.05 }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct VerseRule {
    /// Exclusive energy range
    pub energy: (f32, f32),
    pub max_abs_energy_sigma: f32,
}

impl Default for VerseRule {
    fn default() -> Self {
        Self { energy: (0.04, 0.10), max_abs_energy_sigma: 1.0 }
    }
}

/// Timbre moves while loudness holds
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct BridgeRule {
    pub min_abs_centroid_sigma: f32,
    pub max_abs_energy_sigma: f32,
}

impl Default for BridgeRule {
    fn default() -> Self {
        Self { min_abs_centroid_sigma: 1.5, max_abs_energy_sigma: 1.0 }
    }
}

/// Explicit path, else `./vizcue.toml`, else the user's config directories.
pub fn discover_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("vizcue.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("vizcue").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("vizcue").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    use anyhow::Context;
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Invalid config: {}", path.display()))
}
