use serde::Serialize;

/// Fraction of total magnitude below the rolloff bin
const ROLLOFF_FRACTION: f32 = 0.85;

/// Normalized bin-index edges of the coarse low/mid/high split
const LOW_EDGE: f64 = 0.15;
const MID_EDGE: f64 = 0.50;

/// Normalized bin-index ranges of the ten fine bands, in `FeatureFrame` order
const FINE_BANDS: [(f64, f64); 10] = [
    (0.00, 0.02), // sub bass
    (0.02, 0.08), // bass
    (0.08, 0.15), // low mid
    (0.15, 0.25), // mid
    (0.25, 0.35), // high mid
    (0.35, 0.50), // presence
    (0.50, 0.70), // brilliance
    (0.70, 0.85), // air
    (0.85, 0.95), // sparkle
    (0.95, 1.00), // ultra
];

/// One analyser read-out: byte magnitudes per frequency bin (0-255)
#[derive(Clone, Debug, Default)]
pub struct FrequencySnapshot {
    pub bins: Vec<u8>,
    /// Capture time in milliseconds on the session clock
    pub timestamp_ms: u64,
}

impl FrequencySnapshot {
    pub fn new(bins: Vec<u8>, timestamp_ms: u64) -> Self {
        Self { bins, timestamp_ms }
    }
}

/// Per-frame feature vector; every value is normalized to 0.0-1.0
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct FeatureFrame {
    /// RMS of the normalized magnitudes
    pub energy: f32,
    /// Spectral centroid as a fraction of the bin count
    pub centroid: f32,
    /// Bin fraction holding 85% of total magnitude
    pub rolloff: f32,
    /// Coarse bands
    pub low: f32,  // 0-15%
    pub mid: f32,  // 15-50%
    pub high: f32, // 50-100%
    /// Fine bands
    pub sub_bass: f32,   // 0-2%
    pub bass: f32,       // 2-8%
    pub low_mid: f32,    // 8-15%
    pub mid_band: f32,   // 15-25%
    pub high_mid: f32,   // 25-35%
    pub presence: f32,   // 35-50%
    pub brilliance: f32, // 50-70%
    pub air: f32,        // 70-85%
    pub sparkle: f32,    // 85-95%
    pub ultra: f32,      // 95-100%
    pub timestamp_ms: u64,
}

impl FeatureFrame {
    /// The frame produced for an empty or all-zero snapshot.
    pub fn silent(timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            ..Self::default()
        }
    }
}

/// Turn one snapshot into its feature frame. Never fails: an empty snapshot
/// yields `FeatureFrame::silent`.
pub fn extract(snapshot: &FrequencySnapshot) -> FeatureFrame {
    let bins = &snapshot.bins;
    let len = bins.len();
    if len == 0 {
        return FeatureFrame::silent(snapshot.timestamp_ms);
    }

    let norm = |v: u8| v as f32 / 255.0;

    let mut sum_squares = 0.0f32;
    let mut weighted_sum = 0.0f32;
    let mut total = 0.0f32;
    for (i, &v) in bins.iter().enumerate() {
        let mag = norm(v);
        sum_squares += mag * mag;
        weighted_sum += i as f32 * mag;
        total += mag;
    }

    let energy = (sum_squares / len as f32).sqrt();
    let centroid = if total > 0.0 {
        weighted_sum / total / len as f32
    } else {
        0.0
    };

    let rolloff = if total > 0.0 {
        let threshold = total * ROLLOFF_FRACTION;
        let mut cumulative = 0.0f32;
        bins.iter()
            .position(|&v| {
                cumulative += norm(v);
                cumulative >= threshold
            })
            .map_or(0.0, |i| i as f32 / len as f32)
    } else {
        0.0
    };

    // Edges in f64 so that e.g. 1000 * 0.95 lands on bin 950
    let band_mean = |start: f64, end: f64| -> f32 {
        let lo = (len as f64 * start).floor() as usize;
        let hi = ((len as f64 * end).floor() as usize).min(len);
        if hi <= lo {
            return 0.0;
        }
        let sum: f32 = bins[lo..hi].iter().map(|&v| norm(v)).sum();
        sum / (hi - lo).max(1) as f32
    };

    let fine: Vec<f32> = FINE_BANDS.iter().map(|&(s, e)| band_mean(s, e)).collect();

    FeatureFrame {
        energy,
        centroid,
        rolloff,
        low: band_mean(0.0, LOW_EDGE),
        mid: band_mean(LOW_EDGE, MID_EDGE),
        high: band_mean(MID_EDGE, 1.0),
        sub_bass: fine[0],
        bass: fine[1],
        low_mid: fine[2],
        mid_band: fine[3],
        high_mid: fine[4],
        presence: fine[5],
        brilliance: fine[6],
        air: fine[7],
        sparkle: fine[8],
        ultra: fine[9],
        timestamp_ms: snapshot.timestamp_ms,
    }
}
