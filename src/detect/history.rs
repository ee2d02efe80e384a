use crate::audio::features::FeatureFrame;

/// Fixed-capacity ring buffer. Once full, each push overwrites the oldest entry;
/// iteration is always oldest → newest.
#[derive(Clone, Debug)]
pub struct RollingHistory<T> {
    buf: Vec<T>,
    capacity: usize,
    write: usize,
}

impl<T: Clone> RollingHistory<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
            write: 0,
        }
    }

    /// Capacity for a window of `seconds` at a nominal frame rate.
    pub fn for_window(seconds: f32, frame_rate_hz: f32) -> Self {
        Self::new((seconds * frame_rate_hz).floor() as usize)
    }

    pub fn push(&mut self, value: T) {
        if self.buf.len() < self.capacity {
            self.buf.push(value);
        } else {
            self.buf[self.write] = value;
        }
        self.write = (self.write + 1) % self.capacity;
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True once `capacity` values have been pushed; statistics before that
    /// point cover a partial window and must not drive detections.
    pub fn is_full(&self) -> bool {
        self.buf.len() == self.capacity
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.write = 0;
    }

    /// Chronological iterator.
    pub fn iter(&self) -> impl Iterator<Item = &T> + Clone + '_ {
        let (newer, older) = if self.is_full() {
            self.buf.split_at(self.write)
        } else {
            self.buf.split_at(self.buf.len())
        };
        older.iter().chain(newer.iter())
    }

    pub fn latest(&self) -> Option<&T> {
        if self.buf.is_empty() {
            None
        } else {
            let idx = (self.write + self.capacity - 1) % self.capacity;
            self.buf.get(idx)
        }
    }

    /// Chronological copy of the entries in `range` (indices relative to the oldest).
    pub fn slice(&self, start: usize, end: usize) -> Vec<T> {
        let end = end.min(self.len());
        self.iter()
            .skip(start)
            .take(end.saturating_sub(start))
            .cloned()
            .collect()
    }

    pub fn first_n(&self, n: usize) -> Vec<T> {
        self.slice(0, n)
    }

    pub fn last_n(&self, n: usize) -> Vec<T> {
        let len = self.len();
        self.slice(len.saturating_sub(n), len)
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

impl RollingHistory<FeatureFrame> {
    /// Wall-clock span between the oldest and newest frame.
    pub fn span_ms(&self) -> u64 {
        match (self.iter().next(), self.latest()) {
            (Some(first), Some(last)) => last.timestamp_ms.saturating_sub(first.timestamp_ms),
            _ => 0,
        }
    }

    pub fn summary(&self) -> FeatureStats {
        FeatureStats::of(&self.to_vec())
    }
}

impl RollingHistory<f32> {
    pub fn mean(&self) -> f32 {
        mean_of(self.iter().copied())
    }

    pub fn std_dev(&self) -> f32 {
        std_dev_of(self.iter().copied())
    }
}

/// Scalar fields of a `FeatureFrame` that statistics are taken over
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Feature {
    Energy,
    Centroid,
    Rolloff,
    Low,
    Mid,
    High,
}

impl Feature {
    pub fn of(self, frame: &FeatureFrame) -> f32 {
        match self {
            Feature::Energy => frame.energy,
            Feature::Centroid => frame.centroid,
            Feature::Rolloff => frame.rolloff,
            Feature::Low => frame.low,
            Feature::Mid => frame.mid,
            Feature::High => frame.high,
        }
    }
}

/// Per-feature values (a mean or a std-dev) of the five drift features
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FeatureVector {
    pub energy: f32,
    pub centroid: f32,
    pub low: f32,
    pub mid: f32,
    pub high: f32,
}

impl FeatureVector {
    pub fn average(&self) -> f32 {
        (self.energy + self.centroid + self.low + self.mid + self.high) / 5.0
    }
}

/// Mean and population std-dev over a run of frames
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FeatureStats {
    pub mean: FeatureVector,
    pub std_dev: FeatureVector,
    pub rolloff_mean: f32,
    pub rolloff_std_dev: f32,
}

impl FeatureStats {
    /// Direct summation; all zeros for an empty run.
    pub fn of(frames: &[FeatureFrame]) -> Self {
        let col = |feature: Feature| frames.iter().map(move |f| feature.of(f));
        Self {
            mean: FeatureVector {
                energy: mean_of(col(Feature::Energy)),
                centroid: mean_of(col(Feature::Centroid)),
                low: mean_of(col(Feature::Low)),
                mid: mean_of(col(Feature::Mid)),
                high: mean_of(col(Feature::High)),
            },
            std_dev: FeatureVector {
                energy: std_dev_of(col(Feature::Energy)),
                centroid: std_dev_of(col(Feature::Centroid)),
                low: std_dev_of(col(Feature::Low)),
                mid: std_dev_of(col(Feature::Mid)),
                high: std_dev_of(col(Feature::High)),
            },
            rolloff_mean: mean_of(col(Feature::Rolloff)),
            rolloff_std_dev: std_dev_of(col(Feature::Rolloff)),
        }
    }
}

pub fn mean_of(values: impl Iterator<Item = f32>) -> f32 {
    let (sum, count) = values.fold((0.0f32, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f32
    }
}

pub fn std_dev_of(values: impl Iterator<Item = f32> + Clone) -> f32 {
    let mean = mean_of(values.clone());
    let (sum_sq, count) = values.fold((0.0f32, 0usize), |(s, n), v| {
        let d = v - mean;
        (s + d * d, n + 1)
    });
    if count == 0 {
        0.0
    } else {
        (sum_sq / count as f32).sqrt()
    }
}

/// Median of a slice; 0.0 when empty. Upper median for even lengths.
pub fn median(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted[sorted.len() / 2]
}

/// The two feature buffers the detectors share: a long baseline for section
/// z-scores and a short window for spectral drift.
#[derive(Clone, Debug)]
pub struct RollingStatistics {
    pub baseline: RollingHistory<FeatureFrame>,
    pub window: RollingHistory<FeatureFrame>,
}

impl RollingStatistics {
    pub fn new(baseline_seconds: f32, window_seconds: f32, frame_rate_hz: f32) -> Self {
        Self {
            baseline: RollingHistory::for_window(baseline_seconds, frame_rate_hz),
            window: RollingHistory::for_window(window_seconds, frame_rate_hz),
        }
    }

    pub fn push(&mut self, frame: FeatureFrame) {
        self.baseline.push(frame);
        self.window.push(frame);
    }

    pub fn clear(&mut self) {
        self.baseline.clear();
        self.window.clear();
    }
}
