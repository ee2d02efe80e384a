use super::decode::AudioData;
use super::features::FrequencySnapshot;
use super::spectrum;
use crate::config::CaptureConfig;

/// Anything that can hand the detector one frequency snapshot per frame.
pub trait AudioFeatureSource {
    /// The snapshot for the current frame, or `None` once the source is exhausted.
    fn current_snapshot(&mut self) -> Option<FrequencySnapshot>;

    /// Bins per snapshot; fixed for the lifetime of the source.
    fn bin_count(&self) -> usize;

    /// Frames left, when the source knows its length.
    fn remaining(&self) -> Option<usize> {
        None
    }

    /// Rewind to the start, when the source supports it.
    fn rewind(&mut self) {}
}

/// Pre-analysed snapshots of a decoded file, played back in frame order.
pub struct FileSource {
    snapshots: Vec<FrequencySnapshot>,
    bin_count: usize,
    cursor: usize,
}

impl FileSource {
    pub fn from_audio(audio: &AudioData, capture: &CaptureConfig) -> Self {
        Self::from_snapshots(spectrum::snapshots(audio, capture), capture.fft_size / 2)
    }

    pub fn from_snapshots(snapshots: Vec<FrequencySnapshot>, bin_count: usize) -> Self {
        Self {
            snapshots,
            bin_count,
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl AudioFeatureSource for FileSource {
    fn current_snapshot(&mut self) -> Option<FrequencySnapshot> {
        let snapshot = self.snapshots.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(snapshot)
    }

    fn bin_count(&self) -> usize {
        self.bin_count
    }

    fn remaining(&self) -> Option<usize> {
        Some(self.snapshots.len() - self.cursor)
    }

    fn rewind(&mut self) {
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plays_back_in_order_then_ends() {
        let snaps = (0..3).map(|i| FrequencySnapshot::new(vec![i as u8; 4], i * 16)).collect();
        let mut source = FileSource::from_snapshots(snaps, 4);
        assert_eq!(source.remaining(), Some(3));
        assert_eq!(source.current_snapshot().unwrap().timestamp_ms, 0);
        assert_eq!(source.current_snapshot().unwrap().bins, vec![1; 4]);
        assert_eq!(source.current_snapshot().unwrap().timestamp_ms, 32);
        assert!(source.current_snapshot().is_none());
        assert_eq!(source.remaining(), Some(0));

        source.rewind();
        assert_eq!(source.remaining(), Some(3));
        assert_eq!(source.bin_count(), 4);
    }

    #[test]
    fn from_audio_uses_half_fft_bins() {
        let audio = AudioData { samples: vec![0.0; 22_050], sample_rate: 44_100 };
        let capture = CaptureConfig { fft_size: 512, ..CaptureConfig::default() };
        let source = FileSource::from_audio(&audio, &capture);
        assert_eq!(source.bin_count(), 256);
        assert_eq!(source.len(), 30);
    }
}
