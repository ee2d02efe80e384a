use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};

use super::decode::AudioData;
use super::features::FrequencySnapshot;
use crate::config::CaptureConfig;

/// Analyser-node emulation over a decoded file: one byte-magnitude snapshot
/// per animation frame, from a Hann-windowed FFT of the latest `fft_size`
/// samples, smoothed over time and mapped from decibels to 0-255.
pub fn snapshots(audio: &AudioData, capture: &CaptureConfig) -> Vec<FrequencySnapshot> {
    let fps = capture.fps.max(1);
    let fft_size = capture.fft_size.max(2);
    let duration = audio.duration();
    let total_frames = (duration * fps as f32).ceil() as usize;

    log::info!(
        "Pass 1: Per-frame FFT ({} frames, fft_size={})...",
        total_frames,
        fft_size
    );
    let raw = raw_magnitudes(&audio.samples, audio.sample_rate, fps, fft_size, total_frames);

    log::info!(
        "Pass 2: Smoothing & byte mapping (smoothing={:.2}, {:.0}..{:.0} dB)...",
        capture.smoothing,
        capture.min_decibels,
        capture.max_decibels
    );
    to_snapshots(&raw, capture, fps)
}

/// Unsmoothed |X[k]| / N for each frame, computed in parallel.
fn raw_magnitudes(
    samples: &[f32],
    sample_rate: u32,
    fps: u32,
    fft_size: usize,
    total_frames: usize,
) -> Vec<Vec<f32>> {
    let samples_per_frame = sample_rate as f64 / fps as f64;
    let hann = hann_window(fft_size);
    let half = fft_size / 2;

    (0..total_frames)
        .into_par_iter()
        .map(|frame_idx| {
            // Window ends at the frame's playback position, zero-padded at the start
            let end = (((frame_idx + 1) as f64 * samples_per_frame) as usize).min(samples.len());
            let start = end.saturating_sub(fft_size);
            let offset = fft_size - (end - start);

            let mut fft_input = vec![Complex::new(0.0f32, 0.0); fft_size];
            for (i, &s) in samples[start..end].iter().enumerate() {
                fft_input[offset + i] = Complex::new(s * hann[offset + i], 0.0);
            }

            // Per-thread FFT planner (rayon-safe)
            let mut planner = FftPlanner::<f32>::new();
            let fft = planner.plan_fft_forward(fft_size);
            fft.process(&mut fft_input);

            let scale = 1.0 / fft_size as f32;
            fft_input[..half].iter().map(|c| c.norm() * scale).collect()
        })
        .collect()
}

/// Time smoothing has to run in frame order, so this pass is sequential.
fn to_snapshots(raw: &[Vec<f32>], capture: &CaptureConfig, fps: u32) -> Vec<FrequencySnapshot> {
    let Some(first) = raw.first() else {
        return Vec::new();
    };
    let tau = capture.smoothing.clamp(0.0, 1.0);
    let range = (capture.max_decibels - capture.min_decibels).max(f32::EPSILON);

    let mut smoothed = vec![0.0f32; first.len()];
    raw.iter()
        .enumerate()
        .map(|(frame_idx, mags)| {
            let bins = mags
                .iter()
                .zip(smoothed.iter_mut())
                .map(|(&mag, prev)| {
                    *prev = tau * *prev + (1.0 - tau) * mag;
                    to_byte(*prev, capture.min_decibels, range)
                })
                .collect();
            let timestamp_ms = frame_idx as u64 * 1000 / fps as u64;
            FrequencySnapshot::new(bins, timestamp_ms)
        })
        .collect()
}

fn to_byte(magnitude: f32, min_decibels: f32, range: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = 255.0 * (db - min_decibels) / range;
    scaled.clamp(0.0, 255.0) as u8
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, seconds: f32, amplitude: f32) -> AudioData {
        let n = (sample_rate as f32 * seconds) as usize;
        let samples = (0..n)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect();
        AudioData { samples, sample_rate }
    }

    #[test]
    fn one_snapshot_per_frame_with_half_fft_bins() {
        let audio = sine(440.0, 44_100, 1.0, 0.5);
        let capture = CaptureConfig::default();
        let snaps = snapshots(&audio, &capture);
        assert_eq!(snaps.len(), 60);
        assert!(snaps.iter().all(|s| s.bins.len() == 1024));
        assert_eq!(snaps[0].timestamp_ms, 0);
        assert_eq!(snaps[30].timestamp_ms, 500);
    }

    #[test]
    fn silence_maps_to_zero_bytes() {
        let audio = AudioData { samples: vec![0.0; 44_100], sample_rate: 44_100 };
        let snaps = snapshots(&audio, &CaptureConfig::default());
        assert!(snaps.iter().all(|s| s.bins.iter().all(|&b| b == 0)));
    }

    #[test]
    fn tone_peaks_at_its_bin() {
        // Bin k sits at k * sr / fft_size; 64 * 44100 / 2048 ≈ 1378 Hz
        let freq = 64.0 * 44_100.0 / 2048.0;
        let audio = sine(freq, 44_100, 0.5, 0.8);
        let snaps = snapshots(&audio, &CaptureConfig::default());
        let last = snaps.last().unwrap();
        let peak = last
            .bins
            .iter()
            .enumerate()
            .max_by_key(|(_, &b)| b)
            .map(|(i, _)| i)
            .unwrap();
        assert!((63..=65).contains(&peak), "peak at {}", peak);
        assert!(last.bins[peak] > 200);
        assert!(last.bins[900] < 50);
    }

    #[test]
    fn byte_mapping_clamps_to_range() {
        assert_eq!(to_byte(0.0, -100.0, 70.0), 0);
        assert_eq!(to_byte(1.0, -100.0, 70.0), 255);
        // -65 dB sits halfway between -100 and -30
        let mid = to_byte(10f32.powf(-65.0 / 20.0), -100.0, 70.0);
        assert!((126..=128).contains(&mid));
    }

    #[test]
    fn empty_audio_gives_no_snapshots() {
        let audio = AudioData { samples: Vec::new(), sample_rate: 44_100 };
        assert!(snapshots(&audio, &CaptureConfig::default()).is_empty());
    }
}
