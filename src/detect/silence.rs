use crate::config::SilenceConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Normal,
    Silent { since_ms: u64, frames: u32 },
}

/// Flags the frame on which a short silence ends.
///
/// Gaps shorter than `min_silence_ms` are noise; gaps longer than
/// `max_silence_ms` are real pauses. Only the span in between marks a
/// transition.
pub struct SilenceTransitionDetector {
    config: SilenceConfig,
    phase: Phase,
    last_span_ms: Option<u64>,
}

impl SilenceTransitionDetector {
    pub fn new(config: SilenceConfig) -> Self {
        Self {
            config,
            phase: Phase::Normal,
            last_span_ms: None,
        }
    }

    /// Returns true exactly on the first loud frame after a short silence.
    pub fn on_frame(&mut self, energy: f32, now_ms: u64) -> bool {
        let silent = energy < self.config.energy_threshold;

        match (self.phase, silent) {
            (Phase::Normal, true) => {
                self.phase = Phase::Silent { since_ms: now_ms, frames: 1 };
                false
            }
            (Phase::Silent { since_ms, frames }, true) => {
                self.phase = Phase::Silent { since_ms, frames: frames + 1 };
                false
            }
            (Phase::Silent { since_ms, frames }, false) => {
                self.phase = Phase::Normal;
                let span = now_ms.saturating_sub(since_ms);
                self.last_span_ms = Some(span);
                let fired = span >= self.config.min_silence_ms && span <= self.config.max_silence_ms;
                log::debug!(
                    "Silence ended after {}ms ({} frames){}",
                    span,
                    frames,
                    if fired { ", transition" } else { "" }
                );
                fired
            }
            (Phase::Normal, false) => false,
        }
    }

    /// Length of the most recently ended silence.
    pub fn last_span_ms(&self) -> Option<u64> {
        self.last_span_ms
    }

    pub fn reset(&mut self) {
        self.phase = Phase::Normal;
        self.last_span_ms = None;
    }
}
