use super::Frame;

/// Per-frame speech/silence classification. Implementations must be pure:
/// the same frame always yields the same answer.
pub trait VoiceActivity {
    fn is_speech(&self, frame: &Frame) -> bool;
}

/// RMS-energy voice activity classifier.
///
/// Aggressiveness 0-3 selects the energy threshold; higher values are more
/// aggressive about labeling frames as silence.
#[derive(Debug, Clone)]
pub struct EnergyVad {
    threshold: f32,
}

/// Thresholds indexed by aggressiveness mode.
const THRESHOLDS: [f32; 4] = [0.005, 0.01, 0.02, 0.04];

impl EnergyVad {
    /// Create a classifier for the given aggressiveness mode (0-3).
    /// Out-of-range values are clamped.
    pub fn new(aggressiveness: u8) -> Self {
        let mode = aggressiveness.min(3) as usize;
        Self {
            threshold: THRESHOLDS[mode],
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}

impl Default for EnergyVad {
    fn default() -> Self {
        Self::new(2)
    }
}

impl VoiceActivity for EnergyVad {
    fn is_speech(&self, frame: &Frame) -> bool {
        calculate_rms(&frame.samples) >= self.threshold
    }
}

/// RMS energy of a sample window, normalized to [0, 1].
fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&s| {
            let normalized = s as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    (sum_squares / samples.len() as f64).sqrt() as f32
}
