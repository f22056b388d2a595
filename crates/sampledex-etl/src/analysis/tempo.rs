//! Tempo estimation from an onset-strength envelope.

/// Samples between successive envelope frames.
pub const HOP: usize = 512;
/// Samples per energy frame.
pub const FRAME: usize = 2048;

const MIN_BPM: f64 = 40.0;
const MAX_BPM: f64 = 240.0;
const PRIOR_CENTER_BPM: f64 = 120.0;
const PRIOR_OCTAVES: f64 = 1.0;

/// Positive frame-to-frame change in log energy.
pub fn onset_envelope(samples: &[f32]) -> Vec<f32> {
    if samples.len() < FRAME {
        return Vec::new();
    }

    let energies: Vec<f32> = (0..=samples.len() - FRAME)
        .step_by(HOP)
        .map(|start| {
            let frame = &samples[start..start + FRAME];
            let mean_sq = frame.iter().map(|s| s * s).sum::<f32>() / FRAME as f32;
            10.0 * mean_sq.max(1e-8).log10()
        })
        .collect();

    let mut envelope = Vec::with_capacity(energies.len());
    envelope.push(0.0);
    envelope.extend(energies.windows(2).map(|w| (w[1] - w[0]).max(0.0)));
    envelope
}

/// Three-tap smoothing so beats that fall between envelope frames still
/// line up at neighbouring lags.
fn smooth(envelope: &[f32]) -> Vec<f32> {
    (0..envelope.len())
        .map(|i| {
            let prev = if i > 0 { envelope[i - 1] } else { 0.0 };
            let next = envelope.get(i + 1).copied().unwrap_or(0.0);
            0.25 * prev + 0.5 * envelope[i] + 0.25 * next
        })
        .collect()
}

fn tempo_prior(bpm: f64) -> f64 {
    let octaves = (bpm / PRIOR_CENTER_BPM).log2() / PRIOR_OCTAVES;
    (-0.5 * octaves * octaves).exp()
}

/// Estimate the dominant tempo of `samples` in BPM.
///
/// Returns `None` for silence or clips too short to contain a beat
/// period in the 40..=240 BPM range.
pub fn estimate_tempo(samples: &[f32], sample_rate: u32) -> Option<f64> {
    let envelope = smooth(&onset_envelope(samples));
    let n = envelope.len();
    let frames_per_sec = f64::from(sample_rate) / HOP as f64;

    let min_lag = ((60.0 * frames_per_sec / MAX_BPM).floor() as usize).max(1);
    let max_lag = ((60.0 * frames_per_sec / MIN_BPM).ceil() as usize).min(n / 2);
    if max_lag <= min_lag {
        return None;
    }

    let mean = envelope.iter().sum::<f32>() / n as f32;
    let centered: Vec<f64> = envelope.iter().map(|v| f64::from(v - mean)).collect();

    let scores: Vec<f64> = (min_lag..=max_lag)
        .map(|lag| {
            let overlap = n - lag;
            let ac = (0..overlap)
                .map(|i| centered[i] * centered[i + lag])
                .sum::<f64>()
                / overlap as f64;
            ac * tempo_prior(60.0 * frames_per_sec / lag as f64)
        })
        .collect();

    let (best, &peak) = scores
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))?;
    if peak <= 0.0 {
        return None;
    }

    // Parabolic interpolation between neighbouring lags.
    let mut offset = 0.0;
    if best > 0 && best + 1 < scores.len() {
        let (a, b, c) = (scores[best - 1], scores[best], scores[best + 1]);
        let denom = a - 2.0 * b + c;
        if denom.abs() > f64::EPSILON {
            offset = (0.5 * (a - c) / denom).clamp(-0.5, 0.5);
        }
    }

    let lag = (min_lag + best) as f64 + offset;
    Some(60.0 * frames_per_sec / lag)
}
