//! Key estimation: a 12-bin chroma profile correlated against the
//! Krumhansl-Schmuckler major and minor key profiles.

use sampledex_core::model::{Mode, MusicalKey, PitchClass};
use std::f64::consts::PI;

/// Samples per analysis frame.
pub const FRAME: usize = 4096;
/// Samples between successive frames.
pub const HOP: usize = 2048;

/// C2 through B6.
const LOWEST_NOTE: u8 = 36;
const HIGHEST_NOTE: u8 = 95;

/// Correlation a key has to beat to be reported.
const MIN_CORRELATION: f64 = 0.5;

const MAJOR_PROFILE: [f64; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];
const MINOR_PROFILE: [f64; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

fn note_frequency(note: u8) -> f64 {
    440.0 * 2f64.powf((f64::from(note) - 69.0) / 12.0)
}

fn l2_normalized(values: &[f64; 12]) -> [f64; 12] {
    let norm = values.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm == 0.0 {
        return *values;
    }
    values.map(|v| v / norm)
}

/// Energy of `frame` at the frequency whose Goertzel coefficient is `coeff`.
fn goertzel_power(frame: &[f64], coeff: f64) -> f64 {
    let (mut s1, mut s2) = (0.0, 0.0);
    for &x in frame {
        let s0 = x + coeff * s1 - s2;
        s2 = s1;
        s1 = s0;
    }
    s1 * s1 + s2 * s2 - coeff * s1 * s2
}

/// Average chroma of `samples`: energy per pitch class, each frame
/// normalized to unit total before averaging. Silent frames are ignored.
pub fn chromagram(samples: &[f32], sample_rate: u32) -> [f64; 12] {
    let frame_len = FRAME.min(samples.len());
    if frame_len == 0 {
        return [0.0; 12];
    }

    let window: Vec<f64> = (0..frame_len)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / frame_len as f64).cos())
        .collect();

    let nyquist = f64::from(sample_rate) / 2.0;
    let notes: Vec<(usize, f64)> = (LOWEST_NOTE..=HIGHEST_NOTE)
        .filter(|&note| note_frequency(note) < nyquist)
        .map(|note| {
            let omega = 2.0 * PI * note_frequency(note) / f64::from(sample_rate);
            (usize::from(note % 12), 2.0 * omega.cos())
        })
        .collect();

    let mut total = [0.0; 12];
    let mut frames = 0usize;
    let mut windowed = vec![0.0; frame_len];

    for start in (0..=samples.len() - frame_len).step_by(HOP) {
        for (i, w) in window.iter().enumerate() {
            windowed[i] = f64::from(samples[start + i]) * w;
        }

        let mut chroma = [0.0; 12];
        for &(pitch_class, coeff) in &notes {
            chroma[pitch_class] += goertzel_power(&windowed, coeff);
        }

        let energy: f64 = chroma.iter().sum();
        if energy <= 1e-12 {
            continue;
        }
        for (acc, value) in total.iter_mut().zip(chroma) {
            *acc += value / energy;
        }
        frames += 1;
    }

    if frames > 0 {
        total.iter_mut().for_each(|v| *v /= frames as f64);
    }
    total
}

/// Best-matching key for a chroma profile, with its correlation.
///
/// Returns `None` for a flat profile.
pub fn estimate_key(chroma: &[f64; 12]) -> Option<(MusicalKey, f64)> {
    let mean = chroma.iter().sum::<f64>() / 12.0;
    let variance = chroma.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 12.0;
    if variance.sqrt() < 1e-6 {
        return None;
    }

    let chroma = l2_normalized(chroma);
    let profiles = [
        (Mode::Major, l2_normalized(&MAJOR_PROFILE)),
        (Mode::Minor, l2_normalized(&MINOR_PROFILE)),
    ];

    let mut best: Option<(MusicalKey, f64)> = None;
    for tonic in PitchClass::ALL {
        for (mode, profile) in &profiles {
            let correlation: f64 = (0..12)
                .map(|i| chroma[(i + tonic.index()) % 12] * profile[i])
                .sum();
            if best.map_or(true, |(_, score)| correlation > score) {
                best = Some((MusicalKey::new(tonic, *mode), correlation));
            }
        }
    }
    best
}

/// Detect the key of `samples`, if one is clear enough.
pub fn detect_key(samples: &[f32], sample_rate: u32) -> Option<MusicalKey> {
    let chroma = chromagram(samples, sample_rate);
    match estimate_key(&chroma) {
        Some((key, correlation)) if correlation > MIN_CORRELATION => Some(key),
        Some((key, correlation)) => {
            log::debug!("Weak key estimate {} ({:.2}), ignoring", key, correlation);
            None
        }
        None => None,
    }
}
