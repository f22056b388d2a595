//! Embedding encoding and distance math for the sample store.

use crate::error::{Error, Result};

/// Scale `v` to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Squared Euclidean distance. For unit vectors this is `2 - 2 cos`, so it
/// ranges over `0..=4`.
#[must_use]
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Pack an embedding as little-endian `f32` bytes.
#[must_use]
pub fn encode_embedding(v: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(v.len() * 4);
    for x in v {
        bytes.extend_from_slice(&x.to_le_bytes());
    }
    bytes
}

/// Unpack an embedding written by [`encode_embedding`].
pub fn decode_embedding(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(Error::InvalidData(format!(
            "embedding blob length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[test]
    fn test_squared_l2_of_unit_vectors() {
        assert!((squared_l2(&[1.0, 0.0], &[1.0, 0.0])).abs() < 1e-6);
        assert!((squared_l2(&[1.0, 0.0], &[0.0, 1.0]) - 2.0).abs() < 1e-6);
        assert!((squared_l2(&[1.0, 0.0], &[-1.0, 0.0]) - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_decode_rejects_truncated_blob() {
        let mut bytes = encode_embedding(&[0.25, -1.5]);
        assert_eq!(decode_embedding(&bytes).unwrap(), vec![0.25, -1.5]);
        bytes.pop();
        assert!(decode_embedding(&bytes).is_err());
    }
}
