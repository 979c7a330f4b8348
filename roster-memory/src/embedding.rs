use crate::error::{MemoryError, Result};

/// Pack an embedding vector into a little-endian byte blob for storage.
///
/// Avoids pulling in `bytemuck` for what is otherwise four lines of code.
pub fn pack(vec: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(vec.len() * 4);
    for v in vec {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Unpack a byte blob produced by [`pack`] back into an `f32` vector.
pub fn unpack(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Check a vector's length against the configured embedder dimension (§3 invariant).
pub fn check_dimension(vec: &[f32], expected_dim: usize) -> Result<()> {
    if vec.len() != expected_dim {
        return Err(MemoryError::DimensionMismatch {
            expected: expected_dim,
            actual: vec.len(),
        });
    }
    Ok(())
}

/// Cosine similarity between two equal-length vectors. Returns 0.0 for a
/// zero-magnitude vector rather than dividing by zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}

/// Normalize a name for dedup comparisons: lowercase, trimmed, collapsed whitespace.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_roundtrip() {
        let v = vec![0.1f32, -2.5, 3.75];
        let packed = pack(&v);
        assert_eq!(packed.len(), 12);
        let unpacked = unpack(&packed);
        assert_eq!(unpacked, v);
    }

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let v = vec![1.0f32, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_orthogonal_is_zero() {
        let a = vec![1.0f32, 0.0];
        let b = vec![0.0f32, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn normalize_name_collapses_case_and_space() {
        assert_eq!(normalize_name("  Jane   Doe "), "jane doe");
    }
}
