//! Blob encodings for stored vectors.

use hybrid_core::{HybridError, Result};

/// Encode a dense vector as little-endian f32s.
pub(crate) fn dense_to_bytes(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Decode a dense blob.
pub(crate) fn dense_from_bytes(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(HybridError::database(format!(
            "corrupt dense vector blob of {} bytes",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Encode the non-zero slots of a vector as (u32 column, f32 weight) pairs.
pub(crate) fn sparse_to_bytes(v: &[f32]) -> (usize, Vec<u8>) {
    let mut bytes = Vec::new();
    let mut nnz = 0;
    for (column, value) in v.iter().enumerate() {
        if *value != 0.0 {
            bytes.extend_from_slice(&(column as u32).to_le_bytes());
            bytes.extend_from_slice(&value.to_le_bytes());
            nnz += 1;
        }
    }
    (nnz, bytes)
}

/// Decode a sparse blob into (column, weight) pairs.
pub(crate) fn sparse_from_bytes(bytes: &[u8]) -> Result<Vec<(usize, f32)>> {
    if bytes.len() % 8 != 0 {
        return Err(HybridError::database(format!(
            "corrupt sparse vector blob of {} bytes",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(8)
        .map(|c| {
            let column = u32::from_le_bytes([c[0], c[1], c[2], c[3]]) as usize;
            let value = f32::from_le_bytes([c[4], c[5], c[6], c[7]]);
            (column, value)
        })
        .collect())
}

/// Cosine similarity of a sparse stored vector against a dense query.
pub(crate) fn sparse_cosine(entries: &[(usize, f32)], query: &[f32], query_norm: f32) -> f32 {
    let norm: f32 = entries.iter().map(|(_, v)| v * v).sum::<f32>().sqrt();
    if norm == 0.0 || query_norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = entries
        .iter()
        .filter_map(|(c, v)| query.get(*c).map(|q| q * v))
        .sum();
    (dot / (norm * query_norm)).clamp(-1.0, 1.0)
}
