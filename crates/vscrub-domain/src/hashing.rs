use std::path::Path;

use blake3::Hasher;

use crate::{Digest32, IndexId, RunId};

pub fn compute_run_id(
    tool_version: &str,
    index_id: &IndexId,
    input_root: &Path,
    output_root: &Path,
) -> RunId {
    let mut hasher = Hasher::new();
    update_len_prefixed(&mut hasher, tool_version.as_bytes());
    hasher.update(index_id.as_digest().as_bytes());
    update_len_prefixed(&mut hasher, input_root.to_string_lossy().as_bytes());
    update_len_prefixed(&mut hasher, output_root.to_string_lossy().as_bytes());
    RunId::from_digest(Digest32::from_bytes(*hasher.finalize().as_bytes()))
}

/// Feeds `bytes` preceded by its little-endian u64 length so adjacent fields
/// cannot be confused with one another.
pub fn update_len_prefixed(hasher: &mut Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_changes_when_inputs_change() {
        let index_1 = IndexId::from_digest(Digest32::from_bytes([3_u8; 32]));
        let index_2 = IndexId::from_digest(Digest32::from_bytes([4_u8; 32]));
        let input = Path::new("in");
        let output = Path::new("out");

        let run1 = compute_run_id("0.1.0", &index_1, input, output);
        let run2 = compute_run_id("0.2.0", &index_1, input, output);
        let run3 = compute_run_id("0.1.0", &index_2, input, output);
        let run4 = compute_run_id("0.1.0", &index_1, input, Path::new("elsewhere"));

        assert_ne!(run1, run2);
        assert_ne!(run1, run3);
        assert_ne!(run1, run4);
        assert_eq!(run1, compute_run_id("0.1.0", &index_1, input, output));
    }

    #[test]
    fn length_prefix_separates_adjacent_fields() {
        let index = IndexId::from_digest(Digest32::from_bytes([0_u8; 32]));
        let a = compute_run_id("v", &index, Path::new("ab"), Path::new("c"));
        let b = compute_run_id("v", &index, Path::new("a"), Path::new("bc"));
        assert_ne!(a, b);
    }
}
