use blake3::Hasher;
use vscrub_domain::{Digest32, IndexId, update_len_prefixed};

use crate::SubstitutionPair;

/// Identity of an index: order-sensitive, since earlier tokens win overlaps.
pub fn compute_index_id(pairs: &[SubstitutionPair]) -> IndexId {
    let mut hasher = Hasher::new();
    hasher.update(&(pairs.len() as u64).to_le_bytes());
    for pair in pairs {
        update_len_prefixed(&mut hasher, pair.readable.as_bytes());
        update_len_prefixed(&mut hasher, pair.anonymized.as_bytes());
    }
    IndexId::from_digest(Digest32::from_bytes(*hasher.finalize().as_bytes()))
}
