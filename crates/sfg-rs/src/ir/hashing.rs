//! Content fingerprints for offloaded tasks.

use super::OffloadedTask;

const FNV1A_OFFSET: u64 = 0xcbf29ce484222325;
const FNV1A_PRIME: u64 = 0x100000001b3;

pub fn fnv1a_init() -> u64 {
    FNV1A_OFFSET
}

pub fn fnv1a_bytes(mut hash: u64, bytes: &[u8]) -> u64 {
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV1A_PRIME);
    }
    hash
}

pub fn fnv1a_hash(bytes: &[u8]) -> u64 {
    fnv1a_bytes(fnv1a_init(), bytes)
}

/// Structural fingerprint of a task over its serialized form.
///
/// Statement ids participate in the bytes, so callers normalize with
/// [`passes::re_id`](super::passes::re_id) first whenever the fingerprint is
/// meant to be content-addressed.
pub fn fingerprint(task: &OffloadedTask) -> u64 {
    let bytes = bincode::serialize(task).expect("offloaded task serialization cannot fail");
    fnv1a_hash(&bytes)
}
