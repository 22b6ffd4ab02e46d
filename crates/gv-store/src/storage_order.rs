//! Canonical child ordering and bucket assignment.
//!
//! Both are derived from a 64-bit FNV-1a hash of the child name. The hash,
//! the bucket function, and the three constants below are part of the tree
//! hash format: changing any of them changes every bucketed tree id.

use std::cmp::Ordering;

use crate::node::Node;

/// Maximum number of direct children a leaf tree may hold.
pub const NORMALIZED_SIZE_LIMIT: usize = 512;

/// Number of bucket slots per bucketed tree level.
pub const MAX_BUCKETS: u32 = 32;

/// Depth at which trees stop splitting into buckets.
pub const MAX_DEPTH: usize = 8;

const FNV64_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV64_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a 64 over the UTF-16 code units of `name`, high byte first.
pub fn name_hash(name: &str) -> u64 {
    let mut hash = FNV64_OFFSET_BASIS;
    for unit in name.encode_utf16() {
        for byte in unit.to_be_bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(FNV64_PRIME);
        }
    }
    hash
}

/// The `depth`-th byte of a name hash, most significant first.
pub fn byte_n(hash: u64, depth: usize) -> u8 {
    debug_assert!(depth < MAX_DEPTH);
    ((hash >> (56 - 8 * depth)) & 0xff) as u8
}

/// Bucket index of `name` for a tree at `depth`.
pub fn bucket(name: &str, depth: usize) -> u32 {
    u32::from(byte_n(name_hash(name), depth)) * MAX_BUCKETS / 256
}

/// Canonical order of two child names: by signed name hash, then by name.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    let ha = name_hash(a) as i64;
    let hb = name_hash(b) as i64;
    ha.cmp(&hb).then_with(|| a.cmp(b))
}

/// Canonical order of two nodes.
pub fn compare_nodes(a: &Node, b: &Node) -> Ordering {
    compare_names(a.name(), b.name())
}

/// Sort nodes into canonical storage order.
pub fn sort_nodes(nodes: &mut [Node]) {
    nodes.sort_by(compare_nodes);
}
