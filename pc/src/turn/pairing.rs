//! Peer-review pairing
//!
//! Workers are arranged in configured order and each reviews its successor's
//! draft, wrapping around: a ring, not all-pairs.

/// Pair each item with its ring successor
///
/// Returns `(reviewer, peer)` for every item. A single item has no peer.
pub fn ring_pairs<T>(items: &[T]) -> Vec<(&T, &T)> {
    let n = items.len();
    if n < 2 {
        return Vec::new();
    }
    (0..n).map(|i| (&items[i], &items[(i + 1) % n])).collect()
}
