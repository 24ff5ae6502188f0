//! Snake scan ordering: a row-major traversal with every odd row reversed,
//! so that pixels adjacent across a row boundary stay spatially adjacent in
//! scan order. This keeps delta entropy low for the compressor.
//!
//! The permutation only depends on `(width, height)`, so it's cached
//! process-wide behind a mutex. Entries are pure functions of the key, so a
//! cache miss under contention just costs a harmless recomputation.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

type SnakeCache = Mutex<HashMap<(u32, u32), Arc<[u32]>>>;

static CACHE: OnceLock<SnakeCache> = OnceLock::new();

/// Returns the snake permutation for `width x height`: `result[i]` is the
/// linear (row-major) index that scan position `i` pulls its value from.
pub fn indices(width: u32, height: u32) -> Arc<[u32]> {
    let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    let mut guard = cache.lock();
    guard
        .entry((width, height))
        .or_insert_with(|| compute(width, height))
        .clone()
}

fn compute(width: u32, height: u32) -> Arc<[u32]> {
    let w = i64::from(width);
    let n = w * i64::from(height);
    (0..n)
        .map(|linear| {
            let row_is_odd = (linear / w) & 1;
            (linear + row_is_odd * (w - 1 - 2 * (linear % w))) as u32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_bijection() {
        let perm = indices(160, 120);
        let mut seen = vec![false; perm.len()];
        for &i in perm.iter() {
            assert!(!seen[i as usize], "index {i} visited twice");
            seen[i as usize] = true;
        }
        assert!(seen.into_iter().all(|b| b));
    }

    #[test]
    fn is_involution() {
        let perm = indices(160, 120);
        for (i, &p) in perm.iter().enumerate() {
            assert_eq!(perm[p as usize] as usize, i);
        }
    }

    #[test]
    fn even_rows_forward_odd_rows_reversed() {
        let width = 4;
        let height = 3;
        let perm = indices(width, height);
        // row 0 (even): 0,1,2,3
        assert_eq!(&perm[0..4], &[0, 1, 2, 3]);
        // row 1 (odd): reversed -> 7,6,5,4
        assert_eq!(&perm[4..8], &[7, 6, 5, 4]);
        // row 2 (even): 8,9,10,11
        assert_eq!(&perm[8..12], &[8, 9, 10, 11]);
    }

    #[test]
    fn cached_instances_are_equal() {
        let a = indices(160, 120);
        let b = indices(160, 120);
        assert_eq!(&*a, &*b);
    }
}
