//! Binary merkle root over transaction hashes.

use crate::hash::{hash_concat, Hash};

/// Compute the merkle root of a list of hashes.
///
/// Returns the zero hash for an empty list. An odd node at any level is
/// paired with itself.
pub fn merkle_root(hashes: &[Hash]) -> Hash {
    match hashes {
        [] => Hash::ZERO,
        [single] => *single,
        _ => {
            let mut level: Vec<Hash> = hashes.to_vec();
            while level.len() > 1 {
                level = level
                    .chunks(2)
                    .map(|pair| {
                        let right = pair.get(1).unwrap_or(&pair[0]);
                        hash_concat(&[pair[0].as_ref(), right.as_ref()])
                    })
                    .collect();
            }
            level[0]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash;

    fn make_hashes(n: usize) -> Vec<Hash> {
        (0..n).map(|i| hash(&[i as u8])).collect()
    }

    #[test]
    fn test_merkle_root_empty() {
        assert_eq!(merkle_root(&[]), Hash::ZERO);
    }

    #[test]
    fn test_merkle_root_single() {
        let hashes = make_hashes(1);
        assert_eq!(merkle_root(&hashes), hashes[0]);
    }

    #[test]
    fn test_merkle_root_two() {
        let hashes = make_hashes(2);
        let expected = hash_concat(&[hashes[0].as_ref(), hashes[1].as_ref()]);
        assert_eq!(merkle_root(&hashes), expected);
    }

    #[test]
    fn test_merkle_root_odd_duplicates_last() {
        let hashes = make_hashes(3);
        let left = hash_concat(&[hashes[0].as_ref(), hashes[1].as_ref()]);
        let right = hash_concat(&[hashes[2].as_ref(), hashes[2].as_ref()]);
        let expected = hash_concat(&[left.as_ref(), right.as_ref()]);
        assert_eq!(merkle_root(&hashes), expected);
    }

    #[test]
    fn test_merkle_root_order_matters() {
        let hashes = make_hashes(4);
        let mut reversed = hashes.clone();
        reversed.reverse();
        assert_ne!(merkle_root(&hashes), merkle_root(&reversed));
    }
}
