//! SHA-256 binary merkle trees as used by SSZ vectors of roots.

use super::Hash256;
use ring::digest::{Context as RingContext, SHA256 as RingSHA256};

pub fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = RingContext::new(&RingSHA256);
    hasher.update(left);
    hasher.update(right);

    let mut result = [0u8; 32];
    result.copy_from_slice(hasher.finish().as_ref());

    result
}

/// Computes the root of a tree over `leaves`. The number of leaves must be a power of two.
pub fn merkle_root(leaves: &[Hash256]) -> Option<Hash256> {
    if !leaves.len().is_power_of_two() {
        return None;
    }

    let mut layer = leaves.iter().map(|leaf| leaf.0).collect::<Vec<_>>();
    while layer.len() > 1 {
        layer = layer
            .chunks_exact(2)
            .map(|pair| hash_pair(&pair[0], &pair[1]))
            .collect();
    }

    Some(Hash256::from(layer[0]))
}

/// Builds the branch proving `leaves[index]`, ordered from the leaf level up.
pub fn merkle_branch(leaves: &[Hash256], index: usize) -> Option<Vec<Hash256>> {
    if !leaves.len().is_power_of_two() || index >= leaves.len() {
        return None;
    }

    let mut branch = Vec::with_capacity(leaves.len().trailing_zeros() as usize);
    let mut layer = leaves.iter().map(|leaf| leaf.0).collect::<Vec<_>>();
    let mut index = index;
    while layer.len() > 1 {
        branch.push(Hash256::from(layer[index ^ 1]));

        layer = layer
            .chunks_exact(2)
            .map(|pair| hash_pair(&pair[0], &pair[1]))
            .collect();
        index /= 2;
    }

    Some(branch)
}

pub fn is_valid_merkle_branch(
    leaf: [u8; 32],
    branch: &[[u8; 32]],
    depth: u32,
    index: u32,
    root: &[u8; 32],
) -> bool {
    let mut value = leaf;

    let mut iter = branch.iter();
    for i in 0..depth {
        let Some(next_node) = iter.next() else {
            return false;
        };

        value = match (index >> i) % 2 {
            0 => hash_pair(&value, next_node),
            _ => hash_pair(next_node, &value),
        };
    }

    value == *root
}
