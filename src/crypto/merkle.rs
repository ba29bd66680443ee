//! Merkle tree for block transactions
//!
//! [`MerkleTree`] folds leaves in one at a time and keeps the root current
//! after every append, touching one node per level. Each level remembers
//! how many nodes it has absorbed, the left half of the pair it is
//! currently building (`pending_hash`) and its most recent node
//! (`last_hash`). An odd node at the end of a level is paired with itself.
//!
//! [`calculate_merkle_root`] is the from-scratch pairwise reduction over the
//! same rule; both must agree for any leaf sequence.

use super::hash::{sha256, Hash256};
use serde::Serialize;

/// Parent node hash: SHA-256 over `left || right`
pub fn hash_pair(left: &Hash256, right: &Hash256) -> Hash256 {
    let mut data = [0u8; 64];
    data[..32].copy_from_slice(left.as_bytes());
    data[32..].copy_from_slice(right.as_bytes());
    sha256(&data)
}

/// Calculate the merkle root from a list of leaf hashes
pub fn calculate_merkle_root(hashes: &[Hash256]) -> Hash256 {
    if hashes.is_empty() {
        return sha256(b"");
    }

    let mut current_level = hashes.to_vec();

    while current_level.len() > 1 {
        current_level = current_level
            .chunks(2)
            .map(|chunk| hash_pair(&chunk[0], chunk.get(1).unwrap_or(&chunk[0])))
            .collect();
    }

    current_level[0]
}

/// One row of the incremental tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Level {
    pub absorbed_count: usize,
    pub pending_hash: Hash256,
    pub last_hash: Hash256,
}

impl Level {
    fn seeded(hash: Hash256) -> Self {
        Self {
            absorbed_count: 1,
            pending_hash: hash,
            last_hash: hash,
        }
    }
}

/// What a level hands to the level above it
enum Carry {
    /// A new rightmost node
    Append(Hash256),
    /// The rightmost node changed
    Replace(Hash256),
}

/// Append-only Merkle tree with an always-current root
#[derive(Debug, Clone, Serialize)]
pub struct MerkleTree {
    leaves: Vec<Hash256>,
    levels: Vec<Level>,
}

impl MerkleTree {
    /// Start a tree from its first leaf (the audit mission hash)
    pub fn new(first_leaf: Hash256) -> Self {
        Self {
            leaves: vec![first_leaf],
            levels: vec![Level::seeded(first_leaf)],
        }
    }

    /// Build a tree by appending `hashes` in order
    pub fn from_leaves(hashes: &[Hash256]) -> Option<Self> {
        let (first, rest) = hashes.split_first()?;
        let mut tree = Self::new(*first);
        for hash in rest {
            tree.update(*hash);
        }
        Some(tree)
    }

    /// Absorb one leaf and refresh every level above it.
    ///
    /// A leaf equal to the first leaf is ignored. Only the first leaf is
    /// compared; repeats of any later leaf are absorbed like new leaves.
    /// Returns whether the leaf was absorbed.
    pub fn update(&mut self, leaf: Hash256) -> bool {
        if self.leaves.first() == Some(&leaf) {
            log::debug!("Ignoring duplicate of first merkle leaf {}", leaf);
            return false;
        }
        self.leaves.push(leaf);

        let mut carry = Carry::Append(leaf);
        let mut depth = 0;

        loop {
            let level = &mut self.levels[depth];
            let (pair, appends_parent) = match carry {
                Carry::Append(hash) => {
                    let odd_before = level.absorbed_count % 2 == 1;
                    level.absorbed_count += 1;
                    level.last_hash = hash;
                    if odd_before {
                        ((level.pending_hash, hash), false)
                    } else {
                        level.pending_hash = hash;
                        ((hash, hash), true)
                    }
                }
                Carry::Replace(hash) => {
                    level.last_hash = hash;
                    if level.absorbed_count % 2 == 1 {
                        level.pending_hash = hash;
                        ((hash, hash), false)
                    } else {
                        ((level.pending_hash, hash), false)
                    }
                }
            };

            if level.absorbed_count == 1 {
                break;
            }

            let parent = hash_pair(&pair.0, &pair.1);
            depth += 1;

            if depth == self.levels.len() {
                log::trace!("Merkle tree grew to {} levels", depth + 1);
                self.levels.push(Level::seeded(parent));
                break;
            }

            carry = if appends_parent {
                Carry::Append(parent)
            } else {
                Carry::Replace(parent)
            };
        }

        true
    }

    /// Current root: the last node of the topmost level
    pub fn root(&self) -> Hash256 {
        self.levels
            .last()
            .map(|level| level.last_hash)
            .unwrap_or_else(|| sha256(b""))
    }

    pub fn leaves(&self) -> &[Hash256] {
        &self.leaves
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    /// Sibling path from leaf `index` to the root
    pub fn proof(&self, index: usize) -> Option<MerkleProof> {
        if index >= self.leaves.len() {
            return None;
        }

        let mut siblings = Vec::new();
        let mut row = self.leaves.clone();
        let mut position = index;

        while row.len() > 1 {
            let sibling = if position % 2 == 0 {
                (*row.get(position + 1).unwrap_or(&row[position]), false)
            } else {
                (row[position - 1], true)
            };
            siblings.push(sibling);

            row = row
                .chunks(2)
                .map(|chunk| hash_pair(&chunk[0], chunk.get(1).unwrap_or(&chunk[0])))
                .collect();
            position /= 2;
        }

        Some(MerkleProof { siblings })
    }
}

/// Merkle proof for verifying transaction inclusion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MerkleProof {
    /// Sibling hashes from leaf to root; `true` when the sibling is on the left
    pub siblings: Vec<(Hash256, bool)>,
}

impl MerkleProof {
    /// Verify the proof against a root hash
    pub fn verify(&self, leaf_hash: &Hash256, root_hash: &Hash256) -> bool {
        let computed = self
            .siblings
            .iter()
            .fold(*leaf_hash, |current, (sibling, is_left)| {
                if *is_left {
                    hash_pair(sibling, &current)
                } else {
                    hash_pair(&current, sibling)
                }
            });

        computed == *root_hash
    }
}
