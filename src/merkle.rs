//! Incremental Merkle tree for group membership.
//!
//! An append-only binary tree of fixed depth hashed with Poseidon. Insertions
//! use the filled-subtrees technique so only `depth` hashes are needed per
//! leaf. Updates and removals are authorized by a sibling path that must
//! reproduce the stored root.

use crate::error::{Error, Result};
use crate::types::Word;
use crate::utils::poseidon_hash;
use log::debug;
use pasta_curves::pallas;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum supported tree depth.
pub const MIN_TREE_DEPTH: u8 = 1;

/// Maximum supported tree depth (2^32 leaves).
pub const MAX_TREE_DEPTH: u8 = 32;

/// A Merkle proof for leaf inclusion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf: Word,
    pub root: Word,
    pub siblings: Vec<Word>,
    pub index: u64,
}

impl MerkleProof {
    /// Recomputes the root from the leaf and siblings and compares it with
    /// the root recorded in the proof.
    #[must_use]
    pub fn verify(&self) -> bool {
        let Some(leaf) = self.leaf.to_field() else {
            return false;
        };
        let Some(siblings) = to_fields(&self.siblings) else {
            return false;
        };
        Word::from_field(compute_root(leaf, self.index, &siblings)) == self.root
    }
}

impl fmt::Display for MerkleProof {
    /// One line per sibling, leaf level first.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "leaf {} at index {} under root {}", self.leaf, self.index, self.root)?;
        for (level, sibling) in self.siblings.iter().enumerate() {
            writeln!(f, "  [{level}] {sibling}")?;
        }
        Ok(())
    }
}

fn to_fields(words: &[Word]) -> Option<Vec<pallas::Base>> {
    words.iter().map(Word::to_field).collect()
}

/// Root obtained by hashing `leaf` up the tree along `siblings`.
///
/// Bit `i` of `index` tells whether the node at level `i` is a right child.
#[must_use]
pub fn compute_root(leaf: pallas::Base, index: u64, siblings: &[pallas::Base]) -> pallas::Base {
    siblings
        .iter()
        .enumerate()
        .fold(leaf, |node, (level, sibling)| {
            if (index >> level) & 1 == 0 {
                poseidon_hash(node, *sibling)
            } else {
                poseidon_hash(*sibling, node)
            }
        })
}

/// Ordered record of every root a tree has had.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootHistory {
    entries: Vec<RootEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootEntry {
    pub root: Word,
    pub inserted_at: u64,
}

impl RootHistory {
    pub fn push(&mut self, root: Word, inserted_at: u64) {
        self.entries.push(RootEntry { root, inserted_at });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[RootEntry] {
        &self.entries
    }

    #[must_use]
    pub fn current(&self) -> Option<&RootEntry> {
        self.entries.last()
    }

    /// Insertion time of the most recent entry holding `root`.
    #[must_use]
    pub fn inserted_at(&self, root: &Word) -> Option<u64> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.root == *root)
            .map(|entry| entry.inserted_at)
    }
}

/// Append-only binary Merkle tree of fixed depth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrementalMerkleTree {
    depth: u8,
    number_of_leaves: u64,
    root: Word,
    /// `zeroes[i]` is the root of an empty subtree of height `i`.
    zeroes: Vec<Word>,
    /// Rightmost left-child node at each level, used as the left sibling of
    /// the next insertion.
    filled_subtrees: Vec<Word>,
    leaves: Vec<Word>,
}

impl IncrementalMerkleTree {
    /// Creates an empty tree whose empty leaves hold `zero_value`.
    ///
    /// # Errors
    /// * `InvalidDepth` if depth is outside `MIN_TREE_DEPTH..=MAX_TREE_DEPTH`
    /// * `LeafGreaterThanSnarkScalarField` if `zero_value` is not a field element
    pub fn new(depth: u8, zero_value: Word) -> Result<Self> {
        if !(MIN_TREE_DEPTH..=MAX_TREE_DEPTH).contains(&depth) {
            return Err(Error::InvalidDepth {
                depth,
                min: MIN_TREE_DEPTH,
                max: MAX_TREE_DEPTH,
            });
        }
        let zero = zero_value
            .to_field()
            .ok_or(Error::LeafGreaterThanSnarkScalarField)?;

        let mut zeroes = Vec::with_capacity(depth as usize + 1);
        let mut node = zero;
        zeroes.push(Word::from_field(node));
        for _ in 0..depth {
            node = poseidon_hash(node, node);
            zeroes.push(Word::from_field(node));
        }

        Ok(Self {
            depth,
            number_of_leaves: 0,
            root: Word::from_field(node),
            filled_subtrees: zeroes[..depth as usize].to_vec(),
            zeroes,
            leaves: Vec::new(),
        })
    }

    #[must_use]
    pub fn depth(&self) -> u8 {
        self.depth
    }

    #[must_use]
    pub fn number_of_leaves(&self) -> u64 {
        self.number_of_leaves
    }

    #[must_use]
    pub fn root(&self) -> Word {
        self.root
    }

    /// The reserved value of an empty or removed leaf.
    #[must_use]
    pub fn zero_value(&self) -> Word {
        self.zeroes[0]
    }

    #[must_use]
    pub fn capacity(&self) -> u64 {
        1u64 << self.depth
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.number_of_leaves >= self.capacity()
    }

    #[must_use]
    pub fn leaves(&self) -> &[Word] {
        &self.leaves
    }

    /// Checks that `leaf` may be stored as a member.
    ///
    /// # Errors
    /// * `LeafCannotBeZero` for zero or the reserved zero value
    /// * `LeafGreaterThanSnarkScalarField` if not below the field modulus
    pub fn validate_leaf(&self, leaf: &Word) -> Result<pallas::Base> {
        if leaf.is_zero() || *leaf == self.zero_value() {
            return Err(Error::LeafCannotBeZero);
        }
        leaf.to_field().ok_or(Error::LeafGreaterThanSnarkScalarField)
    }

    /// Appends `leaf` at the next free index and returns the new root.
    ///
    /// # Errors
    /// * `FullTree` if every slot is taken
    /// * leaf validation errors from [`Self::validate_leaf`]
    pub fn insert(&mut self, leaf: Word) -> Result<Word> {
        if self.is_full() {
            return Err(Error::FullTree);
        }
        let mut node = self.validate_leaf(&leaf)?;
        let index = self.number_of_leaves;

        for level in 0..self.depth as usize {
            if (index >> level) & 1 == 0 {
                self.filled_subtrees[level] = Word::from_field(node);
                node = poseidon_hash(node, self.field_at(&self.zeroes[level])?);
            } else {
                node = poseidon_hash(self.field_at(&self.filled_subtrees[level])?, node);
            }
        }

        self.root = Word::from_field(node);
        self.leaves.push(leaf);
        self.number_of_leaves += 1;
        debug!(
            "Inserted leaf {} at index {}, new root {}",
            leaf, index, self.root
        );

        Ok(self.root)
    }

    /// Replaces `old_leaf` at `index` with `new_leaf` and returns the new root.
    ///
    /// `siblings` must hold one node per level and hash `old_leaf` up to the
    /// current root.
    ///
    /// # Errors
    /// * `LeafIndexOutOfRange` if no leaf was inserted at `index`
    /// * `NewLeafCannotEqualOldLeaf`
    /// * leaf validation errors for `new_leaf`
    /// * `WrongMerkleProof` if the path does not reproduce the current root
    pub fn update(
        &mut self,
        index: u64,
        old_leaf: Word,
        new_leaf: Word,
        siblings: &[Word],
    ) -> Result<Word> {
        let new_node = self.validate_leaf(&new_leaf)?;
        self.apply_update(index, old_leaf, new_leaf, new_node, siblings)
    }

    /// Overwrites the leaf at `index` with the reserved zero value.
    ///
    /// # Errors
    /// Same as [`Self::update`], minus new-leaf validation.
    pub fn remove(&mut self, index: u64, old_leaf: Word, siblings: &[Word]) -> Result<Word> {
        let zero_value = self.zero_value();
        let zero = self.field_at(&zero_value)?;
        self.apply_update(index, old_leaf, zero_value, zero, siblings)
    }

    fn apply_update(
        &mut self,
        index: u64,
        old_leaf: Word,
        new_leaf: Word,
        new_node: pallas::Base,
        siblings: &[Word],
    ) -> Result<Word> {
        if index >= self.number_of_leaves {
            return Err(Error::LeafIndexOutOfRange {
                index,
                number_of_leaves: self.number_of_leaves,
            });
        }
        if old_leaf == new_leaf {
            return Err(Error::NewLeafCannotEqualOldLeaf);
        }
        if siblings.len() != self.depth as usize {
            return Err(Error::WrongMerkleProof);
        }
        let old_node = old_leaf.to_field().ok_or(Error::WrongMerkleProof)?;
        let siblings = to_fields(siblings).ok_or(Error::WrongMerkleProof)?;

        if Word::from_field(compute_root(old_node, index, &siblings)) != self.root {
            return Err(Error::WrongMerkleProof);
        }

        let last_index = self.number_of_leaves - 1;
        let mut node = new_node;
        for (level, sibling) in siblings.iter().enumerate() {
            let position = index >> level;
            if position == (last_index >> level) & !1 {
                self.filled_subtrees[level] = Word::from_field(node);
            }
            node = if position & 1 == 0 {
                poseidon_hash(node, *sibling)
            } else {
                poseidon_hash(*sibling, node)
            };
        }

        self.root = Word::from_field(node);
        self.leaves[index as usize] = new_leaf;
        debug!(
            "Updated leaf at index {}: {} -> {}, new root {}",
            index, old_leaf, new_leaf, self.root
        );

        Ok(self.root)
    }

    /// Builds the inclusion proof for the leaf at `leaf_index`.
    ///
    /// Returns `None` if no leaf was inserted at that index.
    #[must_use]
    pub fn merkle_proof(&self, leaf_index: u64) -> Option<MerkleProof> {
        if leaf_index >= self.number_of_leaves {
            return None;
        }

        let mut level: Vec<pallas::Base> = to_fields(&self.leaves)?;
        let mut index = leaf_index as usize;
        let mut siblings = Vec::with_capacity(self.depth as usize);

        for height in 0..self.depth as usize {
            let zero = self.zeroes[height].to_field()?;
            let sibling = level.get(index ^ 1).copied().unwrap_or(zero);
            siblings.push(Word::from_field(sibling));

            level = level
                .chunks(2)
                .map(|pair| poseidon_hash(pair[0], pair.get(1).copied().unwrap_or(zero)))
                .collect();
            index /= 2;
        }

        Some(MerkleProof {
            leaf: self.leaves[leaf_index as usize],
            root: self.root,
            siblings,
            index: leaf_index,
        })
    }

    fn field_at(&self, word: &Word) -> Result<pallas::Base> {
        // Stored nodes are produced by hashing and are always in range; a
        // failure here means the tree was deserialized from a corrupted snapshot.
        word.to_field().ok_or(Error::WrongMerkleProof)
    }
}
