//! In-memory block arena used for fork choice.
//!
//! Every known block, canonical or not, gets a node holding its number,
//! cumulative work and the arena index of its parent. Nodes are never
//! removed; the arena is rebuilt from storage at startup.

use num_bigint::BigUint;
use powchain_consensus::work;
use powchain_core::{Block, Hash};
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct IndexNode {
    pub hash: Hash,
    pub number: u64,
    pub parent: Option<usize>,
    /// Sum of `2^difficulty` from genesis to this block.
    pub total_work: BigUint,
}

#[derive(Debug, Default)]
pub struct BlockIndex {
    nodes: Vec<IndexNode>,
    by_hash: HashMap<Hash, usize>,
}

impl BlockIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from an unordered set of stored blocks.
    ///
    /// Blocks whose ancestry is incomplete are left out and returned.
    pub fn rebuild(mut blocks: Vec<Block>) -> (Self, Vec<Block>) {
        blocks.sort_by_key(|b| b.number());
        let mut index = Self::new();
        let mut orphans = Vec::new();
        for block in blocks {
            if index.insert(&block).is_none() {
                orphans.push(block);
            }
        }
        (index, orphans)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.by_hash.contains_key(hash)
    }

    pub fn position(&self, hash: &Hash) -> Option<usize> {
        self.by_hash.get(hash).copied()
    }

    pub fn node(&self, idx: usize) -> &IndexNode {
        &self.nodes[idx]
    }

    pub fn get(&self, hash: &Hash) -> Option<&IndexNode> {
        self.position(hash).map(|idx| &self.nodes[idx])
    }

    /// Cumulative work a child of `parent` at `difficulty` would have.
    pub fn child_work(&self, parent: usize, difficulty: u32) -> BigUint {
        &self.nodes[parent].total_work + work(difficulty)
    }

    /// Add a block whose parent is already indexed (or a genesis block).
    ///
    /// Returns the node's position, or `None` if the parent is unknown.
    pub fn insert(&mut self, block: &Block) -> Option<usize> {
        if let Some(idx) = self.position(&block.hash) {
            return Some(idx);
        }
        let (parent, total_work) = if block.is_genesis() {
            (None, work(block.header.difficulty))
        } else {
            let parent = self.position(&block.parent_hash())?;
            (Some(parent), self.child_work(parent, block.header.difficulty))
        };

        let idx = self.nodes.len();
        self.nodes.push(IndexNode {
            hash: block.hash,
            number: block.number(),
            parent,
            total_work,
        });
        self.by_hash.insert(block.hash, idx);
        Some(idx)
    }

    /// Fork choice: greater number wins, then greater cumulative work.
    /// A full tie keeps the incumbent.
    pub fn is_better(number: u64, total_work: &BigUint, than: &IndexNode) -> bool {
        match number.cmp(&than.number) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => *total_work > than.total_work,
        }
    }

    /// Walk parent links from `idx` down to `number`.
    pub fn ancestor_at(&self, mut idx: usize, number: u64) -> Option<usize> {
        while self.nodes[idx].number > number {
            idx = self.nodes[idx].parent?;
        }
        (self.nodes[idx].number == number).then_some(idx)
    }

    /// Lowest common ancestor of two nodes.
    pub fn common_ancestor(&self, a: usize, b: usize) -> Option<usize> {
        let number = self.nodes[a].number.min(self.nodes[b].number);
        let mut a = self.ancestor_at(a, number)?;
        let mut b = self.ancestor_at(b, number)?;
        while a != b {
            a = self.nodes[a].parent?;
            b = self.nodes[b].parent?;
        }
        Some(a)
    }

    /// Hashes from just above `ancestor` up to and including `tip`, in
    /// ascending order.
    pub fn branch(&self, ancestor: usize, tip: usize) -> Vec<Hash> {
        let mut hashes = Vec::new();
        let mut cur = tip;
        while cur != ancestor {
            hashes.push(self.nodes[cur].hash);
            match self.nodes[cur].parent {
                Some(parent) => cur = parent,
                None => break,
            }
        }
        hashes.reverse();
        hashes
    }
}
