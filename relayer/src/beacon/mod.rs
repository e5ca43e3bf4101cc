use ethereum_common::{
    beacon::{BlockHeader as BeaconBlockHeader, ExecutionHeader},
    merkle, Hash256, Slot,
};
use parity_scale_codec::{Decode, Encode};

pub mod protocol;
pub mod source;
pub mod store;
pub mod syncer;

pub use protocol::Protocol;
pub use source::{BeaconBlock, BeaconSource};
pub use store::{CheckpointStore, StoreError};
pub use syncer::{SyncError, Syncer};

/// Leaves of the beacon state `block_roots` vector. Leaf `slot % len` holds the
/// root of the latest block at or before `slot`.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct BlockRootsTree {
    leaves: Vec<Hash256>,
}

impl BlockRootsTree {
    /// The number of leaves must be a power of two.
    pub fn new(leaves: Vec<Hash256>) -> Option<Self> {
        leaves
            .len()
            .is_power_of_two()
            .then_some(Self { leaves })
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

    pub fn leaf(&self, index: usize) -> Option<&Hash256> {
        self.leaves.get(index)
    }

    pub fn depth(&self) -> u32 {
        self.leaves.len().trailing_zeros()
    }

    /// Merkle root of the leaves. A malformed tree has the zero root.
    pub fn root(&self) -> Hash256 {
        merkle::merkle_root(&self.leaves).unwrap_or_default()
    }

    pub fn proof(&self, index: usize) -> Option<Vec<Hash256>> {
        merkle::merkle_branch(&self.leaves, index)
    }

    pub fn is_valid_proof(&self, leaf: &Hash256, index: usize, proof: &[Hash256]) -> bool {
        let branch = proof.iter().map(|node| node.0).collect::<Vec<_>>();

        merkle::is_valid_merkle_branch(
            leaf.0,
            &branch,
            self.depth(),
            index as u32,
            &self.root().0,
        )
    }
}

/// Trust anchor for execution header proofs: a finalized block root and the
/// block roots tree of its state.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Checkpoint {
    pub finalized_block_root: Hash256,
    pub block_roots_tree: BlockRootsTree,
    pub slot: Slot,
}

impl Checkpoint {
    /// Checks that the checkpoint was derived from `header`.
    pub fn is_consistent_with(&self, header: &BeaconBlockHeader) -> bool {
        let len = self.block_roots_tree.len() as u64;
        if len == 0 || header.slot == 0 {
            return false;
        }

        let parent_index = ((header.slot - 1) % len) as usize;

        self.slot == header.slot
            && self.finalized_block_root == header.block_root()
            && self.block_roots_tree.leaf(parent_index) == Some(&header.parent_root)
    }

    /// Same as [`Self::is_consistent_with`] and the tree root equals `expected_root`.
    pub fn verify(&self, header: &BeaconBlockHeader, expected_root: &Hash256) -> bool {
        self.is_consistent_with(header) && self.block_roots_tree.root() == *expected_root
    }
}

/// Payload of `import_finalized_header`.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct FinalizedHeaderUpdate {
    pub finalized_header: BeaconBlockHeader,
    pub block_roots_root: Hash256,
}

#[derive(Debug, Clone)]
pub struct FinalizedUpdate {
    pub payload: FinalizedHeaderUpdate,
    pub finalized_header_block_root: Hash256,
    pub block_roots_tree: BlockRootsTree,
}

impl FinalizedUpdate {
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            finalized_block_root: self.finalized_header_block_root,
            block_roots_tree: self.block_roots_tree.clone(),
            slot: self.payload.finalized_header.slot,
        }
    }
}

/// Payload of `import_execution_header`.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct ExecutionHeaderUpdate {
    pub header: BeaconBlockHeader,
    pub execution_header: ExecutionHeader,
    pub block_root_proof: Vec<Hash256>,
    pub block_roots_root: Hash256,
}
