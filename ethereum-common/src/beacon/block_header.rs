use super::*;

/// According to Ethereum spec [v1.4.0](https://github.com/ethereum/consensus-specs/blob/v1.4.0/specs/phase0/beacon-chain.md#beaconblockheader).
#[derive(Debug, Clone, Decode, Encode, Deserialize, PartialEq, Eq, tree_hash_derive::TreeHash)]
pub struct BlockHeader {
    #[serde(deserialize_with = "utils::deserialize_u64")]
    pub slot: u64,
    #[serde(deserialize_with = "utils::deserialize_u64")]
    pub proposer_index: u64,
    pub parent_root: Hash256,
    pub state_root: Hash256,
    pub body_root: Hash256,
}

impl BlockHeader {
    /// The block root, i.e. SSZ `hash_tree_root` of the header.
    pub fn block_root(&self) -> Hash256 {
        self.tree_hash_root()
    }
}
