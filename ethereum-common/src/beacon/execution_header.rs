use super::*;

/// Fixed-size fields of the execution payload embedded in a beacon block body.
///
/// Deserializes from `body.execution_payload`; variable-size fields
/// (transactions, withdrawals, logs bloom, extra data) are ignored.
#[derive(Debug, Clone, Decode, Encode, Deserialize, PartialEq, Eq)]
pub struct ExecutionHeader {
    pub parent_hash: Hash256,
    pub fee_recipient: H160,
    pub state_root: Hash256,
    pub receipts_root: Hash256,
    pub prev_randao: Hash256,
    #[serde(deserialize_with = "utils::deserialize_u64")]
    pub block_number: u64,
    #[serde(deserialize_with = "utils::deserialize_u64")]
    pub gas_limit: u64,
    #[serde(deserialize_with = "utils::deserialize_u64")]
    pub gas_used: u64,
    #[serde(deserialize_with = "utils::deserialize_u64")]
    pub timestamp: u64,
    #[serde(deserialize_with = "utils::deserialize_u256")]
    pub base_fee_per_gas: U256,
    pub block_hash: Hash256,
}
