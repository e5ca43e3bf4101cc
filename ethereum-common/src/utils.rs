use super::*;

pub fn calculate_epoch(slot: Slot, slots_in_epoch: u64) -> u64 {
    slot / slots_in_epoch
}

pub fn deserialize_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: &str = Deserialize::deserialize(deserializer)?;

    u64::from_str(value).map_err(<D::Error as de::Error>::custom)
}

pub fn deserialize_u256<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let val: &str = Deserialize::deserialize(deserializer)?;

    U256::from_dec_str(val).map_err(<D::Error as de::Error>::custom)
}

/// Formats a root the way beacon API paths expect it: `0x`-prefixed lowercase hex.
pub fn encode_root(root: &Hash256) -> String {
    let mut hex_encoded = [0u8; 66];
    hex_encoded[0] = b'0';
    hex_encoded[1] = b'x';

    match hex::encode_to_slice(root.as_bytes(), &mut hex_encoded[2..]) {
        Ok(()) => String::from_utf8_lossy(&hex_encoded).into_owned(),
        Err(_) => format!("{root:?}"),
    }
}
