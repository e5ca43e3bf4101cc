use ethereum_common::Hash256;

pub fn decode_h256(hex: &str) -> anyhow::Result<Hash256> {
    let data: [u8; 32] = decode_byte_array(hex)?;
    Ok(data.into())
}

pub fn decode_byte_array<const LEN: usize>(hex: &str) -> anyhow::Result<[u8; LEN]> {
    decode_byte_vec(hex)?
        .try_into()
        .map_err(|_| anyhow::anyhow!("Invalid length, expected {LEN} bytes"))
}

pub fn decode_byte_vec(hex: &str) -> anyhow::Result<Vec<u8>> {
    let hex = hex.trim();
    let data = hex.strip_prefix("0x").unwrap_or(hex);
    Ok(hex::decode(data)?)
}
