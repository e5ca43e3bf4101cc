use super::*;
use core::fmt;

use Network::*;

/// Beacon chain preset parameters the relayer depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spec {
    pub slots_in_epoch: u64,
    pub slots_per_historical_root: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum Network {
    Mainnet,
    Sepolia,
    Holesky,
    /// Local testnet running the minimal preset.
    Local,
}

impl Network {
    pub const fn spec(&self) -> Spec {
        match self {
            Mainnet | Sepolia | Holesky => Spec {
                slots_in_epoch: SLOTS_PER_EPOCH,
                slots_per_historical_root: SLOTS_PER_HISTORICAL_ROOT,
            },
            Local => Spec {
                slots_in_epoch: 8,
                slots_per_historical_root: 64,
            },
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Mainnet),
            "sepolia" => Ok(Sepolia),
            "holesky" => Ok(Holesky),
            "local" => Ok(Local),
            other => Err(format!(
                "Unknown network '{other}', expected one of: mainnet, sepolia, holesky, local"
            )),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mainnet => "mainnet",
            Sepolia => "sepolia",
            Holesky => "holesky",
            Local => "local",
        };

        f.write_str(name)
    }
}
