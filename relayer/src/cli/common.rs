use std::path::PathBuf;

use clap::Args;
use ethereum_common::network::Network;

#[derive(Args)]
pub struct BeaconRpcArgs {
    /// Address of the ethereum beacon RPC endpoint
    #[arg(
        long = "ethereum-beacon-rpc",
        visible_alias = "lodestar-endpoint",
        env = "ETH_BEACON_RPC"
    )]
    pub beacon_endpoint: String,

    /// Timeout in seconds for requests to the ethereum beacon RPC
    #[arg(
        long = "ethereum-beacon-rpc-timeout",
        env = "ETH_BEACON_RPC_TIMEOUT",
        default_value = "10"
    )]
    pub beacon_timeout: Option<u64>,
}

#[derive(Args)]
pub struct ParachainSignerArgs {
    /// Address of the parachain RPC endpoint
    #[arg(long = "parachain-endpoint", env = "PARACHAIN_ENDPOINT")]
    pub endpoint: String,

    /// File containing the private key of the relayer: a Substrate URI that
    /// identifies an account by a mnemonic phrase or provides default users
    /// from the keyring (e.g., "//Alice", "//Bob", etc.). The password for URI
    /// should be specified in the same line, separated by the ':' char
    #[arg(long = "private-key-file", env = "PRIVATE_KEY_FILE")]
    pub private_key_file: PathBuf,
}

#[derive(Args)]
pub struct RelayConfigArgs {
    /// Ethereum network: mainnet, sepolia, holesky or local
    #[arg(long = "network", env = "ETH_NETWORK")]
    pub network: Network,

    /// Path to the JSON config of the relayer
    #[arg(
        long = "config",
        env = "BEACON_RELAY_CONFIG",
        default_value = crate::config::DEFAULT_CONFIG_PATH
    )]
    pub config: PathBuf,
}
