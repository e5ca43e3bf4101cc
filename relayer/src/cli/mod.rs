use clap::{Args, Parser, Subcommand};

mod common;

pub use common::{BeaconRpcArgs, ParachainSignerArgs, RelayConfigArgs};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommands,
}

#[derive(Subcommand)]
pub enum CliCommands {
    /// Import the execution header of the provided beacon block
    ImportExecutionHeader(ImportExecutionHeaderArgs),
}

#[derive(Args)]
pub struct ImportExecutionHeaderArgs {
    /// Beacon block root whose execution header will be imported
    #[arg(long = "beacon-header", env = "BEACON_HEADER")]
    pub beacon_header: String,

    /// Finalized block root to prove the execution header against. The latest
    /// finalized block is used if not set
    #[arg(long = "finalized-header", env = "FINALIZED_HEADER")]
    pub finalized_header: Option<String>,

    #[clap(flatten)]
    pub parachain_args: ParachainSignerArgs,

    #[clap(flatten)]
    pub beacon_args: BeaconRpcArgs,

    #[clap(flatten)]
    pub config_args: RelayConfigArgs,
}
