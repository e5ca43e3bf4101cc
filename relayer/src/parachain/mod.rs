use async_trait::async_trait;
use ethereum_common::Hash256;
use futures::stream::BoxStream;

pub mod connection;
pub mod writer;

pub use connection::{Connection, ConnectionError};
pub use writer::{InclusionStatus, ParachainWriter, WriterError, WriterSettings};

pub const IMPORT_FINALIZED_HEADER: &str = "EthereumBeaconClient.import_finalized_header";
pub const IMPORT_EXECUTION_HEADER: &str = "EthereumBeaconClient.import_execution_header";

/// Call of a parachain pallet with SCALE encoded arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extrinsic {
    pub pallet: String,
    pub call: String,
    pub args: Vec<u8>,
}

impl Extrinsic {
    /// `name` has the form `Pallet.call`.
    pub fn new(name: &str, args: Vec<u8>) -> Option<Self> {
        let (pallet, call) = name.split_once('.')?;
        if pallet.is_empty() || call.is_empty() {
            return None;
        }

        Some(Self {
            pallet: pallet.to_string(),
            call: call.to_string(),
            args,
        })
    }

    pub fn name(&self) -> String {
        format!("{}.{}", self.pallet, self.call)
    }
}

/// Status of a submitted extrinsic as reported by the parachain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtrinsicStatus {
    /// Known to the chain but not finalized yet.
    Pending,
    Finalized { block_hash: Hash256 },
    Rejected(String),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ChainError {
    /// Network level failure, the request may succeed if repeated.
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Rejected by the chain: {0}")]
    Rejected(String),
    /// The pool already holds an extrinsic of the account with the same nonce.
    #[error("Already in the pool: {0}")]
    Duplicate(String),
}

pub type StatusStream = BoxStream<'static, Result<ExtrinsicStatus, ChainError>>;

/// Signed extrinsic submission on behalf of a single account.
#[async_trait]
pub trait ExtrinsicSubmitter: Send + Sync + 'static {
    /// Next nonce of the signing account according to the chain.
    async fn account_nonce(&self) -> Result<u64, ChainError>;

    /// Signs the extrinsic with the given nonce, submits it and returns the
    /// stream of its statuses.
    async fn submit(&self, extrinsic: &Extrinsic, nonce: u64) -> Result<StatusStream, ChainError>;
}
