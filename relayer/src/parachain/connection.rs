use async_trait::async_trait;
use ethereum_common::Hash256;
use futures::StreamExt;
use subxt::{
    config::{polkadot::PolkadotExtrinsicParamsBuilder, PolkadotConfig},
    error::{MetadataError, RpcError},
    ext::subxt_core,
    tx::{Payload, Signer, TxStatus},
    Metadata, OnlineClient,
};
use tokio_util::sync::CancellationToken;

use super::{ChainError, Extrinsic, ExtrinsicStatus, ExtrinsicSubmitter, StatusStream};
use crate::keypair::Keypair;

/// Formatted JSON-RPC error object. Its presence means the node answered the
/// request, so repeating it gets the same answer.
const ERROR_RESPONSE: &str = "ErrorObject {";

/// Pool errors (codes 1013 and 1014) for an extrinsic whose nonce is already
/// taken by a pooled one.
const ALREADY_POOLED: [&str; 2] = ["Transaction Already Imported", "Priority is too low"];

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Failed to connect to parachain at {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: subxt::Error,
    },
    #[error("Connection to {0} was cancelled")]
    Cancelled(String),
    #[error("Not connected to parachain")]
    NotConnected,
}

/// Authenticated session with the parachain.
pub struct Connection {
    endpoint: String,
    keypair: Keypair,
    api: Option<OnlineClient<PolkadotConfig>>,
}

impl Connection {
    pub fn new(endpoint: String, keypair: Keypair) -> Self {
        Self {
            endpoint,
            keypair,
            api: None,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    pub fn api(&self) -> Result<&OnlineClient<PolkadotConfig>, ConnectionError> {
        self.api.as_ref().ok_or(ConnectionError::NotConnected)
    }

    pub async fn connect(&mut self, cancel: &CancellationToken) -> Result<(), ConnectionError> {
        if self.api.is_some() {
            return Ok(());
        }

        let secure = self.endpoint.starts_with("wss://") || self.endpoint.starts_with("https://");
        let connect = async {
            match secure {
                true => OnlineClient::<PolkadotConfig>::from_url(&self.endpoint).await,
                false => OnlineClient::<PolkadotConfig>::from_insecure_url(&self.endpoint).await,
            }
        };

        let api = tokio::select! {
            biased;

            _ = cancel.cancelled() => return Err(ConnectionError::Cancelled(self.endpoint.clone())),
            api = connect => api.map_err(|source| ConnectionError::Connect {
                endpoint: self.endpoint.clone(),
                source,
            })?,
        };

        log::info!(
            "Connected to parachain at {} (runtime spec version {}) as {}",
            self.endpoint,
            api.runtime_version().spec_version,
            self.keypair.address()
        );

        self.api = Some(api);

        Ok(())
    }
}

fn classify(error: subxt::Error) -> ChainError {
    let message = error.to_string();

    match error {
        subxt::Error::Rpc(RpcError::ClientError(_)) => classify_client_error(message),
        subxt::Error::Io(_)
        | subxt::Error::Rpc(RpcError::SubscriptionDropped)
        | subxt::Error::Rpc(RpcError::DisconnectedWillReconnect(_)) => {
            ChainError::Transport(message)
        }
        _ => ChainError::Rejected(message),
    }
}

/// RPC client errors are either error responses of the node or a failure to
/// get any response. Only the latter are worth repeating.
fn classify_client_error(message: String) -> ChainError {
    if !message.contains(ERROR_RESPONSE) {
        return ChainError::Transport(message);
    }

    match ALREADY_POOLED.iter().any(|marker| message.contains(marker)) {
        true => ChainError::Duplicate(message),
        false => ChainError::Rejected(message),
    }
}

fn not_connected(e: ConnectionError) -> ChainError {
    ChainError::Transport(e.to_string())
}

impl Payload for Extrinsic {
    fn encode_call_data_to(
        &self,
        metadata: &Metadata,
        out: &mut Vec<u8>,
    ) -> Result<(), subxt_core::Error> {
        let pallet = metadata
            .pallet_by_name(&self.pallet)
            .ok_or_else(|| MetadataError::PalletNameNotFound(self.pallet.clone()))?;
        let call = pallet
            .call_variant_by_name(&self.call)
            .ok_or_else(|| MetadataError::CallNameNotFound(self.call.clone()))?;

        out.push(pallet.index());
        out.push(call.index);
        out.extend_from_slice(&self.args);

        Ok(())
    }
}

#[async_trait]
impl ExtrinsicSubmitter for Connection {
    async fn account_nonce(&self) -> Result<u64, ChainError> {
        let account_id = <Keypair as Signer<PolkadotConfig>>::account_id(&self.keypair);

        self.api()
            .map_err(not_connected)?
            .tx()
            .account_nonce(&account_id)
            .await
            .map_err(classify)
    }

    async fn submit(&self, extrinsic: &Extrinsic, nonce: u64) -> Result<StatusStream, ChainError> {
        let params = PolkadotExtrinsicParamsBuilder::new().nonce(nonce).build();

        let progress = self
            .api()
            .map_err(not_connected)?
            .tx()
            .create_signed_offline(extrinsic, &self.keypair, params)
            .map_err(classify)?
            .submit_and_watch()
            .await
            .map_err(classify)?;

        log::debug!(
            "Extrinsic {} submitted with nonce {nonce}, hash: {:?}",
            extrinsic.name(),
            progress.extrinsic_hash()
        );

        let statuses = progress.then(|status| async move {
            match status.map_err(classify)? {
                TxStatus::InFinalizedBlock(in_block) => {
                    let block_hash = Hash256::from(in_block.block_hash().0);

                    match in_block.wait_for_success().await {
                        Ok(_) => Ok(ExtrinsicStatus::Finalized { block_hash }),
                        Err(subxt::Error::Runtime(e)) => Ok(ExtrinsicStatus::Rejected(format!(
                            "dispatch error in block {block_hash:?}: {e}"
                        ))),
                        Err(e) => Err(classify(e)),
                    }
                }
                TxStatus::Error { message }
                | TxStatus::Invalid { message }
                | TxStatus::Dropped { message } => Ok(ExtrinsicStatus::Rejected(message)),
                _ => Ok(ExtrinsicStatus::Pending),
            }
        });

        Ok(statuses.boxed())
    }
}
