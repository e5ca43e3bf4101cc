use std::{error::Error, fmt, time::Duration};

use anyhow::{anyhow, bail, Error as AnyError, Result as AnyResult};
use ethereum_common::{
    beacon::{BlockHeader as BeaconBlockHeader, ExecutionHeader},
    utils as eth_utils, Hash256, Slot,
};
use reqwest::{Client, ClientBuilder, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize};

pub mod slots_batch;

/// Count of concurrent requests issued while fetching a range of block roots.
pub const BLOCK_ROOTS_BATCH_SIZE: Slot = 64;

#[derive(Clone, Debug)]
pub struct ErrorNotFound;

impl fmt::Display for ErrorNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt("Not found (404)", f)
    }
}

impl Error for ErrorNotFound {}

#[allow(dead_code)]
#[derive(Deserialize)]
struct CodeResponse {
    code: u64,
    message: String,
}

#[derive(Deserialize, Debug)]
pub struct SignedBeaconBlockHeader {
    pub message: BeaconBlockHeader,
}

#[derive(Deserialize, Debug)]
pub struct BeaconBlockHeaderData {
    pub root: Hash256,
    pub header: SignedBeaconBlockHeader,
}

#[derive(Deserialize, Debug)]
pub struct BeaconBlockHeaderResponse {
    pub data: BeaconBlockHeaderData,
}

#[derive(Deserialize, Debug)]
struct BlockBody {
    execution_payload: ExecutionHeader,
}

#[derive(Deserialize, Debug)]
struct BlockMessage {
    body: BlockBody,
}

#[derive(Deserialize, Debug)]
struct SignedBlock {
    message: BlockMessage,
}

#[derive(Deserialize, Debug)]
struct BeaconBlockResponse {
    data: SignedBlock,
}

#[derive(Deserialize, Debug)]
struct BlockRoot {
    root: Hash256,
}

#[derive(Deserialize, Debug)]
struct BlockRootResponse {
    data: BlockRoot,
}

#[derive(Clone)]
pub struct BeaconClient {
    client: Client,
    rpc_url: String,
    timeout: Option<Duration>,
}

impl BeaconClient {
    pub async fn new(rpc_url: String, timeout: Option<Duration>) -> AnyResult<Self> {
        let client = ClientBuilder::new();
        let client = match timeout {
            Some(timeout) => client.timeout(timeout),
            None => client,
        };

        let client = client
            .build()
            .map_err(|e| anyhow!("Failed to create reqwest http client: {e}"))?;

        Ok(Self {
            client,
            rpc_url: rpc_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Checks that the node reports itself healthy.
    pub async fn check_health(&self) -> AnyResult<()> {
        let health = self
            .client
            .get(format!("{}/eth/v1/node/health", self.rpc_url))
            .send()
            .await?
            .status();

        if !health.is_success() {
            bail!(
                "Tried to connect to unhealthy beacon node. Status code returned: {}",
                health
            );
        }

        Ok(())
    }

    pub async fn get_block_header_finalized(&self) -> AnyResult<BeaconBlockHeader> {
        let url = format!("{}/eth/v1/beacon/headers/finalized", self.rpc_url);

        get::<BeaconBlockHeaderResponse>(self.client.get(&url))
            .await
            .map(|response| response.data.header.message)
    }

    pub async fn get_block_header_by_root(&self, root: &Hash256) -> AnyResult<BeaconBlockHeader> {
        let url = format!(
            "{}/eth/v1/beacon/headers/{}",
            self.rpc_url,
            eth_utils::encode_root(root)
        );

        get::<BeaconBlockHeaderResponse>(self.client.get(&url))
            .await
            .map(|response| response.data.header.message)
    }

    /// Fetches the execution payload header of the block with the given root.
    pub async fn get_execution_header(&self, root: &Hash256) -> AnyResult<ExecutionHeader> {
        let url = format!(
            "{}/eth/v2/beacon/blocks/{}",
            self.rpc_url,
            eth_utils::encode_root(root)
        );

        get::<BeaconBlockResponse>(self.client.get(&url))
            .await
            .map(|response| response.data.message.body.execution_payload)
    }

    pub async fn get_block_root(&self, slot: Slot) -> AnyResult<Hash256> {
        let url = format!("{}/eth/v1/beacon/blocks/{}/root", self.rpc_url, slot);

        get::<BlockRootResponse>(self.client.get(&url))
            .await
            .map(|response| response.data.root)
    }

    /// Requests block roots for the slots `[slot_start; slot_end)`. Skipped slots are `None`.
    pub async fn request_block_roots(
        &self,
        slot_start: Slot,
        slot_end: Slot,
    ) -> AnyResult<Vec<Option<Hash256>>> {
        let mut roots = Vec::with_capacity(slot_end.saturating_sub(slot_start) as usize);

        let Some(batches) = slots_batch::Iter::new(slot_start, slot_end, BLOCK_ROOTS_BATCH_SIZE)
        else {
            return Ok(roots);
        };

        for (batch_start, batch_end) in batches {
            let requests = (batch_start..batch_end).map(|slot| self.get_block_root(slot));

            for (slot, maybe_root) in
                (batch_start..batch_end).zip(futures::future::join_all(requests).await)
            {
                match maybe_root {
                    Ok(root) => roots.push(Some(root)),
                    Err(e) if e.downcast_ref::<ErrorNotFound>().is_some() => {
                        log::trace!("Slot #{slot} is skipped");
                        roots.push(None)
                    }
                    Err(e) => {
                        return Err(anyhow!(
                            "Failed to fetch block roots ([{slot_start}; {slot_end})): {e:?}"
                        ))
                    }
                }
            }
        }

        Ok(roots)
    }
}

async fn get<R: DeserializeOwned>(request_builder: RequestBuilder) -> AnyResult<R> {
    let bytes = request_builder
        .send()
        .await
        .map_err(AnyError::from)?
        .bytes()
        .await
        .map_err(AnyError::from)?;

    match serde_json::from_slice::<CodeResponse>(&bytes) {
        Ok(code_response) if code_response.code == 404 => Err(ErrorNotFound.into()),
        _ => Ok(serde_json::from_slice::<R>(&bytes).map_err(AnyError::from)?),
    }
}
