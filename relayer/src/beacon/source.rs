use std::ops::Range;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use ethereum_beacon_client::{BeaconClient, ErrorNotFound};
use ethereum_common::{
    beacon::{BlockHeader as BeaconBlockHeader, ExecutionHeader},
    Hash256, Slot,
};

/// Beacon block header together with the execution header from its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeaconBlock {
    pub header: BeaconBlockHeader,
    pub execution_header: ExecutionHeader,
}

/// Read access to the beacon chain.
#[async_trait]
pub trait BeaconSource: Send + Sync {
    async fn finalized_header(&self) -> AnyResult<BeaconBlockHeader>;

    async fn header_by_root(&self, root: Hash256) -> AnyResult<Option<BeaconBlockHeader>>;

    async fn block_by_root(&self, root: Hash256) -> AnyResult<Option<BeaconBlock>>;

    /// Block roots of the slots in the range, `None` for the skipped ones.
    async fn block_roots(&self, slots: Range<Slot>) -> AnyResult<Vec<Option<Hash256>>>;
}

fn not_found_as_none<T>(result: AnyResult<T>) -> AnyResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.downcast_ref::<ErrorNotFound>().is_some() => Ok(None),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl BeaconSource for BeaconClient {
    async fn finalized_header(&self) -> AnyResult<BeaconBlockHeader> {
        self.get_block_header_finalized().await
    }

    async fn header_by_root(&self, root: Hash256) -> AnyResult<Option<BeaconBlockHeader>> {
        not_found_as_none(self.get_block_header_by_root(&root).await)
    }

    async fn block_by_root(&self, root: Hash256) -> AnyResult<Option<BeaconBlock>> {
        let Some(header) = self.header_by_root(root).await? else {
            return Ok(None);
        };

        let execution_header = not_found_as_none(self.get_execution_header(&root).await)?;

        Ok(execution_header.map(|execution_header| BeaconBlock {
            header,
            execution_header,
        }))
    }

    async fn block_roots(&self, slots: Range<Slot>) -> AnyResult<Vec<Option<Hash256>>> {
        self.request_block_roots(slots.start, slots.end).await
    }
}
