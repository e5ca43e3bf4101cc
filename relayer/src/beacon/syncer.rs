use std::ops::Range;

use ethereum_common::{beacon::BlockHeader as BeaconBlockHeader, Hash256, Slot};

use super::{
    BeaconSource, BlockRootsTree, Checkpoint, CheckpointStore, ExecutionHeaderUpdate,
    FinalizedHeaderUpdate, FinalizedUpdate, Protocol, StoreError,
};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Beacon source error: {0:#}")]
    Source(anyhow::Error),
    #[error("Beacon block {0:?} not found")]
    NotFound(Hash256),
    #[error("Beacon block at slot #{slot} is not finalized yet (latest finalized slot: #{finalized_slot})")]
    NotFinalized { slot: Slot, finalized_slot: Slot },
    #[error("Unable to construct proof: {0}")]
    ProofConstruction(String),
    #[error("Checkpoint at slot #{checkpoint_slot} is stale for block at slot #{slot} (header redundancy: {header_redundancy})")]
    StaleCheckpoint {
        checkpoint_slot: Slot,
        slot: Slot,
        header_redundancy: u64,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Builds parachain updates from the beacon chain data.
pub struct Syncer<'a, S> {
    source: S,
    store: &'a CheckpointStore,
    protocol: &'a Protocol,
}

impl<'a, S: BeaconSource> Syncer<'a, S> {
    pub fn new(source: S, store: &'a CheckpointStore, protocol: &'a Protocol) -> Self {
        Self {
            source,
            store,
            protocol,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Update for the latest finalized beacon block.
    pub async fn get_finalized_update(&self) -> Result<FinalizedUpdate, SyncError> {
        let header = self
            .source
            .finalized_header()
            .await
            .map_err(SyncError::Source)?;

        log::info!("Latest finalized beacon block is at slot #{}", header.slot);

        self.build_finalized_update(header).await
    }

    /// Update for the finalized beacon block with the given root.
    pub async fn get_finalized_update_at(
        &self,
        root: Hash256,
    ) -> Result<FinalizedUpdate, SyncError> {
        let header = self
            .source
            .header_by_root(root)
            .await
            .map_err(SyncError::Source)?
            .ok_or(SyncError::NotFound(root))?;

        let finalized = self
            .source
            .finalized_header()
            .await
            .map_err(SyncError::Source)?;
        if header.slot > finalized.slot {
            return Err(SyncError::NotFinalized {
                slot: header.slot,
                finalized_slot: finalized.slot,
            });
        }

        self.build_finalized_update(header).await
    }

    async fn build_finalized_update(
        &self,
        header: BeaconBlockHeader,
    ) -> Result<FinalizedUpdate, SyncError> {
        let block_root = header.block_root();

        let block_roots_tree = match self.store.by_root(&block_root)? {
            Some(checkpoint) if checkpoint.is_consistent_with(&header) => {
                log::debug!("Using cached block roots for slot #{}", header.slot);

                checkpoint.block_roots_tree
            }
            _ => self.block_roots_tree(&header).await?,
        };

        let parent_index = self.protocol.block_root_index(header.slot.saturating_sub(1));
        if block_roots_tree.leaf(parent_index) != Some(&header.parent_root) {
            return Err(SyncError::ProofConstruction(format!(
                "block roots of slot #{} are inconsistent with its parent root",
                header.slot
            )));
        }

        Ok(FinalizedUpdate {
            payload: FinalizedHeaderUpdate {
                finalized_header: header,
                block_roots_root: block_roots_tree.root(),
            },
            finalized_header_block_root: block_root,
            block_roots_tree,
        })
    }

    /// Collects the `block_roots` vector of the state at `header.slot`.
    async fn block_roots_tree(
        &self,
        header: &BeaconBlockHeader,
    ) -> Result<BlockRootsTree, SyncError> {
        let window = self.protocol.historical_window(header.slot).ok_or_else(|| {
            SyncError::ProofConstruction(format!(
                "slot #{} is below the historical roots window of {} slots",
                header.slot,
                self.protocol.slots_per_historical_root()
            ))
        })?;

        let roots = self.fetch_block_roots(window.clone()).await?;

        let mut previous = match roots.first() {
            Some(Some(_)) => None,
            _ => Some(self.root_before(window.start).await?),
        };

        let mut leaves =
            vec![Hash256::zero(); self.protocol.slots_per_historical_root() as usize];
        for (slot, root) in window.zip(roots) {
            let root = match root.or(previous) {
                Some(root) => root,
                None => {
                    return Err(SyncError::ProofConstruction(format!(
                        "no block root for slot #{slot}"
                    )))
                }
            };

            leaves[self.protocol.block_root_index(slot)] = root;
            previous = Some(root);
        }

        BlockRootsTree::new(leaves).ok_or_else(|| {
            SyncError::ProofConstruction("slots per historical root is not a power of two".into())
        })
    }

    async fn fetch_block_roots(
        &self,
        slots: Range<Slot>,
    ) -> Result<Vec<Option<Hash256>>, SyncError> {
        let expected = (slots.end - slots.start) as usize;

        let roots = self
            .source
            .block_roots(slots.clone())
            .await
            .map_err(SyncError::Source)?;

        if roots.len() != expected {
            return Err(SyncError::ProofConstruction(format!(
                "incomplete block roots for slots [{}; {}): got {} of {expected}",
                slots.start,
                slots.end,
                roots.len()
            )));
        }

        Ok(roots)
    }

    /// Root of the latest block before `slot`, looking back at most one epoch.
    async fn root_before(&self, slot: Slot) -> Result<Hash256, SyncError> {
        let start = slot.saturating_sub(self.protocol.spec.slots_in_epoch);
        if start == slot {
            return Err(SyncError::ProofConstruction(format!(
                "no block before slot #{slot}"
            )));
        }

        self.fetch_block_roots(start..slot)
            .await?
            .into_iter()
            .rev()
            .flatten()
            .next()
            .ok_or_else(|| {
                SyncError::ProofConstruction(format!(
                    "no block roots found in slots [{start}; {slot})"
                ))
            })
    }

    /// Update proving the execution header of block `target` against `checkpoint`.
    pub async fn get_header_update(
        &self,
        target: Hash256,
        checkpoint: &Checkpoint,
    ) -> Result<ExecutionHeaderUpdate, SyncError> {
        let block = self
            .source
            .block_by_root(target)
            .await
            .map_err(SyncError::Source)?
            .ok_or(SyncError::NotFound(target))?;

        let slot = block.header.slot;
        if !self
            .protocol
            .is_within_redundancy_window(checkpoint.slot, slot)
        {
            return Err(SyncError::StaleCheckpoint {
                checkpoint_slot: checkpoint.slot,
                slot,
                header_redundancy: self.protocol.header_redundancy,
            });
        }

        let covered = self
            .protocol
            .historical_window(checkpoint.slot)
            .is_some_and(|window| window.contains(&slot));
        if !covered {
            return Err(SyncError::ProofConstruction(format!(
                "slot #{slot} is not covered by the block roots of checkpoint at slot #{}",
                checkpoint.slot
            )));
        }

        let tree = &checkpoint.block_roots_tree;
        let index = self.protocol.block_root_index(slot);
        if tree.leaf(index) != Some(&target) {
            return Err(SyncError::ProofConstruction(format!(
                "block {target:?} is not canonical at slot #{slot}"
            )));
        }

        let block_root_proof = tree
            .proof(index)
            .filter(|proof| tree.is_valid_proof(&target, index, proof))
            .ok_or_else(|| {
                SyncError::ProofConstruction(format!("invalid block roots tree at slot #{slot}"))
            })?;

        Ok(ExecutionHeaderUpdate {
            header: block.header,
            execution_header: block.execution_header,
            block_root_proof,
            block_roots_root: tree.root(),
        })
    }

    /// Remembers a checkpoint imported to the parachain.
    pub async fn cache_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), SyncError> {
        self.store.insert(checkpoint).await?;

        Ok(())
    }
}
