use std::path::PathBuf;

use ethereum_common::{Hash256, Slot};
use parity_scale_codec::{Decode, Encode};

use super::Checkpoint;

const CHECKPOINTS_TREE: &str = "checkpoints";
const ROOTS_TREE: &str = "roots";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Checkpoint store is not connected")]
    NotConnected,
    #[error("Checkpoint store database error: {0}")]
    Database(#[from] sled::Error),
    #[error("Failed to decode stored checkpoint: {0}")]
    Decode(#[from] parity_scale_codec::Error),
}

struct Trees {
    db: sled::Db,
    checkpoints: sled::Tree,
    roots: sled::Tree,
}

/// Capacity-bounded cache of checkpoints, keyed by slot and indexed by
/// finalized block root. The oldest slot is evicted first.
pub struct CheckpointStore {
    location: Option<PathBuf>,
    max_entries: usize,
    trees: Option<Trees>,
}

impl CheckpointStore {
    pub fn new(location: PathBuf, max_entries: usize) -> Self {
        Self {
            location: Some(location),
            max_entries,
            trees: None,
        }
    }

    /// Store that is removed once closed.
    pub fn temporary(max_entries: usize) -> Self {
        Self {
            location: None,
            max_entries,
            trees: None,
        }
    }

    pub fn connect(&mut self) -> Result<(), StoreError> {
        if self.trees.is_some() {
            return Ok(());
        }

        let config = match &self.location {
            Some(location) => sled::Config::new().path(location),
            None => sled::Config::new().temporary(true),
        };

        let db = config.open()?;
        let checkpoints = db.open_tree(CHECKPOINTS_TREE)?;
        let roots = db.open_tree(ROOTS_TREE)?;

        log::debug!(
            "Checkpoint store opened at {:?} with {} entries",
            self.location,
            checkpoints.len()
        );

        self.trees = Some(Trees {
            db,
            checkpoints,
            roots,
        });

        Ok(())
    }

    /// Flushes and releases the database. Safe to call on a never connected store.
    pub fn close(&mut self) {
        let Some(trees) = self.trees.take() else {
            return;
        };

        if let Err(e) = trees.db.flush() {
            log::error!("Failed to flush checkpoint store: {e}");
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    fn trees(&self) -> Result<&Trees, StoreError> {
        self.trees.as_ref().ok_or(StoreError::NotConnected)
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.trees()?.checkpoints.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.trees()?.checkpoints.is_empty())
    }

    /// Inserts the checkpoint, evicting the oldest ones above capacity.
    pub async fn insert(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        let trees = self.trees()?;

        let previous = trees
            .checkpoints
            .insert(checkpoint.slot.to_be_bytes(), checkpoint.encode())?;
        if let Some(previous) = previous {
            let previous = Checkpoint::decode(&mut &previous[..])?;
            trees.roots.remove(previous.finalized_block_root.as_bytes())?;
        }

        trees.roots.insert(
            checkpoint.finalized_block_root.as_bytes(),
            checkpoint.slot.to_be_bytes().to_vec(),
        )?;

        while trees.checkpoints.len() > self.max_entries {
            let Some((_, evicted)) = trees.checkpoints.pop_min()? else {
                break;
            };

            let evicted = Checkpoint::decode(&mut &evicted[..])?;
            trees.roots.remove(evicted.finalized_block_root.as_bytes())?;

            log::debug!("Evicted checkpoint at slot #{}", evicted.slot);
        }

        trees.db.flush_async().await?;

        Ok(())
    }

    pub fn by_slot(&self, slot: Slot) -> Result<Option<Checkpoint>, StoreError> {
        self.trees()?
            .checkpoints
            .get(slot.to_be_bytes())?
            .map(|bytes| Checkpoint::decode(&mut &bytes[..]).map_err(StoreError::from))
            .transpose()
    }

    pub fn by_root(&self, root: &Hash256) -> Result<Option<Checkpoint>, StoreError> {
        let Some(slot) = self.trees()?.roots.get(root.as_bytes())? else {
            return Ok(None);
        };

        let slot = <[u8; 8]>::try_from(&slot[..])
            .map(Slot::from_be_bytes)
            .map_err(|_| parity_scale_codec::Error::from("Malformed slot key"))?;

        self.by_slot(slot)
    }

    pub fn latest(&self) -> Result<Option<Checkpoint>, StoreError> {
        self.trees()?
            .checkpoints
            .last()?
            .map(|(_, bytes)| Checkpoint::decode(&mut &bytes[..]).map_err(StoreError::from))
            .transpose()
    }
}

impl Drop for CheckpointStore {
    fn drop(&mut self) {
        self.close();
    }
}
