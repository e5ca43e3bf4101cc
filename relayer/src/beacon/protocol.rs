use std::ops::Range;

use ethereum_common::{network::Spec, utils as eth_utils, Slot};

/// Chain parameters used to construct and validate proofs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Protocol {
    pub spec: Spec,
    /// Count of slots past the checkpoint during which the parachain still
    /// accepts headers proven against it.
    pub header_redundancy: u64,
}

impl Protocol {
    pub fn new(spec: Spec, header_redundancy: u64) -> Self {
        Self {
            spec,
            header_redundancy,
        }
    }

    pub fn slots_per_historical_root(&self) -> u64 {
        self.spec.slots_per_historical_root
    }

    pub fn block_roots_depth(&self) -> u32 {
        self.spec.slots_per_historical_root.trailing_zeros()
    }

    pub fn block_root_index(&self, slot: Slot) -> usize {
        (slot % self.spec.slots_per_historical_root) as usize
    }

    /// Slots whose block roots are kept in the state of a block at `slot`.
    /// `None` if the chain is younger than the window.
    pub fn historical_window(&self, slot: Slot) -> Option<Range<Slot>> {
        let start = slot.checked_sub(self.spec.slots_per_historical_root)?;

        Some(start..slot)
    }

    pub fn is_within_redundancy_window(&self, checkpoint_slot: Slot, slot: Slot) -> bool {
        slot >= checkpoint_slot.saturating_sub(self.header_redundancy)
    }

    pub fn compute_epoch(&self, slot: Slot) -> u64 {
        eth_utils::calculate_epoch(slot, self.spec.slots_in_epoch)
    }
}
