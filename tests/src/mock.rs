use std::{
    collections::{BTreeMap, HashMap, HashSet},
    future::Future,
    ops::Range,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{anyhow, Result as AnyResult};
use async_trait::async_trait;
use ethereum_common::{
    beacon::{BlockHeader as BeaconBlockHeader, ExecutionHeader},
    Hash256, Slot, H160, U256,
};
use futures::{stream, StreamExt};
use relayer::{
    beacon::{BeaconBlock, BeaconSource},
    parachain::{ChainError, Extrinsic, ExtrinsicStatus, ExtrinsicSubmitter, StatusStream},
};

/// Beacon chain with a block in every slot of `1..=head` except the skipped ones.
pub struct MockBeaconSource {
    blocks: HashMap<Hash256, BeaconBlock>,
    roots: BTreeMap<Slot, Hash256>,
    finalized_slot: Slot,
    /// Count of roots dropped from the end of every `block_roots` response.
    truncate_roots: usize,
    serve_roots: bool,
}

pub fn execution_header(slot: Slot) -> ExecutionHeader {
    ExecutionHeader {
        parent_hash: Hash256::from_low_u64_be(slot + 999),
        fee_recipient: H160::repeat_byte(0xfe),
        state_root: Hash256::from_low_u64_be(slot + 1_000),
        receipts_root: Hash256::from_low_u64_be(slot + 2_000),
        prev_randao: Hash256::from_low_u64_be(slot + 3_000),
        block_number: slot + 10_000,
        gas_limit: 30_000_000,
        gas_used: 21_000,
        timestamp: 1_700_000_000 + slot * 12,
        base_fee_per_gas: U256::from(7),
        block_hash: Hash256::from_low_u64_be(slot + 1_000_000),
    }
}

impl MockBeaconSource {
    pub fn new(head: Slot, finalized_slot: Slot, skipped: &[Slot]) -> Self {
        let mut source = Self {
            blocks: HashMap::new(),
            roots: BTreeMap::new(),
            finalized_slot,
            truncate_roots: 0,
            serve_roots: true,
        };

        let mut parent_root = Hash256::zero();
        for slot in (1..=head).filter(|slot| !skipped.contains(slot)) {
            let header = BeaconBlockHeader {
                slot,
                proposer_index: slot % 17,
                parent_root,
                state_root: Hash256::from_low_u64_be(slot),
                body_root: Hash256::from_low_u64_be(slot << 32),
            };
            parent_root = header.block_root();

            source.roots.insert(slot, parent_root);
            source.blocks.insert(
                parent_root,
                BeaconBlock {
                    header,
                    execution_header: execution_header(slot),
                },
            );
        }

        source
    }

    pub fn root(&self, slot: Slot) -> Hash256 {
        self.roots[&slot]
    }

    pub fn header(&self, slot: Slot) -> BeaconBlockHeader {
        self.blocks[&self.root(slot)].header.clone()
    }

    /// Adds a block at `slot` that is not part of the canonical chain.
    pub fn add_fork(&mut self, slot: Slot) -> Hash256 {
        let header = BeaconBlockHeader {
            slot,
            proposer_index: 42,
            parent_root: self.roots[&(slot - 1)],
            state_root: Hash256::repeat_byte(0xf0),
            body_root: Hash256::repeat_byte(0xf1),
        };
        let root = header.block_root();

        self.blocks.insert(
            root,
            BeaconBlock {
                header,
                execution_header: execution_header(slot),
            },
        );

        root
    }

    pub fn truncate_roots(mut self, count: usize) -> Self {
        self.truncate_roots = count;
        self
    }

    /// Makes every `block_roots` request fail.
    pub fn without_roots(mut self) -> Self {
        self.serve_roots = false;
        self
    }
}

#[async_trait]
impl BeaconSource for MockBeaconSource {
    async fn finalized_header(&self) -> AnyResult<BeaconBlockHeader> {
        let (_, root) = self
            .roots
            .range(..=self.finalized_slot)
            .next_back()
            .ok_or_else(|| anyhow!("No finalized block"))?;

        Ok(self.blocks[root].header.clone())
    }

    async fn header_by_root(&self, root: Hash256) -> AnyResult<Option<BeaconBlockHeader>> {
        Ok(self.blocks.get(&root).map(|block| block.header.clone()))
    }

    async fn block_by_root(&self, root: Hash256) -> AnyResult<Option<BeaconBlock>> {
        Ok(self.blocks.get(&root).cloned())
    }

    async fn block_roots(&self, slots: Range<Slot>) -> AnyResult<Vec<Option<Hash256>>> {
        if !self.serve_roots {
            return Err(anyhow!("Block roots are not available"));
        }

        let count = ((slots.end - slots.start) as usize).saturating_sub(self.truncate_roots);

        Ok(slots
            .take(count)
            .map(|slot| self.roots.get(&slot).copied())
            .collect())
    }
}

/// Extrinsic finalized by [`MockParachain`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Included {
    pub nonce: u64,
    pub name: String,
    pub args: Vec<u8>,
}

#[derive(Default)]
struct ChainState {
    /// Nonce of the account, i.e. the count of its finalized extrinsics.
    nonce: u64,
    included: Vec<Included>,
    /// Nonces of pooled extrinsics.
    pool: HashSet<u64>,
    /// Extrinsics with these names are declared invalid on block building.
    invalid: HashSet<String>,
    /// Extrinsics with these names are never finalized.
    stuck: HashSet<String>,
    transient_failures: u32,
    lost_responses: u32,
    submissions: usize,
}

impl ChainState {
    /// Builds a block with the pooled extrinsic if its nonce is the next one.
    fn try_finalize(&mut self, nonce: u64, name: &str, args: &[u8]) -> Option<ExtrinsicStatus> {
        if nonce > self.nonce {
            return None;
        }

        self.pool.remove(&nonce);

        if nonce < self.nonce {
            return Some(ExtrinsicStatus::Rejected(format!(
                "Transaction is outdated (nonce {nonce})"
            )));
        }

        if self.invalid.contains(name) {
            return Some(ExtrinsicStatus::Rejected(format!("{name} is invalid")));
        }

        self.nonce += 1;
        self.included.push(Included {
            nonce,
            name: name.to_string(),
            args: args.to_vec(),
        });

        Some(ExtrinsicStatus::Finalized {
            block_hash: Hash256::from_low_u64_be(1_000 + self.included.len() as u64),
        })
    }
}

/// Parachain with a single account. Extrinsics are finalized strictly in the
/// order of their nonces: one above the account nonce waits in the pool for
/// its predecessors. A nonce is consumed only by a finalized extrinsic.
pub struct MockParachain {
    state: Arc<Mutex<ChainState>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    finalization_delay: Duration,
}

impl MockParachain {
    pub fn new(finalization_delay: Duration) -> Self {
        Self {
            state: Default::default(),
            in_flight: Default::default(),
            max_in_flight: Default::default(),
            finalization_delay,
        }
    }

    pub fn reject(&self, name: &str) {
        self.state.lock().unwrap().invalid.insert(name.to_string());
    }

    pub fn stall(&self, name: &str) {
        self.state.lock().unwrap().stuck.insert(name.to_string());
    }

    /// The next `count` submissions fail with a transport error.
    pub fn fail_submissions(&self, count: u32) {
        self.state.lock().unwrap().transient_failures = count;
    }

    /// The next `count` submissions reach the pool but their responses are lost.
    pub fn lose_responses(&self, count: u32) {
        self.state.lock().unwrap().lost_responses = count;
    }

    pub fn included(&self) -> Vec<Included> {
        self.state.lock().unwrap().included.clone()
    }

    pub fn included_names(&self) -> Vec<String> {
        self.included().into_iter().map(|i| i.name).collect()
    }

    /// Calls of `submit`, including the failed ones.
    pub fn submissions(&self) -> usize {
        self.state.lock().unwrap().submissions
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Count of finalized extrinsics of the account.
    pub fn chain_nonce(&self) -> u64 {
        self.state.lock().unwrap().nonce
    }

    /// Resolves once the pooled extrinsic is finalized or dropped.
    fn finalize(
        &self,
        nonce: u64,
        name: String,
        args: Vec<u8>,
    ) -> impl Future<Output = ExtrinsicStatus> + Send + 'static {
        let state = self.state.clone();
        let in_flight = self.in_flight.clone();
        let block_time = self.finalization_delay.max(Duration::from_millis(1));

        async move {
            loop {
                tokio::time::sleep(block_time).await;

                let status = state.lock().unwrap().try_finalize(nonce, &name, &args);
                if let Some(status) = status {
                    in_flight.fetch_sub(1, Ordering::SeqCst);

                    return status;
                }
            }
        }
    }
}

#[async_trait]
impl ExtrinsicSubmitter for MockParachain {
    async fn account_nonce(&self) -> Result<u64, ChainError> {
        Ok(self.state.lock().unwrap().nonce)
    }

    async fn submit(&self, extrinsic: &Extrinsic, nonce: u64) -> Result<StatusStream, ChainError> {
        let name = extrinsic.name();

        let (stuck, lost) = {
            let mut state = self.state.lock().unwrap();
            state.submissions += 1;

            if state.transient_failures > 0 {
                state.transient_failures -= 1;
                return Err(ChainError::Transport("connection reset by peer".into()));
            }

            if nonce < state.nonce {
                return Err(ChainError::Rejected(format!(
                    "Invalid Transaction: Transaction is outdated (nonce {nonce})"
                )));
            }

            if !state.pool.insert(nonce) {
                return Err(ChainError::Duplicate(format!(
                    "Priority is too low (nonce {nonce})"
                )));
            }

            let lost = state.lost_responses > 0;
            if lost {
                state.lost_responses -= 1;
            }

            (state.stuck.contains(&name), lost)
        };

        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        if stuck {
            let ready = stream::once(async { Ok::<_, ChainError>(ExtrinsicStatus::Pending) });

            return match lost {
                true => Err(ChainError::Transport("request timeout".into())),
                false => Ok(ready.chain(stream::pending()).boxed()),
            };
        }

        let finalize = self.finalize(nonce, name, extrinsic.args.clone());

        if lost {
            tokio::spawn(finalize);

            return Err(ChainError::Transport("request timeout".into()));
        }

        let ready = stream::once(async { Ok::<_, ChainError>(ExtrinsicStatus::Pending) });
        let finalized = stream::once(async move { Ok::<_, ChainError>(finalize.await) });

        Ok(ready.chain(finalized).boxed())
    }
}
