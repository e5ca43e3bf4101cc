use std::{future::Future, sync::Arc, time::Duration};

use anyhow::{Context, Result as AnyResult};
use ethereum_beacon_client::BeaconClient;
use ethereum_common::{Hash256, Slot};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::{
    beacon::{BeaconSource, CheckpointStore, Protocol, Syncer},
    cli::ImportExecutionHeaderArgs,
    config::Config,
    hex_utils, keypair,
    parachain::{
        Connection, ExtrinsicSubmitter, ParachainWriter, WriterSettings, IMPORT_EXECUTION_HEADER,
        IMPORT_FINALIZED_HEADER,
    },
};

/// Progress of the import. Transitions are strictly linear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum State {
    Idle,
    Connected,
    FinalizedFetched,
    FinalizedSubmitted,
    ExecutionProofBuilt,
    ExecutionSubmitted,
    Done,
}

#[derive(Debug, Clone)]
pub struct ImportRequest {
    /// Root of the beacon block whose execution header is imported.
    pub beacon_header: Hash256,
    /// Finalized block to prove against. The latest one if `None`.
    pub finalized_header: Option<Hash256>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    pub finalized_block_root: Hash256,
    pub slot: Slot,
    pub execution_slot: Slot,
    pub finalized_included_in: Hash256,
    pub execution_included_in: Hash256,
}

#[derive(Debug, thiserror::Error)]
#[error("Operation '{0}' was cancelled")]
pub struct Cancelled(pub &'static str);

/// Imports a finalized beacon header and then the execution header of a block
/// it attests.
pub struct ImportPipeline<'a, S, C> {
    syncer: Syncer<'a, S>,
    writer: ParachainWriter<C>,
    state: State,
}

impl<'a, S: BeaconSource, C: ExtrinsicSubmitter> ImportPipeline<'a, S, C> {
    pub fn new(syncer: Syncer<'a, S>, writer: ParachainWriter<C>) -> Self {
        Self {
            syncer,
            writer,
            state: State::Idle,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    fn advance(&mut self, state: State) {
        log::debug!("Import state: {:?} -> {state:?}", self.state);

        self.state = state;
    }

    /// Runs the import to completion. The writer pool is stopped and drained
    /// on exit regardless of the result.
    pub async fn run(
        &mut self,
        request: &ImportRequest,
        cancel: &CancellationToken,
    ) -> AnyResult<ImportOutcome> {
        let mut tasks = JoinSet::new();

        let result = self.execute(request, cancel, &mut tasks).await;

        self.writer.stop();
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                log::error!("Parachain writer worker failed: {e}");
            }
        }

        result
    }

    async fn execute(
        &mut self,
        request: &ImportRequest,
        cancel: &CancellationToken,
        tasks: &mut JoinSet<()>,
    ) -> AnyResult<ImportOutcome> {
        self.writer
            .start(cancel, tasks)
            .await
            .context("start parachain writer")?;
        self.advance(State::Connected);

        let finalized_update = cancellable(cancel, "get finalized update", async {
            match request.finalized_header {
                Some(root) => self.syncer.get_finalized_update_at(root).await,
                None => self.syncer.get_finalized_update().await,
            }
        })
        .await?
        .context("get finalized update")?;
        self.advance(State::FinalizedFetched);

        let checkpoint = finalized_update.checkpoint();

        log::info!(
            "Importing finalized header {:?} at slot #{}",
            checkpoint.finalized_block_root,
            checkpoint.slot
        );

        let finalized_included_in = self
            .writer
            .write_and_watch(IMPORT_FINALIZED_HEADER, &finalized_update.payload)
            .await
            .context("write finalized header to parachain")?;
        self.advance(State::FinalizedSubmitted);

        if let Err(e) = self.syncer.cache_checkpoint(&checkpoint).await {
            log::warn!(
                "Failed to cache checkpoint at slot #{}: {e}",
                checkpoint.slot
            );
        }

        let update = cancellable(
            cancel,
            "get header update",
            self.syncer
                .get_header_update(request.beacon_header, &checkpoint),
        )
        .await?
        .context("get header update")?;
        self.advance(State::ExecutionProofBuilt);

        let execution_slot = update.header.slot;

        log::info!(
            "Importing execution header #{} of beacon block {:?} at slot #{execution_slot}",
            update.execution_header.block_number,
            request.beacon_header
        );

        let execution_included_in = self
            .writer
            .write_and_watch(IMPORT_EXECUTION_HEADER, &update)
            .await
            .context("write execution header to parachain")?;
        self.advance(State::ExecutionSubmitted);

        self.advance(State::Done);

        Ok(ImportOutcome {
            finalized_block_root: checkpoint.finalized_block_root,
            slot: checkpoint.slot,
            execution_slot,
            finalized_included_in,
            execution_included_in,
        })
    }
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    operation: &'static str,
    future: impl Future<Output = T>,
) -> Result<T, Cancelled> {
    tokio::select! {
        biased;

        _ = cancel.cancelled() => Err(Cancelled(operation)),
        output = future => Ok(output),
    }
}

pub async fn run(args: ImportExecutionHeaderArgs, cancel: CancellationToken) -> AnyResult<()> {
    let request = ImportRequest {
        beacon_header: hex_utils::decode_h256(&args.beacon_header)
            .context("parse beacon header root")?,
        finalized_header: args
            .finalized_header
            .as_deref()
            .map(hex_utils::decode_h256)
            .transpose()
            .context("parse finalized header root")?,
    };

    let config = Config::load(&args.config_args.config).context("load config")?;
    let protocol = Protocol::new(
        config.spec(args.config_args.network),
        config.sink.parachain.header_redundancy,
    );

    let keypair = keypair::load(&args.parachain_args.private_key_file, keypair::SS58_PREFIX)
        .context("load private key")?;

    let beacon_client = BeaconClient::new(
        args.beacon_args.beacon_endpoint.clone(),
        args.beacon_args.beacon_timeout.map(Duration::from_secs),
    )
    .await
    .context("create beacon client")?;
    beacon_client
        .check_health()
        .await
        .context("check beacon node health")?;

    let mut connection = Connection::new(args.parachain_args.endpoint.clone(), keypair);
    connection
        .connect(&cancel)
        .await
        .context("connect to parachain")?;

    let data_store = &config.source.beacon.data_store;
    let mut store = CheckpointStore::new(data_store.location.clone(), data_store.max_entries);
    store.connect().context("open checkpoint store")?;

    let writer = ParachainWriter::new(
        Arc::new(connection),
        WriterSettings::from(&config.sink.parachain),
    );
    let syncer = Syncer::new(beacon_client, &store, &protocol);

    let outcome = ImportPipeline::new(syncer, writer)
        .run(&request, &cancel)
        .await;

    store.close();

    let outcome = outcome?;

    log::info!(
        "Execution header of beacon block at slot #{} imported in parachain block {:?} \
        against finalized block {:?} at slot #{}",
        outcome.execution_slot,
        outcome.execution_included_in,
        outcome.finalized_block_root,
        outcome.slot
    );

    Ok(())
}
