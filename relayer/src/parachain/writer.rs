use std::{sync::Arc, time::Duration};

use ethereum_common::Hash256;
use futures::StreamExt;
use parity_scale_codec::Encode;
use tokio::{
    sync::{mpsc, oneshot, Mutex},
    task::JoinSet,
    time,
};
use tokio_util::sync::CancellationToken;

use super::{ChainError, Extrinsic, ExtrinsicStatus, ExtrinsicSubmitter, StatusStream};
use crate::config::ParachainConfig;

pub const DEFAULT_MAX_WATCHED_EXTRINSICS: usize = 8;

/// Upper bound of the delay between submission attempts.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct WriterSettings {
    /// Size of the worker pool, i.e. the limit of extrinsics in flight.
    pub max_watched_extrinsics: usize,
    pub inclusion_timeout: Duration,
    /// Attempts to repeat a submission that failed with a transport error.
    pub submission_retries: u32,
    pub retry_delay: Duration,
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self {
            max_watched_extrinsics: DEFAULT_MAX_WATCHED_EXTRINSICS,
            inclusion_timeout: Duration::from_secs(120),
            submission_retries: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}

impl From<&ParachainConfig> for WriterSettings {
    fn from(config: &ParachainConfig) -> Self {
        Self {
            max_watched_extrinsics: config.max_watched_extrinsics,
            inclusion_timeout: config.inclusion_timeout(),
            submission_retries: config.submission_retries,
            retry_delay: config.retry_delay(),
        }
    }
}

/// Outcome of watching a submitted extrinsic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InclusionStatus {
    Included { block_hash: Hash256 },
    Rejected(String),
    TimedOut,
}

#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    #[error("Failed to start parachain writer: {0}")]
    Start(ChainError),
    #[error("Parachain writer is not started")]
    NotStarted,
    #[error("Invalid extrinsic name '{0}', expected 'Pallet.call'")]
    InvalidName(String),
    #[error("Extrinsic {extrinsic} was rejected: {reason}")]
    Submission { extrinsic: String, reason: String },
    #[error("Extrinsic {extrinsic} was not finalized within {timeout:?}")]
    InclusionTimeout {
        extrinsic: String,
        timeout: Duration,
    },
    #[error("Extrinsic {extrinsic} with nonce {nonce} is already known to the chain: {reason}")]
    Duplicate {
        extrinsic: String,
        nonce: u64,
        reason: String,
    },
    #[error("Lost connection while processing extrinsic {extrinsic}: {reason}")]
    Connection { extrinsic: String, reason: String },
    #[error("Processing of extrinsic {0} was cancelled")]
    Cancelled(String),
}

type Reply = oneshot::Sender<Result<Hash256, WriterError>>;

struct Task {
    extrinsic: Extrinsic,
    nonce: u64,
    reply: Reply,
}

/// Submits extrinsics through a fixed pool of workers and waits for their finalization.
///
/// Nonces are assigned in the order of `write_and_watch` calls, so the chain
/// includes extrinsics of sequential calls in the same order. A failure
/// invalidates the cached nonce and the next call reads it from the chain again,
/// except for `WriterError::Duplicate` where the nonce stays held by the pooled
/// extrinsic.
///
/// Extrinsics in flight with nonces above a failed one are never finalized by
/// the chain and end with `WriterError::InclusionTimeout`.
pub struct ParachainWriter<C> {
    connection: Arc<C>,
    settings: WriterSettings,
    nonce: Arc<Mutex<Option<u64>>>,
    queue: Option<mpsc::Sender<Task>>,
    cancel: CancellationToken,
}

impl<C: ExtrinsicSubmitter> ParachainWriter<C> {
    pub fn new(connection: Arc<C>, settings: WriterSettings) -> Self {
        Self {
            connection,
            settings,
            nonce: Arc::new(Mutex::new(None)),
            queue: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn settings(&self) -> &WriterSettings {
        &self.settings
    }

    /// Spawns the worker pool into `tasks`. Cancelling `cancel` stops the pool.
    pub async fn start(
        &mut self,
        cancel: &CancellationToken,
        tasks: &mut JoinSet<()>,
    ) -> Result<(), WriterError> {
        let nonce = tokio::select! {
            biased;

            _ = cancel.cancelled() => return Err(WriterError::Cancelled("account nonce request".into())),
            nonce = self.connection.account_nonce() => nonce.map_err(WriterError::Start)?,
        };
        *self.nonce.lock().await = Some(nonce);

        let pool_size = self.settings.max_watched_extrinsics.max(1);
        let (sender, receiver) = mpsc::channel(pool_size);
        let receiver = Arc::new(Mutex::new(receiver));
        let pool_cancel = cancel.child_token();

        for id in 0..pool_size {
            let worker = Worker {
                id,
                connection: self.connection.clone(),
                queue: receiver.clone(),
                nonce: self.nonce.clone(),
                settings: self.settings.clone(),
                cancel: pool_cancel.clone(),
            };

            tasks.spawn(worker.run());
        }

        log::info!("Parachain writer started with {pool_size} workers, account nonce: {nonce}");

        self.queue = Some(sender);
        self.cancel = pool_cancel;

        Ok(())
    }

    /// Stops the worker pool. Pending calls fail with `WriterError::Cancelled`.
    pub fn stop(&mut self) {
        self.queue = None;
        self.cancel.cancel();
    }

    /// Submits `name` (`Pallet.call`) with the SCALE encoded `payload` and blocks
    /// until it is finalized. Returns the hash of the finalized block.
    pub async fn write_and_watch<P: Encode>(
        &self,
        name: &str,
        payload: &P,
    ) -> Result<Hash256, WriterError> {
        let queue = self.queue.as_ref().ok_or(WriterError::NotStarted)?;
        let extrinsic = Extrinsic::new(name, payload.encode())
            .ok_or_else(|| WriterError::InvalidName(name.to_string()))?;

        let nonce = self.next_nonce(name).await?;
        let (reply, response) = oneshot::channel();
        let task = Task {
            extrinsic,
            nonce,
            reply,
        };

        let enqueued = tokio::select! {
            biased;

            _ = self.cancel.cancelled() => false,
            sent = queue.send(task) => sent.is_ok(),
        };
        if !enqueued {
            self.invalidate_nonce().await;
            return Err(WriterError::Cancelled(name.to_string()));
        }

        tokio::select! {
            biased;

            _ = self.cancel.cancelled() => Err(WriterError::Cancelled(name.to_string())),
            response = response => response.unwrap_or_else(|_| Err(WriterError::Cancelled(name.to_string()))),
        }
    }

    async fn next_nonce(&self, name: &str) -> Result<u64, WriterError> {
        let mut nonce = self.nonce.lock().await;

        let next = match *nonce {
            Some(next) => next,
            None => self
                .connection
                .account_nonce()
                .await
                .map_err(|e| WriterError::Connection {
                    extrinsic: name.to_string(),
                    reason: e.to_string(),
                })?,
        };
        *nonce = Some(next + 1);

        Ok(next)
    }

    async fn invalidate_nonce(&self) {
        *self.nonce.lock().await = None;
    }
}

struct Worker<C> {
    id: usize,
    connection: Arc<C>,
    queue: Arc<Mutex<mpsc::Receiver<Task>>>,
    nonce: Arc<Mutex<Option<u64>>>,
    settings: WriterSettings,
    cancel: CancellationToken,
}

impl<C: ExtrinsicSubmitter> Worker<C> {
    async fn run(self) {
        loop {
            let task = {
                let mut queue = self.queue.lock().await;

                tokio::select! {
                    biased;

                    _ = self.cancel.cancelled() => None,
                    task = queue.recv() => task,
                }
            };

            let Some(Task {
                extrinsic,
                nonce,
                reply,
            }) = task
            else {
                break;
            };

            let result = tokio::select! {
                biased;

                _ = self.cancel.cancelled() => Err(WriterError::Cancelled(extrinsic.name())),
                result = self.process(&extrinsic, nonce) => result,
            };

            match &result {
                Err(e @ WriterError::Duplicate { .. }) => log::error!("Worker #{}: {e}", self.id),
                Err(e) => {
                    log::error!("Worker #{}: {e}", self.id);
                    *self.nonce.lock().await = None;
                }
                Ok(_) => {}
            }

            let _ = reply.send(result);
        }

        log::trace!("Parachain writer worker #{} stopped", self.id);
    }

    async fn process(&self, extrinsic: &Extrinsic, nonce: u64) -> Result<Hash256, WriterError> {
        let statuses = self.submit(extrinsic, nonce).await?;

        let status = watch_inclusion(statuses, self.settings.inclusion_timeout)
            .await
            .map_err(|e| WriterError::Connection {
                extrinsic: extrinsic.name(),
                reason: e.to_string(),
            })?;

        match status {
            InclusionStatus::Included { block_hash } => {
                log::info!(
                    "Extrinsic {} with nonce {nonce} finalized in block {block_hash:?}",
                    extrinsic.name()
                );

                Ok(block_hash)
            }
            InclusionStatus::Rejected(reason) => Err(WriterError::Submission {
                extrinsic: extrinsic.name(),
                reason,
            }),
            InclusionStatus::TimedOut => Err(WriterError::InclusionTimeout {
                extrinsic: extrinsic.name(),
                timeout: self.settings.inclusion_timeout,
            }),
        }
    }

    async fn submit(&self, extrinsic: &Extrinsic, nonce: u64) -> Result<StatusStream, WriterError> {
        let mut attempts = 0;

        loop {
            match self.connection.submit(extrinsic, nonce).await {
                Ok(statuses) => return Ok(statuses),
                Err(ChainError::Rejected(reason)) => {
                    return Err(WriterError::Submission {
                        extrinsic: extrinsic.name(),
                        reason,
                    })
                }
                Err(ChainError::Duplicate(reason)) => {
                    if attempts > 0 {
                        log::warn!(
                            "Extrinsic {} with nonce {nonce} reached the pool on an attempt whose response was lost",
                            extrinsic.name()
                        );
                    }

                    return Err(WriterError::Duplicate {
                        extrinsic: extrinsic.name(),
                        nonce,
                        reason,
                    });
                }
                Err(ChainError::Transport(e)) => {
                    attempts += 1;
                    if attempts > self.settings.submission_retries {
                        return Err(WriterError::Connection {
                            extrinsic: extrinsic.name(),
                            reason: e,
                        });
                    }

                    let delay = retry_backoff(self.settings.retry_delay, attempts);
                    log::warn!(
                        "Failed to submit extrinsic {} (attempt: {attempts}/{}): {e}. Retrying in {delay:?}",
                        extrinsic.name(),
                        self.settings.submission_retries,
                    );

                    time::sleep(delay).await;
                }
            }
        }
    }
}

/// Delay before the repeated submission number `attempt` (starting from 1):
/// `base` doubled on every attempt, up to `MAX_RETRY_DELAY`.
pub fn retry_backoff(base: Duration, attempt: u32) -> Duration {
    2u32.checked_pow(attempt.saturating_sub(1))
        .and_then(|factor| base.checked_mul(factor))
        .map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY))
}

/// Follows the statuses of a submitted extrinsic until it is finalized, rejected
/// or `timeout` expires. A closed stream counts as no finality observed.
pub async fn watch_inclusion(
    mut statuses: StatusStream,
    timeout: Duration,
) -> Result<InclusionStatus, ChainError> {
    let watch = async {
        while let Some(status) = statuses.next().await {
            match status? {
                ExtrinsicStatus::Pending => continue,
                ExtrinsicStatus::Finalized { block_hash } => {
                    return Ok(InclusionStatus::Included { block_hash })
                }
                ExtrinsicStatus::Rejected(reason) => return Ok(InclusionStatus::Rejected(reason)),
            }
        }

        log::warn!("Extrinsic status stream closed before finalization");

        Ok(InclusionStatus::TimedOut)
    };

    match time::timeout(timeout, watch).await {
        Ok(Err(ChainError::Rejected(reason) | ChainError::Duplicate(reason))) => {
            Ok(InclusionStatus::Rejected(reason))
        }
        Ok(status) => status,
        Err(_) => Ok(InclusionStatus::TimedOut),
    }
}
