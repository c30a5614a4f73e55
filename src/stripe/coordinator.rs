//! Stripe Coordinator
//!
//! Turns file-level requests into per-peer calls and folds the answers back into a
//! single outcome.
//!
//! - **Read/Write**: split into records, each record goes to `peers[record % n]`. Every
//!   owner is resolved before anything is sent, so an unavailable owner aborts the
//!   request up front. Per-record calls run concurrently, at most `MAX_IN_FLIGHT` at
//!   a time, and every call sent is joined.
//! - **Create/Delete**: sent to every peer; all must succeed. Nothing is rolled back
//!   when some peers fail.
//! - **Exists**: asked of every connected peer; true if any of them has the file.

use std::collections::HashMap;
use std::future::Future;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinSet;

use super::layout::{self, RecordPlan, RecordSlice};
use crate::cluster::{Cluster, PeerClient};
use crate::error::{DfsError, Result};

pub type RecordSizes = HashMap<String, u32>;

/// Most per-record calls one read or write keeps running at once.
const MAX_IN_FLIGHT: usize = 64;

#[derive(Debug, Clone, Copy)]
enum FileOp {
    Create,
    Delete,
}

impl FileOp {
    fn name(self) -> &'static str {
        match self {
            FileOp::Create => "create",
            FileOp::Delete => "delete",
        }
    }
}

pub struct StripeCoordinator {
    cluster: Arc<Cluster>,
    record_sizes: RwLock<Option<Arc<RecordSizes>>>,
    call_timeout: Duration,
}

impl StripeCoordinator {
    pub fn new(cluster: Arc<Cluster>, call_timeout: Duration) -> Self {
        Self {
            cluster,
            record_sizes: RwLock::new(None),
            call_timeout,
        }
    }

    pub fn cluster(&self) -> &Arc<Cluster> {
        &self.cluster
    }

    /// Replaces the whole filename → record size mapping.
    pub async fn init_mapping(&self, mapping: RecordSizes) -> Result<()> {
        if let Some((filename, size)) = mapping.iter().find(|(_, size)| **size == 0) {
            return Err(DfsError::InvalidRecordSize {
                filename: filename.clone(),
                size: *size,
            });
        }

        tracing::info!("Record size mapping set for {} file(s)", mapping.len());
        *self.record_sizes.write().await = Some(Arc::new(mapping));
        Ok(())
    }

    pub async fn has_mapping(&self) -> bool {
        self.record_sizes.read().await.is_some()
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.cluster.is_ready() {
            Ok(())
        } else {
            Err(DfsError::NotReady)
        }
    }

    async fn record_size(&self, filename: &str) -> Result<u32> {
        let mapping = self
            .record_sizes
            .read()
            .await
            .clone()
            .ok_or(DfsError::RecordMapUnset)?;

        mapping
            .get(filename)
            .copied()
            .ok_or_else(|| DfsError::UnknownRecordSize {
                filename: filename.to_string(),
            })
    }

    /// Looks up the live handle of every peer that owns a record of `plan`.
    ///
    /// The result is indexed by peer; peers owning nothing in the plan stay `None`.
    async fn resolve_owners(&self, plan: &RecordPlan) -> Result<Vec<Option<Arc<dyn PeerClient>>>> {
        let peers = self.cluster.peers().await;
        if peers.len() != self.cluster.target_size() {
            return Err(DfsError::NotReady);
        }

        let mut resolved: Vec<Option<Arc<dyn PeerClient>>> = vec![None; peers.len()];
        for (index, record) in plan.owners() {
            let peer = &peers[index];
            let handle = peer.live_handle().await.ok_or_else(|| {
                tracing::warn!(
                    "Peer {} owning record {} is disconnected",
                    peer.address,
                    record
                );
                DfsError::PeerUnavailable {
                    address: peer.address.clone(),
                }
            })?;
            resolved[index] = Some(handle);
        }

        Ok(resolved)
    }

    pub async fn write_bytes(&self, filename: &str, offset: u64, data: Vec<u8>) -> Result<()> {
        tracing::debug!(
            "Write {} bytes to file({}) at offset {}",
            data.len(),
            filename,
            offset
        );

        self.ensure_ready()?;
        let record_size = self.record_size(filename).await?;
        let plan = layout::plan(
            offset,
            data.len() as u64,
            record_size,
            self.cluster.target_size(),
        )?;
        if plan.is_empty() {
            return Ok(());
        }

        let owners = self.resolve_owners(&plan).await?;
        let timeout = self.call_timeout;

        let outcome = for_each_record(
            plan,
            &owners,
            |slice, handle| {
                let chunk = data[slice.range.clone()].to_vec();
                let filename = filename.to_string();
                let cluster = self.cluster.clone();
                async move {
                    let call = handle.write_bytes(&filename, slice.offset, chunk);
                    guarded(&cluster, &handle, timeout, call).await
                }
            },
            |_, _: ()| {},
        )
        .await;

        if let Err(e) = &outcome {
            tracing::warn!("Write to file({}) failed: {}", filename, e);
        }
        outcome
    }

    pub async fn read_bytes(&self, filename: &str, offset: u64, count: u64) -> Result<Vec<u8>> {
        tracing::debug!(
            "Read {} bytes from file({}) at offset {}",
            count,
            filename,
            offset
        );

        self.ensure_ready()?;
        let record_size = self.record_size(filename).await?;
        let plan = layout::plan(offset, count, record_size, self.cluster.target_size())?;
        if plan.is_empty() {
            return Ok(Vec::new());
        }

        let owners = self.resolve_owners(&plan).await?;
        let timeout = self.call_timeout;

        // plan() caps count, so the whole answer fits in one buffer
        let mut buffer = vec![0u8; count as usize];
        let outcome = for_each_record(
            plan,
            &owners,
            |slice, handle| {
                let filename = filename.to_string();
                let cluster = self.cluster.clone();
                async move {
                    let call = handle.read_bytes(&filename, slice.offset, record_size as u64);
                    guarded(&cluster, &handle, timeout, call)
                        .await
                        .and_then(|bytes| {
                            if bytes.len() == record_size as usize {
                                Ok((slice.range, bytes))
                            } else {
                                Err(DfsError::ShortRead {
                                    address: handle.address().to_string(),
                                    wanted: record_size as usize,
                                    got: bytes.len(),
                                })
                            }
                        })
                }
            },
            |_, (range, bytes): (Range<usize>, Vec<u8>)| buffer[range].copy_from_slice(&bytes),
        )
        .await;

        match outcome {
            Ok(()) => Ok(buffer),
            Err(e) => {
                tracing::warn!("Read from file({}) failed: {}", filename, e);
                Err(e)
            }
        }
    }

    pub async fn create_file(&self, filename: &str) -> Result<()> {
        self.on_every_peer(filename, FileOp::Create).await
    }

    pub async fn delete_file(&self, filename: &str) -> Result<()> {
        self.on_every_peer(filename, FileOp::Delete).await
    }

    async fn on_every_peer(&self, filename: &str, op: FileOp) -> Result<()> {
        tracing::debug!("{} file({}) on every peer", op.name(), filename);
        self.ensure_ready()?;

        let mut outcomes = Vec::new();
        let mut tasks = JoinSet::new();

        for (index, peer) in self.cluster.peers().await.into_iter().enumerate() {
            let index = index as u64;
            let Some(handle) = peer.live_handle().await else {
                outcomes.push((
                    index,
                    Err(DfsError::PeerUnavailable {
                        address: peer.address.clone(),
                    }),
                ));
                continue;
            };

            let filename = filename.to_string();
            let cluster = self.cluster.clone();
            let timeout = self.call_timeout;

            tasks.spawn(async move {
                let call = async {
                    match op {
                        FileOp::Create => handle.create_file(&filename).await,
                        FileOp::Delete => handle.delete_file(&filename).await,
                    }
                };
                (index, guarded(&cluster, &handle, timeout, call).await)
            });
        }

        outcomes.extend(join_all(tasks).await);
        outcomes.sort_by_key(|(index, _)| *index);

        match first_error(outcomes) {
            Some(e) => {
                tracing::warn!("Failed to {} file({}): {}", op.name(), filename, e);
                Err(e)
            }
            None => Ok(()),
        }
    }

    pub async fn file_exists(&self, filename: &str) -> Result<bool> {
        self.ensure_ready()?;

        let mut tasks = JoinSet::new();
        for (index, peer) in self.cluster.peers().await.into_iter().enumerate() {
            let Some(handle) = peer.live_handle().await else {
                tracing::debug!(
                    "Skipping disconnected peer {} for file({}) existence check",
                    peer.address,
                    filename
                );
                continue;
            };

            let filename = filename.to_string();
            let cluster = self.cluster.clone();
            let timeout = self.call_timeout;

            tasks.spawn(async move {
                let call = handle.file_exists(&filename);
                (index as u64, guarded(&cluster, &handle, timeout, call).await)
            });
        }

        let mut exists = false;
        for (_, result) in join_all(tasks).await {
            match result {
                Ok(found) => exists |= found,
                Err(e) => tracing::warn!("Failed to check file({}) existence: {}", filename, e),
            }
        }

        Ok(exists)
    }
}

/// Sends one call per record of `plan`, keeping at most `MAX_IN_FLIGHT` running.
///
/// Successful answers go to `sink` as they arrive. Once a record fails no further
/// record is sent, but every call already sent is joined. The error of the
/// lowest-numbered failing record wins.
async fn for_each_record<T, C, Fut, S>(
    mut plan: RecordPlan,
    owners: &[Option<Arc<dyn PeerClient>>],
    mut call: C,
    mut sink: S,
) -> Result<()>
where
    T: Send + 'static,
    C: FnMut(RecordSlice, Arc<dyn PeerClient>) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
    S: FnMut(u64, T),
{
    let mut tasks = JoinSet::new();
    let mut failure: Option<(u64, DfsError)> = None;

    loop {
        while failure.is_none() && tasks.len() < MAX_IN_FLIGHT {
            let Some(slice) = plan.next() else {
                break;
            };
            let record = slice.record;
            match owners.get(slice.peer).cloned().flatten() {
                Some(handle) => {
                    let pending = call(slice, handle);
                    tasks.spawn(async move { (record, pending.await) });
                }
                None => {
                    failure = Some((
                        record,
                        DfsError::Internal {
                            message: format!("no handle resolved for record {}", record),
                        },
                    ));
                }
            }
        }

        let (record, result) = match tasks.join_next().await {
            Some(Ok(outcome)) => outcome,
            Some(Err(e)) => {
                tracing::error!("Peer call task failed: {}", e);
                (u64::MAX, Err(DfsError::from(e)))
            }
            None => break,
        };

        match result {
            Ok(value) => sink(record, value),
            Err(e) => {
                if failure.as_ref().is_none_or(|(lowest, _)| record < *lowest) {
                    failure = Some((record, e));
                }
            }
        }
    }

    match failure {
        Some((_, e)) => Err(e),
        None => Ok(()),
    }
}

/// Bounds a peer call by `timeout`. A transport failure marks `handle` broken.
async fn guarded<T, F>(
    cluster: &Cluster,
    handle: &Arc<dyn PeerClient>,
    timeout: Duration,
    call: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let result = match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(DfsError::transport(
            handle.address(),
            format!("call timed out after {:?}", timeout),
        )),
    };

    if let Err(e) = &result
        && e.is_transport()
    {
        cluster.report_failure(handle).await;
    }

    result
}

/// Drains every task, then orders the outcomes by their key.
async fn join_all<T: Send + 'static>(
    mut tasks: JoinSet<(u64, Result<T>)>,
) -> Vec<(u64, Result<T>)> {
    let mut outcomes = Vec::with_capacity(tasks.len());

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                tracing::error!("Peer call task failed: {}", e);
                outcomes.push((u64::MAX, Err(DfsError::from(e))));
            }
        }
    }

    outcomes.sort_by_key(|(key, _)| *key);
    outcomes
}

fn first_error<T>(outcomes: Vec<(u64, Result<T>)>) -> Option<DfsError> {
    outcomes.into_iter().find_map(|(_, result)| result.err())
}
