//! Fixed-size connection pool, response notifier, and recovery loop.
//!
//! The pool owns the write halves of N long-lived connections to the
//! current leader; the read halves are consumed by one reader task each.
//! Readers demultiplex response lines into the pending-request table.
//! The first read failure poisons the whole generation: every reader
//! exits, the supervisor joins them all, and recovery runs exactly once
//! to rediscover the leader and install a replacement pool.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, trace, warn};

use crate::client::Shared;
use crate::discovery;
use crate::error::{ClientError, Result};
use crate::protocol;

/// One generation of the connection pool: an ordered, fixed-length set
/// of write halves, all connected to the same leader. Replaced as a
/// unit — a partially built pool is never installed.
pub(crate) struct ConnectionPool {
    writers: Vec<Mutex<OwnedWriteHalf>>,
    generation: u64,
}

impl ConnectionPool {
    /// Pool with no connections, installed on explicit close.
    pub(crate) fn empty(generation: u64) -> Self {
        Self {
            writers: Vec::new(),
            generation,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.writers.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn writer(&self, index: usize) -> &Mutex<OwnedWriteHalf> {
        &self.writers[index]
    }
}

/// Open exactly `size` connections to `leader`. All-or-nothing: the
/// first failed connection attempt fails the whole pool.
pub(crate) async fn connect_pool(
    leader: &str,
    size: usize,
    connect_timeout: Duration,
    generation: u64,
) -> Result<(ConnectionPool, Vec<BufReader<OwnedReadHalf>>)> {
    let mut writers = Vec::with_capacity(size);
    let mut readers = Vec::with_capacity(size);

    for index in 0..size {
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(leader))
            .await
            .map_err(|_| ClientError::Timeout)?
            .map_err(ClientError::ConnectionFailed)?;
        stream.set_nodelay(true)?;
        trace!(leader, index, "pooled connection established");

        let (read_half, write_half) = stream.into_split();
        readers.push(BufReader::new(read_half));
        writers.push(Mutex::new(write_half));
    }

    debug!(leader, size, generation, "connection pool established");
    Ok((ConnectionPool { writers, generation }, readers))
}

/// Spawn the response notifier for a freshly installed pool: one reader
/// task per connection plus a supervisor that joins them all and hands
/// off to recovery once the generation is lost.
///
/// The shutdown sender is registered before anything is spawned, so a
/// `close()` racing this call always finds a signal to flip.
pub(crate) async fn spawn_supervisor(shared: Arc<Shared>, readers: Vec<BufReader<OwnedReadHalf>>) {
    let generation = shared.generation.load(Ordering::SeqCst);
    let (shutdown_tx, _) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);

    // Subscribe every reader before any of them runs so an immediate
    // failure cannot be missed.
    let subscriptions: Vec<watch::Receiver<bool>> =
        readers.iter().map(|_| shutdown_tx.subscribe()).collect();

    *shared.pool_shutdown.lock().await = Some(shutdown_tx.clone());

    // If close landed between the pool install and this registration it
    // took the previous generation's sender; flip the fresh one so the
    // readers below exit immediately.
    if shared.closed.load(Ordering::SeqCst) {
        let _ = shutdown_tx.send(true);
    }

    tokio::spawn(async move {
        let mut handles = Vec::with_capacity(readers.len());
        for (index, (reader, shutdown_rx)) in
            readers.into_iter().zip(subscriptions).enumerate()
        {
            let shared = shared.clone();
            let shutdown_tx = shutdown_tx.clone();
            handles.push(tokio::spawn(run_reader(
                index,
                generation,
                reader,
                shared,
                shutdown_tx,
                shutdown_rx,
            )));
        }

        for handle in handles {
            let _ = handle.await;
        }

        if shared.closed.load(Ordering::SeqCst) {
            debug!(generation, "pool generation shut down by close");
            return;
        }

        warn!(generation, "connection pool lost, starting recovery");
        if let Err(e) = recover(shared.clone()).await {
            error!(error = %e, "recovery exhausted, client is unusable");
            shared.failed.store(true, Ordering::SeqCst);
        }
    });
}

/// Reader loop for one pooled connection. Any read failure (including
/// peer close) means the whole pool is no longer trustworthy: the
/// shutdown signal is flipped and every sibling reader exits too.
async fn run_reader(
    index: usize,
    generation: u64,
    mut reader: BufReader<OwnedReadHalf>,
    shared: Arc<Shared>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut line = String::new();
    loop {
        line.clear();
        tokio::select! {
            result = reader.read_line(&mut line) => match result {
                Ok(0) => {
                    debug!(index, generation, "connection closed by peer");
                    break;
                }
                Ok(_) => match protocol::parse_response(&line) {
                    Ok((id, payload)) => {
                        if !shared.pending.deliver(id, payload).await {
                            trace!(id, "dropping response with no waiting caller");
                        }
                    }
                    Err(e) => {
                        warn!(index, generation, error = %e, "malformed response line");
                    }
                },
                Err(e) => {
                    warn!(index, generation, error = %e, "read failed");
                    break;
                }
            },
            _ = shutdown_rx.changed() => break,
        }
    }
    // Poison the rest of the generation.
    let _ = shutdown_tx.send(true);
}

/// Bounded, backoff-driven leader rediscovery and pool rebuild. The
/// delay doubles each attempt; the pending table survives untouched, so
/// requests caught mid-flight simply time out on their own.
fn recover(
    shared: Arc<Shared>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send>> {
    Box::pin(async move {
    let mut delay = shared.config.recovery_base_delay;
    for attempt in 0..shared.config.recovery_attempts {
        info!(attempt, delay_ms = delay.as_millis() as u64, "leader rediscovery attempt");
        tokio::time::sleep(delay).await;
        delay = delay.saturating_mul(2);

        if shared.closed.load(Ordering::SeqCst) {
            debug!("client closed during recovery, abandoning");
            return Ok(());
        }

        match discovery::find_leader(&shared.members, shared.config.connect_timeout).await {
            Ok(leader) => {
                let generation = shared.generation.load(Ordering::SeqCst) + 1;
                let (pool, readers) = connect_pool(
                    &leader,
                    shared.config.pool_size,
                    shared.config.connect_timeout,
                    generation,
                )
                .await?;

                // Install under the write lock, re-checking for close:
                // the client may have been closed while discovery or the
                // reconnect was in flight, and a closed client must never
                // end up holding a live pool.
                {
                    let mut current = shared.pool.write().await;
                    if shared.closed.load(Ordering::SeqCst) {
                        debug!("client closed during recovery, discarding rebuilt pool");
                        return Ok(());
                    }
                    *current = Arc::new(pool);
                    shared.generation.store(generation, Ordering::SeqCst);
                }
                spawn_supervisor(shared.clone(), readers).await;
                info!(leader = %leader, generation, "connection pool rebuilt");
                return Ok(());
            }
            Err(e) => warn!(attempt, error = %e, "leader rediscovery failed"),
        }
    }
    Err(ClientError::RecoveryExhausted)
    })
}
