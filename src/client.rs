//! Quadrille client: construction, request submission, typed operations.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, info, trace, warn};

use crate::bulk::BulkWrite;
use crate::discovery;
use crate::error::{ClientError, Result};
use crate::pending::{PendingRequests, RequestSequencer};
use crate::pool::{self, ConnectionPool};
use crate::protocol;
use crate::types::{Location, Neighbor};

/// Client configuration. Defaults match the reference policy: a pool of
/// 100 connections, a 1 second response timeout, and a recovery budget
/// of 4 attempts with doubling backoff from 1 second.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Number of pooled connections to the leader. Fixed for the life
    /// of the client; the pool never grows or shrinks.
    pub pool_size: usize,
    /// Timeout for establishing any single connection (and for the
    /// one-line discovery queries).
    pub connect_timeout: Duration,
    /// How long a submitted request waits for its correlated response.
    pub request_timeout: Duration,
    /// Recovery attempt budget after total pool loss.
    pub recovery_attempts: u32,
    /// Base delay for recovery backoff; doubles each attempt.
    pub recovery_base_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            pool_size: 100,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(1),
            recovery_attempts: 4,
            recovery_base_delay: Duration::from_secs(1),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_recovery_attempts(mut self, attempts: u32) -> Self {
        self.recovery_attempts = attempts;
        self
    }

    pub fn with_recovery_base_delay(mut self, delay: Duration) -> Self {
        self.recovery_base_delay = delay;
        self
    }
}

/// State shared between client handles, reader tasks, and the recovery
/// loop. The pool reference is swapped wholesale under the write lock;
/// everything else is mutated in place.
pub(crate) struct Shared {
    pub(crate) config: ClientConfig,
    pub(crate) members: Vec<String>,
    pub(crate) pool: RwLock<Arc<ConnectionPool>>,
    pub(crate) pending: PendingRequests,
    pub(crate) sequencer: RequestSequencer,
    pub(crate) generation: AtomicU64,
    pub(crate) pool_shutdown: Mutex<Option<Arc<watch::Sender<bool>>>>,
    pub(crate) closed: AtomicBool,
    pub(crate) failed: AtomicBool,
}

/// Client for a Quadrille cluster.
///
/// Owns a fixed-size pool of connections to the elected leader and
/// multiplexes concurrent requests over it. Cloning is cheap: clones
/// share the pool, the sequencer, and the pending-request table.
#[derive(Clone)]
pub struct QuadrilleClient {
    pub(crate) shared: Arc<Shared>,
}

impl QuadrilleClient {
    /// Connect using the default configuration.
    ///
    /// `seeds` is a comma-separated list of `host:port` cluster
    /// addresses; any one reachable seed suffices.
    pub async fn connect(seeds: &str) -> Result<Self> {
        Self::connect_with(seeds, ClientConfig::default()).await
    }

    /// Connect with an explicit configuration: resolve the member set
    /// from the seeds, locate the leader, and build the pool against it.
    pub async fn connect_with(seeds: &str, config: ClientConfig) -> Result<Self> {
        if config.pool_size == 0 {
            return Err(ClientError::Config("pool size must be at least 1".to_string()));
        }

        let members = discovery::resolve_members(seeds, config.connect_timeout).await?;
        let leader = discovery::find_leader(&members, config.connect_timeout).await?;
        let (connections, readers) =
            pool::connect_pool(&leader, config.pool_size, config.connect_timeout, 1).await?;

        info!(
            leader = %leader,
            members = members.len(),
            pool_size = config.pool_size,
            "connected to Quadrille cluster"
        );

        let shared = Arc::new(Shared {
            config,
            members,
            pool: RwLock::new(Arc::new(connections)),
            pending: PendingRequests::new(),
            sequencer: RequestSequencer::new(),
            generation: AtomicU64::new(1),
            pool_shutdown: Mutex::new(None),
            closed: AtomicBool::new(false),
            failed: AtomicBool::new(false),
        });
        pool::spawn_supervisor(shared.clone(), readers).await;

        Ok(Self { shared })
    }

    /// Submit a raw command and wait for its correlated response.
    ///
    /// The command is written to the pooled connection selected by
    /// `request_id % pool_size`; the caller then blocks on its private
    /// delivery channel for up to the configured request timeout.
    pub async fn submit(&self, command: &str) -> Result<String> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(ClientError::Closed);
        }
        if self.shared.failed.load(Ordering::SeqCst) {
            return Err(ClientError::RecoveryExhausted);
        }

        let id = self.shared.sequencer.next_id();
        let response = self.shared.pending.register(id).await;

        // Read lock only to grab the current pool reference; the write
        // itself happens outside, so a pool swap never waits on slow I/O.
        let pool = { self.shared.pool.read().await.clone() };
        if pool.is_empty() {
            self.shared.pending.cancel(id).await;
            return Err(ClientError::Closed);
        }

        let index = (id % pool.len() as u64) as usize;
        let line = protocol::encode_request(id, command);
        trace!(id, index, generation = pool.generation(), "submitting request");
        {
            let mut writer = pool.writer(index).lock().await;
            if let Err(e) = writer.write_all(line.as_bytes()).await {
                self.shared.pending.cancel(id).await;
                warn!(id, index, error = %e, "request write failed");
                return Err(ClientError::Io(e));
            }
        }

        match tokio::time::timeout(self.shared.config.request_timeout, response).await {
            Ok(Ok(payload)) => protocol::into_result(payload),
            Ok(Err(_)) => Err(ClientError::ConnectionClosed),
            Err(_) => {
                self.shared.pending.cancel(id).await;
                debug!(id, "request timed out");
                Err(ClientError::Timeout)
            }
        }
    }

    /// Fetch one location by id.
    pub async fn get(&self, location_id: &str) -> Result<Location> {
        let payload = self.submit(&format!("get {}", location_id)).await?;
        Ok(serde_json::from_str(payload.trim())?)
    }

    /// Insert a location with an arbitrary JSON data payload.
    pub async fn insert(
        &self,
        location_id: &str,
        latitude: f64,
        longitude: f64,
        data: &Value,
    ) -> Result<()> {
        let command = format!(
            "insert {} {},{} {}",
            location_id,
            latitude,
            longitude,
            serde_json::to_string(data)?
        );
        self.submit(&command).await?;
        Ok(())
    }

    /// Replace both coordinates and data of an existing location.
    pub async fn update(
        &self,
        location_id: &str,
        latitude: f64,
        longitude: f64,
        data: &Value,
    ) -> Result<()> {
        let command = format!(
            "update {} {},{} {}",
            location_id,
            latitude,
            longitude,
            serde_json::to_string(data)?
        );
        self.submit(&command).await?;
        Ok(())
    }

    /// Move a location without touching its data.
    pub async fn update_location(
        &self,
        location_id: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<()> {
        self.submit(&format!("updateloc {} {},{}", location_id, latitude, longitude))
            .await?;
        Ok(())
    }

    /// Replace a location's data without moving it.
    pub async fn update_data(&self, location_id: &str, data: &Value) -> Result<()> {
        self.submit(&format!(
            "updatedata {} {}",
            location_id,
            serde_json::to_string(data)?
        ))
        .await?;
        Ok(())
    }

    /// Delete a location.
    pub async fn delete(&self, location_id: &str) -> Result<()> {
        self.submit(&format!("del {}", location_id)).await?;
        Ok(())
    }

    /// Locations within `radius_m` meters of the given point, nearest
    /// first, at most `limit` results.
    pub async fn nearby(
        &self,
        latitude: f64,
        longitude: f64,
        radius_m: u32,
        limit: u32,
    ) -> Result<Vec<Neighbor>> {
        let payload = self
            .submit(&format!(
                "neighbors {},{} {} {}",
                latitude, longitude, radius_m, limit
            ))
            .await?;
        Ok(serde_json::from_str(payload.trim())?)
    }

    /// Execute a batch of mutations as a single `bulkwrite` command.
    pub async fn execute_bulk(&self, bulk: &BulkWrite) -> Result<()> {
        if bulk.is_empty() {
            return Err(ClientError::EmptyBulkWrite);
        }
        let payload = serde_json::to_string(bulk.operations())?;
        self.submit(&format!("bulkwrite {}", payload)).await?;
        Ok(())
    }

    /// The resolved cluster member addresses.
    pub fn members(&self) -> &[String] {
        &self.shared.members
    }

    /// Current pool generation: 1 after construction, bumped once per
    /// recovery cycle.
    pub fn pool_generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    /// Shut the client down: stops the reader tasks without triggering
    /// recovery and releases every pooled connection. Subsequent
    /// submissions fail with [`ClientError::Closed`].
    pub async fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(shutdown) = self.shared.pool_shutdown.lock().await.take() {
            let _ = shutdown.send(true);
        }
        let generation = self.shared.generation.load(Ordering::SeqCst);
        *self.shared.pool.write().await = Arc::new(ConnectionPool::empty(generation));
        info!("client closed");
    }
}

impl std::fmt::Debug for QuadrilleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuadrilleClient")
            .field("members", &self.shared.members)
            .field("pool_size", &self.shared.config.pool_size)
            .field("generation", &self.shared.generation.load(Ordering::SeqCst))
            .finish()
    }
}
