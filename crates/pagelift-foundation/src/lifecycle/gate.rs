use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures::FutureExt;
use pagelift_kernel::{ExtractorLoader, IdlePolicy, LoadConfig, LoadError, PageExtractor};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::handle::{LifecyclePhase, LoadOutcome, PendingLoad, ResourceHandle};

/// Errors returned by [`LifecycleGate::acquire`].
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum GateError {
    /// The load this caller was waiting on failed.
    #[error("model load failed: {0}")]
    Load(#[from] LoadError),

    /// The gate has been drained for shutdown.
    #[error("lifecycle gate is closed")]
    Closed,
}

/// What an eviction attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictOutcome {
    /// The resource was dropped after being idle this long.
    Evicted { idle: Duration },
    /// Idle long enough, but an extraction is in flight. Retry next poll.
    InUse,
    /// Used recently.
    Fresh { idle: Duration },
    /// Nothing loaded (absent or still loading).
    NotLoaded,
}

/// Point-in-time view of the gate.
#[derive(Debug, Clone)]
pub struct GateStats {
    pub phase: LifecyclePhase,
    pub load_config: LoadConfig,
    /// Loads started since creation.
    pub loads: u64,
    /// Idle evictions since creation.
    pub evictions: u64,
    /// Time since last use, when loaded.
    pub idle_for: Option<Duration>,
    /// Extractions currently holding a lease.
    pub in_flight: usize,
}

struct GateInner {
    handle: Mutex<ResourceHandle>,
    loader: Arc<dyn ExtractorLoader>,
    in_flight: Arc<Semaphore>,
    max_in_flight: u32,
    closed: AtomicBool,
    loads: AtomicU64,
    evictions: AtomicU64,
}

/// Coordinates loading, use and eviction of the page extraction resource.
///
/// - `acquire()` loads the resource on demand. Concurrent callers during a
///   load all await that one load and all see its outcome.
/// - Each [`ResourceLease`] holds one of `max_concurrency` permits; eviction
///   needs every permit, so it never runs while an extraction is in flight.
///
/// Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct LifecycleGate {
    inner: Arc<GateInner>,
}

impl LifecycleGate {
    /// Create a gate that serializes extractions (one at a time).
    pub fn new(loader: Arc<dyn ExtractorLoader>, load_config: LoadConfig) -> Self {
        Self::with_max_concurrency(loader, load_config, 1)
    }

    /// Create a gate allowing up to `max_concurrency` simultaneous extractions
    /// against the loaded resource. Values below 1 are raised to 1.
    pub fn with_max_concurrency(
        loader: Arc<dyn ExtractorLoader>,
        load_config: LoadConfig,
        max_concurrency: u32,
    ) -> Self {
        let max_in_flight = max_concurrency.max(1);
        Self {
            inner: Arc::new(GateInner {
                handle: Mutex::new(ResourceHandle::new(load_config)),
                loader,
                in_flight: Arc::new(Semaphore::new(max_in_flight as usize)),
                max_in_flight,
                closed: AtomicBool::new(false),
                loads: AtomicU64::new(0),
                evictions: AtomicU64::new(0),
            }),
        }
    }

    /// Get exclusive-enough access to the resource, loading it if absent.
    ///
    /// Marks the resource as used now. The lease must be dropped when the
    /// extraction finishes.
    pub async fn acquire(&self) -> Result<ResourceLease, GateError> {
        loop {
            let (generation, resource) = self.resolve().await?;

            let permit = Arc::clone(&self.inner.in_flight)
                .acquire_owned()
                .await
                .map_err(|_| GateError::Closed)?;

            {
                let mut handle = self.inner.handle.lock();
                if handle.loaded_generation() == Some(generation) {
                    handle.touch(Instant::now());
                    return Ok(ResourceLease {
                        resource,
                        _permit: permit,
                        gate: Arc::clone(&self.inner),
                    });
                }
            }

            // Evicted (or reloaded) between resolving and getting a permit.
            debug!(generation, "resource changed before use, acquiring again");
        }
    }

    /// Load the resource now if absent, without using it.
    pub async fn preload(&self) -> Result<(), GateError> {
        self.resolve().await.map(|_| ())
    }

    /// Evict the resource if it has been idle longer than the policy allows
    /// and nothing is using it.
    ///
    /// Synchronous: inspection and eviction happen under one lock, so a
    /// cancelled caller can never leave the gate half-evicted.
    pub fn evict_if_idle(&self, policy: &IdlePolicy) -> EvictOutcome {
        let now = Instant::now();
        let (evicted, idle) = {
            let mut handle = self.inner.handle.lock();
            let Some(idle) = handle.idle_for(now) else {
                return EvictOutcome::NotLoaded;
            };
            if !policy.is_expired(idle) {
                return EvictOutcome::Fresh { idle };
            }
            let Ok(_quiesced) = self
                .inner
                .in_flight
                .try_acquire_many(self.inner.max_in_flight)
            else {
                return EvictOutcome::InUse;
            };
            (handle.clear(), idle)
        };

        if let Some(resource) = evicted {
            let variant = resource.variant().to_string();
            // Last strong reference held by the gate; the backend is freed here.
            drop(resource);
            self.inner.evictions.fetch_add(1, Ordering::SeqCst);
            info!(
                variant = %variant,
                idle_secs = idle.as_secs(),
                "model unloaded due to idle"
            );
        }
        EvictOutcome::Evicted { idle }
    }

    /// Wait for every in-flight extraction, release the resource and refuse
    /// further use.
    pub async fn drain(&self) {
        let quiesced = self
            .inner
            .in_flight
            .acquire_many(self.inner.max_in_flight)
            .await;
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.in_flight.close();

        let released = self.inner.handle.lock().clear();
        drop(quiesced);

        if let Some(resource) = released {
            info!(variant = %resource.variant(), "model released on shutdown");
        } else {
            debug!("lifecycle gate drained with no model loaded");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> GateStats {
        let handle = self.inner.handle.lock();
        GateStats {
            phase: handle.phase(),
            load_config: handle.load_config().clone(),
            loads: self.inner.loads.load(Ordering::SeqCst),
            evictions: self.inner.evictions.load(Ordering::SeqCst),
            idle_for: handle.idle_for(Instant::now()),
            in_flight: self.inner.max_in_flight as usize
                - self.inner.in_flight.available_permits(),
        }
    }

    /// Return the loaded resource, joining or starting a load as needed.
    async fn resolve(&self) -> Result<(u64, Arc<dyn PageExtractor>), GateError> {
        let (generation, pending) = {
            let mut handle = self.inner.handle.lock();
            if self.is_closed() {
                return Err(GateError::Closed);
            }
            if let Some(loaded) = handle.loaded() {
                return Ok(loaded);
            }
            match handle.pending() {
                Some(pending) => pending,
                None => self.begin_load(&mut handle),
            }
        };

        let outcome = pending.await;

        let mut handle = self.inner.handle.lock();
        match outcome {
            Ok(resource) => {
                handle.set(generation, Arc::clone(&resource), Instant::now());
                Ok((generation, resource))
            }
            Err(err) => {
                if handle.abandon_load(generation) {
                    warn!(generation, error = %err, "model load failed; gate reset to absent");
                }
                Err(GateError::Load(err))
            }
        }
    }

    /// `Absent → Loading`. The load runs on its own task so it completes even
    /// if every waiter goes away.
    fn begin_load(&self, handle: &mut ResourceHandle) -> (u64, PendingLoad) {
        let loader = Arc::clone(&self.inner.loader);
        let config = handle.load_config().clone();
        self.inner.loads.fetch_add(1, Ordering::SeqCst);
        info!(variant = %config.variant, device = %config.device, "loading page extraction model");

        let task = tokio::spawn(async move {
            let started = Instant::now();
            let outcome: LoadOutcome = loader.load(&config).await;
            match &outcome {
                Ok(_) => info!(
                    variant = %config.variant,
                    device = %config.device,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "model loaded"
                ),
                Err(e) => error!(
                    variant = %config.variant,
                    device = %config.device,
                    error = %e,
                    "model load failed"
                ),
            }
            outcome
        });

        let pending: PendingLoad = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(join_err) => Err(LoadError::Aborted(join_err.to_string())),
            }
        }
        .boxed()
        .shared();

        let generation = handle.begin_load(pending.clone());
        (generation, pending)
    }
}

impl fmt::Debug for LifecycleGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleGate")
            .field("handle", &*self.inner.handle.lock())
            .field("max_in_flight", &self.inner.max_in_flight)
            .finish()
    }
}

/// Use of the resource for one extraction.
///
/// Dereferences to the [`PageExtractor`]. Dropping the lease ends the use:
/// the last-use time is refreshed and the in-flight permit is returned.
pub struct ResourceLease {
    // Field order matters: the resource is released before the permit.
    resource: Arc<dyn PageExtractor>,
    _permit: OwnedSemaphorePermit,
    gate: Arc<GateInner>,
}

impl Deref for ResourceLease {
    type Target = dyn PageExtractor;

    fn deref(&self) -> &Self::Target {
        self.resource.as_ref()
    }
}

impl Drop for ResourceLease {
    fn drop(&mut self) {
        self.gate.handle.lock().touch(Instant::now());
    }
}

impl fmt::Debug for ResourceLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceLease")
            .field("variant", &self.resource.variant())
            .finish()
    }
}
