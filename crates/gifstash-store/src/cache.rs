//! Tenant datastore cache.
//!
//! One open [`Database`] per tenant key, shared by every request that
//! resolves to that tenant. Requests hold a [`TenantLease`]; dropping the
//! last lease turns the handle into an eviction *candidate*. A single
//! background worker re-checks the live count under the registry lock
//! before closing, so a lease taken in the meantime keeps the handle open.
//!
//! Opening happens outside the registry lock behind a per-tenant slot
//! mutex: concurrent acquires of one tenant wait for a single open, while
//! other tenants proceed independently.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use redb::{Database, DatabaseError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::objects::NamespaceStore;

// ---------------------------------------------------------------------------
// StoreOpener
// ---------------------------------------------------------------------------

/// Opens the physical store behind a tenant key.
pub trait StoreOpener: Send + Sync {
    /// Open (creating if necessary) the store for `key`.
    ///
    /// Must fail with [`StoreError::Unavailable`] when the store is locked
    /// by another holder.
    fn open(&self, key: &str) -> StoreResult<Database>;
}

/// Opens tenant stores as redb files under a root directory.
#[derive(Clone, Debug)]
pub struct RedbOpener {
    root: PathBuf,
}

impl RedbOpener {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl StoreOpener for RedbOpener {
    fn open(&self, key: &str) -> StoreResult<Database> {
        let path = self.root.join(key);
        let db = Database::create(&path).map_err(|err| match err {
            DatabaseError::DatabaseAlreadyOpen => {
                StoreError::Unavailable(format!("{key} is locked by another holder"))
            }
            other => StoreError::Unavailable(format!("{key}: {other}")),
        })?;
        NamespaceStore::new(&db).initialize()?;
        Ok(db)
    }
}

/// Tenant keys become file names; reject anything that could escape the root.
fn validate_key(key: &str) -> StoreResult<()> {
    let bad = key.is_empty()
        || key == "."
        || key == ".."
        || key.contains(['/', '\\', '\0']);
    if bad {
        return Err(StoreError::InvalidDatastore(key.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Registry internals
// ---------------------------------------------------------------------------

struct Slot {
    key: String,
    refs: AtomicUsize,
    /// Generation of the most recent last-reference release.
    released: AtomicU64,
    db: Mutex<Option<Arc<Database>>>,
}

struct Eviction {
    key: String,
    generation: u64,
    at: Instant,
}

#[derive(Debug, PartialEq, Eq)]
enum EvictOutcome {
    Closed,
    Discarded,
    Busy,
    Superseded,
    Absent,
}

struct CacheInner {
    registry: Mutex<HashMap<String, Arc<Slot>>>,
    opener: Box<dyn StoreOpener>,
    evictions: mpsc::UnboundedSender<Eviction>,
    generations: AtomicU64,
    opens: AtomicU64,
    closes: AtomicU64,
}

impl CacheInner {
    /// Drop one live reference; the last one schedules eviction.
    fn release(&self, slot: &Slot) {
        if slot.refs.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        slot.released.fetch_max(generation, Ordering::AcqRel);
        let eviction = Eviction {
            key: slot.key.clone(),
            generation,
            at: Instant::now(),
        };
        if let Err(mpsc::error::SendError(eviction)) = self.evictions.send(eviction) {
            // Worker is gone (runtime shut down); fall back to closing here.
            self.evict(&eviction.key, Some(eviction.generation));
        }
    }

    /// Close and forget `key` if, under the lock, nobody holds it.
    ///
    /// With a `generation`, the request is stale once a later release has
    /// restarted the grace period, and the handle stays open.
    fn evict(&self, key: &str, generation: Option<u64>) -> EvictOutcome {
        let mut registry = self.registry.lock();
        let Some(slot) = registry.get(key) else {
            return EvictOutcome::Absent;
        };
        if slot.refs.load(Ordering::Acquire) != 0 {
            return EvictOutcome::Busy;
        }
        if let Some(generation) = generation {
            if slot.released.load(Ordering::Acquire) != generation {
                return EvictOutcome::Superseded;
            }
        }
        let Some(slot) = registry.remove(key) else {
            return EvictOutcome::Absent;
        };
        let taken = slot.db.lock().take();
        match taken {
            Some(db) => {
                if Arc::strong_count(&db) > 1 {
                    warn!(tenant = key, "closing datastore with outstanding handles");
                }
                drop(db);
                self.closes.fetch_add(1, Ordering::Relaxed);
                info!(tenant = key, "closed tenant datastore");
                EvictOutcome::Closed
            }
            None => EvictOutcome::Discarded,
        }
    }
}

async fn run_evictor(
    inner: Weak<CacheInner>,
    mut rx: mpsc::UnboundedReceiver<Eviction>,
    grace: Duration,
) {
    while let Some(eviction) = rx.recv().await {
        if !grace.is_zero() {
            tokio::time::sleep_until((eviction.at + grace).into()).await;
        }
        let Some(inner) = inner.upgrade() else { break };
        let Eviction { key, generation, .. } = eviction;
        match tokio::task::spawn_blocking(move || inner.evict(&key, Some(generation))).await {
            Ok(outcome) => debug!(?outcome, "tenant eviction candidate processed"),
            Err(err) => warn!(error = %err, "tenant eviction task failed"),
        }
    }
    debug!("tenant evictor stopped");
}

// ---------------------------------------------------------------------------
// TenantCache
// ---------------------------------------------------------------------------

/// Reference-counted registry of open tenant datastores.
///
/// Cloning is cheap and shares the registry. Construction spawns the
/// eviction worker and must happen inside a Tokio runtime.
#[derive(Clone)]
pub struct TenantCache {
    inner: Arc<CacheInner>,
}

impl TenantCache {
    /// Cache over redb files in `root`, closing idle stores after `grace`.
    pub fn new(root: impl Into<PathBuf>, grace: Duration) -> Self {
        Self::with_opener(Box::new(RedbOpener::new(root)), grace)
    }

    pub fn with_opener(opener: Box<dyn StoreOpener>, grace: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Arc::new(CacheInner {
            registry: Mutex::new(HashMap::new()),
            opener,
            evictions: tx,
            generations: AtomicU64::new(0),
            opens: AtomicU64::new(0),
            closes: AtomicU64::new(0),
        });
        tokio::spawn(run_evictor(Arc::downgrade(&inner), rx, grace));
        Self { inner }
    }

    /// Lease the store for `key`, opening it on first use.
    pub fn acquire(&self, key: &str) -> StoreResult<TenantLease> {
        validate_key(key)?;

        let slot = {
            let mut registry = self.inner.registry.lock();
            let slot = registry
                .entry(key.to_string())
                .or_insert_with(|| {
                    Arc::new(Slot {
                        key: key.to_string(),
                        refs: AtomicUsize::new(0),
                        released: AtomicU64::new(0),
                        db: Mutex::new(None),
                    })
                })
                .clone();
            slot.refs.fetch_add(1, Ordering::AcqRel);
            slot
        };
        let release = ReleaseGuard {
            slot,
            cache: Arc::clone(&self.inner),
        };

        let opened = {
            let mut cell = release.slot.db.lock();
            match cell.as_ref() {
                Some(db) => Ok(Arc::clone(db)),
                None => match self.inner.opener.open(key) {
                    Ok(db) => {
                        let db = Arc::new(db);
                        *cell = Some(Arc::clone(&db));
                        self.inner.opens.fetch_add(1, Ordering::Relaxed);
                        info!(tenant = key, "opened tenant datastore");
                        Ok(db)
                    }
                    Err(err) => Err(err),
                },
            }
        };

        match opened {
            Ok(db) => Ok(TenantLease { db, release }),
            Err(err) => {
                drop(release);
                self.inner.evict(key, None);
                warn!(tenant = key, error = %err, "tenant datastore unavailable");
                Err(err)
            }
        }
    }

    /// Give a lease back. Equivalent to dropping it.
    pub fn release(&self, lease: TenantLease) {
        drop(lease);
    }

    /// Whether `key` currently has a registry entry.
    pub fn is_resident(&self, key: &str) -> bool {
        self.inner.registry.lock().contains_key(key)
    }

    /// Live lease count for `key`, if resident.
    pub fn ref_count(&self, key: &str) -> Option<usize> {
        self.inner
            .registry
            .lock()
            .get(key)
            .map(|slot| slot.refs.load(Ordering::Acquire))
    }

    /// Number of resident tenants.
    pub fn resident_count(&self) -> usize {
        self.inner.registry.lock().len()
    }

    /// Physical opens performed so far.
    pub fn opens(&self) -> u64 {
        self.inner.opens.load(Ordering::Relaxed)
    }

    /// Physical closes performed so far.
    pub fn closes(&self) -> u64 {
        self.inner.closes.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for TenantCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantCache")
            .field("resident", &self.resident_count())
            .field("opens", &self.opens())
            .field("closes", &self.closes())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// TenantLease
// ---------------------------------------------------------------------------

struct ReleaseGuard {
    slot: Arc<Slot>,
    cache: Arc<CacheInner>,
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.cache.release(&self.slot);
    }
}

/// A live reference to one open tenant store.
///
/// Valid for the duration of one request. Dropping it releases the
/// reference exactly once.
pub struct TenantLease {
    // Field order matters: the database handle is dropped before the
    // release guard decrements the live count.
    db: Arc<Database>,
    release: ReleaseGuard,
}

impl TenantLease {
    /// The tenant key this lease was acquired for.
    pub fn key(&self) -> &str {
        &self.release.slot.key
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Object operations against this tenant's store.
    pub fn objects(&self) -> NamespaceStore<'_> {
        NamespaceStore::new(&self.db)
    }
}

impl std::fmt::Debug for TenantLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantLease").field("key", &self.key()).finish()
    }
}
