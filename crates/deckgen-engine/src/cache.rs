use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use deckgen_core::{JsonMap, ResolveError};
use deckgen_telemetry::MetricsRecorder;

/// How long a resolve waits on another thread's in-flight production before
/// treating the wait as a cycle. Producers are file reads and cheap scans;
/// anything pending this long is two threads waiting on each other.
const PENDING_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

enum CacheEntry {
    /// A producer is running on the given thread. The same thread asking
    /// again is a circular dependency; a different thread waits.
    Pending(ThreadId),
    Ready(Arc<JsonMap>),
}

/// Process-wide memoization keyed by source name.
///
/// The lock is never held while a producer runs, so producers may resolve
/// other sources freely. Each name is produced at most once per cache
/// generation; re-entrant resolution of an in-flight name fails fast instead
/// of recursing.
pub struct SourceCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    generation: AtomicU64,
    wait_timeout: Duration,
    metrics: RwLock<Option<Arc<MetricsRecorder>>>,
}

impl SourceCache {
    pub fn new() -> Self {
        Self::with_wait_timeout(PENDING_WAIT_TIMEOUT)
    }

    pub fn with_wait_timeout(wait_timeout: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(1),
            wait_timeout,
            metrics: RwLock::new(None),
        }
    }

    /// Attach a recorder; hits, misses, and producer runs are counted per
    /// source from then on.
    pub fn set_metrics(&self, metrics: Arc<MetricsRecorder>) {
        *self.metrics.write() = Some(metrics);
    }

    fn count(&self, counter: &str, name: &str) {
        if let Some(metrics) = self.metrics.read().as_ref() {
            metrics.counter_inc(counter, &[("source", name)], 1);
        }
    }

    /// Return the cached value for `name`, producing it on first access.
    pub fn resolve_with<F>(&self, name: &str, produce: F) -> Result<Arc<JsonMap>, ResolveError>
    where
        F: FnOnce() -> Result<JsonMap, ResolveError>,
    {
        let waiting_since = Instant::now();
        loop {
            {
                let mut entries = self.entries.lock();
                match entries.get(name) {
                    Some(CacheEntry::Ready(value)) => {
                        self.count("source_cache_hits", name);
                        return Ok(Arc::clone(value));
                    }
                    Some(CacheEntry::Pending(owner)) => {
                        if *owner == std::thread::current().id() {
                            return Err(ResolveError::CircularDependency(name.to_string()));
                        }
                        // Another request is producing this source; retry
                        // after it settles. A cycle split across threads
                        // never settles, so the wait is bounded.
                        if waiting_since.elapsed() >= self.wait_timeout {
                            return Err(ResolveError::CircularDependency(name.to_string()));
                        }
                    }
                    None => {
                        let _ = entries.insert(
                            name.to_string(),
                            CacheEntry::Pending(std::thread::current().id()),
                        );
                        break;
                    }
                }
            }
            std::thread::sleep(Duration::from_millis(1));
        }

        self.count("source_cache_misses", name);
        self.count("source_producer_runs", name);
        debug!(source = name, "producing");
        let result = produce();

        let mut entries = self.entries.lock();
        match result {
            Ok(map) => {
                let value = Arc::new(map);
                let _ = entries.insert(name.to_string(), CacheEntry::Ready(Arc::clone(&value)));
                Ok(value)
            }
            Err(e) => {
                // A failed production leaves no entry behind; the next access
                // retries from scratch.
                let _ = entries.remove(name);
                Err(e)
            }
        }
    }

    /// Peek without producing.
    pub fn get(&self, name: &str) -> Option<Arc<JsonMap>> {
        match self.entries.lock().get(name) {
            Some(CacheEntry::Ready(value)) => Some(Arc::clone(value)),
            _ => None,
        }
    }

    /// Drop one entry. Returns whether anything was cached under the name.
    pub fn invalidate(&self, name: &str) -> bool {
        self.entries.lock().remove(name).is_some()
    }

    /// Drop everything and start a new cache generation. Used for test
    /// isolation and rebuild-from-files workflows.
    pub fn invalidate_all(&self) {
        self.entries.lock().clear();
        let _ = self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for SourceCache {
    fn default() -> Self {
        Self::new()
    }
}
