//! Process-wide cache of parsed images and the symbol wrappers built over them.
//!
//! The cache never keeps its values alive on its own: each entry holds a weak
//! handle to the shared image and a weak registry of wrappers, keyed by the
//! binding context they were built for. Entries whose handles are all dead
//! are removed by [`MetadataCache::compact`], which also runs opportunistically
//! as entries accumulate and can be driven by a background thread.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use refgraph_common::{ContentHash, ContentKey};
use tracing::{debug, trace};

use crate::error::MetadataError;
use crate::image::MetadataImage;

/// Inline sweeps start once this many insertions happened since the last one.
const MIN_SWEEP_THRESHOLD: usize = 64;

/// Fingerprint of the binding context a wrapper was built under.
///
/// Two requests for the same content key share a wrapper only when their
/// contexts are equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct WrapperContext(ContentHash);

impl WrapperContext {
    /// Wraps a precomputed context hash.
    pub fn new(hash: ContentHash) -> Self {
        Self(hash)
    }

    /// The underlying hash.
    pub fn hash(&self) -> ContentHash {
        self.0
    }
}

impl fmt::Display for WrapperContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct CacheEntry<W> {
    generation: u64,
    image: Weak<MetadataImage>,
    wrappers: Vec<(WrapperContext, Weak<W>)>,
}

impl<W> CacheEntry<W> {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            image: Weak::new(),
            wrappers: Vec::new(),
        }
    }

    fn is_dead(&self) -> bool {
        self.image.strong_count() == 0 && self.wrappers.iter().all(|(_, w)| w.strong_count() == 0)
    }

    fn live_wrapper(&self, context: WrapperContext) -> Option<Arc<W>> {
        self.wrappers
            .iter()
            .filter(|(c, _)| *c == context)
            .find_map(|(_, w)| w.upgrade())
    }
}

struct CacheState<W> {
    entries: HashMap<ContentKey, CacheEntry<W>>,
    next_generation: u64,
    inserts_since_sweep: usize,
    sweep_threshold: usize,
}

impl<W> CacheState<W> {
    fn bump(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    fn sweep(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_dead());
        self.reset_threshold();
        before - self.entries.len()
    }

    fn reset_threshold(&mut self) {
        self.inserts_since_sweep = 0;
        self.sweep_threshold = MIN_SWEEP_THRESHOLD.max(self.entries.len() * 2);
    }
}

/// Point-in-time view of one cache entry, for inspection and tests.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct EntrySnapshot {
    /// Whether the shared image is still held by someone.
    pub image_alive: bool,
    /// Registered wrappers that are still alive.
    pub live_wrappers: usize,
    /// Registered wrapper slots, dead or alive.
    pub wrapper_slots: usize,
}

/// Counters describing cache traffic since creation.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct CacheStats {
    /// Images parsed by a loader and published.
    pub loads: u64,
    /// Requests served from a live entry.
    pub hits: u64,
    /// Loads discarded because another caller published first.
    pub races_lost: u64,
    /// Entries removed by compaction.
    pub compacted: u64,
}

/// Shares parsed images and wrappers of type `W` across compilations.
pub struct MetadataCache<W> {
    state: Mutex<CacheState<W>>,
    loads: AtomicU64,
    hits: AtomicU64,
    races_lost: AtomicU64,
    compacted: AtomicU64,
}

impl<W> MetadataCache<W> {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                next_generation: 0,
                inserts_since_sweep: 0,
                sweep_threshold: MIN_SWEEP_THRESHOLD,
            }),
            loads: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            races_lost: AtomicU64::new(0),
            compacted: AtomicU64::new(0),
        }
    }

    /// Returns the shared image for `key`, invoking `loader` when no live
    /// image exists.
    ///
    /// The loader runs without holding the cache guard. If another caller
    /// publishes an image for the same key first, the freshly loaded one is
    /// discarded and the winner returned. Loader errors are returned as-is
    /// and leave the cache untouched.
    pub fn get_or_load<F>(
        &self,
        key: &ContentKey,
        loader: F,
    ) -> Result<Arc<MetadataImage>, MetadataError>
    where
        F: FnOnce() -> Result<MetadataImage, MetadataError>,
    {
        if let Some(image) = self.peek_image(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(%key, "metadata cache hit");
            return Ok(image);
        }

        let loaded = Arc::new(loader()?);

        let mut state = self.state.lock();
        let generation = state.bump();
        let entry = state
            .entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::new(generation));
        if let Some(existing) = entry.image.upgrade() {
            self.races_lost.fetch_add(1, Ordering::Relaxed);
            debug!(%key, "lost image publish race, adopting winner");
            return Ok(existing);
        }
        entry.image = Arc::downgrade(&loaded);
        entry.generation = generation;
        self.loads.fetch_add(1, Ordering::Relaxed);
        debug!(%key, "published metadata image");
        self.note_insert(&mut state);
        Ok(loaded)
    }

    /// Returns the live wrapper for `(key, context)`, building and
    /// registering one with `factory` when none exists.
    ///
    /// As with [`get_or_load`](Self::get_or_load), the factory runs outside
    /// the guard and the first published wrapper wins.
    pub fn get_or_wrap<F>(&self, key: &ContentKey, context: WrapperContext, factory: F) -> Arc<W>
    where
        F: FnOnce() -> W,
    {
        if let Some(wrapper) = self.peek_wrapper(key, context) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(%key, %context, "wrapper cache hit");
            return wrapper;
        }

        let built = Arc::new(factory());

        let mut state = self.state.lock();
        let generation = state.bump();
        let entry = state
            .entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::new(generation));
        entry.wrappers.retain(|(_, w)| w.strong_count() > 0);
        if let Some(existing) = entry.live_wrapper(context) {
            self.races_lost.fetch_add(1, Ordering::Relaxed);
            return existing;
        }
        entry.wrappers.push((context, Arc::downgrade(&built)));
        entry.generation = generation;
        debug!(%key, %context, "registered wrapper");
        self.note_insert(&mut state);
        built
    }

    /// Returns the live image for `key` without loading.
    pub fn peek_image(&self, key: &ContentKey) -> Option<Arc<MetadataImage>> {
        self.state
            .lock()
            .entries
            .get(key)
            .and_then(|entry| entry.image.upgrade())
    }

    /// Returns the live wrapper for `(key, context)` without building one.
    pub fn peek_wrapper(&self, key: &ContentKey, context: WrapperContext) -> Option<Arc<W>> {
        self.state
            .lock()
            .entries
            .get(key)
            .and_then(|entry| entry.live_wrapper(context))
    }

    /// Removes every entry whose image and wrappers are all dead.
    ///
    /// Runs in two phases: dead entries are collected under the guard, then
    /// the guard is retaken and each candidate is removed only if it was not
    /// touched in between. An entry refreshed by a concurrent lookup keeps
    /// its slot. Returns the number of entries removed.
    pub fn compact(&self) -> usize {
        self.compact_between(|| {})
    }

    fn compact_between(&self, between_phases: impl FnOnce()) -> usize {
        let candidates: Vec<(ContentKey, u64)> = {
            let state = self.state.lock();
            state
                .entries
                .iter()
                .filter(|(_, entry)| entry.is_dead())
                .map(|(key, entry)| (key.clone(), entry.generation))
                .collect()
        };

        between_phases();

        let mut state = self.state.lock();
        let mut removed = 0;
        for (key, generation) in candidates {
            let stale = state
                .entries
                .get(&key)
                .is_some_and(|entry| entry.generation == generation && entry.is_dead());
            if stale {
                state.entries.remove(&key);
                removed += 1;
            }
        }
        state.reset_threshold();
        self.compacted.fetch_add(removed as u64, Ordering::Relaxed);
        debug!(removed, live = state.entries.len(), "compacted metadata cache");
        removed
    }

    fn note_insert(&self, state: &mut CacheState<W>) {
        state.inserts_since_sweep += 1;
        if state.inserts_since_sweep >= state.sweep_threshold {
            let removed = state.sweep();
            self.compacted.fetch_add(removed as u64, Ordering::Relaxed);
            trace!(removed, "opportunistic sweep");
        }
    }

    /// Number of entries, live or not yet compacted.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Returns `true` if the cache has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an entry exists for `key`.
    pub fn contains(&self, key: &ContentKey) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    /// Describes the entry for `key`, if any.
    pub fn inspect(&self, key: &ContentKey) -> Option<EntrySnapshot> {
        self.state.lock().entries.get(key).map(|entry| EntrySnapshot {
            image_alive: entry.image.strong_count() > 0,
            live_wrappers: entry
                .wrappers
                .iter()
                .filter(|(_, w)| w.strong_count() > 0)
                .count(),
            wrapper_slots: entry.wrappers.len(),
        })
    }

    /// Traffic counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            loads: self.loads.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            races_lost: self.races_lost.load(Ordering::Relaxed),
            compacted: self.compacted.load(Ordering::Relaxed),
        }
    }
}

impl<W: Send + Sync + 'static> MetadataCache<W> {
    /// Starts a thread that compacts this cache every `interval`.
    ///
    /// The thread holds the cache weakly and exits when the cache is dropped
    /// or the returned handle is stopped or dropped.
    pub fn spawn_compaction(
        self: &Arc<Self>,
        interval: Duration,
    ) -> std::io::Result<CompactionHandle> {
        let (stop, ticks) = mpsc::channel::<()>();
        let cache = Arc::downgrade(self);
        let thread = std::thread::Builder::new()
            .name("refgraph-compaction".to_string())
            .spawn(move || loop {
                match ticks.recv_timeout(interval) {
                    Err(mpsc::RecvTimeoutError::Timeout) => match cache.upgrade() {
                        Some(cache) => {
                            cache.compact();
                        }
                        None => break,
                    },
                    _ => break,
                }
            })?;
        Ok(CompactionHandle {
            stop: Some(stop),
            thread: Some(thread),
        })
    }
}

impl<W> Default for MetadataCache<W> {
    fn default() -> Self {
        Self::new()
    }
}

/// Owner of a background compaction thread; stops it on drop.
pub struct CompactionHandle {
    stop: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CompactionHandle {
    /// Stops the thread and waits for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for CompactionHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ModuleDef;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    fn image(name: &str) -> MetadataImage {
        MetadataImage::Module(ModuleDef::new(name))
    }

    fn key(tag: u64) -> ContentKey {
        ContentKey::new("/refs/lib.rgmd", tag)
    }

    fn ctx(n: u8) -> WrapperContext {
        WrapperContext::new(ContentHash::from_bytes(&[n]))
    }

    #[test]
    fn second_load_is_a_hit() {
        let cache: MetadataCache<String> = MetadataCache::new();
        let calls = AtomicUsize::new(0);
        let load = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(image("a"))
        };
        let first = cache.get_or_load(&key(1), load).unwrap();
        let second = cache
            .get_or_load(&key(1), || panic!("loader must not run on a hit"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn distinct_keys_never_alias() {
        let cache: MetadataCache<String> = MetadataCache::new();
        let a = cache.get_or_load(&key(1), || Ok(image("same"))).unwrap();
        let b = cache.get_or_load(&key(2), || Ok(image("same"))).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn loader_errors_are_not_cached() {
        let cache: MetadataCache<String> = MetadataCache::new();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let result = cache.get_or_load(&key(1), || {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(MetadataError::Empty)
            });
            assert!(result.is_err());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(!cache.contains(&key(1)));
        let ok = cache.get_or_load(&key(1), || Ok(image("a")));
        assert!(ok.is_ok(), "a later valid load must succeed");
    }

    #[test]
    fn losing_racer_adopts_winner() {
        let cache: MetadataCache<String> = MetadataCache::new();
        let mut winner = None;
        let loser = cache
            .get_or_load(&key(1), || {
                // Another caller publishes while this loader is still parsing.
                winner = Some(cache.get_or_load(&key(1), || Ok(image("winner"))).unwrap());
                Ok(image("loser"))
            })
            .unwrap();
        let winner = winner.unwrap();
        assert!(Arc::ptr_eq(&winner, &loser));
        assert_eq!(loser.display_name(), "winner");
        assert_eq!(cache.stats().races_lost, 1);
    }

    #[test]
    fn concurrent_loads_share_one_image() {
        let cache: Arc<MetadataCache<String>> = Arc::new(MetadataCache::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.get_or_load(&key(7), || Ok(image("x"))).unwrap())
            })
            .collect();
        let images: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for img in &images[1..] {
            assert!(Arc::ptr_eq(&images[0], img));
        }
    }

    #[test]
    fn wrappers_keyed_by_context() {
        let cache: MetadataCache<String> = MetadataCache::new();
        let a = cache.get_or_wrap(&key(1), ctx(1), || "a".to_string());
        let again = cache.get_or_wrap(&key(1), ctx(1), || "unused".to_string());
        let b = cache.get_or_wrap(&key(1), ctx(2), || "b".to_string());
        assert!(Arc::ptr_eq(&a, &again));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.inspect(&key(1)).unwrap().live_wrappers, 2);
    }

    #[test]
    fn dead_wrapper_is_rebuilt() {
        let cache: MetadataCache<String> = MetadataCache::new();
        let first = cache.get_or_wrap(&key(1), ctx(1), || "first".to_string());
        drop(first);
        assert!(cache.peek_wrapper(&key(1), ctx(1)).is_none());
        let second = cache.get_or_wrap(&key(1), ctx(1), || "second".to_string());
        assert_eq!(second.as_str(), "second");
        assert_eq!(
            cache.inspect(&key(1)).unwrap().wrapper_slots,
            1,
            "dead slots are pruned on registration"
        );
    }

    #[test]
    fn compaction_removes_only_dead_entries() {
        let cache: MetadataCache<String> = MetadataCache::new();
        let kept = cache.get_or_load(&key(1), || Ok(image("kept"))).unwrap();
        drop(cache.get_or_load(&key(2), || Ok(image("dropped"))).unwrap());
        let wrapper = cache.get_or_wrap(&key(3), ctx(1), || "w".to_string());

        assert_eq!(cache.compact(), 1);
        assert!(cache.contains(&key(1)));
        assert!(!cache.contains(&key(2)));
        assert!(cache.contains(&key(3)));

        drop(kept);
        drop(wrapper);
        assert_eq!(cache.compact(), 2);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().compacted, 3);
    }

    #[test]
    fn reload_after_compaction_creates_fresh_entry() {
        let cache: MetadataCache<String> = MetadataCache::new();
        drop(cache.get_or_load(&key(1), || Ok(image("old"))).unwrap());
        cache.compact();
        assert!(!cache.contains(&key(1)));
        let fresh = cache.get_or_load(&key(1), || Ok(image("new"))).unwrap();
        assert_eq!(fresh.display_name(), "new");
        assert_eq!(cache.stats().loads, 2);
    }

    #[test]
    fn entry_refreshed_during_compaction_survives() {
        let cache: MetadataCache<String> = MetadataCache::new();
        drop(cache.get_or_load(&key(1), || Ok(image("old"))).unwrap());
        let removed = cache.compact_between(|| {
            // A lookup republishes the key after the scan, then lets go again.
            drop(cache.get_or_load(&key(1), || Ok(image("fresh"))).unwrap());
        });
        assert_eq!(removed, 0);
        assert!(cache.contains(&key(1)));
    }

    #[test]
    fn opportunistic_sweep_bounds_growth() {
        let cache: MetadataCache<String> = MetadataCache::new();
        for tag in 0..(MIN_SWEEP_THRESHOLD as u64 * 3) {
            drop(cache.get_or_load(&key(tag), || Ok(image("t"))).unwrap());
        }
        assert!(cache.len() <= MIN_SWEEP_THRESHOLD);
    }

    #[test]
    fn background_compaction_runs_and_stops() {
        let cache: Arc<MetadataCache<String>> = Arc::new(MetadataCache::new());
        drop(cache.get_or_load(&key(1), || Ok(image("gone"))).unwrap());
        let handle = cache.spawn_compaction(Duration::from_millis(5)).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while cache.contains(&key(1)) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        handle.stop();
        assert!(!cache.contains(&key(1)));
    }
}
