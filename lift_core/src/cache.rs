//! In-memory cache for the two per-user progress documents.
//!
//! The cache serves the generated-program and progress-record documents
//! cache-first: `read` always returns the last known value, staleness only
//! gates revalidation. A per-key in-flight guard collapses overlapping
//! `ensure_fresh` calls into at most one underlying fetch (single-flight);
//! overlapping callers no-op and pick up the result through the change
//! notification channel instead of waiting on the fetch.

use crate::{GeneratedProgram, ProgressRecord, Result};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// The cached per-user documents
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheKey {
    GeneratedProgram,
    ProgressRecord,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::GeneratedProgram => write!(f, "generated_program"),
            CacheKey::ProgressRecord => write!(f, "progress_record"),
        }
    }
}

/// A cached document value
#[derive(Clone, Debug)]
pub enum Document {
    Program(GeneratedProgram),
    Progress(ProgressRecord),
}

impl Document {
    pub fn as_program(&self) -> Option<&GeneratedProgram> {
        match self {
            Document::Program(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_progress(&self) -> Option<&ProgressRecord> {
        match self {
            Document::Progress(p) => Some(p),
            _ => None,
        }
    }
}

/// Freshness and re-entry timing policy
///
/// The two re-entry parameters model screen-refocus behavior: a re-entry
/// shortly after the last update defers revalidation briefly (a lightweight
/// "refreshing" path instead of a full reload), while a longer gap
/// revalidates immediately.
#[derive(Clone, Debug)]
pub struct CachePolicy {
    pub ttl: Duration,
    pub quick_reentry_window: Duration,
    pub deferred_revalidate_delay: std::time::Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::seconds(60),
            quick_reentry_window: Duration::seconds(3),
            deferred_revalidate_delay: std::time::Duration::from_millis(300),
        }
    }
}

/// Outcome of an `ensure_fresh` call that did not error
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The entry was fresh; the fetcher was not invoked
    AlreadyFresh,
    /// Another fetch for this key was in flight; the fetcher was not invoked
    InFlight,
    /// The fetcher ran and the cache was updated
    Updated,
}

/// What a re-entering consumer should do about revalidation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReentryAction {
    /// Updated moments ago: wait this long, then revalidate quietly
    DeferredRefresh(std::time::Duration),
    /// Revalidate immediately
    RefreshNow,
}

#[derive(Default)]
struct CacheEntry {
    value: Option<Document>,
    last_updated_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<CacheKey, CacheEntry>,
    guards: HashMap<CacheKey, bool>,
    subscribers: Vec<Sender<CacheKey>>,
}

/// Drop guard that resets a key's in-flight flag
///
/// Held across the fetcher call in `ensure_fresh`; dropping re-acquires the
/// inner lock, which is safe because the lock is never held while the
/// fetcher runs.
struct InFlightReset<'a> {
    cache: &'a ProgressCache,
    key: CacheKey,
}

impl Drop for InFlightReset<'_> {
    fn drop(&mut self) {
        self.cache.lock().guards.insert(self.key, false);
    }
}

/// The cache service object
///
/// Constructible so tests can instantiate independent instances; the
/// application shares one behind an `Arc`. All mutation goes through the
/// inner mutex; fetchers run outside it.
pub struct ProgressCache {
    policy: CachePolicy,
    inner: Mutex<Inner>,
}

impl Default for ProgressCache {
    fn default() -> Self {
        Self::new(CachePolicy::default())
    }
}

impl ProgressCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock only means a fetcher panicked; the map is still valid
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Last known value for `key`, regardless of freshness
    ///
    /// A stale value is still a value; staleness never empties an entry.
    pub fn read(&self, key: CacheKey) -> Option<Document> {
        self.lock()
            .entries
            .get(&key)
            .and_then(|e| e.value.clone())
    }

    /// When `key` last updated successfully, if ever
    pub fn last_updated_at(&self, key: CacheKey) -> Option<DateTime<Utc>> {
        self.lock().entries.get(&key).and_then(|e| e.last_updated_at)
    }

    /// Whether the entry for `key` is within its TTL
    pub fn is_fresh(&self, key: CacheKey) -> bool {
        self.is_fresh_at(key, Utc::now())
    }

    pub fn is_fresh_at(&self, key: CacheKey, now: DateTime<Utc>) -> bool {
        self.last_updated_at(key)
            .map_or(false, |ts| now - ts < self.policy.ttl)
    }

    /// Revalidate `key` unless it is fresh or a fetch is already in flight
    ///
    /// The single-flight guarantee: at most one fetch per key runs at a
    /// time; an overlapping call returns [`FetchOutcome::InFlight`] without
    /// waiting. On fetcher success the value and timestamp are written and
    /// subscribers are notified; on failure the cached value is untouched
    /// and the error surfaces once to this caller. The in-flight guard is
    /// cleared on every exit path, including a panicking fetcher. No
    /// automatic retry.
    pub fn ensure_fresh<F>(&self, key: CacheKey, fetcher: F) -> Result<FetchOutcome>
    where
        F: FnOnce() -> Result<Document>,
    {
        {
            let mut inner = self.lock();
            if let Some(entry) = inner.entries.get(&key) {
                if entry
                    .last_updated_at
                    .map_or(false, |ts| Utc::now() - ts < self.policy.ttl)
                {
                    return Ok(FetchOutcome::AlreadyFresh);
                }
            }
            if inner.guards.get(&key).copied().unwrap_or(false) {
                tracing::debug!("Fetch for {} already in flight, skipping", key);
                return Ok(FetchOutcome::InFlight);
            }
            inner.guards.insert(key, true);
        }
        // Clears the flag when this frame unwinds, so a panicking fetcher
        // cannot wedge the key into InFlight
        let _reset = InFlightReset { cache: self, key };

        tracing::debug!("Fetching {}", key);
        let fetched = fetcher();

        let mut inner = self.lock();
        // Cleared here so the write and the guard reset are one critical
        // section; the drop guard's second reset is idempotent
        inner.guards.insert(key, false);
        match fetched {
            Ok(value) => {
                let entry = inner.entries.entry(key).or_default();
                entry.value = Some(value);
                entry.last_updated_at = Some(Utc::now());
                inner.subscribers.retain(|tx| tx.send(key).is_ok());
                tracing::debug!("Updated {}", key);
                Ok(FetchOutcome::Updated)
            }
            Err(e) => {
                tracing::warn!("Fetch for {} failed: {}. Keeping cached value.", key, e);
                Err(e)
            }
        }
    }

    /// Run every fetch to completion and report a per-key result
    ///
    /// Never fails fast: a caller needing both documents gets an outcome for
    /// each and renders with whichever succeeded.
    pub fn refresh_all(
        &self,
        fetchers: Vec<(CacheKey, Box<dyn FnOnce() -> Result<Document>>)>,
    ) -> Vec<(CacheKey, Result<FetchOutcome>)> {
        fetchers
            .into_iter()
            .map(|(key, fetcher)| {
                let outcome = self.ensure_fresh(key, fetcher);
                (key, outcome)
            })
            .collect()
    }

    /// What a consumer regaining attention should do about `key`
    pub fn reentry_action(&self, key: CacheKey) -> ReentryAction {
        self.reentry_action_at(key, Utc::now())
    }

    pub fn reentry_action_at(&self, key: CacheKey, now: DateTime<Utc>) -> ReentryAction {
        match self.last_updated_at(key) {
            Some(ts) if now - ts < self.policy.quick_reentry_window => {
                ReentryAction::DeferredRefresh(self.policy.deferred_revalidate_delay)
            }
            _ => ReentryAction::RefreshNow,
        }
    }

    /// Apply the re-entry policy, then revalidate
    ///
    /// The deferred path sleeps out the short delay before revalidating;
    /// rapid navigation thereby coalesces into one quiet refresh instead of
    /// a flickering reload.
    pub fn refresh_on_reentry<F>(&self, key: CacheKey, fetcher: F) -> Result<FetchOutcome>
    where
        F: FnOnce() -> Result<Document>,
    {
        if let ReentryAction::DeferredRefresh(delay) = self.reentry_action(key) {
            tracing::debug!("Quick re-entry on {}, deferring refresh {:?}", key, delay);
            std::thread::sleep(delay);
        }
        self.ensure_fresh(key, fetcher)
    }

    /// Subscribe to change notifications
    ///
    /// Every successful cache write sends the updated key to all live
    /// subscribers; dropped receivers are pruned on the next notify.
    pub fn subscribe(&self) -> Receiver<CacheKey> {
        let (tx, rx) = channel();
        self.lock().subscribers.push(tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;

    fn progress_doc() -> Document {
        Document::Progress(ProgressRecord::default())
    }

    fn stale_policy() -> CachePolicy {
        CachePolicy {
            ttl: Duration::zero(),
            ..CachePolicy::default()
        }
    }

    #[test]
    fn test_read_before_first_fetch_is_none() {
        let cache = ProgressCache::default();
        assert!(cache.read(CacheKey::ProgressRecord).is_none());
        assert!(!cache.is_fresh(CacheKey::ProgressRecord));
    }

    #[test]
    fn test_fresh_entry_skips_fetcher() {
        let cache = ProgressCache::default();
        cache
            .ensure_fresh(CacheKey::ProgressRecord, || Ok(progress_doc()))
            .unwrap();

        let outcome = cache
            .ensure_fresh(CacheKey::ProgressRecord, || {
                panic!("fetcher must not run while fresh")
            })
            .unwrap();
        assert_eq!(outcome, FetchOutcome::AlreadyFresh);
        assert!(cache.is_fresh(CacheKey::ProgressRecord));
    }

    #[test]
    fn test_stale_value_still_readable() {
        let cache = ProgressCache::new(stale_policy());
        cache
            .ensure_fresh(CacheKey::ProgressRecord, || Ok(progress_doc()))
            .unwrap();

        // Zero TTL: immediately stale, but the value is not cleared
        assert!(!cache.is_fresh(CacheKey::ProgressRecord));
        assert!(cache.read(CacheKey::ProgressRecord).is_some());
    }

    #[test]
    fn test_single_flight_collapses_overlapping_calls() {
        let cache = Arc::new(ProgressCache::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();

        let worker_cache = Arc::clone(&cache);
        let worker_calls = Arc::clone(&calls);
        let worker = thread::spawn(move || {
            worker_cache.ensure_fresh(CacheKey::ProgressRecord, move || {
                worker_calls.fetch_add(1, Ordering::SeqCst);
                started_tx.send(()).expect("test channel");
                release_rx.recv().expect("test channel");
                Ok(progress_doc())
            })
        });

        // Second call arrives while the first fetch is in flight
        started_rx.recv().expect("worker fetch started");
        let overlapping = cache
            .ensure_fresh(CacheKey::ProgressRecord, || {
                panic!("overlapping fetcher must not run")
            })
            .unwrap();
        assert_eq!(overlapping, FetchOutcome::InFlight);

        release_tx.send(()).expect("test channel");
        let first = worker.join().expect("worker thread").unwrap();
        assert_eq!(first, FetchOutcome::Updated);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_fetch_keeps_value_and_allows_retry() {
        let cache = ProgressCache::new(stale_policy());
        cache
            .ensure_fresh(CacheKey::ProgressRecord, || Ok(progress_doc()))
            .unwrap();
        let before = cache.last_updated_at(CacheKey::ProgressRecord);

        let result = cache.ensure_fresh(CacheKey::ProgressRecord, || {
            Err(Error::Fetch("backend unavailable".into()))
        });
        assert!(result.is_err());
        assert!(cache.read(CacheKey::ProgressRecord).is_some());
        assert_eq!(cache.last_updated_at(CacheKey::ProgressRecord), before);

        // Guard was cleared; the retry goes through
        let outcome = cache
            .ensure_fresh(CacheKey::ProgressRecord, || Ok(progress_doc()))
            .unwrap();
        assert_eq!(outcome, FetchOutcome::Updated);
    }

    #[test]
    fn test_subscribers_notified_on_update() {
        let cache = ProgressCache::new(stale_policy());
        let rx = cache.subscribe();

        cache
            .ensure_fresh(CacheKey::GeneratedProgram, || {
                Ok(Document::Program(GeneratedProgram::default()))
            })
            .unwrap();

        assert_eq!(rx.try_recv().unwrap(), CacheKey::GeneratedProgram);

        // Failed fetches don't notify
        let _ = cache.ensure_fresh(CacheKey::GeneratedProgram, || {
            Err(Error::Fetch("nope".into()))
        });
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_refresh_all_settles_every_fetch() {
        let cache = ProgressCache::default();
        let results = cache.refresh_all(vec![
            (
                CacheKey::GeneratedProgram,
                Box::new(|| Err(Error::Fetch("program backend down".into()))),
            ),
            (CacheKey::ProgressRecord, Box::new(|| Ok(progress_doc()))),
        ]);

        assert_eq!(results.len(), 2);
        assert!(results[0].1.is_err());
        assert_eq!(*results[1].1.as_ref().unwrap(), FetchOutcome::Updated);
        // The second fetch ran despite the first failing
        assert!(cache.read(CacheKey::ProgressRecord).is_some());
    }

    #[test]
    fn test_reentry_policy() {
        let cache = ProgressCache::new(CachePolicy {
            ttl: Duration::zero(),
            quick_reentry_window: Duration::seconds(3),
            deferred_revalidate_delay: std::time::Duration::from_millis(300),
        });

        // Nothing cached yet: refresh immediately
        assert_eq!(
            cache.reentry_action(CacheKey::ProgressRecord),
            ReentryAction::RefreshNow
        );

        cache
            .ensure_fresh(CacheKey::ProgressRecord, || Ok(progress_doc()))
            .unwrap();
        let updated = cache.last_updated_at(CacheKey::ProgressRecord).unwrap();

        // Right after an update: defer
        assert_eq!(
            cache.reentry_action_at(CacheKey::ProgressRecord, updated + Duration::seconds(1)),
            ReentryAction::DeferredRefresh(std::time::Duration::from_millis(300))
        );

        // Long after: immediate
        assert_eq!(
            cache.reentry_action_at(CacheKey::ProgressRecord, updated + Duration::seconds(10)),
            ReentryAction::RefreshNow
        );
    }

    #[test]
    fn test_panicking_fetcher_clears_guard() {
        let cache = ProgressCache::new(stale_policy());

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            cache.ensure_fresh(CacheKey::ProgressRecord, || panic!("fetcher blew up"))
        }));
        assert!(result.is_err());

        // The key is not wedged: the next fetch runs instead of no-oping
        let outcome = cache
            .ensure_fresh(CacheKey::ProgressRecord, || Ok(progress_doc()))
            .unwrap();
        assert_eq!(outcome, FetchOutcome::Updated);
    }

    #[test]
    fn test_refresh_on_reentry_revalidates_after_deferral() {
        let cache = ProgressCache::new(CachePolicy {
            ttl: Duration::zero(),
            quick_reentry_window: Duration::seconds(3),
            deferred_revalidate_delay: std::time::Duration::from_millis(1),
        });
        cache
            .ensure_fresh(CacheKey::ProgressRecord, || Ok(progress_doc()))
            .unwrap();

        // Re-entry right after the update takes the deferred path, then
        // still revalidates because the entry is already stale
        let outcome = cache
            .refresh_on_reentry(CacheKey::ProgressRecord, || Ok(progress_doc()))
            .unwrap();
        assert_eq!(outcome, FetchOutcome::Updated);
    }

    #[test]
    fn test_keys_revalidate_independently() {
        let cache = ProgressCache::default();
        cache
            .ensure_fresh(CacheKey::GeneratedProgram, || {
                Ok(Document::Program(GeneratedProgram::default()))
            })
            .unwrap();

        assert!(cache.is_fresh(CacheKey::GeneratedProgram));
        assert!(!cache.is_fresh(CacheKey::ProgressRecord));
        assert!(cache.read(CacheKey::ProgressRecord).is_none());
    }
}
