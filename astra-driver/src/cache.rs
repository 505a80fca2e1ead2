//! Single-flight session cache.
//!
//! Sessions are expensive: opening one means a control plane lookup, a bundle
//! download and a TLS handshake. The cache keeps one session per distinct
//! [`AstraUrl`] for the life of the process and guarantees that concurrent
//! requests for the same URL share a single build.
//!
//! - The map lock is only held to look up or insert a slot, never across an
//!   `.await`, so a slow build for one URL does not delay another URL.
//! - A build in progress is stored as a [`Shared`] future. Every caller that
//!   arrives while it runs awaits the same future and sees the same result.
//! - Failed builds are not cached. The slot is removed and the next request
//!   starts a new build. A build that panics counts as a failed build.
//!
//! # Example
//!
//! ```rust,ignore
//! let session = cache
//!     .get_or_create(&url, || async move { open_session(&url).await })
//!     .await?;
//! ```

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

use crate::error::{AstraError, AstraResult};
use crate::session::SharedSession;
use crate::url::AstraUrl;

type BuildFuture = Shared<BoxFuture<'static, AstraResult<SharedSession>>>;

enum Slot {
    /// A build is running; `build_id` tells it apart from later builds.
    Building { build_id: u64, future: BuildFuture },
    Ready(SharedSession),
}

/// Counters describing cache activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Session builds started.
    pub builds: u64,
    /// Requests answered by an established session.
    pub hits: u64,
    /// Requests that joined a build already in progress.
    pub joins: u64,
    /// Builds that failed.
    pub failures: u64,
    /// Established sessions currently held.
    pub sessions: usize,
}

#[derive(Debug, Default)]
struct Counters {
    builds: AtomicU64,
    hits: AtomicU64,
    joins: AtomicU64,
    failures: AtomicU64,
}

/// Maps connection URLs to established sessions.
#[derive(Default)]
pub struct SessionCache {
    slots: Mutex<HashMap<AstraUrl, Slot>>,
    next_build: AtomicU64,
    counters: Counters,
}

impl SessionCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the session for `url`, running `build` if there is none.
    ///
    /// `build` is called with the map lock held and must only construct the
    /// future; the future itself runs after the lock is released.
    pub async fn get_or_create<F, Fut>(&self, url: &AstraUrl, build: F) -> AstraResult<SharedSession>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = AstraResult<SharedSession>> + Send + 'static,
    {
        let (build_id, future) = {
            let mut slots = self.slots.lock();
            match slots.get(url) {
                Some(Slot::Ready(session)) => {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(database = url.database(), "Reusing cached session");
                    return Ok(Arc::clone(session));
                }
                Some(Slot::Building { build_id, future }) => {
                    self.counters.joins.fetch_add(1, Ordering::Relaxed);
                    debug!(database = url.database(), "Joining session build in progress");
                    (*build_id, future.clone())
                }
                None => {
                    let build_id = self.next_build.fetch_add(1, Ordering::Relaxed);
                    let future = AssertUnwindSafe(build())
                        .catch_unwind()
                        .map(|result| {
                            result.unwrap_or_else(|_| {
                                Err(AstraError::connection("session build panicked"))
                            })
                        })
                        .boxed()
                        .shared();
                    slots.insert(
                        url.clone(),
                        Slot::Building {
                            build_id,
                            future: future.clone(),
                        },
                    );
                    self.counters.builds.fetch_add(1, Ordering::Relaxed);
                    info!(database = url.database(), "Creating a new session");
                    (build_id, future)
                }
            }
        };

        let result = future.await;
        self.settle(url, build_id, &result);
        result
    }

    /// Record the outcome of build `build_id`, unless the slot has moved on.
    fn settle(&self, url: &AstraUrl, build_id: u64, result: &AstraResult<SharedSession>) {
        let mut slots = self.slots.lock();
        let current = matches!(
            slots.get(url),
            Some(Slot::Building { build_id: id, .. }) if *id == build_id
        );
        if !current {
            return;
        }
        match result {
            Ok(session) => {
                slots.insert(url.clone(), Slot::Ready(Arc::clone(session)));
            }
            Err(err) => {
                slots.remove(url);
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                warn!(database = url.database(), error = %err, "Session build failed");
            }
        }
    }

    /// The established session for `url`, if any.
    #[must_use]
    pub fn get(&self, url: &AstraUrl) -> Option<SharedSession> {
        match self.slots.lock().get(url) {
            Some(Slot::Ready(session)) => Some(Arc::clone(session)),
            _ => None,
        }
    }

    /// Whether an established session exists for `url`.
    #[must_use]
    pub fn contains(&self, url: &AstraUrl) -> bool {
        self.get(url).is_some()
    }

    /// Remove the entry for `url` and close its session.
    ///
    /// What happens to connections still holding the session depends on the
    /// [`CqlSession::close`](crate::session::CqlSession::close) implementation;
    /// some sessions keep serving statements until the last handle is dropped.
    ///
    /// A build in progress is detached: its waiters still get its result but
    /// it is not stored, and the session it produces is owned by those
    /// waiters. The cache never closes it.
    pub async fn evict(&self, url: &AstraUrl) -> bool {
        let removed = self.slots.lock().remove(url);
        match removed {
            Some(Slot::Ready(session)) => {
                info!(database = url.database(), "Evicting cached session");
                session.close().await;
                true
            }
            // Its waiters own whatever session it produces.
            Some(Slot::Building { .. }) => true,
            None => false,
        }
    }

    /// Remove every entry, closing established sessions.
    ///
    /// Builds in progress are detached the same way as in [`evict`](Self::evict).
    pub async fn clear(&self) {
        let drained: Vec<Slot> = self.slots.lock().drain().map(|(_, slot)| slot).collect();
        for slot in drained {
            if let Slot::Ready(session) = slot {
                session.close().await;
            }
        }
    }

    /// Number of established sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    /// Check if no session is established.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the cache counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            builds: self.counters.builds.load(Ordering::Relaxed),
            hits: self.counters.hits.load(Ordering::Relaxed),
            joins: self.counters.joins.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            sessions: self.len(),
        }
    }
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache")
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConsistencyLevel;
    use crate::session::CqlSession;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Duration;
    use tokio::sync::Notify;

    #[derive(Debug, Default)]
    struct FakeSession {
        keyspace: String,
        closed: AtomicBool,
    }

    #[async_trait]
    impl CqlSession for FakeSession {
        fn keyspace(&self) -> &str {
            &self.keyspace
        }

        async fn execute(&self, _cql: &str, _consistency: ConsistencyLevel) -> AstraResult<()> {
            Ok(())
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn url(raw: &str) -> AstraUrl {
        AstraUrl::parse(raw).unwrap()
    }

    fn session(keyspace: &str) -> SharedSession {
        Arc::new(FakeSession {
            keyspace: keyspace.to_string(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_sequential_requests_build_once() {
        let cache = SessionCache::new();
        let key = url("astra://db/ks?token=t");
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            cache
                .get_or_create(&key, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(session("ks"))
                })
                .await
                .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.builds, 1);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.sessions, 1);
    }

    #[tokio::test]
    async fn test_equal_urls_share_session() {
        let cache = SessionCache::new();
        let first = cache
            .get_or_create(&url("astra://db/ks?token=t&user=alice"), || async {
                Ok(session("ks"))
            })
            .await
            .unwrap();
        let second = cache
            .get_or_create(&url("astra://db/ks?token=t&user=bob"), || async {
                Err(AstraError::connection("should reuse the cached session"))
            })
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_share_one_build() {
        let cache = Arc::new(SessionCache::new());
        let key = url("astra://db/ks?token=t");
        let calls = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            let key = key.clone();
            let calls = Arc::clone(&calls);
            let release = Arc::clone(&release);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_create(&key, move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        release.notified().await;
                        Ok(session("ks"))
                    })
                    .await
            }));
        }

        // Let every task reach the cache before the build finishes.
        while cache.stats().builds + cache.stats().joins < 16 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        release.notify_one();

        let mut sessions = Vec::new();
        for handle in handles {
            sessions.push(handle.await.unwrap().unwrap());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sessions.iter().all(|s| Arc::ptr_eq(s, &sessions[0])));
        assert_eq!(cache.stats().joins, 15);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let cache = SessionCache::new();
        let key = url("astra://db/ks?token=t");

        let err = cache
            .get_or_create(&key, || async { Err(AstraError::connection("handshake refused")) })
            .await
            .unwrap_err();
        assert_eq!(err, AstraError::connection("handshake refused"));
        assert!(!cache.contains(&key));

        cache
            .get_or_create(&key, || async { Ok(session("ks")) })
            .await
            .unwrap();
        assert!(cache.contains(&key));
        let stats = cache.stats();
        assert_eq!(stats.builds, 2);
        assert_eq!(stats.failures, 1);
    }

    #[tokio::test]
    async fn test_panicking_build_is_not_cached() {
        let cache = SessionCache::new();
        let key = url("astra://db/ks?token=t");

        let err = cache
            .get_or_create(&key, || async {
                let open: fn() -> AstraResult<SharedSession> = || panic!("connector bug");
                open()
            })
            .await
            .unwrap_err();
        assert_eq!(err, AstraError::connection("session build panicked"));
        assert!(!cache.contains(&key));

        let err = cache
            .get_or_create(&key, || async { Err(AstraError::connection("refused")) })
            .await
            .unwrap_err();
        assert_eq!(err, AstraError::connection("refused"));

        cache
            .get_or_create(&key, || async { Ok(session("ks")) })
            .await
            .unwrap();
        assert!(cache.contains(&key));
        assert_eq!(cache.stats().failures, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_waiters_see_same_failure() {
        let cache = Arc::new(SessionCache::new());
        let key = url("astra://db/ks?token=t");
        let calls = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());

        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = Arc::clone(&cache);
            let key = key.clone();
            let calls = Arc::clone(&calls);
            let release = Arc::clone(&release);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_create(&key, move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        release.notified().await;
                        Err(AstraError::bundle("403 Forbidden"))
                    })
                    .await
            }));
        }
        while cache.stats().builds + cache.stats().joins < 4 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        release.notify_one();

        for handle in handles {
            assert_eq!(
                handle.await.unwrap().unwrap_err(),
                AstraError::bundle("403 Forbidden")
            );
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().failures, 1);
        assert!(cache.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_slow_build_does_not_block_other_keys() {
        let cache = Arc::new(SessionCache::new());
        let slow = url("astra://slow/ks?token=t");
        let fast = url("astra://fast/ks?token=t");
        let release = Arc::new(Notify::new());

        let slow_task = {
            let cache = Arc::clone(&cache);
            let release = Arc::clone(&release);
            tokio::spawn(async move {
                cache
                    .get_or_create(&slow, move || async move {
                        release.notified().await;
                        Ok(session("slow"))
                    })
                    .await
            })
        };
        while cache.stats().builds < 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let fast_session = tokio::time::timeout(
            Duration::from_secs(5),
            cache.get_or_create(&fast, || async { Ok(session("fast")) }),
        )
        .await
        .expect("fast key blocked by slow build")
        .unwrap();
        assert_eq!(fast_session.keyspace(), "fast");

        release.notify_one();
        assert_eq!(slow_task.await.unwrap().unwrap().keyspace(), "slow");
    }

    #[tokio::test]
    async fn test_failure_for_one_key_leaves_other_key() {
        let cache = SessionCache::new();
        let good = url("astra://good/ks?token=t");
        let bad = url("astra://bad/ks?token=t");

        cache
            .get_or_create(&good, || async { Ok(session("ks")) })
            .await
            .unwrap();
        assert!(cache
            .get_or_create(&bad, || async { Err(AstraError::not_found("bad")) })
            .await
            .is_err());
        assert!(cache.contains(&good));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_evict_closes_session() {
        let cache = SessionCache::new();
        let key = url("astra://db/ks?token=t");
        let fake = Arc::new(FakeSession::default());
        let shared: SharedSession = fake.clone();
        cache
            .get_or_create(&key, move || async move { Ok(shared) })
            .await
            .unwrap();

        assert!(cache.evict(&key).await);
        assert!(fake.closed.load(Ordering::SeqCst));
        assert!(!cache.contains(&key));
        assert!(!cache.evict(&key).await);
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = SessionCache::new();
        for db in ["a", "b", "c"] {
            cache
                .get_or_create(&url(&format!("astra://{db}/ks?token=t")), || async {
                    Ok(session("ks"))
                })
                .await
                .unwrap();
        }
        assert_eq!(cache.len(), 3);
        cache.clear().await;
        assert!(cache.is_empty());
    }
}
