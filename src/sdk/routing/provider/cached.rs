use crate::sdk::location::Coordinate;
use crate::sdk::routing::cache::{LegCache, LegKey};
use crate::sdk::routing::error::RoutingError;
use crate::sdk::routing::route::RouteSummary;
use crate::sdk::routing::service::RouteProvider;
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

/// Serves repeated leg lookups from a [`LegCache`] before asking the wrapped provider.
pub struct CachedProvider<P> {
    inner: P,
    cache: Mutex<LegCache>,
}

impl<P: RouteProvider> CachedProvider<P> {
    pub fn new(inner: P, cache: LegCache) -> Self {
        Self {
            inner,
            cache: Mutex::new(cache),
        }
    }

    fn cache(&self) -> MutexGuard<'_, LegCache> {
        // A poisoned cache is still a usable cache
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs `f` against the cache, e.g. to persist it.
    pub fn with_cache<R>(&self, f: impl FnOnce(&LegCache) -> R) -> R {
        f(&self.cache())
    }
}

#[async_trait]
impl<P: RouteProvider> RouteProvider for CachedProvider<P> {
    async fn get_directions(
        &self,
        start: Coordinate,
        end: Coordinate,
    ) -> Result<RouteSummary, RoutingError> {
        let key = LegKey::new(start, end);
        let hit = self.cache().get_leg(&key);
        if let Some(summary) = hit {
            log::debug!("[CACHE HIT] {}", key);
            return Ok(summary);
        }

        let summary = self.inner.get_directions(start, end).await?;
        self.cache().insert_leg(key, summary);
        Ok(summary)
    }

    async fn get_geometry(
        &self,
        start: Coordinate,
        end: Coordinate,
    ) -> Result<Vec<Coordinate>, RoutingError> {
        self.inner.get_geometry(start, end).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl RouteProvider for CountingProvider {
        async fn get_directions(
            &self,
            _start: Coordinate,
            _end: Coordinate,
        ) -> Result<RouteSummary, RoutingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RoutingError::NoRoute);
            }
            Ok(RouteSummary {
                distance_m: 800.0,
                duration_s: 90.0,
            })
        }

        async fn get_geometry(
            &self,
            start: Coordinate,
            end: Coordinate,
        ) -> Result<Vec<Coordinate>, RoutingError> {
            Ok(vec![start, end])
        }
    }

    fn provider(fail: bool) -> CachedProvider<CountingProvider> {
        CachedProvider::new(
            CountingProvider {
                calls: AtomicUsize::new(0),
                fail,
            },
            LegCache::default(),
        )
    }

    const A: Coordinate = Coordinate { lat: 1.0, lng: 2.0 };
    const B: Coordinate = Coordinate { lat: 1.5, lng: 2.5 };

    #[tokio::test]
    async fn second_lookup_is_served_from_cache() {
        let cached = provider(false);
        let first = cached.get_directions(A, B).await.unwrap();
        let second = cached.get_directions(A, B).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cached.with_cache(|c| c.len()), 1);
    }

    #[tokio::test]
    async fn reverse_direction_is_a_separate_leg() {
        let cached = provider(false);
        cached.get_directions(A, B).await.unwrap();
        cached.get_directions(B, A).await.unwrap();
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cached = provider(true);
        assert!(cached.get_directions(A, B).await.is_err());
        assert!(cached.get_directions(A, B).await.is_err());
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
        assert!(cached.with_cache(|c| c.is_empty()));
    }
}
