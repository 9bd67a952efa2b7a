//! Cached, retried schedule lookup.

use std::future::Future;

use tracing::info;

use crate::cache::DiskCache;
use crate::retry::{RetryError, RetryPolicy, with_retry};

use super::error::ScheduleError;
use super::types::Stop;

/// Something that can resolve a line identifier to its ordered stops.
pub trait ScheduleSource: Send + Sync {
    fn stops_for(
        &self,
        line_id: &str,
    ) -> impl Future<Output = Result<Vec<Stop>, ScheduleError>> + Send;
}

impl<S: ScheduleSource> ScheduleSource for &S {
    fn stops_for(
        &self,
        line_id: &str,
    ) -> impl Future<Output = Result<Vec<Stop>, ScheduleError>> + Send {
        (**self).stops_for(line_id)
    }
}

/// Wraps a source with the TTL cache and the retry policy.
///
/// Stop lists are cached under the line id. Transient failures are retried
/// with exponential backoff; credential and client errors are not.
/// Exhausting the attempts yields [`ScheduleError::Unreachable`].
#[derive(Debug)]
pub struct ScheduleLookup<S> {
    source: S,
    cache: DiskCache,
    policy: RetryPolicy,
}

impl<S: ScheduleSource> ScheduleLookup<S> {
    pub fn new(source: S, cache: DiskCache, policy: RetryPolicy) -> Self {
        Self {
            source,
            cache,
            policy,
        }
    }

    async fn fetch(&self, line_id: &str) -> Result<Vec<Stop>, ScheduleError> {
        let stops = with_retry(&self.policy, "schedule lookup", |_| self.source.stops_for(line_id))
            .await
            .map_err(|e| match e {
                RetryError::Permanent(e) => e,
                RetryError::Exhausted { attempts, last } => ScheduleError::Unreachable {
                    attempts,
                    last: Box::new(last),
                },
            })?;

        if stops.is_empty() {
            return Err(ScheduleError::UnknownLine {
                line_id: line_id.to_string(),
            });
        }
        info!(line_id, stops = stops.len(), "fetched schedule");
        Ok(stops)
    }
}

impl<S: ScheduleSource> ScheduleSource for ScheduleLookup<S> {
    async fn stops_for(&self, line_id: &str) -> Result<Vec<Stop>, ScheduleError> {
        self.cache
            .get_or_compute_json(line_id, || self.fetch(line_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::cache::CacheConfig;
    use tempfile::tempdir;

    /// Fails transiently `failures` times, then returns one stop.
    struct FlakySource {
        failures: u32,
        calls: AtomicU32,
        error: fn() -> ScheduleError,
    }

    impl FlakySource {
        fn new(failures: u32, error: fn() -> ScheduleError) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                error,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ScheduleSource for FlakySource {
        async fn stops_for(&self, _line_id: &str) -> Result<Vec<Stop>, ScheduleError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err((self.error)())
            } else {
                Ok(vec![Stop::new("NZM", "Hazrat Nizamuddin", 0, 600)])
            }
        }
    }

    fn lookup<S: ScheduleSource>(
        source: S,
        folder: &std::path::Path,
        attempts: u32,
    ) -> ScheduleLookup<S> {
        let cache = DiskCache::new(&CacheConfig::new(folder));
        ScheduleLookup::new(source, cache, RetryPolicy::immediate(attempts))
    }

    #[tokio::test]
    async fn retries_transient_then_caches() {
        let dir = tempdir().unwrap();
        let source = FlakySource::new(2, || ScheduleError::RateLimited);
        let lookup = lookup(&source, dir.path(), 7);

        let stops = lookup.stops_for("12425").await.unwrap();
        assert_eq!(stops[0].code, "NZM");
        assert_eq!(source.calls(), 3);

        let again = lookup.stops_for("12425").await.unwrap();
        assert_eq!(again, stops);
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn exhaustion_is_unreachable() {
        let dir = tempdir().unwrap();
        let source = FlakySource::new(u32::MAX, || ScheduleError::Api {
            status: 502,
            message: "bad gateway".into(),
        });
        let lookup = lookup(&source, dir.path(), 4);

        let err = lookup.stops_for("12425").await.unwrap_err();
        assert!(matches!(err, ScheduleError::Unreachable { attempts: 4, .. }));
        assert_eq!(source.calls(), 4);
    }

    #[tokio::test]
    async fn client_error_not_retried() {
        let dir = tempdir().unwrap();
        let source = FlakySource::new(u32::MAX, || ScheduleError::Api {
            status: 404,
            message: "no such train".into(),
        });
        let lookup = lookup(&source, dir.path(), 7);

        let err = lookup.stops_for("99999").await.unwrap_err();
        assert!(matches!(err, ScheduleError::Api { status: 404, .. }));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn credentials_error_not_retried_or_cached() {
        let dir = tempdir().unwrap();
        let source = FlakySource::new(1, || ScheduleError::Credentials {
            path: "creds.json".into(),
            message: "missing".into(),
        });
        let lookup = lookup(&source, dir.path(), 7);

        assert!(matches!(
            lookup.stops_for("12425").await,
            Err(ScheduleError::Credentials { .. })
        ));
        assert_eq!(source.calls(), 1);

        // Nothing was cached, so the next lookup reaches the source again
        assert!(lookup.stops_for("12425").await.is_ok());
        assert_eq!(source.calls(), 2);
    }
}
