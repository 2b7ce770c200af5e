//! Customer ID issuance.
//!
//! The durable store is the source of truth for the last issued ID. When it
//! cannot answer, IDs are projected from a process-local counter instead so
//! that issuance never fails. Projected IDs restart from the seed on every
//! process start; collisions with durable records are caught at insert time
//! by the store's uniqueness constraint.

use crate::store::RecordStore;
use core::time::Duration;
use portable_atomic::{AtomicU64, Ordering};
use serde::Serialize;
use sitevisit_id::CustomerSequenceId;
use std::sync::Arc;

/// Where an ID was resolved from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdSource {
    Database,
    Memory,
}

impl IdSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::Memory => "memory",
        }
    }
}

/// The last issued ID, if any.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Latest {
    pub id: Option<CustomerSequenceId>,
    pub source: IdSource,
}

/// A freshly issued ID.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Issued {
    pub id: CustomerSequenceId,
    pub source: IdSource,
}

/// Resolves and issues customer IDs.
#[derive(Debug)]
pub struct SequenceSource<D> {
    store: Option<Arc<D>>,
    counter: AtomicU64,
    timeout: Duration,
}

impl<D: RecordStore> SequenceSource<D> {
    /// `timeout` bounds each lookup against `store`. `None` means every ID is
    /// projected from the counter.
    pub fn new(store: Option<Arc<D>>, timeout: Duration) -> Self {
        Self {
            store,
            counter: AtomicU64::new(0),
            timeout,
        }
    }

    /// The most recently issued ID.
    ///
    /// Never fails: store errors and timeouts are logged and answered from
    /// the counter, which advances by one on every degraded call.
    #[tracing::instrument(level = "debug", skip(self), fields(source))]
    pub async fn latest_issued(&self) -> Latest {
        let Some(store) = self.store.as_deref() else {
            return self.projected();
        };

        match tokio::time::timeout(self.timeout, store.latest_customer_id()).await {
            Ok(Ok(token)) => {
                let id = token.as_deref().and_then(|token| {
                    CustomerSequenceId::parse(token)
                        .inspect_err(|e| {
                            tracing::warn!(token, error = %e, "stored customer ID is malformed, restarting from seed");
                        })
                        .ok()
                });
                tracing::Span::current().record("source", "database");
                Latest {
                    id,
                    source: IdSource::Database,
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "customer ID lookup failed, using in-memory counter");
                self.projected()
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "customer ID lookup timed out, using in-memory counter"
                );
                self.projected()
            }
        }
    }

    /// The successor of [`latest_issued`](Self::latest_issued), or the seed if
    /// nothing has been issued.
    pub async fn next_id(&self) -> Issued {
        let Latest { id, source } = self.latest_issued().await;
        Issued {
            id: id.map_or_else(CustomerSequenceId::seed, |id| id.next()),
            source,
        }
    }

    fn projected(&self) -> Latest {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        tracing::Span::current().record("source", "memory");
        Latest {
            id: n.checked_sub(1).map(CustomerSequenceId::from_ordinal),
            source: IdSource::Memory,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::{Error, Result},
        record::{SiteVisitRecord, VisitFilter},
    };
    use core::future::{Future, ready};
    use std::collections::HashSet;

    /// `None` never answers; `Some(Err(()))` fails as unreachable.
    type Answer = Option<core::result::Result<Option<String>, ()>>;

    /// Answers `latest_customer_id` from a fixed value, or fails.
    struct FixedLatest(Answer);

    impl RecordStore for FixedLatest {
        fn probe(&self) -> impl Future<Output = Result<()>> + Send {
            ready(Ok(()))
        }

        fn latest_customer_id(&self) -> impl Future<Output = Result<Option<String>>> + Send {
            let answer = match &self.0 {
                Some(Ok(token)) => Ok(token.clone()),
                Some(Err(())) => Err(Error::unavailable("connection refused")),
                None => Ok(None),
            };
            async move {
                if self.0.is_none() {
                    // Never answers within the lookup timeout.
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                answer
            }
        }

        fn insert(&self, _: &SiteVisitRecord) -> impl Future<Output = Result<()>> + Send {
            ready(Ok(()))
        }

        fn list(&self, _: &VisitFilter) -> impl Future<Output = Result<Vec<SiteVisitRecord>>> + Send {
            ready(Ok(Vec::new()))
        }

        fn get(&self, _: &str) -> impl Future<Output = Result<Option<SiteVisitRecord>>> + Send {
            ready(Ok(None))
        }

        fn update(&self, _: &SiteVisitRecord) -> impl Future<Output = Result<bool>> + Send {
            ready(Ok(false))
        }

        fn delete(&self, _: &str) -> impl Future<Output = Result<bool>> + Send {
            ready(Ok(false))
        }
    }

    fn source(answer: Answer) -> SequenceSource<FixedLatest> {
        SequenceSource::new(
            Some(Arc::new(FixedLatest(answer))),
            Duration::from_millis(50),
        )
    }

    #[tokio::test]
    async fn continues_from_stored_latest() {
        let issued = source(Some(Ok(Some("A-000a05".to_owned())))).next_id().await;
        assert_eq!(issued.id.to_string(), "A-000a06");
        assert_eq!(issued.source, IdSource::Database);
    }

    #[tokio::test]
    async fn empty_store_issues_seed() {
        let issued = source(Some(Ok(None))).next_id().await;
        assert_eq!(issued.id, CustomerSequenceId::seed());
        assert_eq!(issued.source, IdSource::Database);
    }

    #[tokio::test]
    async fn malformed_stored_token_restarts_from_seed() {
        let issued = source(Some(Ok(Some("garbage".to_owned())))).next_id().await;
        assert_eq!(issued.id, CustomerSequenceId::seed());
        assert_eq!(issued.source, IdSource::Database);
    }

    #[tokio::test]
    async fn failing_store_falls_back_to_counter() {
        let source = source(Some(Err(())));
        let first = source.next_id().await;
        let second = source.next_id().await;
        assert_eq!(first.source, IdSource::Memory);
        assert_eq!(first.id.to_string(), "A-000a01");
        assert_eq!(second.id.to_string(), "A-000a02");
    }

    #[tokio::test]
    async fn slow_store_times_out_to_counter() {
        let issued = source(None).next_id().await;
        assert_eq!(issued.source, IdSource::Memory);
        assert_eq!(issued.id, CustomerSequenceId::seed());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_degraded_issuance_is_unique() {
        let source = Arc::new(SequenceSource::<FixedLatest>::new(None, Duration::from_millis(50)));
        let tasks: Vec<_> = (0..256)
            .map(|_| {
                let source = Arc::clone(&source);
                tokio::spawn(async move { source.next_id().await.id })
            })
            .collect();

        let mut seen = HashSet::new();
        for task in tasks {
            assert!(seen.insert(task.await.unwrap()));
        }
        assert!(seen.contains(&CustomerSequenceId::from_ordinal(255)));
    }
}
