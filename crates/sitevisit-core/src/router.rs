//! Per-request routing between the durable store and the ephemeral buffer.
//!
//! Every operation starts with a bounded probe of the durable store. If it
//! answers, the operation runs there; otherwise it runs against the in-process
//! buffer. Creates are then offered once to the mirror. Availability is
//! re-evaluated on every call; nothing is cached between requests.
//!
//! ## Degraded reads
//!
//! While the durable store is down, lookups by primary key can only see the
//! buffer. A miss there is reported as [`Error::StoreUnavailable`] rather than
//! [`Error::NotFound`], since the record may well exist in the unreachable
//! store.

use crate::{
    error::{Error, Result},
    mirror::{Mirror, MirrorRow},
    record::{SiteVisitDraft, SiteVisitRecord, VisitFilter},
    sequence::{IdSource, Issued, SequenceSource},
    store::{Backend, EphemeralStore, RecordStore},
};
use chrono::Utc;
use core::{cmp, time::Duration};
use serde::Serialize;
use sitevisit_id::CustomerSequenceId;
use std::sync::Arc;


/// Tunables for a [`StorageRouter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouterConfig {
    /// Upper bound on each availability probe and sequence lookup.
    pub probe_timeout: Duration,
    /// Upper bound on each mirror write.
    pub mirror_timeout: Duration,
    /// How many times a create regenerates its customer ID after a
    /// uniqueness conflict before giving up.
    pub max_id_retries: u32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_millis(1500),
            mirror_timeout: Duration::from_millis(5000),
            max_id_retries: 3,
        }
    }
}

/// Which backend served a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Mode {
    #[serde(rename = "database")]
    Durable,
    #[serde(rename = "memory")]
    Ephemeral,
}

impl Mode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Durable => "database",
            Self::Ephemeral => "memory",
        }
    }

    pub const fn is_degraded(self) -> bool {
        matches!(self, Self::Ephemeral)
    }
}

/// Result of the mirror step of a create.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MirrorStatus {
    /// No mirror endpoint is configured.
    Skipped,
    Synced,
    /// The endpoint failed or timed out. Not retried.
    Failed,
}

/// Where a created record ended up. The three flags are independent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageOutcome {
    #[serde(rename = "database")]
    pub persisted: bool,
    #[serde(rename = "memory")]
    pub buffered: bool,
    #[serde(rename = "googleSheets")]
    pub mirrored: bool,
    pub mirror: MirrorStatus,
}

/// A successful create.
#[derive(Clone, Debug, PartialEq)]
pub struct Created {
    pub record: SiteVisitRecord,
    pub storage: StorageOutcome,
}

/// A successful listing, with the backend it was read from.
#[derive(Clone, Debug, PartialEq)]
pub struct Listing {
    pub records: Vec<SiteVisitRecord>,
    pub mode: Mode,
}

/// Routes record operations between a durable store `D` and the process-local
/// buffer, and replicates creates through mirror `M`.
#[derive(Debug)]
pub struct StorageRouter<D, M> {
    durable: Option<Arc<D>>,
    buffer: EphemeralStore,
    sequence: SequenceSource<D>,
    mirror: Option<M>,
    config: RouterConfig,
}

impl<D, M> StorageRouter<D, M>
where
    D: RecordStore,
    M: Mirror,
{
    /// With `durable` unset every request runs against the buffer; with
    /// `mirror` unset the mirror step is skipped.
    pub fn new(durable: Option<D>, mirror: Option<M>, config: RouterConfig) -> Self {
        let durable = durable.map(Arc::new);
        Self {
            sequence: SequenceSource::new(durable.clone(), config.probe_timeout),
            durable,
            buffer: EphemeralStore::new(),
            mirror,
            config,
        }
    }

    /// The process-local buffer.
    pub const fn buffer(&self) -> &EphemeralStore {
        &self.buffer
    }

    pub const fn has_durable_store(&self) -> bool {
        self.durable.is_some()
    }

    /// Decides which backend the next operation should use.
    pub async fn probe(&self) -> Mode {
        let Some(store) = self.durable.as_deref() else {
            return Mode::Ephemeral;
        };
        match tokio::time::timeout(self.config.probe_timeout, store.probe()).await {
            Ok(Ok(())) => Mode::Durable,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "durable store unavailable, using in-memory buffer");
                Mode::Ephemeral
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.config.probe_timeout.as_millis() as u64,
                    "durable store probe timed out, using in-memory buffer"
                );
                Mode::Ephemeral
            }
        }
    }

    async fn route(&self) -> (Mode, Backend<'_, D>) {
        match (self.probe().await, self.durable.as_deref()) {
            (Mode::Durable, Some(store)) => (Mode::Durable, Backend::Durable(store)),
            _ => (Mode::Ephemeral, Backend::Ephemeral(&self.buffer)),
        }
    }

    /// Issues the next customer ID without storing anything.
    pub async fn next_customer_id(&self) -> Issued {
        self.sequence.next_id().await
    }

    /// Stores a new record and offers it to the mirror.
    ///
    /// A caller-supplied `customer_id` is kept only if it is above every ID
    /// the target backend has issued; otherwise, or when absent, one is
    /// issued. A uniqueness conflict moves on to an ID past the taken one, up
    /// to [`RouterConfig::max_id_retries`] times.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] once retries are exhausted, or any error
    /// the buffer itself reports. Durable and mirror failures are absorbed.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn create(
        &self,
        draft: SiteVisitDraft,
        customer_id: Option<CustomerSequenceId>,
    ) -> Result<Created> {
        let mode = self.probe().await;
        let customer_id = self.admit(mode, customer_id).await;
        let mut record = SiteVisitRecord::new(customer_id, draft, Utc::now());

        let mut retries = 0;
        let (persisted, buffered) = loop {
            match self.store_new(mode, &record).await {
                Ok(placement) => break placement,
                Err(Error::Conflict { customer_id }) if retries < self.config.max_id_retries => {
                    retries += 1;
                    record.customer_id = cmp::max(self.issue().await, record.customer_id.next());
                    tracing::warn!(
                        taken = %customer_id,
                        replacement = %record.customer_id,
                        retries,
                        "customer ID conflict, regenerated"
                    );
                }
                Err(e) => return Err(e),
            }
        };

        let mirror = self.replicate(&record).await;
        tracing::info!(
            id = %record.id,
            customer_id = %record.customer_id,
            persisted,
            buffered,
            mirror = ?mirror,
            "site visit created"
        );
        Ok(Created {
            record,
            storage: StorageOutcome {
                persisted,
                buffered,
                mirrored: mirror == MirrorStatus::Synced,
                mirror,
            },
        })
    }

    // Keeps a requested ID only if it is above the backend's high-water mark,
    // so it can never shadow the next automatically issued ID.
    async fn admit(
        &self,
        mode: Mode,
        requested: Option<CustomerSequenceId>,
    ) -> CustomerSequenceId {
        let Some(requested) = requested else {
            return self.issue().await;
        };
        let mark = self.issued_mark(mode).await;
        if mark.as_ref().is_none_or(|mark| requested > *mark) {
            return requested;
        }
        let issued = self.issue().await;
        let replacement = match mark {
            Some(mark) => cmp::max(issued, mark.next()),
            None => issued,
        };
        tracing::warn!(
            requested = %requested,
            replacement = %replacement,
            "requested customer ID already issued, replaced"
        );
        replacement
    }

    async fn issued_mark(&self, mode: Mode) -> Option<CustomerSequenceId> {
        let lookup = async {
            match (mode, self.durable.as_deref()) {
                (Mode::Durable, Some(store)) => store.latest_customer_id().await,
                _ => self.buffer.latest_customer_id().await,
            }
        };
        match tokio::time::timeout(self.config.probe_timeout, lookup).await {
            Ok(Ok(token)) => token.and_then(|token| token.parse().ok()),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "customer ID mark lookup failed");
                None
            }
            Err(_) => {
                tracing::warn!("customer ID mark lookup timed out");
                None
            }
        }
    }

    async fn issue(&self) -> CustomerSequenceId {
        let Issued { id, source } = self.sequence.next_id().await;
        if source == IdSource::Memory {
            tracing::debug!(customer_id = %id, "customer ID projected from in-memory counter");
        }
        id
    }

    // Returns (persisted, buffered).
    async fn store_new(&self, mode: Mode, record: &SiteVisitRecord) -> Result<(bool, bool)> {
        if let (Mode::Durable, Some(store)) = (mode, self.durable.as_deref()) {
            match store.insert(record).await {
                Ok(()) => return Ok((true, false)),
                Err(e @ Error::Conflict { .. }) => return Err(e),
                Err(e) => {
                    tracing::warn!(error = %e, "durable write failed after probe, buffering record");
                }
            }
        }
        self.buffer.insert(record).await?;
        Ok((false, true))
    }

    async fn replicate(&self, record: &SiteVisitRecord) -> MirrorStatus {
        let Some(mirror) = &self.mirror else {
            return MirrorStatus::Skipped;
        };
        let row = MirrorRow::from(record);
        match tokio::time::timeout(self.config.mirror_timeout, mirror.push(&row)).await {
            Ok(Ok(())) => MirrorStatus::Synced,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, customer_id = %row.customer_id, "mirror write failed");
                MirrorStatus::Failed
            }
            Err(_) => {
                tracing::warn!(customer_id = %row.customer_id, "mirror write timed out");
                MirrorStatus::Failed
            }
        }
    }

    /// Records matching `filter`, most recent first.
    ///
    /// # Errors
    ///
    /// Returns driver errors other than unavailability; an unavailable
    /// durable store degrades to the buffer instead.
    pub async fn list(&self, filter: &VisitFilter) -> Result<Listing> {
        let (mode, backend) = self.route().await;
        match backend.list(filter).await {
            Ok(records) => Ok(Listing { records, mode }),
            Err(Error::StoreUnavailable { context }) if mode == Mode::Durable => {
                tracing::warn!(%context, "durable read failed after probe, reading buffer");
                Ok(Listing {
                    records: self.buffer.list(filter).await?,
                    mode: Mode::Ephemeral,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// # Errors
    ///
    /// Returns [`Error::NotFound`], or [`Error::StoreUnavailable`] for a
    /// buffer miss while the durable store is down.
    pub async fn get(&self, id: &str) -> Result<SiteVisitRecord> {
        let (mode, backend) = self.route().await;
        backend
            .get(id)
            .await?
            .ok_or_else(|| self.missing(mode, id))
    }

    /// Replaces every caller-controlled field of an existing record. The
    /// customer ID and creation time are kept.
    ///
    /// # Errors
    ///
    /// As for [`get`](Self::get).
    pub async fn update(&self, id: &str, draft: SiteVisitDraft) -> Result<SiteVisitRecord> {
        let (mode, backend) = self.route().await;
        let current = backend
            .get(id)
            .await?
            .ok_or_else(|| self.missing(mode, id))?;
        let updated = current.with_changes(draft, Utc::now());
        if !backend.update(&updated).await? {
            return Err(self.missing(mode, id));
        }
        tracing::info!(id, mode = mode.as_str(), "site visit updated");
        Ok(updated)
    }

    /// # Errors
    ///
    /// As for [`get`](Self::get).
    pub async fn delete(&self, id: &str) -> Result<()> {
        let (mode, backend) = self.route().await;
        if !backend.delete(id).await? {
            return Err(self.missing(mode, id));
        }
        tracing::info!(id, mode = mode.as_str(), "site visit deleted");
        Ok(())
    }

    fn missing(&self, mode: Mode, id: &str) -> Error {
        if mode.is_degraded() && self.has_durable_store() {
            Error::unavailable(format!(
                "record {id} is not buffered and the durable store is unreachable"
            ))
        } else {
            Error::NotFound { id: id.to_owned() }
        }
    }
}
