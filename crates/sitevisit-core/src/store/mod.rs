//! Record storage backends.
//!
//! A [`RecordStore`] is either the durable relational store
//! ([`DurableStore`]) or the process-local buffer ([`EphemeralStore`]). The
//! router picks one per request; [`Backend`] lets it do so without duplicating
//! every call site.

mod durable;
mod ephemeral;

pub use durable::*;
pub use ephemeral::*;

use crate::{
    error::Result,
    record::{SiteVisitRecord, VisitFilter},
};
use core::future::Future;

/// A place site-visit records can be kept.
///
/// All futures are `Send` so handlers can hold them across `.await` points on
/// a multi-threaded runtime.
pub trait RecordStore: Send + Sync {
    /// Checks the store is usable. Cheap; called once per request.
    fn probe(&self) -> impl Future<Output = Result<()>> + Send;

    /// The highest customer ID ever stored, even if its record has since been
    /// deleted.
    fn latest_customer_id(&self) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Inserts a new record.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Conflict`] if the customer ID is already taken.
    fn insert(&self, record: &SiteVisitRecord) -> impl Future<Output = Result<()>> + Send;

    /// Records matching `filter`, most recently created first.
    fn list(
        &self,
        filter: &VisitFilter,
    ) -> impl Future<Output = Result<Vec<SiteVisitRecord>>> + Send;

    fn get(&self, id: &str) -> impl Future<Output = Result<Option<SiteVisitRecord>>> + Send;

    /// Replaces the stored record with the same primary key. Returns `false`
    /// if there was none.
    fn update(&self, record: &SiteVisitRecord) -> impl Future<Output = Result<bool>> + Send;

    /// Returns `false` if there was no such record.
    fn delete(&self, id: &str) -> impl Future<Output = Result<bool>> + Send;
}

/// The store a single request was routed to.
#[derive(Debug)]
pub enum Backend<'a, D> {
    Durable(&'a D),
    Ephemeral(&'a EphemeralStore),
}

impl<D: RecordStore> RecordStore for Backend<'_, D> {
    fn probe(&self) -> impl Future<Output = Result<()>> + Send {
        async move {
            match self {
                Self::Durable(store) => store.probe().await,
                Self::Ephemeral(store) => store.probe().await,
            }
        }
    }

    fn latest_customer_id(&self) -> impl Future<Output = Result<Option<String>>> + Send {
        async move {
            match self {
                Self::Durable(store) => store.latest_customer_id().await,
                Self::Ephemeral(store) => store.latest_customer_id().await,
            }
        }
    }

    fn insert(&self, record: &SiteVisitRecord) -> impl Future<Output = Result<()>> + Send {
        async move {
            match self {
                Self::Durable(store) => store.insert(record).await,
                Self::Ephemeral(store) => store.insert(record).await,
            }
        }
    }

    fn list(
        &self,
        filter: &VisitFilter,
    ) -> impl Future<Output = Result<Vec<SiteVisitRecord>>> + Send {
        async move {
            match self {
                Self::Durable(store) => store.list(filter).await,
                Self::Ephemeral(store) => store.list(filter).await,
            }
        }
    }

    fn get(&self, id: &str) -> impl Future<Output = Result<Option<SiteVisitRecord>>> + Send {
        async move {
            match self {
                Self::Durable(store) => store.get(id).await,
                Self::Ephemeral(store) => store.get(id).await,
            }
        }
    }

    fn update(&self, record: &SiteVisitRecord) -> impl Future<Output = Result<bool>> + Send {
        async move {
            match self {
                Self::Durable(store) => store.update(record).await,
                Self::Ephemeral(store) => store.update(record).await,
            }
        }
    }

    fn delete(&self, id: &str) -> impl Future<Output = Result<bool>> + Send {
        async move {
            match self {
                Self::Durable(store) => store.delete(id).await,
                Self::Ephemeral(store) => store.delete(id).await,
            }
        }
    }
}
