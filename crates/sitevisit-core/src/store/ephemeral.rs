use crate::{
    error::{Error, Result},
    record::{SiteVisitRecord, VisitFilter},
    store::RecordStore,
};
use core::future::{Future, ready};
use parking_lot::RwLock;
use sitevisit_id::CustomerSequenceId;
use std::collections::VecDeque;

/// Process-local fallback buffer.
///
/// Records are kept most-recent-first. Contents live for the lifetime of the
/// process and are lost on restart; nothing here is ever replayed into the
/// durable store.
///
/// The highest customer ID ever inserted is remembered separately from the
/// records, so deleting the newest record does not hand its ID out again.
#[derive(Debug, Default)]
pub struct EphemeralStore {
    inner: RwLock<Buffer>,
}

#[derive(Debug, Default)]
struct Buffer {
    records: VecDeque<SiteVisitRecord>,
    high_water: Option<CustomerSequenceId>,
}

impl EphemeralStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }

    fn push(&self, record: &SiteVisitRecord) -> Result<()> {
        let mut inner = self.inner.write();
        if inner
            .records
            .iter()
            .any(|r| r.customer_id == record.customer_id)
        {
            return Err(Error::Conflict {
                customer_id: record.customer_id.to_string(),
            });
        }
        if inner
            .high_water
            .as_ref()
            .is_none_or(|mark| record.customer_id > *mark)
        {
            inner.high_water = Some(record.customer_id.clone());
        }
        inner.records.push_front(record.clone());
        Ok(())
    }

    fn replace(&self, record: &SiteVisitRecord) -> bool {
        let mut inner = self.inner.write();
        match inner.records.iter_mut().find(|r| r.id == record.id) {
            Some(slot) => {
                *slot = record.clone();
                true
            }
            None => false,
        }
    }

    fn remove(&self, id: &str) -> bool {
        let mut inner = self.inner.write();
        match inner.records.iter().position(|r| r.id == id) {
            Some(index) => inner.records.remove(index).is_some(),
            None => false,
        }
    }
}

impl RecordStore for EphemeralStore {
    fn probe(&self) -> impl Future<Output = Result<()>> + Send {
        ready(Ok(()))
    }

    fn latest_customer_id(&self) -> impl Future<Output = Result<Option<String>>> + Send {
        let latest = self
            .inner
            .read()
            .high_water
            .as_ref()
            .map(ToString::to_string);
        ready(Ok(latest))
    }

    fn insert(&self, record: &SiteVisitRecord) -> impl Future<Output = Result<()>> + Send {
        ready(self.push(record))
    }

    fn list(
        &self,
        filter: &VisitFilter,
    ) -> impl Future<Output = Result<Vec<SiteVisitRecord>>> + Send {
        let records = self
            .inner
            .read()
            .records
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        ready(Ok(records))
    }

    fn get(&self, id: &str) -> impl Future<Output = Result<Option<SiteVisitRecord>>> + Send {
        let found = self
            .inner
            .read()
            .records
            .iter()
            .find(|r| r.id == id)
            .cloned();
        ready(Ok(found))
    }

    fn update(&self, record: &SiteVisitRecord) -> impl Future<Output = Result<bool>> + Send {
        ready(Ok(self.replace(record)))
    }

    fn delete(&self, id: &str) -> impl Future<Output = Result<bool>> + Send {
        ready(Ok(self.remove(id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{VisitStatus, fixtures::record};

    #[tokio::test]
    async fn keeps_most_recent_first() {
        let store = EphemeralStore::new();
        store.insert(&record("A-000a01", "First")).await.unwrap();
        store.insert(&record("A-000a02", "Second")).await.unwrap();

        let names: Vec<_> = store
            .list(&VisitFilter::default())
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.visit.customer_name)
            .collect();
        assert_eq!(names, ["Second", "First"]);
        assert_eq!(
            store.latest_customer_id().await.unwrap().as_deref(),
            Some("A-000a02")
        );
    }

    #[tokio::test]
    async fn rejects_duplicate_customer_id() {
        let store = EphemeralStore::new();
        store.insert(&record("A-000a01", "First")).await.unwrap();
        let err = store
            .insert(&record("A-000a01", "Again"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { customer_id } if customer_id == "A-000a01"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn update_and_delete_by_primary_key() {
        let store = EphemeralStore::new();
        let original = record("A-000a01", "First");
        store.insert(&original).await.unwrap();

        let mut changed = original.clone();
        changed.visit.status = VisitStatus::Complete;
        assert!(store.update(&changed).await.unwrap());
        let fetched = store.get(&original.id).await.unwrap().unwrap();
        assert_eq!(fetched.visit.status, VisitStatus::Complete);

        assert!(!store.update(&record("A-000a09", "Ghost")).await.unwrap());
        assert!(store.delete(&original.id).await.unwrap());
        assert!(!store.delete(&original.id).await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn deleted_customer_ids_stay_issued() {
        let store = EphemeralStore::new();
        let newest = record("A-000a02", "Second");
        store.insert(&record("A-000a01", "First")).await.unwrap();
        store.insert(&newest).await.unwrap();
        assert!(store.delete(&newest.id).await.unwrap());

        assert_eq!(
            store.latest_customer_id().await.unwrap().as_deref(),
            Some("A-000a02")
        );
    }

    #[tokio::test]
    async fn lower_insert_keeps_high_water() {
        let store = EphemeralStore::new();
        store.insert(&record("A-000b10", "High")).await.unwrap();
        store.insert(&record("A-000a03", "Low")).await.unwrap();

        assert_eq!(
            store.latest_customer_id().await.unwrap().as_deref(),
            Some("A-000b10")
        );
    }
}
