//! Persistence port for bid records.
//!
//! Implementations must make `commit` atomic across the bid, its negotiation
//! and the finalization request, and must refuse it when the stored version
//! is not the one the caller loaded.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::domain::bid::{BidId, RequirementId};
use crate::domain::record::BidRecord;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("bid {0} already exists")]
    AlreadyExists(BidId),
    #[error("bid {bid_id} was modified concurrently (expected version {expected}, found {actual})")]
    Conflict { bid_id: BidId, expected: u64, actual: u64 },
    #[error("storage backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait BidStore: Send + Sync {
    async fn load(&self, bid_id: &BidId) -> Result<Option<BidRecord>, StoreError>;

    async fn insert(&self, record: BidRecord) -> Result<(), StoreError>;

    /// Replaces the stored record if its version still equals `expected_version`.
    async fn commit(&self, record: BidRecord, expected_version: u64) -> Result<(), StoreError>;

    async fn list_for_requirement(
        &self,
        requirement_id: &RequirementId,
    ) -> Result<Vec<BidRecord>, StoreError>;
}

#[derive(Default)]
pub struct InMemoryBidStore {
    records: RwLock<HashMap<BidId, BidRecord>>,
}

#[async_trait]
impl BidStore for InMemoryBidStore {
    async fn load(&self, bid_id: &BidId) -> Result<Option<BidRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records.get(bid_id).cloned())
    }

    async fn insert(&self, record: BidRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.bid.id) {
            return Err(StoreError::AlreadyExists(record.bid.id));
        }
        records.insert(record.bid.id.clone(), record);
        Ok(())
    }

    async fn commit(&self, record: BidRecord, expected_version: u64) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let Some(current) = records.get_mut(&record.bid.id) else {
            return Err(StoreError::Backend(format!("bid {} is not stored", record.bid.id)));
        };
        if current.version != expected_version {
            return Err(StoreError::Conflict {
                bid_id: record.bid.id.clone(),
                expected: expected_version,
                actual: current.version,
            });
        }
        *current = record;
        Ok(())
    }

    async fn list_for_requirement(
        &self,
        requirement_id: &RequirementId,
    ) -> Result<Vec<BidRecord>, StoreError> {
        let records = self.records.read().await;
        let mut matching = records
            .values()
            .filter(|record| &record.bid.requirement_id == requirement_id)
            .cloned()
            .collect::<Vec<_>>();
        matching.sort_by(|left, right| left.bid.id.cmp(&right.bid.id));
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{BidStore, InMemoryBidStore, StoreError};
    use crate::domain::bid::{Bid, BidDraft, BidId, CustomerId, RequirementId, VendorId};
    use crate::domain::record::BidRecord;

    fn record(id: &str, requirement: &str) -> BidRecord {
        BidRecord::new(
            Bid::submit(
                BidId(id.to_owned()),
                BidDraft {
                    vendor_id: VendorId("V-1".to_owned()),
                    customer_id: CustomerId("C-1".to_owned()),
                    requirement_id: RequirementId(requirement.to_owned()),
                    original_price: Decimal::new(50_000, 0),
                    original_timeline: "2 weeks".to_owned(),
                    deliverables: vec!["Venue".to_owned()],
                },
                Utc::now(),
            )
            .expect("bid fixture"),
        )
    }

    #[tokio::test]
    async fn insert_then_load_round_trip() {
        let store = InMemoryBidStore::default();
        let record = record("BID-1", "REQ-1");

        store.insert(record.clone()).await.expect("insert");
        let loaded = store.load(&record.bid.id).await.expect("load");

        assert_eq!(loaded, Some(record));
        assert_eq!(store.load(&BidId("BID-404".to_owned())).await.expect("load missing"), None);
    }

    #[tokio::test]
    async fn duplicate_insert_is_refused() {
        let store = InMemoryBidStore::default();
        store.insert(record("BID-1", "REQ-1")).await.expect("first insert");

        let error = store.insert(record("BID-1", "REQ-1")).await.expect_err("duplicate");
        assert_eq!(error, StoreError::AlreadyExists(BidId("BID-1".to_owned())));
    }

    #[tokio::test]
    async fn stale_commit_is_a_conflict() {
        let store = InMemoryBidStore::default();
        let original = record("BID-1", "REQ-1");
        store.insert(original.clone()).await.expect("insert");

        let mut first = original.clone();
        first.version = 2;
        store.commit(first, 1).await.expect("first writer wins");

        let mut second = original;
        second.version = 2;
        let error = store.commit(second, 1).await.expect_err("second writer is stale");
        assert!(matches!(error, StoreError::Conflict { expected: 1, actual: 2, .. }));
    }

    #[tokio::test]
    async fn lists_bids_for_one_requirement() {
        let store = InMemoryBidStore::default();
        store.insert(record("BID-2", "REQ-1")).await.expect("insert");
        store.insert(record("BID-1", "REQ-1")).await.expect("insert");
        store.insert(record("BID-3", "REQ-2")).await.expect("insert");

        let bids = store
            .list_for_requirement(&RequirementId("REQ-1".to_owned()))
            .await
            .expect("list");
        let ids = bids.iter().map(|record| record.bid.id.0.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["BID-1", "BID-2"]);
    }
}
