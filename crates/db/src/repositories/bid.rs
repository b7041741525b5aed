use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, Transaction};

use dealroom_core::domain::bid::{Bid, BidId, BidStatus, CustomerId, RequirementId, VendorId};
use dealroom_core::domain::finalization::{FinalizationRequest, FinalizationStatus};
use dealroom_core::domain::negotiation::{
    Negotiation, NegotiationParts, NegotiationStatus, Offer, OfferId, OfferStatus,
};
use dealroom_core::domain::party::Party;
use dealroom_core::domain::record::BidRecord;
use dealroom_core::store::{BidStore, StoreError};

use super::RepositoryError;
use crate::DbPool;

/// SQLite-backed bid store. A commit rewrites the bid, negotiation, offers and
/// finalization rows in one transaction guarded by the bid's version column.
#[derive(Clone)]
pub struct SqlBidStore {
    pool: DbPool,
}

impl SqlBidStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Reads every part of the record inside one transaction so the bid,
    /// negotiation, offers and finalization come from the same snapshot.
    async fn load_record(&self, bid_id: &BidId) -> Result<Option<BidRecord>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let record = read_record(&mut tx, bid_id).await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn insert_record(&self, record: &BidRecord) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO bid (id, vendor_id, customer_id, requirement_id, original_price,
                              original_timeline, deliverables_json, status, version,
                              created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(&record.bid.id.0)
        .bind(&record.bid.vendor_id.0)
        .bind(&record.bid.customer_id.0)
        .bind(&record.bid.requirement_id.0)
        .bind(record.bid.original_price.to_string())
        .bind(&record.bid.original_timeline)
        .bind(deliverables_json(&record.bid.deliverables)?)
        .bind(record.bid.status.as_str())
        .bind(version_to_i64(record.version)?)
        .bind(record.bid.created_at.to_rfc3339())
        .bind(record.bid.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if inserted == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO negotiation (bid_id, status, original_price, original_timeline,
                                      finalized_price, finalized_timeline)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.bid.id.0)
        .bind(record.negotiation.status().as_str())
        .bind(record.negotiation.original_price().to_string())
        .bind(record.negotiation.original_timeline())
        .bind(record.negotiation.finalized_price().map(|price| price.to_string()))
        .bind(record.negotiation.finalized_timeline())
        .execute(&mut *tx)
        .await?;

        write_offers(&mut tx, record).await?;
        write_finalization(&mut tx, record).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn commit_record(
        &self,
        record: &BidRecord,
        expected_version: u64,
    ) -> Result<Result<(), StoreError>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE bid
             SET status = ?, version = ?, updated_at = ?
             WHERE id = ? AND version = ?",
        )
        .bind(record.bid.status.as_str())
        .bind(version_to_i64(record.version)?)
        .bind(record.bid.updated_at.to_rfc3339())
        .bind(&record.bid.id.0)
        .bind(version_to_i64(expected_version)?)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            let actual = sqlx::query("SELECT version FROM bid WHERE id = ?")
                .bind(&record.bid.id.0)
                .fetch_optional(&mut *tx)
                .await?;
            tx.rollback().await?;

            return Ok(Err(match actual {
                Some(row) => {
                    let actual: i64 = row.try_get("version").map_err(decode)?;
                    StoreError::Conflict {
                        bid_id: record.bid.id.clone(),
                        expected: expected_version,
                        actual: version_from_i64(actual)?,
                    }
                }
                None => StoreError::Backend(format!("bid {} is not stored", record.bid.id)),
            }));
        }

        sqlx::query(
            "UPDATE negotiation
             SET status = ?, finalized_price = ?, finalized_timeline = ?
             WHERE bid_id = ?",
        )
        .bind(record.negotiation.status().as_str())
        .bind(record.negotiation.finalized_price().map(|price| price.to_string()))
        .bind(record.negotiation.finalized_timeline())
        .bind(&record.bid.id.0)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM negotiation_offer WHERE bid_id = ?")
            .bind(&record.bid.id.0)
            .execute(&mut *tx)
            .await?;
        write_offers(&mut tx, record).await?;
        write_finalization(&mut tx, record).await?;

        tx.commit().await?;
        Ok(Ok(()))
    }

    async fn records_for_requirement(
        &self,
        requirement_id: &RequirementId,
    ) -> Result<Vec<BidRecord>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query("SELECT id FROM bid WHERE requirement_id = ? ORDER BY id ASC")
            .bind(&requirement_id.0)
            .fetch_all(&mut *tx)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let bid_id = BidId(row.try_get::<String, _>("id").map_err(decode)?);
            if let Some(record) = read_record(&mut tx, &bid_id).await? {
                records.push(record);
            }
        }
        tx.commit().await?;
        Ok(records)
    }
}

#[async_trait::async_trait]
impl BidStore for SqlBidStore {
    async fn load(&self, bid_id: &BidId) -> Result<Option<BidRecord>, StoreError> {
        Ok(self.load_record(bid_id).await?)
    }

    async fn insert(&self, record: BidRecord) -> Result<(), StoreError> {
        if self.insert_record(&record).await? {
            Ok(())
        } else {
            Err(StoreError::AlreadyExists(record.bid.id))
        }
    }

    async fn commit(&self, record: BidRecord, expected_version: u64) -> Result<(), StoreError> {
        self.commit_record(&record, expected_version).await?
    }

    async fn list_for_requirement(
        &self,
        requirement_id: &RequirementId,
    ) -> Result<Vec<BidRecord>, StoreError> {
        Ok(self.records_for_requirement(requirement_id).await?)
    }
}

async fn read_record(
    tx: &mut Transaction<'_, Sqlite>,
    bid_id: &BidId,
) -> Result<Option<BidRecord>, RepositoryError> {
    let row = sqlx::query(
        "SELECT id, vendor_id, customer_id, requirement_id, original_price, original_timeline,
                deliverables_json, status, version, created_at, updated_at
         FROM bid WHERE id = ?",
    )
    .bind(&bid_id.0)
    .fetch_optional(&mut **tx)
    .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let (bid, version) = row_to_bid(&row)?;

    let negotiation_row = sqlx::query(
        "SELECT status, original_price, original_timeline, finalized_price, finalized_timeline
         FROM negotiation WHERE bid_id = ?",
    )
    .bind(&bid_id.0)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| RepositoryError::Decode(format!("bid {bid_id} has no negotiation row")))?;

    let offer_rows = sqlx::query(
        "SELECT id, proposed_by, proposer_name, price, timeline, notes, status, created_at
         FROM negotiation_offer WHERE bid_id = ? ORDER BY sequence ASC",
    )
    .bind(&bid_id.0)
    .fetch_all(&mut **tx)
    .await?;
    let offers = offer_rows.iter().map(row_to_offer).collect::<Result<Vec<_>, _>>()?;
    let negotiation = row_to_negotiation(bid_id, &negotiation_row, offers)?;

    let finalization_row = sqlx::query(
        "SELECT status, decline_reason, requested_at, responded_at
         FROM finalization_request WHERE bid_id = ?",
    )
    .bind(&bid_id.0)
    .fetch_optional(&mut **tx)
    .await?;
    let finalization = match finalization_row {
        Some(ref row) => row_to_finalization(bid_id, row)?,
        None => FinalizationRequest::none(bid_id.clone()),
    };

    Ok(Some(BidRecord { bid, negotiation, finalization, version }))
}

async fn write_offers(
    tx: &mut Transaction<'_, Sqlite>,
    record: &BidRecord,
) -> Result<(), RepositoryError> {
    for (sequence, offer) in record.negotiation.offers().iter().enumerate() {
        sqlx::query(
            "INSERT INTO negotiation_offer (id, bid_id, sequence, proposed_by, proposer_name,
                                            price, timeline, notes, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&offer.id.0)
        .bind(&record.bid.id.0)
        .bind(sequence as i64)
        .bind(offer.proposed_by.as_str())
        .bind(&offer.proposer_name)
        .bind(offer.price.to_string())
        .bind(&offer.timeline)
        .bind(&offer.notes)
        .bind(offer.status.as_str())
        .bind(offer.created_at.to_rfc3339())
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn write_finalization(
    tx: &mut Transaction<'_, Sqlite>,
    record: &BidRecord,
) -> Result<(), RepositoryError> {
    let finalization = &record.finalization;
    sqlx::query(
        "INSERT INTO finalization_request (bid_id, status, decline_reason, requested_at, responded_at)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT(bid_id) DO UPDATE SET
             status = excluded.status,
             decline_reason = excluded.decline_reason,
             requested_at = excluded.requested_at,
             responded_at = excluded.responded_at",
    )
    .bind(&record.bid.id.0)
    .bind(finalization.status.as_str())
    .bind(&finalization.decline_reason)
    .bind(finalization.requested_at.map(|at| at.to_rfc3339()))
    .bind(finalization.responded_at.map(|at| at.to_rfc3339()))
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn row_to_bid(row: &SqliteRow) -> Result<(Bid, u64), RepositoryError> {
    let id: String = row.try_get("id").map_err(decode)?;
    let vendor_id: String = row.try_get("vendor_id").map_err(decode)?;
    let customer_id: String = row.try_get("customer_id").map_err(decode)?;
    let requirement_id: String = row.try_get("requirement_id").map_err(decode)?;
    let original_price: String = row.try_get("original_price").map_err(decode)?;
    let original_timeline: String = row.try_get("original_timeline").map_err(decode)?;
    let deliverables_json: String = row.try_get("deliverables_json").map_err(decode)?;
    let status: String = row.try_get("status").map_err(decode)?;
    let version: i64 = row.try_get("version").map_err(decode)?;
    let created_at: String = row.try_get("created_at").map_err(decode)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode)?;

    let deliverables = serde_json::from_str::<Vec<String>>(&deliverables_json)
        .map_err(|error| RepositoryError::Decode(format!("deliverables: {error}")))?;
    let status = BidStatus::parse(&status)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown bid status `{status}`")))?;

    let bid = Bid {
        id: BidId(id),
        vendor_id: VendorId(vendor_id),
        customer_id: CustomerId(customer_id),
        requirement_id: RequirementId(requirement_id),
        original_price: parse_decimal("original_price", &original_price)?,
        original_timeline,
        deliverables,
        status,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    };
    Ok((bid, version_from_i64(version)?))
}

fn row_to_offer(row: &SqliteRow) -> Result<Offer, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode)?;
    let proposed_by: String = row.try_get("proposed_by").map_err(decode)?;
    let proposer_name: String = row.try_get("proposer_name").map_err(decode)?;
    let price: String = row.try_get("price").map_err(decode)?;
    let timeline: String = row.try_get("timeline").map_err(decode)?;
    let notes: Option<String> = row.try_get("notes").map_err(decode)?;
    let status: String = row.try_get("status").map_err(decode)?;
    let created_at: String = row.try_get("created_at").map_err(decode)?;

    Ok(Offer {
        id: OfferId(id),
        proposed_by: Party::parse(&proposed_by)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown party `{proposed_by}`")))?,
        proposer_name,
        price: parse_decimal("price", &price)?,
        timeline,
        notes,
        status: OfferStatus::parse(&status)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown offer status `{status}`")))?,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

fn row_to_negotiation(
    bid_id: &BidId,
    row: &SqliteRow,
    offers: Vec<Offer>,
) -> Result<Negotiation, RepositoryError> {
    let status: String = row.try_get("status").map_err(decode)?;
    let original_price: String = row.try_get("original_price").map_err(decode)?;
    let original_timeline: String = row.try_get("original_timeline").map_err(decode)?;
    let finalized_price: Option<String> = row.try_get("finalized_price").map_err(decode)?;
    let finalized_timeline: Option<String> = row.try_get("finalized_timeline").map_err(decode)?;

    let parts = NegotiationParts {
        bid_id: bid_id.clone(),
        original_price: parse_decimal("original_price", &original_price)?,
        original_timeline,
        status: NegotiationStatus::parse(&status).ok_or_else(|| {
            RepositoryError::Decode(format!("unknown negotiation status `{status}`"))
        })?,
        offers,
        finalized_price: finalized_price
            .as_deref()
            .map(|value| parse_decimal("finalized_price", value))
            .transpose()?,
        finalized_timeline,
    };
    Negotiation::restore(parts).map_err(|error| RepositoryError::Decode(error.to_string()))
}

fn row_to_finalization(
    bid_id: &BidId,
    row: &SqliteRow,
) -> Result<FinalizationRequest, RepositoryError> {
    let status: String = row.try_get("status").map_err(decode)?;
    let decline_reason: Option<String> = row.try_get("decline_reason").map_err(decode)?;
    let requested_at: Option<String> = row.try_get("requested_at").map_err(decode)?;
    let responded_at: Option<String> = row.try_get("responded_at").map_err(decode)?;

    Ok(FinalizationRequest {
        bid_id: bid_id.clone(),
        status: FinalizationStatus::parse(&status).ok_or_else(|| {
            RepositoryError::Decode(format!("unknown finalization status `{status}`"))
        })?,
        decline_reason,
        requested_at: requested_at
            .as_deref()
            .map(|value| parse_timestamp("requested_at", value))
            .transpose()?,
        responded_at: responded_at
            .as_deref()
            .map(|value| parse_timestamp("responded_at", value))
            .transpose()?,
    })
}

fn deliverables_json(deliverables: &[String]) -> Result<String, RepositoryError> {
    serde_json::to_string(deliverables)
        .map_err(|error| RepositoryError::Decode(format!("deliverables: {error}")))
}

fn parse_decimal(column: &str, value: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value)
        .map_err(|error| RepositoryError::Decode(format!("{column} `{value}`: {error}")))
}

fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("{column} `{value}`: {error}")))
}

fn version_to_i64(version: u64) -> Result<i64, RepositoryError> {
    i64::try_from(version)
        .map_err(|_| RepositoryError::Decode(format!("version {version} exceeds storage range")))
}

fn version_from_i64(version: i64) -> Result<u64, RepositoryError> {
    u64::try_from(version)
        .map_err(|_| RepositoryError::Decode(format!("negative stored version {version}")))
}

fn decode(error: sqlx::Error) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use dealroom_core::domain::bid::{
        Bid, BidDraft, BidId, BidStatus, CustomerId, RequirementId, VendorId,
    };
    use dealroom_core::domain::finalization::{FinalizationResponse, FinalizationStatus};
    use dealroom_core::domain::negotiation::{NegotiationStatus, OfferStatus};
    use dealroom_core::domain::party::Actor;
    use dealroom_core::domain::record::BidRecord;
    use dealroom_core::finalization::FinalizationPolicy;
    use dealroom_core::negotiation::states::{OfferProposal, TransitionEvent};
    use dealroom_core::store::{BidStore, StoreError};

    use super::SqlBidStore;
    use crate::{connect_with_settings, migrations};

    async fn store() -> SqlBidStore {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlBidStore::new(pool)
    }

    fn record(id: &str, requirement: &str) -> BidRecord {
        BidRecord::new(
            Bid::submit(
                BidId(id.to_owned()),
                BidDraft {
                    vendor_id: VendorId("V-1".to_owned()),
                    customer_id: CustomerId("C-1".to_owned()),
                    requirement_id: RequirementId(requirement.to_owned()),
                    original_price: Decimal::new(9_500_050, 2),
                    original_timeline: "10 days".to_owned(),
                    deliverables: vec!["Catering".to_owned(), "Decor".to_owned()],
                },
                Utc::now(),
            )
            .expect("bid fixture"),
        )
    }

    fn advance(record: &BidRecord, apply: impl FnOnce(&mut BidRecord)) -> BidRecord {
        let mut next = record.clone();
        apply(&mut next);
        next.version = record.version + 1;
        next
    }

    #[tokio::test]
    async fn fresh_record_round_trips() {
        let store = store().await;
        let record = record("BID-1", "REQ-1");

        store.insert(record.clone()).await.expect("insert");
        let loaded = store.load(&record.bid.id).await.expect("load").expect("stored");

        assert_eq!(loaded, record);
        assert_eq!(loaded.bid.original_price, Decimal::new(9_500_050, 2));
        assert_eq!(loaded.finalization.status, FinalizationStatus::NotRequested);
    }

    #[tokio::test]
    async fn duplicate_insert_reports_already_exists() {
        let store = store().await;
        store.insert(record("BID-1", "REQ-1")).await.expect("insert");

        let error = store.insert(record("BID-1", "REQ-1")).await.expect_err("duplicate");
        assert_eq!(error, StoreError::AlreadyExists(BidId("BID-1".to_owned())));
    }

    #[tokio::test]
    async fn finalized_record_persists_every_part() {
        let store = store().await;
        let customer = Actor::customer("Priya");
        let vendor = Actor::vendor("Lotus Events");
        let mut current = record("BID-1", "REQ-1");
        store.insert(current.clone()).await.expect("insert");

        let opened = advance(&current, |record| {
            record
                .submit_offer(
                    OfferProposal::new(customer.clone(), Decimal::new(85_000, 0), "7 days")
                        .with_notes("Can we trim the decor?"),
                    Utc::now(),
                )
                .expect("customer opens");
        });
        store.commit(opened.clone(), current.version).await.expect("commit opening");
        current = opened;

        let mut counter_id = None;
        let countered = advance(&current, |record| {
            let outcome = record
                .submit_offer(
                    OfferProposal::new(vendor.clone(), Decimal::new(90_000, 0), "7 days"),
                    Utc::now(),
                )
                .expect("vendor counters");
            if let TransitionEvent::OfferSubmitted { offer_id, .. } = outcome.event {
                counter_id = Some(offer_id);
            }
        });
        store.commit(countered.clone(), current.version).await.expect("commit counter");
        current = countered;

        let offer_id = counter_id.expect("counter offer id");
        let next = advance(&current, |record| {
            record.accept_offer(&offer_id, &customer, Utc::now()).expect("accept");
            record.request_finalization(&customer, Utc::now()).expect("request");
            record
                .respond_to_finalization(
                    &vendor,
                    FinalizationResponse::Accept,
                    &FinalizationPolicy::default(),
                    Utc::now(),
                )
                .expect("finalize");
        });
        store.commit(next.clone(), current.version).await.expect("commit finalization");

        let loaded = store.load(&next.bid.id).await.expect("load").expect("stored");
        assert_eq!(loaded, next);
        assert_eq!(loaded.version, 4);
        assert_eq!(loaded.bid.status, BidStatus::Finalized);
        assert_eq!(loaded.negotiation.status(), NegotiationStatus::Locked);
        assert_eq!(loaded.negotiation.finalized_price(), Some(Decimal::new(90_000, 0)));
        assert_eq!(
            loaded.negotiation.offers().iter().map(|offer| offer.status).collect::<Vec<_>>(),
            vec![OfferStatus::Countered, OfferStatus::Accepted]
        );
        assert_eq!(
            loaded.negotiation.offers()[0].notes.as_deref(),
            Some("Can we trim the decor?")
        );
        assert!(loaded.confirmation().is_some());
    }

    #[tokio::test]
    async fn stale_commit_is_refused_and_leaves_rows_untouched() {
        let store = store().await;
        let original = record("BID-1", "REQ-1");
        store.insert(original.clone()).await.expect("insert");

        let winner = advance(&original, |record| {
            record
                .submit_offer(
                    OfferProposal::new(Actor::vendor("Lotus"), Decimal::new(92_000, 0), "9 days"),
                    Utc::now(),
                )
                .expect("vendor opens");
        });
        store.commit(winner.clone(), 1).await.expect("first writer");

        let loser = advance(&original, |record| {
            record
                .submit_offer(
                    OfferProposal::new(Actor::customer("Priya"), Decimal::new(80_000, 0), "9 days"),
                    Utc::now(),
                )
                .expect("customer opens");
        });
        let error = store.commit(loser, 1).await.expect_err("stale writer");
        assert!(matches!(error, StoreError::Conflict { expected: 1, actual: 2, .. }));

        let loaded = store.load(&original.bid.id).await.expect("load").expect("stored");
        assert_eq!(loaded, winner);
    }

    #[tokio::test]
    async fn lists_by_requirement_in_id_order() {
        let store = store().await;
        store.insert(record("BID-2", "REQ-1")).await.expect("insert");
        store.insert(record("BID-1", "REQ-1")).await.expect("insert");
        store.insert(record("BID-9", "REQ-2")).await.expect("insert");

        let listed = store
            .list_for_requirement(&RequirementId("REQ-1".to_owned()))
            .await
            .expect("list");
        let ids = listed.iter().map(|record| record.bid.id.0.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["BID-1", "BID-2"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn loads_never_mix_rows_from_different_commits() {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = format!("sqlite://{}", dir.path().join("dealroom.db").display());
        let pool = connect_with_settings(&url, 4, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let store = SqlBidStore::new(pool);

        let initial = record("BID-1", "REQ-1");
        let bid_id = initial.bid.id.clone();
        store.insert(initial.clone()).await.expect("insert");

        let done = Arc::new(AtomicBool::new(false));
        let writer = {
            let store = store.clone();
            let done = Arc::clone(&done);
            tokio::spawn(async move {
                let mut current = initial;
                for round in 0..200_i64 {
                    let actor = if round % 2 == 0 {
                        Actor::customer("Priya")
                    } else {
                        Actor::vendor("Lotus")
                    };
                    let next = advance(&current, |record| {
                        record
                            .submit_offer(
                                OfferProposal::new(actor, Decimal::new(80_000 + round, 0), "7 days"),
                                Utc::now(),
                            )
                            .expect("alternating offer");
                    });
                    store.commit(next.clone(), current.version).await.expect("commit");
                    current = next;
                }
                done.store(true, Ordering::SeqCst);
                current.version
            })
        };

        while !done.load(Ordering::SeqCst) {
            let loaded = store.load(&bid_id).await.expect("load").expect("stored");
            assert_eq!(
                loaded.negotiation.round_count() as u64,
                loaded.version - 1,
                "offers and version must come from the same commit"
            );
            tokio::task::yield_now().await;
        }

        let final_version = writer.await.expect("writer joins");
        assert_eq!(final_version, 201);
        let loaded = store.load(&bid_id).await.expect("load").expect("stored");
        assert_eq!(loaded.negotiation.round_count(), 200);
    }
}
