use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::bid::{Bid, BidId, BidStatus, CustomerId, VendorId};
use crate::domain::finalization::{FinalizationRequest, FinalizationStatus};
use crate::domain::negotiation::{Negotiation, NegotiationStatus};
use crate::schedule::PaymentSchedule;

/// Immutable summary of a finalized booking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingConfirmation {
    pub bid_id: BidId,
    pub confirmation_code: String,
    pub vendor_id: VendorId,
    pub customer_id: CustomerId,
    pub finalized_price: Decimal,
    pub finalized_timeline: String,
    pub deliverables: Vec<String>,
    pub payment_schedule: PaymentSchedule,
    pub confirmed_at: DateTime<Utc>,
}

impl BookingConfirmation {
    /// Returns `None` unless the bid is finalized and its negotiation locked.
    pub fn issue(
        bid: &Bid,
        negotiation: &Negotiation,
        finalization: &FinalizationRequest,
    ) -> Option<Self> {
        if bid.status != BidStatus::Finalized
            || negotiation.status() != NegotiationStatus::Locked
            || finalization.status != FinalizationStatus::Accepted
        {
            return None;
        }

        let finalized_price = negotiation.finalized_price()?;
        let finalized_timeline = negotiation.finalized_timeline()?.to_owned();
        let confirmed_at = finalization.responded_at?;
        let payment_schedule = PaymentSchedule::derive(finalized_price).ok()?;

        Some(Self {
            bid_id: bid.id.clone(),
            confirmation_code: confirmation_code(&bid.id, confirmed_at),
            vendor_id: bid.vendor_id.clone(),
            customer_id: bid.customer_id.clone(),
            finalized_price,
            finalized_timeline,
            deliverables: bid.deliverables.clone(),
            payment_schedule,
            confirmed_at,
        })
    }
}

fn confirmation_code(bid_id: &BidId, confirmed_at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bid_id.0.as_bytes());
    hasher.update(b"|");
    hasher.update(confirmed_at.to_rfc3339().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("BK-{}", digest[..10].to_ascii_uppercase())
}
