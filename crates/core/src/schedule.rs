//! Payment schedule derived from a finalized price.
//!
//! The split is fixed at 30/40/30. The first two slabs are rounded to the
//! nearest whole currency unit and the final slab absorbs the remainder, so
//! the slabs always sum to the total exactly.

use std::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::terms::validate_price;
use crate::errors::NegotiationError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStage {
    BookingAdvance,
    PreEvent,
    Final,
}

impl PaymentStage {
    pub const ALL: [PaymentStage; 3] = [Self::BookingAdvance, Self::PreEvent, Self::Final];

    pub fn label(&self) -> &'static str {
        match self {
            Self::BookingAdvance => "Booking Advance",
            Self::PreEvent => "Pre-Event",
            Self::Final => "Final",
        }
    }

    pub fn percentage(&self) -> Decimal {
        match self {
            Self::BookingAdvance => Decimal::from(30),
            Self::PreEvent => Decimal::from(40),
            Self::Final => Decimal::from(30),
        }
    }

    pub fn due(&self) -> &'static str {
        match self {
            Self::BookingAdvance => "on booking confirmation",
            Self::PreEvent => "before the event",
            Self::Final => "after delivery",
        }
    }
}

impl fmt::Display for PaymentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSlab {
    pub stage: PaymentStage,
    pub label: String,
    pub percentage: Decimal,
    pub amount: Decimal,
    pub due: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSchedule {
    pub total: Decimal,
    pub slabs: Vec<PaymentSlab>,
}

impl PaymentSchedule {
    pub fn derive(total: Decimal) -> Result<Self, NegotiationError> {
        validate_price(total)?;

        let advance = rounded_share(total, PaymentStage::BookingAdvance)?.min(total);
        let pre_event = rounded_share(total, PaymentStage::PreEvent)?.min(total - advance);
        let last = total - advance - pre_event;

        let slabs = PaymentStage::ALL
            .into_iter()
            .zip([advance, pre_event, last])
            .map(|(stage, amount)| PaymentSlab {
                stage,
                label: stage.label().to_owned(),
                percentage: stage.percentage(),
                amount,
                due: stage.due().to_owned(),
            })
            .collect();

        Ok(Self { total, slabs })
    }

    pub fn sum(&self) -> Decimal {
        self.slabs.iter().map(|slab| slab.amount).sum()
    }

    pub fn slab(&self, stage: PaymentStage) -> Option<&PaymentSlab> {
        self.slabs.iter().find(|slab| slab.stage == stage)
    }
}

fn rounded_share(total: Decimal, stage: PaymentStage) -> Result<Decimal, NegotiationError> {
    total
        .checked_mul(stage.percentage())
        .map(|scaled| scaled / Decimal::ONE_HUNDRED)
        .map(|share| share.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .ok_or_else(|| {
            NegotiationError::InvalidTerms(format!("price {total} is too large to schedule"))
        })
}
