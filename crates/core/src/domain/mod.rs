use std::fmt;

use serde::{Deserialize, Serialize};

pub mod bid;
pub mod finalization;
pub mod negotiation;
pub mod party;
pub mod record;
pub mod terms;

/// Commands accepted against a bid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    SubmitOffer,
    AcceptOffer,
    RejectOffer,
    RequestFinalization,
    RespondToFinalization,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubmitOffer => "submit_offer",
            Self::AcceptOffer => "accept_offer",
            Self::RejectOffer => "reject_offer",
            Self::RequestFinalization => "request_finalization",
            Self::RespondToFinalization => "respond_to_finalization",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
