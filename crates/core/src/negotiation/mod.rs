pub mod engine;
pub mod states;

pub use engine::{accept_offer, reject_offer, submit_offer, SubmittedOffer};
pub use states::{OfferProposal, TransitionEvent, TransitionOutcome};
