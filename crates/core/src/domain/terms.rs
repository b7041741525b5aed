use rust_decimal::Decimal;

use crate::errors::NegotiationError;

pub const MAX_PRICE_SCALE: u32 = 2;
pub const MAX_TIMELINE_CHARS: usize = 120;
pub const MAX_NOTES_CHARS: usize = 2_000;

pub fn validate_price(price: Decimal) -> Result<(), NegotiationError> {
    if price <= Decimal::ZERO {
        return Err(NegotiationError::InvalidTerms(format!("price must be positive (got {price})")));
    }
    if price.normalize().scale() > MAX_PRICE_SCALE {
        return Err(NegotiationError::InvalidTerms(format!(
            "price {price} has more than {MAX_PRICE_SCALE} decimal places"
        )));
    }
    Ok(())
}

pub fn validate_timeline(timeline: &str) -> Result<(), NegotiationError> {
    let trimmed = timeline.trim();
    if trimmed.is_empty() {
        return Err(NegotiationError::InvalidTerms("timeline is required".to_owned()));
    }
    if trimmed.chars().count() > MAX_TIMELINE_CHARS {
        return Err(NegotiationError::InvalidTerms(format!(
            "timeline exceeds {MAX_TIMELINE_CHARS} characters"
        )));
    }
    Ok(())
}

pub fn validate_notes(notes: Option<&str>) -> Result<(), NegotiationError> {
    match notes {
        Some(notes) if notes.chars().count() > MAX_NOTES_CHARS => Err(
            NegotiationError::InvalidTerms(format!("notes exceed {MAX_NOTES_CHARS} characters")),
        ),
        _ => Ok(()),
    }
}

/// Blank notes are stored as absent.
pub(crate) fn normalize_notes(notes: Option<String>) -> Option<String> {
    notes.map(|notes| notes.trim().to_owned()).filter(|notes| !notes.is_empty())
}
