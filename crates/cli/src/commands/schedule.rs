use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::commands::CommandResult;
use dealroom_core::config::{AppConfig, LoadOptions};
use dealroom_core::PaymentSchedule;

#[derive(Debug, Serialize)]
struct ScheduleReport {
    currency: String,
    schedule: PaymentSchedule,
}

pub fn run(price: &str) -> CommandResult {
    let currency = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config.negotiation.currency,
        Err(error) => {
            return CommandResult::failure(
                "schedule",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let total = match Decimal::from_str(price.trim()) {
        Ok(total) => total,
        Err(error) => {
            return CommandResult::failure(
                "schedule",
                "invalid_terms",
                format!("price `{price}` is not a decimal amount: {error}"),
                2,
            );
        }
    };

    match PaymentSchedule::derive(total) {
        Ok(schedule) => CommandResult::success_with(
            "schedule",
            format!("payment schedule for {total} {currency}"),
            ScheduleReport { currency, schedule },
        ),
        Err(error) => CommandResult::failure("schedule", error.kind(), error.to_string(), 2),
    }
}
