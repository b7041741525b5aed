use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    Customer,
    Vendor,
}

impl Party {
    pub fn counterparty(self) -> Self {
        match self {
            Self::Customer => Self::Vendor,
            Self::Vendor => Self::Customer,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Vendor => "vendor",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "customer" => Some(Self::Customer),
            "vendor" => Some(Self::Vendor),
            _ => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Customer => "Customer",
            Self::Vendor => "Vendor",
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The caller of a command as reported by the identity provider. Trusted as-is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub party: Party,
    pub display_name: String,
}

impl Actor {
    pub fn new(party: Party, display_name: impl Into<String>) -> Self {
        let display_name = display_name.into();
        let display_name = match display_name.trim() {
            "" => party.label().to_owned(),
            trimmed => trimmed.to_owned(),
        };
        Self { party, display_name }
    }

    pub fn customer(display_name: impl Into<String>) -> Self {
        Self::new(Party::Customer, display_name)
    }

    pub fn vendor(display_name: impl Into<String>) -> Self {
        Self::new(Party::Vendor, display_name)
    }
}
