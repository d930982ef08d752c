use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::error::ExtractionError;

/// Outcome of one URL's extraction after retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionResult {
    Price(u64),
    SoldOut,
    Error(ExtractionError),
}

impl ExtractionResult {
    /// The comparable projection; errors never produce one.
    pub fn observed(&self) -> Option<ObservedValue> {
        match self {
            ExtractionResult::Price(amount) => Some(ObservedValue::Price(*amount)),
            ExtractionResult::SoldOut => Some(ObservedValue::SoldOut),
            ExtractionResult::Error(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ExtractionResult::Error(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExtractionResult::Price(_) => "price",
            ExtractionResult::SoldOut => "soldout",
            ExtractionResult::Error(_) => "error",
        }
    }
}

impl fmt::Display for ExtractionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionResult::Price(amount) => write!(f, "price {}", amount),
            ExtractionResult::SoldOut => write!(f, "sold out"),
            ExtractionResult::Error(err) => write!(f, "error ({})", err),
        }
    }
}

/// Normalized value compared between runs.
///
/// Persists as `u64` for a price and `null` for sold out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<u64>", into = "Option<u64>")]
pub enum ObservedValue {
    Price(u64),
    SoldOut,
}

impl ObservedValue {
    pub fn price(&self) -> Option<u64> {
        match self {
            ObservedValue::Price(amount) => Some(*amount),
            ObservedValue::SoldOut => None,
        }
    }
}

impl From<Option<u64>> for ObservedValue {
    fn from(value: Option<u64>) -> Self {
        match value {
            Some(amount) => ObservedValue::Price(amount),
            None => ObservedValue::SoldOut,
        }
    }
}

impl From<ObservedValue> for Option<u64> {
    fn from(value: ObservedValue) -> Self {
        value.price()
    }
}

/// What the watch state knew about a URL before this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Previous {
    Unknown,
    Known(ObservedValue),
}

impl Previous {
    /// Absent and sold out share the persisted `null`, so they compare equal.
    pub fn as_price(&self) -> Option<u64> {
        match self {
            Previous::Unknown => None,
            Previous::Known(value) => value.price(),
        }
    }

    pub fn differs_from(&self, current: ObservedValue) -> bool {
        self.as_price() != current.price()
    }
}

/// Notification-relevant classification of an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Unchanged,
    /// Known URL went from sold out to a price.
    Restock { price: u64 },
    PriceChange { previous: Option<u64>, current: u64 },
    NewSoldOut { previous: Option<u64> },
}

impl Transition {
    pub fn is_change(&self) -> bool {
        !matches!(self, Transition::Unchanged)
    }
}
