//! Decides what each extraction result writes to the row store.

use crate::models::{CellSnapshot, ExtractionResult, ObservedValue, Previous, Transition};
use crate::watch_state::classify;

/// Writes and state changes for one URL, decided before anything is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan {
    /// Value to remember once writes succeed; `None` for failed extractions.
    pub current: Option<ObservedValue>,
    pub transition: Transition,
    pub changed: bool,
    /// New price-cell text, if the cell must be written.
    pub write_value: Option<String>,
    pub write_timestamp: bool,
    /// Unchanged price copied into a blank or stale cell.
    pub backfill: bool,
}

impl SyncPlan {
    fn skip() -> Self {
        Self {
            current: None,
            transition: Transition::Unchanged,
            changed: false,
            write_value: None,
            write_timestamp: false,
            backfill: false,
        }
    }

    pub fn needs_write(&self) -> bool {
        self.write_value.is_some() || self.write_timestamp
    }
}

#[derive(Debug, Clone)]
pub struct SyncPolicy {
    sold_out_label: String,
}

impl SyncPolicy {
    pub fn new(sold_out_label: impl Into<String>) -> Self {
        Self {
            sold_out_label: sold_out_label.into(),
        }
    }

    pub fn sold_out_label(&self) -> &str {
        &self.sold_out_label
    }

    pub fn plan(&self, result: &ExtractionResult, previous: Previous, cell: &CellSnapshot) -> SyncPlan {
        let Some(current) = result.observed() else {
            return SyncPlan::skip();
        };

        let changed = previous.differs_from(current);
        let transition = classify(previous, current);

        let (write_value, write_timestamp, backfill) = match current {
            ObservedValue::SoldOut => {
                // Self-heals cells that lost the label even when nothing changed.
                let needs_label = changed || cell.is_blank() || !cell.is_sold_out_label();
                let value = needs_label.then(|| self.sold_out_label.clone());
                (value, changed, false)
            }
            ObservedValue::Price(price) if changed => (Some(price.to_string()), true, false),
            ObservedValue::Price(price) if cell.is_blank() || cell.is_sold_out_label() => {
                (Some(price.to_string()), false, true)
            }
            ObservedValue::Price(_) => (None, false, false),
        };

        SyncPlan {
            current: Some(current),
            transition,
            changed,
            write_value,
            write_timestamp,
            backfill,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::ExtractionError;

    fn policy() -> SyncPolicy {
        SyncPolicy::new("품절")
    }

    #[test]
    fn test_error_never_writes() {
        let plan = policy().plan(
            &ExtractionResult::Error(ExtractionError::NavigationTimeout),
            Previous::Known(ObservedValue::Price(10000)),
            &CellSnapshot::new(""),
        );
        assert_eq!(plan.current, None);
        assert!(!plan.needs_write());
        assert!(!plan.changed);
    }

    #[test]
    fn test_price_change_writes_value_and_timestamp() {
        let plan = policy().plan(
            &ExtractionResult::Price(9000),
            Previous::Known(ObservedValue::Price(10000)),
            &CellSnapshot::new("10000"),
        );
        assert_eq!(plan.write_value.as_deref(), Some("9000"));
        assert!(plan.write_timestamp);
        assert!(!plan.backfill);
        assert_eq!(
            plan.transition,
            Transition::PriceChange {
                previous: Some(10000),
                current: 9000
            }
        );
    }

    #[test]
    fn test_unchanged_price_backfills_blank_cell_without_timestamp() {
        let plan = policy().plan(
            &ExtractionResult::Price(10000),
            Previous::Known(ObservedValue::Price(10000)),
            &CellSnapshot::new("   "),
        );
        assert_eq!(plan.write_value.as_deref(), Some("10000"));
        assert!(!plan.write_timestamp);
        assert!(plan.backfill);
        assert_eq!(plan.transition, Transition::Unchanged);
    }

    #[test]
    fn test_unchanged_price_replaces_stale_sold_out_label() {
        let plan = policy().plan(
            &ExtractionResult::Price(10000),
            Previous::Known(ObservedValue::Price(10000)),
            &CellSnapshot::new("품절"),
        );
        assert!(plan.backfill);
        assert!(!plan.write_timestamp);
    }

    #[test]
    fn test_unchanged_price_with_filled_cell_is_noop() {
        let plan = policy().plan(
            &ExtractionResult::Price(10000),
            Previous::Known(ObservedValue::Price(10000)),
            &CellSnapshot::new("10000"),
        );
        assert!(!plan.needs_write());
        assert_eq!(plan.current, Some(ObservedValue::Price(10000)));
    }

    #[test]
    fn test_restock_is_tagged() {
        let plan = policy().plan(
            &ExtractionResult::Price(15000),
            Previous::Known(ObservedValue::SoldOut),
            &CellSnapshot::new("품절"),
        );
        assert_eq!(plan.transition, Transition::Restock { price: 15000 });
        assert!(plan.write_timestamp);
    }

    #[test]
    fn test_new_sold_out_writes_label_and_timestamp() {
        let plan = policy().plan(
            &ExtractionResult::SoldOut,
            Previous::Known(ObservedValue::Price(15000)),
            &CellSnapshot::new("15000"),
        );
        assert_eq!(plan.write_value.as_deref(), Some("품절"));
        assert!(plan.write_timestamp);
        assert_eq!(plan.transition, Transition::NewSoldOut { previous: Some(15000) });
    }

    #[test]
    fn test_sold_out_label_self_heals_without_change() {
        let plan = policy().plan(
            &ExtractionResult::SoldOut,
            Previous::Known(ObservedValue::SoldOut),
            &CellSnapshot::new("15000"),
        );
        assert_eq!(plan.write_value.as_deref(), Some("품절"));
        assert!(!plan.write_timestamp);
        assert!(!plan.changed);
    }

    #[test]
    fn test_unknown_url_sold_out_is_not_a_change() {
        let plan = policy().plan(&ExtractionResult::SoldOut, Previous::Unknown, &CellSnapshot::new(""));
        assert_eq!(plan.transition, Transition::Unchanged);
        assert_eq!(plan.write_value.as_deref(), Some("품절"));
        assert!(!plan.write_timestamp);
    }

    #[test]
    fn test_sold_out_with_label_present_is_noop() {
        let plan = policy().plan(
            &ExtractionResult::SoldOut,
            Previous::Known(ObservedValue::SoldOut),
            &CellSnapshot::new("품절"),
        );
        assert!(!plan.needs_write());
    }
}
