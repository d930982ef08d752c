use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

use crate::utils::price::contains_keyword;

/// Labels a row store cell may carry for an unavailable product.
const SOLD_OUT_LABELS: &[&str] = &["품절", "일시품절", "매진", "판매종료", "sold out", "out of stock"];

/// Writable columns of a watch row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Price,
    UpdatedAt,
}

impl Column {
    pub fn as_str(&self) -> &'static str {
        match self {
            Column::Price => "price",
            Column::UpdatedAt => "updated_at",
        }
    }
}

/// One row as read from the row store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRow {
    pub row: i64,
    pub url: String,
    pub price_cell: String,
}

impl StoreRow {
    pub fn snapshot(&self) -> CellSnapshot {
        CellSnapshot::new(self.price_cell.clone())
    }
}

/// Read-only view of a row's current price cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellSnapshot {
    pub text: String,
}

impl CellSnapshot {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn is_sold_out_label(&self) -> bool {
        !self.is_blank() && contains_keyword(self.text.trim(), SOLD_OUT_LABELS)
    }
}

/// Trims a raw URL cell, returning `None` for blanks and unparsable values.
pub fn normalize_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Some(trimmed.to_string()),
        _ => {
            tracing::warn!("Skipping invalid URL: {}", trimmed);
            None
        }
    }
}

/// Normalized URLs from store rows, first occurrence wins.
pub fn watch_list(rows: &[StoreRow]) -> Vec<String> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter_map(|row| normalize_url(&row.url))
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// Counters reported at the end of every run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub changed: usize,
    pub backfilled: usize,
    pub removed: usize,
    pub errored: usize,
    pub write_failures: usize,
    pub notifications: usize,
    pub elapsed_ms: u64,
}
