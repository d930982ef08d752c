use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::models::{ObservedValue, Previous, Transition};

/// Last observed value per URL, persisted as `{ "url": 12000, "url2": null }`.
#[derive(Debug, Clone, Default)]
pub struct WatchState {
    values: BTreeMap<String, ObservedValue>,
    path: Option<PathBuf>,
}

impl WatchState {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Reads the state file. A missing or unreadable file starts empty.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<BTreeMap<String, ObservedValue>>(&contents) {
                Ok(values) => values,
                Err(e) => {
                    tracing::warn!("State file {} is corrupt, starting empty: {}", path.display(), e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No state file at {}, starting empty", path.display());
                BTreeMap::new()
            }
            Err(e) => {
                tracing::warn!("Failed to read state file {}, starting empty: {}", path.display(), e);
                BTreeMap::new()
            }
        };

        Self {
            values,
            path: Some(path),
        }
    }

    /// Writes the whole map atomically via a sibling temp file.
    pub fn save(&self) -> crate::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(&self.values)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn previous(&self, url: &str) -> Previous {
        match self.values.get(url) {
            Some(value) => Previous::Known(*value),
            None => Previous::Unknown,
        }
    }

    /// Classifies `current` against what is stored for `url`.
    pub fn classify(&self, url: &str, current: ObservedValue) -> Transition {
        classify(self.previous(url), current)
    }

    pub fn record(&mut self, url: &str, value: ObservedValue) {
        self.values.insert(url.to_string(), value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

pub fn classify(previous: Previous, current: ObservedValue) -> Transition {
    if !previous.differs_from(current) {
        return Transition::Unchanged;
    }

    match current {
        ObservedValue::Price(price) => match previous {
            Previous::Known(ObservedValue::SoldOut) => Transition::Restock { price },
            _ => Transition::PriceChange {
                previous: previous.as_price(),
                current: price,
            },
        },
        ObservedValue::SoldOut => Transition::NewSoldOut {
            previous: previous.as_price(),
        },
    }
}
