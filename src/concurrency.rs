//! Two-level admission control for page work.
//!
//! Every attempt holds one global permit and, when its origin has a limiter,
//! one origin permit. Permits are taken global first and released in reverse
//! order when the [`AdmissionPermit`] is dropped.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

use crate::utils::error::ExtractionError;

/// Origin (`scheme://host[:port]`) used to group URLs, or `None` for unparsable input.
pub fn origin_key(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed.host_str()?;
    Some(parsed.origin().ascii_serialization().to_lowercase())
}

#[derive(Debug)]
pub struct ConcurrencyController {
    global: Arc<Semaphore>,
    origins: HashMap<String, Arc<Semaphore>>,
    global_limit: usize,
    per_origin_limit: usize,
}

/// Held for the lifetime of one attempt.
#[derive(Debug)]
pub struct AdmissionPermit {
    // Field order is drop order: origin first, then global.
    _origin: Option<OwnedSemaphorePermit>,
    _global: OwnedSemaphorePermit,
}

impl ConcurrencyController {
    /// Sizes one origin limiter per distinct origin in `urls`.
    pub fn new<'a, I>(global_limit: usize, per_origin_limit: usize, urls: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let global_limit = global_limit.max(1);
        let per_origin_limit = per_origin_limit.max(1);

        let mut origins = HashMap::new();
        for url in urls {
            if let Some(key) = origin_key(url) {
                origins
                    .entry(key)
                    .or_insert_with(|| Arc::new(Semaphore::new(per_origin_limit)));
            }
        }

        Self {
            global: Arc::new(Semaphore::new(global_limit)),
            origins,
            global_limit,
            per_origin_limit,
        }
    }

    pub async fn acquire(&self, url: &str) -> Result<AdmissionPermit, ExtractionError> {
        let global = Arc::clone(&self.global)
            .acquire_owned()
            .await
            .map_err(|_| ExtractionError::Unclassified("global limiter closed".to_string()))?;

        let origin = match origin_key(url).and_then(|key| self.origins.get(&key)) {
            Some(semaphore) => Some(
                Arc::clone(semaphore)
                    .acquire_owned()
                    .await
                    .map_err(|_| ExtractionError::Unclassified("origin limiter closed".to_string()))?,
            ),
            None => None,
        };

        Ok(AdmissionPermit {
            _origin: origin,
            _global: global,
        })
    }

    pub fn global_limit(&self) -> usize {
        self.global_limit
    }

    pub fn per_origin_limit(&self) -> usize {
        self.per_origin_limit
    }

    pub fn origin_count(&self) -> usize {
        self.origins.len()
    }

    pub fn available_global(&self) -> usize {
        self.global.available_permits()
    }

    pub fn available_for(&self, url: &str) -> Option<usize> {
        origin_key(url)
            .and_then(|key| self.origins.get(&key))
            .map(|semaphore| semaphore.available_permits())
    }
}
