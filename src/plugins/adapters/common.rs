//! Page probes shared by the site adapters.

use std::time::Duration;

use crate::page::PageHandle;
use crate::utils::error::ExtractionError;
use crate::utils::price::{PriceRules, contains_sold_out_keyword};

/// Containers that usually hold the selling price, most specific first.
pub const PRICE_SECTION_SELECTORS: &[&str] = &[
    "[class*='member'][class*='price']",
    "[class*='price'][class*='member']",
    "[class*='member'] [class*='price']",
    "[class*='price_area']",
    "[class*='priceBox']",
    "[class*='product'] [class*='price']",
    "[class*='sale'] [class*='price']",
    "[class*='discount'] [class*='price']",
    "[class*='price']",
];

/// Last-resort elements scanned when no price section renders.
pub const BROAD_PRICE_SELECTORS: &[&str] = &[
    "[class*='price']",
    "[class*='Price']",
    "[class*='cost']",
    "strong",
    "b",
    "em",
    "span",
];

const SECTION_WAIT: Duration = Duration::from_secs(2);

/// Turns "element missing" outcomes into `None`; other failures still propagate.
pub fn soften<T>(result: Result<T, ExtractionError>) -> Result<Option<T>, ExtractionError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_missing_element() => Ok(None),
        Err(err) => Err(err),
    }
}

/// Waits for `selector` to become visible, returning `false` on expiry.
pub async fn wait_visible(page: &dyn PageHandle, selector: &str, timeout: Duration) -> Result<bool, ExtractionError> {
    Ok(soften(page.wait_for_selector(selector, timeout).await)?.is_some())
}

/// True once any selector in order becomes visible within `timeout_each`.
pub async fn wait_any_selector(
    page: &dyn PageHandle,
    selectors: &[&str],
    timeout_each: Duration,
) -> Result<bool, ExtractionError> {
    for selector in selectors {
        if wait_visible(page, selector, timeout_each).await? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Waits for `selector`, then checks its text for a sold-out keyword.
pub async fn visible_text_has_sold_out(
    page: &dyn PageHandle,
    selector: &str,
    timeout: Duration,
) -> Result<bool, ExtractionError> {
    if !wait_visible(page, selector, timeout).await? {
        return Ok(false);
    }
    let text = soften(page.read_text(selector).await)?.unwrap_or_default();
    Ok(contains_sold_out_keyword(&text))
}

/// Joins every match of `selector` and checks for a sold-out keyword, visible or not.
pub async fn any_text_has_sold_out(page: &dyn PageHandle, selector: &str) -> Result<bool, ExtractionError> {
    let texts = page.read_all_texts(selector).await?;
    Ok(contains_sold_out_keyword(&texts.join(" ")))
}

/// First element matching `selector` is rendered and carries a sold-out keyword.
pub async fn marker_has_sold_out(page: &dyn PageHandle, selector: &str) -> Result<bool, ExtractionError> {
    if !page.is_visible(selector).await? {
        return Ok(false);
    }
    let text = soften(page.read_text(selector).await)?.unwrap_or_default();
    Ok(contains_sold_out_keyword(&text))
}

/// Some rendered `tag` element itself contains one of `keywords`.
pub async fn visible_tag_with_keyword(
    page: &dyn PageHandle,
    tag: &str,
    keywords: &[&str],
) -> Result<bool, ExtractionError> {
    let texts = page.read_visible_texts(tag).await?;
    Ok(texts.iter().any(|text| keywords.iter().any(|kw| text.contains(kw))))
}

/// Reads one precise selector and applies the floor.
pub async fn read_precise(
    page: &dyn PageHandle,
    selector: &str,
    timeout: Duration,
    rules: &PriceRules,
) -> Result<Option<u64>, ExtractionError> {
    if !wait_visible(page, selector, timeout).await? {
        return Ok(None);
    }
    let text = soften(page.read_text(selector).await)?;
    Ok(text.and_then(|text| rules.parse(&text)))
}

/// Generic scan used when precise selectors yield nothing.
///
/// Price sections are tried first; only if none of them produce a candidate
/// are broad tags (`strong`, `span`, ...) scanned. The smallest valid,
/// noise-free amount wins.
pub async fn extract_price_fallback(
    page: &dyn PageHandle,
    rules: &PriceRules,
) -> Result<Option<u64>, ExtractionError> {
    let mut texts: Vec<String> = Vec::new();

    if wait_any_selector(page, PRICE_SECTION_SELECTORS, SECTION_WAIT).await? {
        for selector in PRICE_SECTION_SELECTORS {
            texts.extend(page.read_all_texts(selector).await?);
        }
    }

    if let Some(price) = rules.min_candidate(texts.iter().map(String::as_str)) {
        return Ok(Some(price));
    }

    let mut broad: Vec<String> = Vec::new();
    for selector in BROAD_PRICE_SELECTORS {
        broad.extend(page.read_all_texts(selector).await?);
    }
    Ok(rules.min_candidate(broad.iter().map(String::as_str)))
}
