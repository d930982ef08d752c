use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::sync::Mutex;
use std::time::Duration;

use super::{PageFactory, PageHandle};
use crate::utils::error::ExtractionError;

/// Page backed by a plain HTTP fetch, without JavaScript.
///
/// Selectors are evaluated against the fetched markup; an element counts as
/// visible unless it or an ancestor is `hidden`, `display: none` or
/// `visibility: hidden` inline.
pub struct StaticPage {
    client: Client,
    html: Mutex<Option<String>>,
}

impl StaticPage {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            html: Mutex::new(None),
        }
    }

    /// Page with markup already loaded.
    pub fn from_html(html: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            html: Mutex::new(Some(html.into())),
        }
    }

    fn with_document<T>(&self, f: impl FnOnce(&Html) -> Result<T, ExtractionError>) -> Result<T, ExtractionError> {
        let html = self
            .html
            .lock()
            .map_err(|_| ExtractionError::Unclassified("page state poisoned".to_string()))?
            .clone()
            .ok_or_else(|| ExtractionError::Unclassified("page has not been navigated".to_string()))?;
        let document = Html::parse_document(&html);
        f(&document)
    }

    fn first_visible(&self, selector: &str) -> Result<bool, ExtractionError> {
        let parsed = parse_selector(selector)?;
        self.with_document(|document| {
            Ok(document
                .select(&parsed)
                .next()
                .map(is_rendered)
                .unwrap_or(false))
        })
    }
}

fn parse_selector(selector: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(selector)
        .map_err(|e| ExtractionError::Unclassified(format!("Invalid CSS selector '{}': {:?}", selector, e)))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn is_rendered(element: ElementRef<'_>) -> bool {
    std::iter::once(element)
        .chain(element.ancestors().filter_map(ElementRef::wrap))
        .all(|el| {
            let value = el.value();
            if value.attr("hidden").is_some() {
                return false;
            }
            let style: String = value
                .attr("style")
                .unwrap_or_default()
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_lowercase();
            !style.contains("display:none") && !style.contains("visibility:hidden")
        })
}

#[async_trait]
impl PageHandle for StaticPage {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), ExtractionError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExtractionError::NavigationTimeout
                } else {
                    ExtractionError::Unclassified(format!("Navigation failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractionError::Unclassified(format!("HTTP {} for {}", status, url)));
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                ExtractionError::NavigationTimeout
            } else {
                ExtractionError::Unclassified(format!("Failed to read response body: {}", e))
            }
        })?;

        let mut html = self
            .html
            .lock()
            .map_err(|_| ExtractionError::Unclassified("page state poisoned".to_string()))?;
        *html = Some(body);
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> Result<(), ExtractionError> {
        // Static markup never changes, so the answer is known immediately.
        if self.first_visible(selector)? {
            Ok(())
        } else {
            Err(ExtractionError::SelectorTimeout {
                selector: selector.to_string(),
            })
        }
    }

    async fn read_text(&self, selector: &str) -> Result<String, ExtractionError> {
        let parsed = parse_selector(selector)?;
        self.with_document(|document| {
            document
                .select(&parsed)
                .next()
                .map(element_text)
                .ok_or_else(|| ExtractionError::ElementAbsent {
                    selector: selector.to_string(),
                })
        })
    }

    async fn read_all_texts(&self, selector: &str) -> Result<Vec<String>, ExtractionError> {
        let parsed = parse_selector(selector)?;
        self.with_document(|document| Ok(document.select(&parsed).map(element_text).collect()))
    }

    async fn read_visible_texts(&self, selector: &str) -> Result<Vec<String>, ExtractionError> {
        let parsed = parse_selector(selector)?;
        self.with_document(|document| {
            Ok(document
                .select(&parsed)
                .filter(|el| is_rendered(*el))
                .map(element_text)
                .collect())
        })
    }

    async fn is_visible(&self, selector: &str) -> Result<bool, ExtractionError> {
        self.first_visible(selector)
    }

    async fn close(&self) -> Result<(), ExtractionError> {
        if let Ok(mut html) = self.html.lock() {
            html.take();
        }
        Ok(())
    }
}

/// Opens [`StaticPage`]s sharing one HTTP client.
pub struct HttpPageFactory {
    client: Client,
}

impl HttpPageFactory {
    pub fn new(user_agent: &str) -> crate::Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFactory for HttpPageFactory {
    async fn open(&self) -> Result<Box<dyn PageHandle>, ExtractionError> {
        Ok(Box::new(StaticPage::new(self.client.clone())))
    }
}
