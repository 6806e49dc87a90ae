//! Web search seam used by the dork adapter.
//!
//! The search provider itself is opaque: [`SearchEngine`] turns one phrase
//! query into an ordered list of result URLs. [`HtmlSearchEngine`] talks to an
//! HTML results page (DuckDuckGo's `html/` endpoint by default) and pulls the
//! result links out of the markup.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use dossier_shared::{DossierError, DorkSearchConfig, Result};

use crate::adapters::{LookupError, build_client};

/// One phrase search against a web search provider.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Return up to `limit` result URLs for `query`, best first.
    async fn search(
        &self,
        query: &str,
        limit: usize,
        lang: &str,
    ) -> std::result::Result<Vec<String>, LookupError>;
}

/// Search engine that scrapes an HTML results page.
pub struct HtmlSearchEngine {
    client: Client,
    endpoint: Url,
    timeout: Duration,
}

impl HtmlSearchEngine {
    pub fn new(config: &DorkSearchConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            DossierError::config(format!(
                "invalid dork_search endpoint '{}': {e}",
                config.endpoint
            ))
        })?;
        let timeout = Duration::from_secs(config.timeout_secs);

        Ok(Self {
            client: build_client(timeout)?,
            endpoint,
            timeout,
        })
    }
}

#[async_trait]
impl SearchEngine for HtmlSearchEngine {
    async fn search(
        &self,
        query: &str,
        limit: usize,
        lang: &str,
    ) -> std::result::Result<Vec<String>, LookupError> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("kl", lang);
        let url_str = url.to_string();

        debug!(%query, "running web search");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LookupError::from_reqwest(&url_str, self.timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status {
                url: url_str,
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| LookupError::from_reqwest(&url_str, self.timeout, e))?;

        let doc = Html::parse_document(&body);
        Ok(extract_result_links(&doc, &self.endpoint, limit))
    }
}

// ---------------------------------------------------------------------------
// Result extraction
// ---------------------------------------------------------------------------

/// Extract result URLs from a search results page.
///
/// Prefers anchors marked as results (`a.result__a`); when none exist, falls
/// back to every absolute link that leaves the search engine's own host.
/// Redirect wrappers are unwrapped, duplicates dropped, order preserved.
pub(crate) fn extract_result_links(doc: &Html, base: &Url, limit: usize) -> Vec<String> {
    let result_sel = Selector::parse("a.result__a").unwrap();
    let any_sel = Selector::parse("a[href]").unwrap();

    let mut hrefs: Vec<&str> = doc
        .select(&result_sel)
        .filter_map(|el| el.value().attr("href"))
        .collect();
    let marked = !hrefs.is_empty();
    if !marked {
        hrefs = doc
            .select(&any_sel)
            .filter_map(|el| el.value().attr("href"))
            .collect();
    }

    let mut links: Vec<String> = Vec::new();
    for href in hrefs {
        if links.len() >= limit {
            break;
        }
        let Some(target) = resolve_target(base, href) else {
            continue;
        };
        if !marked && target.host_str() == base.host_str() {
            continue;
        }
        let target = target.to_string();
        if !links.contains(&target) {
            links.push(target);
        }
    }
    links
}

/// Resolve `href` against the results page and unwrap redirect links
/// (`/l/?uddg=<target>`, `/url?q=<target>`).
fn resolve_target(base: &Url, href: &str) -> Option<Url> {
    if href.starts_with('#') || href.starts_with("javascript:") || href.starts_with("mailto:") {
        return None;
    }

    let resolved = base.join(href).ok()?;
    let wrapped = resolved.query_pairs().find_map(|(key, value)| {
        let is_redirect = key == "uddg" || (key == "q" && resolved.path() == "/url");
        is_redirect.then(|| value.into_owned())
    });

    let mut target = match wrapped {
        Some(inner) => Url::parse(&inner).ok()?,
        None => resolved,
    };
    if target.scheme() != "http" && target.scheme() != "https" {
        return None;
    }
    target.set_fragment(None);
    Some(target)
}
