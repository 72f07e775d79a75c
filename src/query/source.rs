//! Retrieval of filings pages over HTTP
//!
//! [`PageSource`] requests the first page of a query and follows the
//! `links.next` URLs the API returns, handing every page to a
//! [`GraphAssembler`].

use super::assembler::{GraphAssembler, QueryResult};
use super::page::{api_errors, decode_page, ApiPage};
use crate::config::Config;
use crate::http::build_http_client;
use crate::resource::Scope;
use crate::PageError;
use chrono::Utc;
use reqwest::Client;
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

/// Query string parameters of the first page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParams {
    /// `page[size]`
    pub page_size: usize,

    /// `sort`, e.g. `-date_added`
    pub sort: Option<String>,

    /// Parameters passed through unchanged, e.g. `filter[country]=FI`
    pub extra: Vec<(String, String)>,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            page_size: 200,
            sort: None,
            extra: Vec::new(),
        }
    }
}

impl QueryParams {
    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((key.into(), value.into()));
        self
    }
}

/// Fetches pages of the filings API
#[derive(Debug, Clone)]
pub struct PageSource {
    client: Client,
    entry_point: Url,
    timeout: Duration,
}

impl PageSource {
    pub fn new(client: Client, entry_point: Url, timeout: Duration) -> Self {
        Self {
            client,
            entry_point,
            timeout,
        }
    }

    /// Creates a page source from the `[api]` and `[user-agent]` config
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        let client = build_http_client(&config.user_agent)?;
        let entry_point = Url::parse(&config.api.entry_point_url)?;
        Ok(Self::new(
            client,
            entry_point,
            Duration::from_secs(config.api.timeout_secs),
        ))
    }

    pub fn entry_point(&self) -> &Url {
        &self.entry_point
    }

    /// URL of the first page of a query
    pub fn first_page_url(&self, params: &QueryParams, scope: Scope) -> Url {
        let mut url = self.entry_point.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("page[size]", &params.page_size.to_string());
            if let Some(include) = scope.include_param() {
                pairs.append_pair("include", &include);
            }
            if let Some(sort) = &params.sort {
                pairs.append_pair("sort", sort);
            }
            for (key, value) in &params.extra {
                pairs.append_pair(key, value);
            }
        }
        url
    }

    /// Fetches and decodes one page
    ///
    /// # Returns
    ///
    /// * `Ok(ApiPage)` - A structurally valid page
    /// * `Err(PageError)` - Transport failure, non-success status, API
    ///   `errors` document or undecodable body
    pub async fn fetch_page(&self, url: &Url) -> Result<ApiPage, PageError> {
        let time = Utc::now();
        tracing::debug!("GET {}", url);

        let http_error = |source: reqwest::Error| PageError::Http {
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "application/vnd.api+json")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(http_error)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(http_error)?;

        if !status.is_success() {
            let document = serde_json::from_slice::<serde_json::Value>(&bytes).ok();
            if let Some(errors) = document.as_ref().and_then(api_errors) {
                return Err(PageError::Api {
                    url: url.to_string(),
                    errors,
                });
            }
            return Err(PageError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).chars().take(500).collect(),
            });
        }

        decode_page(url, &bytes, time)
    }

    /// Runs a query to the last page or the size limit
    ///
    /// # Arguments
    ///
    /// * `params` - Parameters of the first page
    /// * `scope` - Which subresources to include
    /// * `max_size` - Maximum number of filings, `None` for all
    pub async fn run_query(
        &self,
        params: &QueryParams,
        scope: Scope,
        max_size: Option<usize>,
    ) -> Result<QueryResult, PageError> {
        let mut assembler = GraphAssembler::new(scope);
        if let Some(max_size) = max_size {
            assembler = assembler.with_max_size(max_size);
        }

        let first = self.first_page_url(params, scope);
        tracing::info!("Querying {}", first);

        let mut visited = HashSet::new();
        let mut next = Some(first);

        while let Some(url) = next.take() {
            if assembler.is_full() {
                break;
            }
            if !visited.insert(url.to_string()) {
                tracing::warn!("Pagination loops back to {}, stopping", url);
                break;
            }

            let page = match self.fetch_page(&url).await {
                Ok(page) => page,
                Err(e) => return Err(assembler.fail(e)),
            };

            let Some(summary) = assembler.add_page(&page)? else {
                break;
            };
            tracing::info!(
                "Page {}: {} new filings",
                summary.page_number,
                summary.new_filings
            );

            next = match summary.links.next.as_deref().map(Url::parse) {
                Some(Ok(url)) => Some(url),
                Some(Err(e)) => {
                    tracing::warn!("Unusable next link on page {}: {}", summary.page_number, e);
                    None
                }
                None => None,
            };
        }

        assembler.finish()
    }
}
