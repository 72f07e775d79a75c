//! Assembly of a paginated query into one filing set

use super::page::{decode_page, ApiPage, PageLinks};
use super::parser::{parse_filings_page, SeenIds, SubresourcePools};
use crate::diagnostics::Diagnostics;
use crate::resource::{FilingSet, ResourceKind, Scope};
use crate::PageError;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use url::Url;

/// What one page contributed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSummary {
    /// 1-based position of the page in the query
    pub page_number: usize,

    pub url: String,

    /// Filings added to the result
    pub new_filings: usize,

    pub new_entities: usize,

    pub new_validation_messages: usize,

    /// Filings skipped because their identity was seen before
    pub duplicate_filings: usize,

    /// Filings dropped by the size limit
    pub truncated_filings: usize,

    pub query_filing_count: Option<i64>,

    pub links: PageLinks,
}

/// The assembled result of a query
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub filings: FilingSet,

    pub diagnostics: Diagnostics,

    /// Summaries of the pages in query order
    pub pages: Vec<PageSummary>,

    /// Filings matching the query according to the API, if reported
    pub query_filing_count: Option<i64>,

    /// JSON:API version of the last page that reported one
    pub api_version: Option<String>,
}

/// Builds the result of one query from its pages
///
/// Pages must be added in page order. Identity sets, subresource pools and
/// diagnostics live for one query; use a new assembler per query.
///
/// # Example
///
/// ```no_run
/// use xbrl_filings::query::GraphAssembler;
/// use xbrl_filings::Scope;
///
/// # fn run(bodies: Vec<(url::Url, Vec<u8>)>) -> Result<(), xbrl_filings::PageError> {
/// let mut assembler = GraphAssembler::new(Scope::all());
/// for (url, body) in bodies {
///     assembler.add_body(&url, &body, chrono::Utc::now())?;
/// }
/// let result = assembler.finish()?;
/// println!("{} filings", result.filings.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct GraphAssembler {
    scope: Scope,
    max_size: Option<usize>,
    seen: SeenIds,
    pools: SubresourcePools,
    referenced_entities: HashSet<String>,
    filings: FilingSet,
    diagnostics: Diagnostics,
    pages: Vec<PageSummary>,
    query_filing_count: Option<i64>,
    api_version: Option<String>,
    failed_page: Option<usize>,
    full: bool,
}

impl GraphAssembler {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            max_size: None,
            seen: SeenIds::default(),
            pools: SubresourcePools::default(),
            referenced_entities: HashSet::new(),
            filings: FilingSet::new(),
            diagnostics: Diagnostics::new(),
            pages: Vec::new(),
            query_filing_count: None,
            api_version: None,
            failed_page: None,
            full: false,
        }
    }

    /// Limits the number of filings in the result
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self.full = max_size == 0;
        self
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Returns true once the size limit has been reached
    ///
    /// Pages added after this are ignored.
    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Number of pages added so far
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Diagnostics recorded so far
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Decodes a raw page body and adds it
    ///
    /// A body that cannot be decoded fails the whole query: the error is
    /// returned here and every later call, including
    /// [`finish`](Self::finish), fails as well.
    pub fn add_body(
        &mut self,
        url: &Url,
        bytes: &[u8],
        time: DateTime<Utc>,
    ) -> Result<Option<&PageSummary>, PageError> {
        self.check_not_failed()?;
        match decode_page(url, bytes, time) {
            Ok(page) => self.add_page(&page),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Records that the next page could not be retrieved
    ///
    /// Marks the query as failed and hands the error back.
    pub fn fail(&mut self, error: PageError) -> PageError {
        let page_number = self.pages.len() + 1;
        tracing::warn!("Query failed at page {}: {}", page_number, error);
        self.failed_page.get_or_insert(page_number);
        error
    }

    /// Adds a decoded page
    ///
    /// Returns the summary of the page, or `None` if the page was ignored
    /// because the size limit had already been reached.
    pub fn add_page(&mut self, page: &ApiPage) -> Result<Option<&PageSummary>, PageError> {
        self.check_not_failed()?;
        if self.full {
            tracing::debug!("Size limit reached, ignoring page {}", page.url);
            return Ok(None);
        }

        let mut parsed = parse_filings_page(
            page,
            self.scope,
            &mut self.seen,
            &self.pools,
            &mut self.diagnostics,
        );
        self.pools.extend(&parsed);
        self.referenced_entities
            .extend(parsed.referenced_entities.drain());

        let mut truncated_filings = 0;
        if let Some(max_size) = self.max_size {
            let room = max_size.saturating_sub(self.filings.len());
            if parsed.filings.len() >= room {
                truncated_filings = parsed.filings.len() - room;
                parsed.filings.truncate(room);
                self.full = true;
            }
        }

        let new_filings = parsed.filings.len();
        for filing in parsed.filings {
            self.filings.insert(filing);
        }

        if parsed.meta.query_filing_count.is_some() {
            self.query_filing_count = parsed.meta.query_filing_count;
        }
        if parsed.meta.api_version.is_some() {
            self.api_version = parsed.meta.api_version.clone();
        }

        let summary = PageSummary {
            page_number: self.pages.len() + 1,
            url: page.url.to_string(),
            new_filings,
            new_entities: parsed.entities.len(),
            new_validation_messages: parsed.validation_messages.len(),
            duplicate_filings: parsed.duplicate_filings.len(),
            truncated_filings,
            query_filing_count: parsed.meta.query_filing_count,
            links: parsed.meta.links,
        };
        tracing::debug!(
            "Page {}: {} filings added, {} in total",
            summary.page_number,
            new_filings,
            self.filings.len()
        );
        self.pages.push(summary);

        Ok(self.pages.last())
    }

    /// Completes the query
    ///
    /// Entities that no filing of the query referred to are reported as
    /// orphans.
    pub fn finish(mut self) -> Result<QueryResult, PageError> {
        self.check_not_failed()?;

        let mut orphans: Vec<&String> = self
            .pools
            .entities
            .keys()
            .filter(|id| !self.referenced_entities.contains(*id))
            .collect();
        orphans.sort();
        for api_id in orphans {
            self.diagnostics
                .record_orphan(ResourceKind::Entity, api_id);
        }

        tracing::info!(
            "Query finished: {} filings from {} pages, {} diagnostics",
            self.filings.len(),
            self.pages.len(),
            self.diagnostics.issue_count()
        );

        Ok(QueryResult {
            filings: self.filings,
            diagnostics: self.diagnostics,
            pages: self.pages,
            query_filing_count: self.query_filing_count,
            api_version: self.api_version,
        })
    }

    fn check_not_failed(&self) -> Result<(), PageError> {
        match self.failed_page {
            Some(page) => Err(PageError::Aborted { page }),
            None => Ok(()),
        }
    }
}
