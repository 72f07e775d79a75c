//! Filing queries
//!
//! This module handles:
//! - Decoding of JSON:API page bodies
//! - Parsing pages into filings, entities and validation messages
//! - Assembling the pages of a query into one [`FilingSet`](crate::FilingSet)
//! - Following pagination links over HTTP

pub mod assembler;
pub mod page;
pub mod parser;
pub mod source;

pub use assembler::{GraphAssembler, PageSummary, QueryResult};
pub use page::{decode_page, ApiError, ApiPage, PageLinks};
pub use parser::{parse_filings_page, PageMeta, ParsedPage, SeenIds, SubresourcePools, PAGE_RECORD};
pub use source::{PageSource, QueryParams};
