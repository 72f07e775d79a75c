//! Typed access to JSON:API resource objects
//!
//! Resource objects are read through a [`JsonTree`], which looks up
//! dot-separated key paths, parses dates, datetimes and URLs, and remembers
//! which key paths were read so that fields added to the API later show up
//! in the diagnostics.

mod tree;

pub use tree::{lookup, JsonTree, ParseKind};
pub(crate) use tree::parse_date;
