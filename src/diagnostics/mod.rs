//! Diagnostics of a query
//!
//! Inconsistent upstream data never fails a query. It is logged and
//! recorded in a [`Diagnostics`] registry that the caller inspects after
//! the query has finished. A registry belongs to one query execution;
//! registries of several queries can be merged.

mod registry;

pub use registry::{
    Diagnostics, DuplicateFiling, KeyPathAvailability, MissingReference, Origin, OrphanResource,
    RetrieveCount, ValueFailure,
};
