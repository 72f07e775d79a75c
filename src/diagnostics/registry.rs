use crate::resource::ResourceKind;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Position of a resource object in a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Origin {
    /// The primary `data` array
    Data,
    /// The `included` array
    Included,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Data => f.write_str("data"),
            Origin::Included => f.write_str("included"),
        }
    }
}

/// How often a key path was read and found
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetrieveCount {
    pub success_count: u64,
    pub total_count: u64,
}

/// A row of the key path availability report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPathAvailability {
    pub record: &'static str,
    pub key_path: String,
    pub success_count: u64,
    pub total_count: u64,
}

/// A filing identity that appeared again later in the same query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateFiling {
    pub api_id: String,
    pub request_url: String,
}

/// A relation whose target could not be resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingReference {
    pub from: ResourceKind,
    pub from_id: String,
    pub target: ResourceKind,
    /// `None` when the relation was not declared at all
    pub target_id: Option<String>,
}

/// A subresource that no filing refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanResource {
    pub kind: ResourceKind,
    pub api_id: String,
}

/// A value that could not be parsed or derived
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueFailure {
    pub record: &'static str,
    pub api_id: Option<String>,
    /// Key path of a parsed value or name of a derived field
    pub field: String,
    pub value: String,
    pub reason: String,
}

/// Registry of everything unexpected found during a query
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    key_paths: BTreeMap<(&'static str, String), RetrieveCount>,
    unaccessed_key_paths: BTreeSet<(&'static str, String)>,
    unexpected_resource_types: BTreeSet<(String, Origin)>,
    duplicate_filings: Vec<DuplicateFiling>,
    missing_references: Vec<MissingReference>,
    orphans: Vec<OrphanResource>,
    value_failures: Vec<ValueFailure>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one read of `key_path` on a record
    pub fn record_key_path_access(&mut self, record: &'static str, key_path: &str, found: bool) {
        let count = self
            .key_paths
            .entry((record, key_path.to_string()))
            .or_default();
        count.total_count += 1;
        if found {
            count.success_count += 1;
        }
    }

    /// Records a key path present in a response but never read
    pub fn record_unaccessed_key_path(&mut self, record: &'static str, key_path: &str) {
        if self
            .unaccessed_key_paths
            .insert((record, key_path.to_string()))
        {
            tracing::debug!("Unaccessed key path {}: {}", record, key_path);
        }
    }

    /// Records a resource object whose type was not expected at its position
    pub fn record_unexpected_type(&mut self, api_type: &str, origin: Origin) {
        if self
            .unexpected_resource_types
            .insert((api_type.to_string(), origin))
        {
            tracing::warn!("Unexpected resource type '{}' in {}", api_type, origin);
        }
    }

    pub fn record_duplicate_filing(&mut self, api_id: &str, request_url: &str) {
        tracing::warn!(
            "Duplicate primary record: filing {} seen again in {}",
            api_id,
            request_url
        );
        self.duplicate_filings.push(DuplicateFiling {
            api_id: api_id.to_string(),
            request_url: request_url.to_string(),
        });
    }

    pub fn record_missing_reference(&mut self, reference: MissingReference) {
        match &reference.target_id {
            Some(target_id) => tracing::warn!(
                "{} {} refers to missing {} {}",
                reference.from,
                reference.from_id,
                reference.target,
                target_id
            ),
            None => tracing::warn!(
                "{} {} declares no {}",
                reference.from,
                reference.from_id,
                reference.target
            ),
        }
        self.missing_references.push(reference);
    }

    pub fn record_orphan(&mut self, kind: ResourceKind, api_id: &str) {
        tracing::warn!("Orphaned {} {}: no filing refers to it", kind, api_id);
        self.orphans.push(OrphanResource {
            kind,
            api_id: api_id.to_string(),
        });
    }

    pub fn record_value_failure(&mut self, failure: ValueFailure) {
        tracing::warn!(
            "Could not read {}.{} of {}: {} ({:?})",
            failure.record,
            failure.field,
            failure.api_id.as_deref().unwrap_or("?"),
            failure.reason,
            failure.value
        );
        self.value_failures.push(failure);
    }

    /// Read statistics per record and key path, sorted
    pub fn key_path_availability(&self) -> Vec<KeyPathAvailability> {
        self.key_paths
            .iter()
            .map(|((record, key_path), count)| KeyPathAvailability {
                record: *record,
                key_path: key_path.clone(),
                success_count: count.success_count,
                total_count: count.total_count,
            })
            .collect()
    }

    pub fn retrieve_count(&self, record: &'static str, key_path: &str) -> Option<RetrieveCount> {
        self.key_paths
            .get(&(record, key_path.to_string()))
            .copied()
    }

    pub fn unaccessed_key_paths(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.unaccessed_key_paths
            .iter()
            .map(|(record, path)| (*record, path.as_str()))
    }

    pub fn unexpected_resource_types(&self) -> impl Iterator<Item = (&str, Origin)> {
        self.unexpected_resource_types
            .iter()
            .map(|(api_type, origin)| (api_type.as_str(), *origin))
    }

    pub fn duplicate_filings(&self) -> &[DuplicateFiling] {
        &self.duplicate_filings
    }

    pub fn missing_references(&self) -> &[MissingReference] {
        &self.missing_references
    }

    pub fn orphans(&self) -> &[OrphanResource] {
        &self.orphans
    }

    pub fn value_failures(&self) -> &[ValueFailure] {
        &self.value_failures
    }

    /// Number of protocol violations and reference inconsistencies
    ///
    /// Key path statistics are informational and not counted.
    pub fn issue_count(&self) -> usize {
        self.unexpected_resource_types.len()
            + self.duplicate_filings.len()
            + self.missing_references.len()
            + self.orphans.len()
            + self.value_failures.len()
    }

    pub fn has_issues(&self) -> bool {
        self.issue_count() > 0
    }

    /// Adds the records of another registry to this one
    pub fn merge(&mut self, other: Diagnostics) {
        for (key, count) in other.key_paths {
            let entry = self.key_paths.entry(key).or_default();
            entry.success_count += count.success_count;
            entry.total_count += count.total_count;
        }
        self.unaccessed_key_paths.extend(other.unaccessed_key_paths);
        self.unexpected_resource_types
            .extend(other.unexpected_resource_types);
        self.duplicate_filings.extend(other.duplicate_filings);
        self.missing_references.extend(other.missing_references);
        self.orphans.extend(other.orphans);
        self.value_failures.extend(other.value_failures);
    }

    /// Clears all records
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
