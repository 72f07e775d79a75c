//! Query result collection
//!
//! [`FilingSet`] holds the filings of a query in retrieval order. Entities
//! and validation messages are not stored separately: the views returned by
//! [`FilingSet::entities`] and [`FilingSet::validation_messages`] enumerate
//! what is reachable through the filings currently in the set, so removing
//! a filing also removes its subresources from the views.

use super::entity::Entity;
use super::filing::{DownloadPaths, Filing};
use super::schema::{Inclusion, Record};
use super::validation_message::ValidationMessage;
use super::FileKind;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Ordered set of filings keyed by `api_id`
#[derive(Debug, Clone, Default)]
pub struct FilingSet {
    filings: Vec<Filing>,
    index: HashMap<String, usize>,
}

impl FilingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filing
    ///
    /// Returns false and leaves the set unchanged if a filing with the same
    /// `api_id` is already present.
    pub fn insert(&mut self, filing: Filing) -> bool {
        if self.index.contains_key(&filing.api_id) {
            return false;
        }
        self.index.insert(filing.api_id.clone(), self.filings.len());
        self.filings.push(filing);
        true
    }

    pub fn len(&self) -> usize {
        self.filings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filings.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Filing> {
        self.filings.iter()
    }

    pub fn get(&self, api_id: &str) -> Option<&Filing> {
        self.index.get(api_id).and_then(|&i| self.filings.get(i))
    }

    /// Download paths of a filing, the only part of a filing that changes
    /// while it is in the set
    pub fn download_paths_mut(&mut self, api_id: &str) -> Option<&mut DownloadPaths> {
        let &i = self.index.get(api_id)?;
        self.filings.get_mut(i).map(|filing| &mut filing.download_paths)
    }

    pub fn contains(&self, api_id: &str) -> bool {
        self.index.contains_key(api_id)
    }

    /// Removes a filing, keeping the order of the rest
    pub fn remove(&mut self, api_id: &str) -> Option<Filing> {
        let position = self.index.remove(api_id)?;
        let filing = self.filings.remove(position);
        self.reindex_from(position);
        Some(filing)
    }

    /// Keeps only the filings for which `keep` returns true
    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&Filing) -> bool,
    {
        self.filings.retain(keep);
        self.index.clear();
        self.reindex_from(0);
    }

    /// Drops filings beyond the first `len`
    pub fn truncate(&mut self, len: usize) {
        for filing in self.filings.drain(len.min(self.filings.len())..) {
            self.index.remove(&filing.api_id);
        }
    }

    fn reindex_from(&mut self, start: usize) {
        for (i, filing) in self.filings.iter().enumerate().skip(start) {
            self.index.insert(filing.api_id.clone(), i);
        }
    }

    /// Distinct entities linked to the filings of the set
    pub fn entities(&self) -> SubresourceView<'_, Entity> {
        SubresourceView {
            filings: &self.filings,
            select: |filing| filing.entity.as_slice(),
        }
    }

    /// Distinct validation messages linked to the filings of the set
    pub fn validation_messages(&self) -> SubresourceView<'_, ValidationMessage> {
        SubresourceView {
            filings: &self.filings,
            select: |filing| filing.validation_messages.as_deref().unwrap_or(&[]),
        }
    }

    /// Filings of the set linked to `entity`
    pub fn filings_of<'a>(&'a self, entity: &'a Entity) -> impl Iterator<Item = &'a Filing> + 'a {
        self.filings.iter().filter(move |filing| {
            filing
                .entity
                .as_ref()
                .is_some_and(|e| std::ptr::eq(Arc::as_ptr(e), entity))
        })
    }

    /// Filing columns for this set in schema order
    ///
    /// Download path columns are included only if some filing has a path of
    /// that kind, `entity_api_id` only if some filing is linked to an entity.
    pub fn columns(&self) -> Vec<&'static str> {
        let has_entities = self.filings.iter().any(|f| f.entity.is_some());
        let downloaded: HashSet<FileKind> = FileKind::ALL
            .into_iter()
            .filter(|kind| {
                self.filings
                    .iter()
                    .any(|f| f.download_paths.get(*kind).is_some())
            })
            .collect();

        Filing::schema()
            .iter()
            .filter(|field| match field.inclusion {
                Inclusion::Always => true,
                Inclusion::WhenEntities => has_entities,
                Inclusion::WhenDownloaded(kind) => downloaded.contains(&kind),
            })
            .map(|field| field.name)
            .collect()
    }
}

impl<'a> IntoIterator for &'a FilingSet {
    type Item = &'a Filing;
    type IntoIter = std::slice::Iter<'a, Filing>;

    fn into_iter(self) -> Self::IntoIter {
        self.filings.iter()
    }
}

/// Live view of the distinct subresources reachable from a [`FilingSet`]
pub struct SubresourceView<'a, T> {
    filings: &'a [Filing],
    select: fn(&'a Filing) -> &'a [Arc<T>],
}

impl<T> Clone for SubresourceView<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SubresourceView<'_, T> {}

impl<'a, T: Record> SubresourceView<'a, T> {
    /// Iterates the distinct subresources in first-reference order
    pub fn iter(&self) -> SubresourceIter<'a, T> {
        SubresourceIter {
            filings: self.filings.iter(),
            current: [].iter(),
            select: self.select,
            seen: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Returns true if this exact instance is reachable
    pub fn contains(&self, item: &T) -> bool {
        self.iter().any(|candidate| std::ptr::eq(Arc::as_ptr(candidate), item))
    }

    pub fn get(&self, api_id: &str) -> Option<&'a Arc<T>> {
        self.iter().find(|candidate| candidate.api_id() == api_id)
    }
}

impl<'a, T: Record> IntoIterator for SubresourceView<'a, T> {
    type Item = &'a Arc<T>;
    type IntoIter = SubresourceIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator of a [`SubresourceView`]
pub struct SubresourceIter<'a, T> {
    filings: std::slice::Iter<'a, Filing>,
    current: std::slice::Iter<'a, Arc<T>>,
    select: fn(&'a Filing) -> &'a [Arc<T>],
    seen: HashSet<&'a str>,
}

impl<'a, T: Record> Iterator for SubresourceIter<'a, T> {
    type Item = &'a Arc<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            for item in self.current.by_ref() {
                if self.seen.insert(item.api_id()) {
                    return Some(item);
                }
            }
            let filing = self.filings.next()?;
            self.current = (self.select)(filing).iter();
        }
    }
}
