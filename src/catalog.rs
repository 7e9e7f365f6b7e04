//! Filtering, sorting and paging of enriched entries.
//!
//! Everything here works on indices into the entry list so the viewer can keep
//! a single owned `Vec<EnrichedEntry>` and swap it wholesale on refresh.

use std::cmp::Ordering;

use crate::error::CatalogError;
use crate::favorites::FavoriteSet;
use crate::models::{ElementType, EnrichedEntry};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    /// Case-insensitive substring of the name or of any type name.
    pub query: String,
    /// Every listed type must be one of the entry's types.
    pub types: Vec<ElementType>,
    /// Every listed type must be one of the entry's weaknesses.
    pub weaknesses: Vec<ElementType>,
    pub favorites_only: bool,
}

impl Filter {
    pub fn is_empty(&self) -> bool {
        self.query.is_empty() && !self.needs_record()
    }

    /// Whether any criterion can only be tested against a resolved record.
    fn needs_record(&self) -> bool {
        !self.types.is_empty() || !self.weaknesses.is_empty() || self.favorites_only
    }

    pub fn matches(&self, entry: &EnrichedEntry, favorites: &FavoriteSet) -> bool {
        let q = self.query.trim().to_lowercase();
        let Some(record) = entry.record() else {
            return !self.needs_record() && (q.is_empty() || entry.name().to_lowercase().contains(&q));
        };

        let query_ok = q.is_empty()
            || record.name.to_lowercase().contains(&q)
            || record.types.iter().any(|t| t.to_lowercase().contains(&q));
        query_ok
            && self.types.iter().all(|t| record.has_type(t.as_str()))
            && self.weaknesses.iter().all(|t| record.is_weak_to(t.as_str()))
            && (!self.favorites_only || favorites.contains(&record.id))
    }

    /// Short human summary for the status line.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.query.is_empty() {
            parts.push(format!("\"{}\"", self.query));
        }
        if !self.types.is_empty() {
            parts.push(format!("type={}", join(&self.types)));
        }
        if !self.weaknesses.is_empty() {
            parts.push(format!("weak={}", join(&self.weaknesses)));
        }
        if self.favorites_only {
            parts.push("favorites".to_string());
        }
        if parts.is_empty() {
            "none".to_string()
        } else {
            parts.join(" ")
        }
    }
}

fn join(types: &[ElementType]) -> String {
    types.iter().map(|t| t.as_str()).collect::<Vec<_>>().join("+")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Id,
    Name,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sort {
    pub key: SortKey,
    pub order: SortOrder,
}

impl Sort {
    /// Id ↑ → Id ↓ → Name ↑ → Name ↓ → Id ↑ …
    pub fn next(self) -> Self {
        let (key, order) = match (self.key, self.order) {
            (SortKey::Id, SortOrder::Asc) => (SortKey::Id, SortOrder::Desc),
            (SortKey::Id, SortOrder::Desc) => (SortKey::Name, SortOrder::Asc),
            (SortKey::Name, SortOrder::Asc) => (SortKey::Name, SortOrder::Desc),
            (SortKey::Name, SortOrder::Desc) => (SortKey::Id, SortOrder::Asc),
        };
        Self { key, order }
    }

    pub fn label(self) -> &'static str {
        match (self.key, self.order) {
            (SortKey::Id, SortOrder::Asc) => "id ↑",
            (SortKey::Id, SortOrder::Desc) => "id ↓",
            (SortKey::Name, SortOrder::Asc) => "name ↑",
            (SortKey::Name, SortOrder::Desc) => "name ↓",
        }
    }

    /// Failed entries always sort after resolved ones, in input order.
    fn compare(self, a: &EnrichedEntry, b: &EnrichedEntry) -> Ordering {
        match (a.record(), b.record()) {
            (Some(ra), Some(rb)) => {
                let ord = match self.key {
                    SortKey::Id => ra.id.cmp(&rb.id),
                    SortKey::Name => ra.name.cmp(&rb.name),
                };
                match self.order {
                    SortOrder::Asc => ord,
                    SortOrder::Desc => ord.reverse(),
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

/// Indices of the entries that pass `filter`, ordered by `sort`.
pub fn view(entries: &[EnrichedEntry], filter: &Filter, sort: Sort, favorites: &FavoriteSet) -> Vec<usize> {
    let mut idx: Vec<usize> = entries
        .iter()
        .enumerate()
        .filter(|(_, e)| filter.matches(e, favorites))
        .map(|(i, _)| i)
        .collect();
    // stable, so ties keep input order
    idx.sort_by(|&a, &b| sort.compare(&entries[a], &entries[b]));
    idx
}

pub fn page_count(len: usize, page_size: usize) -> Result<usize, CatalogError> {
    if page_size == 0 {
        return Err(CatalogError::InvalidPageSize);
    }
    Ok(len.div_ceil(page_size).max(1))
}

/// Slice of `items` on 1-based `page`.
pub fn page<T>(items: &[T], page: usize, page_size: usize) -> Result<&[T], CatalogError> {
    let pages = page_count(items.len(), page_size)?;
    if page == 0 || page > pages {
        return Err(CatalogError::InvalidPage { page, pages });
    }
    let start = (page - 1) * page_size;
    let end = (start + page_size).min(items.len());
    Ok(&items[start..end])
}
