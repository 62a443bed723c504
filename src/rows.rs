use std::collections::{HashMap, HashSet};

use crate::catalog::CatalogItem;

pub const TRENDING_ROW_TITLE: &str = "Trending Now";

/// A titled, horizontally-scrollable group of catalog items. Row sequences
/// are rebuilt wholesale on every catalog fetch and never patched in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub title: String,
    pub items: Vec<CatalogItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    BlankId,
    DuplicateId,
}

pub fn aggregate(items: &[CatalogItem]) -> Vec<Row> {
    aggregate_with(items, |_, _| {})
}

/// Builds the row sequence: a "Trending Now" row first (only if anything
/// trends), then one row per category in the order categories first appear.
/// A trending item shows up in its category row too; that duplication is
/// deliberate. Items violating the id invariant are dropped and reported
/// through `diagnostic` rather than panicking.
pub fn aggregate_with<F>(items: &[CatalogItem], mut diagnostic: F) -> Vec<Row>
where
    F: FnMut(&CatalogItem, DropReason),
{
    let mut seen_ids: HashSet<&str> = HashSet::new();
    let mut valid: Vec<&CatalogItem> = Vec::with_capacity(items.len());
    for item in items {
        if item.id.trim().is_empty() {
            diagnostic(item, DropReason::BlankId);
            continue;
        }
        if !seen_ids.insert(item.id.as_str()) {
            diagnostic(item, DropReason::DuplicateId);
            continue;
        }
        valid.push(item);
    }

    let mut rows: Vec<Row> = Vec::new();

    let trending: Vec<CatalogItem> = valid
        .iter()
        .filter(|item| item.trending)
        .map(|item| (*item).clone())
        .collect();
    if !trending.is_empty() {
        rows.push(Row {
            title: TRENDING_ROW_TITLE.to_string(),
            items: trending,
        });
    }

    let mut category_index: HashMap<&str, usize> = HashMap::new();
    let mut categories: Vec<Row> = Vec::new();
    for item in &valid {
        let index = *category_index
            .entry(item.category.as_str())
            .or_insert_with(|| {
                categories.push(Row {
                    title: item.category.clone(),
                    items: Vec::new(),
                });
                categories.len() - 1
            });
        categories[index].items.push((*item).clone());
    }

    rows.extend(categories);
    rows
}
