//! Per-page first-letter jump targets for the grades table, plus the cache
//! that carries them across requests.

use crate::model::StudentRow;
use crate::table::SortKind;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlphaBucket {
    pub letter: String,
    pub page: usize,
}

/// One entry per page; duplicate letters on consecutive pages are kept.
pub fn build_index(
    rows: &[StudentRow],
    per_page: usize,
    total_pages: usize,
    sort: SortKind,
) -> Vec<AlphaBucket> {
    (1..=total_pages)
        .map(|page| {
            let first = (page - 1)
                .checked_mul(per_page)
                .and_then(|start| rows.get(start));
            AlphaBucket {
                letter: first
                    .map(|r| leading_letter(sort.sort_key(r)))
                    .unwrap_or_else(|| "?".to_string()),
                page,
            }
        })
        .collect()
}

fn leading_letter(key: &str) -> String {
    match key.trim().chars().next() {
        Some(c) => c.to_uppercase().collect(),
        None => "?".to_string(),
    }
}

/// Everything that changes row order or page boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlphaIndexKey {
    pub filter: String,
    pub sort: String,
    pub desc: bool,
    pub per_page: usize,
}

#[derive(Debug, Clone)]
struct AlphaCacheEntry {
    key: AlphaIndexKey,
    index: Vec<AlphaBucket>,
}

/// Alpha indexes keyed by form id.
///
/// An entry is only replaced through `store`; callers decide when to rebuild
/// via `needs_rebuild`.
#[derive(Debug, Default)]
pub struct AlphaIndexCache {
    entries: HashMap<String, AlphaCacheEntry>,
}

impl AlphaIndexCache {
    pub fn needs_rebuild(&self, form_id: &str, key: &AlphaIndexKey, force: bool) -> bool {
        if force {
            return true;
        }
        match self.entries.get(form_id) {
            Some(entry) => entry.key != *key,
            None => true,
        }
    }

    pub fn get(&self, form_id: &str) -> Option<&[AlphaBucket]> {
        self.entries.get(form_id).map(|e| e.index.as_slice())
    }

    pub fn store(&mut self, form_id: &str, key: AlphaIndexKey, index: Vec<AlphaBucket>) {
        self.entries
            .insert(form_id.to_string(), AlphaCacheEntry { key, index });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
