use std::collections::HashSet;
use std::ops::Range;

use regex::RegexBuilder;
use serde::Serialize;

use crate::error::Result;
use crate::model::catalog::Catalog;
use crate::model::entry::Entry;
use crate::services::lookup::CatalogLookup;

fn haystack(e: &Entry, search_occurrences: bool) -> String {
    let mut text = e.msgstr.clone();
    for form in e.msgstr_plural.values() {
        text.push_str(form);
    }
    text.push_str(&e.msgid);
    if let Some(plural) = &e.msgid_plural {
        text.push_str(plural);
    }
    if search_occurrences {
        for occ in &e.occurrences {
            text.push_str(&occ.file);
        }
    }
    text
}

/// Positions of entries whose text matches `query`, a case-insensitive
/// regular expression. Hits in the `native` catalog count for the entry with
/// the same msgid in `catalog`.
pub fn search(
    catalog: &Catalog,
    native: &dyn CatalogLookup,
    query: &str,
    search_occurrences: bool,
) -> Result<Vec<usize>> {
    let re = RegexBuilder::new(query.trim())
        .case_insensitive(true)
        .build()?;

    let mut hits: Vec<usize> = catalog
        .entries
        .iter()
        .enumerate()
        .filter(|(_, e)| !e.obsolete && re.is_match(&haystack(e, search_occurrences)))
        .map(|(i, _)| i)
        .collect();

    let mut seen: HashSet<usize> = hits.iter().copied().collect();
    for native_entry in native.entries() {
        if native_entry.obsolete || !re.is_match(&haystack(native_entry, search_occurrences)) {
            continue;
        }
        if let Some(pos) = catalog.position(&native_entry.msgid) {
            if seen.insert(pos) {
                hits.push(pos);
            }
        }
    }

    Ok(hits)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    pub number: usize,
    pub num_pages: usize,
    pub start: usize,
    pub end: usize,
}

impl Page {
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn has_other_pages(&self) -> bool {
        self.num_pages > 1
    }
}

/// Splits `total` items into pages of `per_page`. Requests outside
/// `1..=num_pages` fall back to the first page.
pub fn paginate(total: usize, per_page: usize, requested: usize) -> Page {
    let per_page = per_page.max(1);
    let num_pages = total.div_ceil(per_page).max(1);
    let number = if (1..=num_pages).contains(&requested) {
        requested
    } else {
        1
    };
    let start = ((number - 1) * per_page).min(total);
    let end = (start + per_page).min(total);
    Page {
        number,
        num_pages,
        start,
        end,
    }
}
