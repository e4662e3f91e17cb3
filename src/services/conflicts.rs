use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::catalog::Catalog;
use crate::model::entry::Occurrence;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictItem {
    pub msgid: String,
    pub occurrences: Vec<Occurrence>,
}

/// One translation shared by several different source strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub msgstr: String,
    pub items: Vec<ConflictItem>,
}

/// Translated singular entries whose msgstr is also used by another msgid,
/// grouped by msgstr in order of first appearance.
pub fn find_conflicts(catalog: &Catalog) -> Vec<Conflict> {
    let nplurals = catalog.plural_count();
    let mut groups: BTreeMap<&str, (usize, Vec<ConflictItem>)> = BTreeMap::new();

    for (i, e) in catalog.entries.iter().enumerate() {
        if e.is_plural() || !e.is_translated(nplurals) {
            continue;
        }
        let group = groups.entry(e.msgstr.as_str()).or_insert_with(|| (i, Vec::new()));
        if group.1.iter().any(|item| item.msgid == e.msgid) {
            continue;
        }
        group.1.push(ConflictItem {
            msgid: e.msgid.clone(),
            occurrences: e.occurrences.clone(),
        });
    }

    let mut conflicts: Vec<(usize, Conflict)> = groups
        .into_iter()
        .filter(|(_, (_, items))| items.len() > 1)
        .map(|(msgstr, (first, items))| {
            (
                first,
                Conflict {
                    msgstr: msgstr.to_string(),
                    items,
                },
            )
        })
        .collect();
    conflicts.sort_by_key(|(first, _)| *first);
    conflicts.into_iter().map(|(_, c)| c).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::entry::Entry;

    #[test]
    fn shared_translations_are_reported() {
        let mut c = Catalog::new();
        c.entries.push(Entry::with_msgstr("Post", "Entrada"));
        c.entries.push(Entry::with_msgstr("Entry", "Entrada"));
        c.entries.push(Entry::with_msgstr("Exit", "Salida"));
        c.entries.push(Entry::with_msgstr("Output", "Salida"));
        let mut fuzzy = Entry::with_msgstr("Log", "Salida");
        fuzzy.set_fuzzy(true);
        c.entries.push(fuzzy);
        c.entries.push(Entry::with_msgstr("Save", "Guardar"));

        let conflicts = find_conflicts(&c);
        assert_eq!(conflicts.len(), 2);
        assert_eq!(conflicts[0].msgstr, "Entrada");
        let ids: Vec<&str> = conflicts[1].items.iter().map(|i| i.msgid.as_str()).collect();
        assert_eq!(ids, ["Exit", "Output"]);
    }
}
