//! Reconciles an incoming catalog into a destination catalog.
//!
//! Merging never removes destination entries. New msgids are appended in
//! incoming order; conflicting translations are resolved by [`Priority`] and
//! always reported so a reviewer can see what changed.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::catalog::Catalog;
use crate::model::entry::Entry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Incoming translations overwrite the destination.
    Incoming,
    /// Destination translations are kept; incoming ones are only reported.
    Destination,
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "incoming" => Ok(Priority::Incoming),
            "destination" => Ok(Priority::Destination),
            other => Err(format!("unknown merge priority '{other}'")),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Priority::Incoming => "incoming",
            Priority::Destination => "destination",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub msgstr: String,

    #[serde(default)]
    pub msgstr_plural: BTreeMap<usize, String>,

    #[serde(default)]
    pub fuzzy: bool,
}

impl From<&Entry> for Translation {
    fn from(e: &Entry) -> Self {
        Translation {
            msgstr: e.msgstr.clone(),
            msgstr_plural: e.msgstr_plural.clone(),
            fuzzy: e.is_fuzzy(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedEntry {
    pub msgid: String,

    #[serde(default)]
    pub msgid_plural: Option<String>,

    pub old: Translation,
    pub new: Translation,

    /// Whether the incoming value was written into the destination.
    pub applied: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MergeResult {
    pub new: Vec<Entry>,
    pub changed: Vec<ChangedEntry>,
}

impl MergeResult {
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.changed.is_empty()
    }
}

/// Merges `incoming` into `destination` in place.
pub fn merge(destination: &mut Catalog, incoming: &Catalog, priority: Priority) -> MergeResult {
    let mut index: HashMap<String, usize> = HashMap::new();
    for (i, e) in destination.entries.iter().enumerate() {
        if !e.obsolete {
            index.entry(e.msgid.clone()).or_insert(i);
        }
    }

    let mut result = MergeResult::default();

    for inc in incoming.entries.iter().filter(|e| !e.obsolete) {
        match index.get(&inc.msgid) {
            None => {
                destination.entries.push(inc.clone());
                index.insert(inc.msgid.clone(), destination.entries.len() - 1);
                result.new.push(inc.clone());
            }
            Some(&pos) => {
                let dest = &mut destination.entries[pos];
                if dest.same_translation(inc) {
                    continue;
                }

                // Blank incoming text is reported but never written.
                let applied = priority == Priority::Incoming && !inc.is_blank();
                result.changed.push(ChangedEntry {
                    msgid: inc.msgid.clone(),
                    msgid_plural: inc.msgid_plural.clone(),
                    old: Translation::from(&*dest),
                    new: Translation::from(inc),
                    applied,
                });

                if applied {
                    dest.msgstr = inc.msgstr.clone();
                    dest.msgstr_plural = inc.msgstr_plural.clone();
                    dest.flags = inc.flags.clone();
                }
            }
        }
    }

    log::debug!(
        "merge ({priority}): {} new, {} changed",
        result.new.len(),
        result.changed.len()
    );

    result
}

/// What [`merge`] would report, leaving `destination` untouched.
pub fn preview(destination: &Catalog, incoming: &Catalog, priority: Priority) -> MergeResult {
    let mut scratch = destination.clone();
    merge(&mut scratch, incoming, priority)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn catalog(pairs: &[(&str, &str)]) -> Catalog {
        let mut c = Catalog::new();
        for (id, s) in pairs {
            c.entries.push(Entry::with_msgstr(*id, *s));
        }
        c
    }

    #[test]
    fn priority_decides_the_winner() {
        let incoming = catalog(&[("k", "new")]);

        let mut dest = catalog(&[("k", "old")]);
        let r = merge(&mut dest, &incoming, Priority::Incoming);
        assert_eq!(dest.find("k").unwrap().msgstr, "new");
        assert_eq!(r.changed.len(), 1);
        assert_eq!(r.changed[0].old.msgstr, "old");
        assert_eq!(r.changed[0].new.msgstr, "new");
        assert!(r.changed[0].applied);

        let mut dest = catalog(&[("k", "old")]);
        let r = merge(&mut dest, &incoming, Priority::Destination);
        assert_eq!(dest.find("k").unwrap().msgstr, "old");
        assert_eq!(r.changed[0].old.msgstr, "old");
        assert_eq!(r.changed[0].new.msgstr, "new");
        assert!(!r.changed[0].applied);
    }

    #[test]
    fn new_entries_append_in_incoming_order() {
        let mut dest = catalog(&[("a", "A")]);
        let incoming = catalog(&[("c", ""), ("a", "A"), ("b", "B")]);
        let r = merge(&mut dest, &incoming, Priority::Incoming);

        let ids: Vec<&str> = dest.entries.iter().map(|e| e.msgid.as_str()).collect();
        assert_eq!(ids, ["a", "c", "b"]);
        assert_eq!(r.new.len(), 2);
        assert!(r.changed.is_empty());
    }

    #[test]
    fn merging_twice_changes_nothing_more() {
        let incoming = catalog(&[("x", "X"), ("y", "Y2"), ("x", "X")]);
        for priority in [Priority::Incoming, Priority::Destination] {
            let mut dest = catalog(&[("y", "Y1"), ("z", "Z")]);
            merge(&mut dest, &incoming, priority);
            let once = dest.clone();
            let second = merge(&mut dest, &incoming, priority);
            assert_eq!(dest, once);
            assert!(second.new.is_empty());
        }
    }

    #[test]
    fn untouched_entries_stay_identical() {
        let mut dest = catalog(&[("keep", "Mantener"), ("k", "old")]);
        dest.entries[0].set_fuzzy(true);
        dest.entries[0].comment = "reviewed".into();
        let before = dest.entries[0].clone();

        merge(&mut dest, &catalog(&[("k", "new")]), Priority::Incoming);
        assert_eq!(dest.entries[0], before);
    }

    #[test]
    fn blank_incoming_does_not_erase() {
        let mut dest = catalog(&[("k", "old")]);
        let r = merge(&mut dest, &catalog(&[("k", "")]), Priority::Incoming);
        assert_eq!(r.changed.len(), 1);
        assert_eq!(r.changed[0].new.msgstr, "");
        assert!(!r.changed[0].applied);
        assert_eq!(dest.entries[0].msgstr, "old");
    }

    #[test]
    fn incoming_priority_copies_flags_and_plurals() {
        let mut dest = Catalog::new();
        let mut d = Entry::new("%d day");
        d.msgid_plural = Some("%d days".into());
        d.msgstr_plural.insert(0, "%d día".into());
        d.set_fuzzy(true);
        dest.entries.push(d);

        let mut incoming = Catalog::new();
        let mut i = dest.entries[0].clone();
        i.set_fuzzy(false);
        i.msgstr_plural.insert(1, "%d días".into());
        incoming.entries.push(i);

        let r = preview(&dest, &incoming, Priority::Incoming);
        assert_eq!(r.changed.len(), 1);
        assert!(r.changed[0].old.fuzzy);
        assert!(dest.entries[0].is_fuzzy());

        merge(&mut dest, &incoming, Priority::Incoming);
        assert!(!dest.entries[0].is_fuzzy());
        assert_eq!(dest.entries[0].msgstr_plural.len(), 2);
    }

    #[test]
    fn priority_parses_from_text() {
        assert_eq!("incoming".parse::<Priority>(), Ok(Priority::Incoming));
        assert_eq!("destination".parse::<Priority>(), Ok(Priority::Destination));
        assert!("both".parse::<Priority>().is_err());
    }
}
