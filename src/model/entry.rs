use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

pub const FUZZY: &str = "fuzzy";

/// A `#:` reference to where a msgid is used in source code.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub file: String,

    #[serde(default)]
    pub line: Option<u32>,
}

impl Occurrence {
    pub fn new(file: impl Into<String>, line: Option<u32>) -> Self {
        Occurrence {
            file: file.into(),
            line,
        }
    }

    /// Parses one `file:line` token. A token whose suffix is not a number is a
    /// bare file reference.
    pub fn parse(token: &str) -> Self {
        match token.rsplit_once(':') {
            Some((file, line)) if !file.is_empty() => match line.parse::<u32>() {
                Ok(n) => Occurrence::new(file, Some(n)),
                Err(_) => Occurrence::new(token, None),
            },
            _ => Occurrence::new(token, None),
        }
    }
}

impl fmt::Display for Occurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}", self.file, line),
            None => f.write_str(&self.file),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Entry {
    #[serde(default)]
    pub msgctxt: Option<String>,

    pub msgid: String,

    #[serde(default)]
    pub msgid_plural: Option<String>,

    #[serde(default)]
    pub msgstr: String,

    #[serde(default)]
    pub msgstr_plural: BTreeMap<usize, String>,

    #[serde(default)]
    pub flags: BTreeSet<String>,

    #[serde(default)]
    pub occurrences: Vec<Occurrence>,

    #[serde(default)]
    pub comment: String,

    #[serde(default)]
    pub extracted_comment: String,

    // Raw `#|` payloads, written back untouched.
    #[serde(default)]
    pub previous: Vec<String>,

    #[serde(default)]
    pub obsolete: bool,
}

impl Entry {
    pub fn new(msgid: impl Into<String>) -> Self {
        Entry {
            msgid: msgid.into(),
            ..Entry::default()
        }
    }

    pub fn with_msgstr(msgid: impl Into<String>, msgstr: impl Into<String>) -> Self {
        Entry {
            msgstr: msgstr.into(),
            ..Entry::new(msgid)
        }
    }

    pub fn is_plural(&self) -> bool {
        self.msgid_plural.is_some()
    }

    pub fn is_fuzzy(&self) -> bool {
        self.flags.contains(FUZZY)
    }

    pub fn set_fuzzy(&mut self, fuzzy: bool) {
        if fuzzy {
            self.flags.insert(FUZZY.to_string());
        } else {
            self.flags.remove(FUZZY);
        }
    }

    /// True when every translation slot this entry needs is filled.
    ///
    /// `nplurals` is the catalog's plural-form count; when unknown the slots
    /// already present are what is required. Fuzzy and obsolete entries are
    /// never translated.
    pub fn is_translated(&self, nplurals: Option<usize>) -> bool {
        if self.obsolete || self.is_fuzzy() {
            return false;
        }
        self.has_translation(nplurals)
    }

    /// Translation content check that ignores flags.
    pub fn has_translation(&self, nplurals: Option<usize>) -> bool {
        if !self.is_plural() {
            return !self.msgstr.is_empty();
        }

        match nplurals {
            Some(n) if n > 0 => (0..n).all(|i| {
                self.msgstr_plural
                    .get(&i)
                    .map(|s| !s.is_empty())
                    .unwrap_or(false)
            }),
            _ => {
                !self.msgstr_plural.is_empty()
                    && self.msgstr_plural.values().all(|s| !s.is_empty())
            }
        }
    }

    /// True when this entry carries no translated text at all.
    pub fn is_blank(&self) -> bool {
        self.msgstr.is_empty() && self.msgstr_plural.values().all(|s| s.is_empty())
    }

    pub fn same_translation(&self, other: &Entry) -> bool {
        self.msgstr == other.msgstr && self.msgstr_plural == other.msgstr_plural
    }

    /// Stores an edited singular translation and clears the fuzzy flag.
    pub fn apply_translation(&mut self, text: &str) {
        self.msgstr = pair_newlines(&self.msgid, text);
        self.set_fuzzy(false);
    }

    /// Stores an edited plural form. Form 0 pairs newlines against the msgid,
    /// every other form against msgid_plural.
    pub fn apply_plural_translation(&mut self, index: usize, text: &str) {
        let source = if index == 0 {
            self.msgid.as_str()
        } else {
            self.msgid_plural.as_deref().unwrap_or(&self.msgid)
        };
        let fixed = pair_newlines(source, text);
        self.msgstr_plural.insert(index, fixed);
        self.set_fuzzy(false);
    }
}

/// Makes leading and trailing newlines of a submitted translation match the
/// source string, and drops carriage returns the source never had.
pub fn pair_newlines(source: &str, translated: &str) -> String {
    if source.is_empty() || translated.is_empty() {
        return translated.to_string();
    }

    let mut out = if translated.contains('\r') && !source.contains('\r') {
        translated.replace('\r', "")
    } else {
        translated.to_string()
    };

    if out.is_empty() {
        return out;
    }

    if source.starts_with('\n') && !out.starts_with('\n') {
        out.insert(0, '\n');
    } else if !source.starts_with('\n') && out.starts_with('\n') {
        out = out.trim_start().to_string();
    }

    if source.ends_with('\n') && !out.ends_with('\n') {
        out.push('\n');
    } else if !source.ends_with('\n') && out.ends_with('\n') {
        out = out.trim_end().to_string();
    }

    out
}
