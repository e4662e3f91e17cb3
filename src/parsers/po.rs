//! PO text codec.
//!
//! `parse` builds a [`Catalog`] from PO text; `serialize` writes it back. The
//! first `msgid ""` entry without a context is the header and becomes
//! [`Catalog::metadata`] instead of a regular entry.

use crate::error::{CatalogError, Result};
use crate::model::catalog::{Catalog, Metadata};
use crate::model::entry::{Entry, Occurrence};

const WRAP_WIDTH: usize = 79;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Context,
    Id,
    IdPlural,
    Str,
    StrPlural(usize),
}

#[derive(Default)]
struct Pending {
    entry: Entry,
    comments: Vec<String>,
    extracted: Vec<String>,
    has_msgid: bool,
    has_msgstr: bool,
    field: Option<Field>,
    start_line: usize,
}

impl Pending {
    fn is_empty(&self) -> bool {
        !self.has_msgid
            && self.entry.msgctxt.is_none()
            && self.comments.is_empty()
            && self.extracted.is_empty()
            && self.entry.flags.is_empty()
            && self.entry.occurrences.is_empty()
            && self.entry.previous.is_empty()
    }
}

struct Parser {
    catalog: Catalog,
    pending: Pending,
    header_seen: bool,
}

pub fn parse(text: &str) -> Result<Catalog> {
    let mut p = Parser {
        catalog: Catalog::new(),
        pending: Pending::default(),
        header_seen: false,
    };

    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    for (i, raw) in text.lines().enumerate() {
        let ln = i + 1;
        let line = raw.trim();

        if line.is_empty() {
            // A comment-only block stays attached to the next entry.
            if p.pending.has_msgid {
                p.finish()?;
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("#~") {
            let rest = rest.trim_start();
            if rest.is_empty() {
                continue;
            }
            if let Some(prev) = rest.strip_prefix('|') {
                p.comment_line(ln)?;
                p.pending.entry.previous.push(prev.trim_start().to_string());
            } else {
                p.keyword_line(rest, ln)?;
            }
            p.pending.entry.obsolete = true;
            continue;
        }

        if let Some(rest) = line.strip_prefix('#') {
            p.comment_line(ln)?;
            p.comment(rest, ln)?;
            continue;
        }

        p.keyword_line(line, ln)?;
    }

    if p.pending.has_msgid {
        p.finish()?;
    } else if !p.pending.is_empty() {
        log::debug!("dropping trailing comment block without an entry");
    }

    log::debug!(
        "parsed catalog: {} entries, {} header keys",
        p.catalog.entries.len(),
        p.catalog.metadata.len()
    );

    Ok(p.catalog)
}

impl Parser {
    /// A comment after a complete msgstr opens the next entry.
    fn comment_line(&mut self, ln: usize) -> Result<()> {
        if self.pending.has_msgstr {
            self.finish()?;
        }
        if self.pending.is_empty() {
            self.pending.start_line = ln;
        }
        Ok(())
    }

    fn comment(&mut self, rest: &str, ln: usize) -> Result<()> {
        let entry = &mut self.pending.entry;
        match rest.chars().next() {
            None => self.pending.comments.push(String::new()),
            Some(' ') | Some('\t') => self.pending.comments.push(rest[1..].to_string()),
            Some(',') => {
                for flag in rest[1..].split(',').map(str::trim).filter(|f| !f.is_empty()) {
                    entry.flags.insert(flag.to_string());
                }
            }
            Some(':') => {
                entry
                    .occurrences
                    .extend(rest[1..].split_whitespace().map(Occurrence::parse));
            }
            Some('.') => {
                let text = rest[1..].strip_prefix(' ').unwrap_or(&rest[1..]);
                self.pending.extracted.push(text.to_string());
            }
            Some('|') => entry.previous.push(rest[1..].trim_start().to_string()),
            Some(other) => {
                return Err(CatalogError::format(
                    ln,
                    format!("malformed comment prefix '#{other}'"),
                ))
            }
        }
        Ok(())
    }

    fn keyword_line(&mut self, line: &str, ln: usize) -> Result<()> {
        if line.starts_with('"') {
            let value = parse_quoted(line, ln)?;
            return match self.pending.field {
                Some(field) => {
                    self.append(field, &value);
                    Ok(())
                }
                None => Err(CatalogError::format(ln, "string without a keyword")),
            };
        }

        let (keyword, rest) = match line.find(char::is_whitespace) {
            Some(pos) => (&line[..pos], line[pos..].trim_start()),
            None => (line, ""),
        };
        if !rest.starts_with('"') {
            return Err(CatalogError::format(
                ln,
                format!("keyword '{keyword}' must be followed by a string"),
            ));
        }
        let value = parse_quoted(rest, ln)?;

        let field = match keyword {
            "msgctxt" => {
                if self.pending.has_msgstr {
                    self.finish()?;
                }
                if self.pending.has_msgid {
                    return Err(CatalogError::format(ln, "msgctxt after msgid"));
                }
                if self.pending.is_empty() {
                    self.pending.start_line = ln;
                }
                Field::Context
            }
            "msgid" => {
                if self.pending.has_msgstr {
                    self.finish()?;
                }
                if self.pending.has_msgid {
                    return Err(CatalogError::format(ln, "msgid without a preceding msgstr"));
                }
                if self.pending.is_empty() {
                    self.pending.start_line = ln;
                }
                self.pending.has_msgid = true;
                Field::Id
            }
            "msgid_plural" => {
                if !self.pending.has_msgid || self.pending.has_msgstr {
                    return Err(CatalogError::format(ln, "msgid_plural must follow msgid"));
                }
                Field::IdPlural
            }
            "msgstr" => {
                if !self.pending.has_msgid {
                    return Err(CatalogError::format(ln, "msgstr without msgid"));
                }
                if self.pending.entry.msgid_plural.is_some() {
                    return Err(CatalogError::format(ln, "plural entry requires msgstr[n]"));
                }
                if self.pending.has_msgstr {
                    return Err(CatalogError::format(ln, "duplicate msgstr"));
                }
                self.pending.has_msgstr = true;
                Field::Str
            }
            kw if kw.starts_with("msgstr[") => {
                let index = kw["msgstr[".len()..]
                    .strip_suffix(']')
                    .and_then(|n| n.parse::<usize>().ok())
                    .ok_or_else(|| CatalogError::format(ln, format!("bad plural keyword '{kw}'")))?;
                if !self.pending.has_msgid {
                    return Err(CatalogError::format(ln, "msgstr without msgid"));
                }
                if self.pending.entry.msgid_plural.is_none() {
                    return Err(CatalogError::format(ln, "msgstr[n] on an entry without msgid_plural"));
                }
                self.pending.has_msgstr = true;
                Field::StrPlural(index)
            }
            other => {
                return Err(CatalogError::format(ln, format!("unknown keyword '{other}'")));
            }
        };

        self.pending.field = Some(field);
        self.start(field);
        self.append(field, &value);
        Ok(())
    }

    fn start(&mut self, field: Field) {
        let e = &mut self.pending.entry;
        match field {
            Field::Context => e.msgctxt = Some(String::new()),
            Field::Id => e.msgid.clear(),
            Field::IdPlural => e.msgid_plural = Some(String::new()),
            Field::Str => e.msgstr.clear(),
            Field::StrPlural(i) => {
                e.msgstr_plural.insert(i, String::new());
            }
        }
    }

    fn append(&mut self, field: Field, value: &str) {
        let e = &mut self.pending.entry;
        let target = match field {
            Field::Context => e.msgctxt.get_or_insert_with(String::new),
            Field::Id => &mut e.msgid,
            Field::IdPlural => e.msgid_plural.get_or_insert_with(String::new),
            Field::Str => &mut e.msgstr,
            Field::StrPlural(i) => e.msgstr_plural.entry(i).or_default(),
        };
        target.push_str(value);
    }

    fn finish(&mut self) -> Result<()> {
        let pending = std::mem::take(&mut self.pending);
        if !pending.has_msgstr {
            return Err(CatalogError::format(
                pending.start_line,
                format!("entry '{}' has no msgstr", pending.entry.msgid),
            ));
        }

        let mut entry = pending.entry;
        entry.comment = pending.comments.join("\n");
        entry.extracted_comment = pending.extracted.join("\n");

        let is_header = !self.header_seen
            && self.catalog.entries.is_empty()
            && entry.msgid.is_empty()
            && entry.msgctxt.is_none()
            && !entry.obsolete;

        if is_header {
            self.header_seen = true;
            self.catalog.metadata = parse_header(&entry.msgstr);
            self.catalog.header_comment = entry.comment;
            self.catalog.header_flags = entry.flags;
        } else {
            self.catalog.entries.push(entry);
        }
        Ok(())
    }
}

pub(crate) fn parse_header(body: &str) -> Metadata {
    let mut metadata = Metadata::new();
    for line in body.split('\n').filter(|l| !l.trim().is_empty()) {
        match line.split_once(':') {
            Some((key, value)) => metadata.insert(key.trim(), value.trim()),
            None => log::warn!("ignoring header line without a key: {line:?}"),
        }
    }
    metadata
}

fn parse_quoted(s: &str, ln: usize) -> Result<String> {
    let mut chars = s.chars();
    if chars.next() != Some('"') {
        return Err(CatalogError::format(ln, "expected a quoted string"));
    }

    let mut out = String::new();
    loop {
        match chars.next() {
            None => return Err(CatalogError::format(ln, "unterminated string")),
            Some('"') => break,
            Some('\\') => {
                let decoded = match chars.next() {
                    Some('n') => '\n',
                    Some('t') => '\t',
                    Some('r') => '\r',
                    Some('"') => '"',
                    Some('\\') => '\\',
                    Some('a') => '\u{7}',
                    Some('b') => '\u{8}',
                    Some('f') => '\u{c}',
                    Some('v') => '\u{b}',
                    Some(other) => {
                        return Err(CatalogError::format(
                            ln,
                            format!("unknown escape sequence '\\{other}'"),
                        ))
                    }
                    None => return Err(CatalogError::format(ln, "unterminated string")),
                };
                out.push(decoded);
            }
            Some(c) => out.push(c),
        }
    }

    if !chars.as_str().trim().is_empty() {
        return Err(CatalogError::format(ln, "unexpected text after closing quote"));
    }

    Ok(out)
}

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\u{7}' => out.push_str("\\a"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\u{b}' => out.push_str("\\v"),
            c => out.push(c),
        }
    }
    out
}

struct Writer {
    out: String,
    lines: usize,
}

impl Writer {
    fn line(&mut self, s: &str) {
        self.out.push_str(s);
        self.out.push('\n');
        self.lines += 1;
    }

    fn next_line(&self) -> usize {
        self.lines + 1
    }

    fn comments(&mut self, marker: &str, text: &str) {
        if text.is_empty() {
            return;
        }
        for l in text.split('\n') {
            if l.is_empty() {
                self.line(marker.trim_end());
            } else {
                self.line(&format!("{marker}{l}"));
            }
        }
    }

    fn flags<'a>(&mut self, flags: impl IntoIterator<Item = &'a String>) {
        let list: Vec<&str> = flags.into_iter().map(String::as_str).collect();
        if !list.is_empty() {
            self.line(&format!("#, {}", list.join(", ")));
        }
    }

    fn occurrences(&mut self, occurrences: &[Occurrence]) {
        let mut current = String::from("#:");
        for occ in occurrences {
            let token = occ.to_string();
            if current.len() > 2 && current.len() + 1 + token.len() > WRAP_WIDTH {
                self.line(&current);
                current = String::from("#:");
            }
            current.push(' ');
            current.push_str(&token);
        }
        if current.len() > 2 {
            self.line(&current);
        }
    }

    fn field(&mut self, prefix: &str, keyword: &str, value: &str) {
        let segments: Vec<&str> = value.split_inclusive('\n').collect();
        if segments.len() <= 1 {
            self.line(&format!("{prefix}{keyword} \"{}\"", escape(value)));
            return;
        }
        self.block(prefix, keyword, &segments);
    }

    /// `keyword ""` followed by one quoted line per segment.
    fn block(&mut self, prefix: &str, keyword: &str, segments: &[&str]) {
        self.line(&format!("{prefix}{keyword} \"\""));
        for seg in segments {
            self.line(&format!("{prefix}\"{}\"", escape(seg)));
        }
    }
}

pub fn serialize(catalog: &Catalog) -> String {
    serialize_with_lines(catalog).0
}

/// Serializes and also returns, for each entry, the 1-based line number of
/// its first msgstr keyword.
pub fn serialize_with_lines(catalog: &Catalog) -> (String, Vec<usize>) {
    let mut w = Writer {
        out: String::new(),
        lines: 0,
    };
    let mut msgstr_lines = Vec::with_capacity(catalog.entries.len());
    let nplurals = catalog.plural_count();

    let has_header = !catalog.metadata.is_empty()
        || !catalog.header_comment.is_empty()
        || !catalog.header_flags.is_empty();

    if has_header {
        w.comments("# ", &catalog.header_comment);
        w.flags(&catalog.header_flags);
        w.line("msgid \"\"");
        let header = catalog.metadata.to_header_text();
        let segments: Vec<&str> = header.split_inclusive('\n').collect();
        w.block("", "msgstr", &segments);
    }

    for (i, e) in catalog.entries.iter().enumerate() {
        if has_header || i > 0 {
            w.line("");
        }

        w.comments("# ", &e.comment);
        w.comments("#. ", &e.extracted_comment);
        w.occurrences(&e.occurrences);
        w.flags(&e.flags);

        let prefix = if e.obsolete { "#~ " } else { "" };
        let previous_marker = if e.obsolete { "#~|" } else { "#|" };
        for prev in &e.previous {
            w.line(&format!("{previous_marker} {prev}"));
        }

        if let Some(ctxt) = &e.msgctxt {
            w.field(prefix, "msgctxt", ctxt);
        }
        w.field(prefix, "msgid", &e.msgid);

        match &e.msgid_plural {
            Some(plural) => {
                w.field(prefix, "msgid_plural", plural);
                msgstr_lines.push(w.next_line());
                if e.msgstr_plural.is_empty() {
                    for idx in 0..nplurals.unwrap_or(2) {
                        w.field(prefix, &format!("msgstr[{idx}]"), "");
                    }
                }
                for (idx, text) in &e.msgstr_plural {
                    w.field(prefix, &format!("msgstr[{idx}]"), text);
                }
            }
            None => {
                msgstr_lines.push(w.next_line());
                w.field(prefix, "msgstr", &e.msgstr);
            }
        }
    }

    (w.out, msgstr_lines)
}
