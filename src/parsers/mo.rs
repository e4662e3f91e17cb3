//! Binary MO codec.
//!
//! Compiled catalogs are always written little-endian: magic `0x950412de`,
//! revision 0, string count, the two descriptor table offsets and an empty
//! hash table. Both byte orders are accepted when decoding.

use encoding_rs::{Encoding, UTF_8};

use crate::error::{CatalogError, Result};
use crate::model::catalog::Catalog;
use crate::model::entry::Entry;
use crate::parsers::po;
use crate::services::encoding;

pub const MAGIC: u32 = 0x950412de;
const MAGIC_SWAPPED: u32 = 0xde120495;
const HEADER_SIZE: u32 = 28;
const CONTEXT_SEPARATOR: char = '\u{4}';

/// Compiles the translated entries of `catalog`. Fuzzy, untranslated and
/// obsolete entries are left out; the metadata header is stored under the
/// empty key.
pub fn compile(catalog: &Catalog) -> Result<Vec<u8>> {
    let charset = catalog.charset();
    let nplurals = catalog.plural_count();

    let mut messages: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();

    if !catalog.metadata.is_empty() {
        let header = catalog.metadata.to_header_text();
        messages.push((Vec::new(), encoding::encode_text(&header, charset)?));
    }

    for e in &catalog.entries {
        if e.msgid.is_empty() || !e.is_translated(nplurals) {
            continue;
        }
        let key = encoding::encode_text(&message_key(e), charset)?;
        let value = encoding::encode_text(&message_value(e, nplurals), charset)?;
        messages.push((key, value));
    }

    messages.sort_by(|a, b| a.0.cmp(&b.0));
    messages.dedup_by(|later, first| later.0 == first.0);

    let count = messages.len() as u32;
    let orig_table = HEADER_SIZE;
    let trans_table = orig_table + count * 8;
    let strings_start = trans_table + count * 8;

    let mut orig_desc: Vec<(u32, u32)> = Vec::with_capacity(messages.len());
    let mut trans_desc: Vec<(u32, u32)> = Vec::with_capacity(messages.len());
    let mut data: Vec<u8> = Vec::new();

    for (key, _) in &messages {
        orig_desc.push((key.len() as u32, strings_start + data.len() as u32));
        data.extend_from_slice(key);
        data.push(0);
    }
    for (_, value) in &messages {
        trans_desc.push((value.len() as u32, strings_start + data.len() as u32));
        data.extend_from_slice(value);
        data.push(0);
    }

    let mut out = Vec::with_capacity(strings_start as usize + data.len());
    for word in [MAGIC, 0, count, orig_table, trans_table, 0, strings_start] {
        out.extend_from_slice(&word.to_le_bytes());
    }
    for (len, offset) in orig_desc.iter().chain(trans_desc.iter()) {
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&offset.to_le_bytes());
    }
    out.extend_from_slice(&data);

    log::debug!("compiled {} messages into {} bytes", count, out.len());

    Ok(out)
}

fn message_key(e: &Entry) -> String {
    let mut key = String::new();
    if let Some(ctxt) = &e.msgctxt {
        key.push_str(ctxt);
        key.push(CONTEXT_SEPARATOR);
    }
    key.push_str(&e.msgid);
    if let Some(plural) = &e.msgid_plural {
        key.push('\0');
        key.push_str(plural);
    }
    key
}

fn message_value(e: &Entry, nplurals: Option<usize>) -> String {
    if !e.is_plural() {
        return e.msgstr.clone();
    }
    let forms = nplurals.unwrap_or_else(|| e.msgstr_plural.keys().max().map_or(0, |m| m + 1));
    (0..forms)
        .map(|i| e.msgstr_plural.get(&i).map(String::as_str).unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\0")
}

/// Reads a compiled catalog back into the model.
pub fn decode(bytes: &[u8]) -> Result<Catalog> {
    let word = |offset: usize, little: bool| -> Result<u32> {
        let raw: [u8; 4] = bytes
            .get(offset..offset + 4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| CatalogError::Mo(format!("truncated at offset {offset}")))?;
        Ok(if little {
            u32::from_le_bytes(raw)
        } else {
            u32::from_be_bytes(raw)
        })
    };

    let little = match word(0, true)? {
        MAGIC => true,
        MAGIC_SWAPPED => false,
        other => return Err(CatalogError::Mo(format!("bad magic number {other:#010x}"))),
    };

    let count = word(8, little)? as usize;
    let orig_table = word(12, little)? as usize;
    let trans_table = word(16, little)? as usize;

    for table in [orig_table, trans_table] {
        let fits = count
            .checked_mul(8)
            .and_then(|size| size.checked_add(table))
            .is_some_and(|end| end <= bytes.len());
        if !fits {
            return Err(CatalogError::Mo(format!(
                "{count} descriptors at offset {table} exceed the file size"
            )));
        }
    }

    let string_at = |table: usize, i: usize| -> Result<&[u8]> {
        let len = word(table + i * 8, little)? as usize;
        let offset = word(table + i * 8 + 4, little)? as usize;
        bytes
            .get(offset..offset + len)
            .ok_or_else(|| CatalogError::Mo(format!("string {i} out of bounds")))
    };

    let mut raw: Vec<(&[u8], &[u8])> = Vec::with_capacity(count);
    for i in 0..count {
        raw.push((string_at(orig_table, i)?, string_at(trans_table, i)?));
    }

    let header_raw = raw.iter().find(|(k, _)| k.is_empty()).map(|(_, v)| *v);
    let enc = header_raw
        .and_then(encoding::header_charset)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);

    let text = |b: &[u8]| -> Result<String> { decode_str(b, enc) };

    let mut catalog = Catalog::new();
    if let Some(h) = header_raw {
        catalog.metadata = po::parse_header(&text(h)?);
    }

    for (k, v) in raw.iter().filter(|(k, _)| !k.is_empty()) {
        let key = text(*k)?;
        let value = text(*v)?;

        let (msgctxt, rest) = match key.split_once(CONTEXT_SEPARATOR) {
            Some((ctxt, rest)) => (Some(ctxt.to_string()), rest.to_string()),
            None => (None, key),
        };

        let mut entry = Entry::new(String::new());
        entry.msgctxt = msgctxt;
        match rest.split_once('\0') {
            Some((msgid, plural)) => {
                entry.msgid = msgid.to_string();
                entry.msgid_plural = Some(plural.to_string());
                for (i, form) in value.split('\0').enumerate() {
                    entry.msgstr_plural.insert(i, form.to_string());
                }
            }
            None => {
                entry.msgid = rest;
                entry.msgstr = value;
            }
        }
        catalog.entries.push(entry);
    }

    Ok(catalog)
}

fn decode_str(bytes: &[u8], enc: &'static Encoding) -> Result<String> {
    let (text, had_errors) = enc.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(CatalogError::Encoding {
            charset: enc.name().to_string(),
            detail: "invalid byte sequence in compiled string".into(),
        });
    }
    Ok(text.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        let mut c = Catalog::new();
        c.metadata
            .insert("Content-Type", "text/plain; charset=UTF-8");
        c.metadata
            .insert("Plural-Forms", "nplurals=2; plural=(n != 1);");
        c.entries.push(Entry::with_msgstr("b", "B"));
        c.entries.push(Entry::with_msgstr("a", "A"));
        c.entries.push(Entry::new("empty"));
        let mut fuzzy = Entry::with_msgstr("f", "F");
        fuzzy.set_fuzzy(true);
        c.entries.push(fuzzy);
        let mut ctx = Entry::with_msgstr("Open", "Abrir");
        ctx.msgctxt = Some("verb".into());
        c.entries.push(ctx);
        c
    }

    #[test]
    fn header_layout_is_little_endian() {
        let bytes = compile(&catalog()).unwrap();
        assert_eq!(&bytes[0..4], &MAGIC.to_le_bytes());
        assert_eq!(u32::from_le_bytes(bytes[8..12].try_into().unwrap()), 4);
        assert_eq!(u32::from_le_bytes(bytes[12..16].try_into().unwrap()), 28);
        assert_eq!(u32::from_le_bytes(bytes[16..20].try_into().unwrap()), 28 + 32);
    }

    #[test]
    fn originals_are_sorted_and_filtered() {
        let decoded = decode(&compile(&catalog()).unwrap()).unwrap();
        let keys: Vec<_> = decoded.entries.iter().map(|e| e.msgid.as_str()).collect();
        assert_eq!(keys, ["a", "b", "Open"]);
        assert_eq!(decoded.entries[2].msgctxt.as_deref(), Some("verb"));
        assert_eq!(decoded.metadata.get("Plural-Forms"), Some("nplurals=2; plural=(n != 1);"));
    }

    #[test]
    fn big_endian_input_is_accepted() {
        let le = compile(&catalog()).unwrap();
        let mut be = Vec::new();
        let words = (28 + 2 * 8 * 4) / 4;
        for chunk in le[..words * 4].chunks(4) {
            let w = u32::from_le_bytes(chunk.try_into().unwrap());
            be.extend_from_slice(&w.to_be_bytes());
        }
        be.extend_from_slice(&le[words * 4..]);
        let decoded = decode(&be).unwrap();
        assert_eq!(decoded.entries.len(), 3);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(decode(b"nope"), Err(CatalogError::Mo(_))));
        assert!(matches!(decode(&[0u8; 28]), Err(CatalogError::Mo(_))));

        let mut huge = Vec::new();
        for word in [MAGIC, 0, 0x1000_0000, 28, 28, 0, 28] {
            huge.extend_from_slice(&word.to_le_bytes());
        }
        assert!(matches!(decode(&huge), Err(CatalogError::Mo(_))));
    }
}
