use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::{CatalogError, Result};
use crate::model::entry::Entry;
use crate::parsers::{mo, po};
use crate::services::encoding;
use crate::services::validate::Validator;

/// Header key/value pairs in file order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Metadata {
    pairs: Vec<(String, String)>,
}

impl Metadata {
    pub fn new() -> Self {
        Metadata::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replaces the value in place, or appends a new key at the end.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.pairs.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.pairs.iter().position(|(k, _)| k == key)?;
        Some(self.pairs.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// The header msgstr body: one `Key: Value\n` line per pair.
    pub fn to_header_text(&self) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| format!("{k}: {v}\n"))
            .collect()
    }
}

impl Serialize for Metadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.pairs.len()))?;
        for (k, v) in &self.pairs {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryFilter {
    #[default]
    #[serde(alias = "both")]
    All,
    Translated,
    Untranslated,
    Fuzzy,
}

impl EntryFilter {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all" | "both" => Some(EntryFilter::All),
            "translated" => Some(EntryFilter::Translated),
            "untranslated" => Some(EntryFilter::Untranslated),
            "fuzzy" => Some(EntryFilter::Fuzzy),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Catalog {
    pub entries: Vec<Entry>,

    pub metadata: Metadata,
    pub header_comment: String,
    pub header_flags: BTreeSet<String>,
    pub path: Option<PathBuf>,
    pub encoding: Option<String>,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog::default()
    }

    pub fn parse(text: &str) -> Result<Self> {
        po::parse(text)
    }

    /// Reads a PO file, decoding it with the charset its header declares.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| CatalogError::io(path, e))?;
        let (text, encoding) = encoding::decode_catalog(&bytes)?;

        let mut catalog = po::parse(&text)?;
        catalog.path = Some(path.to_path_buf());
        catalog.encoding = Some(encoding.name().to_string());

        log::debug!(
            "loaded {} ({} entries, {})",
            path.display(),
            catalog.entries.len(),
            encoding.name()
        );

        Ok(catalog)
    }

    /// First live entry with this msgid.
    pub fn find(&self, msgid: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| !e.obsolete && e.msgid == msgid)
    }

    pub fn find_mut(&mut self, msgid: &str) -> Option<&mut Entry> {
        self.entries
            .iter_mut()
            .find(|e| !e.obsolete && e.msgid == msgid)
    }

    pub fn position(&self, msgid: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| !e.obsolete && e.msgid == msgid)
    }

    /// `nplurals` from the `Plural-Forms` header.
    pub fn plural_count(&self) -> Option<usize> {
        let forms = self.metadata.get("Plural-Forms")?;
        forms.split(';').find_map(|part| {
            let (key, value) = part.split_once('=')?;
            if key.trim() == "nplurals" {
                value.trim().parse().ok()
            } else {
                None
            }
        })
    }

    /// Charset declared by the `Content-Type` header.
    pub fn charset(&self) -> Option<&str> {
        let content_type = self.metadata.get("Content-Type")?;
        let idx = content_type.find("charset=")?;
        let rest = &content_type[idx + "charset=".len()..];
        let charset = rest.split(';').next().unwrap_or("").trim();
        if charset.is_empty() {
            None
        } else {
            Some(charset)
        }
    }

    pub fn translated_entries(&self) -> Vec<&Entry> {
        let n = self.plural_count();
        self.entries.iter().filter(|e| e.is_translated(n)).collect()
    }

    pub fn untranslated_entries(&self) -> Vec<&Entry> {
        let n = self.plural_count();
        self.entries
            .iter()
            .filter(|e| !e.obsolete && !e.is_fuzzy() && !e.is_translated(n))
            .collect()
    }

    pub fn fuzzy_entries(&self) -> Vec<&Entry> {
        self.entries
            .iter()
            .filter(|e| !e.obsolete && e.is_fuzzy())
            .collect()
    }

    pub fn obsolete_entries(&self) -> Vec<&Entry> {
        self.entries.iter().filter(|e| e.obsolete).collect()
    }

    /// Entries matching `filter` paired with their position in the catalog.
    /// The position is what callers use to address an entry in later edits.
    pub fn filtered(&self, filter: EntryFilter) -> Vec<(usize, &Entry)> {
        let n = self.plural_count();
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.obsolete)
            .filter(|(_, e)| match filter {
                EntryFilter::All => true,
                EntryFilter::Translated => e.is_translated(n),
                EntryFilter::Untranslated => !e.is_fuzzy() && !e.is_translated(n),
                EntryFilter::Fuzzy => e.is_fuzzy(),
            })
            .collect()
    }

    pub fn percent_translated(&self) -> u32 {
        let total = self.entries.iter().filter(|e| !e.obsolete).count();
        if total == 0 {
            return 100;
        }
        let done = self.translated_entries().len();
        ((done as f64 / total as f64) * 100.0).round() as u32
    }

    /// Records who last touched the catalog and when.
    pub fn stamp_revision(&mut self, translator: &str, tool: &str) {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M%z").to_string();
        self.metadata.insert("Last-Translator", translator);
        self.metadata.insert("X-Translated-Using", tool);
        self.metadata.insert("PO-Revision-Date", now);
    }

    pub fn to_po_string(&self) -> String {
        po::serialize(self)
    }

    /// SHA-256 of the serialized catalog, hex encoded.
    pub fn fingerprint(&self) -> String {
        fingerprint_bytes(self.to_po_string().as_bytes())
    }

    pub fn save(&self) -> Result<()> {
        let path = self.path.as_deref().ok_or_else(|| CatalogError::Io {
            path: "<unsaved catalog>".into(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "catalog has no path"),
        })?;
        self.save_as(path)
    }

    pub fn save_as(&self, path: &Path) -> Result<()> {
        let text = self.to_po_string();
        let bytes = encoding::encode_text(&text, self.charset())?;
        write_atomic(path, &bytes)?;
        log::debug!("saved {} ({} entries)", path.display(), self.entries.len());
        Ok(())
    }

    /// Saves only when the validator reports no issues.
    pub fn save_checked(&self, validator: &Validator) -> Result<()> {
        let issues = validator.validate(self)?;
        if !issues.is_empty() {
            return Err(CatalogError::Invalid(issues));
        }
        self.save()
    }

    pub fn compile(&self) -> Result<Vec<u8>> {
        mo::compile(self)
    }

    pub fn compile_to(&self, path: &Path) -> Result<()> {
        let bytes = self.compile()?;
        write_atomic(path, &bytes)
    }

    /// The `.mo` file that sits next to this catalog's `.po` file.
    pub fn mo_path(&self) -> Option<PathBuf> {
        self.path.as_ref().map(|p| p.with_extension("mo"))
    }
}

pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = tmp_path(path);

    if let Some(parent) = tmp.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| CatalogError::io(parent, e))?;
        }
    }

    fs::write(&tmp, bytes).map_err(|e| CatalogError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| CatalogError::io(path, e))?;

    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut p = path.to_path_buf();
    let file_name = match path.file_name().and_then(|s| s.to_str()) {
        Some(n) => n.to_string(),
        None => "catalog".to_string(),
    };
    p.set_file_name(format!("{file_name}.tmp"));
    p
}
