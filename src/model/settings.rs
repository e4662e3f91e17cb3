use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Result};

fn default_messages_per_page() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_native_language_code() -> String {
    "en".to_string()
}

fn default_format_checker() -> Option<String> {
    Some("msgfmt".to_string())
}

fn default_translated_using() -> String {
    format!("transhette-core {}", env!("CARGO_PKG_VERSION"))
}

/// Which family of catalogs a locale root belongs to.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceGroup {
    Project,
    Framework,
    Own,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SourceRoot {
    pub group: SourceGroup,
    pub path: PathBuf,
}

/// How the host reloads translations after a save. Carried for callers only.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AutoReloadMethod {
    #[default]
    Test,
    Apache2,
    Httpd,
    Wsgi,
    RestartScript(String),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
    #[serde(default = "default_messages_per_page")]
    pub messages_per_page: usize,

    #[serde(default = "default_true")]
    pub enable_suggestions: bool,

    #[serde(default)]
    pub search_occurrences: bool,

    #[serde(default)]
    pub include_django_catalogs: bool,

    #[serde(default = "default_true")]
    pub include_own_catalogs: bool,

    #[serde(default)]
    pub show_native_language: bool,

    #[serde(default = "default_native_language_code")]
    pub native_language_code: String,

    #[serde(default)]
    pub auto_reload_method: AutoReloadMethod,

    /// External checker binary; `None` selects the built-in check.
    #[serde(default = "default_format_checker")]
    pub format_checker: Option<String>,

    #[serde(default = "default_translated_using")]
    pub translated_using: String,

    #[serde(default)]
    pub roots: Vec<SourceRoot>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            messages_per_page: default_messages_per_page(),
            enable_suggestions: true,
            search_occurrences: false,
            include_django_catalogs: false,
            include_own_catalogs: true,
            show_native_language: false,
            native_language_code: default_native_language_code(),
            auto_reload_method: AutoReloadMethod::default(),
            format_checker: default_format_checker(),
            translated_using: default_translated_using(),
            roots: Vec::new(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path).map_err(|e| CatalogError::io(path, e))?;
        serde_json::from_str(&data).map_err(|source| CatalogError::Settings {
            path: path.display().to_string(),
            source,
        })
    }

    /// Groups to search by default: project catalogs always, framework and
    /// own catalogs when enabled.
    pub fn source_groups(&self) -> BTreeSet<SourceGroup> {
        let mut groups = BTreeSet::new();
        groups.insert(SourceGroup::Project);
        if self.include_django_catalogs {
            groups.insert(SourceGroup::Framework);
        }
        if self.include_own_catalogs {
            groups.insert(SourceGroup::Own);
        }
        groups
    }
}
