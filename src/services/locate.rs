use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::model::catalog::Catalog;
use crate::model::entry::Entry;
use crate::model::settings::{Settings, SourceGroup, SourceRoot};

/// Finds catalog files under the configured locale roots.
#[derive(Debug, Clone, Default)]
pub struct Locator {
    roots: Vec<SourceRoot>,
}

impl Locator {
    pub fn new(roots: Vec<SourceRoot>) -> Self {
        Locator { roots }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Locator::new(settings.roots.clone())
    }

    /// `<root>/<language>/LC_MESSAGES/*.po` for every root in `groups`, sorted
    /// so positional indices stay stable between calls. Missing directories
    /// are skipped.
    pub fn find_catalogs(&self, language: &str, groups: &BTreeSet<SourceGroup>) -> Vec<PathBuf> {
        let mut found: Vec<PathBuf> = Vec::new();

        for root in self.roots.iter().filter(|r| groups.contains(&r.group)) {
            for dir_name in language_dirs(language) {
                let dir = root.path.join(&dir_name).join("LC_MESSAGES");
                let entries = match fs::read_dir(&dir) {
                    Ok(entries) => entries,
                    Err(_) => continue,
                };

                found.extend(
                    entries
                        .flatten()
                        .map(|e| e.path())
                        .filter(|p| p.is_file())
                        .filter(|p| p.extension().is_some_and(|ext| ext == "po")),
                );
            }
        }

        found.sort();
        found.dedup();
        found
    }
}

/// Directory names a language code may appear under: as given, and in
/// locale form (`pt-br` -> `pt_BR`).
fn language_dirs(language: &str) -> Vec<String> {
    let mut dirs = vec![language.to_string()];
    let locale = to_locale(language);
    if locale != language {
        dirs.push(locale);
    }
    dirs
}

pub fn to_locale(language: &str) -> String {
    match language.split_once('-') {
        Some((lang, country)) => {
            let country = if country.len() > 2 {
                let mut c = country.to_string();
                if let Some(first) = c.get_mut(0..1) {
                    first.make_ascii_uppercase();
                }
                c
            } else {
                country.to_ascii_uppercase()
            };
            format!("{}_{}", lang.to_ascii_lowercase(), country)
        }
        None => language.to_ascii_lowercase(),
    }
}

/// The first catalog in `paths` that defines `msgid`, with its entry.
/// Unreadable catalogs are skipped.
pub fn first_defining(paths: &[PathBuf], msgid: &str) -> Result<Option<(PathBuf, Entry)>> {
    for path in paths {
        let catalog = match Catalog::load(path) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("skipping {}: {e}", path.display());
                continue;
            }
        };
        if let Some(entry) = catalog.find(msgid) {
            return Ok(Some((path.clone(), entry.clone())));
        }
    }
    Ok(None)
}

/// Position of `path` in a locator result, for callers that address catalogs
/// by index.
pub fn index_of(paths: &[PathBuf], path: &Path) -> Option<usize> {
    paths.iter().position(|p| p == path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locale_forms() {
        assert_eq!(to_locale("pt-br"), "pt_BR");
        assert_eq!(to_locale("sr-latn"), "sr_Latn");
        assert_eq!(to_locale("es"), "es");
        assert_eq!(language_dirs("es"), ["es"]);
        assert_eq!(language_dirs("pt-br"), ["pt-br", "pt_BR"]);
    }

    #[test]
    fn missing_roots_give_nothing() {
        let locator = Locator::new(vec![SourceRoot {
            group: SourceGroup::Project,
            path: PathBuf::from("/definitely/not/here"),
        }]);
        let groups = BTreeSet::from([SourceGroup::Project]);
        assert!(locator.find_catalogs("es", &groups).is_empty());
    }
}
