use crate::model::catalog::Catalog;
use crate::model::entry::Entry;

/// Read-only message lookup. Callers pick the variant explicitly: a loaded
/// catalog, or [`NullCatalog`] when there is nothing to consult.
pub trait CatalogLookup {
    fn find(&self, msgid: &str) -> Option<&Entry>;

    fn entries(&self) -> &[Entry];

    /// The translation of `msgid`, or `msgid` itself when none exists.
    fn gettext<'a>(&'a self, msgid: &'a str) -> &'a str {
        match self.find(msgid) {
            Some(e) if !e.is_fuzzy() && !e.msgstr.is_empty() => &e.msgstr,
            _ => msgid,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ActiveCatalog<'a> {
    catalog: &'a Catalog,
}

impl<'a> ActiveCatalog<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        ActiveCatalog { catalog }
    }
}

impl CatalogLookup for ActiveCatalog<'_> {
    fn find(&self, msgid: &str) -> Option<&Entry> {
        self.catalog.find(msgid)
    }

    fn entries(&self) -> &[Entry] {
        &self.catalog.entries
    }
}

/// Never finds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCatalog;

impl CatalogLookup for NullCatalog {
    fn find(&self, _msgid: &str) -> Option<&Entry> {
        None
    }

    fn entries(&self) -> &[Entry] {
        &[]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_and_null_lookups() {
        let mut c = Catalog::new();
        c.entries.push(Entry::with_msgstr("Save", "Guardar"));
        let mut fuzzy = Entry::with_msgstr("Load", "Cargar");
        fuzzy.set_fuzzy(true);
        c.entries.push(fuzzy);

        let active = ActiveCatalog::new(&c);
        assert_eq!(active.gettext("Save"), "Guardar");
        assert_eq!(active.gettext("Load"), "Load");
        assert_eq!(active.gettext("Quit"), "Quit");
        assert_eq!(active.entries().len(), 2);

        let null = NullCatalog;
        assert!(null.find("Save").is_none());
        assert_eq!(null.gettext("Save"), "Save");
        assert!(null.entries().is_empty());
    }
}
