use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use transhette_core::error::CatalogError;
use transhette_core::parsers::mo;
use transhette_core::services::freshness::Snapshot;
use transhette_core::{Catalog, Entry, Locator, SourceGroup, SourceRoot, Validator};

const TWO_ENTRIES: &str = r#"msgid ""
msgstr ""
"Content-Type: text/plain; charset=UTF-8\n"
"Plural-Forms: nplurals=2; plural=(n != 1);\n"

#: app/views.py:10
msgid "Hello"
msgstr "Hola"

#: app/views.py:12
msgid "World"
msgstr ""
"#;

fn write(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn load_save_round_trip_keeps_bytes() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "django.po", TWO_ENTRIES.as_bytes());

    let catalog = Catalog::load(&path).unwrap();
    catalog.save().unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), TWO_ENTRIES);
}

#[test]
fn translated_and_untranslated_views() {
    let catalog = Catalog::parse(TWO_ENTRIES).unwrap();

    let translated: Vec<&str> = catalog.translated_entries().iter().map(|e| e.msgid.as_str()).collect();
    let untranslated: Vec<&str> = catalog.untranslated_entries().iter().map(|e| e.msgid.as_str()).collect();

    assert_eq!(translated, ["Hello"]);
    assert_eq!(untranslated, ["World"]);
    assert_eq!(catalog.percent_translated(), 50);
}

#[test]
fn latin1_catalog_is_saved_in_its_declared_charset() {
    let dir = TempDir::new().unwrap();
    let text = "msgid \"\"\nmsgstr \"\"\n\"Content-Type: text/plain; charset=ISO-8859-1\\n\"\n\nmsgid \"Year\"\nmsgstr \"A\u{f1}o\"\n";
    let (encoded, _, _) = encoding_rs::WINDOWS_1252.encode(text);
    let path = write(dir.path(), "latin.po", &encoded);

    let mut catalog = Catalog::load(&path).unwrap();
    assert_eq!(catalog.find("Year").unwrap().msgstr, "A\u{f1}o");

    if let Some(e) = catalog.find_mut("Year") {
        e.apply_translation("A\u{f1}os");
    }
    catalog.save().unwrap();

    let raw = fs::read(&path).unwrap();
    assert!(std::str::from_utf8(&raw).is_err());
    assert!(raw.windows(4).any(|w| w == b"A\xf1os"));
    assert_eq!(Catalog::load(&path).unwrap().find("Year").unwrap().msgstr, "A\u{f1}os");
}

#[test]
fn plural_entry_compiles_and_reparses() {
    let dir = TempDir::new().unwrap();
    let text = r#"msgid ""
msgstr ""
"Content-Type: text/plain; charset=UTF-8\n"
"Plural-Forms: nplurals=2; plural=(n != 1);\n"

msgid "%d file"
msgid_plural "%d files"
msgstr[0] "%d archivo"
msgstr[1] "%d archivos"
"#;
    let path = write(dir.path(), "es/LC_MESSAGES/django.po", text.as_bytes());

    let catalog = Catalog::load(&path).unwrap();
    let mo_path = catalog.mo_path().unwrap();
    catalog.compile_to(&mo_path).unwrap();

    let decoded = mo::decode(&fs::read(&mo_path).unwrap()).unwrap();
    let entry = decoded.find("%d file").unwrap();
    assert_eq!(entry.msgid_plural.as_deref(), Some("%d files"));
    assert_eq!(entry.msgstr_plural.get(&1).map(String::as_str), Some("%d archivos"));
    assert_eq!(decoded.plural_count(), Some(2));

    let reparsed = Catalog::parse(&catalog.to_po_string()).unwrap();
    assert_eq!(reparsed.entries, catalog.entries);
}

#[test]
fn fuzzy_and_empty_entries_are_not_compiled() {
    let mut catalog = Catalog::parse(TWO_ENTRIES).unwrap();
    let mut fuzzy = Entry::with_msgstr("Maybe", "Quiz\u{e1}s");
    fuzzy.set_fuzzy(true);
    catalog.entries.push(fuzzy);

    let decoded = mo::decode(&catalog.compile().unwrap()).unwrap();
    let ids: Vec<&str> = decoded.entries.iter().map(|e| e.msgid.as_str()).collect();

    assert_eq!(ids, ["Hello"]);
}

#[test]
fn format_mismatch_points_at_the_msgstr_line() {
    let text = r#"msgid ""
msgstr ""
"Content-Type: text/plain; charset=UTF-8\n"

#, python-format
msgid "Hello %s"
msgstr "Hola"
"#;
    let catalog = Catalog::parse(text).unwrap();
    let issues = Validator::internal().validate(&catalog).unwrap();

    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].code, "FORMAT_MISMATCH");
    assert_eq!(issues[0].line, Some(7));
    assert_eq!(issues[0].source_line.as_deref(), Some("msgstr \"Hola\""));
}

#[test]
fn invalid_catalog_is_not_saved() {
    let dir = TempDir::new().unwrap();
    let original = "#, python-format\nmsgid \"%s items\"\nmsgstr \"%s elementos\"\n";
    let path = write(dir.path(), "django.po", original.as_bytes());

    let mut catalog = Catalog::load(&path).unwrap();
    if let Some(e) = catalog.find_mut("%s items") {
        e.apply_translation("elementos");
    }

    let err = catalog.save_checked(&Validator::internal()).unwrap_err();
    assert!(matches!(err, CatalogError::Invalid(ref issues) if issues.len() == 1));
    assert_eq!(fs::read_to_string(&path).unwrap(), original);
}

#[test]
fn locator_orders_catalogs_and_skips_missing_roots() {
    let dir = TempDir::new().unwrap();
    let project = dir.path().join("project/locale");
    let framework = dir.path().join("framework/locale");
    write(&project, "pt_BR/LC_MESSAGES/djangojs.po", b"");
    write(&project, "pt_BR/LC_MESSAGES/django.po", b"");
    write(&project, "pt_BR/LC_MESSAGES/django.mo", b"");
    write(&framework, "pt-br/LC_MESSAGES/django.po", b"");

    let locator = Locator::new(vec![
        SourceRoot {
            group: SourceGroup::Project,
            path: project.clone(),
        },
        SourceRoot {
            group: SourceGroup::Framework,
            path: framework.clone(),
        },
        SourceRoot {
            group: SourceGroup::Own,
            path: dir.path().join("missing"),
        },
    ]);

    let all = [SourceGroup::Project, SourceGroup::Framework, SourceGroup::Own]
        .into_iter()
        .collect();
    let found = locator.find_catalogs("pt-br", &all);
    let mut expected = vec![
        project.join("pt_BR/LC_MESSAGES/django.po"),
        project.join("pt_BR/LC_MESSAGES/djangojs.po"),
        framework.join("pt-br/LC_MESSAGES/django.po"),
    ];
    expected.sort();
    assert_eq!(found, expected);

    let project_only = [SourceGroup::Project].into_iter().collect();
    assert_eq!(locator.find_catalogs("pt-br", &project_only).len(), 2);
    assert!(locator.find_catalogs("de", &all).is_empty());
}

#[test]
fn snapshot_goes_stale_only_on_new_content() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "django.po", TWO_ENTRIES.as_bytes());
    let snapshot = Snapshot::take(&path).unwrap();
    let later = SystemTime::now() + Duration::from_secs(60);

    // Same bytes, newer timestamp.
    let file = fs::File::options().write(true).open(&path).unwrap();
    file.set_modified(later).unwrap();
    drop(file);
    assert!(!snapshot.is_stale().unwrap());

    fs::write(&path, TWO_ENTRIES.replace("Hola", "Buenas")).unwrap();
    let file = fs::File::options().write(true).open(&path).unwrap();
    file.set_modified(later + Duration::from_secs(60)).unwrap();
    drop(file);
    assert!(snapshot.is_stale().unwrap());
}
