use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::error::CatalogError;
use crate::model::catalog::{Catalog, EntryFilter};
use crate::model::entry::Entry;
use crate::model::settings::{Settings, SourceGroup};
use crate::services::freshness::Snapshot;
use crate::services::locate::{self, Locator};
use crate::services::lookup::{ActiveCatalog, CatalogLookup, NullCatalog};
use crate::services::merge::{self, Priority};
use crate::services::validate::Validator;
use crate::services::{conflicts, encoding, search};

mod command;
use command::Command;

type Reply = Result<Value, String>;

fn get_cmd(req: &Value) -> &str {
    req.get("cmd").and_then(|v| v.as_str()).unwrap_or("")
}

fn get_id(req: &Value) -> Value {
    req.get("id").cloned().unwrap_or(Value::Null)
}

fn get_payload(req: &Value) -> &Value {
    static EMPTY: Value = Value::Null;
    req.get("payload").unwrap_or(&EMPTY)
}

fn ok(id: Value, payload: Value) -> String {
    json!({
        "id": id,
        "status": "ok",
        "payload": payload
    })
    .to_string()
}

fn err(id: Value, message: impl Into<String>) -> String {
    json!({
        "id": id,
        "status": "error",
        "message": message.into()
    })
    .to_string()
}

fn fail(e: CatalogError) -> String {
    e.to_string()
}

fn str_field<'a>(payload: &'a Value, key: &str) -> Option<&'a str> {
    payload
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
}

fn required<'a>(payload: &'a Value, key: &str) -> Result<&'a str, String> {
    str_field(payload, key).ok_or_else(|| format!("payload.{key} is required"))
}

/// msgid may legitimately be empty, so presence is what matters.
fn msgid_field(payload: &Value) -> Result<&str, String> {
    payload
        .get("msgid")
        .and_then(|v| v.as_str())
        .ok_or_else(|| "payload.msgid is required".to_string())
}

fn load_catalog(payload: &Value, key: &str) -> Result<Catalog, String> {
    Catalog::load(Path::new(required(payload, key)?)).map_err(fail)
}

fn stats(c: &Catalog) -> Value {
    json!({
        "total": c.entries.iter().filter(|e| !e.obsolete).count(),
        "translated": c.translated_entries().len(),
        "untranslated": c.untranslated_entries().len(),
        "fuzzy": c.fuzzy_entries().len(),
        "obsolete": c.obsolete_entries().len(),
        "percent_translated": c.percent_translated(),
    })
}

pub fn handle(input: &str, settings: &Settings) -> String {
    let req: Value = match serde_json::from_str(input) {
        Ok(v) => v,
        Err(_) => {
            return json!({
                "status": "error",
                "message": "invalid json"
            })
            .to_string();
        }
    };

    let id = get_id(&req);
    let cmd = Command::from(get_cmd(&req));
    let payload = get_payload(&req);

    match dispatch(cmd, payload, settings) {
        Ok(v) => ok(id, v),
        Err(e) => {
            log::debug!("{cmd:?} failed: {e}");
            err(id, e)
        }
    }
}

fn dispatch(cmd: Command, payload: &Value, settings: &Settings) -> Reply {
    match cmd {
        Command::Ping => Ok(json!({ "message": "transhette-core alive" })),

        Command::Load => {
            let c = load_catalog(payload, "path")?;
            Ok(json!({
                "metadata": c.metadata,
                "entries": c.entries,
                "stats": stats(&c),
                "fingerprint": c.fingerprint(),
            }))
        }

        Command::Find => {
            let c = load_catalog(payload, "path")?;
            let position = c.position(msgid_field(payload)?);
            Ok(json!({
                "position": position,
                "entry": position.map(|i| &c.entries[i]),
            }))
        }

        Command::Entries => list_entries(payload, settings, str_field(payload, "query")),

        Command::Search => list_entries(payload, settings, Some(required(payload, "query")?)),

        Command::Translate => translate(payload, settings),

        Command::Merge => merge_catalogs(payload, settings),

        Command::Validate => {
            let c = load_catalog(payload, "path")?;
            let issues = Validator::new(settings).validate(&c).map_err(fail)?;
            Ok(json!({ "valid": issues.is_empty(), "issues": issues }))
        }

        Command::Compile => {
            let c = load_catalog(payload, "path")?;
            let output = str_field(payload, "output")
                .map(PathBuf::from)
                .or_else(|| c.mo_path())
                .ok_or_else(|| "payload.output is required".to_string())?;
            c.compile_to(&output).map_err(fail)?;
            Ok(json!({ "output": output }))
        }

        Command::Locate => {
            let language = required(payload, "language")?;
            let groups = groups_field(payload, settings)?;
            let catalogs = Locator::from_settings(settings).find_catalogs(language, &groups);
            Ok(json!({ "catalogs": catalogs }))
        }

        Command::Owner => {
            let language = required(payload, "language")?;
            let msgid = msgid_field(payload)?;
            let groups = groups_field(payload, settings)?;
            let paths = Locator::from_settings(settings).find_catalogs(language, &groups);
            match locate::first_defining(&paths, msgid).map_err(fail)? {
                Some((path, entry)) => Ok(json!({
                    "index": locate::index_of(&paths, &path),
                    "path": path,
                    "entry": entry,
                })),
                None => Ok(json!({ "index": null, "path": null, "entry": null })),
            }
        }

        Command::Conflicts => {
            let c = load_catalog(payload, "path")?;
            Ok(json!({ "conflicts": conflicts::find_conflicts(&c) }))
        }

        Command::Fingerprint => {
            let path = required(payload, "path")?;
            let snapshot = Snapshot::take(Path::new(path)).map_err(fail)?;
            let changed = str_field(payload, "since").map(|f| f != snapshot.fingerprint);
            Ok(json!({ "fingerprint": snapshot.fingerprint, "changed": changed }))
        }

        Command::DetectEncoding => {
            let path = required(payload, "path")?;
            let result = encoding::detect_from_file(Path::new(path)).map_err(fail)?;
            serde_json::to_value(result).map_err(|e| e.to_string())
        }

        Command::Unknown => Err("unknown command".into()),
    }
}

fn groups_field(payload: &Value, settings: &Settings) -> Result<BTreeSet<SourceGroup>, String> {
    match payload.get("groups") {
        None | Some(Value::Null) => Ok(settings.source_groups()),
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| format!("invalid payload.groups: {e}")),
    }
}

fn native_catalog(payload: &Value, settings: &Settings) -> Result<Option<Catalog>, String> {
    if !settings.show_native_language {
        return Ok(None);
    }
    match str_field(payload, "native_path") {
        Some(path) => Catalog::load(Path::new(path)).map(Some).map_err(fail),
        None => Ok(None),
    }
}

fn list_entries(payload: &Value, settings: &Settings, query: Option<&str>) -> Reply {
    let c = load_catalog(payload, "path")?;

    let filter = match str_field(payload, "filter") {
        Some(f) => EntryFilter::parse(f).ok_or_else(|| format!("unknown filter '{f}'"))?,
        None => EntryFilter::All,
    };

    let native = native_catalog(payload, settings)?;
    let active;
    let lookup: &dyn CatalogLookup = match &native {
        Some(n) => {
            active = ActiveCatalog::new(n);
            &active
        }
        None => &NullCatalog,
    };

    let listed: Vec<(usize, &Entry)> = match query.map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => search::search(&c, lookup, q, settings.search_occurrences)
            .map_err(fail)?
            .into_iter()
            .map(|i| (i, &c.entries[i]))
            .collect(),
        None => c.filtered(filter),
    };

    let requested = payload.get("page").and_then(|v| v.as_u64()).unwrap_or(1) as usize;
    let page = search::paginate(listed.len(), settings.messages_per_page, requested);

    let rows: Vec<Value> = listed[page.range()]
        .iter()
        .map(|(i, e)| {
            json!({
                "id": i,
                "entry": e,
                "native": lookup.find(&e.msgid),
            })
        })
        .collect();

    Ok(json!({
        "page": page,
        "filter": filter,
        "stats": stats(&c),
        "entries": rows,
    }))
}

fn translate(payload: &Value, settings: &Settings) -> Reply {
    let mut c = load_catalog(payload, "path")?;

    let pos = match payload.get("id").and_then(|v| v.as_u64()) {
        Some(i) => i as usize,
        None => {
            let msgid = msgid_field(payload)?;
            c.position(msgid)
                .ok_or_else(|| format!("msgid '{msgid}' not found"))?
        }
    };

    let entry = c
        .entries
        .get_mut(pos)
        .ok_or_else(|| format!("entry id {pos} out of range"))?;

    match payload.get("plural").and_then(|v| v.as_object()) {
        Some(_) if !entry.is_plural() => {
            return Err(format!("entry '{}' has no plural forms", entry.msgid));
        }
        None if entry.is_plural() => {
            return Err(format!(
                "entry '{}' is plural; send payload.plural",
                entry.msgid
            ));
        }
        Some(forms) => {
            for (key, value) in forms {
                let index: usize = key
                    .parse()
                    .map_err(|_| format!("invalid plural index '{key}'"))?;
                let text = value
                    .as_str()
                    .ok_or_else(|| format!("plural form {key} must be a string"))?;
                entry.apply_plural_translation(index, text);
            }
        }
        None => {
            let text = payload
                .get("msgstr")
                .and_then(|v| v.as_str())
                .ok_or_else(|| "payload.msgstr is required".to_string())?;
            entry.apply_translation(text);
        }
    }

    let issues = Validator::new(settings).validate(&c).map_err(fail)?;
    if !issues.is_empty() {
        return Ok(json!({ "saved": false, "issues": issues }));
    }

    if let Some(translator) = str_field(payload, "translator") {
        c.stamp_revision(translator, &settings.translated_using);
    }

    c.save().map_err(fail)?;
    let mo = c.mo_path();
    if let Some(mo) = &mo {
        c.compile_to(mo).map_err(fail)?;
    }

    Ok(json!({
        "saved": true,
        "issues": [],
        "entry": &c.entries[pos],
        "mo": mo,
    }))
}

fn merge_catalogs(payload: &Value, settings: &Settings) -> Reply {
    let mut destination = load_catalog(payload, "destination")?;
    let incoming = load_catalog(payload, "incoming")?;
    let priority: Priority = str_field(payload, "priority")
        .unwrap_or("destination")
        .parse()?;
    let dry_run = payload
        .get("dry_run")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    if dry_run {
        let result = merge::preview(&destination, &incoming, priority);
        return Ok(json!({ "applied": false, "priority": priority, "result": result }));
    }

    let result = merge::merge(&mut destination, &incoming, priority);

    let issues = Validator::new(settings).validate(&destination).map_err(fail)?;
    if !issues.is_empty() {
        return Ok(json!({
            "applied": false,
            "priority": priority,
            "result": result,
            "issues": issues,
        }));
    }

    destination.save().map_err(fail)?;
    if let Some(mo) = destination.mo_path() {
        destination.compile_to(&mo).map_err(fail)?;
    }

    Ok(json!({
        "applied": true,
        "priority": priority,
        "result": result,
        "issues": [],
    }))
}
