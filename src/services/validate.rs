use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Result};
use crate::model::catalog::Catalog;
use crate::model::entry::Entry;
use crate::model::settings::Settings;
use crate::parsers::po;
use crate::services::encoding;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatIssue {
    pub line: Option<usize>,
    pub code: String,
    pub message: String,

    /// Text of the offending line in the serialized catalog.
    #[serde(default)]
    pub source_line: Option<String>,
}

impl FormatIssue {
    fn at(line: usize, code: &str, message: impl Into<String>, text: &str) -> Self {
        FormatIssue {
            line: Some(line),
            code: code.to_string(),
            message: message.into(),
            source_line: text.lines().nth(line.saturating_sub(1)).map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// `<command> --check-format <file>`
    External(String),
    Internal,
}

#[derive(Debug, Clone)]
pub struct Validator {
    backend: Backend,
}

impl Validator {
    pub fn new(settings: &Settings) -> Self {
        match &settings.format_checker {
            Some(cmd) if !cmd.trim().is_empty() => Validator::external(cmd.trim()),
            _ => Validator::internal(),
        }
    }

    pub fn external(command: impl Into<String>) -> Self {
        Validator {
            backend: Backend::External(command.into()),
        }
    }

    pub fn internal() -> Self {
        Validator {
            backend: Backend::Internal,
        }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Empty when the catalog is well formed.
    pub fn validate(&self, catalog: &Catalog) -> Result<Vec<FormatIssue>> {
        let issues = match &self.backend {
            Backend::Internal => check_internal(catalog),
            Backend::External(cmd) => match run_external(cmd, catalog)? {
                Some(issues) => issues,
                None => {
                    log::warn!("format checker '{cmd}' not found, using the built-in check");
                    check_internal(catalog)
                }
            },
        };

        if !issues.is_empty() {
            log::debug!("validation reported {} issue(s)", issues.len());
        }
        Ok(issues)
    }
}

/// `None` when the checker binary does not exist.
fn run_external(cmd: &str, catalog: &Catalog) -> Result<Option<Vec<FormatIssue>>> {
    let text = po::serialize(catalog);
    let bytes = encoding::encode_text(&text, catalog.charset())?;

    let dir = tempfile::tempdir().map_err(|e| CatalogError::io(&std::env::temp_dir(), e))?;
    let path = dir.path().join("catalog.po");
    fs::write(&path, &bytes).map_err(|e| CatalogError::io(&path, e))?;

    // msgfmt drops a messages.mo into its working directory.
    let output = match Command::new(cmd)
        .arg("--check-format")
        .arg(&path)
        .current_dir(dir.path())
        .output()
    {
        Ok(o) => o,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CatalogError::io(Path::new(cmd), e)),
    };

    if output.status.success() {
        return Ok(Some(Vec::new()));
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let mut issues = parse_checker_output(&stderr, &path.display().to_string(), &text);
    if issues.is_empty() {
        issues.push(FormatIssue {
            line: None,
            code: "CHECKER_FAILED".into(),
            message: format!("{cmd} exited with {}", output.status),
            source_line: None,
        });
    }
    Ok(Some(issues))
}

/// Turns `<file>:<line>:<message>` diagnostics into issues. The last line is
/// the checker's error count and is dropped.
pub fn parse_checker_output(stderr: &str, file: &str, text: &str) -> Vec<FormatIssue> {
    let lines: Vec<&str> = stderr.trim().lines().collect();
    let body = match lines.split_last() {
        Some((_, rest)) => rest,
        None => return Vec::new(),
    };

    body.iter()
        .map(|line| match split_diagnostic(line, file) {
            Some((n, message)) => FormatIssue::at(n, "CHECKER", message, text),
            None => FormatIssue {
                line: None,
                code: "CHECKER".into(),
                message: format!("Unknown error: {line}"),
                source_line: None,
            },
        })
        .collect()
}

fn split_diagnostic<'a>(line: &'a str, file: &str) -> Option<(usize, &'a str)> {
    let rest = match line.strip_prefix(file).and_then(|r| r.strip_prefix(':')) {
        Some(rest) => rest,
        None => line.splitn(2, ':').nth(1)?,
    };
    let (number, message) = rest.split_once(':')?;
    let n = number.trim().parse::<usize>().ok()?;
    Some((n, message.trim()))
}

fn directive_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"%(?:\((?P<name>[^)]*)\))?(?:\d+\$)?[-+#0]*(?:\d+|\*)?(?:\.(?:\d+|\*))?(?P<conv>[a-zA-Z%])")
            .expect("directive pattern is valid")
    })
}

/// printf-style directives in `s`, sorted so order differences are ignored.
pub fn directives(s: &str) -> Vec<String> {
    let mut out: Vec<String> = directive_re()
        .captures_iter(s)
        .filter(|c| &c["conv"] != "%")
        .map(|c| {
            let name = c.name("name").map(|m| m.as_str()).unwrap_or("");
            format!("{name}:{}", &c["conv"])
        })
        .collect();
    out.sort();
    out
}

/// Only entries flagged `<lang>-format` are checked, as `msgfmt --check-format` does.
fn wants_format_check(e: &Entry) -> bool {
    e.flags
        .iter()
        .any(|f| f.ends_with("-format") && !f.starts_with("no-"))
}

fn check_internal(catalog: &Catalog) -> Vec<FormatIssue> {
    let (text, msgstr_lines) = po::serialize_with_lines(catalog);
    let nplurals = catalog.plural_count();
    let mut issues = Vec::new();
    let mut seen: HashSet<(Option<&str>, &str)> = HashSet::new();

    for (e, &line) in catalog.entries.iter().zip(msgstr_lines.iter()) {
        if e.obsolete {
            continue;
        }

        if !seen.insert((e.msgctxt.as_deref(), e.msgid.as_str())) {
            issues.push(FormatIssue::at(
                line,
                "DUPLICATE_MSGID",
                format!("duplicate message definition for '{}'", e.msgid),
                &text,
            ));
        }

        if let (Some(n), true) = (nplurals, e.is_plural() && !e.is_blank()) {
            let expected: Vec<usize> = (0..n).collect();
            let found: Vec<usize> = e.msgstr_plural.keys().copied().collect();
            if found != expected {
                issues.push(FormatIssue::at(
                    line,
                    "PLURAL_COUNT",
                    format!(
                        "header declares nplurals={n} but entry has {} plural form(s)",
                        found.len()
                    ),
                    &text,
                ));
            }
        }

        if !wants_format_check(e) {
            continue;
        }

        let mut pairs: Vec<(&str, String, &str)> = Vec::new();
        match &e.msgid_plural {
            None => pairs.push(("msgstr", e.msgstr.clone(), e.msgid.as_str())),
            Some(plural) => {
                for (idx, form) in &e.msgstr_plural {
                    let source = if *idx == 0 { e.msgid.as_str() } else { plural.as_str() };
                    pairs.push(("msgstr[]", form.clone(), source));
                }
            }
        }

        for (label, translated, source) in pairs {
            if translated.is_empty() {
                continue;
            }
            if directives(source) != directives(&translated) {
                issues.push(FormatIssue::at(
                    line,
                    "FORMAT_MISMATCH",
                    format!("format specifications in 'msgid' and '{label}' are not the same"),
                    &text,
                ));
                break;
            }
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_extraction() {
        assert_eq!(directives("%s and %d"), [":d", ":s"]);
        assert_eq!(directives("%(name)s got %%"), ["name:s"]);
        assert_eq!(directives("%-5.2f"), [":f"]);
        assert!(directives("100%% sure").is_empty());
    }

    #[test]
    fn checker_output_maps_to_lines() {
        let text = "msgid \"a\"\nmsgstr \"b\"\n\nmsgid \"%s\"\nmsgstr \"x\"\n";
        let stderr = "/tmp/x/catalog.po:5: format specifications in 'msgid' and 'msgstr' for argument 1 are not the same\n\
                      garbage line\n\
                      msgfmt: found 1 fatal error\n";
        let issues = parse_checker_output(stderr, "/tmp/x/catalog.po", text);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].line, Some(5));
        assert_eq!(issues[0].source_line.as_deref(), Some("msgstr \"x\""));
        assert!(issues[1].message.starts_with("Unknown error"));
    }

    #[test]
    fn internal_check_flags_mismatch_duplicates_and_plurals() {
        let text = r#"msgid ""
msgstr ""
"Plural-Forms: nplurals=2; plural=(n != 1);\n"

#, python-format
msgid "Hello %s"
msgstr "Hola"

msgid "Hello %s"
msgstr "Hola %s"

msgid "%d cat"
msgid_plural "%d cats"
msgstr[0] "%d gato"
"#;
        let catalog = po::parse(text).unwrap();
        let issues = Validator::internal().validate(&catalog).unwrap();
        let codes: Vec<&str> = issues.iter().map(|i| i.code.as_str()).collect();
        assert_eq!(codes, ["FORMAT_MISMATCH", "DUPLICATE_MSGID", "PLURAL_COUNT"]);
        assert_eq!(issues[0].source_line.as_deref(), Some("msgstr \"Hola\""));
    }

    #[test]
    fn no_format_flag_skips_check() {
        let mut e = Entry::with_msgstr("50% off %s", "rebajas");
        e.flags.insert("no-python-format".into());
        let mut c = Catalog::new();
        c.entries.push(e);
        assert!(Validator::internal().validate(&c).unwrap().is_empty());
    }

    #[test]
    fn unflagged_percent_text_is_not_checked() {
        let mut c = Catalog::new();
        c.entries.push(Entry::with_msgstr(
            "50% off everything",
            "50 % de réduction sur tout",
        ));
        c.entries.push(Entry::with_msgstr("Hello %s", "Hola"));
        assert!(Validator::internal().validate(&c).unwrap().is_empty());
        assert!(directives("50% off").is_empty());
    }

    #[test]
    fn missing_checker_falls_back() {
        let mut c = Catalog::new();
        let mut e = Entry::with_msgstr("%s items", "elementos");
        e.flags.insert("python-format".into());
        c.entries.push(e);
        let v = Validator::external("definitely-not-a-real-msgfmt-binary");
        let issues = v.validate(&c).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, "FORMAT_MISMATCH");
    }
}
