use std::fs;
use std::path::Path;

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};
use serde::Serialize;

use crate::error::{CatalogError, Result};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

#[derive(Debug, Serialize)]
pub struct EncodingCandidate {
    pub name: String,
    pub confidence: f32,
}

#[derive(Debug, Serialize)]
pub struct EncodingDetectionResult {
    pub best: String,
    pub confidence: f32,
    pub declared: Option<String>,
    pub candidates: Vec<EncodingCandidate>,
}

/// Reports the charset a catalog file declares and what its bytes look like.
pub fn detect_from_file(path: &Path) -> Result<EncodingDetectionResult> {
    let bytes = fs::read(path).map_err(|e| CatalogError::io(path, e))?;
    Ok(detect(&bytes))
}

pub fn detect(bytes: &[u8]) -> EncodingDetectionResult {
    let declared = declared_charset(bytes);

    if bytes.starts_with(UTF8_BOM) {
        return EncodingDetectionResult {
            best: "utf-8".into(),
            confidence: 0.99,
            declared,
            candidates: vec![EncodingCandidate {
                name: "utf-8".into(),
                confidence: 0.99,
            }],
        };
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);

    let guessed = detector.guess(None, true);
    let best = guessed.name().to_lowercase();
    let confidence = estimate_confidence(bytes, guessed);

    let mut candidates = vec![EncodingCandidate {
        name: best.clone(),
        confidence,
    }];

    if let Some(enc) = declared
        .as_deref()
        .and_then(|label| Encoding::for_label(label.as_bytes()))
    {
        if enc != guessed {
            candidates.insert(
                0,
                EncodingCandidate {
                    name: enc.name().to_lowercase(),
                    confidence: estimate_confidence(bytes, enc),
                },
            );
        }
    }

    EncodingDetectionResult {
        best,
        confidence,
        declared,
        candidates,
    }
}

/// The `charset=` value declared by a PO file's header entry, read straight
/// from the raw bytes. Text outside the header entry is never consulted.
pub fn declared_charset(bytes: &[u8]) -> Option<String> {
    header_block(bytes).and_then(header_charset)
}

/// The `charset=` value in header text, as stored under the empty msgid of
/// a compiled catalog. The xgettext template placeholder `CHARSET` counts as
/// undeclared.
pub fn header_charset(header: &[u8]) -> Option<String> {
    const NEEDLE: &[u8] = b"charset=";
    let start = header
        .windows(NEEDLE.len())
        .position(|w| w.eq_ignore_ascii_case(NEEDLE))?
        + NEEDLE.len();

    let label: String = header[start..]
        .iter()
        .take_while(|&&b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b':'))
        .map(|&b| b as char)
        .collect();

    if label.is_empty() || label == "CHARSET" {
        None
    } else {
        Some(label)
    }
}

/// The first block of a PO file when it is the `msgid ""` header entry.
fn header_block(bytes: &[u8]) -> Option<&[u8]> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    let mut pos = 0;
    let mut start = None;
    let mut end = bytes.len();
    for line in bytes.split(|&b| b == b'\n') {
        let blank = line.trim_ascii().is_empty();
        match (start, blank) {
            (None, false) => start = Some(pos),
            (Some(_), true) => {
                end = pos;
                break;
            }
            _ => {}
        }
        pos += line.len() + 1;
    }

    let block = &bytes[start?..end];
    let body: Vec<&[u8]> = block
        .split(|&b| b == b'\n')
        .map(<[u8]>::trim_ascii)
        .filter(|l| !l.starts_with(b"#"))
        .collect();

    let is_header = body.first() == Some(&&b"msgid \"\""[..])
        && body.get(1).is_some_and(|l| l.starts_with(b"msgstr "));
    is_header.then_some(block)
}

/// Decodes catalog bytes with the declared charset, or UTF-8 / a detected
/// charset when the header declares none.
pub fn decode_catalog(bytes: &[u8]) -> Result<(String, &'static Encoding)> {
    if let Some(rest) = bytes.strip_prefix(UTF8_BOM) {
        return decode_strict(rest, UTF_8).map(|s| (s, UTF_8));
    }

    if let Some(label) = declared_charset(bytes) {
        let enc = Encoding::for_label(label.as_bytes())
            .ok_or_else(|| CatalogError::UnknownCharset(label.clone()))?;
        return decode_strict(bytes, enc).map(|s| (s, enc));
    }

    if let Ok(text) = decode_strict(bytes, UTF_8) {
        return Ok((text, UTF_8));
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let guessed = detector.guess(None, true);
    log::warn!(
        "catalog declares no charset and is not UTF-8; decoding as {}",
        guessed.name()
    );
    decode_strict(bytes, guessed).map(|s| (s, guessed))
}

fn decode_strict(bytes: &[u8], enc: &'static Encoding) -> Result<String> {
    let (text, had_errors) = enc.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(CatalogError::Encoding {
            charset: enc.name().to_string(),
            detail: "byte sequence is not valid in this charset".into(),
        });
    }
    Ok(text.into_owned())
}

/// Encodes catalog text for writing. `None` means UTF-8.
pub fn encode_text(text: &str, charset: Option<&str>) -> Result<Vec<u8>> {
    let enc = match charset {
        None => UTF_8,
        Some(label) => Encoding::for_label(label.as_bytes())
            .ok_or_else(|| CatalogError::UnknownCharset(label.to_string()))?,
    };

    if enc == UTF_8 {
        return Ok(text.as_bytes().to_vec());
    }

    let (bytes, _, unmappable) = enc.encode(text);
    if unmappable {
        return Err(CatalogError::Encoding {
            charset: enc.name().to_string(),
            detail: "text contains characters the charset cannot represent".into(),
        });
    }
    Ok(bytes.into_owned())
}

fn estimate_confidence(bytes: &[u8], encoding: &'static Encoding) -> f32 {
    let (text, _, had_errors) = encoding.decode(bytes);

    if had_errors {
        return 0.35;
    }

    let len = text.len();
    if len < 64 {
        0.55
    } else if len < 512 {
        0.70
    } else if len < 4096 {
        0.82
    } else {
        0.90
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LATIN1_PO: &[u8] = b"msgid \"\"\nmsgstr \"Content-Type: text/plain; charset=ISO-8859-1\\n\"\n\nmsgid \"Spain\"\nmsgstr \"Espa\xf1a\"\n";

    #[test]
    fn finds_declared_charset() {
        assert_eq!(declared_charset(LATIN1_PO).as_deref(), Some("ISO-8859-1"));
        assert_eq!(declared_charset(b"charset=CHARSET\\n"), None);
        assert_eq!(declared_charset(b"no header"), None);
        assert_eq!(
            header_charset(b"Content-Type: text/plain; charset=UTF-8\n").as_deref(),
            Some("UTF-8")
        );
    }

    #[test]
    fn charset_outside_the_header_is_ignored() {
        let po = b"msgid \"Set charset=foo in the form\"\nmsgstr \"\"\n";
        assert_eq!(declared_charset(po), None);
        let (text, enc) = decode_catalog(po).unwrap();
        assert_eq!(enc, UTF_8);
        assert!(text.contains("charset=foo"));

        let commented = b"# Header\n#, fuzzy\nmsgid \"\"\nmsgstr \"\"\n\"Content-Type: text/plain; charset=ISO-8859-1\\n\"\n\nmsgid \"charset=bar\"\nmsgstr \"\"\n";
        assert_eq!(declared_charset(commented).as_deref(), Some("ISO-8859-1"));
    }

    #[test]
    fn decodes_with_declared_charset() {
        let (text, enc) = decode_catalog(LATIN1_PO).unwrap();
        assert!(text.contains("España"));
        assert_eq!(enc.name(), "windows-1252");
    }

    #[test]
    fn invalid_bytes_for_declared_charset_fail() {
        let bytes = b"msgstr \"charset=UTF-8\"\nmsgid \"\xff\xfe\"\n";
        assert!(matches!(
            decode_catalog(bytes),
            Err(CatalogError::Encoding { .. })
        ));
        assert!(matches!(
            decode_catalog(b"charset=klingon\n"),
            Err(CatalogError::UnknownCharset(_))
        ));
    }

    #[test]
    fn encodes_back_to_declared_charset() {
        let bytes = encode_text("España", Some("ISO-8859-1")).unwrap();
        assert_eq!(bytes, b"Espa\xf1a");
        assert!(matches!(
            encode_text("日本", Some("ISO-8859-1")),
            Err(CatalogError::Encoding { .. })
        ));
        assert_eq!(encode_text("ñ", None).unwrap(), "ñ".as_bytes());
    }
}
