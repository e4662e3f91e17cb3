#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Ping,
    Load,
    Find,
    Entries,
    Search,
    Translate,
    Merge,
    Validate,
    Compile,
    Locate,
    Owner,
    Conflicts,
    Fingerprint,
    DetectEncoding,
    Unknown,
}

impl From<&str> for Command {
    fn from(s: &str) -> Self {
        match s {
            "ping" => Command::Ping,
            "catalog.load" => Command::Load,
            "catalog.find" => Command::Find,
            "catalog.entries" => Command::Entries,
            "catalog.search" => Command::Search,
            "catalog.translate" => Command::Translate,
            "catalog.merge" => Command::Merge,
            "catalog.validate" => Command::Validate,
            "catalog.compile" => Command::Compile,
            "catalog.locate" => Command::Locate,
            "catalog.owner" => Command::Owner,
            "catalog.conflicts" => Command::Conflicts,
            "catalog.fingerprint" => Command::Fingerprint,
            "encoding.detect" | "detect_encoding" => Command::DetectEncoding,
            _ => Command::Unknown,
        }
    }
}
