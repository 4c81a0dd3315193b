//! Atomic JSON writes and append-only JSONL log I/O
//!
//! Mutable state is always written via a temp-file-then-rename dance so a
//! reader never observes a half-written file. Append-only logs (inboxes,
//! events, dead-letter) are written with a single `write` call per line so
//! concurrent appenders never interleave partial lines.

use crate::error::EngineError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::OnceLock;

static WARNED_MALFORMED: OnceLock<()> = OnceLock::new();

/// Print a one-time stderr warning for malformed JSONL lines, gated on
/// `TEAM_CHAT_WARN_MALFORMED=1`. At most one warning is printed per process.
fn warn_malformed_once(path: &Path, line_number: Option<u64>) {
    if std::env::var("TEAM_CHAT_WARN_MALFORMED").as_deref() != Ok("1") {
        return;
    }
    if WARNED_MALFORMED.set(()).is_ok() {
        match line_number {
            Some(n) => eprintln!("warning: malformed JSONL line {n} in {}", path.display()),
            None => eprintln!("warning: malformed JSONL line in {}", path.display()),
        }
    }
}

/// Write `value` to `path` atomically via `<path>.tmp.<pid>.<rand>` + rename.
///
/// Serializes through [`serde_json::Value`] (a `BTreeMap`-backed object with
/// `preserve_order` disabled) so the emitted object has alphabetically sorted
/// keys regardless of field-declaration order, matching the sorted-key wire
/// format.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), EngineError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
    }

    let sorted = serde_json::to_value(value).map_err(|e| EngineError::json(path, e))?;
    let mut bytes = serde_json::to_vec_pretty(&sorted).map_err(|e| EngineError::json(path, e))?;
    bytes.push(b'\n');

    let tmp_path = path.with_file_name(format!(
        "{}.tmp.{}.{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("state"),
        std::process::id(),
        random_token(),
    ));

    {
        let mut tmp = fs::File::create(&tmp_path).map_err(|e| EngineError::io(&tmp_path, e))?;
        tmp.write_all(&bytes).map_err(|e| EngineError::io(&tmp_path, e))?;
        tmp.sync_all().map_err(|e| EngineError::io(&tmp_path, e))?;
    }

    fs::rename(&tmp_path, path).map_err(|e| EngineError::io(path, e))?;
    Ok(())
}

/// Read and parse a JSON file, returning `None` if it does not exist.
pub fn read_json_optional<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, EngineError> {
    match fs::read(path) {
        Ok(bytes) => {
            let value = serde_json::from_slice(&bytes).map_err(|e| EngineError::json(path, e))?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(EngineError::io(path, e)),
    }
}

fn random_token() -> String {
    use rand::Rng;
    let n: u64 = rand::rng().random();
    format!("{n:x}")
}

/// Outcome of appending a line to a JSONL log: the byte offset the line
/// begins at, for O(1) lookup later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendedAt {
    pub offset: u64,
}

/// Append one compact, key-sorted JSON line (with trailing `\n`) to `path`,
/// creating it (and parent directories) if necessary. Returns the byte
/// offset the line begins at.
pub fn append_jsonl<T: Serialize>(path: &Path, value: &T) -> Result<AppendedAt, EngineError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
    }

    let sorted = serde_json::to_value(value).map_err(|e| EngineError::json(path, e))?;
    let mut line = serde_json::to_vec(&sorted).map_err(|e| EngineError::json(path, e))?;
    line.push(b'\n');

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| EngineError::io(path, e))?;

    let offset = file.metadata().map_err(|e| EngineError::io(path, e))?.len();
    file.write_all(&line).map_err(|e| EngineError::io(path, e))?;
    file.flush().map_err(|e| EngineError::io(path, e))?;

    Ok(AppendedAt { offset })
}

/// A count of malformed lines skipped while reading a JSONL log, fed into
/// the malformed-JSONL diagnostics counter.
pub struct MalformedCount {
    pub count: u64,
    pub last_line_number: Option<u64>,
}

/// Parse every well-formed line of a JSONL file in forward order, skipping
/// malformed lines. Returns the parsed records and a count of skipped lines.
pub fn read_jsonl_forward<T: DeserializeOwned>(
    path: &Path,
) -> Result<(Vec<T>, MalformedCount), EngineError> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok((Vec::new(), MalformedCount { count: 0, last_line_number: None }))
        }
        Err(e) => return Err(EngineError::io(path, e)),
    };

    let mut out = Vec::new();
    let mut malformed = 0u64;
    let mut last_bad = None;
    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(line) {
            Ok(v) => out.push(v),
            Err(_) => {
                malformed += 1;
                let line_number = idx as u64 + 1;
                warn_malformed_once(path, Some(line_number));
                last_bad = Some(line_number);
            }
        }
    }

    Ok((out, MalformedCount { count: malformed, last_line_number: last_bad }))
}

/// Read exactly one JSON line at `offset` and parse it. Returns `Ok(None)`
/// if the offset is out of range or the line is malformed — callers must
/// fall back to a linear scan in that case.
pub fn read_jsonl_at_offset<T: DeserializeOwned>(
    path: &Path,
    offset: u64,
) -> Result<Option<T>, EngineError> {
    let mut file = match fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(EngineError::io(path, e)),
    };

    file.seek(SeekFrom::Start(offset)).map_err(|e| EngineError::io(path, e))?;
    let mut rest = String::new();
    file.read_to_string(&mut rest).map_err(|e| EngineError::io(path, e))?;

    let line = rest.lines().next().unwrap_or("");
    Ok(serde_json::from_str(line).ok())
}

/// Reverse-iterate the lines of a JSONL file, newest (last) line first.
/// Malformed lines are silently skipped but counted.
pub struct ReverseJsonlReader {
    path: std::path::PathBuf,
    buf: Vec<u8>,
    cursor: usize,
    pub malformed: u64,
}

impl ReverseJsonlReader {
    pub fn open(path: &Path) -> Result<Self, EngineError> {
        let buf = match fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(EngineError::io(path, e)),
        };
        let cursor = buf.len();
        Ok(Self { path: path.to_path_buf(), buf, cursor, malformed: 0 })
    }

    /// Returns the next well-formed record (scanning backward), or `None`
    /// when the start of the file is reached.
    pub fn next<T: DeserializeOwned>(&mut self) -> Option<T> {
        loop {
            if self.cursor == 0 {
                return None;
            }

            let mut end = self.cursor;
            if end > 0 && self.buf[end - 1] == b'\n' {
                end -= 1;
            }
            if end == 0 {
                self.cursor = 0;
                return None;
            }

            let start = match self.buf[..end].iter().rposition(|&b| b == b'\n') {
                Some(pos) => pos + 1,
                None => 0,
            };

            let line = &self.buf[start..end];
            self.cursor = start;

            if line.is_empty() {
                continue;
            }

            match serde_json::from_slice::<T>(line) {
                Ok(v) => return Some(v),
                Err(_) => {
                    self.malformed += 1;
                    warn_malformed_once(&self.path, None);
                    continue;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Rec {
        id: String,
        n: u32,
    }

    #[test]
    fn write_json_atomic_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let rec = Rec { id: "a".into(), n: 1 };
        write_json_atomic(&path, &rec).unwrap();
        let read: Rec = read_json_optional(&path).unwrap().unwrap();
        assert_eq!(rec, read);
    }

    #[test]
    fn read_json_optional_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.json");
        let read: Option<Rec> = read_json_optional(&path).unwrap();
        assert!(read.is_none());
    }

    #[test]
    fn append_and_offset_read_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.jsonl");
        append_jsonl(&path, &Rec { id: "a".into(), n: 1 }).unwrap();
        let second = append_jsonl(&path, &Rec { id: "b".into(), n: 2 }).unwrap();

        let rec: Rec = read_jsonl_at_offset(&path, second.offset).unwrap().unwrap();
        assert_eq!(rec.id, "b");
    }

    #[test]
    fn reverse_reader_yields_newest_first() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.jsonl");
        for i in 0..5 {
            append_jsonl(&path, &Rec { id: format!("id{i}"), n: i }).unwrap();
        }

        let mut reader = ReverseJsonlReader::open(&path).unwrap();
        let mut seen = Vec::new();
        while let Some(rec) = reader.next::<Rec>() {
            seen.push(rec.n);
        }
        assert_eq!(seen, vec![4, 3, 2, 1, 0]);
    }

    #[test]
    fn forward_read_skips_malformed_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.jsonl");
        fs::write(&path, "{\"id\":\"a\",\"n\":1}\nnot json\n{\"id\":\"b\",\"n\":2}\n").unwrap();

        let (recs, malformed): (Vec<Rec>, _) = read_jsonl_forward(&path).unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(malformed.count, 1);
    }
}
