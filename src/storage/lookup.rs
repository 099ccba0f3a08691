//! CSV-backed lookup cache
//!
//! File layout: a `url,content,date` header followed by one record per URL.
//! Fields containing commas, quotes or newlines are quoted with `"` and inner
//! quotes are doubled; missing values are written as empty fields.

use crate::storage::{CacheEntry, StorageError, StorageResult};
use csv::{ByteRecord, QuoteStyle, ReaderBuilder, Terminator, WriterBuilder};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Header line of every lookup file
pub const LOOKUP_HEADER: [&str; 3] = ["url", "content", "date"];

/// Append-only url → (content, date) store
///
/// Rows are encoded into a buffer first and handed to the OS in one
/// `write_all` on an append-mode handle guarded by a mutex, so concurrent
/// appends never interleave and every row is complete.
#[derive(Debug)]
pub struct LookupCache {
    path: PathBuf,
    file: Mutex<File>,
}

impl LookupCache {
    /// Opens the lookup file at `path` and loads its entries
    ///
    /// A missing file is created with just the header. A trailing record cut
    /// off by a crash is dropped and truncated away so that later appends
    /// start on a clean line.
    ///
    /// # Returns
    ///
    /// * `Ok((LookupCache, HashMap))` - The cache handle and the loaded entries
    /// * `Err(StorageError)` - The file could not be read, created or repaired
    pub fn open(path: &Path) -> StorageResult<(Self, HashMap<String, CacheEntry>)> {
        let entries = load_entries(path)?;
        let file = OpenOptions::new().append(true).open(path)?;

        Ok((
            Self {
                path: path.to_path_buf(),
                file: Mutex::new(file),
            },
            entries,
        ))
    }

    /// Loads the entries of a lookup file without keeping it open or
    /// modifying it
    pub fn load(path: &Path) -> StorageResult<HashMap<String, CacheEntry>> {
        read_entries(path)
    }

    /// Returns the path of the lookup file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durably appends one entry
    pub fn append(&self, entry: &CacheEntry) -> StorageResult<()> {
        let row = encode_row(entry)?;

        let mut file = self.file.lock().map_err(|_| StorageError::LockPoisoned)?;
        file.write_all(&row)?;
        file.sync_data()?;
        Ok(())
    }
}

/// Loads all entries from the lookup file at `path`
///
/// If the file does not exist it is initialised with the header and an empty
/// map is returned. Rows that cannot be decoded are skipped with a warning;
/// when a URL appears more than once, the last row wins.
pub fn load_entries(path: &Path) -> StorageResult<HashMap<String, CacheEntry>> {
    if !path.exists() {
        tracing::info!(
            "No url-content-date lookup found. Setting up a new one at '{}'",
            path.display()
        );
        write_header(path)?;
        return Ok(HashMap::new());
    }

    tracing::info!(
        "A url-content lookup was found at '{}'. Loading the entries",
        path.display()
    );

    let bytes = std::fs::read(path)?;
    if bytes.is_empty() {
        write_header(path)?;
        return Ok(HashMap::new());
    }

    let mut records = read_records(&bytes)?;

    // Every row this crate writes ends in '\n'; anything else is a torn write.
    if !bytes.ends_with(b"\n") {
        if let Some((offset, _)) = records.pop() {
            tracing::warn!(
                "Lookup file '{}' ends with an incomplete row at byte {}; discarding it",
                path.display(),
                offset
            );
            if offset == 0 {
                write_header(path)?;
                return Ok(HashMap::new());
            }
            OpenOptions::new().write(true).open(path)?.set_len(offset)?;
        }
    }

    decode_records(path, records)
}

/// Loads the entries of the lookup file at `path` without modifying it
///
/// A missing file yields an empty map and is not created. A torn trailing
/// row is ignored but left in place.
pub fn read_entries(path: &Path) -> StorageResult<HashMap<String, CacheEntry>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }

    let bytes = std::fs::read(path)?;
    let mut records = read_records(&bytes)?;
    if !bytes.is_empty() && !bytes.ends_with(b"\n") {
        if let Some((offset, _)) = records.pop() {
            tracing::warn!(
                "Lookup file '{}' ends with an incomplete row at byte {}; ignoring it",
                path.display(),
                offset
            );
        }
    }

    decode_records(path, records)
}

/// Checks the header and decodes the remaining rows, skipping malformed ones
fn decode_records(
    path: &Path,
    records: Vec<(u64, ByteRecord)>,
) -> StorageResult<HashMap<String, CacheEntry>> {
    let mut rows = records.into_iter();
    if let Some((_, header)) = rows.next() {
        if !is_header(&header) {
            return Err(StorageError::InvalidHeader {
                path: path.display().to_string(),
                found: String::from_utf8_lossy(header.as_slice()).into_owned(),
            });
        }
    }

    let mut entries = HashMap::new();
    let mut skipped = 0usize;
    for (offset, record) in rows {
        match decode_row(&record) {
            Ok(entry) => {
                entries.insert(entry.url.clone(), entry);
            }
            Err(reason) => {
                skipped += 1;
                tracing::warn!(
                    "Skipping malformed lookup row at byte {} of '{}': {}",
                    offset,
                    path.display(),
                    reason
                );
            }
        }
    }

    tracing::info!(
        "Loaded {} lookup entries ({} malformed rows skipped)",
        entries.len(),
        skipped
    );
    Ok(entries)
}

fn write_header(path: &Path) -> StorageResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(format!("{}\n", LOOKUP_HEADER.join(",")).as_bytes())?;
    file.sync_all()?;
    Ok(())
}

/// Reads every record with the byte offset where it starts
fn read_records(bytes: &[u8]) -> StorageResult<Vec<(u64, ByteRecord)>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut records = Vec::new();
    for result in reader.byte_records() {
        let record = result?;
        let offset = record.position().map(|p| p.byte()).unwrap_or(0);
        records.push((offset, record));
    }
    Ok(records)
}

fn is_header(record: &ByteRecord) -> bool {
    record.len() == LOOKUP_HEADER.len()
        && record
            .iter()
            .zip(LOOKUP_HEADER)
            .all(|(field, expected)| field == expected.as_bytes())
}

fn decode_row(record: &ByteRecord) -> Result<CacheEntry, String> {
    if record.len() > LOOKUP_HEADER.len() {
        return Err(format!(
            "expected at most {} fields, found {}",
            LOOKUP_HEADER.len(),
            record.len()
        ));
    }

    let field = |index: usize| -> Result<Option<String>, String> {
        match record.get(index) {
            None => Ok(None),
            Some(raw) => {
                let value = std::str::from_utf8(raw)
                    .map_err(|e| format!("field {} is not valid UTF-8: {}", index, e))?;
                Ok(match value {
                    "" | "None" => None,
                    _ => Some(value.to_string()),
                })
            }
        }
    };

    let url = field(0)?.ok_or_else(|| "empty url".to_string())?;
    Ok(CacheEntry::new(url, field(1)?, field(2)?))
}

fn encode_row(entry: &CacheEntry) -> StorageResult<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record([
        entry.url.as_str(),
        entry.content.as_deref().unwrap_or(""),
        entry.date.as_deref().unwrap_or(""),
    ])?;

    writer
        .into_inner()
        .map_err(|e| StorageError::Io(e.into_error()))
}
