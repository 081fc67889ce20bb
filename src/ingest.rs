//! Table ingestion
//!
//! Streams a delimited file through [`DecodingReader`] and the `csv` tokenizer (quoting
//! disabled, so quote characters stay in the values) and reads records lazily in batches
//! of `chunk_size`. Records whose field count differs from the header are skipped and
//! counted; they never abort the read. A file that yields no valid batch at all is
//! [`PipelineError::EmptyInput`].

use crate::decode::DecodingReader;
use crate::error::{PipelineError, Result};
use crate::table::{Row, Table};
use encoding_rs::Encoding;
use serde::Serialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What happened while reading one input
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub batches: usize,
    pub rows: usize,
    /// Records dropped for a wrong field count or a tokenizer error
    pub skipped_records: usize,
    /// Decode passes that substituted U+FFFD
    pub decode_replacements: usize,
}

/// Lazy batch reader over one delimited file
pub struct RecordBatches<R: Read> {
    reader: csv::Reader<DecodingReader<R>>,
    path: PathBuf,
    columns: Vec<String>,
    batch_size: usize,
    record: csv::StringRecord,
    stats: IngestStats,
    done: bool,
}

impl RecordBatches<BufReader<File>> {
    /// Open `path` and consume its header record
    pub fn open(
        path: &Path,
        delimiter: u8,
        encoding: &'static Encoding,
        batch_size: usize,
    ) -> Result<Self> {
        let file = File::open(path).map_err(|source| PipelineError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(
            BufReader::with_capacity(1024 * 1024, file),
            path,
            delimiter,
            encoding,
            batch_size,
        )
    }
}

impl<R: Read> RecordBatches<R> {
    pub fn from_reader(
        inner: R,
        path: &Path,
        delimiter: u8,
        encoding: &'static Encoding,
        batch_size: usize,
    ) -> Result<Self> {
        let reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .quoting(false)
            .has_headers(false)
            .flexible(true)
            .from_reader(DecodingReader::new(inner, encoding));

        let mut batches = Self {
            reader,
            path: path.to_path_buf(),
            columns: Vec::new(),
            batch_size: batch_size.max(1),
            record: csv::StringRecord::new(),
            stats: IngestStats::default(),
            done: false,
        };

        if !batches.read_next()? {
            return Err(PipelineError::EmptyInput {
                path: path.to_path_buf(),
            });
        }
        batches.columns = header_names(batches.record.iter());
        Ok(batches)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn stats(&self) -> IngestStats {
        let mut stats = self.stats.clone();
        stats.decode_replacements = self.reader.get_ref().replacements();
        stats
    }

    /// Read one record into `self.record`. Tokenizer errors on a single record are
    /// logged and skipped; I/O errors are fatal.
    fn read_next(&mut self) -> Result<bool> {
        loop {
            match self.reader.read_record(&mut self.record) {
                Ok(more) => return Ok(more),
                Err(e) if e.is_io_error() => {
                    return Err(PipelineError::Read {
                        path: self.path.clone(),
                        source: std::io::Error::from(e),
                    });
                }
                Err(e) => {
                    warn!("{}: skipping unreadable record: {}", self.path.display(), e);
                    self.stats.skipped_records += 1;
                }
            }
        }
    }

    fn next_batch(&mut self) -> Result<Option<Vec<Row>>> {
        let mut rows = Vec::with_capacity(self.batch_size.min(64 * 1024));
        while rows.len() < self.batch_size {
            if !self.read_next()? {
                self.done = true;
                break;
            }
            if self.record.len() != self.columns.len() {
                let line = self.record.position().map(|p| p.line()).unwrap_or(0);
                warn!(
                    "{}: skipping line {}: expected {} fields, saw {}",
                    self.path.display(),
                    line,
                    self.columns.len(),
                    self.record.len()
                );
                self.stats.skipped_records += 1;
                continue;
            }
            rows.push(
                self.record
                    .iter()
                    .map(|field| (!field.is_empty()).then(|| field.to_string()))
                    .collect(),
            );
        }

        if rows.is_empty() {
            return Ok(None);
        }
        self.stats.batches += 1;
        self.stats.rows += rows.len();
        debug!(
            "{}: batch {} ({} rows)",
            self.path.display(),
            self.stats.batches - 1,
            rows.len()
        );
        Ok(Some(rows))
    }
}

impl<R: Read> Iterator for RecordBatches<R> {
    type Item = Result<Vec<Row>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_batch() {
            Ok(Some(rows)) => Some(Ok(rows)),
            Ok(None) => None,
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Header names made unique: empty names become `Unnamed: <idx>`, repeats of `x` become
/// `x.1`, `x.2`, ...
pub fn header_names<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut names = Vec::new();
    for (idx, name) in raw.enumerate() {
        let base = if name.is_empty() {
            format!("Unnamed: {}", idx)
        } else {
            name.to_string()
        };
        let mut candidate = base.clone();
        let mut n = 1;
        while seen.contains(&candidate) {
            candidate = format!("{}.{}", base, n);
            n += 1;
        }
        seen.insert(candidate.clone());
        names.push(candidate);
    }
    names
}

/// Collect every batch of an opened reader into one table
pub fn collect_batches<R: Read>(mut batches: RecordBatches<R>) -> Result<(Table, IngestStats)> {
    let mut table = Table::new(batches.columns().to_vec());
    for batch in batches.by_ref() {
        table.extend_rows(batch?);
    }

    let stats = batches.stats();
    if stats.batches == 0 {
        return Err(PipelineError::EmptyInput {
            path: batches.path.clone(),
        });
    }
    if stats.skipped_records > 0 {
        warn!(
            "{}: skipped {} malformed record(s)",
            batches.path.display(),
            stats.skipped_records
        );
    }
    if stats.decode_replacements > 0 {
        warn!(
            "{}: undecodable bytes were replaced with U+FFFD",
            batches.path.display()
        );
    }
    Ok((table, stats))
}

/// Ingest `path` and report what was skipped
pub fn ingest_with_stats(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
    chunk_size: usize,
) -> Result<(Table, IngestStats)> {
    let batches = RecordBatches::open(path, delimiter, encoding, chunk_size)?;
    let (table, stats) = collect_batches(batches)?;
    info!(
        "ingested {}: {} rows x {} columns in {} batch(es)",
        path.display(),
        table.row_count(),
        table.column_count(),
        stats.batches
    );
    Ok((table, stats))
}

/// Ingest `path` into a [`Table`]
pub fn ingest(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
    chunk_size: usize,
) -> Result<Table> {
    ingest_with_stats(path, delimiter, encoding, chunk_size).map(|(table, _)| table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::{UTF_8, WINDOWS_1252};

    fn read(text: &[u8], chunk_size: usize) -> Result<(Table, IngestStats)> {
        let batches =
            RecordBatches::from_reader(text, Path::new("mem.csv"), b',', UTF_8, chunk_size)?;
        collect_batches(batches)
    }

    #[test]
    fn test_basic_ingest() {
        let (table, stats) = read(b"id,name\n1,a\n2,b\n3,c\n", 2).unwrap();
        assert_eq!(table.columns, vec!["id", "name"]);
        assert_eq!(table.row_count(), 3);
        assert_eq!(stats.batches, 2);
        assert_eq!(stats.rows, 3);
        assert_eq!(stats.skipped_records, 0);
    }

    #[test]
    fn test_quotes_are_literal() {
        let (table, _) = read(b"id,name\n1,\"a\"\n", 10).unwrap();
        assert_eq!(table.rows[0][1].as_deref(), Some("\"a\""));
    }

    #[test]
    fn test_wrong_field_count_skipped() {
        let (table, stats) = read(b"id,name\n1,a\n2,b,extra\n3\n4,d\n", 10).unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows[1][0].as_deref(), Some("4"));
        assert_eq!(stats.skipped_records, 2);
    }

    #[test]
    fn test_empty_field_is_missing() {
        let (table, _) = read(b"a,b\n,x\n", 10).unwrap();
        assert_eq!(table.rows[0][0], None);
        assert_eq!(table.rows[0][1].as_deref(), Some("x"));
    }

    #[test]
    fn test_crlf_and_blank_lines() {
        let (table, _) = read(b"a,b\r\n1,2\r\n\r\n3,4\r\n", 10).unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows[1][1].as_deref(), Some("4"));
    }

    #[test]
    fn test_header_only_is_empty_input() {
        let err = read(b"id,name\n", 10).unwrap_err();
        assert!(err.is_empty_input());
    }

    #[test]
    fn test_empty_file_is_empty_input() {
        let err = read(b"", 10).unwrap_err();
        assert!(err.is_empty_input());
    }

    #[test]
    fn test_only_malformed_records_is_empty_input() {
        let err = read(b"a,b,c\n1\n2,3\n4,5,6,7\n", 10).unwrap_err();
        assert!(err.is_empty_input());
    }

    #[test]
    fn test_header_names_deduplicated() {
        let names = header_names(["id", "", "id", "x", "id"].into_iter());
        assert_eq!(names, vec!["id", "Unnamed: 1", "id.1", "x", "id.2"]);
    }

    #[test]
    fn test_custom_delimiter_and_charset() {
        let batches = RecordBatches::from_reader(
            &b"k;v\n1;caf\xe9\n"[..],
            Path::new("mem.csv"),
            b';',
            WINDOWS_1252,
            10,
        )
        .unwrap();
        let (table, stats) = collect_batches(batches).unwrap();
        assert_eq!(table.rows[0][1].as_deref(), Some("café"));
        assert_eq!(stats.decode_replacements, 0);
    }

    #[test]
    fn test_bad_bytes_replaced_not_fatal() {
        let (table, stats) = read(b"a,b\n1,\xff\n", 10).unwrap();
        assert_eq!(table.rows[0][1].as_deref(), Some("\u{FFFD}"));
        assert!(stats.decode_replacements > 0);
    }

    #[test]
    fn test_ingest_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.csv");
        std::fs::write(&path, "id|v\n2|b\n1|a\n").unwrap();
        let table = ingest(&path, b'|', UTF_8, 1).unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows[0][0].as_deref(), Some("2"));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = ingest(Path::new("/definitely/not/here.csv"), b',', UTF_8, 10).unwrap_err();
        assert!(matches!(err, PipelineError::Read { .. }));
    }
}
