//! Disk-backed chunk store
//!
//! A table is written as consecutive chunk files of at most `chunk_size` rows each and
//! read back by concatenating them in chunk-index order.
//!
//! File name: `<prefix>_<index>.chunk`, zero-based index.
//!
//! File layout:
//!
//! ```text
//! [MAGIC]    b"TCK1"
//! [DIGEST]   sha256(payload), 32 bytes
//! [PAYLOAD]  bincode { index: u64, columns: Vec<String>, rows: Vec<Vec<Option<String>>> }
//! ```
//!
//! Each file is written to a temp file in the target directory and then persisted without
//! clobbering, so a crash never leaves a half-written `.chunk` behind.

use crate::error::{PipelineError, Result};
use crate::table::{Row, Table};
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const CHUNK_EXTENSION: &str = "chunk";
const CHUNK_MAGIC: &[u8; 4] = b"TCK1";
const DIGEST_LEN: usize = 32;
const HEADER_LEN: usize = CHUNK_MAGIC.len() + DIGEST_LEN;

/// One decoded chunk file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Chunk {
    pub index: u64,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

// Borrowed twin of `Chunk`; bincode encodes slices and Vecs identically
#[derive(Serialize)]
struct ChunkRef<'a> {
    index: u64,
    columns: &'a [String],
    rows: &'a [Row],
}

/// `<prefix>_<index>.chunk`
pub fn chunk_file_name(prefix: &str, index: u64) -> String {
    format!("{}_{}.{}", prefix, index, CHUNK_EXTENSION)
}

/// Index encoded in a chunk file name, if it is one
pub fn parse_chunk_index(file_name: &str) -> Option<u64> {
    let stem = file_name.strip_suffix(CHUNK_EXTENSION)?.strip_suffix('.')?;
    let (_, digits) = stem.rsplit_once('_')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Number of chunk files `persist` produces for `rows` rows
pub fn chunk_count(rows: usize, chunk_size: usize) -> usize {
    rows.div_ceil(chunk_size.max(1))
}

/// Write `table` into `target_dir` as `ceil(rows / chunk_size)` chunk files.
///
/// `target_dir` must already exist; an existing file at any chunk path is a conflict and
/// aborts the write. Returns the chunk paths in index order.
pub fn persist(
    table: &Table,
    chunk_size: usize,
    target_dir: &Path,
    name_prefix: &str,
    bar: Option<&ProgressBar>,
) -> Result<Vec<PathBuf>> {
    if chunk_size == 0 {
        return Err(PipelineError::Config(
            "chunk_size must be at least 1".to_string(),
        ));
    }
    if !target_dir.is_dir() {
        return Err(PipelineError::storage(
            target_dir,
            "chunk directory does not exist",
        ));
    }

    let mut paths = Vec::with_capacity(chunk_count(table.row_count(), chunk_size));
    for (i, rows) in table.rows.chunks(chunk_size).enumerate() {
        let index = i as u64;
        let name = chunk_file_name(name_prefix, index);
        let path = target_dir.join(&name);
        if let Some(bar) = bar {
            bar.set_message(name.clone());
        }
        write_chunk(
            &path,
            &ChunkRef {
                index,
                columns: &table.columns,
                rows,
            },
        )?;
        debug!("wrote {} ({} rows)", path.display(), rows.len());
        paths.push(path);
        if let Some(bar) = bar {
            bar.inc(1);
        }
    }
    if let Some(bar) = bar {
        bar.finish();
    }
    Ok(paths)
}

fn write_chunk(path: &Path, chunk: &ChunkRef<'_>) -> Result<()> {
    if path.exists() {
        return Err(PipelineError::storage(
            path,
            "conflicting chunk file already exists",
        ));
    }
    let dir = path.parent().unwrap_or(Path::new("."));

    let payload = bincode::serialize(chunk)
        .map_err(|e| PipelineError::storage(path, format!("failed to serialize chunk: {}", e)))?;
    let digest = Sha256::digest(&payload);

    let tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| PipelineError::storage(path, format!("failed to create temp file: {}", e)))?;
    write_chunk_bytes(tmp.as_file(), &digest, &payload)
        .map_err(|e| PipelineError::storage(path, format!("failed to write chunk: {}", e)))?;
    tmp.persist_noclobber(path)
        .map_err(|e| PipelineError::storage(path, format!("failed to persist chunk: {}", e.error)))?;
    Ok(())
}

fn write_chunk_bytes(file: &File, digest: &[u8], payload: &[u8]) -> std::io::Result<()> {
    let mut writer = BufWriter::new(file);
    writer.write_all(CHUNK_MAGIC)?;
    writer.write_all(digest)?;
    writer.write_all(payload)?;
    writer.flush()
}

/// Decode and verify one chunk file
pub fn read_chunk(path: &Path) -> Result<Chunk> {
    let data = std::fs::read(path)
        .map_err(|e| PipelineError::storage(path, format!("failed to read chunk: {}", e)))?;

    if data.len() < HEADER_LEN {
        return Err(PipelineError::storage(path, "chunk file is truncated"));
    }
    let (magic, rest) = data.split_at(CHUNK_MAGIC.len());
    if magic != CHUNK_MAGIC {
        return Err(PipelineError::storage(path, "not a chunk file (bad magic)"));
    }
    let (digest, payload) = rest.split_at(DIGEST_LEN);
    if Sha256::digest(payload).as_slice() != digest {
        return Err(PipelineError::storage(path, "checksum mismatch"));
    }

    bincode::deserialize(payload)
        .map_err(|e| PipelineError::storage(path, format!("failed to deserialize chunk: {}", e)))
}

/// Chunk files in `dir`, ordered by the index in their names.
///
/// Files without the `.chunk` extension are ignored. A `.chunk` file without a parsable
/// index, or two files claiming the same index, is a storage error.
pub fn list_chunk_files(dir: &Path) -> Result<Vec<(u64, PathBuf)>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| PipelineError::storage(dir, format!("cannot list chunk directory: {}", e)))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry
            .map_err(|e| PipelineError::storage(dir, format!("cannot list chunk directory: {}", e)))?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(CHUNK_EXTENSION) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let index = parse_chunk_index(&name)
            .ok_or_else(|| PipelineError::storage(&path, "chunk file name has no index"))?;
        files.push((index, path));
    }

    // Directory listing order is arbitrary; the positional diff needs index order
    files.sort_by_key(|(index, _)| *index);
    if let Some(pair) = files.windows(2).find(|pair| pair[0].0 == pair[1].0) {
        return Err(PipelineError::storage(
            &pair[1].1,
            format!("duplicate chunk index {} (also {})", pair[1].0, pair[0].1.display()),
        ));
    }
    Ok(files)
}

/// Rebuild a table from every chunk file in `target_dir`.
///
/// The total row count is not checked against what was persisted. An empty directory
/// reloads as an empty table without columns.
pub fn reload(target_dir: &Path, bar: Option<&ProgressBar>) -> Result<Table> {
    let files = list_chunk_files(target_dir)?;
    if let Some(bar) = bar {
        bar.set_length(files.len() as u64);
    }

    for (expected, (index, _)) in files.iter().enumerate() {
        if expected as u64 != *index {
            warn!(
                "{}: chunk index {} found where {} was expected",
                target_dir.display(),
                index,
                expected
            );
            break;
        }
    }

    let mut table = Table::default();
    for (pos, (index, path)) in files.iter().enumerate() {
        if let Some(bar) = bar {
            bar.set_message(
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            );
        }

        let chunk = read_chunk(path)?;
        if chunk.index != *index {
            return Err(PipelineError::storage(
                path,
                format!("chunk claims index {} but is named {}", chunk.index, index),
            ));
        }
        if pos == 0 {
            table.columns = chunk.columns;
        } else if chunk.columns != table.columns {
            return Err(PipelineError::storage(
                path,
                "chunk columns differ from the first chunk",
            ));
        }
        debug!("read {} ({} rows)", path.display(), chunk.rows.len());
        table.extend_rows(chunk.rows);

        if let Some(bar) = bar {
            bar.inc(1);
        }
    }
    if let Some(bar) = bar {
        bar.finish();
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(n: usize) -> Table {
        let mut table = Table::new(vec!["id".into(), "v".into()]);
        for i in 0..n {
            let v = if i % 3 == 0 { None } else { Some(format!("\"v{}\"", i)) };
            table.rows.push(vec![Some(format!("{:04}", i)), v]);
        }
        table
    }

    #[test]
    fn test_chunk_file_names() {
        assert_eq!(chunk_file_name("part", 3), "part_3.chunk");
        assert_eq!(parse_chunk_index("part_3.chunk"), Some(3));
        assert_eq!(parse_chunk_index("my_part_12.chunk"), Some(12));
        assert_eq!(parse_chunk_index("part_.chunk"), None);
        assert_eq!(parse_chunk_index("part_x.chunk"), None);
        assert_eq!(parse_chunk_index("part_3.pkl"), None);
        assert_eq!(parse_chunk_index("part3.chunk"), None);
    }

    #[test]
    fn test_chunk_count() {
        assert_eq!(chunk_count(0, 4), 0);
        assert_eq!(chunk_count(4, 4), 1);
        assert_eq!(chunk_count(5, 4), 2);
        assert_eq!(chunk_count(10, 1), 10);
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let table = sample(10);
        let paths = persist(&table, 3, dir.path(), "part", None).unwrap();
        assert_eq!(paths.len(), 4);
        let reloaded = reload(dir.path(), None).unwrap();
        assert_eq!(reloaded, table);
    }

    #[test]
    fn test_chunk_sizes() {
        let dir = tempfile::tempdir().unwrap();
        persist(&sample(10), 4, dir.path(), "part", None).unwrap();
        let sizes: Vec<usize> = list_chunk_files(dir.path())
            .unwrap()
            .iter()
            .map(|(_, p)| read_chunk(p).unwrap().rows.len())
            .collect();
        assert_eq!(sizes, vec![4, 4, 2]);
    }

    #[test]
    fn test_reload_orders_by_index_not_name() {
        // part_10 sorts before part_2 lexicographically
        let dir = tempfile::tempdir().unwrap();
        let table = sample(12);
        persist(&table, 1, dir.path(), "part", None).unwrap();
        let reloaded = reload(dir.path(), None).unwrap();
        assert_eq!(reloaded.rows, table.rows);
    }

    #[test]
    fn test_conflicting_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("part_0.chunk"), b"stale").unwrap();
        let err = persist(&sample(2), 5, dir.path(), "part", None).unwrap_err();
        assert!(err.to_string().contains("part_0.chunk"));
    }

    #[test]
    fn test_missing_dir_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = persist(&sample(2), 5, &missing, "part", None).unwrap_err();
        assert!(matches!(err, PipelineError::Storage { .. }));
    }

    #[test]
    fn test_corrupt_chunk_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = persist(&sample(6), 2, dir.path(), "part", None).unwrap();
        let mut bytes = std::fs::read(&paths[1]).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        std::fs::write(&paths[1], bytes).unwrap();

        let err = reload(dir.path(), None).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("part_1.chunk"), "{}", msg);
        assert!(msg.contains("checksum mismatch"), "{}", msg);
    }

    #[test]
    fn test_truncated_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("part_0.chunk"), b"TCK1").unwrap();
        assert!(reload(dir.path(), None)
            .unwrap_err()
            .to_string()
            .contains("truncated"));

        std::fs::write(dir.path().join("part_0.chunk"), vec![0u8; 64]).unwrap();
        assert!(reload(dir.path(), None)
            .unwrap_err()
            .to_string()
            .contains("bad magic"));
    }

    #[test]
    fn test_renamed_chunk_detected() {
        let dir = tempfile::tempdir().unwrap();
        persist(&sample(4), 2, dir.path(), "part", None).unwrap();
        std::fs::rename(dir.path().join("part_1.chunk"), dir.path().join("part_7.chunk")).unwrap();
        let err = reload(dir.path(), None).unwrap_err();
        assert!(err.to_string().contains("claims index 1"));
    }

    #[test]
    fn test_duplicate_index_rejected() {
        let dir = tempfile::tempdir().unwrap();
        persist(&sample(2), 5, dir.path(), "a", None).unwrap();
        persist(&sample(2), 5, dir.path(), "b", None).unwrap();
        let err = reload(dir.path(), None).unwrap_err();
        assert!(err.to_string().contains("duplicate chunk index 0"));
    }

    #[test]
    fn test_non_chunk_files_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let table = sample(3);
        persist(&table, 2, dir.path(), "part", None).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
        assert_eq!(reload(dir.path(), None).unwrap(), table);
    }

    #[test]
    fn test_progress_counts_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let table = sample(7);

        let write_bar = ProgressBar::hidden();
        write_bar.set_length(chunk_count(table.row_count(), 3) as u64);
        persist(&table, 3, dir.path(), "part", Some(&write_bar)).unwrap();
        assert_eq!(write_bar.position(), 3);
        assert!(write_bar.is_finished());

        let read_bar = ProgressBar::hidden();
        reload(dir.path(), Some(&read_bar)).unwrap();
        assert_eq!(read_bar.length(), Some(3));
        assert_eq!(read_bar.position(), 3);
        assert_eq!(read_bar.message(), "part_2.chunk");
    }

    #[test]
    fn test_empty_table_and_dir() {
        let dir = tempfile::tempdir().unwrap();
        let paths = persist(&Table::new(vec!["a".into()]), 3, dir.path(), "part", None).unwrap();
        assert!(paths.is_empty());
        assert_eq!(reload(dir.path(), None).unwrap(), Table::default());
    }
}
