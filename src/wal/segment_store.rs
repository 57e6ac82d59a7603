//! Create/open/list/remove numbered segment files on disk.
//!
//! Grounded on `other_examples` `nori-wal`'s directory-scan-for-segments
//! idiom (recovery walks the WAL directory and sorts by id). File names
//! follow spec §6: `wal_<id>.log[.<ext>]`.

use crate::config::CompressionKind;
use crate::error::{DbError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// One segment file as seen on disk.
#[derive(Debug, Clone)]
pub struct SegmentFile {
    pub id: u64,
    pub path: PathBuf,
    pub compression: CompressionKind,
}

pub struct SegmentStore {
    dir: PathBuf,
}

impl SegmentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn uncompressed_path(&self, id: u64) -> PathBuf {
        self.dir.join(format!("wal_{id}.log"))
    }

    fn compressed_path(&self, id: u64, kind: CompressionKind) -> PathBuf {
        self.dir.join(format!("wal_{id}.log.{}", kind.extension()))
    }

    pub fn path_for(&self, id: u64, kind: CompressionKind) -> PathBuf {
        match kind {
            CompressionKind::None => self.uncompressed_path(id),
            other => self.compressed_path(id, other),
        }
    }

    /// Lists every segment present in the directory, sorted by numeric id
    /// (not filesystem/lexicographic order — spec §9 calls this out
    /// explicitly since ids are not zero-padded).
    pub fn list(&self) -> Result<Vec<SegmentFile>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
            if let Some(parsed) = parse_segment_filename(name) {
                out.push(SegmentFile { id: parsed.0, path, compression: parsed.1 });
            }
        }
        out.sort_by_key(|s| s.id);
        Ok(out)
    }

    pub fn max_id(&self) -> Result<u64> {
        Ok(self.list()?.into_iter().map(|s| s.id).max().unwrap_or(0))
    }

    pub fn remove(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).or_else(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Ok(())
            } else {
                Err(DbError::from(e))
            }
        })
    }
}

/// Parses `wal_<id>.log[.<ext>]` into `(id, compression)`.
fn parse_segment_filename(name: &str) -> Option<(u64, CompressionKind)> {
    let rest = name.strip_prefix("wal_")?;
    let mut parts = rest.splitn(2, ".log");
    let id_str = parts.next()?;
    let id: u64 = id_str.parse().ok()?;
    let suffix = parts.next().unwrap_or("");
    let kind = match suffix.strip_prefix('.') {
        Some(ext) => CompressionKind::from_extension(ext),
        None => CompressionKind::None,
    };
    Some((id, kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_filenames() {
        assert!(matches!(
            parse_segment_filename("wal_1.log"),
            Some((1, CompressionKind::None))
        ));
        assert!(matches!(
            parse_segment_filename("wal_12.log.gz"),
            Some((12, CompressionKind::Gzip))
        ));
        assert!(parse_segment_filename("notasegment.txt").is_none());
    }

    #[test]
    fn lists_sorted_by_numeric_id_not_lexicographic() {
        let dir = tempfile::tempdir().unwrap();
        let store = SegmentStore::new(dir.path()).unwrap();
        for id in [2u64, 10, 1] {
            fs::write(store.path_for(id, CompressionKind::None), b"x").unwrap();
        }
        let ids: Vec<u64> = store.list().unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2, 10]);
    }

    #[test]
    fn max_id_on_empty_dir_is_zero() {
        let dir = tempfile::tempdir().unwrap();
        let store = SegmentStore::new(dir.path()).unwrap();
        assert_eq!(store.max_id().unwrap(), 0);
    }
}
