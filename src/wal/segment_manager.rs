//! Single-writer segment state machine: appends to the current tail
//! segment and rotates it (closing + optionally compressing the filled
//! segment, then opening the next one) once it reaches the configured
//! maximum size.
//!
//! Grounded on `other_examples` crabcache's `SegmentWriter::needs_rotation`
//! + rotation-on-write idiom, extended with the compress-on-rotate step
//! the distilled spec requires (§4.3) and the "new segment exists before
//! the old uncompressed one is removed" atomicity note (spec §4.3).

use crate::compression;
use crate::config::CompressionKind;
use crate::error::Result;
use crate::wal::segment_store::SegmentStore;
use std::fs::{File, OpenOptions};
use std::io::Write;

enum Current {
    None,
    Writing { id: u64, file: File, size: u64 },
}

pub struct SegmentManager {
    store: SegmentStore,
    max_segment_size: u64,
    compression: CompressionKind,
    current: Current,
}

impl SegmentManager {
    pub fn new(store: SegmentStore, max_segment_size: u64, compression: CompressionKind) -> Self {
        Self { store, max_segment_size, compression, current: Current::None }
    }

    fn open_new(&self, id: u64) -> Result<File> {
        let path = self.store.path_for(id, CompressionKind::None);
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(file)
    }

    fn ensure_current(&mut self) -> Result<()> {
        if matches!(self.current, Current::None) {
            let next_id = self.store.max_id()? + 1;
            let file = self.open_new(next_id)?;
            self.current = Current::Writing { id: next_id, file, size: 0 };
        }
        Ok(())
    }

    /// Appends `bytes` to the current segment, rotating after the write
    /// if the segment has reached `max_segment_size`. Returns the id of
    /// the segment the bytes were written to.
    pub fn append(&mut self, bytes: &[u8]) -> Result<u64> {
        self.ensure_current()?;
        let written_id = match &mut self.current {
            Current::Writing { id, file, size } => {
                file.write_all(bytes)?;
                file.flush()?;
                let _ = file.sync_data();
                *size += bytes.len() as u64;
                *id
            }
            Current::None => unreachable!("ensure_current just populated this"),
        };

        let needs_rotation = matches!(&self.current, Current::Writing { size, .. } if *size >= self.max_segment_size);
        if needs_rotation {
            self.rotate()?;
        }
        Ok(written_id)
    }

    /// Closes the full segment, compresses it (if configured) into a new
    /// file, removes the uncompressed original, and opens `id+1` as the
    /// new current segment. The new current segment is created before
    /// the old uncompressed file is removed, so recovery never observes
    /// a gap (spec §4.3).
    fn rotate(&mut self) -> Result<()> {
        let (old_id, old_path) = match std::mem::replace(&mut self.current, Current::None) {
            Current::Writing { id, file, .. } => {
                drop(file);
                (id, self.store.path_for(id, CompressionKind::None))
            }
            Current::None => return Ok(()),
        };

        if self.compression != CompressionKind::None {
            let raw = std::fs::read(&old_path)?;
            let compressed = compression::compress(self.compression, &raw)?;
            let compressed_path = self.store.path_for(old_id, self.compression);
            std::fs::write(&compressed_path, compressed)?;
        }

        let next_id = old_id + 1;
        let new_file = self.open_new(next_id)?;
        self.current = Current::Writing { id: next_id, file: new_file, size: 0 };

        if self.compression != CompressionKind::None {
            self.store.remove(&old_path)?;
        }

        tracing::info!(old_id, new_id = next_id, "rotated wal segment");
        Ok(())
    }

    pub fn current_id(&self) -> Option<u64> {
        match &self.current {
            Current::Writing { id, .. } => Some(*id),
            Current::None => None,
        }
    }

    pub fn close(&mut self) {
        self.current = Current::None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::entry::{decode_entries, write_entry, LogEntry};

    #[test]
    fn rotates_when_size_threshold_reached() {
        let dir = tempfile::tempdir().unwrap();
        let store = SegmentStore::new(dir.path()).unwrap();
        let mut mgr = SegmentManager::new(store, 32, CompressionKind::None);

        let mut buf = Vec::new();
        write_entry(&mut buf, &LogEntry::set(1, "ns:k", "v", 0)).unwrap();
        mgr.append(&buf).unwrap();
        mgr.append(&buf).unwrap();

        let store2 = SegmentStore::new(dir.path()).unwrap();
        let segments = store2.list().unwrap();
        assert!(segments.len() >= 2, "expected rotation to produce a second segment");
    }

    #[test]
    fn compresses_rotated_segment() {
        let dir = tempfile::tempdir().unwrap();
        let store = SegmentStore::new(dir.path()).unwrap();
        let mut mgr = SegmentManager::new(store, 16, CompressionKind::Gzip);

        let mut buf = Vec::new();
        write_entry(&mut buf, &LogEntry::set(1, "ns:k", "v", 0)).unwrap();
        mgr.append(&buf).unwrap();
        mgr.append(&buf).unwrap();

        let store2 = SegmentStore::new(dir.path()).unwrap();
        let segments = store2.list().unwrap();
        let rotated = segments.iter().find(|s| s.id == 1).unwrap();
        assert_eq!(rotated.compression, CompressionKind::Gzip);

        let raw = std::fs::read(&rotated.path).unwrap();
        let decompressed = compression::decompress(CompressionKind::Gzip, &raw).unwrap();
        let entries = decode_entries(&decompressed).unwrap();
        assert_eq!(entries.len(), 1);
    }
}
