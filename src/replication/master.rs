//! Master-side segment iterator + request handler (spec §4.6): given a
//! requested segment id, return its (decompressed) bytes, or
//! `succeed=false` if nothing is there yet.
//!
//! Grounded on the teacher's `replication/` module presence for the
//! master-side wiring shape; the actual iterator logic is new.

use crate::error::Result;
use crate::replication::protocol::{MasterResponse, SlaveRequest};
use crate::wal::Wal;
use std::sync::Arc;

pub struct ReplicationMaster {
    wal: Arc<Wal>,
}

impl ReplicationMaster {
    pub fn new(wal: Arc<Wal>) -> Self {
        Self { wal }
    }

    /// `succeed` is true iff the requested segment produced a non-empty
    /// read — independent of whether it is also the highest (tail)
    /// segment (spec §9 open question).
    pub fn handle_request(&self, request: SlaveRequest) -> Result<MasterResponse> {
        let id = request.segment_num.max(0) as u64;
        match self.wal.read_segment(id)? {
            Some(data) if !data.is_empty() => Ok(MasterResponse { succeed: true, data }),
            _ => Ok(MasterResponse { succeed: false, data: Vec::new() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompressionKind;
    use std::time::Duration;

    #[tokio::test]
    async fn serves_an_existing_segment() {
        let dir = tempfile::tempdir().unwrap();
        let wal = Arc::new(
            Wal::open(dir.path(), 1, Duration::from_millis(10), 1024 * 1024, CompressionKind::None)
                .unwrap(),
        );
        wal.set(1, "t:a", "1", 0).await.unwrap();
        let master = ReplicationMaster::new(wal);

        let resp = master.handle_request(SlaveRequest { segment_num: 1 }).unwrap();
        assert!(resp.succeed);
        assert!(!resp.data.is_empty());
    }

    #[tokio::test]
    async fn missing_segment_does_not_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let wal = Arc::new(
            Wal::open(dir.path(), 1, Duration::from_millis(10), 1024 * 1024, CompressionKind::None)
                .unwrap(),
        );
        let master = ReplicationMaster::new(wal);
        let resp = master.handle_request(SlaveRequest { segment_num: 99 }).unwrap();
        assert!(!resp.succeed);
    }
}
