pub mod entry;
pub mod segment_manager;
pub mod segment_store;
pub mod writer;

pub use entry::{LogEntry, Operation};
pub use writer::Wal;
