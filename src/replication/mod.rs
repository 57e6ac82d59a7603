//! Master/slave replication (spec §4.6): a binary protocol carried over
//! the same length-prefixed framing as the client protocol.

pub mod master;
pub mod protocol;
pub mod slave;

pub use master::ReplicationMaster;
pub use protocol::{MasterResponse, SlaveRequest};
pub use slave::ReplicationSlave;
