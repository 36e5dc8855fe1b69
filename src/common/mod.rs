mod queue;
mod shutdown;
mod table;

pub use queue::{BroadcastQueue, Queue};
pub use shutdown::Shutdown;
pub use table::{Record, RecordStatus, RecordTable, Resolution};
