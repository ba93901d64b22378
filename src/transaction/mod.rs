pub mod concurrency;
pub mod wal;

pub use concurrency::{LockManager, TransactionError};
pub use wal::{LogManager, WriteAheadLog};
