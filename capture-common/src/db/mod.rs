//! Report database bootstrap and transaction helpers

pub mod init;
pub mod retry;

pub use init::{init_database, init_in_memory_database, init_schema};
pub use retry::{is_lock_error, retry_on_lock};
