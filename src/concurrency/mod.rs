//! Block locking for transactions.
//!
//! - [`LockTable`] - Process-wide shared/exclusive locks with the age rule
//! - [`ConcurrencyManager`] - One transaction's view of the lock table

mod concurrency_manager;
mod lock_table;

pub use concurrency_manager::ConcurrencyManager;
pub use lock_table::{LockEntry, LockMode, LockTable};
