//! Buffer management.
//!
//! The buffer manager is the in-memory layer between transactions and the
//! block store. It owns a fixed pool of frames, each holding one block.
//!
//! # Components
//! - [`BufferManager`] - Pins blocks to frames, waits when the pool is full
//! - [`Buffer`] - A frame: page contents + binding, pin count, modification
//! - [`PinnedBuffer`] - RAII guard that unpins on drop
//! - [`BufferStats`] - Hit, miss, wait and abort counters

mod buffer_manager;
mod frame;
mod pin_guard;
mod stats;
mod unpinned;

pub use buffer_manager::BufferManager;
pub use frame::Buffer;
pub use pin_guard::PinnedBuffer;
pub use stats::{BufferStats, StatsSnapshot};
