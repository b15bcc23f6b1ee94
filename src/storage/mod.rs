//! Storage layer - block I/O and page images.
//!
//! - [`BlockStore`] - The read/write/append contract buffer frames rely on
//! - [`FileManager`] - `BlockStore` over a directory of block files
//! - [`page`] - The in-memory page image

mod block_store;
mod file_manager;
pub mod page;

pub use block_store::BlockStore;
pub use file_manager::FileManager;
