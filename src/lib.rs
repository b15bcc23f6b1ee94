//! blockmgr - block locking and a pinned buffer pool for a block-structured
//! storage engine.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Transactions                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │           Concurrency Layer (concurrency/)              │   │
//! │  │   ConcurrencyManager (per txn) → LockTable (global)     │   │
//! │  │   shared/exclusive block locks, older waits, younger    │   │
//! │  │   aborts                                                │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │               Buffer Layer (buffer/)                    │   │
//! │  │   BufferManager + Buffer frames + FIFO unpinned queue   │   │
//! │  │   bounded wait when every frame is pinned               │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                 ↓                              ↓                │
//! │  ┌───────────────────────────┐  ┌──────────────────────────┐   │
//! │  │   Storage (storage/)      │  │      Log (log/)          │   │
//! │  │   BlockStore + FileManager│  │  LogFlush + LogManager   │   │
//! │  │   + Page                  │  │                          │   │
//! │  └───────────────────────────┘  └──────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (BlockId, TxnId, Error, WaitPolicy)
//! - [`concurrency`] - Lock table and per-transaction lock tracking
//! - [`buffer`] - Buffer pool management
//! - [`storage`] - Block I/O and page images
//! - [`log`] - Write-ahead log flushing
//!
//! # Quick Start
//! ```
//! use std::sync::Arc;
//! use blockmgr::{BufferManager, ConcurrencyManager, FileManager, LockTable, LogManager, TxnId};
//! use blockmgr::storage::BlockStore;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let fm = Arc::new(FileManager::open(dir.path().join("db")).unwrap());
//! let log = Arc::new(LogManager::open(dir.path().join("wal.log")).unwrap());
//! let bm = BufferManager::new(fm.clone(), log.clone(), 8);
//! let locks = Arc::new(LockTable::new());
//!
//! let block = fm.append_new_block("accounts.tbl").unwrap();
//! let txn = TxnId::new(1);
//! let mut cm = ConcurrencyManager::new(txn, Arc::clone(&locks));
//!
//! cm.xlock(&block).unwrap();
//! let buffer = bm.pin(&block).unwrap();
//! let lsn = log.append(b"accounts.tbl:0 offset 0 = 100").unwrap();
//! buffer.page_mut().set_i32(0, 100);
//! buffer.set_modified(txn, Some(lsn));
//! bm.unpin(&buffer);
//!
//! bm.flush_modified_by(txn).unwrap();
//! cm.release_all();
//! assert!(!locks.is_locked(&block));
//! ```

pub mod buffer;
pub mod common;
pub mod concurrency;
pub mod log;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::PAGE_SIZE;
pub use common::{BlockId, Error, FrameId, Lsn, Result, TxnId, WaitPolicy};

pub use buffer::{Buffer, BufferManager, BufferStats, PinnedBuffer, StatsSnapshot};
pub use concurrency::{ConcurrencyManager, LockMode, LockTable};
pub use log::{LogFlush, LogManager};
pub use storage::page::Page;
pub use storage::{BlockStore, FileManager};
