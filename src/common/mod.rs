//! Common types and utilities shared across blockmgr.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants and the wait policy
//! - Error types
//! - Identifiers (BlockId, TxnId, Lsn, FrameId)

mod block_id;
pub mod config;
pub mod error;
mod frame_id;
mod txn_id;

pub use block_id::BlockId;
pub use config::WaitPolicy;
pub use error::{Error, Result};
pub use frame_id::FrameId;
pub use txn_id::{Lsn, TxnId};
