//! Page type.
//!
//! This module contains [`Page`], the raw block-sized data container with
//! typed little-endian accessors. The byte layout of records inside a page
//! belongs to higher layers.

#[allow(clippy::module_inception)]
mod page;

pub use page::Page;
