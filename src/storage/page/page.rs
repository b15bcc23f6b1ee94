//! Page - the in-memory image of one disk block.
//!
//! A [`Page`] is a raw `PAGE_SIZE` byte array that serves as the unit of
//! I/O between disk and memory. Pages live inside buffer frames.
//!
//! The typed accessors store values little-endian; byte strings and
//! strings are length-prefixed with a 4-byte length.

use crate::common::config::PAGE_SIZE;

/// Size of the length prefix written before byte strings.
const LEN_PREFIX: usize = std::mem::size_of::<u32>();

/// A page of data (4KB, 4KB-aligned).
///
/// # Clone Implementation
/// `Page` does NOT implement `Clone` in production code: copying a block
/// image should be explicit. A `#[cfg(test)]` Clone is provided for tests.
///
/// # Example
/// ```
/// use blockmgr::storage::page::Page;
///
/// let mut page = Page::new();
/// page.set_i32(80, -17);
/// page.set_string(100, "hello");
/// assert_eq!(page.get_i32(80), -17);
/// assert_eq!(page.get_string(100), "hello");
/// ```
#[repr(align(4096))]
pub struct Page {
    data: [u8; PAGE_SIZE],
}

impl Page {
    /// Create a new zeroed page.
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0u8; PAGE_SIZE],
        }
    }

    /// Get immutable slice of page data.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Get mutable slice of page data.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Zero out the entire page.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }

    /// Overwrite this page with the contents of another.
    pub fn copy_from(&mut self, other: &Page) {
        self.data.copy_from_slice(&other.data);
    }

    /// Read a little-endian `i32` at `offset`.
    ///
    /// # Panics
    /// Panics if the value would extend past the end of the page.
    pub fn get_i32(&self, offset: usize) -> i32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.data[offset..offset + 4]);
        i32::from_le_bytes(bytes)
    }

    /// Write a little-endian `i32` at `offset`.
    ///
    /// # Panics
    /// Panics if the value would extend past the end of the page.
    pub fn set_i32(&mut self, offset: usize, value: i32) {
        self.data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Read a length-prefixed byte string at `offset`.
    ///
    /// # Panics
    /// Panics if the stored length points past the end of the page.
    pub fn get_bytes(&self, offset: usize) -> &[u8] {
        let len = self.get_i32(offset) as u32 as usize;
        let start = offset + LEN_PREFIX;
        &self.data[start..start + len]
    }

    /// Write a length-prefixed byte string at `offset`.
    ///
    /// # Panics
    /// Panics if `offset + Page::max_length(bytes.len())` exceeds the page.
    pub fn set_bytes(&mut self, offset: usize, bytes: &[u8]) {
        let start = offset + LEN_PREFIX;
        assert!(
            start + bytes.len() <= PAGE_SIZE,
            "byte string of {} bytes does not fit at offset {}",
            bytes.len(),
            offset
        );
        self.set_i32(offset, bytes.len() as u32 as i32);
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
    }

    /// Read a length-prefixed UTF-8 string at `offset`.
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    pub fn get_string(&self, offset: usize) -> String {
        String::from_utf8_lossy(self.get_bytes(offset)).into_owned()
    }

    /// Write a length-prefixed UTF-8 string at `offset`.
    pub fn set_string(&mut self, offset: usize, value: &str) {
        self.set_bytes(offset, value.as_bytes());
    }

    /// Bytes needed to store a byte string of length `len`.
    #[inline]
    pub const fn max_length(len: usize) -> usize {
        LEN_PREFIX + len
    }

    /// Get the size of a page.
    #[inline]
    pub const fn size() -> usize {
        PAGE_SIZE
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

// Clone only available in tests - forces explicit copying in production
#[cfg(test)]
impl Clone for Page {
    fn clone(&self) -> Self {
        let mut new_page = Page::new();
        new_page.copy_from(self);
        new_page
    }
}
