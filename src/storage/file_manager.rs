//! File Manager - block I/O over a directory of database files.
//!
//! The [`FileManager`] handles all direct file operations:
//! - Reading and writing blocks
//! - Appending new blocks to a file
//! - Opening files lazily and keeping them open

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use crate::common::config::PAGE_SIZE;
use crate::common::{BlockId, Error, Result};
use crate::storage::page::Page;
use crate::storage::BlockStore;

/// Manages block I/O for every file in one database directory.
///
/// # File Layout
/// Each file name maps to one file inside the directory, with blocks laid
/// out sequentially:
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┐
/// │ Block 0 │ Block 1 │  ...    │ Block N │
/// │ (4KB)   │ (4KB)   │         │ (4KB)   │
/// └─────────┴─────────┴─────────┴─────────┘
/// Offset:  0      4096   ...     N×4096
/// ```
///
/// # Thread Safety
/// Open file handles sit behind a single `Mutex`, so seek+read and
/// seek+write pairs never interleave.
///
/// # Durability
/// Every write and append is followed by `fsync()`.
pub struct FileManager {
    db_dir: PathBuf,
    /// True if the directory did not exist before `open`.
    is_new: bool,
    open_files: Mutex<HashMap<String, File>>,
}

impl FileManager {
    /// Open a database directory, creating it if it doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub fn open<P: AsRef<Path>>(db_dir: P) -> Result<Self> {
        let db_dir = db_dir.as_ref().to_path_buf();
        let is_new = !db_dir.exists();
        if is_new {
            fs::create_dir_all(&db_dir)?;
        }
        debug!(dir = %db_dir.display(), is_new, "opened database directory");

        Ok(Self {
            db_dir,
            is_new,
            open_files: Mutex::new(HashMap::new()),
        })
    }

    /// True if `open` created the directory.
    #[inline]
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// The database directory.
    #[inline]
    pub fn db_dir(&self) -> &Path {
        &self.db_dir
    }

    /// Run `f` against the (lazily opened) file named `file_name`.
    fn with_file<T>(&self, file_name: &str, f: impl FnOnce(&mut File) -> Result<T>) -> Result<T> {
        validate_file_name(file_name)?;

        let mut files = self.open_files.lock();
        if !files.contains_key(file_name) {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(self.db_dir.join(file_name))?;
            debug!(file = file_name, "opened block file");
            files.insert(file_name.to_string(), file);
        }

        match files.get_mut(file_name) {
            Some(file) => f(file),
            None => Err(Error::InvalidFileName(file_name.to_string())),
        }
    }
}

impl BlockStore for FileManager {
    fn read(&self, block: &BlockId, page: &mut Page) -> Result<()> {
        self.with_file(block.file_name(), |file| {
            if block.number() >= blocks_in(file)? {
                return Err(Error::BlockNotFound(block.clone()));
            }

            file.seek(SeekFrom::Start(offset_of(block)))?;
            file.read_exact(page.as_mut_slice())?;
            Ok(())
        })
    }

    fn write(&self, block: &BlockId, page: &Page) -> Result<()> {
        self.with_file(block.file_name(), |file| {
            if block.number() >= blocks_in(file)? {
                return Err(Error::BlockNotFound(block.clone()));
            }

            file.seek(SeekFrom::Start(offset_of(block)))?;
            file.write_all(page.as_slice())?;
            file.sync_all()?;
            Ok(())
        })
    }

    fn append_new_block(&self, file_name: &str) -> Result<BlockId> {
        self.with_file(file_name, |file| {
            let block = BlockId::new(file_name, blocks_in(file)?);

            file.seek(SeekFrom::Start(offset_of(&block)))?;
            file.write_all(&[0u8; PAGE_SIZE])?;
            file.sync_all()?;

            debug!(%block, "appended block");
            Ok(block)
        })
    }

    fn block_count(&self, file_name: &str) -> Result<u64> {
        self.with_file(file_name, |file| blocks_in(file))
    }
}

fn blocks_in(file: &File) -> Result<u64> {
    Ok(file.metadata()?.len() / PAGE_SIZE as u64)
}

fn offset_of(block: &BlockId) -> u64 {
    block.number() * PAGE_SIZE as u64
}

/// File names are plain names inside the database directory.
fn validate_file_name(file_name: &str) -> Result<()> {
    let invalid = file_name.is_empty()
        || file_name == "."
        || file_name == ".."
        || file_name.contains(['/', '\\']);

    if invalid {
        Err(Error::InvalidFileName(file_name.to_string()))
    } else {
        Ok(())
    }
}
