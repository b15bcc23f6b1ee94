//! Append-only log file with buffered appends and explicit flushes.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::common::{Error, Lsn, Result};
use crate::log::LogFlush;

/// Record frame header: payload length + CRC32 of the payload.
const FRAME_HEADER: usize = 8;

/// A file-backed write-ahead log.
///
/// # Record Format
/// ```text
/// ┌────────────┬────────────┬─────────────────┐
/// │ len (u32)  │ crc (u32)  │ payload (len)   │
/// └────────────┴────────────┴─────────────────┘
/// ```
/// Both header fields are little-endian. LSNs are assigned sequentially
/// starting at 1, so the n-th record in the file has `Lsn(n)`.
///
/// Appends are buffered in memory and reach the file only on `flush`.
pub struct LogManager {
    path: PathBuf,
    state: Mutex<LogState>,
}

struct LogState {
    file: File,
    /// Framed records not yet written to the file.
    pending: Vec<u8>,
    /// LSN of the most recently appended record (0 = none).
    last_lsn: u64,
    /// LSN of the most recent durable record (0 = none).
    flushed_lsn: u64,
}

impl LogManager {
    /// Open the log at `path`, creating it if needed.
    ///
    /// Existing records are counted so new appends continue the sequence. A
    /// torn record at the end of the file is cut off, so new records start
    /// right after the last complete one.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)?;

        let scan = read_records(&mut file)?;
        let len = file.metadata()?.len();
        if scan.valid_end < len {
            warn!(
                path = %path.display(),
                torn_bytes = len - scan.valid_end,
                "truncating torn log tail"
            );
            file.set_len(scan.valid_end)?;
            file.sync_all()?;
        }

        let existing = scan.records.len() as u64;
        debug!(path = %path.display(), records = existing, "opened log");

        Ok(Self {
            path,
            state: Mutex::new(LogState {
                file,
                pending: Vec::new(),
                last_lsn: existing,
                flushed_lsn: existing,
            }),
        })
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Buffer a record and return its LSN. The record is not yet durable.
    ///
    /// # Errors
    /// `Error::RecordTooLarge` if the record does not fit a 32-bit length.
    pub fn append(&self, record: &[u8]) -> Result<Lsn> {
        let len = frame_len(record.len())?;

        let mut state = self.state.lock();
        state.last_lsn += 1;

        state.pending.extend_from_slice(&len.to_le_bytes());
        state
            .pending
            .extend_from_slice(&crc32fast::hash(record).to_le_bytes());
        state.pending.extend_from_slice(record);

        trace!(lsn = state.last_lsn, len, "appended log record");
        Ok(Lsn::new(state.last_lsn))
    }

    /// LSN of the latest appended record, if any.
    pub fn last_lsn(&self) -> Option<Lsn> {
        let last = self.state.lock().last_lsn;
        (last > 0).then_some(Lsn::new(last))
    }

    /// LSN of the latest durable record, if any.
    pub fn flushed_lsn(&self) -> Option<Lsn> {
        let flushed = self.state.lock().flushed_lsn;
        (flushed > 0).then_some(Lsn::new(flushed))
    }

    /// Read back every durable record, oldest first.
    ///
    /// A torn record at the end of the file is ignored.
    ///
    /// # Errors
    /// `Error::CorruptLogRecord` if a complete record fails its checksum.
    pub fn records(&self) -> Result<Vec<Vec<u8>>> {
        let mut state = self.state.lock();
        Ok(read_records(&mut state.file)?.records)
    }
}

impl LogFlush for LogManager {
    /// Write every buffered record and sync the file.
    ///
    /// The buffer is kept until the sync succeeds. On failure the file is cut
    /// back to its previous length, so a retry writes the same records again.
    fn flush(&self, lsn: Lsn) -> Result<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if lsn.0 <= state.flushed_lsn || state.pending.is_empty() {
            return Ok(());
        }

        let durable_len = state.file.metadata()?.len();
        if let Err(e) = write_and_sync(&mut state.file, &state.pending) {
            if let Err(trunc) = state.file.set_len(durable_len) {
                warn!(error = %trunc, "could not cut back partial log write");
            }
            warn!(error = %e, requested = %lsn, "log flush failed");
            return Err(e);
        }

        state.pending.clear();
        state.flushed_lsn = state.last_lsn;

        debug!(requested = %lsn, flushed = state.flushed_lsn, "flushed log");
        Ok(())
    }
}

/// Length prefix for a payload of `len` bytes.
fn frame_len(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::RecordTooLarge { len })
}

fn write_and_sync(file: &mut File, bytes: &[u8]) -> Result<()> {
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

/// Result of scanning the log file.
struct LogScan {
    records: Vec<Vec<u8>>,
    /// Offset just past the last complete record.
    valid_end: u64,
}

fn read_records(file: &mut File) -> Result<LogScan> {
    let mut bytes = Vec::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut bytes)?;

    let mut records = Vec::new();
    let mut pos = 0;
    while pos + FRAME_HEADER <= bytes.len() {
        let len = u32::from_le_bytes([bytes[pos], bytes[pos + 1], bytes[pos + 2], bytes[pos + 3]])
            as usize;
        let crc = u32::from_le_bytes([
            bytes[pos + 4],
            bytes[pos + 5],
            bytes[pos + 6],
            bytes[pos + 7],
        ]);

        let start = pos + FRAME_HEADER;
        if start + len > bytes.len() {
            break;
        }

        let payload = &bytes[start..start + len];
        if crc32fast::hash(payload) != crc {
            return Err(Error::CorruptLogRecord {
                lsn: Lsn::new(records.len() as u64 + 1),
            });
        }

        records.push(payload.to_vec());
        pos = start + len;
    }

    Ok(LogScan {
        records,
        valid_end: pos as u64,
    })
}
