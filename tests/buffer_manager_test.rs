//! Integration tests for the buffer manager.
//!
//! These tests verify cross-component behavior that unit tests don't cover:
//! the buffer manager over a real file manager and log.

use blockmgr::storage::BlockStore;
use blockmgr::{
    BlockId, BufferManager, Error, FileManager, LogManager, Lsn, Page, TxnId, WaitPolicy,
};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::{tempdir, TempDir};

struct Db {
    fm: Arc<FileManager>,
    log: Arc<LogManager>,
    dir: TempDir,
}

fn open_db() -> Db {
    let dir = tempdir().unwrap();
    let fm = Arc::new(FileManager::open(dir.path().join("db")).unwrap());
    let log = Arc::new(LogManager::open(dir.path().join("wal.log")).unwrap());
    Db { fm, log, dir }
}

fn manager(db: &Db, pool_size: usize, policy: WaitPolicy) -> Arc<BufferManager> {
    Arc::new(BufferManager::with_policy(
        db.fm.clone(),
        db.log.clone(),
        pool_size,
        policy,
    ))
}

fn new_blocks(fm: &FileManager, file: &str, n: usize) -> Vec<BlockId> {
    (0..n).map(|_| fm.append_new_block(file).unwrap()).collect()
}

/// Three frames pinned to A, B, C; pinning D waits until A is unpinned and
/// then reuses A's frame.
#[test]
fn test_pin_waits_for_unpin_and_reuses_frame() {
    let db = open_db();
    let bm = manager(&db, 3, WaitPolicy::default());
    let blks = new_blocks(&db.fm, "t", 4);

    let a = bm.pin(&blks[0]).unwrap();
    let _b = bm.pin(&blks[1]).unwrap();
    let _c = bm.pin(&blks[2]).unwrap();
    assert_eq!(bm.available(), 0);

    let waiter = {
        let bm = Arc::clone(&bm);
        let d = blks[3].clone();
        thread::spawn(move || bm.pin(&d))
    };

    thread::sleep(Duration::from_millis(100));
    bm.unpin(&a);

    let d = waiter.join().unwrap().unwrap();
    assert_eq!(d.id(), a.id());
    assert_eq!(d.block(), Some(blks[3].clone()));
    assert_eq!(bm.pin_count(&blks[0]), None);
    assert_eq!(bm.available(), 0);
}

/// A full pool with nothing released aborts once the deadline passes.
#[test]
fn test_pin_times_out() {
    let db = open_db();
    let policy = WaitPolicy::default()
        .with_max_wait(Duration::from_millis(150))
        .with_poll_interval(Duration::from_millis(25));
    let bm = manager(&db, 2, policy);
    let blks = new_blocks(&db.fm, "t", 3);

    let _a = bm.pin(&blks[0]).unwrap();
    let _b = bm.pin(&blks[1]).unwrap();

    let start = Instant::now();
    let result = bm.pin(&blks[2]);
    assert!(matches!(result, Err(Error::BufferAbort { .. })));
    assert!(start.elapsed() >= Duration::from_millis(150));

    let stats = bm.stats().snapshot();
    assert_eq!(stats.waits, 1);
    assert_eq!(stats.aborts, 1);
}

/// Data survives eviction cycles through a small pool.
#[test]
fn test_data_persists_across_evictions() {
    let db = open_db();
    let bm = manager(&db, 2, WaitPolicy::NO_WAIT);
    let blks = new_blocks(&db.fm, "t", 6);

    for (i, blk) in blks.iter().enumerate() {
        let guard = bm.pin_scoped(blk).unwrap();
        guard.page_mut().set_i32(0, i as i32 * 11);
        guard.page_mut().set_string(8, &format!("block {}", i));
        guard.set_modified(TxnId::new(1), None);
    }

    for (i, blk) in blks.iter().enumerate() {
        let guard = bm.pin_scoped(blk).unwrap();
        let page = guard.page();
        assert_eq!(page.get_i32(0), i as i32 * 11);
        assert_eq!(page.get_string(8), format!("block {}", i));
    }
}

/// Flushed pages are visible to a fresh file manager over the same directory.
#[test]
fn test_flush_and_reopen() {
    let db = open_db();
    let blk;
    {
        let bm = manager(&db, 4, WaitPolicy::NO_WAIT);
        blk = db.fm.append_new_block("accounts").unwrap();

        let lsn = db.log.append(b"accounts:0 balance 500").unwrap();
        let buffer = bm.pin(&blk).unwrap();
        buffer.page_mut().set_i32(0, 500);
        buffer.set_modified(TxnId::new(7), Some(lsn));
        bm.unpin(&buffer);

        bm.flush_modified_by(TxnId::new(7)).unwrap();
        assert_eq!(db.log.flushed_lsn(), Some(lsn));
    }

    let reopened = FileManager::open(db.dir.path().join("db")).unwrap();
    assert!(!reopened.is_new());
    assert_eq!(reopened.block_count("accounts").unwrap(), 1);

    let mut page = Page::new();
    reopened.read(&blk, &mut page).unwrap();
    assert_eq!(page.get_i32(0), 500);
}

/// Evicting a modified frame forces the log up to its LSN first.
#[test]
fn test_eviction_flushes_log_first() {
    let db = open_db();
    let bm = manager(&db, 1, WaitPolicy::NO_WAIT);
    let blks = new_blocks(&db.fm, "t", 2);

    db.log.append(b"first").unwrap();
    let lsn = db.log.append(b"second").unwrap();
    db.log.append(b"third").unwrap();

    let buffer = bm.pin(&blks[0]).unwrap();
    buffer.page_mut().set_i32(0, 1);
    buffer.set_modified(TxnId::new(3), Some(lsn));
    bm.unpin(&buffer);
    assert_eq!(db.log.flushed_lsn(), None);

    let other = bm.pin(&blks[1]).unwrap();
    assert_eq!(other.id(), buffer.id());
    assert!(db.log.flushed_lsn() >= Some(lsn));
    assert!(db.log.flushed_lsn() >= Some(Lsn::new(1)));
}

/// Concurrent workers pin and unpin random blocks; the pool stays
/// consistent and every frame ends up available.
#[test]
fn test_concurrent_pin_unpin() {
    let db = open_db();
    let bm = manager(&db, 4, WaitPolicy::default());
    let blks = Arc::new(new_blocks(&db.fm, "t", 10));

    let handles: Vec<_> = (0..6)
        .map(|worker| {
            let bm = Arc::clone(&bm);
            let blks = Arc::clone(&blks);
            thread::spawn(move || {
                for i in 0..50 {
                    let blk = &blks[(worker * 7 + i * 3) % blks.len()];
                    let guard = bm.pin_scoped(blk).unwrap();
                    assert_eq!(guard.block().as_ref(), Some(blk));
                    assert!(guard.pin_count() >= 1);
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(bm.available(), bm.pool_size());
    assert_eq!(bm.unpinned_frames().len(), 4);
}

/// A pin on a block past the end of its file fails without leaking a frame.
#[test]
fn test_pin_missing_block() {
    let db = open_db();
    let bm = manager(&db, 2, WaitPolicy::NO_WAIT);

    let result = bm.pin(&BlockId::new("empty", 0));
    assert!(matches!(result, Err(Error::BlockNotFound(_))));
    assert_eq!(bm.available(), 2);
}

/// Single frame pinned twice: two unpins free it, a third unpin is ignored.
#[test]
fn test_reentrant_pin_single_frame() {
    let db = open_db();
    let bm = manager(&db, 1, WaitPolicy::NO_WAIT);
    let blks = new_blocks(&db.fm, "t", 2);

    let first = bm.pin(&blks[0]).unwrap();
    let second = bm.pin(&blks[0]).unwrap();
    assert_eq!(first.id(), second.id());

    bm.unpin(&first);
    assert!(bm.pin(&blks[1]).is_err());

    bm.unpin(&second);
    assert_eq!(bm.available(), 1);

    bm.unpin(&second);
    assert_eq!(bm.available(), 1);
    assert_eq!(second.pin_count(), 0);

    let other = bm.pin(&blks[1]).unwrap();
    assert_eq!(other.id(), first.id());
    assert_eq!(bm.available(), 0);
}

/// A writer marks its frame modified while still holding the page guard,
/// racing a commit-time flush of the same frame. Both must finish.
#[test]
fn test_set_modified_under_page_guard_races_flush() {
    let db = open_db();
    let bm = manager(&db, 2, WaitPolicy::NO_WAIT);
    let blks = new_blocks(&db.fm, "t", 1);

    let buffer = bm.pin(&blks[0]).unwrap();
    buffer.page_mut().set_i32(0, 1);
    buffer.set_modified(TxnId::new(1), None);

    let (done_tx, done_rx) = mpsc::channel();
    let writer = {
        let buffer = Arc::clone(&buffer);
        thread::spawn(move || {
            let mut page = buffer.page_mut();
            thread::sleep(Duration::from_millis(200));
            page.set_i32(0, 2);
            buffer.set_modified(TxnId::new(1), None);
            drop(page);
            done_tx.send(()).unwrap();
        })
    };

    thread::sleep(Duration::from_millis(50));
    let flusher = {
        let bm = Arc::clone(&bm);
        thread::spawn(move || bm.flush_modified_by(TxnId::new(1)))
    };

    assert!(
        done_rx.recv_timeout(Duration::from_secs(3)).is_ok(),
        "writer blocked behind flush"
    );
    writer.join().unwrap();
    flusher.join().unwrap().unwrap();

    bm.flush_modified_by(TxnId::new(1)).unwrap();
    let mut on_disk = Page::new();
    db.fm.read(&blks[0], &mut on_disk).unwrap();
    assert_eq!(on_disk.get_i32(0), 2);
    assert!(!buffer.is_modified());
}
