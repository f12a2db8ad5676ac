mod common;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use common::{FixedClock, GatedDisk};
use tomofs::{CancelToken, Error, FileType, InodeNumber, TomoFileSystem};

const THREADS: usize = 8;
const PER_THREAD: usize = 6;

#[test]
fn concurrent_creates_lose_nothing() {
    let (_disk, fs) = common::formatted(64);
    let fs = Arc::new(fs);
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let fs = fs.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let cx = CancelToken::new();
                barrier.wait();
                (0..PER_THREAD)
                    .map(|i| {
                        let name = format!("t{t}-{i}");
                        let ino = fs.create_entry(&cx, fs.root(), &name, FileType::File)?;
                        Ok::<_, Error>((name, ino))
                    })
                    .collect::<Result<Vec<_>, Error>>()
            })
        })
        .collect();

    let created: Vec<(String, InodeNumber)> = handles
        .into_iter()
        .flat_map(|handle| handle.join().unwrap().unwrap())
        .collect();
    let cx = CancelToken::new();

    assert_eq!(THREADS * PER_THREAD, created.len());
    let root = fs.read_inode(&cx, fs.root()).unwrap();
    assert_eq!(Some(created.len() as u64), root.child_count());

    let inos: HashSet<_> = created.iter().map(|(_, ino)| *ino).collect();
    assert_eq!(created.len(), inos.len());
    assert!(!inos.contains(&InodeNumber::SENTINEL));
    assert!(!inos.contains(&InodeNumber::ROOT));

    let listed: HashSet<_> = fs
        .read_dir(&cx, fs.root())
        .unwrap()
        .into_iter()
        .map(|entry| (entry.name().into_owned(), entry.inode()))
        .collect();
    let expected: HashSet<_> = created.iter().cloned().collect();
    assert_eq!(expected, listed);

    for (name, ino) in &created {
        assert_eq!(*ino, fs.find_entry(&cx, fs.root(), name).unwrap());
    }

    let stat = fs.stat_fs(&cx).unwrap();
    assert_eq!(created.len() as u64 + 1, stat.inode_count);
    assert_eq!(60 - created.len() as u64, stat.free_blocks);
}

#[test]
fn racing_for_the_last_blocks() {
    // 4 metadata blocks and 5 free: exactly 5 creations can win
    let (_disk, fs) = common::formatted(9);
    let fs = Arc::new(fs);
    let barrier = Arc::new(Barrier::new(THREADS));

    let results: Vec<_> = (0..THREADS)
        .map(|t| {
            let fs = fs.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                fs.create_entry(&CancelToken::new(), fs.root(), &format!("r{t}"), FileType::File)
            })
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    let wins = results.iter().filter(|res| res.is_ok()).count();
    assert_eq!(5, wins);
    assert!(
        results
            .iter()
            .filter_map(|res| res.err())
            .all(|err| err == Error::OutOfSpace)
    );

    let cx = CancelToken::new();
    assert_eq!(
        Some(wins as u64),
        fs.read_inode(&cx, fs.root()).unwrap().child_count()
    );
    assert_eq!(wins, fs.read_dir(&cx, fs.root()).unwrap().len());
}

#[test]
fn lookups_run_alongside_creates() {
    let (_disk, fs) = common::formatted(64);
    let cx = CancelToken::new();
    let anchor = fs.create_entry(&cx, fs.root(), "anchor", FileType::File).unwrap();
    let fs = Arc::new(fs);

    let done = AtomicBool::new(false);

    thread::scope(|s| {
        s.spawn(|| {
            let cx = CancelToken::new();
            for i in 0..40 {
                fs.create_entry(&cx, fs.root(), &format!("w{i}"), FileType::File)
                    .unwrap();
            }
            done.store(true, Ordering::SeqCst);
        });
        s.spawn(|| {
            let cx = CancelToken::new();
            let mut last_len = 0;
            while !done.load(Ordering::SeqCst) {
                assert_eq!(anchor, fs.find_entry(&cx, fs.root(), "anchor").unwrap());
                let entries = fs.read_dir(&cx, fs.root()).unwrap();
                assert!(entries.len() >= last_len);
                last_len = entries.len();
            }
        });
    });

    assert_eq!(
        Some(41),
        fs.read_inode(&cx, fs.root()).unwrap().child_count()
    );
}

#[test]
fn cancelled_before_locking_allocates_nothing() {
    let (disk, fs) = common::formatted(16);
    let cx = CancelToken::new();
    cx.cancel();
    let before = disk.snapshot();

    assert_eq!(
        Err(Error::Cancelled),
        fs.create_entry(&cx, fs.root(), "never", FileType::File)
    );
    assert_eq!(Err(Error::Cancelled), fs.find_entry(&cx, fs.root(), "never"));
    assert_eq!(Err(Error::Cancelled), fs.stat_fs(&cx).map(|_| ()));
    assert_eq!(before, disk.snapshot());

    let live = CancelToken::new();
    assert_eq!(1, fs.stat_fs(&live).unwrap().inode_count);
    assert_eq!(Err(Error::NotFound), fs.find_entry(&live, fs.root(), "never"));
}

#[test]
fn cancel_releases_a_waiting_create() {
    common::init_logger();
    let disk = Arc::new(GatedDisk::new(16));
    let fs = TomoFileSystem::format(disk.clone(), Arc::new(FixedClock(0))).unwrap();
    let waiter_cx = CancelToken::new();

    thread::scope(|s| {
        // parks inside its first write while holding every lock
        disk.close();
        let holder = s.spawn(|| {
            fs.create_entry(&CancelToken::new(), fs.root(), "holder", FileType::File)
        });
        while !disk.has_parked_writer() {
            thread::sleep(Duration::from_millis(1));
        }

        let waiter = s.spawn(|| fs.create_entry(&waiter_cx, fs.root(), "waiter", FileType::File));
        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());
        waiter_cx.cancel();
        assert_eq!(Err(Error::Cancelled), waiter.join().unwrap());

        disk.open();
        assert_eq!(Ok(InodeNumber::new(2)), holder.join().unwrap());
    });

    let cx = CancelToken::new();
    assert_eq!(Some(1), fs.read_inode(&cx, fs.root()).unwrap().child_count());
    assert_eq!(Err(Error::NotFound), fs.find_entry(&cx, fs.root(), "waiter"));
    assert_eq!(2, fs.stat_fs(&cx).unwrap().inode_count);
}

#[test]
fn cancel_drops_locks_already_taken() {
    common::init_logger();
    let disk = Arc::new(GatedDisk::new(16));
    let fs = TomoFileSystem::format(disk.clone(), Arc::new(FixedClock(0))).unwrap();
    let file = fs
        .create_entry(&CancelToken::new(), fs.root(), "f", FileType::File)
        .unwrap();
    let creator_cx = CancelToken::new();
    let stat_cx = CancelToken::new();

    thread::scope(|s| {
        // parks holding the inode table and directory locks, not the superblock
        disk.close();
        let writer = s.spawn(|| fs.write_at(&CancelToken::new(), file, 0, b"data"));
        while !disk.has_parked_writer() {
            thread::sleep(Duration::from_millis(1));
        }

        // takes the superblock lock, then spins on the inode table
        let creator = s.spawn(|| fs.create_entry(&creator_cx, fs.root(), "late", FileType::File));
        thread::sleep(Duration::from_millis(20));
        assert!(!creator.is_finished());

        let stat = s.spawn(|| fs.stat_fs(&stat_cx));
        thread::sleep(Duration::from_millis(20));
        assert!(!stat.is_finished());
        stat_cx.cancel();
        assert_eq!(Err(Error::Cancelled), stat.join().unwrap());

        creator_cx.cancel();
        assert_eq!(Err(Error::Cancelled), creator.join().unwrap());

        // the superblock lock came back with the cancelled create
        let stat = fs.stat_fs(&CancelToken::new()).unwrap();
        assert_eq!(2, stat.inode_count);
        assert!(!writer.is_finished());

        disk.open();
        assert_eq!(Ok(4), writer.join().unwrap());
    });

    let cx = CancelToken::new();
    assert_eq!(Err(Error::NotFound), fs.find_entry(&cx, fs.root(), "late"));
    assert_eq!(Some(1), fs.read_inode(&cx, fs.root()).unwrap().child_count());
}
