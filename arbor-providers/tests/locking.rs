mod common;

use arbor_core::{ArborError, FsConfig, FsNode, LockConfig};
use common::{each_backend, read, seed_src, write};
use std::io::Write;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[test]
fn concurrent_writers_exactly_one_wins() {
    each_backend(FsConfig::default(), |fs| {
        let start = Arc::new(Barrier::new(2));
        let attempted = Arc::new(Barrier::new(2));

        let handles: Vec<_> = ["first", "second"]
            .into_iter()
            .map(|tag| {
                let file = fs.file("/contended.txt");
                let start = Arc::clone(&start);
                let attempted = Arc::clone(&attempted);
                thread::spawn(move || {
                    start.wait();
                    let opened = file.open_writable(Duration::from_millis(1));
                    // Hold the winner's lock until the loser has given up.
                    attempted.wait();
                    match opened {
                        Ok(mut writer) => {
                            for _ in 0..64 {
                                writer.write_all(tag.as_bytes()).unwrap();
                            }
                            writer.finish().unwrap();
                            Ok(tag)
                        }
                        Err(e) => Err(e),
                    }
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        let losers: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();

        assert_eq!(winners.len(), 1);
        assert_eq!(losers.len(), 1);
        assert!(matches!(losers[0], ArborError::LockTimeout { .. }), "{}", losers[0]);
        assert_eq!(read(fs, "/contended.txt"), winners[0].repeat(64));
    });
}

#[test]
fn copy_aborts_when_source_file_is_locked() {
    let config = FsConfig {
        locks: LockConfig {
            source_read_ms: 20,
            ..LockConfig::default()
        },
        ..FsConfig::default()
    };
    each_backend(config, |fs| {
        seed_src(fs);
        let held = fs
            .backend()
            .locks()
            .acquire(fs.file("/src/a.txt").path(), Duration::from_secs(1))
            .unwrap();

        let err = fs.folder("/src").copy_to(&fs.folder("/dst")).unwrap_err();
        assert!(err.is_timeout(), "{err}");
        // Nothing after the failing file was attempted.
        assert!(!fs.folder("/dst/sub").exists().unwrap());

        drop(held);
        fs.folder("/src").copy_to(&fs.folder("/dst")).unwrap();
        assert_eq!(read(fs, "/dst/sub/b.txt"), "yo");
    });
}

#[test]
fn copy_reports_locked_destination_as_invariant_breach() {
    each_backend(FsConfig::default(), |fs| {
        write(fs, "/src/a.txt", "hi");
        let _held = fs
            .backend()
            .locks()
            .acquire(fs.file("/dst/a.txt").path(), Duration::from_secs(1))
            .unwrap();

        let err = fs.folder("/src").copy_to(&fs.folder("/dst")).unwrap_err();
        assert!(matches!(err, ArborError::LockInvariant(_)), "{err}");
    });
}

#[test]
fn open_handle_blocks_delete_until_closed() {
    each_backend(FsConfig::default(), |fs| {
        write(fs, "/f.txt", "x");
        let file = fs.file("/f.txt");
        let reader = file.open_readable(Duration::from_millis(10)).unwrap();

        let other = file.clone();
        let blocked = thread::spawn(move || other.delete());
        thread::sleep(Duration::from_millis(20));
        assert!(file.exists().unwrap());

        drop(reader);
        blocked.join().unwrap().unwrap();
        assert!(!file.exists().unwrap());
    });
}
