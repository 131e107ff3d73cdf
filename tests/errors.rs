mod common;

use std::fs::OpenOptions;

use byteorder::{ByteOrder, LittleEndian};
use common::{random_particles, Recorder, TempFile};
use sphdb::{BuildOptions, Database, DatabaseError, FileDatabase};

const HEADER_SIZE: usize = 32;
const BLOCK_SIZE: usize = 12;
const PARTICLE_SIZE: u64 = 36;

fn build(name: &str, count: usize, blocks_per_axis: usize) -> TempFile {
    let file = TempFile::new(name);
    let mut particles = random_particles(count, 10.0, count as u64);
    FileDatabase::create(&mut particles, file.path(), &BuildOptions::new(blocks_per_axis)).unwrap();
    file
}

#[test]
fn test_open_missing_file() {
    let file = TempFile::new("missing");
    match FileDatabase::open(file.path()) {
        Err(DatabaseError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
        other => panic!("expected an I/O error, got {:?}", other),
    }
}

#[test]
fn test_invalid_blocks_per_axis_writes_nothing() {
    let file = TempFile::new("invalid-config");
    let mut particles = random_particles(10, 1.0, 1);
    let result = FileDatabase::create(&mut particles, file.path(), &BuildOptions::new(0));
    assert!(matches!(result, Err(DatabaseError::InvalidConfig(_))));
    assert!(!file.path().exists());
}

#[test]
fn test_block_counts_must_sum_to_count() {
    let file = build("corrupt-sum", 50, 2);
    let mut bytes = std::fs::read(file.path()).unwrap();
    // bump the count of the last block
    let last = HEADER_SIZE + 7 * BLOCK_SIZE + 4;
    let count = LittleEndian::read_u32(&bytes[last..last + 4]);
    LittleEndian::write_u32(&mut bytes[last..last + 4], count + 1);
    std::fs::write(file.path(), &bytes).unwrap();

    assert!(matches!(FileDatabase::open(file.path()), Err(DatabaseError::Corrupt(_))));
}

#[test]
fn test_zero_blocks_per_axis_rejected() {
    let file = build("corrupt-blocks", 10, 2);
    let mut bytes = std::fs::read(file.path()).unwrap();
    LittleEndian::write_u32(&mut bytes[28..32], 0);
    std::fs::write(file.path(), &bytes).unwrap();

    assert!(matches!(FileDatabase::open(file.path()), Err(DatabaseError::Corrupt(_))));
}

#[test]
fn test_oversized_block_table_rejected() {
    let file = build("corrupt-huge-table", 10, 2);
    let mut bytes = std::fs::read(file.path()).unwrap();
    // blocks_per_axis^3 * BLOCK_SIZE overflows u64
    LittleEndian::write_u32(&mut bytes[28..32], 3_000_000);
    std::fs::write(file.path(), &bytes).unwrap();

    match FileDatabase::open(file.path()) {
        Err(DatabaseError::Corrupt(msg)) => assert!(msg.contains("3000000^3"), "{}", msg),
        other => panic!("expected a corrupt table, got {:?}", other),
    }

    // large but representable tables must not fit in the file either
    LittleEndian::write_u32(&mut bytes[28..32], 100_000);
    std::fs::write(file.path(), &bytes).unwrap();
    assert!(matches!(FileDatabase::open(file.path()), Err(DatabaseError::Corrupt(_))));
}

#[test]
fn test_truncated_header() {
    let file = build("short-header", 10, 2);
    OpenOptions::new().write(true).open(file.path()).unwrap().set_len(20).unwrap();

    assert!(matches!(
        FileDatabase::open(file.path()),
        Err(DatabaseError::Truncated { offset: 0 })
    ));
}

#[test]
fn test_truncated_payload_rejected_at_open() {
    let file = build("short-payload", 40, 2);
    let len = std::fs::metadata(file.path()).unwrap().len();
    OpenOptions::new().write(true).open(file.path()).unwrap().set_len(len - 10).unwrap();

    assert!(matches!(FileDatabase::open(file.path()), Err(DatabaseError::Corrupt(_))));
}

#[test]
fn test_truncation_during_scan_is_reported() {
    let file = build("short-scan", 100, 1);
    let db = FileDatabase::open(file.path()).unwrap();
    assert_eq!(Some(db.data_offset()), db.header().data_offset());

    // cut the file after ten and a half particles, behind the open database's back
    let cut = db.data_offset() + 10 * PARTICLE_SIZE + PARTICLE_SIZE / 2;
    OpenOptions::new().write(true).open(file.path()).unwrap().set_len(cut).unwrap();

    let mut recorder = Recorder::default();
    let result = db.accept(&mut recorder);
    match result {
        Err(DatabaseError::Truncated { offset }) => {
            assert_eq!(offset, db.data_offset() + 10 * PARTICLE_SIZE)
        }
        other => panic!("expected truncation, got {:?}", other),
    }
    assert_eq!(recorder.visited.len(), 10);
    assert_eq!(recorder.begins, 1);
    assert_eq!(recorder.ends, 0, "a failed scan must not report completion");

    let mut recorder = Recorder::default();
    let result = db.accept_range(db.lower_bounds(), db.upper_bounds(), &mut recorder);
    assert!(matches!(result, Err(DatabaseError::Truncated { .. })));
    assert_eq!(recorder.ends, 0);
}

#[test]
fn test_scan_of_removed_file_fails() {
    let file = build("removed", 20, 2);
    let db = FileDatabase::open(file.path()).unwrap();
    std::fs::remove_file(file.path()).unwrap();

    let mut recorder = Recorder::default();
    assert!(matches!(db.accept(&mut recorder), Err(DatabaseError::Io(_))));
    assert_eq!(recorder.begins, 0);
}
