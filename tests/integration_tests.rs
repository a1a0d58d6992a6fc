//! Integration tests for sndo
//!
//! End-to-end flow: build records, store them as blocks, reopen the file,
//! traverse and parse everything back, and salvage past damage.

use std::fs;
use std::path::{Path, PathBuf};

use sndo::{BlockType, Config, MemRecord, Mmfile, PackedRecord, SndoError};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

const ROW: BlockType = match BlockType::new(1) {
    Some(t) => t,
    None => panic!(),
};

const BLOB: BlockType = match BlockType::new(2) {
    Some(t) => t,
    None => panic!(),
};

fn setup() -> (TempDir, PathBuf, Config) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("db.sndo");
    let config = Config::builder()
        .chunk_size(1024)
        .max_chunks_mapped(3)
        .build()
        .unwrap();
    (temp_dir, path, config)
}

fn row(i: usize) -> MemRecord {
    let mut record = MemRecord::new();
    record.add(format!("key-{:04}", i));
    record.add(vec![b'v'; i % 40]);
    if i % 3 == 0 {
        record.add(i.to_le_bytes().to_vec());
    }
    record
}

/// Store `count` rows (and a blob every tenth row), returning row addresses
fn populate(path: &Path, config: &Config, count: usize) -> Vec<u64> {
    let file = Mmfile::open_with(path, config).unwrap();
    let mut addresses = Vec::new();

    for i in 0..count {
        addresses.push(row(i).store_to(&file, ROW).unwrap());
        if i % 10 == 0 {
            file.append(BLOB, &vec![0xee; 500]).unwrap();
        }
    }

    file.force().unwrap();
    file.close();
    addresses
}

// =============================================================================
// Round-Trip Tests
// =============================================================================

#[test]
fn test_store_reopen_and_scan() {
    let (_temp, path, config) = setup();
    let addresses = populate(&path, &config, 200);

    let file = Mmfile::open_with(&path, &config).unwrap();
    assert!(file.stats().chunk_count > 3, "test should span more chunks than the working set");

    let mut rows = 0;
    let mut blobs = 0;
    for block in file.blocks() {
        let block = block.unwrap();
        if block.block_type() == BLOB {
            blobs += 1;
            continue;
        }

        let record = PackedRecord::parse(&block).unwrap();
        assert_eq!(block.address(), addresses[rows]);
        assert_eq!(MemRecord::from(record), row(rows));
        rows += 1;
        assert!(file.stats().mapped_chunks <= 3);
    }

    assert_eq!(rows, 200);
    assert_eq!(blobs, 20);
}

#[test]
fn test_random_access_by_address() {
    let (_temp, path, config) = setup();
    let addresses = populate(&path, &config, 120);

    let file = Mmfile::open_with(&path, &config).unwrap();
    for i in (0..120).rev().step_by(7) {
        let view = file.view(addresses[i]).unwrap();
        let record = PackedRecord::parse(&view).unwrap();

        assert_eq!(record.get(0), format!("key-{:04}", i).as_bytes());
        assert_eq!(record.size(1), i % 40);
        // Rows written with two fields read a third as empty
        if i % 3 != 0 {
            assert_eq!(record.get(2), b"");
        }
    }
}

// =============================================================================
// Salvage Tests
// =============================================================================

#[test]
fn test_salvage_up_to_corruption() {
    let (_temp, path, config) = setup();
    let addresses = populate(&path, &config, 50);

    // Smash the header of row 30
    let damaged = addresses[30] - 4;
    let mut raw = fs::read(&path).unwrap();
    raw[damaged as usize..damaged as usize + 4].copy_from_slice(&[0x13, 0x37, 0, 0]);
    fs::write(&path, raw).unwrap();

    let file = Mmfile::open_with(&path, &config).unwrap();
    let mut salvaged = Vec::new();
    let mut stopped_at = None;

    for block in file.blocks() {
        match block {
            Ok(view) if view.block_type() == ROW => {
                salvaged.push(MemRecord::from(PackedRecord::parse(&view).unwrap()));
            }
            Ok(_) => {}
            Err(SndoError::Corruption { address, .. }) => stopped_at = Some(address),
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(stopped_at, Some(damaged));
    assert_eq!(salvaged.len(), 30);
    assert_eq!(salvaged[29], row(29));

    let report = file.verify().unwrap();
    assert_eq!(report.corrupt_at, Some(damaged));
    assert_eq!(report.blocks, 30 + 3);

    // Rebuild into a fresh file from the salvaged rows
    let rebuilt_path = path.with_extension("rebuilt");
    let rebuilt = Mmfile::open_with(&rebuilt_path, &config).unwrap();
    for record in &salvaged {
        record.store_to(&rebuilt, ROW).unwrap();
    }
    let clean = rebuilt.verify().unwrap();
    assert!(clean.is_clean());
    assert_eq!(clean.blocks, 30);
}

#[test]
fn test_appends_after_reopen_are_visible_to_reset_iterator() {
    let (_temp, path, config) = setup();
    populate(&path, &config, 5);

    let file = Mmfile::open_with(&path, &config).unwrap();
    let mut blocks = file.blocks();
    assert_eq!(blocks.by_ref().count(), 6);

    row(99).store_to(&file, ROW).unwrap();
    assert!(blocks.next().is_none());

    blocks.reset();
    assert_eq!(blocks.count(), 7);
}
