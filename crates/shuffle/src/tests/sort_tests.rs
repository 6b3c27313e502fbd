use super::helpers::{make_record, pseudo_random_records, read_output};
use crate::*;
use anyhow::Result;
use record::RECORD_SIZE;
use std::fs;
use tempfile::tempdir;

#[test]
fn sorts_by_unsigned_key_bytes() {
    let mut records = vec![
        make_record(0xff, 0),
        make_record(0x00, 0),
        make_record(0x80, 0),
        make_record(0x7f, 0),
    ];
    sort_records(&mut records);

    let firsts: Vec<u8> = records.iter().map(|r| r.key()[0]).collect();
    assert_eq!(firsts, vec![0x00, 0x7f, 0x80, 0xff]);
}

#[test]
fn later_key_bytes_break_ties() {
    let mut a = [0u8; RECORD_SIZE];
    let mut b = [0u8; RECORD_SIZE];
    a[9] = 2;
    b[9] = 1;
    let mut records = vec![record::Record::new(a), record::Record::new(b)];
    sort_records(&mut records);
    assert_eq!(records[0].key()[9], 1);
}

#[test]
fn payload_does_not_affect_order() {
    let mut a = [0u8; RECORD_SIZE];
    let mut b = [0u8; RECORD_SIZE];
    a[50] = 9;
    b[50] = 1;
    let first = record::Record::new(a);
    let second = record::Record::new(b);
    let mut records = vec![first.clone(), second.clone()];
    sort_records(&mut records);

    // equal keys keep arrival order
    assert_eq!(records, vec![first, second]);
}

#[test]
fn write_sorted_concatenates_records() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("out.dat");
    let records = vec![make_record(1, 1), make_record(2, 2)];

    let bytes = write_sorted(&path, &records)?;
    assert_eq!(bytes, 2 * RECORD_SIZE as u64);
    assert_eq!(fs::metadata(&path)?.len(), bytes);
    assert_eq!(read_output(&path)?, records);

    // temp file is gone after the rename
    assert!(!dir.path().join("out.dat.tmp").exists());
    Ok(())
}

#[test]
fn empty_partition_writes_empty_file() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("out.dat");

    assert_eq!(write_sorted(&path, &[])?, 0);
    assert!(path.exists());
    assert_eq!(fs::metadata(&path)?.len(), 0);
    Ok(())
}

#[test]
fn write_replaces_existing_output() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("out.dat");
    fs::write(&path, b"stale contents")?;

    write_sorted(&path, &[make_record(5, 5)])?;
    assert_eq!(read_output(&path)?, vec![make_record(5, 5)]);
    Ok(())
}

#[test]
fn write_into_missing_directory_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("no/such/dir/out.dat");
    assert!(write_sorted(&path, &[make_record(1, 1)]).is_err());
}

#[test]
fn sort_and_write_produces_sorted_file() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("out.dat");
    let records = pseudo_random_records(1000, 42);

    sort_and_write(&path, records.clone())?;
    let out = read_output(&path)?;

    assert_eq!(out.len(), records.len());
    for pair in out.windows(2) {
        assert!(pair[0].key() <= pair[1].key());
    }
    Ok(())
}
