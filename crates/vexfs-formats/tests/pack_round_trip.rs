#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Round-trip tests: directories produced by `PackBuilder` parse back to the
//! exact set of paths and metadata that went in.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::BTreeMap;
use vexfs_formats::pack::{
    EMBEDDED_ARCHIVE_INDEX, FormatError, PackBuilder, PackDirectory, Placement,
};

#[derive(Debug, Clone)]
struct FileCase {
    path: String,
    data: Vec<u8>,
    preload: usize,
    placement: Placement,
}

fn path_component() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,7}"
}

fn file_path() -> impl Strategy<Value = String> {
    (
        prop::collection::vec(path_component(), 0..3),
        path_component(),
        prop::option::of("[a-z]{1,4}"),
    )
        .prop_map(|(dirs, name, ext)| {
            let mut path = dirs.join("/");
            if !path.is_empty() {
                path.push('/');
            }
            path.push_str(&name);
            if let Some(ext) = ext {
                path.push('.');
                path.push_str(&ext);
            }
            path
        })
}

fn placement() -> impl Strategy<Value = Placement> {
    prop_oneof![Just(Placement::Embedded), (0u16..4).prop_map(Placement::Part)]
}

fn file_case() -> impl Strategy<Value = FileCase> {
    (
        file_path(),
        prop::collection::vec(any::<u8>(), 0..64),
        0usize..32,
        placement(),
    )
        .prop_map(|(path, data, preload, placement)| FileCase {
            path,
            data,
            preload,
            placement,
        })
}

fn unique_cases() -> impl Strategy<Value = Vec<FileCase>> {
    prop::collection::vec(file_case(), 0..24).prop_map(|cases| {
        let mut seen = BTreeMap::new();
        for case in cases {
            seen.entry(case.path.clone()).or_insert(case);
        }
        seen.into_values().collect()
    })
}

proptest! {
    #[test]
    fn directory_round_trip(cases in unique_cases(), version in 1u32..=2) {
        let mut builder = PackBuilder::new(version).unwrap();
        for case in &cases {
            builder.add_file(&case.path, &case.data, case.preload, case.placement).unwrap();
        }
        let built = builder.build().unwrap();
        let directory = PackDirectory::parse(&built.directory).unwrap();

        let expected: Vec<&str> = cases.iter().map(|s| s.path.as_str()).collect();
        let actual: Vec<&str> = directory.catalog.paths().collect();
        prop_assert_eq!(actual, expected);

        for case in &cases {
            let entry = directory.catalog.get(&case.path).unwrap();
            let preload = case.preload.min(case.data.len());
            prop_assert_eq!(entry.crc32, crc32fast::hash(&case.data));
            prop_assert_eq!(entry.size(), case.data.len() as u64);
            prop_assert_eq!(entry.preload.as_ref(), &case.data[..preload]);

            // The remainder must be exactly where the entry says it is.
            let remainder = &case.data[preload..];
            let start = entry.entry_offset as usize;
            let end = start + remainder.len();
            match case.placement {
                Placement::Embedded => {
                    prop_assert_eq!(entry.archive_index, EMBEDDED_ARCHIVE_INDEX);
                    let base = directory.data_offset() as usize;
                    prop_assert_eq!(&built.directory[base + start..base + end], remainder);
                }
                Placement::Part(index) => {
                    prop_assert_eq!(entry.archive_index, index);
                    prop_assert_eq!(&built.parts[&index][start..end], remainder);
                }
            }
        }
    }
}

#[test]
fn empty_pack_parses() {
    let built = PackBuilder::new(1).unwrap().build().unwrap();
    // Header plus a single empty-extension terminator.
    assert_eq!(built.directory.len(), 13);
    let directory = PackDirectory::parse(&built.directory).unwrap();
    assert!(directory.catalog.is_empty());
}

#[test]
fn corrupted_terminator_fails() {
    let mut builder = PackBuilder::new(1).unwrap();
    builder
        .add_file("x.txt", b"payload", 0, Placement::Part(0))
        .unwrap();
    let mut built = builder.build().unwrap();

    // Layout: header(12) "txt\0" " \0" "x\0" then the 18-byte record.
    let terminator = 12 + 4 + 2 + 2 + 16;
    assert_eq!(&built.directory[terminator..terminator + 2], &[0xFF, 0xFF]);
    built.directory[terminator] = 0x00;

    let err = PackDirectory::parse(&built.directory).unwrap_err();
    match err {
        FormatError::BadTerminator { found, .. } => assert_eq!(found, 0xFF00),
        other => panic!("unexpected error: {other}"),
    }
}
