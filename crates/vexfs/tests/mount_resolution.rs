#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Mounting, enumeration, shadowing and precedence against on-disk packs.

mod common;

use common::{Fixture, pattern, write_pack};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use vexfs::{
    MountError, MountOptions, MountPrecedence, ResolvedLocation, Vfs, VfsConfig, VfsError,
};
use vexfs_formats::FormatError;
use vexfs_formats::pack::{EMBEDDED_ARCHIVE_INDEX, Placement};

#[test]
fn enumerate_matches_encoded_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let files = vec![
        Fixture::new("materials/wood.vmt", &pattern(40, 1), 8, Placement::Part(0)),
        Fixture::new("materials/metal.vmt", &pattern(3, 2), 0, Placement::Part(1)),
        Fixture::new("scripts/init", &pattern(12, 3), 12, Placement::Part(0)),
        Fixture::new("readme.txt", &pattern(20, 4), 5, Placement::Embedded),
    ];
    let pack = write_pack(dir.path(), "core", 2, &files);

    let vfs = Vfs::default();
    let handle = vfs.mount(&pack).unwrap();

    let mut paths: Vec<String> = vfs.enumerate(handle).unwrap().collect();
    paths.sort();
    let mut expected: Vec<String> = files.iter().map(|f| f.path.clone()).collect();
    expected.sort();
    assert_eq!(paths, expected);

    let mounted = vfs.pack(handle).unwrap();
    for file in &files {
        let entry = mounted.catalog().get(&file.path).unwrap();
        assert_eq!(entry.crc32, crc32fast::hash(&file.data));
        assert_eq!(entry.size(), file.data.len() as u64);
        let index = match file.placement {
            Placement::Embedded => EMBEDDED_ARCHIVE_INDEX,
            Placement::Part(index) => index,
        };
        assert_eq!(entry.archive_index, index);
        assert_eq!(vfs.read(&file.path).unwrap(), file.data);
    }

    let info = vfs.pack_info(handle).unwrap();
    assert_eq!(info.version, 2);
    assert_eq!(info.entry_count, 4);
    assert_eq!(info.archive_count, 2);
    assert_eq!(info.embedded_count, 1);
    assert_eq!(info.total_size, 75);
}

#[test]
fn loose_file_shadows_packed_entry() {
    let dir = tempfile::tempdir().unwrap();
    let pack = write_pack(
        dir.path(),
        "core",
        1,
        &[
            Fixture::new("cfg/game.cfg", b"packed config", 4, Placement::Part(0)),
            Fixture::new("cfg/other.cfg", b"other", 1, Placement::Part(0)),
        ],
    );
    let overrides = dir.path().join("overrides");
    std::fs::create_dir_all(overrides.join("cfg")).unwrap();
    std::fs::write(overrides.join("cfg/game.cfg"), b"loose config").unwrap();
    std::fs::write(overrides.join("cfg/extra.cfg"), b"loose only").unwrap();

    let vfs = Vfs::new(VfsConfig::new().with_loose_root(&overrides)).unwrap();
    vfs.mount(&pack).unwrap();

    assert!(vfs.resolve("cfg/game.cfg").unwrap().is_loose());
    assert_eq!(vfs.read("cfg/game.cfg").unwrap(), b"loose config");
    assert_eq!(vfs.read("cfg/other.cfg").unwrap(), b"other");
    assert!(vfs.exists("cfg/extra.cfg"));
    assert!(vfs.exists("Assets/cfg/other.cfg"));
    assert!(!vfs.exists("cfg/missing.cfg"));

    let stream = vfs.open("cfg/game.cfg").unwrap();
    assert!(!stream.is_packed());
    assert_eq!(stream.size(), 12);
}

#[test]
fn companion_and_explicit_loose_roots() {
    let dir = tempfile::tempdir().unwrap();
    let pack = write_pack(
        dir.path(),
        "maps",
        1,
        &[Fixture::new("level1.bsp", b"packed level", 2, Placement::Part(0))],
    );

    // Companion directory next to the pack.
    std::fs::create_dir_all(dir.path().join("maps")).unwrap();
    std::fs::write(dir.path().join("maps/level1.bsp"), b"companion level").unwrap();

    let vfs = Vfs::default();
    vfs.mount(&pack).unwrap();
    assert_eq!(vfs.read("level1.bsp").unwrap(), b"companion level");

    let no_companion = Vfs::new(VfsConfig::new().with_companion_dirs(false)).unwrap();
    no_companion.mount(&pack).unwrap();
    assert_eq!(no_companion.read("level1.bsp").unwrap(), b"packed level");

    let custom = dir.path().join("custom");
    std::fs::create_dir_all(&custom).unwrap();
    std::fs::write(custom.join("level1.bsp"), b"custom level").unwrap();
    let explicit = Vfs::default();
    explicit
        .mount_with(&pack, MountOptions::default().with_loose_root(&custom))
        .unwrap();
    assert_eq!(explicit.read("level1.bsp").unwrap(), b"custom level");
}

#[test]
fn mount_precedence_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_pack(
        dir.path(),
        "base",
        1,
        &[
            Fixture::new("shared.txt", b"from base", 3, Placement::Part(0)),
            Fixture::new("base_only.txt", b"b", 0, Placement::Part(0)),
        ],
    );
    let second = write_pack(
        dir.path(),
        "patch",
        2,
        &[Fixture::new("shared.txt", b"from patch", 3, Placement::Part(0))],
    );

    let owners = |precedence| {
        let vfs = Vfs::new(VfsConfig::new().with_precedence(precedence)).unwrap();
        let a = vfs.mount(&first).unwrap();
        let b = vfs.mount(&second).unwrap();
        let owner = vfs.resolve("shared.txt").unwrap().mount_handle().unwrap();
        (vfs.read("shared.txt").unwrap(), owner == a, owner == b)
    };

    for _ in 0..3 {
        assert_eq!(
            owners(MountPrecedence::FirstMounted),
            (b"from base".to_vec(), true, false)
        );
        assert_eq!(
            owners(MountPrecedence::LastMounted),
            (b"from patch".to_vec(), false, true)
        );
    }
}

#[test]
fn malformed_pack_leaves_mounts_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let good = write_pack(
        dir.path(),
        "good",
        1,
        &[Fixture::new("ok.txt", b"fine", 0, Placement::Part(0))],
    );
    let bad = write_pack(
        dir.path(),
        "bad",
        1,
        &[Fixture::new("x.txt", b"payload", 0, Placement::Part(0))],
    );

    // Layout: header(12) "txt\0" " \0" "x\0" then the 18-byte record.
    let mut bytes = std::fs::read(&bad).unwrap();
    let terminator = 12 + 4 + 2 + 2 + 16;
    bytes[terminator] = 0;
    std::fs::write(&bad, &bytes).unwrap();

    let vfs = Vfs::default();
    let handle = vfs.mount(&good).unwrap();
    let before: Vec<String> = vfs.enumerate(handle).unwrap().collect();

    let err = vfs.mount(&bad).unwrap_err();
    match err {
        VfsError::Mount(MountError::Format { source, .. }) => {
            assert!(matches!(source, FormatError::BadTerminator { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(vfs.mounts(), vec![handle]);
    let after: Vec<String> = vfs.enumerate(handle).unwrap().collect();
    assert_eq!(before, after);
    assert!(!vfs.exists("x.txt"));
}

#[test]
fn mount_errors_name_the_cause() {
    let dir = tempfile::tempdir().unwrap();
    let vfs = Vfs::default();

    let err = vfs.mount(dir.path().join("absent_dir.vpk")).unwrap_err();
    assert!(matches!(err, VfsError::Mount(MountError::Open { .. })));

    let garbage = dir.path().join("junk_dir.vpk");
    std::fs::write(&garbage, b"definitely not a pack").unwrap();
    let err = vfs.mount(&garbage).unwrap_err();
    assert!(matches!(
        err,
        VfsError::Mount(MountError::Format {
            source: FormatError::BadSignature(_),
            ..
        })
    ));

    let short = dir.path().join("short_dir.vpk");
    std::fs::write(&short, 0x55AA_1234u32.to_le_bytes()).unwrap();
    let err = vfs.mount(&short).unwrap_err();
    assert!(matches!(
        err,
        VfsError::Mount(MountError::Format {
            source: FormatError::TruncatedHeader,
            ..
        })
    ));

    assert!(vfs.mounts().is_empty());
}

#[test]
fn unmount_keeps_live_streams_readable() {
    let dir = tempfile::tempdir().unwrap();
    let data = pattern(10_000, 9);
    let pack = write_pack(
        dir.path(),
        "core",
        1,
        &[Fixture::new("big.bin", &data, 100, Placement::Part(0))],
    );

    let vfs = Vfs::default();
    let handle = vfs.mount(&pack).unwrap();
    let mut stream = vfs.open("big.bin").unwrap();
    let base = vfs.pack(handle).unwrap().base().to_path_buf();

    vfs.unmount(handle).unwrap();
    assert!(!vfs.exists("big.bin"));
    assert!(matches!(vfs.unmount(handle), Err(VfsError::NotMounted(_))));
    assert!(vfs.pool().is_open(&base, 0));

    let mut out = Vec::new();
    std::io::Read::read_to_end(&mut stream, &mut out).unwrap();
    assert_eq!(out, data);

    drop(stream);
    assert!(!vfs.pool().is_open(&base, 0));
}

#[test]
fn missing_part_fails_at_open() {
    let dir = tempfile::tempdir().unwrap();
    let pack = write_pack(
        dir.path(),
        "core",
        1,
        &[
            Fixture::new("a.bin", b"abcdef", 2, Placement::Part(3)),
            Fixture::new("tiny.bin", b"ab", 2, Placement::Part(3)),
        ],
    );
    std::fs::remove_file(dir.path().join("core_003.vpk")).unwrap();

    let vfs = Vfs::default();
    vfs.mount(&pack).unwrap();
    assert!(vfs.exists("a.bin"));
    assert_eq!(vfs.file_size("a.bin").unwrap(), 6);
    assert!(matches!(vfs.open("a.bin"), Err(VfsError::Io(_))));

    // Entirely preloaded entries never touch the part.
    assert_eq!(vfs.read("tiny.bin").unwrap(), b"ab");
}

#[test]
fn verify_reports_corruption() {
    let dir = tempfile::tempdir().unwrap();
    let pack = write_pack(
        dir.path(),
        "core",
        2,
        &[
            Fixture::new("a.bin", &pattern(64, 1), 4, Placement::Part(0)),
            Fixture::new("b.bin", &pattern(64, 2), 4, Placement::Part(0)),
            Fixture::new("c.bin", &pattern(16, 3), 4, Placement::Embedded),
        ],
    );

    let vfs = Vfs::default();
    let handle = vfs.mount(&pack).unwrap();
    assert!(vfs.verify_pack(handle).unwrap().is_ok());

    // Flip a byte inside b.bin's remainder (a.bin's remainder is 60 bytes).
    let part = dir.path().join("core_000.vpk");
    let mut bytes = std::fs::read(&part).unwrap();
    bytes[70] ^= 0xFF;
    std::fs::write(&part, &bytes).unwrap();

    let report = vfs.verify_pack(handle).unwrap();
    assert_eq!(report.checked, 3);
    let bad: BTreeMap<_, _> = report
        .mismatches
        .iter()
        .map(|m| (m.path.as_str(), m.expected))
        .collect();
    assert_eq!(bad.len(), 1);
    assert_eq!(bad["b.bin"], crc32fast::hash(&pattern(64, 2)));
}

#[test]
fn resolve_reports_catalog_spelling() {
    let dir = tempfile::tempdir().unwrap();
    let pack = write_pack(
        dir.path(),
        "core",
        1,
        &[Fixture::new("Sound/Music.OGG", b"ogg", 0, Placement::Part(0))],
    );
    let vfs = Vfs::new(VfsConfig::new().with_case_insensitive(true)).unwrap();
    vfs.mount(&pack).unwrap();

    match vfs.resolve("assets/sound/music.ogg").unwrap() {
        ResolvedLocation::Packed { path, entry, .. } => {
            assert_eq!(path, "Sound/Music.OGG");
            assert_eq!(entry.size(), 3);
        }
        other => panic!("unexpected location: {other:?}"),
    }
}

#[test]
fn case_folded_collision_keeps_first_catalog_entry() {
    let dir = tempfile::tempdir().unwrap();
    let pack = write_pack(
        dir.path(),
        "textures",
        2,
        &[
            Fixture::new("Tex/A.png", b"upper", 2, Placement::Part(0)),
            Fixture::new("tex/a.png", b"lower", 2, Placement::Part(0)),
        ],
    );

    let vfs = Vfs::new(VfsConfig::new().with_case_insensitive(true)).unwrap();
    let handle = vfs.mount(&pack).unwrap();
    assert_eq!(vfs.enumerate(handle).unwrap().count(), 2);

    // Catalog order is byte order, so the upper-case spelling comes first.
    assert_eq!(vfs.read("Tex/A.png").unwrap(), b"upper");
    assert_eq!(vfs.read("tex/a.png").unwrap(), b"upper");
    match vfs.resolve("TEX/a.PNG").unwrap() {
        ResolvedLocation::Packed { path, .. } => assert_eq!(path, "Tex/A.png"),
        ResolvedLocation::Loose(file) => panic!("resolved to loose file {}", file.display()),
    }

    // Case-sensitive lookups still reach both entries.
    let vfs = Vfs::default();
    vfs.mount(&pack).unwrap();
    assert_eq!(vfs.read("tex/a.png").unwrap(), b"lower");
    assert_eq!(vfs.read("Tex/A.png").unwrap(), b"upper");
}

#[test]
fn embedded_entry_must_fit_data_section() {
    let dir = tempfile::tempdir().unwrap();
    let pack = write_pack(
        dir.path(),
        "inline",
        2,
        &[Fixture::new("a.bin", b"abcd", 0, Placement::Embedded)],
    );

    let vfs = Vfs::default();
    vfs.mount(&pack).unwrap();
    assert_eq!(vfs.read("a.bin").unwrap(), b"abcd");

    // Shrink the recorded data section so the entry runs past it.
    let mut bytes = std::fs::read(&pack).unwrap();
    bytes[12..16].copy_from_slice(&2u32.to_le_bytes());
    std::fs::write(&pack, &bytes).unwrap();

    let vfs = Vfs::default();
    vfs.mount(&pack).unwrap();
    match vfs.read("a.bin").unwrap_err() {
        VfsError::Io(err) => assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof),
        other => panic!("unexpected error: {other}"),
    }
    // Size comes from the catalog and needs no data access.
    assert_eq!(vfs.file_size("a.bin").unwrap(), 4);
}
