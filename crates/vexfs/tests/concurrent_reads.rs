#![allow(clippy::expect_used, clippy::unwrap_used)]
//! Many streams over one shared data part, read from worker threads.

mod common;

use common::{Fixture, pattern, write_pack};
use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom};
use std::sync::{Arc, Barrier};
use std::thread;
use vexfs::{Vfs, VfsConfig};
use vexfs_formats::pack::Placement;

const FILES: usize = 24;
const WORKERS: usize = 6;

fn names() -> Vec<String> {
    (0..FILES).map(|i| format!("chunks/chunk{i:02}.bin")).collect()
}

fn mount_shared_part(memory_map: bool) -> (tempfile::TempDir, Arc<Vfs>) {
    let dir = tempfile::tempdir().unwrap();
    let files: Vec<Fixture> = names()
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            Fixture::new(
                name,
                &pattern(3000 + i * 97, i as u8),
                i * 7,
                Placement::Part(0),
            )
        })
        .collect();
    let pack = write_pack(dir.path(), "world", 1, &files);

    let vfs = Vfs::new(VfsConfig::new().with_memory_map(memory_map).with_read_block_size(512))
        .unwrap();
    vfs.mount(pack).unwrap();
    (dir, Arc::new(vfs))
}

fn baseline(vfs: &Vfs) -> BTreeMap<String, Vec<u8>> {
    names()
        .into_iter()
        .map(|name| {
            let data = vfs.read(&name).unwrap();
            (name, data)
        })
        .collect()
}

#[test]
fn workers_read_identical_content() {
    for memory_map in [false, true] {
        let (_dir, vfs) = mount_shared_part(memory_map);
        let expected = Arc::new(baseline(&vfs));
        let barrier = Arc::new(Barrier::new(WORKERS));

        let workers: Vec<_> = (0..WORKERS)
            .map(|worker| {
                let vfs = Arc::clone(&vfs);
                let expected = Arc::clone(&expected);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    // Every worker holds all streams open at once and reads
                    // them round-robin in small, odd-sized steps.
                    let mut streams: Vec<_> = names()
                        .into_iter()
                        .map(|name| (vfs.open(&name).unwrap(), name, Vec::new()))
                        .collect();
                    barrier.wait();

                    let step = 13 + worker * 5;
                    let mut buf = vec![0u8; step];
                    let mut live = streams.len();
                    while live > 0 {
                        live = 0;
                        for (stream, _, out) in &mut streams {
                            let n = stream.read(&mut buf).unwrap();
                            out.extend_from_slice(&buf[..n]);
                            if n > 0 {
                                live += 1;
                            }
                        }
                    }

                    for (_, name, out) in &streams {
                        assert_eq!(out, &expected[name], "worker {worker} {name}");
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }
    }
}

#[test]
fn interleaved_seeks_do_not_interfere() {
    let (_dir, vfs) = mount_shared_part(false);
    let expected = Arc::new(baseline(&vfs));

    let workers: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let vfs = Arc::clone(&vfs);
            let expected = Arc::clone(&expected);
            thread::spawn(move || {
                let name = format!("chunks/chunk{:02}.bin", worker * 3);
                let data = &expected[&name];
                let mut stream = vfs.open(&name).unwrap();
                for round in 0..500u64 {
                    let pos = (round * 7919 + worker as u64 * 31) % data.len() as u64;
                    stream.seek(SeekFrom::Start(pos)).unwrap();
                    let mut byte = [0u8; 1];
                    stream.read_exact(&mut byte).unwrap();
                    assert_eq!(byte[0], data[pos as usize]);
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    // Every stream is gone, so the shared part is closed again.
    let base = vfs.pack(vfs.mounts()[0]).unwrap().base().to_path_buf();
    assert!(!vfs.pool().is_open(&base, 0));
}
