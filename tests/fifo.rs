// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 chainqueue contributors
//
// The literal scenarios from the design's testable-properties section.

use chainqueue::{Error, Queue};
use tempfile::tempdir;

fn chunk_file_names(dir: &std::path::Path, head_name: &str) -> Vec<String> {
    let prefix = format!("{head_name}.");
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n == head_name || n.starts_with(&prefix))
        .collect()
}

#[test]
fn scenario_1_basic() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("q");

    let mut queue = Queue::open(&path, 1024).unwrap();
    queue.enqueue(&[0x61, 0x62, 0x63]).unwrap();
    assert!(!queue.is_empty());
    assert_eq!(queue.peek(), Some(vec![0x61, 0x62, 0x63]));
    assert!(queue.dequeue().unwrap());
    assert!(queue.is_empty());
    queue.close().unwrap();

    assert!(chunk_file_names(dir.path(), "q").is_empty());
}

#[test]
fn scenario_2_double_open_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("q");

    let _queue = Queue::open(&path, 1024).unwrap();
    let second = Queue::open(&path, 1024);
    assert!(matches!(second, Err(Error::AlreadyOpen { .. })));
}

#[test]
fn scenario_3_chunk_overflow() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("q");
    let chunk_size = 10 + 2 + 2 * 3; // 18

    let mut queue = Queue::open(&path, chunk_size as u64).unwrap();
    queue.enqueue(&[0x01, 0x02, 0x03]).unwrap();
    assert_eq!(chunk_file_names(dir.path(), "q").len(), 1);

    queue.enqueue(&[0x01, 0x02, 0x03]).unwrap();
    assert_eq!(chunk_file_names(dir.path(), "q").len(), 2);

    assert!(queue.dequeue().unwrap());
    assert_eq!(chunk_file_names(dir.path(), "q").len(), 1);
    assert!(!queue.is_empty());

    assert!(queue.clear().unwrap());
    assert!(queue.is_empty());
}

#[test]
fn scenario_4_persistence() {
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg64;

    let dir = tempdir().unwrap();
    let path = dir.path().join("q");

    let mut rng = Pcg64::seed_from_u64(1);
    let payloads: Vec<[u8; 2]> = (0..1000).map(|_| rng.random::<[u8; 2]>()).collect();

    let mut queue = Queue::open(&path, 1024).unwrap();
    for p in &payloads {
        queue.enqueue(p).unwrap();
    }
    queue.close().unwrap();

    let mut queue = Queue::open(&path, 1024).unwrap();
    for p in &payloads {
        assert_eq!(queue.peek(), Some(p.to_vec()));
        assert!(queue.dequeue().unwrap());
    }
    assert!(queue.is_empty());
}

#[test]
fn scenario_5_head_update_is_observable() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("q");

    let mut queue = Queue::open(&path, 1024).unwrap();
    let max = queue.max_element_size();
    queue.enqueue(&vec![0xAA; max]).unwrap();
    queue.enqueue(&vec![0xBB; max]).unwrap();
    queue.close().unwrap();

    let before = std::fs::read(&path).unwrap();

    let mut queue = Queue::open(&path, 1024).unwrap();
    assert!(queue.dequeue().unwrap());
    queue.close().unwrap();

    let after = std::fs::read(&path).unwrap();
    assert_ne!(before, after);
}

#[test]
fn scenario_6_payload_too_large() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("q");

    let mut queue = Queue::open(&path, 1024).unwrap();
    let max = queue.max_element_size();
    let result = queue.enqueue(&vec![0u8; max + 1]);
    assert!(matches!(result, Err(Error::PayloadTooLarge { .. })));
    assert!(queue.is_empty());
}
