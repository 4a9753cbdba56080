// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 chainqueue contributors

use chainqueue::Queue;
use proptest::collection::vec as pvec;
use proptest::prelude::*;
use tempfile::tempdir;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn fifo_round_trip(payloads in pvec(pvec(any::<u8>(), 0..200), 0..40)) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("q");

        let mut queue = Queue::open(&path, 512).unwrap();
        for p in &payloads {
            queue.enqueue(p).unwrap();
        }

        for expected in &payloads {
            prop_assert_eq!(queue.peek().as_ref(), Some(expected));
            prop_assert!(queue.dequeue().unwrap());
        }
        prop_assert!(queue.is_empty());
    }

    #[test]
    fn fifo_round_trip_across_close(payloads in pvec(pvec(any::<u8>(), 0..200), 1..40)) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("q");

        let mut queue = Queue::open(&path, 512).unwrap();
        for p in &payloads {
            queue.enqueue(p).unwrap();
        }
        queue.close().unwrap();

        let mut queue = Queue::open(&path, 512).unwrap();
        for expected in &payloads {
            prop_assert_eq!(queue.peek().as_ref(), Some(expected));
            prop_assert!(queue.dequeue().unwrap());
        }
        prop_assert!(queue.is_empty());
    }
}
