// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 chainqueue contributors

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chainqueue::{BlockingQueue, Error};
use tempfile::tempdir;

#[test]
fn dequeue_times_out_on_empty_queue() {
    let dir = tempdir().unwrap();
    let queue = BlockingQueue::open(dir.path().join("q"), 1024).unwrap();
    assert!(!queue.dequeue(Duration::from_millis(20)).unwrap());
}

#[test]
fn enqueue_wakes_a_waiting_dequeue() {
    let dir = tempdir().unwrap();
    let queue = Arc::new(BlockingQueue::open(dir.path().join("q"), 1024).unwrap());

    let waiter = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.peek(Duration::from_secs(5)).unwrap())
    };

    thread::sleep(Duration::from_millis(20));
    queue.enqueue(b"hello").unwrap();

    assert_eq!(waiter.join().unwrap(), Some(b"hello".to_vec()));
}

#[test]
fn dequeue_if_retains_element_on_false_predicate() {
    let dir = tempdir().unwrap();
    let queue = BlockingQueue::open(dir.path().join("q"), 1024).unwrap();
    queue.enqueue(b"skip-me").unwrap();

    let result = queue
        .dequeue_if(Duration::from_millis(50), |_| false)
        .unwrap();
    assert_eq!(result, None);

    // Element must still be there.
    assert_eq!(
        queue.peek(Duration::from_millis(50)).unwrap(),
        Some(b"skip-me".to_vec())
    );
}

#[test]
fn dequeue_if_removes_element_on_true_predicate() {
    let dir = tempdir().unwrap();
    let queue = BlockingQueue::open(dir.path().join("q"), 1024).unwrap();
    queue.enqueue(b"take-me").unwrap();

    let result = queue
        .dequeue_if(Duration::from_millis(50), |_| true)
        .unwrap();
    assert_eq!(result, Some(b"take-me".to_vec()));
    assert!(!queue.dequeue(Duration::from_millis(20)).unwrap());
}

#[test]
fn predicate_panic_surfaces_and_retains_element() {
    let dir = tempdir().unwrap();
    let queue = BlockingQueue::open(dir.path().join("q"), 1024).unwrap();
    queue.enqueue(b"still-here").unwrap();

    let result = queue.dequeue_if(Duration::from_millis(50), |_| panic!("boom"));
    assert!(matches!(result, Err(Error::PredicateFailure)));
    assert_eq!(
        queue.peek(Duration::from_millis(50)).unwrap(),
        Some(b"still-here".to_vec())
    );
}

#[test]
fn cancel_unblocks_waiting_poll() {
    let dir = tempdir().unwrap();
    let queue = Arc::new(BlockingQueue::open(dir.path().join("q"), 1024).unwrap());

    let waiter = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.poll(Duration::from_secs(5)))
    };

    thread::sleep(Duration::from_millis(20));
    queue.cancel();

    assert!(matches!(waiter.join().unwrap(), Err(Error::Cancelled)));
}
