//! Connection pool behavior under contention and failure.
//!
//! These tests verify:
//! - The number of open sessions never exceeds capacity
//! - Exhaustion surfaces as a timeout after the acquire deadline
//! - Dead idle sessions are replaced in the same slot

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use adgate_directory::{ConnectionPool, DirectoryError};
use common::*;

fn pool(directory: &FakeDirectory, capacity: usize) -> ConnectionPool<FakeDirectory> {
    ConnectionPool::new(directory.clone(), capacity, Duration::from_secs(5))
}

/// Tests that concurrent callers never hold more sessions than the capacity.
#[tokio::test(start_paused = true)]
async fn test_concurrency_never_exceeds_capacity() {
    let directory = FakeDirectory::new();
    let pool = pool(&directory, 3);
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..20 {
        let pool = pool.clone();
        let active = Arc::clone(&active);
        let peak = Arc::clone(&peak);
        handles.push(tokio::spawn(async move {
            let conn = pool.acquire().await.expect("acquire");
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            active.fetch_sub(1, Ordering::SeqCst);
            drop(conn);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert!(directory.opens() <= 3);

    let status = pool.status().await;
    assert_eq!(status.capacity, 3);
    assert!(status.live <= 3);
    assert_eq!(status.idle, status.live);
}

/// Tests that an exhausted pool fails with a timeout once the deadline passes.
#[tokio::test(start_paused = true)]
async fn test_acquire_times_out_when_exhausted() {
    let directory = FakeDirectory::new();
    let pool = pool(&directory, 1);

    let held = pool.acquire().await.unwrap();
    let started = tokio::time::Instant::now();
    let err = pool.acquire().await.err().expect("pool is exhausted");

    assert!(matches!(err, DirectoryError::Timeout { .. }));
    assert_eq!(err.error_code(), 85);
    assert!(started.elapsed() >= Duration::from_secs(5));

    drop(held);
    let conn = pool.acquire().await.unwrap();
    assert_eq!(conn.id, 1);
    assert_eq!(directory.opens(), 1);
}

/// Tests that a waiter is served by a connection checked in before the deadline.
#[tokio::test(start_paused = true)]
async fn test_waiter_receives_released_connection() {
    let directory = FakeDirectory::new();
    let pool = pool(&directory, 1);

    let held = pool.acquire().await.unwrap();
    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire().await.map(|conn| conn.slot()) })
    };
    tokio::time::sleep(Duration::from_secs(1)).await;
    drop(held);

    assert_eq!(waiter.await.unwrap().unwrap(), 0);
    assert_eq!(directory.opens(), 1);
}

/// Tests that idle sessions are reused instead of dialing again.
#[tokio::test]
async fn test_idle_connection_reused() {
    let directory = FakeDirectory::new();
    let pool = pool(&directory, 2);

    for _ in 0..5 {
        let conn = pool.acquire().await.unwrap();
        pool.release(conn);
    }
    assert_eq!(directory.opens(), 1);
}

/// Tests that a session failing its liveness check is closed and replaced in the same slot.
#[tokio::test]
async fn test_dead_connection_replaced_in_same_slot() {
    let directory = FakeDirectory::new();
    let pool = pool(&directory, 2);

    let conn = pool.acquire().await.unwrap();
    let slot = conn.slot();
    assert_eq!(conn.id, 1);
    drop(conn);

    directory.kill_open_sessions();
    let conn = pool.acquire().await.unwrap();
    assert_eq!(conn.slot(), slot);
    assert_eq!(conn.id, 2);
    assert_eq!(directory.state().closes, 1);

    let status = pool.status().await;
    assert_eq!(status.created, 1);
    assert_eq!(status.live, 1);
}

/// Tests that a failed dial frees the slot it claimed.
#[tokio::test]
async fn test_failed_open_vacates_slot() {
    let directory = FakeDirectory::new();
    let pool = pool(&directory, 1);

    directory.refuse_connections(true);
    let err = pool.acquire().await.err().expect("dial refused");
    assert!(matches!(err, DirectoryError::ConnectionFailed { .. }));
    assert!(err.is_transient());
    assert_eq!(pool.status().await.live, 0);

    directory.refuse_connections(false);
    let conn = pool.acquire().await.unwrap();
    assert_eq!(conn.slot(), 0);
}

/// Tests that a failed replacement frees the slot of the dead session.
#[tokio::test]
async fn test_failed_replacement_vacates_slot() {
    let directory = FakeDirectory::new();
    let pool = pool(&directory, 1);

    drop(pool.acquire().await.unwrap());
    directory.kill_open_sessions();
    directory.refuse_connections(true);

    assert!(pool.acquire().await.is_err());
    assert_eq!(pool.status().await.live, 0);

    directory.refuse_connections(false);
    let conn = pool.acquire().await.unwrap();
    assert_eq!(conn.slot(), 0);
}

/// Tests that closing the pool unbinds idle sessions.
#[tokio::test]
async fn test_close_unbinds_idle_sessions() {
    let directory = FakeDirectory::new();
    let pool = pool(&directory, 2);

    let first = pool.acquire().await.unwrap();
    let second = pool.acquire().await.unwrap();
    drop(first);
    drop(second);
    assert_eq!(pool.status().await.idle, 2);

    pool.close().await;
    assert_eq!(directory.state().closes, 2);

    let status = pool.status().await;
    assert_eq!(status.idle, 0);
    assert_eq!(status.live, 0);
}

/// Tests that a waiter grows into a slot freed by a failed replacement.
#[tokio::test(start_paused = true)]
async fn test_waiter_grows_into_vacated_slot() {
    let directory = FakeDirectory::new();
    let pool = pool(&directory, 2);

    let first = pool.acquire().await.unwrap();
    let _second = pool.acquire().await.unwrap();
    directory.kill_open_sessions();

    let started = tokio::time::Instant::now();
    let waiters: Vec<_> = (0..2)
        .map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await.map(|conn| conn.slot()) })
        })
        .collect();
    tokio::time::sleep(Duration::from_secs(1)).await;

    // The waiter that receives the dead session cannot replace it.
    directory.refuse_next_connections(1);
    drop(first);

    let mut slots = Vec::new();
    let mut failures = Vec::new();
    for waiter in waiters {
        match waiter.await.unwrap() {
            Ok(slot) => slots.push(slot),
            Err(e) => failures.push(e),
        }
    }

    assert_eq!(slots, vec![0]);
    assert_eq!(failures.len(), 1);
    assert!(matches!(failures[0], DirectoryError::ConnectionFailed { .. }));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(pool.status().await.live, 2);
}
