// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Mixed concurrent load against a single key.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use dynamo_version_cache::{CancellationToken, Resolution, Store};
use rstest::rstest;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[rstest]
#[case(100, 5, 100)]
#[case(500, 50, 500)]
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn sets_resets_and_gets_complete(
    #[case] setters: usize,
    #[case] resets: usize,
    #[case] readers: usize,
) -> Result<()> {
    init_tracing();
    let store = Arc::new(Store::<usize>::new());
    let mut writes = Vec::with_capacity(setters);
    let mut versions = Vec::with_capacity(resets);
    let mut reads = Vec::with_capacity(readers);

    for value in 0..setters {
        let store = Arc::clone(&store);
        writes.push(tokio::spawn(async move { store.set("key", value).await }));
    }
    for _ in 0..resets {
        let store = Arc::clone(&store);
        versions.push(tokio::spawn(async move { store.reset_generation() }));
    }
    for _ in 0..readers {
        let store = Arc::clone(&store);
        reads.push(tokio::spawn(async move { store.get("key").await }));
    }

    let all = async {
        for write in writes {
            write.await?;
        }
        let mut generations = Vec::new();
        for version in versions {
            generations.push(version.await?);
        }
        for read in reads {
            if let Some(value) = read.await? {
                assert!(value < setters, "observed foreign value {value}");
            }
        }
        generations.sort_unstable();
        generations.dedup();
        anyhow::Ok(generations)
    };

    let generations = tokio::time::timeout(Duration::from_secs(10), all).await??;
    assert_eq!(generations.len(), resets);
    assert_eq!(store.generation(), resets as u64);
    Ok(())
}

#[test]
fn blocking_workers_do_not_deadlock() {
    init_tracing();
    let store = Arc::new(Store::<u64>::new());

    let mut handles = Vec::new();
    for value in 0..100u64 {
        let store = Arc::clone(&store);
        handles.push(std::thread::spawn(move || {
            store.blocking_set("key", value);
            None
        }));
    }
    for _ in 0..5 {
        let store = Arc::clone(&store);
        handles.push(std::thread::spawn(move || {
            store.reset_generation();
            None
        }));
    }
    for _ in 0..100 {
        let store = Arc::clone(&store);
        handles.push(std::thread::spawn(move || store.blocking_get("key")));
    }

    for handle in handles {
        if let Some(value) = handle.join().unwrap() {
            assert!(value < 100);
        }
    }
    assert_eq!(store.generation(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn setters_on_one_key_are_serialized() -> Result<()> {
    init_tracing();
    let store = Arc::new(Store::<u32>::new());

    let mut reservations = Vec::new();
    for value in 0..16u32 {
        let store = Arc::clone(&store);
        reservations.push(tokio::spawn(async move {
            let setter = store.reserve_setter("key", CancellationToken::new()).await;
            // Exclusive: nobody else can read while this setter is pending.
            assert!(store.lookup("key").unwrap().try_read().is_err());
            tokio::task::yield_now().await;
            setter.deliver(value);
            setter.resolved().await
        }));
    }

    for reservation in reservations {
        assert_eq!(reservation.await?, Resolution::Committed);
    }
    let last = store.get("key").await;
    assert!(matches!(last, Some(v) if v < 16));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unrelated_keys_do_not_wait_on_pending_setters() -> Result<()> {
    init_tracing();
    let store = Arc::new(Store::<u32>::new());
    let _pending = store.reserve_setter("slow", CancellationToken::new()).await;

    store.set("fast", 1).await;
    let read = tokio::time::timeout(Duration::from_secs(1), store.get("fast")).await?;
    assert_eq!(read, Some(1));

    // The structural lock is free too: resets and new keys go through.
    store.reset_generation();
    store.set("slow", 2).await;
    assert_eq!(store.get("slow").await, Some(2));
    Ok(())
}
