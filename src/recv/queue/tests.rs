//! Unit tests for `BoundedHeapQueue`.

use std::time::Duration;

use futures::StreamExt;
use rstest::rstest;
use tokio::time::timeout;

use super::{BoundedHeapQueue, Popped, Pushed, QueuePolicy};
use crate::{
    error::ConfigError,
    recv::error::{QueueStopped, TryPushError},
};

fn queue(capacity: usize, policy: QueuePolicy) -> BoundedHeapQueue<u32> {
    BoundedHeapQueue::new(capacity, policy).expect("non-zero capacity")
}

#[test]
fn zero_capacity_is_rejected() {
    assert_eq!(
        BoundedHeapQueue::<u32>::new(0, QueuePolicy::Block).map(|_| ()),
        Err(ConfigError::Zero("queue capacity"))
    );
}

#[tokio::test]
async fn items_come_out_in_push_order() {
    let queue = queue(4, QueuePolicy::Block);
    for item in 1..=3 {
        assert_eq!(queue.push(item).await, Ok(Pushed::Queued));
    }
    assert_eq!(queue.len(), 3);
    for expected in 1..=3 {
        assert_eq!(queue.pop().await, Popped::Item(expected));
    }
    assert!(queue.is_empty());
    assert_eq!(queue.try_pop(), None);
}

#[rstest]
#[case::oldest(QueuePolicy::DropOldest, Pushed::Dropped(1), [2, 3])]
#[case::newest(QueuePolicy::DropNewest, Pushed::Dropped(3), [1, 2])]
#[tokio::test]
async fn drop_policies_never_wait(
    #[case] policy: QueuePolicy,
    #[case] expected_drop: Pushed<u32>,
    #[case] remaining: [u32; 2],
) {
    let queue = queue(2, policy);
    assert_eq!(queue.push(1).await, Ok(Pushed::Queued));
    assert_eq!(queue.push(2).await, Ok(Pushed::Queued));
    assert_eq!(queue.push(3).await, Ok(expected_drop));
    assert_eq!(queue.len(), 2);
    for expected in remaining {
        assert_eq!(queue.pop().await, Popped::Item(expected));
    }
}

#[test]
fn try_push_reports_full_under_block() {
    let queue = queue(1, QueuePolicy::Block);
    assert_eq!(queue.try_push(1), Ok(Pushed::Queued));
    assert_eq!(queue.try_push(2), Err(TryPushError::Full(2)));
    queue.stop();
    assert_eq!(queue.try_push(3), Err(TryPushError::Stopped(3)));
}

#[tokio::test]
async fn blocked_push_resumes_after_pop() {
    let queue = queue(1, QueuePolicy::Block);
    assert_eq!(queue.push(1).await, Ok(Pushed::Queued));

    let producer = queue.clone();
    let pending = tokio::spawn(async move { producer.push(2).await });
    tokio::task::yield_now().await;
    assert!(!pending.is_finished());

    assert_eq!(queue.pop().await, Popped::Item(1));
    let pushed = timeout(Duration::from_secs(1), pending)
        .await
        .expect("push should resume")
        .expect("task should not panic");
    assert_eq!(pushed, Ok(Pushed::Queued));
    assert_eq!(queue.pop().await, Popped::Item(2));
}

#[tokio::test]
async fn stop_wakes_blocked_producers_and_consumers() {
    let full = queue(1, QueuePolicy::Block);
    full.try_push(1).expect("room for one");
    let producer = full.clone();
    let blocked_push = tokio::spawn(async move { producer.push(2).await });

    let empty = queue(1, QueuePolicy::Block);
    let consumer = empty.clone();
    let blocked_pop = tokio::spawn(async move { consumer.pop().await });
    tokio::task::yield_now().await;

    full.stop();
    empty.stop();

    let pushed = timeout(Duration::from_secs(1), blocked_push)
        .await
        .expect("push should wake")
        .expect("task should not panic");
    assert_eq!(pushed, Err(QueueStopped(2)));
    let popped = timeout(Duration::from_secs(1), blocked_pop)
        .await
        .expect("pop should wake")
        .expect("task should not panic");
    assert_eq!(popped, Popped::Stopped);
}

#[tokio::test]
async fn stopped_queue_drains_before_reporting_stop() {
    let queue = queue(4, QueuePolicy::Block);
    queue.try_push(1).expect("room");
    queue.try_push(2).expect("room");
    queue.stop();
    queue.stop();

    assert!(queue.is_stopped());
    assert_eq!(queue.push(3).await, Err(QueueStopped(3)));
    assert_eq!(queue.pop().await, Popped::Item(1));
    assert_eq!(queue.pop().await, Popped::Item(2));
    assert_eq!(queue.pop().await, Popped::Stopped);
    assert_eq!(queue.pop().await, Popped::Stopped);
}

#[tokio::test]
async fn stream_ends_at_stop() {
    let queue = queue(4, QueuePolicy::Block);
    for item in [5, 6, 7] {
        queue.try_push(item).expect("room");
    }
    queue.stop();
    let items: Vec<u32> = queue.stream().collect().await;
    assert_eq!(items, vec![5, 6, 7]);
}

#[test]
fn blocking_variants_work_across_threads() {
    let queue = queue(2, QueuePolicy::Block);
    let producer = queue.clone();
    let handle = std::thread::spawn(move || {
        for item in 0..100 {
            producer.push_blocking(item).expect("queue running");
        }
        producer.stop();
    });

    let mut received = Vec::new();
    while let Popped::Item(item) = queue.pop_blocking() {
        received.push(item);
    }
    handle.join().expect("producer thread should not panic");
    assert_eq!(received, (0..100).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_producers_lose_nothing_under_block() {
    let queue = queue(3, QueuePolicy::Block);
    let producers: Vec<_> = (0..4_u32)
        .map(|producer| {
            let queue = queue.clone();
            tokio::spawn(async move {
                for item in 0..50 {
                    queue
                        .push(producer * 1000 + item)
                        .await
                        .expect("queue running");
                }
            })
        })
        .collect();

    let consumer = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.stream().collect::<Vec<u32>>().await })
    };
    for producer in producers {
        producer.await.expect("producer should not panic");
    }
    queue.stop();
    let mut received = timeout(Duration::from_secs(5), consumer)
        .await
        .expect("consumer should finish")
        .expect("consumer should not panic");

    assert_eq!(received.len(), 200);
    for producer in 0..4_u32 {
        let from_producer: Vec<u32> = received
            .iter()
            .copied()
            .filter(|item| item / 1000 == producer)
            .collect();
        assert_eq!(
            from_producer,
            (0..50).map(|item| producer * 1000 + item).collect::<Vec<_>>()
        );
    }
    received.sort_unstable();
    received.dedup();
    assert_eq!(received.len(), 200);
}
