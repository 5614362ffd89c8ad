//! Warnings emitted when a full heap queue drops an item.

use heapwire::recv::{BoundedHeapQueue, Pushed, QueuePolicy};
use heapwire_testing::{LoggerHandle, logger};
use rstest::rstest;
use serial_test::serial;

#[rstest]
#[case::oldest(QueuePolicy::DropOldest, 1, "dropped oldest item")]
#[case::newest(QueuePolicy::DropNewest, 2, "dropped newest item")]
#[serial(queue_logging)]
fn full_queue_warns_about_drops(
    mut logger: LoggerHandle,
    #[case] policy: QueuePolicy,
    #[case] dropped: u32,
    #[case] message: &str,
) {
    let queue = BoundedHeapQueue::new(1, policy).expect("non-zero capacity");
    assert!(matches!(queue.try_push(1_u32), Ok(Pushed::Queued)));
    assert!(matches!(queue.try_push(2_u32), Ok(Pushed::Dropped(item)) if item == dropped));

    let warnings = logger.drain_matching(log::Level::Warn, message);
    assert_eq!(warnings.len(), 1, "expected one '{message}' warning");
}

#[rstest]
#[serial(queue_logging)]
fn room_in_the_queue_logs_nothing(mut logger: LoggerHandle) {
    let queue = BoundedHeapQueue::new(2, QueuePolicy::DropOldest).expect("non-zero capacity");
    queue.try_push(1_u32).expect("queue running");
    queue.try_push(2_u32).expect("queue running");

    assert!(logger.drain_matching(log::Level::Warn, "heap queue full").is_empty());
}
