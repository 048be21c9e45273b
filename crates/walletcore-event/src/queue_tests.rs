use super::*;
use std::sync::Arc;
use std::thread;

#[test]
fn test_tail_is_fifo() {
    let queue = EventQueue::new(4);
    for i in 0..5 {
        queue.enqueue_tail(i);
    }
    let drained: Vec<i32> = (0..5).map(|_| queue.dequeue_wait().unwrap()).collect();
    assert_eq!(drained, vec![0, 1, 2, 3, 4]);
    assert!(queue.is_empty());
}

#[test]
fn test_head_jumps_the_queue() {
    let queue = EventQueue::new(4);
    queue.enqueue_tail("a");
    queue.enqueue_tail("b");
    queue.enqueue_head("oob");

    assert_eq!(queue.dequeue_wait().unwrap(), "oob");
    assert_eq!(queue.dequeue_wait().unwrap(), "a");
    assert_eq!(queue.dequeue_wait().unwrap(), "b");
}

#[test]
fn test_head_burst_is_last_in_first_out() {
    let queue = EventQueue::new(4);
    queue.enqueue_tail(0);
    queue.enqueue_head(1);
    queue.enqueue_head(2);

    assert_eq!(queue.dequeue_wait().unwrap(), 2);
    assert_eq!(queue.dequeue_wait().unwrap(), 1);
    assert_eq!(queue.dequeue_wait().unwrap(), 0);
}

#[test]
fn test_try_dequeue_empty() {
    let queue: EventQueue<u8> = EventQueue::default();
    assert_eq!(queue.try_dequeue(), Err(EventError::NonePending));
    queue.enqueue_tail(9);
    assert_eq!(queue.try_dequeue(), Ok(9));
}

#[test]
fn test_abort_wakes_blocked_consumer() {
    let queue: Arc<EventQueue<u32>> = Arc::new(EventQueue::new(0));
    let consumer = {
        let queue = queue.clone();
        thread::spawn(move || queue.dequeue_wait())
    };

    thread::sleep(Duration::from_millis(50));
    queue.dequeue_wait_abort();

    assert_eq!(consumer.join().unwrap(), Err(EventError::WaitAbort));
}

#[test]
fn test_abort_leaves_events_queued() {
    let queue = EventQueue::new(2);
    queue.enqueue_tail(1);
    queue.dequeue_wait_abort();
    queue.dequeue_wait_abort();

    assert_eq!(queue.dequeue_wait(), Err(EventError::WaitAbort));
    assert_eq!(queue.len(), 1);
    assert!(queue.is_aborted());

    queue.dequeue_wait_abort_reset();
    assert!(!queue.is_aborted());
    assert_eq!(queue.dequeue_wait(), Ok(1));
}

#[test]
fn test_blocked_consumer_receives_later_event() {
    let queue: Arc<EventQueue<u32>> = Arc::new(EventQueue::new(0));
    let consumer = {
        let queue = queue.clone();
        thread::spawn(move || queue.dequeue_wait())
    };

    thread::sleep(Duration::from_millis(20));
    queue.enqueue_tail(42);

    assert_eq!(consumer.join().unwrap(), Ok(42));
}

#[test]
fn test_wait_timeout_reports_wait_error() {
    let queue: EventQueue<u32> = EventQueue::new(0);
    let err = queue
        .dequeue_wait_timeout(Duration::from_millis(10))
        .unwrap_err();
    assert!(matches!(err, EventError::WaitError(_)));

    queue.enqueue_tail(3);
    assert_eq!(queue.dequeue_wait_timeout(Duration::from_millis(10)), Ok(3));

    queue.dequeue_wait_abort();
    assert_eq!(
        queue.dequeue_wait_timeout(Duration::from_millis(10)),
        Err(EventError::WaitAbort)
    );
}

#[test]
fn test_clear_discards_pending() {
    let queue = EventQueue::new(8);
    for i in 0..3 {
        queue.enqueue_tail(i);
    }
    assert_eq!(queue.clear(), 3);
    assert!(queue.is_empty());
    assert_eq!(queue.clear(), 0);
}

#[test]
fn test_many_producers_single_consumer() {
    let queue: Arc<EventQueue<(usize, usize)>> = Arc::new(EventQueue::new(64));
    let producers: Vec<_> = (0..4)
        .map(|p| {
            let queue = queue.clone();
            thread::spawn(move || {
                for i in 0..250 {
                    queue.enqueue_tail((p, i));
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    // Per-producer order survives interleaving.
    let mut last = [None::<usize>; 4];
    for _ in 0..1000 {
        let (p, i) = queue.dequeue_wait().unwrap();
        if let Some(prev) = last[p] {
            assert!(i > prev);
        }
        last[p] = Some(i);
    }
    assert!(queue.is_empty());
}
