use saturn_core::jobs::{JobError, JobId, JobQueue};

#[test]
fn test_fifo_order() {
    let mut queue = JobQueue::new();
    for id in [3, 1, 2] {
        queue.enqueue(JobId(id)).unwrap();
    }
    assert_eq!(queue.dequeue(), Some(JobId(3)));
    assert_eq!(queue.dequeue(), Some(JobId(1)));
    assert_eq!(queue.dequeue(), Some(JobId(2)));
    assert_eq!(queue.dequeue(), None);
}

#[test]
fn test_duplicate_rejected() {
    let mut queue = JobQueue::new();
    queue.enqueue(JobId(1)).unwrap();
    assert_eq!(queue.enqueue(JobId(1)), Err(JobError::DuplicateJob(JobId(1))));
    assert_eq!(queue.len(), 1);
}

#[test]
fn test_remove_from_middle() {
    let mut queue = JobQueue::new();
    for id in 1..=3 {
        queue.enqueue(JobId(id)).unwrap();
    }
    queue.remove(JobId(2)).unwrap();
    assert_eq!(queue.iter().collect::<Vec<_>>(), vec![JobId(1), JobId(3)]);
    assert!(!queue.contains(JobId(2)));
}

#[test]
fn test_remove_missing_reports_not_queued() {
    let mut queue = JobQueue::new();
    assert_eq!(queue.remove(JobId(7)), Err(JobError::NotQueued(JobId(7))));
    assert!(queue.is_empty());
}

#[test]
fn test_dequeued_id_can_be_queued_again() {
    let mut queue = JobQueue::new();
    queue.enqueue(JobId(1)).unwrap();
    assert_eq!(queue.peek(), Some(JobId(1)));
    queue.dequeue();
    assert!(queue.enqueue(JobId(1)).is_ok());
}
