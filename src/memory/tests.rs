use super::*;
use crate::publisher::{ChannelPublisher, Publisher};
use anyhow::anyhow;
use chrono::{DateTime, Utc};
use std::thread;

fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

fn memory(cap: usize) -> ChangeMemory {
    ChangeMemory::new(MemoryConfig::new(NonZeroUsize::new(cap).unwrap()))
}

fn ev(id: &str, kind: &str, secs: i64) -> RawEvent {
    RawEvent::new(id, kind, ts(secs))
}

fn seqs(records: &[ChangeRecord]) -> Vec<Seq> {
    records.iter().map(|r| r.seq).collect()
}

fn ids(records: &[ChangeRecord]) -> Vec<&str> {
    records.iter().map(|r| r.event.resource_id()).collect()
}

// =============================================================================
// Sequence numbering
// =============================================================================

#[test]
fn test_record_assigns_increasing_seq() {
    let memory = memory(10);
    assert_eq!(memory.snapshot_seq(), 0);
    assert_eq!(memory.record(ev("a", "create", 1)).unwrap(), 1);
    assert_eq!(memory.record(ev("b", "create", 2)).unwrap(), 2);
    assert_eq!(memory.snapshot_seq(), 2);
}

#[test]
fn test_seq_not_reused_after_eviction() {
    let memory = memory(2);
    for i in 0..5 {
        memory.record(ev("a", "update", i)).unwrap();
    }
    assert_eq!(memory.len(), 2);
    assert_eq!(memory.record(ev("a", "update", 9)).unwrap(), 6);
}

#[test]
fn test_rejected_event_consumes_no_seq() {
    let memory = memory(10);
    assert_eq!(
        memory.record(ev("", "create", 1)),
        Err(ValidationError::EmptyResourceId)
    );
    assert!(matches!(
        memory.record(ev("a", "rename", 1)),
        Err(ValidationError::UnknownEventType(_))
    ));
    assert_eq!(memory.record(ev("a", "create", 1)).unwrap(), 1);
}

#[test]
fn test_interleaved_batches_strictly_increasing() {
    let memory = memory(100);
    memory.record(ev("a", "create", 1)).unwrap();
    let first = memory
        .record_batch(vec![ev("b", "create", 2), ev("c", "create", 3)])
        .unwrap();
    memory.record(ev("d", "create", 4)).unwrap();
    let second = memory.record_batch(vec![ev("e", "create", 5)]).unwrap();

    assert_eq!(first.recorded, [2, 3]);
    assert_eq!(second.recorded, [5]);

    let page = memory.query(0, 100).unwrap();
    assert_eq!(seqs(&page.records), [1, 2, 3, 4, 5]);
}

#[test]
fn test_concurrent_writers_never_share_seq() {
    let memory = Arc::new(memory(1_000));
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let memory = Arc::clone(&memory);
            thread::spawn(move || {
                for i in 0..50 {
                    let batch = vec![ev(&format!("{t}-{i}"), "create", i), ev("x", "update", i)];
                    memory.record_batch(batch).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let page = memory.query(0, usize::MAX).unwrap();
    assert_eq!(page.records.len(), 400);
    assert!(page.records.windows(2).all(|w| w[0].seq + 1 == w[1].seq));
    // Batches are contiguous: every "t-i" create is directly followed by its "x".
    for pair in page.records.chunks(2) {
        assert_ne!(pair[0].event.resource_id(), "x");
        assert_eq!(pair[1].event.resource_id(), "x");
    }
}

#[test]
fn test_readers_see_whole_batches_while_writing() {
    use std::sync::atomic::{AtomicBool, Ordering};

    let memory = Arc::new(memory(1_000));
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let memory = Arc::clone(&memory);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::Acquire) {
                    let page = memory.query(0, usize::MAX).unwrap();
                    let n = page.records.len() as Seq;
                    assert_eq!(seqs(&page.records), (1..=n).collect::<Vec<_>>());
                    assert_eq!(n % 2, 0, "torn batch at {n}");
                    for pair in page.records.chunks(2) {
                        assert_ne!(pair[0].event.resource_id(), "x");
                        assert_eq!(pair[1].event.resource_id(), "x");
                    }

                    let view = memory.view(memory.snapshot_seq()).unwrap();
                    assert_eq!(view.records.len() as Seq, view.as_of);
                    assert_eq!(view.as_of % 2, 0);
                }
            })
        })
        .collect();

    let writers: Vec<_> = (0..2)
        .map(|t| {
            let memory = Arc::clone(&memory);
            thread::spawn(move || {
                for i in 0..100 {
                    let batch = vec![ev(&format!("{t}-{i}"), "create", i), ev("x", "update", i)];
                    memory.record_batch(batch).unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }
    done.store(true, Ordering::Release);

    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(memory.snapshot_seq(), 400);
}

// =============================================================================
// Eviction
// =============================================================================

#[test]
fn test_keeps_most_recent_in_order() {
    let memory = memory(3);
    for (i, id) in ["a", "b", "c", "d", "e", "f"].iter().enumerate() {
        memory.record(ev(id, "create", i as i64)).unwrap();
    }

    assert_eq!(memory.len(), 3);
    assert_eq!(memory.horizon(), 3);
    assert_eq!(memory.oldest_seq(), Some(4));
    let page = memory.query(3, 10).unwrap();
    assert_eq!(ids(&page.records), ["d", "e", "f"]);
}

#[test]
fn test_batch_larger_than_capacity() {
    let memory = memory(2);
    let report = memory
        .record_batch(vec![
            ev("a", "create", 1),
            ev("b", "create", 2),
            ev("c", "create", 3),
        ])
        .unwrap();
    assert_eq!(report.recorded, [1, 2, 3]);
    assert_eq!(memory.len(), 2);
    assert_eq!(memory.horizon(), 1);

    // Evicted history still shows up in the baseline.
    let view = memory.view(3).unwrap();
    assert!(view.baseline.contains_present("a"));
}

#[test]
fn test_evicted_deletes_leave_no_tombstone() {
    let memory = memory(1);
    memory.record(ev("a", "create", 1)).unwrap();
    memory.record(ev("a", "delete", 2)).unwrap();
    memory.record(ev("b", "create", 3)).unwrap();

    let view = memory.view(3).unwrap();
    assert!(view.baseline.get("a").is_none());
    assert_eq!(ids(&view.records), ["b"]);
}

// =============================================================================
// Query
// =============================================================================

#[test]
fn test_query_pagination_covers_everything_once() {
    let memory = memory(50);
    for i in 0..23 {
        memory.record(ev(&format!("r{i}"), "create", i)).unwrap();
    }

    let mut cursor = 0;
    let mut seen = Vec::new();
    loop {
        let page = memory.query(cursor, 5).unwrap();
        if page.records.is_empty() {
            assert_eq!(page.next_seq, cursor);
            break;
        }
        assert!(page.records.len() <= 5);
        seen.extend(seqs(&page.records));
        cursor = page.next_seq;
    }
    assert_eq!(seen, (1..=23).collect::<Vec<_>>());
}

#[test]
fn test_query_gap_after_eviction() {
    let memory = memory(2);
    for i in 0..4 {
        memory.record(ev("a", "update", i)).unwrap();
    }
    assert_eq!(
        memory.query(0, 10),
        Err(GapError {
            requested: 0,
            horizon: 2
        })
    );
    assert!(memory.query(1, 10).is_err());
    assert_eq!(seqs(&memory.query(2, 10).unwrap().records), [3, 4]);
}

#[test]
fn test_query_beyond_latest_is_empty() {
    let memory = memory(5);
    memory.record(ev("a", "create", 1)).unwrap();
    let page = memory.query(7, 10).unwrap();
    assert!(page.records.is_empty());
    assert_eq!(page.next_seq, 7);
}

#[test]
fn test_query_zero_limit() {
    let memory = memory(5);
    memory.record(ev("a", "create", 1)).unwrap();
    let page = memory.query(0, 0).unwrap();
    assert!(page.records.is_empty());
    assert_eq!(page.next_seq, 0);
}

#[test]
fn test_range_bounds() {
    let memory = memory(10);
    for i in 0..6 {
        memory.record(ev("a", "update", i)).unwrap();
    }
    assert_eq!(seqs(&memory.range(2, 4).unwrap()), [3, 4]);
    assert!(memory.range(4, 4).unwrap().is_empty());

    let (upper, records) = memory.range_clamped(4, Some(50)).unwrap();
    assert_eq!((upper, seqs(&records)), (6, vec![5, 6]));
    assert_eq!(memory.range_clamped(8, None).unwrap(), (8, vec![]));
}

#[test]
fn test_view_rejects_evicted_checkpoint() {
    let memory = memory(2);
    for i in 0..4 {
        memory.record(ev("a", "update", i)).unwrap();
    }
    assert!(memory.view(1).is_err());
    assert!(memory.view(2).unwrap().records.is_empty());
    assert_eq!(memory.view(99).unwrap().as_of, 4);
}

#[test]
fn test_out_of_order_timestamps_kept_in_arrival_order() {
    let memory = memory(5);
    memory.record(ev("late", "create", 100)).unwrap();
    memory.record(ev("early", "create", 1)).unwrap();
    assert_eq!(ids(&memory.query(0, 5).unwrap().records), ["late", "early"]);
}

// =============================================================================
// Batches and notifications
// =============================================================================

#[test]
fn test_batch_rejects_individually() {
    let memory = memory(10);
    let report = memory
        .record_batch(vec![
            ev("a", "create", 1),
            ev("", "create", 2),
            ev("b", "move", 3),
            ev("c", "create", 4),
        ])
        .unwrap();

    assert_eq!(report.recorded, [1, 2]);
    assert_eq!(report.rejected.len(), 2);
    assert_eq!(report.rejected[0], (1, ValidationError::EmptyResourceId));
    assert_eq!(report.rejected[1].0, 2);
}

#[test]
fn test_fail_fast_records_nothing() {
    let config = MemoryConfig {
        max_changes: NonZeroUsize::new(10).unwrap(),
        fail_fast: true,
    };
    let (publisher, rx) = ChannelPublisher::new(4);
    let memory = ChangeMemory::new(config).with_publisher(Arc::new(publisher));

    let err = memory
        .record_batch(vec![ev("a", "create", 1), ev("b", "oops", 2)])
        .unwrap_err();
    assert_eq!(err.index, 1);
    assert!(memory.is_empty());
    assert_eq!(memory.snapshot_seq(), 0);
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_one_notification_per_batch() {
    let (publisher, rx) = ChannelPublisher::new(8);
    let memory = memory(10).with_publisher(Arc::new(publisher));

    memory
        .record_batch(vec![ev("a", "create", 1), ev("b", "create", 2)])
        .unwrap();
    memory.record(ev("c", "create", 3)).unwrap();
    memory.record_batch(vec![ev("d", "delete", 4)]).unwrap();

    assert_eq!(seqs(&rx.try_recv().unwrap()), [1, 2]);
    assert_eq!(seqs(&rx.try_recv().unwrap()), [4]);
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_notification_sees_committed_batch() {
    struct ReadBack(Arc<std::sync::OnceLock<Arc<ChangeMemory>>>);
    impl Publisher for ReadBack {
        fn on_batch_recorded(&self, batch: &[ChangeRecord]) -> anyhow::Result<()> {
            let memory = self.0.get().ok_or_else(|| anyhow!("not wired"))?;
            let last = batch.last().map_or(0, |r| r.seq);
            assert_eq!(memory.snapshot_seq(), last);
            Ok(())
        }
    }

    let slot = Arc::new(std::sync::OnceLock::new());
    let memory = Arc::new(memory(10).with_publisher(Arc::new(ReadBack(Arc::clone(&slot)))));
    slot.set(Arc::clone(&memory)).unwrap();

    memory
        .record_batch(vec![ev("a", "create", 1), ev("b", "create", 2)])
        .unwrap();
}

#[test]
fn test_failing_publisher_does_not_roll_back() {
    struct Broken;
    impl Publisher for Broken {
        fn on_batch_recorded(&self, _: &[ChangeRecord]) -> anyhow::Result<()> {
            Err(anyhow!("broker down"))
        }
    }

    let memory = memory(10).with_publisher(Arc::new(Broken));
    let report = memory.record_batch(vec![ev("a", "create", 1)]).unwrap();
    assert_eq!(report.recorded, [1]);
    assert_eq!(memory.len(), 1);
    assert_eq!(memory.record(ev("b", "create", 2)).unwrap(), 2);
}

#[test]
fn test_notified_batch_includes_records_evicted_within_it() {
    let (publisher, rx) = ChannelPublisher::new(2);
    let memory = memory(2).with_publisher(Arc::new(publisher));
    memory
        .record_batch(vec![
            ev("a", "create", 1),
            ev("b", "create", 2),
            ev("c", "create", 3),
        ])
        .unwrap();
    assert_eq!(seqs(&rx.try_recv().unwrap()), [1, 2, 3]);
    assert_eq!(memory.oldest_seq(), Some(2));
    assert_eq!(memory.horizon(), 1);
}

// =============================================================================
// Bootstrap
// =============================================================================

#[test]
fn test_bootstrap_seeds_baseline_without_seq() {
    let (publisher, rx) = ChannelPublisher::new(2);
    let memory = memory(5).with_publisher(Arc::new(publisher));

    let warnings = memory.bootstrap([
        ev("a", "create", 1),
        ev("b", "create", 1),
        ev("", "create", 1),
    ]);

    assert_eq!(warnings.len(), 1);
    assert_eq!(memory.snapshot_seq(), 0);
    assert!(rx.try_recv().is_err());

    let view = memory.view(0).unwrap();
    assert!(view.baseline.contains_present("a"));
    assert!(view.baseline.contains_present("b"));
}

// =============================================================================
// Reference scenario
// =============================================================================

#[test]
fn test_capacity_three_scenario() {
    let memory = memory(3);
    memory
        .record_batch(vec![
            ev("A", "create", 1),
            ev("A", "update", 2),
            ev("B", "create", 3),
            ev("A", "delete", 4),
            ev("C", "create", 5),
        ])
        .unwrap();

    let retained = memory.query(2, 10).unwrap().records;
    assert_eq!(seqs(&retained), [3, 4, 5]);
    assert_eq!(ids(&retained), ["B", "A", "C"]);
    assert!(matches!(memory.query(0, 10), Err(GapError { .. })));
}
