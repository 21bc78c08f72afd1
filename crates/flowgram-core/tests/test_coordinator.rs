mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{ConstantFlow, EmptySource, RecordingObserver, ScriptedSource};
use flowgram_core::error::FlowError;
use flowgram_core::pipeline::{Coordinator, CoordinatorOptions, FlowConfig, PassOutcome};

fn config(pools: usize) -> FlowConfig {
    FlowConfig {
        pool_count: pools,
        ..Default::default()
    }
}

fn options(high_water_mark: usize) -> CoordinatorOptions {
    CoordinatorOptions {
        high_water_mark,
        poll_interval_ms: 5,
    }
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

#[test]
fn test_run_to_completion_fills_every_target_row() {
    let flow = ConstantFlow::new(1.0, 0.0);
    let cells = flow.cells();
    let coordinator = Coordinator::new(ScriptedSource::new(10), flow, 10, &config(8)).unwrap();

    coordinator.run(|_| {}, 0).unwrap();

    assert!(coordinator.is_finished());
    assert_eq!(coordinator.progress(), 1.0);
    assert_eq!(coordinator.processed_count(), 10);
    assert_eq!(coordinator.completed_count(), 9);
    assert_eq!(coordinator.current_frame(), 9);

    let hist = coordinator.histogram();
    for row in 0..9 {
        assert_eq!(hist.cell(row, 0), cells, "row {row} bucket 0");
        assert_eq!(hist.row_total(row).unwrap(), cells as u64);
    }
    // No job targets the last row.
    assert_eq!(hist.row_total(9).unwrap(), 0);
}

#[test]
fn test_progress_is_one_for_many_lengths() {
    for n in [1usize, 2, 3, 17, 64] {
        let coordinator =
            Coordinator::new(ScriptedSource::new(n), ConstantFlow::new(0.0, 2.0), n, &config(8))
                .unwrap();
        coordinator.run(|_| {}, 1).unwrap();
        assert_eq!(coordinator.progress(), 1.0, "n = {n}");
        assert_eq!(coordinator.processed_count(), n, "n = {n}");
        for i in 0..n {
            assert!(coordinator.is_processed(i));
        }
    }
}

#[test]
fn test_empty_stream_completes() {
    let coordinator =
        Coordinator::new(ScriptedSource::new(0), ConstantFlow::new(1.0, 0.0), 0, &config(8))
            .unwrap();
    coordinator.run(|_| {}, 10).unwrap();
    assert_eq!(coordinator.progress(), 1.0);
    assert_eq!(coordinator.completed_count(), 0);
}

#[test]
fn test_progress_zero_before_run() {
    let coordinator =
        Coordinator::new(ScriptedSource::new(5), ConstantFlow::new(1.0, 0.0), 5, &config(8))
            .unwrap();
    assert_eq!(coordinator.progress(), 0.0);
    assert_eq!(coordinator.current_frame(), 0);
    assert!(!coordinator.is_finished());
}

#[test]
fn test_invalid_config_rejected() {
    let result = Coordinator::new(ScriptedSource::new(5), ConstantFlow::new(1.0, 0.0), 5, &config(0));
    assert!(matches!(result, Err(FlowError::InvalidConfig(_))));
}

// ---------------------------------------------------------------------------
// Ordering and duplicate suppression
// ---------------------------------------------------------------------------

#[test]
fn test_jobs_complete_in_fifo_order() {
    let flow = ConstantFlow::new(1.0, 1.0);
    let calls = flow.calls.clone();
    let coordinator = Coordinator::new(ScriptedSource::new(50), flow, 50, &config(8)).unwrap();
    coordinator.run(|_| {}, 0).unwrap();

    let calls = calls.lock().unwrap();
    let expected: Vec<_> = (1..50).map(|i| (i - 1, i)).collect();
    assert_eq!(*calls, expected);
}

#[test]
fn test_interrupted_pass_resumes_without_double_counting() {
    let flow = ConstantFlow::new(-1.0, 0.0);
    let cells = flow.cells();
    let calls = flow.calls.clone();
    let observer = Arc::new(RecordingObserver::default());
    let coordinator = Coordinator::with_options(
        ScriptedSource::new(10).truncated_once_at(5),
        flow,
        10,
        &config(8),
        options(16),
        observer.clone(),
    )
    .unwrap();

    coordinator.run(|_| {}, 0).unwrap();

    assert_eq!(*observer.passes.lock().unwrap(), vec![0, 5]);
    assert_eq!(
        *observer.outcomes.lock().unwrap(),
        vec![
            PassOutcome::Incomplete { first_missing: 5 },
            PassOutcome::Complete
        ]
    );
    assert_eq!(calls.lock().unwrap().len(), 9);
    let hist = coordinator.histogram();
    for row in 0..9 {
        // (-1, 0) points at 180 degrees.
        assert_eq!(hist.cell(row, 4), cells);
        assert_eq!(hist.row_total(row).unwrap(), cells as u64);
    }
}

#[test]
fn test_seek_before_run_processes_tail_first() {
    let flow = ConstantFlow::new(1.0, 0.0);
    let calls = flow.calls.clone();
    let observer = Arc::new(RecordingObserver::default());
    let coordinator = Coordinator::with_options(
        ScriptedSource::new(10),
        flow,
        10,
        &config(8),
        options(16),
        observer.clone(),
    )
    .unwrap();

    coordinator.request_seek(5);
    coordinator.run(|_| {}, 0).unwrap();

    let order: Vec<_> = calls.lock().unwrap().iter().map(|c| c.1).collect();
    assert_eq!(order, vec![5, 6, 7, 8, 9, 1, 2, 3, 4]);
    assert_eq!(*observer.passes.lock().unwrap(), vec![5, 0]);
    for row in 0..9 {
        assert_eq!(coordinator.histogram().row_total(row).unwrap(), 4);
    }
    assert_eq!(coordinator.progress(), 1.0);
}

#[test]
fn test_seek_during_run_restarts_pass_without_duplicates() {
    let (flow, gate) = ConstantFlow::new(1.0, 0.0).gated();
    let calls = flow.calls.clone();
    let observer = Arc::new(RecordingObserver::default());
    let coordinator = Coordinator::with_options(
        ScriptedSource::new(40),
        flow,
        40,
        &config(8),
        options(2),
        observer.clone(),
    )
    .unwrap();

    std::thread::scope(|s| {
        let gate = gate;
        let runner = s.spawn(|| coordinator.run(|_| {}, 0));

        let deadline = Instant::now() + Duration::from_secs(5);
        while !coordinator.producer_waiting() {
            assert!(Instant::now() < deadline, "producer never blocked");
            std::thread::sleep(Duration::from_millis(1));
        }
        // Producer is parked mid-pass; the seek lands after its next read.
        coordinator.request_seek(30);
        drop(gate);
        runner.join().unwrap().unwrap();
    });

    let passes = observer.passes.lock().unwrap().clone();
    assert_eq!(passes[0], 0);
    assert_eq!(passes[1], 30);
    assert!(observer
        .outcomes
        .lock()
        .unwrap()
        .contains(&PassOutcome::Seeking { target: 30 }));

    let calls = calls.lock().unwrap();
    assert!(calls.iter().all(|&(previous, current)| previous + 1 == current));
    let mut frames: Vec<_> = calls.iter().map(|c| c.1).collect();
    frames.sort_unstable();
    assert_eq!(frames, (1..40).collect::<Vec<_>>());

    for row in 0..39 {
        assert_eq!(coordinator.histogram().row_total(row).unwrap(), 4, "row {row}");
    }
    assert_eq!(coordinator.progress(), 1.0);
}

#[test]
fn test_refused_seek_still_completes_once() {
    let flow = ConstantFlow::new(1.0, 0.0);
    let calls = flow.calls.clone();
    let coordinator =
        Coordinator::new(ScriptedSource::new(10).not_seekable(), flow, 10, &config(8)).unwrap();

    coordinator.request_seek(5);
    coordinator.run(|_| {}, 0).unwrap();

    assert_eq!(calls.lock().unwrap().len(), 9);
    for row in 0..9 {
        assert_eq!(coordinator.histogram().row_total(row).unwrap(), 4);
    }
}

// ---------------------------------------------------------------------------
// Progress callbacks
// ---------------------------------------------------------------------------

#[test]
fn test_progress_boundaries_strictly_increasing() {
    let coordinator =
        Coordinator::new(ScriptedSource::new(25), ConstantFlow::new(1.0, 0.0), 25, &config(8))
            .unwrap();
    let mut seen = Vec::new();
    coordinator.run(|frame| seen.push(frame), 5).unwrap();
    assert_eq!(seen, vec![5, 10, 15, 20]);
}

#[test]
fn test_progress_boundary_never_ahead_of_completed_work() {
    let coordinator =
        Coordinator::new(ScriptedSource::new(40), ConstantFlow::new(1.0, 0.0), 40, &config(8))
            .unwrap();
    let mut ok = true;
    coordinator
        .run(
            |frame| {
                ok &= coordinator.current_frame() >= frame;
            },
            3,
        )
        .unwrap();
    assert!(ok);
}

#[test]
fn test_observer_sees_every_completion() {
    let observer = Arc::new(RecordingObserver::default());
    let coordinator = Coordinator::with_options(
        ScriptedSource::new(12),
        ConstantFlow::new(1.0, 0.0),
        12,
        &config(8),
        options(4),
        observer.clone(),
    )
    .unwrap();
    coordinator.run(|_| {}, 0).unwrap();

    assert_eq!(*observer.completed.lock().unwrap(), (1..12).collect::<Vec<_>>());
    assert_eq!(*observer.passes.lock().unwrap(), vec![0]);
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn test_stall_on_immediate_end_of_stream() {
    let coordinator =
        Coordinator::new(EmptySource::new(5), ConstantFlow::new(1.0, 0.0), 5, &config(8)).unwrap();
    let result = coordinator.run(|_| {}, 1);
    assert!(matches!(result, Err(FlowError::Stall { position: 0 })));
    assert!(coordinator.progress() < 1.0);
    assert!(!coordinator.is_finished());
}

#[test]
fn test_stall_when_source_holds_fewer_frames_than_declared() {
    let observer = Arc::new(RecordingObserver::default());
    let coordinator = Coordinator::with_options(
        ScriptedSource::new(10).claiming(12),
        ConstantFlow::new(1.0, 0.0),
        12,
        &config(8),
        options(8),
        observer.clone(),
    )
    .unwrap();

    let result = coordinator.run(|_| {}, 0);
    assert!(matches!(result, Err(FlowError::Stall { position: 10 })));
    // The retry re-reads frame 9 as its seed and finds nothing new.
    assert_eq!(*observer.passes.lock().unwrap(), vec![0, 10]);
    assert_eq!(
        *observer.outcomes.lock().unwrap(),
        vec![
            PassOutcome::Incomplete { first_missing: 10 },
            PassOutcome::Stalled
        ]
    );
    assert_eq!(coordinator.completed_count(), 9);
    assert!(!coordinator.is_finished());
}

#[test]
fn test_index_fault_when_source_overruns_frame_count() {
    let coordinator = Coordinator::new(
        ScriptedSource::new(6).claiming(4),
        ConstantFlow::new(1.0, 0.0),
        4,
        &config(8),
    )
    .unwrap();
    let result = coordinator.run(|_| {}, 0);
    assert!(matches!(result, Err(FlowError::IndexFault { index: 4, total: 4 })));
    // Work queued before the fault is still drained.
    assert_eq!(coordinator.completed_count(), 3);
}

#[test]
fn test_source_failure_is_fatal() {
    let coordinator = Coordinator::new(
        ScriptedSource::new(10).failing_at(3),
        ConstantFlow::new(1.0, 0.0),
        10,
        &config(8),
    )
    .unwrap();
    let err = coordinator.run(|_| {}, 0).unwrap_err();
    assert!(matches!(err, FlowError::Source(_)));
    assert!(err.is_fatal());
}

#[test]
fn test_estimator_failure_releases_blocked_producer() {
    let coordinator = Coordinator::with_options(
        ScriptedSource::new(200),
        ConstantFlow::new(1.0, 0.0).failing_on_call(3),
        200,
        &config(8),
        options(2),
        Arc::new(RecordingObserver::default()),
    )
    .unwrap();
    let err = coordinator.run(|_| {}, 0).unwrap_err();
    assert!(matches!(err, FlowError::Estimator(_)));
    assert_eq!(coordinator.completed_count(), 2);
    assert!(coordinator.read_cursor() < 200);
}

// ---------------------------------------------------------------------------
// Backpressure
// ---------------------------------------------------------------------------

#[test]
fn test_producer_blocks_at_high_water_mark() {
    let (flow, gate) = ConstantFlow::new(1.0, 0.0).gated();
    let hwm = 4;
    let coordinator = Coordinator::with_options(
        ScriptedSource::new(50),
        flow,
        50,
        &config(8),
        options(hwm),
        Arc::new(RecordingObserver::default()),
    )
    .unwrap();

    std::thread::scope(|s| {
        let runner = s.spawn(|| coordinator.run(|_| {}, 0));

        let deadline = Instant::now() + Duration::from_secs(5);
        while !coordinator.producer_waiting() {
            assert!(Instant::now() < deadline, "producer never blocked");
            std::thread::sleep(Duration::from_millis(1));
        }

        // Let the consumer take its first job and park on the gate.
        std::thread::sleep(Duration::from_millis(50));
        let depth = coordinator.queue_depth();
        let cursor = coordinator.read_cursor();
        assert!(coordinator.producer_waiting());
        assert!(depth <= hwm, "queue grew to {depth}");
        // Seed frame, one job in the consumer, a full queue and the blocked frame.
        assert!(cursor <= hwm + 3, "cursor ran ahead to {cursor}");

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(coordinator.read_cursor(), cursor);
        assert!(coordinator.queue_depth() <= hwm);

        drop(gate);
        runner.join().unwrap().unwrap();
    });

    assert_eq!(coordinator.progress(), 1.0);
    assert_eq!(coordinator.completed_count(), 49);
}
