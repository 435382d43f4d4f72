//! Parallel runs: result shape, error salvage and cancellation

mod common;

use common::{bounded_echo, letters, outcome_channel, KeyLog, TooLarge};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use relay::{Discipline, Done, Engine, Key, Results, RunConfig, RunFailure, WorkList, Worker};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[tokio::test(start_paused = true)]
async fn test_results_keep_list_positions() {
    let log = KeyLog::default();
    let (callback, rx) = outcome_channel();
    relay::parallel(vec![1, 2, 3, 4, 3, 2, 1], letters(log.clone()), callback);

    let results = rx.await.unwrap().unwrap();
    assert_eq!(
        results.into_dense(),
        Some(vec!['A', 'B', 'C', 'D', 'C', 'B', 'A'])
    );
    // shortest jobs first
    let mut first = log.keys()[..2].to_vec();
    first.sort();
    assert_eq!(first, vec![Key::Index(0), Key::Index(6)]);
}

#[tokio::test(start_paused = true)]
async fn test_error_salvages_completed_jobs_only() {
    relay::logging::init_for_tests();
    let (callback, rx) = outcome_channel();
    relay::parallel(
        vec![1, 1, 4, 16, 66, 34, 8, 2],
        bounded_echo(KeyLog::default()),
        callback,
    );

    let failure = rx.await.unwrap().unwrap_err();
    assert_eq!(
        failure,
        RunFailure::new(
            TooLarge { item: 16 },
            Results::Sequence(vec![
                Some(1),
                Some(1),
                Some(4),
                None,
                None,
                None,
                Some(8),
                Some(2)
            ])
        )
    );
}

#[tokio::test(start_paused = true)]
async fn test_mapping_results_keep_names() {
    let list: WorkList<u32> = [("one", 1), ("three", 3), ("two", 2)].into_iter().collect();
    let (callback, rx) = outcome_channel();
    relay::parallel(list, letters(KeyLog::default()), callback);

    let results = rx.await.unwrap().unwrap();
    assert!(results.is_mapping());
    assert_eq!(results.get(&Key::from("three")), Some(&'C'));
    // mapping entries are recorded in completion order
    let names: Vec<String> = results.into_mapping().unwrap().into_keys().collect();
    assert_eq!(names, vec!["one", "two", "three"]);
}

#[tokio::test(start_paused = true)]
async fn test_terminate_before_completion_returns_empty() {
    let reached = Arc::new(AtomicUsize::new(0));
    let counter = reached.clone();
    let worker = Worker::spawn(move |n: u32, _key| {
        let counter = counter.clone();
        async move {
            sleep(Duration::from_millis(n as u64)).await;
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<u32, TooLarge>(n)
        }
    });

    let (callback, rx) = outcome_channel();
    let terminator = relay::parallel(vec![10, 20, 30], worker, callback);
    tokio::task::yield_now().await;
    terminator.terminate();
    terminator.terminate();

    assert_eq!(rx.await.unwrap(), Ok(Results::Sequence(vec![])));
    sleep(Duration::from_millis(100)).await;
    assert_eq!(reached.load(Ordering::SeqCst), 0);
    assert!(terminator.is_terminated());
}

#[tokio::test(start_paused = true)]
async fn test_terminate_mid_run_keeps_finished_jobs() {
    let (callback, rx) = outcome_channel();
    let terminator = relay::parallel(vec![1, 9, 2], bounded_echo(KeyLog::default()), callback);

    sleep(Duration::from_millis(12)).await;
    terminator.terminate();

    assert_eq!(
        rx.await.unwrap(),
        Ok(Results::Sequence(vec![Some(1), None, Some(2)]))
    );
}

#[tokio::test(start_paused = true)]
async fn test_non_abortable_jobs_are_ignored_after_terminate() {
    let late = Arc::new(Mutex::new(Vec::<Done<u32, TooLarge>>::new()));
    let parked = late.clone();
    let worker = Worker::value(move |_n: u32, done| {
        parked.lock().push(done);
        None
    });

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let (callback, rx) = outcome_channel::<u32, TooLarge>();
    let terminator = relay::parallel(vec![1, 2], worker, move |outcome| {
        counter.fetch_add(1, Ordering::SeqCst);
        callback(outcome);
    });

    // let the deferred dispatch happen
    while late.lock().len() < 2 {
        tokio::task::yield_now().await;
    }
    terminator.terminate();
    for done in late.lock().drain(..) {
        done.ok(7);
        done.fail(TooLarge { item: 99 });
    }

    assert_eq!(rx.await.unwrap(), Ok(Results::Sequence(vec![])));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_max_in_flight_bounds_concurrency() {
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (now, high) = (running.clone(), peak.clone());
    let worker = Worker::spawn(move |n: u32, _key| {
        let (now, high) = (now.clone(), high.clone());
        async move {
            let current = now.fetch_add(1, Ordering::SeqCst) + 1;
            high.fetch_max(current, Ordering::SeqCst);
            sleep(Duration::from_millis(fastrand::u64(1..20))).await;
            now.fetch_sub(1, Ordering::SeqCst);
            Ok::<u32, TooLarge>(n * 2)
        }
    });

    let engine = Engine::new(RunConfig::bounded(3)).unwrap();
    let items: Vec<u32> = (0..20).collect();
    let handle = engine.spawn(Discipline::Parallel, items, worker);
    let results = handle.join().await.unwrap().unwrap();

    assert_eq!(
        results.into_dense(),
        Some((0..20).map(|n| n * 2).collect::<Vec<u32>>())
    );
    assert!(peak.load(Ordering::SeqCst) <= 3);
}

#[tokio::test(start_paused = true)]
async fn test_run_handle_terminate() {
    let engine = Engine::new(RunConfig::default().with_label("handle")).unwrap();
    let handle = engine.spawn(
        Discipline::Parallel,
        vec![50, 60],
        bounded_echo(KeyLog::default()),
    );
    let terminator = handle.terminator();
    handle.terminate();
    assert!(terminator.is_terminated());
    assert_eq!(handle.join().await.unwrap(), Ok(Results::Sequence(vec![])));
}
