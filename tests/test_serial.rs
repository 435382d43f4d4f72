//! Serial runs: dispatch order, prefix salvage and the async contract

mod common;

use common::{bounded_echo, letters, outcome_channel, KeyLog, TooLarge};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use relay::{Done, Key, Results, RunFailure, Worker};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone, PartialEq)]
enum Step {
    Start(Key),
    End(Key),
}

#[tokio::test(start_paused = true)]
async fn test_matches_synchronous_iteration() {
    let log = KeyLog::default();
    let (callback, rx) = outcome_channel();
    relay::serial(vec![3, 1, 2], letters(log.clone()), callback);

    let results = rx.await.unwrap().unwrap();
    assert_eq!(results.into_dense(), Some(vec!['C', 'A', 'B']));
    // completion order is list order even though job 0 is the slowest
    assert_eq!(log.keys(), vec![Key::Index(0), Key::Index(1), Key::Index(2)]);
}

#[tokio::test(start_paused = true)]
async fn test_error_salvages_strict_prefix() {
    relay::logging::init_for_tests();
    let log = KeyLog::default();
    let (callback, rx) = outcome_channel();
    relay::serial(vec![1, 1, 4, 16, 66, 34, 8, 2], bounded_echo(log.clone()), callback);

    assert_eq!(
        rx.await.unwrap(),
        Err(RunFailure::new(
            TooLarge { item: 16 },
            Results::Sequence(vec![Some(1), Some(1), Some(4)])
        ))
    );
    // nothing after the failing key was dispatched
    sleep(Duration::from_secs(1)).await;
    assert_eq!(log.keys().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_each_job_finishes_before_next_starts() {
    let steps = Arc::new(Mutex::new(Vec::new()));
    let trace = steps.clone();
    let worker = Worker::spawn(move |n: u32, key: Key| {
        let trace = trace.clone();
        async move {
            trace.lock().push(Step::Start(key.clone()));
            sleep(Duration::from_millis(fastrand::u64(1..10))).await;
            trace.lock().push(Step::End(key));
            Ok::<u32, TooLarge>(n)
        }
    });

    let (callback, rx) = outcome_channel();
    relay::serial(vec![10, 20, 30], worker, callback);
    rx.await.unwrap().unwrap();

    let expected: Vec<Step> = (0..3)
        .flat_map(|i| [Step::Start(Key::Index(i)), Step::End(Key::Index(i))])
        .collect();
    assert_eq!(*steps.lock(), expected);
}

#[tokio::test]
async fn test_sync_worker_completes_after_call_returns() {
    let returned = Arc::new(AtomicBool::new(false));
    let seen_return = Arc::new(AtomicBool::new(false));

    let (flag, witness) = (returned.clone(), seen_return.clone());
    let (callback, rx) = outcome_channel::<u32, TooLarge>();
    relay::serial(
        vec![1, 2, 3],
        Worker::value(|n: u32, done: Done<u32, TooLarge>| {
            done.ok(n + 1);
            None
        }),
        move |outcome| {
            witness.store(flag.load(Ordering::SeqCst), Ordering::SeqCst);
            callback(outcome);
        },
    );
    returned.store(true, Ordering::SeqCst);

    assert_eq!(
        rx.await.unwrap(),
        Ok(Results::Sequence(vec![Some(2), Some(3), Some(4)]))
    );
    assert!(seen_return.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_keyed_worker_sees_mapping_keys() {
    let list: relay::WorkList<u32> = [("x", 1), ("y", 2)].into_iter().collect();
    let (callback, rx) = outcome_channel::<String, TooLarge>();
    relay::serial(
        list,
        Worker::keyed(|n: u32, key: Key, done| {
            done.ok(format!("{}={}", key, n));
            None
        }),
        callback,
    );

    let mapping = rx.await.unwrap().unwrap().into_mapping().unwrap();
    assert_eq!(
        mapping.into_iter().collect::<Vec<_>>(),
        vec![
            ("x".to_string(), "x=1".to_string()),
            ("y".to_string(), "y=2".to_string())
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_terminate_stops_pending_keys() {
    let log = KeyLog::default();
    let (callback, rx) = outcome_channel();
    let terminator = relay::serial(vec![2, 2, 2, 2], bounded_echo(log.clone()), callback);

    sleep(Duration::from_millis(25)).await;
    terminator.terminate();

    let results = rx.await.unwrap().unwrap();
    assert_eq!(results, Results::Sequence(vec![Some(2), Some(2)]));
    sleep(Duration::from_secs(1)).await;
    assert_eq!(log.keys().len(), 2);
}
