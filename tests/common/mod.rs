//! Shared helpers for the integration tests

#![allow(dead_code)]

use parking_lot::Mutex;
use relay::{Key, Outcome, Worker};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::sleep;

/// Worker error carrying the offending item
#[derive(Debug, Clone, PartialEq, Error)]
#[error("item {item} is too large")]
pub struct TooLarge {
    pub item: u32,
}

/// Milliseconds a job for `n` takes
pub fn delay_for(n: u32) -> Duration {
    Duration::from_millis(5 * n as u64)
}

/// Ordered log of keys, shared between a worker and the test
#[derive(Clone, Default)]
pub struct KeyLog(Arc<Mutex<Vec<Key>>>);

impl KeyLog {
    pub fn push(&self, key: Key) {
        self.0.lock().push(key);
    }

    pub fn keys(&self) -> Vec<Key> {
        self.0.lock().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.keys().iter().map(|key| key.to_string()).collect()
    }
}

/// Maps `n` to the `n`th capital letter after a delay proportional to `n`,
/// logging each completion.
pub fn letters(log: KeyLog) -> Worker<u32, char, TooLarge> {
    Worker::spawn(move |n: u32, key| {
        let log = log.clone();
        async move {
            sleep(delay_for(n)).await;
            log.push(key);
            Ok(char::from(b'A' + (n as u8 - 1)))
        }
    })
}

/// Echoes `n` after a delay proportional to `n`, failing for `n >= 10`.
pub fn bounded_echo(log: KeyLog) -> Worker<u32, u32, TooLarge> {
    Worker::spawn(move |n: u32, key| {
        let log = log.clone();
        async move {
            sleep(delay_for(n)).await;
            log.push(key);
            if n >= 10 {
                Err(TooLarge { item: n })
            } else {
                Ok(n)
            }
        }
    })
}

/// Callback that forwards the outcome to a receiver
pub fn outcome_channel<V, E>() -> (
    impl FnOnce(Outcome<V, E>) + Send + 'static,
    oneshot::Receiver<Outcome<V, E>>,
)
where
    V: Send + 'static,
    E: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    (
        move |outcome| {
            let _ = tx.send(outcome);
        },
        rx,
    )
}
