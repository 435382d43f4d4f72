use anyhow::{anyhow, Error, Result};
use futures::StreamExt;
use relay::{Discipline, Engine, Key, RunConfig, SortBy, WorkList, Worker};
use std::time::Duration;
use tracing::Level;

// Pretend lookup: takes longer for longer names, refuses empty ones
async fn measure(name: String, key: Key) -> Result<usize, Error> {
    tokio::time::sleep(Duration::from_millis(20 * name.len() as u64)).await;
    if name.is_empty() {
        return Err(anyhow!("nothing to measure at {}", key));
    }
    Ok(name.len())
}

fn sample() -> WorkList<String> {
    [
        ("gamma", "gamma-ray burst"),
        ("alpha", "alpha"),
        ("beta", "beta decay"),
    ]
    .into_iter()
    .map(|(key, value)| (key, value.to_string()))
    .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    relay::logging::init(Level::INFO)?;

    let config = RunConfig::from_json(r#"{ "label": "demo", "max_in_flight": 2 }"#)?;
    let engine = Engine::new(config)?;

    // all at once, results keyed by name
    let handle = engine.spawn(Discipline::Parallel, sample(), Worker::spawn(measure));
    match handle.join().await? {
        Ok(results) => println!("parallel: {}", serde_json::to_string(&results)?),
        Err(failure) => println!("parallel failed: {}", failure.error),
    }

    // one at a time, alphabetically, printed as they arrive
    let mut stream = engine.stream(
        Discipline::Ordered(SortBy::ascending()),
        sample(),
        Worker::spawn(measure),
    );
    while let Some(item) = stream.next().await {
        match item {
            Ok(entry) => println!("ordered: {} -> {}", entry.key, entry.value),
            Err(failure) => println!("ordered failed: {}", failure.error),
        }
    }

    // a failing job stops a serial run and keeps what finished before it
    let list = vec!["one".to_string(), String::new(), "three".to_string()];
    let handle = engine.spawn(Discipline::Serial, list, Worker::spawn(measure));
    if let Err(failure) = handle.join().await? {
        println!(
            "serial failed: {} (salvaged {})",
            failure.error,
            serde_json::to_string(&failure.results)?
        );
    }

    Ok(())
}
