//! Common utilities for realtime catalog integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use cellar_primitives::{ItemKey, Wine};
use cellar_realtime::MemoryBackend;
use tokio::sync::watch;

/// Longest a test waits for a state before failing.
pub const WAIT: Duration = Duration::from_secs(120);

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt::try_init();
}

pub fn wine(id: &str, price: f64) -> Wine {
	Wine {
		id: ItemKey::from(id),
		name: format!("Vino {id}"),
		winery: "Bodega Norte".into(),
		variety: "Malbec".into(),
		country: "Argentina".into(),
		color: "tinto".into(),
		price,
		stock: 6,
		detail: None,
	}
}

pub fn catalog() -> Vec<Wine> {
	vec![wine("w1", 10.0), wine("w2", 20.0), wine("w3", 30.0)]
}

/// Backend seeded with [`catalog`].
pub fn backend() -> Arc<MemoryBackend<Wine>> {
	init_tracing();
	Arc::new(MemoryBackend::new(catalog()))
}

pub fn ids(items: &[Wine]) -> Vec<&str> {
	items.iter().map(|w| w.id.as_str()).collect()
}

pub fn find<'a>(items: &'a [Wine], id: &str) -> Option<&'a Wine> {
	items.iter().find(|w| w.id.as_str() == id)
}

/// Waits until the watched value satisfies `pred` and returns a copy of it.
pub async fn wait_for<S: Clone>(rx: &mut watch::Receiver<S>, pred: impl FnMut(&S) -> bool) -> S {
	let value = tokio::time::timeout(WAIT, rx.wait_for(pred))
		.await
		.expect("timed out waiting for state")
		.expect("state channel closed");
	(*value).clone()
}

/// Lets spawned tasks run until `done` holds.
pub async fn settle(mut done: impl FnMut() -> bool) {
	for _ in 0..1000 {
		if done() {
			return;
		}
		tokio::time::sleep(Duration::from_millis(1)).await;
	}
	panic!("condition never held");
}
