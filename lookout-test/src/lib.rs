//! Test support for `lookout`: counters, a scripted subscription source and loopback servers
//! for every delivery.

mod http;
mod socket;
mod source;

pub use axum::response::sse::Event;
pub use http::{HttpServer, RecordedRequest, Reply, ReplyBody};
pub use socket::{Handshake, SocketServer};
pub use source::MockSource;

use parking_lot::Mutex;
use std::{future::Future, sync::Arc, time::Duration};

pub type SyncCounter = Arc<Mutex<Counter>>;

#[derive(Debug, Default)]
pub struct Counter {
    n: u32
}

impl Counter {
    pub fn sync() -> SyncCounter {
        Arc::new(Mutex::new(Counter::default()))
    }

    pub fn inc(&mut self) {
        self.n += 1;
    }

    pub fn inc_sync(counter: &SyncCounter) {
        counter.lock().inc();
    }

    pub fn get_sync(counter: &SyncCounter) -> u32 {
        counter.lock().n
    }
}

/// Poll `condition` until it holds or two seconds have passed. Returns the final result.
pub async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Give spawned tasks a chance to run, then assert nothing else happened.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// Run `future` with a five second limit so a hung transport fails the test instead of
/// stalling it.
pub async fn within<F: Future>(future: F) -> F::Output {
    match tokio::time::timeout(Duration::from_secs(5), future).await {
        Ok(output) => output,
        Err(_) => panic!("timed out")
    }
}
