//! Scripted in-process transport for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::fetch::{HttpTransport, RawResponse, TransportError};

/// Outcome of one scripted attempt.
pub(crate) enum Step {
    Body { bytes: Vec<u8>, last_modified: Option<String>, delay: Duration },
    Overloaded,
    Fail,
    /// Never completes on its own; counts a cancellation when dropped.
    Hang,
}

impl Step {
    pub(crate) fn body(bytes: &[u8]) -> Self {
        Step::Body { bytes: bytes.to_vec(), last_modified: None, delay: Duration::ZERO }
    }

    pub(crate) fn body_modified(bytes: &[u8], last_modified: &str) -> Self {
        Step::Body { bytes: bytes.to_vec(), last_modified: Some(last_modified.to_string()), delay: Duration::ZERO }
    }

    pub(crate) fn delayed(millis: u64, bytes: &[u8]) -> Self {
        Step::Body { bytes: bytes.to_vec(), last_modified: None, delay: Duration::from_millis(millis) }
    }
}

struct CancelGuard<'a> {
    cancelled: &'a AtomicUsize,
    finished: bool,
}

impl Drop for CancelGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[derive(Default)]
pub(crate) struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    attempts: Mutex<HashMap<String, usize>>,
    cancelled: AtomicUsize,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue the responses for successive attempts on `url`.
    pub(crate) fn script(&self, url: &str, steps: Vec<Step>) {
        self.scripts.lock().unwrap().entry(url.to_string()).or_default().extend(steps);
    }

    pub(crate) fn attempts(&self, url: &str) -> usize {
        self.attempts.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub(crate) fn total_attempts(&self) -> usize {
        self.attempts.lock().unwrap().values().sum()
    }

    /// Number of hanging attempts dropped before they finished.
    pub(crate) fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, url: &str) -> Result<RawResponse, TransportError> {
        *self.attempts.lock().unwrap().entry(url.to_string()).or_default() += 1;
        let step = self.scripts.lock().unwrap().get_mut(url).and_then(VecDeque::pop_front);

        match step {
            Some(Step::Body { bytes, last_modified, delay }) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(RawResponse { body: Bytes::from(bytes), last_modified, fetch_ms: delay.as_millis() as u64 })
            }
            Some(Step::Overloaded) => Err(TransportError::Overloaded("status 503".into())),
            Some(Step::Fail) => Err(TransportError::Failed("status 404".into())),
            Some(Step::Hang) => {
                let mut guard = CancelGuard { cancelled: &self.cancelled, finished: false };
                tokio::time::sleep(Duration::from_secs(60)).await;
                guard.finished = true;
                Err(TransportError::Failed("hang elapsed".into()))
            }
            None => Err(TransportError::Failed(format!("no scripted response for {url}"))),
        }
    }
}
