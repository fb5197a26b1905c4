//! Test doubles shared by the unit tests of this crate.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use parking_lot::Mutex;
use serde_json::Value;

use crate::{DeliveryError, Frame, Outbox};

/// An [Outbox] that keeps every delivered frame in memory.
#[derive(Default)]
pub struct RecordingOutbox {
    frames: Mutex<Vec<Frame>>,
    closed: AtomicBool,
    capacity: Option<usize>,
}

impl RecordingOutbox {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// An outbox that reports [DeliveryError::Full] once it holds `capacity` frames.
    pub fn bounded(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity: Some(capacity),
            ..Default::default()
        })
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst)
    }

    /// Every frame received so far, parsed back into JSON.
    pub fn messages(&self) -> Vec<Value> {
        self.frames
            .lock()
            .iter()
            .map(|f| serde_json::from_str(f).expect("frames are valid json"))
            .collect()
    }

    /// The `type` of every frame received so far.
    pub fn types(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .map(|m| m["type"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    /// Removes and returns every frame received so far.
    pub fn take(&self) -> Vec<Value> {
        let messages = self.messages();
        self.frames.lock().clear();
        messages
    }
}

impl Outbox for RecordingOutbox {
    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    fn deliver(&self, frame: Frame) -> Result<(), DeliveryError> {
        if !self.is_open() {
            return Err(DeliveryError::Closed);
        }

        let mut frames = self.frames.lock();

        if self.capacity.is_some_and(|c| frames.len() >= c) {
            return Err(DeliveryError::Full);
        }

        frames.push(frame);
        Ok(())
    }
}

/// An [Outbox] that panics on every delivery, standing in for a handler bug.
pub struct PanickingOutbox;

impl Outbox for PanickingOutbox {
    fn is_open(&self) -> bool {
        true
    }

    fn deliver(&self, _frame: Frame) -> Result<(), DeliveryError> {
        panic!("outbox exploded")
    }
}
