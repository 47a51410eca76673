//! Test and helper collaborators for blescale_core.
//!
//! The radio and load cell keep their state behind an `Arc<Mutex<_>>` so a
//! test can hold a handle after the node has taken ownership of the boxed
//! collaborator.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Load cell replaying a fixed script of raw reads. The last value repeats
/// once the script is exhausted; an empty script fails every read.
#[derive(Clone, Default)]
pub struct SeqLoadCell {
    inner: Arc<Mutex<SeqState>>,
}

#[derive(Default)]
struct SeqState {
    script: VecDeque<Result<f64, String>>,
    last: Option<f64>,
    reads: usize,
    offset: Option<f64>,
    scale: Option<f64>,
}

impl SeqLoadCell {
    pub fn new(reads: impl IntoIterator<Item = f64>) -> Self {
        let cell = Self::default();
        cell.push(reads);
        cell
    }

    /// Append more reads to the script.
    pub fn push(&self, reads: impl IntoIterator<Item = f64>) {
        let mut s = self.lock();
        s.script.extend(reads.into_iter().map(Ok));
    }

    /// Queue a failing read.
    pub fn push_error(&self, msg: &str) {
        self.lock().script.push_back(Err(msg.to_owned()));
    }

    pub fn reads(&self) -> usize {
        self.lock().reads
    }

    /// Last offset pushed by the node, if any.
    pub fn offset(&self) -> Option<f64> {
        self.lock().offset
    }

    pub fn scale(&self) -> Option<f64> {
        self.lock().scale
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SeqState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl blescale_traits::LoadCell for SeqLoadCell {
    fn read(&mut self) -> Result<f64, BoxError> {
        let mut s = self.lock();
        s.reads += 1;
        match s.script.pop_front() {
            Some(Ok(v)) => {
                s.last = Some(v);
                Ok(v)
            }
            Some(Err(msg)) => Err(msg.into()),
            None => s.last.ok_or_else(|| "load cell script exhausted".into()),
        }
    }

    fn set_offset(&mut self, offset: f64) {
        self.lock().offset = Some(offset);
    }

    fn set_scale(&mut self, scale: f64) {
        self.lock().scale = Some(scale);
    }
}

/// Everything a `RecordingRadio` was asked to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RadioLog {
    pub adverts: Vec<(Duration, Vec<u8>)>,
    pub weights: Vec<Vec<u8>>,
    pub replies: Vec<String>,
}

#[derive(Clone, Default)]
pub struct RecordingRadio {
    log: Arc<Mutex<RadioLog>>,
    fail: Arc<Mutex<bool>>,
}

impl RecordingRadio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> RadioLog {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Make every subsequent call fail.
    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap_or_else(PoisonError::into_inner) = fail;
    }

    fn check(&self) -> Result<(), BoxError> {
        if *self.fail.lock().unwrap_or_else(PoisonError::into_inner) {
            return Err("radio stack unavailable".into());
        }
        Ok(())
    }

    fn record(&self, f: impl FnOnce(&mut RadioLog)) {
        f(&mut self.log.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

impl blescale_traits::Radio for RecordingRadio {
    fn advertise(&mut self, interval: Duration, payload: &[u8]) -> Result<(), BoxError> {
        self.check()?;
        self.record(|l| l.adverts.push((interval, payload.to_vec())));
        Ok(())
    }

    fn write_weight(&mut self, payload: &[u8], _notify: bool) -> Result<(), BoxError> {
        self.check()?;
        self.record(|l| l.weights.push(payload.to_vec()));
        Ok(())
    }

    fn notify_reply(&mut self, reply: &str) -> Result<(), BoxError> {
        self.check()?;
        self.record(|l| l.replies.push(reply.to_owned()));
        Ok(())
    }
}

/// Thermal sensor with a fixed Fahrenheit reading.
#[derive(Debug, Clone, Copy)]
pub struct FixedThermal(pub f64);

impl blescale_traits::ThermalSensor for FixedThermal {
    fn raw_temperature(&mut self) -> Result<f64, BoxError> {
        Ok(self.0)
    }
}

/// Thermal sensor that always fails.
pub struct NoThermal;

impl blescale_traits::ThermalSensor for NoThermal {
    fn raw_temperature(&mut self) -> Result<f64, BoxError> {
        Err(Box::new(std::io::Error::other("thermal sensor unavailable")))
    }
}
