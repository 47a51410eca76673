//! Narrow collaborator interfaces consumed by the weighing node.
//!
//! The node never talks to a sensor, a radio or the power controller directly;
//! it goes through these traits so the core stays host-testable and the
//! hardware crate can swap a simulator for real drivers.
pub mod clock;
pub mod gatt;

pub use clock::{Clock, MonotonicClock};
#[cfg(any(test, feature = "test-clock"))]
pub use clock::test_clock;

use std::time::Duration;

/// Raw load-cell sampling (e.g. an HX711 front-end).
pub trait LoadCell {
    /// One raw conversion in sensor counts.
    fn read(&mut self) -> Result<f64, Box<dyn std::error::Error + Send + Sync>>;
    /// Push the zero point into the driver's own state.
    fn set_offset(&mut self, offset: f64);
    /// Push the counts-per-kilogram divisor into the driver's own state.
    fn set_scale(&mut self, scale: f64);
}

/// On-die thermal sensor. Read once at boot, before radio and CPU activity
/// start warming the chip.
pub trait ThermalSensor {
    /// Raw reading in degrees Fahrenheit, as the chip reports it.
    fn raw_temperature(&mut self) -> Result<f64, Box<dyn std::error::Error + Send + Sync>>;
}

/// Advertising and GATT surface of the radio stack.
pub trait Radio {
    /// Replace the advertisement payload and (re)start advertising.
    fn advertise(
        &mut self,
        interval: Duration,
        payload: &[u8],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Write the weight measurement characteristic; `notify` pushes it to subscribers.
    fn write_weight(
        &mut self,
        payload: &[u8],
        notify: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Notify a command reply on the TX characteristic.
    fn notify_reply(&mut self, reply: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Why the process is running: a genuine power-on or a timer wake from deep sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeCause {
    ColdBoot,
    DeepSleep,
}

/// Power management of the board.
pub trait PowerControl {
    /// Reset cause, read once at start-up.
    fn wake_cause(&self) -> WakeCause;
    /// Enter deep sleep for `duration`. On hardware this never returns: the
    /// chip resets and the program starts over.
    fn deep_sleep(&mut self, duration: Duration);
}

/// Events delivered by the radio stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    Connected { conn: u16 },
    Disconnected { conn: u16 },
    /// A central wrote the RX characteristic.
    Write(Vec<u8>),
}

impl<T: LoadCell + ?Sized> LoadCell for Box<T> {
    fn read(&mut self) -> Result<f64, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read()
    }
    fn set_offset(&mut self, offset: f64) {
        (**self).set_offset(offset);
    }
    fn set_scale(&mut self, scale: f64) {
        (**self).set_scale(scale);
    }
}

impl<T: ThermalSensor + ?Sized> ThermalSensor for Box<T> {
    fn raw_temperature(&mut self) -> Result<f64, Box<dyn std::error::Error + Send + Sync>> {
        (**self).raw_temperature()
    }
}

impl<T: Radio + ?Sized> Radio for Box<T> {
    fn advertise(
        &mut self,
        interval: Duration,
        payload: &[u8],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).advertise(interval, payload)
    }
    fn write_weight(
        &mut self,
        payload: &[u8],
        notify: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).write_weight(payload, notify)
    }
    fn notify_reply(&mut self, reply: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).notify_reply(reply)
    }
}
