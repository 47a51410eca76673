//! Collaborators for the weighing node: host simulators, plus the HX711
//! driver behind the `hardware` feature.
pub mod error;
#[cfg(feature = "hardware")]
pub mod hx711;
pub mod util;

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use blescale_traits::gatt::{UART_TX_UUID, WEIGHT_MEASUREMENT_UUID};
use blescale_traits::{Clock, LoadCell, MonotonicClock, PowerControl, Radio, ThermalSensor, WakeCause};

use crate::error::HwError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Simulated load cell: a constant raw level plus uniform jitter.
pub struct SimulatedLoadCell {
    raw: f64,
    noise: f64,
    state: u32,
    offset: f64,
    scale: f64,
}

impl SimulatedLoadCell {
    pub fn new(raw: f64, noise: f64) -> Self {
        Self {
            raw,
            noise: noise.abs(),
            state: 0x9E37_79B9,
            offset: 0.0,
            scale: 1.0,
        }
    }

    /// Raw level a load of `kg` would produce with the current calibration.
    pub fn raw_for_kg(&self, kg: f64) -> f64 {
        kg * self.scale + self.offset
    }

    fn jitter(&mut self) -> f64 {
        // xorshift32
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        let unit = f64::from(x) / f64::from(u32::MAX);
        (unit * 2.0 - 1.0) * self.noise
    }
}

impl LoadCell for SimulatedLoadCell {
    fn read(&mut self) -> Result<f64, BoxError> {
        let v = self.raw + self.jitter();
        tracing::trace!(raw = v, "simulated load cell read");
        Ok(v)
    }

    fn set_offset(&mut self, offset: f64) {
        self.offset = offset;
    }

    fn set_scale(&mut self, scale: f64) {
        self.scale = scale;
    }
}

/// Radio that prints what it would put on the air, one line per call:
/// `adv <hex> interval_us=<n>` and `reply <text>`.
pub struct SimulatedRadio<W: Write = std::io::Stdout> {
    out: W,
}

impl SimulatedRadio {
    pub fn stdout() -> Self {
        Self {
            out: std::io::stdout(),
        }
    }
}

impl<W: Write> SimulatedRadio<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

impl<W: Write> Radio for SimulatedRadio<W> {
    fn advertise(&mut self, interval: Duration, payload: &[u8]) -> Result<(), BoxError> {
        writeln!(self.out, "adv {} interval_us={}", hex(payload), interval.as_micros())
            .map_err(HwError::from)?;
        self.out.flush().map_err(HwError::from)?;
        Ok(())
    }

    fn write_weight(&mut self, payload: &[u8], notify: bool) -> Result<(), BoxError> {
        tracing::debug!(
            characteristic = WEIGHT_MEASUREMENT_UUID,
            payload = %hex(payload),
            notify,
            "weight characteristic updated"
        );
        Ok(())
    }

    fn notify_reply(&mut self, reply: &str) -> Result<(), BoxError> {
        tracing::debug!(characteristic = UART_TX_UUID, "reply notified");
        writeln!(self.out, "reply {}", reply.trim_end()).map_err(HwError::from)?;
        self.out.flush().map_err(HwError::from)?;
        Ok(())
    }
}

/// Thermal sensor with a fixed reading, given in Celsius for convenience.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedThermal {
    celsius: f64,
}

impl SimulatedThermal {
    pub fn celsius(celsius: f64) -> Self {
        Self { celsius }
    }
}

impl ThermalSensor for SimulatedThermal {
    fn raw_temperature(&mut self) -> Result<f64, BoxError> {
        Ok(self.celsius * 9.0 / 5.0 + 32.0)
    }
}

/// Linux thermal zone (`/sys/class/thermal/thermal_zone0/temp`, millidegrees C).
#[derive(Debug, Clone)]
pub struct SysfsThermal {
    path: PathBuf,
}

impl SysfsThermal {
    pub const DEFAULT_ZONE: &'static str = "/sys/class/thermal/thermal_zone0/temp";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for SysfsThermal {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ZONE)
    }
}

impl ThermalSensor for SysfsThermal {
    fn raw_temperature(&mut self) -> Result<f64, BoxError> {
        let text = std::fs::read_to_string(&self.path).map_err(HwError::from)?;
        let milli: f64 = text
            .trim()
            .parse()
            .map_err(|_| HwError::Thermal(format!("unparsable reading {:?}", text.trim())))?;
        // Report in Fahrenheit like the on-die sensor does
        Ok(milli / 1000.0 * 9.0 / 5.0 + 32.0)
    }
}

/// Power controller for the host: "deep sleep" is a plain sleep on `clock`,
/// and every wake after the first reports `WakeCause::DeepSleep`.
pub struct SimulatedPower<C: Clock = MonotonicClock> {
    cause: WakeCause,
    clock: C,
    slept: Vec<Duration>,
}

impl SimulatedPower {
    pub fn new(cause: WakeCause) -> Self {
        Self::with_clock(cause, MonotonicClock::new())
    }
}

impl<C: Clock> SimulatedPower<C> {
    pub fn with_clock(cause: WakeCause, clock: C) -> Self {
        Self {
            cause,
            clock,
            slept: Vec::new(),
        }
    }

    pub fn slept(&self) -> &[Duration] {
        &self.slept
    }
}

impl<C: Clock> PowerControl for SimulatedPower<C> {
    fn wake_cause(&self) -> WakeCause {
        self.cause
    }

    fn deep_sleep(&mut self, duration: Duration) {
        tracing::info!(sleep_ms = duration.as_millis(), "entering deep sleep (simulated)");
        self.clock.sleep(duration);
        self.slept.push(duration);
        self.cause = WakeCause::DeepSleep;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_cell_stays_within_noise() {
        let mut cell = SimulatedLoadCell::new(1000.0, 5.0);
        for _ in 0..200 {
            let v = cell.read().unwrap();
            assert!((995.0..=1005.0).contains(&v), "{v}");
        }
    }

    #[test]
    fn noiseless_cell_is_constant() {
        let mut cell = SimulatedLoadCell::new(42.0, 0.0);
        assert_eq!(cell.read().unwrap(), 42.0);
        assert_eq!(cell.read().unwrap(), 42.0);
    }

    #[test]
    fn raw_for_kg_follows_calibration() {
        let mut cell = SimulatedLoadCell::new(0.0, 0.0);
        cell.set_offset(1000.0);
        cell.set_scale(500.0);
        assert_eq!(cell.raw_for_kg(2.0), 2000.0);
    }

    #[test]
    fn radio_prints_hex_and_replies() {
        let mut radio = SimulatedRadio::new(Vec::new());
        radio
            .advertise(Duration::from_micros(500_000), &[0x02, 0x01, 0x06])
            .unwrap();
        radio.notify_reply("OK\n").unwrap();
        let out = String::from_utf8(radio.into_inner()).unwrap();
        assert_eq!(out, "adv 020106 interval_us=500000\nreply OK\n");
    }

    #[test]
    fn simulated_thermal_reports_fahrenheit() {
        let mut t = SimulatedThermal::celsius(100.0);
        assert_eq!(t.raw_temperature().unwrap(), 212.0);
    }

    #[test]
    fn power_switches_to_deep_sleep_wake() {
        let mut p = SimulatedPower::new(WakeCause::ColdBoot);
        assert_eq!(p.wake_cause(), WakeCause::ColdBoot);
        p.deep_sleep(Duration::from_millis(1));
        assert_eq!(p.wake_cause(), WakeCause::DeepSleep);
        assert_eq!(p.slept(), &[Duration::from_millis(1)]);
    }
}
