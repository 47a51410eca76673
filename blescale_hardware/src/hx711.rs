use std::time::Duration;

use blescale_traits::LoadCell;
use rppal::gpio::{Gpio, InputPin, OutputPin};
use tracing::trace;

use crate::error::{HwError, Result};
use crate::util::{sign_extend_24, wait_until_low_with_timeout};

/// Channel A, gain 128: one extra clock pulse after the 24 data bits.
pub const GAIN_128_PULSES: u8 = 1;

/// HX711 24-bit load cell ADC, bit-banged over two GPIO lines.
///
/// Keeps its own offset/scale so `units()` matches what the node computes.
/// `LoadCell::read` returns raw counts.
pub struct Hx711 {
    dout: InputPin,
    sck: OutputPin,
    gain_pulses: u8,
    timeout: Duration,
    offset: f64,
    scale: f64,
}

impl Hx711 {
    pub fn new(dout: InputPin, mut sck: OutputPin, gain_pulses: u8, timeout: Duration) -> Self {
        sck.set_low(); // clock idle low
        Self {
            dout,
            sck,
            gain_pulses,
            timeout,
            offset: 0.0,
            scale: 1.0,
        }
    }

    /// Claim BCM pins `dout`/`sck`.
    pub fn open(dout: u8, sck: u8, timeout: Duration) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let dout = gpio
            .get(dout)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_input();
        let sck = gpio
            .get(sck)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_output();
        Ok(Self::new(dout, sck, GAIN_128_PULSES, timeout))
    }

    pub fn read_raw(&mut self) -> Result<i32> {
        wait_until_low_with_timeout(
            || self.dout.is_high(),
            self.timeout,
            Duration::from_micros(200),
        )?;

        let mut value: u32 = 0;
        for _ in 0..24 {
            self.sck.set_high();
            spin_delay();
            value = (value << 1) | u32::from(self.dout.is_high());
            self.sck.set_low();
            spin_delay();
        }

        // Select channel/gain of the next conversion
        for _ in 0..self.gain_pulses {
            self.sck.set_high();
            spin_delay();
            self.sck.set_low();
            spin_delay();
        }

        let raw = sign_extend_24(value);
        trace!(raw, "hx711 raw read");
        Ok(raw)
    }

    /// One conversion in kilograms using the driver's own calibration.
    pub fn units(&mut self) -> Result<f64> {
        let raw = f64::from(self.read_raw()?);
        Ok((raw - self.offset) / self.scale)
    }
}

impl LoadCell for Hx711 {
    fn read(&mut self) -> std::result::Result<f64, Box<dyn std::error::Error + Send + Sync>> {
        Ok(f64::from(self.read_raw()?))
    }

    fn set_offset(&mut self, offset: f64) {
        self.offset = offset;
    }

    fn set_scale(&mut self, scale: f64) {
        self.scale = scale;
    }
}

#[inline(always)]
fn spin_delay() {
    // A few cycles; the HX711 needs >=0.2us per clock phase
    std::hint::spin_loop();
}
