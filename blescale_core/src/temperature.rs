//! Chip temperature, sampled once at boot.

use std::fmt;

use blescale_traits::ThermalSensor;

use crate::hw_error::map_hw_error;

/// Die temperature in degrees Celsius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChipTemperature(f64);

impl ChipTemperature {
    pub fn from_celsius(c: f64) -> Self {
        Self(c)
    }

    /// The die sensor reports Fahrenheit.
    pub fn from_raw_fahrenheit(f: f64) -> Self {
        Self((f - 32.0) * 5.0 / 9.0)
    }

    pub fn celsius(self) -> f64 {
        self.0
    }

    /// Whole degrees as a two's-complement byte (negative t becomes 256 + t),
    /// the form scale apps expect in a signed one-byte field.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn as_signed_byte(self) -> u8 {
        let whole = self.0.trunc().clamp(f64::from(i8::MIN), f64::from(i8::MAX));
        (whole as i8) as u8
    }

    /// Read the thermal collaborator once. Failures are logged and yield `None`.
    pub fn sample<T: ThermalSensor + ?Sized>(sensor: &mut T) -> Option<Self> {
        match sensor.raw_temperature() {
            Ok(f) => {
                let t = Self::from_raw_fahrenheit(f);
                tracing::debug!(celsius = t.0, "chip temperature sampled");
                Some(t)
            }
            Err(e) => {
                tracing::warn!(error = %map_hw_error(e.as_ref()), "chip temperature unavailable");
                None
            }
        }
    }
}

impl fmt::Display for ChipTemperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} C", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fahrenheit_conversion() {
        assert_eq!(ChipTemperature::from_raw_fahrenheit(212.0).celsius(), 100.0);
        assert_eq!(ChipTemperature::from_raw_fahrenheit(32.0).celsius(), 0.0);
    }

    #[test]
    fn signed_byte() {
        assert_eq!(ChipTemperature::from_celsius(21.9).as_signed_byte(), 21);
        assert_eq!(ChipTemperature::from_celsius(-1.5).as_signed_byte(), 255);
        assert_eq!(ChipTemperature::from_celsius(500.0).as_signed_byte(), 127);
    }

    #[test]
    fn displays_with_unit() {
        assert_eq!(ChipTemperature::from_celsius(40.0).to_string(), "40.0 C");
    }

    #[test]
    fn negative_reply_stays_signed() {
        let t = ChipTemperature::from_celsius(-5.0);
        assert_eq!(t.to_string(), "-5.0 C");
        assert_eq!(t.as_signed_byte(), 0xFB);
    }
}
