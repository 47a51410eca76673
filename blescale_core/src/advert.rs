//! Advertisement packet encoder.
//!
//! Layout (18 bytes, multi-byte fields little-endian):
//!
//! | bytes | field |
//! |---|---|
//! | 0..3 | flags AD structure: `02 01 06` (LE General Discoverable, BR/EDR not supported) |
//! | 3 | service-data AD length (`0x0D`) |
//! | 4 | AD type: service data, 16-bit UUID (`0x16`) |
//! | 5..7 | Weight Scale service UUID `0x181D` |
//! | 7 | status: stabilized weight (`0x20`) |
//! | 8..10 | weight in 5 g units (`round(kg * 200)`) |
//! | 10..18 | reserved, zero |
//!
//! Bytes 7..18 are the weight payload also written to the Weight Measurement
//! characteristic. The receiving app parses exactly this layout, including
//! the `0x0D` length byte it was validated against; that length leaves the
//! last reserved byte outside the declared structure, which is why putting
//! anything but zero there (see `encode_with_temperature`) makes the app stop
//! recognising the node.

use crate::temperature::ChipTemperature;

pub use blescale_traits::gatt::WEIGHT_SCALE_UUID;

pub const FLAGS: [u8; 3] = [0x02, 0x01, 0x06];
pub const SERVICE_DATA_LEN: u8 = 0x0D;
pub const AD_TYPE_SERVICE_DATA_16: u8 = 0x16;
pub const STATUS_STABILIZED: u8 = 0x20;
/// Weight field units per kilogram.
pub const WEIGHT_UNITS_PER_KG: f64 = 200.0;

pub const PAYLOAD_LEN: usize = 11;
pub const PACKET_LEN: usize = FLAGS.len() + 4 + PAYLOAD_LEN;
const PAYLOAD_START: usize = PACKET_LEN - PAYLOAD_LEN;

/// One encoded broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advertisement {
    bytes: [u8; PACKET_LEN],
}

impl Advertisement {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Status, weight and reserved bytes; the characteristic value.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[PAYLOAD_START..]
    }

    pub fn weight_field(&self) -> u16 {
        u16::from_le_bytes([self.bytes[PAYLOAD_START + 1], self.bytes[PAYLOAD_START + 2]])
    }

    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Weight field value: `round(kg * 200)` clamped to `0..=u16::MAX`.
///
/// Out-of-range weights saturate instead of wrapping, so an overload never
/// aliases to a small in-range weight. NaN encodes as 0.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn weight_field(weight_kg: f64) -> u16 {
    let units = (weight_kg * WEIGHT_UNITS_PER_KG).round();
    if units.is_nan() || units <= 0.0 {
        0
    } else if units >= f64::from(u16::MAX) {
        u16::MAX
    } else {
        units as u16
    }
}

pub fn encode(weight_kg: f64) -> Advertisement {
    build(weight_kg, 0)
}

/// Variant carrying the chip temperature in the last reserved byte.
/// Off by default: the receiving app ignores nodes that populate it.
pub fn encode_with_temperature(weight_kg: f64, temperature: ChipTemperature) -> Advertisement {
    build(weight_kg, temperature.as_signed_byte())
}

fn build(weight_kg: f64, last_reserved: u8) -> Advertisement {
    let mut bytes = [0u8; PACKET_LEN];
    bytes[..3].copy_from_slice(&FLAGS);
    bytes[3] = SERVICE_DATA_LEN;
    bytes[4] = AD_TYPE_SERVICE_DATA_16;
    bytes[5..7].copy_from_slice(&WEIGHT_SCALE_UUID.to_le_bytes());
    bytes[PAYLOAD_START] = STATUS_STABILIZED;
    bytes[PAYLOAD_START + 1..PAYLOAD_START + 3].copy_from_slice(&weight_field(weight_kg).to_le_bytes());
    bytes[PACKET_LEN - 1] = last_reserved;
    Advertisement { bytes }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_fixed() {
        let adv = encode(0.0);
        assert_eq!(
            &adv.as_bytes()[..8],
            &[0x02, 0x01, 0x06, 0x0D, 0x16, 0x1D, 0x18, 0x20]
        );
        assert_eq!(adv.as_bytes().len(), 18);
        assert_eq!(adv.payload().len(), 11);
    }

    #[test]
    fn two_kilograms_is_400_units() {
        let adv = encode(2.0);
        assert_eq!(&adv.payload()[1..3], &[0x90, 0x01]);
        assert_eq!(adv.weight_field(), 400);
        assert!(adv.payload()[3..].iter().all(|&b| b == 0));
    }

    #[test]
    fn rounds_to_nearest_unit() {
        assert_eq!(weight_field(0.0074), 1);
        assert_eq!(weight_field(0.0024), 0);
        assert_eq!(weight_field(72.3), 14_460);
    }

    #[test]
    fn saturates_instead_of_wrapping() {
        assert_eq!(weight_field(-3.0), 0);
        assert_eq!(weight_field(400.0), u16::MAX);
        assert_eq!(weight_field(f64::INFINITY), u16::MAX);
        assert_eq!(weight_field(f64::NEG_INFINITY), 0);
        assert_eq!(weight_field(f64::NAN), 0);
    }

    #[test]
    fn temperature_variant_only_touches_last_byte() {
        let plain = encode(12.5);
        let hot = encode_with_temperature(12.5, ChipTemperature::from_celsius(-5.0));
        assert_eq!(&plain.as_bytes()[..17], &hot.as_bytes()[..17]);
        assert_eq!(hot.as_bytes()[17], 251);
        assert_eq!(plain.as_bytes()[17], 0);
    }

    #[test]
    fn hex_dump() {
        assert_eq!(encode(2.0).to_hex(), "0201060d161d182090010000000000000000");
    }
}
