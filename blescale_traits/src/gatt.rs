//! GATT identifiers exposed by the node.
//!
//! Two services: the standard Weight Scale service with its Weight
//! Measurement characteristic, and a Nordic-UART-style text channel used for
//! configuration (RX is written by the central, TX notifies replies).

/// Weight Scale service, also carried in the advertisement's service data.
pub const WEIGHT_SCALE_UUID: u16 = 0x181D;
/// Weight Measurement characteristic (read/notify).
pub const WEIGHT_MEASUREMENT_UUID: u16 = 0x2A9D;

pub const UART_SERVICE_UUID: &str = "6E400001-B5A3-F393-E0A9-E50E24DCCA9E";
/// Command lines written by the central.
pub const UART_RX_UUID: &str = "6E400002-B5A3-F393-E0A9-E50E24DCCA9E";
/// Command replies (read/notify).
pub const UART_TX_UUID: &str = "6E400003-B5A3-F393-E0A9-E50E24DCCA9E";
