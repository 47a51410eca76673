use std::time::{Duration, Instant};

use crate::error::{HwError, Result};

/// Block until `is_high` reports the line low, or `timeout` expires.
/// Sleeps `poll_interval` between checks instead of spinning.
pub fn wait_until_low_with_timeout(
    mut is_high: impl FnMut() -> bool,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while is_high() {
        if Instant::now() >= deadline {
            return Err(HwError::DataReadyTimeout);
        }
        std::thread::sleep(poll_interval);
    }
    Ok(())
}

/// Sign-extend a 24-bit two's-complement conversion result.
pub fn sign_extend_24(value: u32) -> i32 {
    let v = value & 0x00FF_FFFF;
    if v & 0x0080_0000 != 0 {
        (v | 0xFF00_0000).cast_signed()
    } else {
        v.cast_signed()
    }
}
