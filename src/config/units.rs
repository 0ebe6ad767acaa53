// Human readable byte quantities ("500M", "2G", "512B")

use crate::error::{Result, WatchError};

const SYMBOLS: [char; 9] = ['B', 'K', 'M', 'G', 'T', 'P', 'E', 'Z', 'Y'];

/// Translate a human representation into bytes.
///
/// The quantity must be an integer immediately followed by one unit symbol.
/// Units are binary: `K` is 1024 bytes, `M` is 1024 K and so on.
pub fn human2bytes(s: &str) -> Result<u64> {
    let s = s.trim();
    let invalid = || WatchError::InvalidByteQuantity(s.to_string());

    let symbol = s.chars().last().ok_or_else(invalid)?;
    let digits = &s[..s.len() - symbol.len_utf8()];
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let power = SYMBOLS
        .iter()
        .position(|&c| c == symbol)
        .ok_or_else(invalid)?;
    let value: u64 = digits.parse().map_err(|_| invalid())?;

    1u64.checked_shl(power as u32 * 10)
        .and_then(|factor| value.checked_mul(factor))
        .ok_or_else(invalid)
}

/// Translate bytes into a human representation, rounding down.
pub fn bytes2human(n: u64) -> String {
    for (i, symbol) in SYMBOLS.iter().enumerate().skip(1).rev() {
        let shift = i as u32 * 10;
        if shift >= 64 {
            continue;
        }
        let prefix = 1u64 << shift;
        if n >= prefix {
            return format!("{}{}", n / prefix, symbol);
        }
    }
    format!("{}B", n)
}
