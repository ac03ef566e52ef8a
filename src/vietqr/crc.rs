//! CRC16-CCITT-FALSE checksum for EMVCo payloads.

/// Tag and length of the CRC field, which the checksum itself covers.
pub const CRC_FIELD_PREFIX: &str = "6304";

const POLY: u16 = 0x1021;

/// CRC16-CCITT-FALSE: poly 0x1021, init 0xFFFF, MSB-first, no final XOR.
#[must_use]
pub fn crc16_ccitt_false(data: &[u8]) -> u16 {
    data.iter().fold(0xFFFF_u16, |crc, &byte| {
        (0..8).fold(crc ^ (u16::from(byte) << 8), |crc, _| {
            if crc & 0x8000 != 0 {
                (crc << 1) ^ POLY
            } else {
                crc << 1
            }
        })
    })
}

/// Checksum of `data` as four uppercase hex digits.
#[must_use]
pub fn crc_hex(data: &str) -> String {
    format!("{:04X}", crc16_ccitt_false(data.as_bytes()))
}

/// Check that a payload ends with a `6304` CRC field matching its content.
///
/// The checksum covers everything before the four hex digits, including the
/// `6304` prefix. Hex digits must be uppercase.
#[must_use]
pub fn verify_crc(payload: &str) -> bool {
    if !payload.is_ascii() || payload.len() < CRC_FIELD_PREFIX.len() + 4 {
        return false;
    }

    let (body, checksum) = payload.split_at(payload.len() - 4);
    body.ends_with(CRC_FIELD_PREFIX) && crc_hex(body) == checksum
}
