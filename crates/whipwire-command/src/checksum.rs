use std::fmt;

/// CRC-16 generator polynomial used by the controller firmware.
pub const CRC16_POLY: u16 = 0x8001;

/// Outcome of checking a payload's stored checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumVerdict {
    Accepted,
    Mismatch { stored: u16, computed: u16 },
}

/// How payload checksums are validated and produced.
///
/// Implementations receive the whole payload, header included. Callers
/// guarantee at least two bytes.
pub trait ChecksumPolicy: Send + Sync {
    /// Name used in logs and CLI output.
    fn name(&self) -> &'static str;

    /// Check the checksum stored in bytes 0–1.
    fn verify(&self, payload: &[u8]) -> ChecksumVerdict;

    /// Write the checksum into bytes 0–1.
    fn seal(&self, payload: &mut [u8]);
}

impl fmt::Debug for dyn ChecksumPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Accept every payload. Sealing leaves the checksum bytes zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unchecked;

impl ChecksumPolicy for Unchecked {
    fn name(&self) -> &'static str {
        "none"
    }

    fn verify(&self, _payload: &[u8]) -> ChecksumVerdict {
        ChecksumVerdict::Accepted
    }

    fn seal(&self, payload: &mut [u8]) {
        payload[..2].fill(0);
    }
}

/// The firmware's CRC-16 over the payload with the checksum bytes zeroed,
/// stored little-endian.
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc16;

impl ChecksumPolicy for Crc16 {
    fn name(&self) -> &'static str {
        "crc16"
    }

    fn verify(&self, payload: &[u8]) -> ChecksumVerdict {
        let stored = u16::from_le_bytes([payload[0], payload[1]]);
        let computed = payload_crc(payload);
        if stored == computed {
            ChecksumVerdict::Accepted
        } else {
            ChecksumVerdict::Mismatch { stored, computed }
        }
    }

    fn seal(&self, payload: &mut [u8]) {
        let crc = payload_crc(payload);
        payload[..2].copy_from_slice(&crc.to_le_bytes());
    }
}

/// MSB-first CRC-16 with polynomial 0x8001, initial value 0, no reflection
/// and no final xor.
pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(0, |crc, &byte| crc16_update(crc, byte))
}

fn crc16_update(mut crc: u16, byte: u8) -> u16 {
    crc ^= u16::from(byte) << 8;
    for _ in 0..8 {
        crc = if crc & 0x8000 != 0 {
            (crc << 1) ^ CRC16_POLY
        } else {
            crc << 1
        };
    }
    crc
}

fn payload_crc(payload: &[u8]) -> u16 {
    let crc = crc16_update(crc16_update(0, 0), 0);
    payload[2..]
        .iter()
        .fold(crc, |crc, &byte| crc16_update(crc, byte))
}
