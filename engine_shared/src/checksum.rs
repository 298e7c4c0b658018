//! Sequence-bound checksums.
//!
//! Move packets carry a one byte checksum over their payload that is salted
//! with bytes chosen by the packet's outgoing sequence number. A replayed or
//! edited packet fails the check on the receiving side unless the attacker
//! also knows the salt table and the exact sequence it will be read under.

/// CRC-16/CCITT initial value.
const CRC_INIT: u16 = 0xffff;
const CRC_POLY: u16 = 0x1021;

/// Payload bytes beyond this are not covered.
pub const MAX_CHECKSUM_LEN: usize = 60;

const SALT_LEN: usize = 1024;

static CRC_TABLE: [u16; 256] = build_crc_table();
static SALT_TABLE: [u8; SALT_LEN] = build_salt_table();

const fn build_crc_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ CRC_POLY
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

// Fixed xorshift stream; both ends must build the same table.
const fn build_salt_table() -> [u8; SALT_LEN] {
    let mut table = [0u8; SALT_LEN];
    let mut state: u32 = 0x9e37_79b9;
    let mut i = 0;
    while i < SALT_LEN {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        table[i] = (state >> 24) as u8;
        i += 1;
    }
    table
}

/// CRC-16/CCITT over `data`.
pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(CRC_INIT, |crc, &b| {
        (crc << 8) ^ CRC_TABLE[((crc >> 8) as u8 ^ b) as usize]
    })
}

/// Checksum byte for `payload` sent under `sequence`.
pub fn sequence_crc_byte(payload: &[u8], sequence: u32) -> u8 {
    let offset = sequence as usize % (SALT_LEN - 4);
    let salt = &SALT_TABLE[offset..offset + 4];

    let len = payload.len().min(MAX_CHECKSUM_LEN);
    let mut block = [0u8; MAX_CHECKSUM_LEN + 4];
    block[..len].copy_from_slice(&payload[..len]);
    block[len..len + 4].copy_from_slice(salt);
    let block = &block[..len + 4];

    let sum = block.iter().fold(0u32, |acc, &b| acc.wrapping_add(b as u32));
    ((crc16(block) as u32 ^ sum) & 0xff) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc16_ccitt_check_value() {
        assert_eq!(crc16(b"123456789"), 0x29b1);
        assert_eq!(crc16(&[]), CRC_INIT);
    }

    #[test]
    fn checksum_depends_on_sequence() {
        let payload = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let distinct: std::collections::HashSet<u8> = (0..64)
            .map(|seq| sequence_crc_byte(&payload, seq))
            .collect();
        assert!(distinct.len() > 16, "salt barely varies: {}", distinct.len());
    }

    #[test]
    fn checksum_is_deterministic() {
        let payload = b"move packet body";
        assert_eq!(sequence_crc_byte(payload, 77), sequence_crc_byte(payload, 77));
    }

    #[test]
    fn bytes_past_limit_are_ignored() {
        let mut a = vec![7u8; 80];
        let b = a.clone();
        a[70] = 0;
        assert_eq!(sequence_crc_byte(&a, 3), sequence_crc_byte(&b, 3));
        a[10] = 0;
        assert_ne!(sequence_crc_byte(&a, 3), sequence_crc_byte(&b, 3));
    }
}
