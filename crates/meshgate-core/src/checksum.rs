//! CRC-16/CCITT-FALSE over fragment bodies.
//!
//! Polynomial 0x1021, init 0xFFFF, no reflection, no final xor.

const POLY: u16 = 0x1021;
const INIT: u16 = 0xFFFF;

const CRC_TABLE: [u16; 256] = {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut j = 0;
        while j < 8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ POLY;
            } else {
                crc <<= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

#[inline]
#[must_use]
pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(INIT, |crc, &byte| {
        let index = ((crc >> 8) ^ u16::from(byte)) as usize;
        (crc << 8) ^ CRC_TABLE[index]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_vector() {
        assert_eq!(crc16(b"123456789"), 0x29B1);
    }

    #[test]
    fn test_empty_is_init() {
        assert_eq!(crc16(&[]), 0xFFFF);
    }

    #[test]
    fn test_single_bit_flip_detected() {
        let data = vec![0x5Au8; 200];
        let mut flipped = data.clone();
        flipped[100] ^= 0x01;
        assert_ne!(crc16(&data), crc16(&flipped));
    }
}
