//! Endian- and width-aware integer packing helpers.
//!
//! Mirrors the orchestrator's `pack`/`unpack`/`unpacks` family: the active
//! architecture decides word width (32 or 64 bits) and byte order, the
//! caller never has to pick a format string.

use crate::arch::Endian;
use crate::error::{Error, Result};

/// Pack a 64-bit word into the narrowest representation implied by `bits`.
pub fn pack(bits: u32, endian: Endian, value: u64) -> Result<Vec<u8>> {
    match bits {
        64 => Ok(match endian {
            Endian::Little => value.to_le_bytes().to_vec(),
            Endian::Big => value.to_be_bytes().to_vec(),
        }),
        32 => {
            let narrowed = value as u32;
            Ok(match endian {
                Endian::Little => narrowed.to_le_bytes().to_vec(),
                Endian::Big => narrowed.to_be_bytes().to_vec(),
            })
        }
        other => Err(Error::PackWidthUnsupported(other)),
    }
}

/// Unpack bytes into an unsigned word, sized and ordered per `bits`/`endian`.
pub fn unpack(bits: u32, endian: Endian, data: &[u8]) -> Result<u64> {
    match bits {
        64 => {
            let arr: [u8; 8] = data
                .get(..8)
                .and_then(|s| s.try_into().ok())
                .ok_or(Error::PackWidthUnsupported(64))?;
            Ok(match endian {
                Endian::Little => u64::from_le_bytes(arr),
                Endian::Big => u64::from_be_bytes(arr),
            })
        }
        32 => {
            let arr: [u8; 4] = data
                .get(..4)
                .and_then(|s| s.try_into().ok())
                .ok_or(Error::PackWidthUnsupported(32))?;
            Ok(match endian {
                Endian::Little => u32::from_le_bytes(arr) as u64,
                Endian::Big => u32::from_be_bytes(arr) as u64,
            })
        }
        other => Err(Error::PackWidthUnsupported(other)),
    }
}

/// Unpack bytes into a sign-extended word, sized and ordered per `bits`/`endian`.
pub fn unpacks(bits: u32, endian: Endian, data: &[u8]) -> Result<i64> {
    match bits {
        64 => {
            let arr: [u8; 8] = data
                .get(..8)
                .and_then(|s| s.try_into().ok())
                .ok_or(Error::PackWidthUnsupported(64))?;
            Ok(match endian {
                Endian::Little => i64::from_le_bytes(arr),
                Endian::Big => i64::from_be_bytes(arr),
            })
        }
        32 => {
            let arr: [u8; 4] = data
                .get(..4)
                .and_then(|s| s.try_into().ok())
                .ok_or(Error::PackWidthUnsupported(32))?;
            Ok(match endian {
                Endian::Little => i32::from_le_bytes(arr) as i64,
                Endian::Big => i32::from_be_bytes(arr) as i64,
            })
        }
        other => Err(Error::PackWidthUnsupported(other)),
    }
}

/// Host-order (native-little on every platform we target) signed 32-bit
/// unpack, used by syscall ABIs that are always host-order regardless of
/// the guest's declared endianness.
pub fn unpack32s_native(data: &[u8]) -> Result<i32> {
    let arr: [u8; 4] = data
        .get(..4)
        .and_then(|s| s.try_into().ok())
        .ok_or(Error::PackWidthUnsupported(32))?;
    Ok(i32::from_ne_bytes(arr))
}

#[cfg(test)]
mod tests {
    use quickcheck_macros::quickcheck;

    use super::*;

    #[test]
    fn pack_32_big_endian() {
        assert_eq!(
            pack(32, Endian::Big, 0x0102_0304).unwrap(),
            vec![0x01, 0x02, 0x03, 0x04]
        );
    }

    #[test]
    fn pack_64_little_endian() {
        assert_eq!(
            pack(64, Endian::Little, 0x0102_0304_0506_0708).unwrap(),
            vec![0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]
        );
    }

    #[test]
    fn unsupported_width_is_an_error() {
        assert!(matches!(
            pack(16, Endian::Little, 0),
            Err(Error::PackWidthUnsupported(16))
        ));
    }

    #[test]
    fn unpack32s_native_reads_host_order() {
        let bytes = (-5i32).to_ne_bytes();
        assert_eq!(unpack32s_native(&bytes).unwrap(), -5);
    }

    #[test]
    fn round_trip_32_and_64() {
        for bits in [32u32, 64] {
            for endian in [Endian::Little, Endian::Big] {
                let values: &[u64] = if bits == 32 {
                    &[0, 1, 0xDEAD_BEEF, u32::MAX as u64]
                } else {
                    &[0, 1, 0xDEAD_BEEF_CAFE_BABE, u64::MAX]
                };
                for &v in values {
                    let packed = pack(bits, endian, v).unwrap();
                    let unpacked = unpack(bits, endian, &packed).unwrap();
                    assert_eq!(unpacked, v, "bits={bits} endian={endian:?}");
                }
            }
        }
    }

    #[quickcheck]
    fn pack_unpack_round_trips_32(value: u32, big_endian: bool) -> bool {
        let endian = if big_endian { Endian::Big } else { Endian::Little };
        let packed = pack(32, endian, value as u64).unwrap();
        unpack(32, endian, &packed).unwrap() == value as u64
    }

    #[quickcheck]
    fn pack_unpack_round_trips_64(value: u64, big_endian: bool) -> bool {
        let endian = if big_endian { Endian::Big } else { Endian::Little };
        let packed = pack(64, endian, value).unwrap();
        unpack(64, endian, &packed).unwrap() == value
    }

    #[quickcheck]
    fn unpacks_sign_extends_32(value: i32, big_endian: bool) -> bool {
        let endian = if big_endian { Endian::Big } else { Endian::Little };
        let packed = pack(32, endian, value as u32 as u64).unwrap();
        unpacks(32, endian, &packed).unwrap() == value as i64
    }
}
