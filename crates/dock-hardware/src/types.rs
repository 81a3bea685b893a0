//! Value types exchanged with the NFC reader.

use crate::error::{HardwareError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum UID length in bytes (per ISO 14443 specification).
pub const MIN_UID_LENGTH: usize = 4;

/// Maximum UID length in bytes (per ISO 14443 specification).
pub const MAX_UID_LENGTH: usize = 10;

/// Longest UID that still fits a `u64` decimal identity.
pub const MAX_DECIMAL_UID_LENGTH: usize = 8;

/// Unique identifier of a contactless card, 4 to 10 bytes.
///
/// # Examples
///
/// ```
/// use dock_hardware::CardUid;
///
/// let uid = CardUid::new(vec![0x01, 0x02, 0x03, 0x04]).unwrap();
/// assert_eq!(uid.identity(), "16909060");
/// assert_eq!(uid.hex(), "01020304");
///
/// assert!(CardUid::new(vec![0x01, 0x02]).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardUid(Vec<u8>);

impl CardUid {
    /// Create a UID, validating its length.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::InvalidData` if the UID length is not between
    /// [`MIN_UID_LENGTH`] and [`MAX_UID_LENGTH`].
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if !(MIN_UID_LENGTH..=MAX_UID_LENGTH).contains(&bytes.len()) {
            return Err(HardwareError::invalid_data(format!(
                "Card UID length must be between {} and {} bytes, got {}",
                MIN_UID_LENGTH,
                MAX_UID_LENGTH,
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Uppercase hexadecimal rendering of every byte.
    pub fn hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02X}")).collect()
    }

    /// Identity used to compare and report taps.
    ///
    /// UIDs of up to 8 bytes are read as a big-endian integer and rendered in
    /// decimal. Longer UIDs fall back to [`CardUid::hex`].
    pub fn identity(&self) -> String {
        if self.0.len() > MAX_DECIMAL_UID_LENGTH {
            return self.hex();
        }
        self.0
            .iter()
            .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte))
            .to_string()
    }
}

impl fmt::Display for CardUid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.identity())
    }
}

/// Firmware version reported by the reader chip.
///
/// The chip answers with one 32-bit word: IC type, major, minor and support
/// flags, most significant byte first. A zero word means the chip did not
/// answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareVersion {
    pub ic: u8,
    pub major: u8,
    pub minor: u8,
    pub support: u8,
}

impl FirmwareVersion {
    /// Decode the raw version word.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::InitializationFailed` for a zero word.
    ///
    /// # Examples
    ///
    /// ```
    /// use dock_hardware::FirmwareVersion;
    ///
    /// let version = FirmwareVersion::from_raw(0x3201_0607).unwrap();
    /// assert_eq!(version.to_string(), "1.6");
    /// assert!(FirmwareVersion::from_raw(0).is_err());
    /// ```
    pub fn from_raw(raw: u32) -> Result<Self> {
        if raw == 0 {
            return Err(HardwareError::initialization_failed(
                "reader returned no firmware version",
            ));
        }
        let [ic, major, minor, support] = raw.to_be_bytes();
        Ok(Self {
            ic,
            major,
            minor,
            support,
        })
    }

    pub fn to_raw(self) -> u32 {
        u32::from_be_bytes([self.ic, self.major, self.minor, self.support])
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Settings applied when the reader bus is (re)started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusSettings {
    pub clock_hz: u32,
    pub timeout_ms: u16,
}

impl BusSettings {
    pub fn new(clock_hz: u32, timeout_ms: u16) -> Self {
        Self {
            clock_hz,
            timeout_ms,
        }
    }
}

impl Default for BusSettings {
    fn default() -> Self {
        Self::new(
            dock_core::constants::NFC_BUS_CLOCK_HZ,
            dock_core::constants::NFC_BUS_TIMEOUT_MS,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(vec![0x01, 0x02, 0x03, 0x04], "16909060")]
    #[case(vec![0x04, 0xAB, 0xCD, 0xEF], "78368239")]
    #[case(vec![0x00, 0x00, 0x00, 0x00], "0")]
    #[case(vec![0xFF; 8], "18446744073709551615")]
    #[case(vec![0x04, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88], "041122334455667788")]
    #[case(vec![0xAB; 10], "ABABABABABABABABABAB")]
    fn test_uid_identity(#[case] bytes: Vec<u8>, #[case] expected: &str) {
        assert_eq!(CardUid::new(bytes).unwrap().identity(), expected);
    }

    #[rstest]
    #[case(0)]
    #[case(3)]
    #[case(11)]
    fn test_uid_length_rejected(#[case] len: usize) {
        assert!(matches!(
            CardUid::new(vec![0x01; len]),
            Err(HardwareError::InvalidData { .. })
        ));
    }

    #[test]
    fn test_firmware_version_fields() {
        let version = FirmwareVersion::from_raw(0x3201_0607).unwrap();
        assert_eq!(version.ic, 0x32);
        assert_eq!(version.major, 1);
        assert_eq!(version.minor, 6);
        assert_eq!(version.support, 7);
        assert_eq!(version.to_raw(), 0x3201_0607);
    }

    #[test]
    fn test_bus_settings_default() {
        let settings = BusSettings::default();
        assert_eq!(settings.clock_hz, 100_000);
        assert_eq!(settings.timeout_ms, 50);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn decimal_identity_matches_big_endian_value(
                bytes in prop::collection::vec(any::<u8>(), MIN_UID_LENGTH..=MAX_DECIMAL_UID_LENGTH)
            ) {
                let mut padded = [0u8; 8];
                padded[8 - bytes.len()..].copy_from_slice(&bytes);
                let uid = CardUid::new(bytes).unwrap();
                prop_assert_eq!(uid.identity(), u64::from_be_bytes(padded).to_string());
            }

            #[test]
            fn long_uids_use_hex_identity(
                bytes in prop::collection::vec(
                    any::<u8>(),
                    MAX_DECIMAL_UID_LENGTH + 1..=MAX_UID_LENGTH,
                )
            ) {
                let uid = CardUid::new(bytes).unwrap();
                prop_assert_eq!(uid.identity(), uid.hex());
                prop_assert_eq!(uid.hex().len(), uid.len() * 2);
            }
        }
    }
}
