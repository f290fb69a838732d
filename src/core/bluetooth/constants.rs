//! Constants used throughout the Bluetooth core
//! This module contains UUIDs, radio error codes and default sizes.

use uuid::Uuid;

/// The Bluetooth base UUID, `0000xxxx-0000-1000-8000-00805f9b34fb`
pub const BLUETOOTH_BASE_UUID: u128 = 0x00000000_0000_1000_8000_00805f9b34fb;

/// Expands a 16-bit assigned number into a full UUID
pub const fn uuid_from_u16(short: u16) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID | ((short as u128) << 96))
}

/// Returns the 16-bit assigned number if `uuid` sits on the base UUID
pub fn uuid_to_u16(uuid: &Uuid) -> Option<u16> {
    let value = uuid.as_u128();
    let alias = value >> 96;
    if value & ((1u128 << 96) - 1) == BLUETOOTH_BASE_UUID && alias <= u16::MAX as u128 {
        Some(alias as u16)
    } else {
        None
    }
}

/// Standard Bluetooth Service UUIDs
pub const UUID_BATTERY_SERVICE: Uuid = uuid_from_u16(0x180F);
pub const UUID_HEART_RATE_SERVICE: Uuid = uuid_from_u16(0x180D);

/// Standard Bluetooth Characteristic UUIDs
pub const UUID_BATTERY_LEVEL: Uuid = uuid_from_u16(0x2A19);
pub const UUID_HEART_RATE_CONTROL_POINT: Uuid = uuid_from_u16(0x2A39);

/// Discovery failure code delivered with `ScanEvent::DiscoveryFailed`
pub const SCAN_FAILED_INTERNAL_ERROR: i32 = 3;

/// Codes for synchronous radio rejections
pub const RADIO_ERROR_INVALID_ADDRESS: i32 = 1001;
pub const RADIO_ERROR_UNKNOWN_DEVICE: i32 = 1002;
pub const RADIO_ERROR_UNKNOWN_SESSION: i32 = 1003;
pub const RADIO_ERROR_UNKNOWN_ATTRIBUTE: i32 = 1004;

/// Signal strength reported for a sighting that carried none, below any real reading
pub const RSSI_UNKNOWN: i16 = i16::MIN;

/// Default capacity of the caller command queue
pub const DEFAULT_COMMAND_BUFFER: usize = 32;

/// Default capacity of the session event broadcast channel
pub const DEFAULT_EVENT_BUFFER: usize = 64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_uuids_expand_onto_base() {
        assert_eq!(
            UUID_BATTERY_LEVEL.to_string(),
            "00002a19-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(uuid_to_u16(&UUID_BATTERY_LEVEL), Some(0x2A19));
    }

    #[test]
    fn vendor_uuids_have_no_short_form() {
        let vendor = Uuid::from_u128(0xc8c51726_81bc_483b_a052_f7a14ea3d281);
        assert_eq!(uuid_to_u16(&vendor), None);

        // 32-bit alias on the base UUID
        let wide = Uuid::from_u128(BLUETOOTH_BASE_UUID | (0x0001_2A19u128 << 96));
        assert_eq!(uuid_to_u16(&wide), None);
    }
}
