//! Converts raw radio reports into the readable session model.
//!
//! Everything here is pure: no I/O, no shared mutable state.

use uuid::Uuid;

use crate::core::bluetooth::constants::RSSI_UNKNOWN;
use crate::core::bluetooth::gatt_names;
use crate::core::bluetooth::radio::{Advertisement, RawCharacteristic, RawService};
use crate::core::bluetooth::types::{
    Characteristic, CharacteristicProperties, CharacteristicProperty, DiscoveredDevice, Service,
    WriteMode,
};

/// Well-known Bluetooth SIG company identifiers.
const COMPANY_NAMES: &[(u16, &str)] = &[
    (0x0002, "Intel"),
    (0x0006, "Microsoft"),
    (0x000D, "Texas Instruments"),
    (0x000F, "Broadcom"),
    (0x004C, "Apple"),
    (0x0059, "Nordic Semiconductor"),
    (0x0075, "Samsung Electronics"),
    (0x0087, "Garmin"),
    (0x00E0, "Google"),
    (0x0171, "Amazon"),
];

/// Every known flag whose bit is set in `raw`; unknown bits are dropped.
pub fn properties_from_bits(raw: u32) -> CharacteristicProperties {
    CharacteristicProperty::ALL
        .into_iter()
        .filter(|property| raw & property.bit() != 0)
        .collect()
}

pub fn can_read(properties: CharacteristicProperties) -> bool {
    properties.contains(CharacteristicProperty::Read)
}

pub fn can_write(properties: CharacteristicProperties) -> bool {
    properties.contains(CharacteristicProperty::Write)
        || properties.contains(CharacteristicProperty::WriteNoResponse)
}

/// Acknowledged writes win over unacknowledged ones when both are supported.
pub fn select_write_mode(properties: CharacteristicProperties) -> Option<WriteMode> {
    if properties.contains(CharacteristicProperty::Write) {
        Some(WriteMode::WithResponse)
    } else if properties.contains(CharacteristicProperty::WriteNoResponse) {
        Some(WriteMode::WithoutResponse)
    } else {
        None
    }
}

/// Renders `<uuid> (<name>)`, naming unresolved ids `Unknown Characteristic`.
pub fn characteristic_display_name(id: &Uuid) -> String {
    let name = gatt_names::characteristic_name(id).unwrap_or("Unknown Characteristic");
    format!("{id} ({name})")
}

/// Renders `<uuid> (<name>)`, naming unresolved ids `Unknown Service`.
pub fn service_display_name(id: &Uuid) -> String {
    let name = gatt_names::service_name(id).unwrap_or("Unknown Service");
    format!("{id} ({name})")
}

pub fn map_characteristic(raw: &RawCharacteristic) -> Characteristic {
    let properties = properties_from_bits(raw.properties);
    Characteristic {
        id: raw.id,
        name: characteristic_display_name(&raw.id),
        properties,
        can_read: can_read(properties),
        can_write: can_write(properties),
        last_read_value: None,
    }
}

pub fn map_service(raw: &RawService) -> Service {
    Service {
        id: raw.id,
        name: service_display_name(&raw.id),
        characteristics: raw.characteristics.iter().map(map_characteristic).collect(),
    }
}

/// Vendor label for a manufacturer company id, `0xNNNN` when not well known.
pub fn vendor_label(manufacturer_id: Option<u16>) -> Option<String> {
    let id = manufacturer_id?;
    let label = match COMPANY_NAMES.binary_search_by_key(&id, |(number, _)| *number) {
        Ok(index) => COMPANY_NAMES[index].1.to_string(),
        Err(_) => format!("0x{id:04X}"),
    };
    Some(label)
}

/// Signal strength of a sighting, [`RSSI_UNKNOWN`] when the stack gave none.
pub fn rssi_or_unknown(rssi: Option<i16>) -> i16 {
    rssi.unwrap_or(RSSI_UNKNOWN)
}

pub fn device_from_advertisement(advertisement: Advertisement) -> DiscoveredDevice {
    DiscoveredDevice {
        vendor: vendor_label(advertisement.manufacturer_id),
        address: advertisement.address,
        name: advertisement.name,
        rssi: advertisement.rssi,
    }
}
