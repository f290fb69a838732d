//! Defines shared data structures for the Bluetooth module.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BleError;

/// Represents a discovered Bluetooth device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredDevice {
    /// The address of the device (MAC address on most platforms, platform id otherwise)
    pub address: String,
    /// The advertised name of the device, if available
    pub name: Option<String>,
    /// The signal strength (RSSI) in dBm
    pub rssi: i16,
    /// Vendor derived from the advertised manufacturer data, if any
    pub vendor: Option<String>,
}

impl DiscoveredDevice {
    /// Name to show for this device, `Unknown` when none was advertised.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }
}

/// Lifecycle of the single connection session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
        };
        f.write_str(label)
    }
}

/// A single capability bit of a characteristic.
///
/// Supporting a property does not mean the peripheral will permit the
/// operation; the radio may still reject it at I/O time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CharacteristicProperty {
    Broadcast,
    ExtendedProps,
    Indicate,
    Notify,
    Read,
    SignedWrite,
    Write,
    WriteNoResponse,
}

impl CharacteristicProperty {
    pub const ALL: [CharacteristicProperty; 8] = [
        CharacteristicProperty::Broadcast,
        CharacteristicProperty::ExtendedProps,
        CharacteristicProperty::Indicate,
        CharacteristicProperty::Notify,
        CharacteristicProperty::Read,
        CharacteristicProperty::SignedWrite,
        CharacteristicProperty::Write,
        CharacteristicProperty::WriteNoResponse,
    ];

    /// The bit this property occupies in the GATT properties field.
    pub const fn bit(self) -> u32 {
        match self {
            Self::Broadcast => 0x01,
            Self::Read => 0x02,
            Self::WriteNoResponse => 0x04,
            Self::Write => 0x08,
            Self::Notify => 0x10,
            Self::Indicate => 0x20,
            Self::SignedWrite => 0x40,
            Self::ExtendedProps => 0x80,
        }
    }
}

/// Set of [`CharacteristicProperty`] flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CharacteristicProperties(u32);

impl CharacteristicProperties {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn contains(self, property: CharacteristicProperty) -> bool {
        self.0 & property.bit() != 0
    }

    pub fn insert(&mut self, property: CharacteristicProperty) {
        self.0 |= property.bit();
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates the contained flags in [`CharacteristicProperty::ALL`] order.
    pub fn iter(self) -> impl Iterator<Item = CharacteristicProperty> {
        CharacteristicProperty::ALL
            .into_iter()
            .filter(move |property| self.contains(*property))
    }
}

impl FromIterator<CharacteristicProperty> for CharacteristicProperties {
    fn from_iter<I: IntoIterator<Item = CharacteristicProperty>>(iter: I) -> Self {
        let mut properties = Self::empty();
        for property in iter {
            properties.insert(property);
        }
        properties
    }
}

impl Serialize for CharacteristicProperties {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

/// A characteristic of a connected device, with its latest read value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Characteristic {
    pub id: Uuid,
    pub name: String,
    pub properties: CharacteristicProperties,
    pub can_read: bool,
    pub can_write: bool,
    pub last_read_value: Option<Vec<u8>>,
}

/// A service of a connected device and its characteristics, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub characteristics: Vec<Characteristic>,
}

/// How a characteristic write is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WriteMode {
    /// Acknowledged write request
    WithResponse,
    /// Unacknowledged write command
    WithoutResponse,
}

/// Duty cycle preference handed to the radio when discovery starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ScanMode {
    LowPower,
    Balanced,
    #[default]
    LowLatency,
}

/// Opaque identifier of one open radio session, issued by the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionHandle(pub u64);

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of one discovery run, issued by the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScanId(pub u64);

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scan {}", self.0)
    }
}

/// Status code delivered with every session event (ATT/GATT numbering).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GattStatus(pub i32);

impl GattStatus {
    pub const SUCCESS: Self = Self(0x00);
    pub const READ_NOT_PERMITTED: Self = Self(0x02);
    pub const WRITE_NOT_PERMITTED: Self = Self(0x03);
    pub const REQUEST_NOT_SUPPORTED: Self = Self(0x06);
    pub const INVALID_ATTRIBUTE_LENGTH: Self = Self(0x0d);
    pub const FAILURE: Self = Self(0x101);

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }

    pub fn code(self) -> i32 {
        self.0
    }
}

impl fmt::Display for GattStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

/// Out-of-band notifications published by the sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A request failed, locally or at the radio
    Error(BleError),
    /// A read completed and the value is now in `last_read_value`
    ReadCompleted { id: Uuid },
    /// The peripheral confirmed a write
    WriteCompleted { id: Uuid },
}
