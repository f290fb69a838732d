//! Bluetooth session core
//! This module handles scanning for peripherals, the single-device
//! connection lifecycle and attribute reads/writes on that connection.

pub mod catalog;
pub mod connection;
pub mod constants;
pub mod gatt_names;
pub mod manager;
pub mod mapper;
pub mod mock;
pub mod radio;
pub mod scanner;
pub mod types;

#[cfg(feature = "bluest")]
pub mod bluest_radio;

// Re-export types that should be publicly accessible
#[cfg(feature = "bluest")]
pub use bluest_radio::BluestRadio;
pub use connection::ConnectionSession;
pub use manager::BluetoothManager;
pub use mock::{MockRadio, RadioCall};
pub use radio::{
    radio_event_channel, Advertisement, GattEvent, Radio, RadioEvent, RadioEventReceiver,
    RadioEventSender, RawCharacteristic, RawService, ScanEvent,
};
pub use scanner::ScanSession;
pub use types::{
    Characteristic, CharacteristicProperties, CharacteristicProperty, ConnectionState,
    DiscoveredDevice, GattStatus, ScanId, ScanMode, Service, SessionEvent, SessionHandle,
    WriteMode,
};
