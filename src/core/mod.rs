//! Core functionality for the BLE explorer

pub mod bluetooth;

// Re-export commonly used types
pub use bluetooth::{BluetoothManager, ConnectionState, DiscoveredDevice, Service};
