//! BLE explorer library
//! Scans for Bluetooth Low Energy peripherals, holds one connection at a time
//! and exposes the connected device's services for reading and writing.

// Module declarations
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod utils;

pub use config::AppConfig;
pub use crate::core::bluetooth::{BluetoothManager, MockRadio, Radio, SessionEvent};
pub use error::{BleError, RadioError};
