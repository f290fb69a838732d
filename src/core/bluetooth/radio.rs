//! The radio seam between the session core and a platform Bluetooth stack.
//!
//! A [`Radio`] accepts requests and reports their outcome later as
//! [`RadioEvent`]s posted into a [`RadioEventSender`]. Request methods only
//! return an error when the radio rejects the request outright; everything
//! else is observed through events.

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::core::bluetooth::types::{
    ConnectionState, GattStatus, ScanId, ScanMode, SessionHandle, WriteMode,
};
use crate::error::RadioError;

/// Sending half handed to radio callbacks. Unbounded so callbacks never block.
pub type RadioEventSender = mpsc::UnboundedSender<RadioEvent>;

/// Receiving half consumed by the session manager.
pub type RadioEventReceiver = mpsc::UnboundedReceiver<RadioEvent>;

/// Creates the channel a radio posts its events into.
pub fn radio_event_channel() -> (RadioEventSender, RadioEventReceiver) {
    mpsc::unbounded_channel()
}

/// Platform Bluetooth capability consumed by the sessions.
#[async_trait]
pub trait Radio: Send + Sync {
    /// Whether the adapter exists and is switched on
    async fn is_available(&self) -> bool;

    /// Starts discovery; hits arrive as [`ScanEvent::DeviceDiscovered`]
    /// tagged with the returned id
    async fn start_discovery(&self, mode: ScanMode) -> Result<ScanId, RadioError>;

    /// Stops discovery
    async fn stop_discovery(&self) -> Result<(), RadioError>;

    /// Opens a session to `address`; link changes arrive as
    /// [`GattEvent::ConnectionStateChanged`] tagged with the returned handle
    async fn open_session(&self, address: &str) -> Result<SessionHandle, RadioError>;

    /// Asks the peer to close the session; completion arrives as a
    /// `Disconnected` link change
    async fn close_session(&self, handle: SessionHandle) -> Result<(), RadioError>;

    /// Frees every resource held for `handle`. Must be safe to call for a
    /// handle the radio already considers closed.
    async fn release_session(&self, handle: SessionHandle);

    /// Discovers services; completion arrives as [`GattEvent::ServicesDiscovered`]
    async fn discover_attributes(&self, handle: SessionHandle) -> Result<(), RadioError>;

    /// Reads a characteristic; completion arrives as [`GattEvent::CharacteristicRead`]
    async fn read_attribute(&self, handle: SessionHandle, id: Uuid) -> Result<(), RadioError>;

    /// Writes a characteristic; completion arrives as [`GattEvent::CharacteristicWritten`]
    async fn write_attribute(
        &self,
        handle: SessionHandle,
        id: Uuid,
        value: &[u8],
        mode: WriteMode,
    ) -> Result<(), RadioError>;
}

/// One advertisement heard during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub address: String,
    pub name: Option<String>,
    pub rssi: i16,
    /// Company identifier from the manufacturer specific data, if present
    pub manufacturer_id: Option<u16>,
}

/// A characteristic as reported by the radio, before mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCharacteristic {
    pub id: Uuid,
    /// GATT properties bitmask
    pub properties: u32,
}

/// A service as reported by the radio, before mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawService {
    pub id: Uuid,
    pub characteristics: Vec<RawCharacteristic>,
}

/// Discovery report, tagged with the scan that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    DeviceDiscovered {
        scan: ScanId,
        advertisement: Advertisement,
    },
    DiscoveryFailed {
        scan: ScanId,
        code: i32,
    },
}

impl ScanEvent {
    pub fn scan(&self) -> ScanId {
        match self {
            Self::DeviceDiscovered { scan, .. } | Self::DiscoveryFailed { scan, .. } => *scan,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GattEvent {
    ConnectionStateChanged {
        handle: SessionHandle,
        status: GattStatus,
        state: ConnectionState,
    },
    ServicesDiscovered {
        handle: SessionHandle,
        status: GattStatus,
        services: Vec<RawService>,
    },
    CharacteristicRead {
        handle: SessionHandle,
        id: Uuid,
        status: GattStatus,
        value: Vec<u8>,
    },
    CharacteristicWritten {
        handle: SessionHandle,
        id: Uuid,
        status: GattStatus,
    },
}

impl GattEvent {
    pub fn handle(&self) -> SessionHandle {
        match self {
            Self::ConnectionStateChanged { handle, .. }
            | Self::ServicesDiscovered { handle, .. }
            | Self::CharacteristicRead { handle, .. }
            | Self::CharacteristicWritten { handle, .. } => *handle,
        }
    }
}

/// Everything a radio reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    Scan(ScanEvent),
    Gatt(GattEvent),
}

impl From<ScanEvent> for RadioEvent {
    fn from(event: ScanEvent) -> Self {
        RadioEvent::Scan(event)
    }
}

impl From<GattEvent> for RadioEvent {
    fn from(event: GattEvent) -> Self {
        RadioEvent::Gatt(event)
    }
}
