//! Bluetooth connection handling
//! This module runs the connection state machine for a single device and
//! keeps its discovered service tree and latest read values.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

use crate::core::bluetooth::mapper;
use crate::core::bluetooth::radio::{GattEvent, Radio, RawService};
use crate::core::bluetooth::types::{
    Characteristic, ConnectionState, GattStatus, Service, SessionEvent, SessionHandle,
};
use crate::error::BleError;
use crate::utils::to_hex_string;

/// Position of a characteristic inside the published service tree.
#[derive(Debug, Clone, Copy)]
struct AttributeLocation {
    service: usize,
    characteristic: usize,
}

/// Connection session for one device at a time.
pub struct ConnectionSession {
    radio: Arc<dyn Radio>,
    /// Radio handle of the open or opening session
    handle: Option<SessionHandle>,
    address: Option<String>,
    state: watch::Sender<ConnectionState>,
    services: watch::Sender<Vec<Service>>,
    /// Covers exactly the characteristics in `services`
    attribute_index: HashMap<Uuid, AttributeLocation>,
    events: broadcast::Sender<SessionEvent>,
}

impl ConnectionSession {
    pub fn new(radio: Arc<dyn Radio>, events: broadcast::Sender<SessionEvent>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (services, _) = watch::channel(Vec::new());
        Self {
            radio,
            handle: None,
            address: None,
            state,
            services,
            attribute_index: HashMap::new(),
            events,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn handle(&self) -> Option<SessionHandle> {
        self.handle
    }

    pub fn services(&self) -> Vec<Service> {
        self.services.borrow().clone()
    }

    pub fn characteristic(&self, id: &Uuid) -> Option<Characteristic> {
        let location = self.attribute_index.get(id)?;
        let services = self.services.borrow();
        Some(services[location.service].characteristics[location.characteristic].clone())
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn subscribe_services(&self) -> watch::Receiver<Vec<Service>> {
        self.services.subscribe()
    }

    /// Opens a session to `address`. Only one session exists at a time, so
    /// the request is rejected unless the session is `Disconnected`.
    pub async fn connect(&mut self, address: &str) {
        if self.admit(address).await {
            self.open(address).await;
        }
    }

    /// Whether a connect to `address` may proceed. A refusal is reported and
    /// leaves every piece of state untouched.
    pub async fn admit(&self, address: &str) -> bool {
        let current = self.state();
        if current != ConnectionState::Disconnected || self.handle.is_some() {
            warn!("Connect to {} rejected: session already {}", address, current);
            self.report(BleError::SessionBusy(current));
            return false;
        }

        if !self.radio.is_available().await {
            error!("Device doesn't support Bluetooth or Bluetooth is disabled");
            self.report(BleError::RadioUnavailable);
            return false;
        }
        true
    }

    /// Asks the radio for a session to an admitted `address`.
    pub(crate) async fn open(&mut self, address: &str) {
        self.address = Some(address.to_string());
        self.set_state(ConnectionState::Connecting);
        info!("Connecting to {}", address);

        match self.radio.open_session(address).await {
            Ok(handle) => {
                debug!("Radio opened session {} for {}", handle, address);
                self.handle = Some(handle);
            }
            Err(e) => {
                error!("Connection to {} rejected by radio: {}", address, e);
                self.teardown().await;
                self.report(BleError::ConnectionFailed(e.code));
            }
        }
    }

    /// Collapses the session toward `Disconnected` from any state.
    pub async fn disconnect(&mut self) {
        let Some(handle) = self.handle else {
            if self.state() == ConnectionState::Disconnected {
                debug!("Disconnect requested with no open session.");
            } else {
                self.teardown().await;
            }
            return;
        };

        if self.state() == ConnectionState::Disconnecting {
            debug!("Already disconnecting from {}", self.device_label());
            return;
        }

        info!("Disconnecting from {}", self.device_label());
        self.set_state(ConnectionState::Disconnecting);
        if let Err(e) = self.radio.close_session(handle).await {
            warn!("Radio refused to close session {}: {}. Releasing it.", handle, e);
            self.teardown().await;
        }
    }

    pub async fn read_attribute(&mut self, id: Uuid) {
        let (handle, characteristic) = match self.target(id) {
            Ok(target) => target,
            Err(e) => {
                warn!("Read of {} refused: {}", id, e);
                self.report(e);
                return;
            }
        };

        if !characteristic.can_read {
            warn!("Characteristic {} cannot be read", characteristic.name);
            self.report(BleError::AttributeNotReadable(id));
            return;
        }

        debug!("Reading {}", characteristic.name);
        if let Err(e) = self.radio.read_attribute(handle, id).await {
            error!("Radio rejected read of {}: {}", id, e);
            self.report(BleError::OperationRejected { id, code: e.code });
        }
    }

    pub async fn write_attribute(&mut self, id: Uuid, value: Vec<u8>) {
        let (handle, characteristic) = match self.target(id) {
            Ok(target) => target,
            Err(e) => {
                warn!("Write to {} refused: {}", id, e);
                self.report(e);
                return;
            }
        };

        let Some(mode) = mapper::select_write_mode(characteristic.properties) else {
            warn!("Characteristic {} cannot be written to", characteristic.name);
            self.report(BleError::AttributeNotWritable(id));
            return;
        };

        debug!(
            "Writing {} to {} ({:?})",
            to_hex_string(&value),
            characteristic.name,
            mode
        );
        if let Err(e) = self.radio.write_attribute(handle, id, &value, mode).await {
            error!("Radio rejected write to {}: {}", id, e);
            self.report(BleError::OperationRejected { id, code: e.code });
        }
    }

    /// Applies one radio event. Events tagged with a handle other than the
    /// current one belong to a released session and are discarded.
    pub async fn handle_event(&mut self, event: GattEvent) {
        if self.handle != Some(event.handle()) {
            debug!("Discarding event for stale session {}: {:?}", event.handle(), event);
            return;
        }

        match event {
            GattEvent::ConnectionStateChanged {
                handle,
                status,
                state,
            } => self.on_connection_state_changed(handle, status, state).await,
            GattEvent::ServicesDiscovered {
                status, services, ..
            } => self.on_services_discovered(status, services),
            GattEvent::CharacteristicRead {
                id, status, value, ..
            } => self.on_characteristic_read(id, status, value),
            GattEvent::CharacteristicWritten { id, status, .. } => {
                self.on_characteristic_written(id, status)
            }
        }
    }

    /// Closes and releases any open session. Used when the owner shuts down.
    pub async fn shutdown(&mut self) {
        if let Some(handle) = self.handle {
            if let Err(e) = self.radio.close_session(handle).await {
                debug!("Close on shutdown failed for {}: {}", handle, e);
            }
        }
        self.teardown().await;
    }

    async fn on_connection_state_changed(
        &mut self,
        handle: SessionHandle,
        status: GattStatus,
        reported: ConnectionState,
    ) {
        let current = self.state();
        let label = self.device_label();

        if !status.is_success() {
            error!("Error {} encountered for {}! Disconnecting...", status, label);
            let error = if current == ConnectionState::Connecting {
                BleError::ConnectionFailed(status.code())
            } else {
                BleError::ConnectionLost(status.code())
            };
            self.teardown().await;
            self.report(error);
            return;
        }

        match (current, reported) {
            (ConnectionState::Connecting, ConnectionState::Connected) => {
                info!("Successfully connected to {}", label);
                self.set_state(ConnectionState::Connected);
                if let Err(e) = self.radio.discover_attributes(handle).await {
                    error!("Service discovery for {} was rejected: {}", label, e);
                    self.report(BleError::AttributeDiscoveryFailed(e.code));
                }
            }
            (_, ConnectionState::Disconnected) => {
                info!("Disconnected from {}", label);
                self.teardown().await;
            }
            (
                ConnectionState::Connecting | ConnectionState::Connected,
                ConnectionState::Disconnecting,
            ) => {
                info!("{} is disconnecting", label);
                self.set_state(ConnectionState::Disconnecting);
            }
            (current, reported) if current == reported => {
                debug!("{} already {}", label, current);
            }
            (current, reported) => {
                debug!("Ignoring {} report for {} while {}", reported, label, current);
            }
        }
    }

    fn on_services_discovered(&mut self, status: GattStatus, services: Vec<RawService>) {
        let current = self.state();
        if current != ConnectionState::Connected {
            debug!("Ignoring service discovery result while {}", current);
            return;
        }

        if !status.is_success() {
            error!("Service discovery failed for {}: {}", self.device_label(), status);
            self.report(BleError::AttributeDiscoveryFailed(status.code()));
            return;
        }

        info!("Discovered {} services for {}", services.len(), self.device_label());
        for service in &services {
            let table = service
                .characteristics
                .iter()
                .map(|c| format!("|--{}", c.id))
                .collect::<Vec<_>>()
                .join("\n");
            info!("\nService {}\nCharacteristics:\n{}", service.id, table);
        }

        self.replace_attributes(&services);
    }

    fn on_characteristic_read(&mut self, id: Uuid, status: GattStatus, value: Vec<u8>) {
        if status == GattStatus::READ_NOT_PERMITTED {
            error!("Read not permitted for {}!", id);
            self.report(BleError::OperationRejected { id, code: status.code() });
            return;
        }
        if !status.is_success() {
            error!("Characteristic read failed for {}, error: {}", id, status);
            self.report(BleError::OperationRejected { id, code: status.code() });
            return;
        }

        let Some(location) = self.attribute_index.get(&id).copied() else {
            warn!("Read result for {} which is no longer in the service tree", id);
            return;
        };

        info!("Read characteristic {}:\n{}", id, to_hex_string(&value));

        // Publish a new tree instead of editing the current one in place.
        let mut services = self.services.borrow().clone();
        services[location.service].characteristics[location.characteristic].last_read_value =
            Some(value);
        self.services.send_replace(services);

        let _ = self.events.send(SessionEvent::ReadCompleted { id });
    }

    fn on_characteristic_written(&mut self, id: Uuid, status: GattStatus) {
        if status.is_success() {
            info!("Wrote to characteristic {}", id);
            let _ = self.events.send(SessionEvent::WriteCompleted { id });
            return;
        }

        if status == GattStatus::INVALID_ATTRIBUTE_LENGTH {
            error!("Write to {} exceeded connection ATT MTU!", id);
        } else if status == GattStatus::WRITE_NOT_PERMITTED {
            error!("Write not permitted for {}!", id);
        } else {
            error!("Characteristic write failed for {}, error: {}", id, status);
        }
        self.report(BleError::OperationRejected { id, code: status.code() });
    }

    /// Resolves `id` to the open handle and the characteristic's current snapshot.
    fn target(&self, id: Uuid) -> Result<(SessionHandle, Characteristic), BleError> {
        let characteristic = self
            .characteristic(&id)
            .ok_or(BleError::AttributeNotFound(id))?;
        match (self.state(), self.handle) {
            (ConnectionState::Connected, Some(handle)) => Ok((handle, characteristic)),
            _ => Err(BleError::NotConnected),
        }
    }

    /// Discovery is authoritative: the new tree replaces the old one wholesale.
    fn replace_attributes(&mut self, raw_services: &[RawService]) {
        let services: Vec<Service> = raw_services.iter().map(mapper::map_service).collect();

        let mut index = HashMap::new();
        for (service_index, service) in services.iter().enumerate() {
            for (characteristic_index, characteristic) in service.characteristics.iter().enumerate() {
                index.insert(
                    characteristic.id,
                    AttributeLocation {
                        service: service_index,
                        characteristic: characteristic_index,
                    },
                );
            }
        }

        self.attribute_index = index;
        self.services.send_replace(services);
    }

    /// Releases the handle, wipes the service tree and lands in `Disconnected`.
    async fn teardown(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!("Releasing session {}", handle);
            self.radio.release_session(handle).await;
        }
        self.address = None;
        self.attribute_index.clear();
        self.services.send_replace(Vec::new());
        self.set_state(ConnectionState::Disconnected);
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!("Connection state {} -> {}", previous, next);
        }
    }

    fn device_label(&self) -> String {
        self.address
            .clone()
            .unwrap_or_else(|| "unknown device".to_string())
    }

    fn report(&self, error: BleError) {
        let _ = self.events.send(SessionEvent::Error(error));
    }
}
