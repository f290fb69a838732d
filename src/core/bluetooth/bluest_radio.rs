//! Radio backed by the host Bluetooth stack through `bluest`.
//! Every request is issued on a background task and its outcome is posted
//! back as a `RadioEvent`, so callers never wait on the adapter.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bluest::error::ErrorKind;
use bluest::{Adapter, ConnectionEvent, Device};
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::bluetooth::constants::{
    RADIO_ERROR_UNKNOWN_ATTRIBUTE, RADIO_ERROR_UNKNOWN_DEVICE, RADIO_ERROR_UNKNOWN_SESSION,
    SCAN_FAILED_INTERNAL_ERROR,
};
use crate::core::bluetooth::mapper::rssi_or_unknown;
use crate::core::bluetooth::radio::{
    radio_event_channel, Advertisement, GattEvent, Radio, RadioEvent, RadioEventReceiver,
    RadioEventSender, RawCharacteristic, RawService, ScanEvent,
};
use crate::core::bluetooth::types::{
    CharacteristicProperty, ConnectionState, GattStatus, ScanId, ScanMode, SessionHandle,
    WriteMode,
};
use crate::error::RadioError;
use crate::utils::extract_mac_address;

struct ScanTask {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

struct OpenSession {
    address: String,
    device: Device,
    characteristics: HashMap<Uuid, bluest::Characteristic>,
    /// Stops the link watcher
    watch_token: CancellationToken,
}

#[derive(Default)]
struct BluestState {
    /// Devices seen by the current scan, plus those with an open session
    devices: HashMap<String, Device>,
    sessions: HashMap<SessionHandle, OpenSession>,
    scan: Option<ScanTask>,
}

pub struct BluestRadio {
    adapter: Adapter,
    events: RadioEventSender,
    state: Arc<Mutex<BluestState>>,
    next_handle: AtomicU64,
    next_scan: AtomicU64,
}

impl BluestRadio {
    /// Opens the default adapter and waits for it to become available.
    pub async fn new() -> Result<(Self, RadioEventReceiver)> {
        let adapter = Adapter::default()
            .await
            .ok_or_else(|| anyhow!("No Bluetooth adapter found"))?;
        adapter.wait_available().await?;
        info!("Bluetooth adapter is available.");

        let (events, receiver) = radio_event_channel();
        let radio = Self {
            adapter,
            events,
            state: Arc::new(Mutex::new(BluestState::default())),
            next_handle: AtomicU64::new(1),
            next_scan: AtomicU64::new(1),
        };
        Ok((radio, receiver))
    }

    fn lock(&self) -> MutexGuard<'_, BluestState> {
        lock_state(&self.state)
    }

    fn session_device(&self, handle: SessionHandle) -> Result<Device, RadioError> {
        self.lock()
            .sessions
            .get(&handle)
            .map(|session| session.device.clone())
            .ok_or_else(|| unknown_session(handle))
    }

    fn session_characteristic(
        &self,
        handle: SessionHandle,
        id: Uuid,
    ) -> Result<bluest::Characteristic, RadioError> {
        let state = self.lock();
        let session = state
            .sessions
            .get(&handle)
            .ok_or_else(|| unknown_session(handle))?;
        session.characteristics.get(&id).cloned().ok_or_else(|| {
            RadioError::new(
                RADIO_ERROR_UNKNOWN_ATTRIBUTE,
                format!("characteristic {id} was not discovered on {handle}"),
            )
        })
    }

    async fn stop_scan_task(&self) {
        let scan = self.lock().scan.take();
        if let Some(scan) = scan {
            scan.cancel_token.cancel();
            if let Err(e) = scan.handle.await {
                if !e.is_cancelled() {
                    error!("Scan task finished with an unexpected join error: {:?}", e);
                }
            }
        }
    }
}

#[async_trait]
impl Radio for BluestRadio {
    async fn is_available(&self) -> bool {
        self.adapter.is_available().await.unwrap_or(false)
    }

    async fn start_discovery(&self, mode: ScanMode) -> Result<ScanId, RadioError> {
        self.stop_scan_task().await;
        debug!("Host stack picks its own scan parameters; requested {:?}", mode);

        {
            let mut state = self.lock();
            let in_use: HashSet<String> = state
                .sessions
                .values()
                .map(|session| session.address.clone())
                .collect();
            forget_unused_devices(&mut state.devices, &in_use);
        }

        let scan = ScanId(self.next_scan.fetch_add(1, Ordering::Relaxed));
        let cancel_token = CancellationToken::new();
        let task_token = cancel_token.clone();
        let adapter = self.adapter.clone();
        let events = self.events.clone();
        let state = self.state.clone();

        let handle = tokio::spawn(async move {
            let mut scan_stream = match adapter.scan(&[]).await {
                Ok(stream) => stream,
                Err(e) => {
                    error!("Failed to start Bluetooth scan: {}", e);
                    post(&events, ScanEvent::DiscoveryFailed {
                        scan,
                        code: SCAN_FAILED_INTERNAL_ERROR,
                    });
                    return;
                }
            };

            loop {
                tokio::select! {
                    result = scan_stream.next() => match result {
                        Some(discovered) => {
                            let id = discovered.device.id().to_string();
                            let address = extract_mac_address(&id).unwrap_or(id);
                            let name = discovered
                                .adv_data
                                .local_name
                                .clone()
                                .or_else(|| discovered.device.name().ok());
                            let advertisement = Advertisement {
                                address: address.clone(),
                                name,
                                rssi: rssi_or_unknown(discovered.rssi),
                                manufacturer_id: discovered
                                    .adv_data
                                    .manufacturer_data
                                    .as_ref()
                                    .map(|data| data.company_id),
                            };
                            lock_state(&state).devices.insert(address, discovered.device);
                            post(&events, ScanEvent::DeviceDiscovered { scan, advertisement });
                        }
                        None => {
                            info!("Bluetooth scan stream has ended.");
                            post(&events, ScanEvent::DiscoveryFailed {
                                scan,
                                code: SCAN_FAILED_INTERNAL_ERROR,
                            });
                            break;
                        }
                    },
                    _ = task_token.cancelled() => break,
                }
            }
        });

        self.lock().scan = Some(ScanTask {
            cancel_token,
            handle,
        });
        Ok(scan)
    }

    async fn stop_discovery(&self) -> Result<(), RadioError> {
        self.stop_scan_task().await;
        Ok(())
    }

    async fn open_session(&self, address: &str) -> Result<SessionHandle, RadioError> {
        let device = self.lock().devices.get(address).cloned().ok_or_else(|| {
            RadioError::new(
                RADIO_ERROR_UNKNOWN_DEVICE,
                format!("{address} has not been seen by a scan"),
            )
        })?;

        let handle = SessionHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let watch_token = CancellationToken::new();
        self.lock().sessions.insert(
            handle,
            OpenSession {
                address: address.to_string(),
                device: device.clone(),
                characteristics: HashMap::new(),
                watch_token: watch_token.clone(),
            },
        );

        let adapter = self.adapter.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let connected = if device.is_connected().await {
                info!("Device {} already connected.", device.id());
                true
            } else {
                info!("Initiating connection to {}...", device.id());
                match adapter.connect_device(&device).await {
                    Ok(()) => true,
                    Err(e) => {
                        error!("Connection to {} failed: {}", device.id(), e);
                        false
                    }
                }
            };

            let (status, state) = if connected {
                (GattStatus::SUCCESS, ConnectionState::Connected)
            } else {
                (GattStatus::FAILURE, ConnectionState::Disconnected)
            };
            post(&events, GattEvent::ConnectionStateChanged {
                handle,
                status,
                state,
            });
            if connected {
                watch_link(adapter, events, handle, device, watch_token);
            }
        });

        Ok(handle)
    }

    async fn close_session(&self, handle: SessionHandle) -> Result<(), RadioError> {
        let device = {
            let state = self.lock();
            let session = state
                .sessions
                .get(&handle)
                .ok_or_else(|| unknown_session(handle))?;
            session.watch_token.cancel();
            session.device.clone()
        };

        let adapter = self.adapter.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let status = match adapter.disconnect_device(&device).await {
                Ok(()) => {
                    info!("Successfully disconnected");
                    GattStatus::SUCCESS
                }
                Err(e) => {
                    error!("Disconnect from {} failed: {}", device.id(), e);
                    GattStatus::FAILURE
                }
            };
            post(&events, GattEvent::ConnectionStateChanged {
                handle,
                status,
                state: ConnectionState::Disconnected,
            });
        });
        Ok(())
    }

    async fn release_session(&self, handle: SessionHandle) {
        if let Some(session) = self.lock().sessions.remove(&handle) {
            session.watch_token.cancel();
            debug!("Released {} ({} characteristics)", handle, session.characteristics.len());
        }
    }

    async fn discover_attributes(&self, handle: SessionHandle) -> Result<(), RadioError> {
        let device = self.session_device(handle)?;
        let events = self.events.clone();
        let state = self.state.clone();

        tokio::spawn(async move {
            let (status, services) = match collect_services(&device).await {
                Ok((services, characteristics)) => {
                    if let Some(session) = lock_state(&state).sessions.get_mut(&handle) {
                        session.characteristics = characteristics;
                    }
                    (GattStatus::SUCCESS, services)
                }
                Err(e) => {
                    error!("Service discovery on {} failed: {}", device.id(), e);
                    (status_from_error(&e, GattStatus::FAILURE), Vec::new())
                }
            };
            post(&events, GattEvent::ServicesDiscovered {
                handle,
                status,
                services,
            });
        });
        Ok(())
    }

    async fn read_attribute(&self, handle: SessionHandle, id: Uuid) -> Result<(), RadioError> {
        let characteristic = self.session_characteristic(handle, id)?;
        let events = self.events.clone();

        tokio::spawn(async move {
            let (status, value) = match characteristic.read().await {
                Ok(value) => (GattStatus::SUCCESS, value),
                Err(e) => {
                    debug!("Read of {} failed: {}", id, e);
                    (status_from_error(&e, GattStatus::READ_NOT_PERMITTED), Vec::new())
                }
            };
            post(&events, GattEvent::CharacteristicRead {
                handle,
                id,
                status,
                value,
            });
        });
        Ok(())
    }

    async fn write_attribute(
        &self,
        handle: SessionHandle,
        id: Uuid,
        value: &[u8],
        mode: WriteMode,
    ) -> Result<(), RadioError> {
        let characteristic = self.session_characteristic(handle, id)?;
        let events = self.events.clone();
        let value = value.to_vec();

        tokio::spawn(async move {
            let result = match mode {
                WriteMode::WithResponse => characteristic.write(&value).await,
                WriteMode::WithoutResponse => characteristic.write_without_response(&value).await,
            };
            let status = match result {
                Ok(()) => GattStatus::SUCCESS,
                Err(e) => {
                    debug!("Write to {} failed: {}", id, e);
                    status_from_error(&e, GattStatus::WRITE_NOT_PERMITTED)
                }
            };
            post(&events, GattEvent::CharacteristicWritten { handle, id, status });
        });
        Ok(())
    }
}

/// Posts `Disconnected` with a failure status if the link drops while
/// nobody asked for it.
fn watch_link(
    adapter: Adapter,
    events: RadioEventSender,
    handle: SessionHandle,
    device: Device,
    watch_token: CancellationToken,
) {
    tokio::spawn(async move {
        let mut connection_events = match adapter.device_connection_events(&device).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Cannot watch link state for {}: {}", handle, e);
                return;
            }
        };
        loop {
            tokio::select! {
                event = connection_events.next() => match event {
                    Some(ConnectionEvent::Disconnected) => {
                        warn!("Link for {} dropped unexpectedly", handle);
                        post(&events, GattEvent::ConnectionStateChanged {
                            handle,
                            status: GattStatus::FAILURE,
                            state: ConnectionState::Disconnected,
                        });
                        break;
                    }
                    Some(_) => {}
                    None => break,
                },
                _ = watch_token.cancelled() => break,
            }
        }
    });
}

/// Drops devices from earlier scans unless an open session still uses them.
fn forget_unused_devices<D>(devices: &mut HashMap<String, D>, in_use: &HashSet<String>) {
    devices.retain(|address, _| in_use.contains(address));
}

type DiscoveredTree = (Vec<RawService>, HashMap<Uuid, bluest::Characteristic>);

async fn collect_services(device: &Device) -> std::result::Result<DiscoveredTree, bluest::Error> {
    let mut services = Vec::new();
    let mut handles = HashMap::new();

    for service in device.services().await? {
        let mut characteristics = Vec::new();
        for characteristic in service.characteristics().await? {
            let properties = characteristic.properties().await?;
            characteristics.push(RawCharacteristic {
                id: characteristic.uuid(),
                properties: property_bits(&properties),
            });
            handles.insert(characteristic.uuid(), characteristic);
        }
        services.push(RawService {
            id: service.uuid(),
            characteristics,
        });
    }
    Ok((services, handles))
}

fn property_bits(properties: &bluest::CharacteristicProperties) -> u32 {
    [
        (properties.broadcast, CharacteristicProperty::Broadcast),
        (properties.read, CharacteristicProperty::Read),
        (properties.write_without_response, CharacteristicProperty::WriteNoResponse),
        (properties.write, CharacteristicProperty::Write),
        (properties.notify, CharacteristicProperty::Notify),
        (properties.indicate, CharacteristicProperty::Indicate),
        (properties.authenticated_signed_writes, CharacteristicProperty::SignedWrite),
        (properties.extended_properties, CharacteristicProperty::ExtendedProps),
    ]
    .into_iter()
    .filter(|(set, _)| *set)
    .fold(0, |bits, (_, property)| bits | property.bit())
}

/// `denied` is reported when the stack refuses on permission grounds.
fn status_from_error(error: &bluest::Error, denied: GattStatus) -> GattStatus {
    match error.kind() {
        ErrorKind::NotAuthorized => denied,
        ErrorKind::NotSupported => GattStatus::REQUEST_NOT_SUPPORTED,
        _ => GattStatus::FAILURE,
    }
}

fn unknown_session(handle: SessionHandle) -> RadioError {
    RadioError::new(RADIO_ERROR_UNKNOWN_SESSION, format!("no open session {handle}"))
}

fn lock_state(state: &Mutex<BluestState>) -> MutexGuard<'_, BluestState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn post(events: &RadioEventSender, event: impl Into<RadioEvent>) {
    if events.send(event.into()).is_err() {
        debug!("Radio event dropped: no session task is listening.");
    }
}
