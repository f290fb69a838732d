//! Bluetooth manager
//! This module provides the main interface for bluetooth operations. A single
//! task owns the scan and connection sessions; callers talk to it through
//! commands and observe it through watch channels.

use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::core::bluetooth::connection::ConnectionSession;
use crate::core::bluetooth::radio::{Radio, RadioEvent, RadioEventReceiver};
use crate::core::bluetooth::scanner::ScanSession;
use crate::core::bluetooth::types::{
    ConnectionState, DiscoveredDevice, Service, SessionEvent,
};
use crate::error::BleError;

enum ManagerCommand {
    StartScan {
        reply: oneshot::Sender<Result<(), BleError>>,
    },
    StopScan,
    Connect {
        address: String,
    },
    Disconnect,
    ReadAttribute {
        id: Uuid,
    },
    WriteAttribute {
        id: Uuid,
        value: Vec<u8>,
    },
}

/// Sole writer of scan and connection state.
struct SessionActor {
    scanner: ScanSession,
    connection: ConnectionSession,
}

impl SessionActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<ManagerCommand>,
        mut radio_events: RadioEventReceiver,
        cancel_token: CancellationToken,
    ) {
        info!("Bluetooth session task started.");
        loop {
            tokio::select! {
                biased;
                _ = cancel_token.cancelled() => {
                    info!("Bluetooth session task cancelled.");
                    break;
                }
                Some(event) = radio_events.recv() => self.handle_radio_event(event).await,
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        info!("All manager handles dropped, stopping session task.");
                        break;
                    }
                },
            }
        }

        self.scanner.stop_scan().await;
        self.connection.shutdown().await;
        info!("Bluetooth session task stopped.");
    }

    async fn handle_command(&mut self, command: ManagerCommand) {
        match command {
            ManagerCommand::StartScan { reply } => {
                let result = self.scanner.start_scan().await;
                if reply.send(result).is_err() {
                    debug!("Scan requester went away before the reply.");
                }
            }
            ManagerCommand::StopScan => self.scanner.stop_scan().await,
            ManagerCommand::Connect { address } => {
                // Scanning and connecting share the radio; a refused connect
                // leaves the scan running.
                if self.connection.admit(&address).await {
                    self.scanner.stop_scan().await;
                    self.connection.open(&address).await;
                }
            }
            ManagerCommand::Disconnect => self.connection.disconnect().await,
            ManagerCommand::ReadAttribute { id } => self.connection.read_attribute(id).await,
            ManagerCommand::WriteAttribute { id, value } => {
                self.connection.write_attribute(id, value).await
            }
        }
    }

    async fn handle_radio_event(&mut self, event: RadioEvent) {
        match event {
            RadioEvent::Scan(event) => self.scanner.handle_event(event),
            RadioEvent::Gatt(event) => self.connection.handle_event(event).await,
        }
    }
}

/// Manages Bluetooth operations
pub struct BluetoothManager {
    tx: mpsc::Sender<ManagerCommand>,
    is_scanning: watch::Receiver<bool>,
    devices: watch::Receiver<Vec<DiscoveredDevice>>,
    connection_state: watch::Receiver<ConnectionState>,
    services: watch::Receiver<Vec<Service>>,
    events: broadcast::Sender<SessionEvent>,
    cancel_token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl BluetoothManager {
    /// Spawns the session task on the current tokio runtime. `radio_events`
    /// must be the receiving end of the channel `radio` posts into.
    pub fn new(radio: Arc<dyn Radio>, radio_events: RadioEventReceiver, config: &AppConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.session.command_buffer.max(1));
        let (events, _) = broadcast::channel(config.session.event_buffer.max(1));

        let scanner = ScanSession::new(radio.clone(), config.scan.scan_mode, events.clone());
        let connection = ConnectionSession::new(radio, events.clone());

        let is_scanning = scanner.subscribe_is_scanning();
        let devices = scanner.subscribe_devices();
        let connection_state = connection.subscribe_state();
        let services = connection.subscribe_services();

        let cancel_token = CancellationToken::new();
        let actor = SessionActor {
            scanner,
            connection,
        };
        let task = tokio::spawn(actor.run(rx, radio_events, cancel_token.clone()));

        Self {
            tx,
            is_scanning,
            devices,
            connection_state,
            services,
            events,
            cancel_token,
            task: Some(task),
        }
    }

    /// Starts a fresh scan, returning once the radio has accepted or refused it.
    pub async fn start_scan(&self) -> Result<(), BleError> {
        let (reply, response) = oneshot::channel();
        self.send(ManagerCommand::StartScan { reply }).await?;
        response.await.map_err(|_| BleError::SessionClosed)?
    }

    pub async fn stop_scan(&self) -> Result<(), BleError> {
        self.send(ManagerCommand::StopScan).await
    }

    /// Requests a session with `address`. Any running scan is stopped first,
    /// unless the request is refused.
    pub async fn connect(&self, address: &str) -> Result<(), BleError> {
        self.send(ManagerCommand::Connect {
            address: address.to_string(),
        })
        .await
    }

    pub async fn disconnect(&self) -> Result<(), BleError> {
        self.send(ManagerCommand::Disconnect).await
    }

    pub async fn read_attribute(&self, id: Uuid) -> Result<(), BleError> {
        self.send(ManagerCommand::ReadAttribute { id }).await
    }

    pub async fn write_attribute(&self, id: Uuid, value: Vec<u8>) -> Result<(), BleError> {
        self.send(ManagerCommand::WriteAttribute { id, value }).await
    }

    pub fn is_scanning(&self) -> watch::Receiver<bool> {
        self.is_scanning.clone()
    }

    pub fn discovered_devices(&self) -> watch::Receiver<Vec<DiscoveredDevice>> {
        self.devices.clone()
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection_state.clone()
    }

    pub fn device_attributes(&self) -> watch::Receiver<Vec<Service>> {
        self.services.clone()
    }

    /// Errors and operation completions, from the moment of subscription.
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Stops the session task, ending any scan and releasing any open session.
    pub async fn shutdown(&mut self) {
        self.cancel_token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Bluetooth session task ended abnormally: {}", e);
            }
        }
    }

    async fn send(&self, command: ManagerCommand) -> Result<(), BleError> {
        self.tx.send(command).await.map_err(|_| {
            warn!("Bluetooth session task is gone, dropping command.");
            BleError::SessionClosed
        })
    }
}

impl Drop for BluetoothManager {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::mock::{MockRadio, RadioCall};
    use crate::core::bluetooth::types::ScanMode;

    fn manager() -> (BluetoothManager, MockRadio) {
        let (radio, radio_events) = MockRadio::new();
        let manager = BluetoothManager::new(
            Arc::new(radio.clone()),
            radio_events,
            &AppConfig::default(),
        );
        (manager, radio)
    }

    #[tokio::test]
    async fn start_scan_reports_issuance() {
        let (manager, radio) = manager();
        manager.start_scan().await.unwrap();
        assert!(*manager.is_scanning().borrow());
        assert_eq!(radio.calls(), vec![RadioCall::StartDiscovery(ScanMode::LowLatency)]);

        radio.set_available(false);
        assert_eq!(manager.start_scan().await, Err(BleError::RadioUnavailable));
    }

    #[tokio::test]
    async fn shutdown_stops_scan_and_closes_the_manager() {
        let (mut manager, radio) = manager();
        manager.start_scan().await.unwrap();

        manager.shutdown().await;

        assert_eq!(radio.calls().last(), Some(&RadioCall::StopDiscovery));
        assert!(!*manager.is_scanning().borrow());
        assert_eq!(manager.stop_scan().await, Err(BleError::SessionClosed));
        assert_eq!(manager.start_scan().await, Err(BleError::SessionClosed));
    }

    #[tokio::test]
    async fn shutdown_releases_an_open_session() {
        let (mut manager, radio) = manager();
        let mut state = manager.connection_state();
        manager.connect("AA:BB").await.unwrap();
        state
            .wait_for(|s| *s == ConnectionState::Connecting)
            .await
            .unwrap();
        let handle = radio.last_handle().unwrap();

        manager.shutdown().await;

        let calls = radio.calls();
        assert!(calls.contains(&RadioCall::CloseSession(handle)));
        assert_eq!(calls.last(), Some(&RadioCall::ReleaseSession(handle)));
        assert_eq!(*manager.connection_state().borrow(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn connect_on_unavailable_radio_keeps_the_scan() {
        let (manager, radio) = manager();
        let mut events = manager.events();
        manager.start_scan().await.unwrap();
        radio.set_available(false);

        manager.connect("AA:BB").await.unwrap();

        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::Error(BleError::RadioUnavailable)
        );
        assert!(*manager.is_scanning().borrow());
        assert_eq!(radio.calls(), vec![RadioCall::StartDiscovery(ScanMode::LowLatency)]);
        assert_eq!(*manager.connection_state().borrow(), ConnectionState::Disconnected);
    }
}
