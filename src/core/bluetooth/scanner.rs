//! Bluetooth scanning
//! This module runs discovery and folds the sightings into the device catalog.

use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::{broadcast, watch};

use crate::core::bluetooth::catalog::{DeviceCatalog, Sighting};
use crate::core::bluetooth::mapper;
use crate::core::bluetooth::radio::{Radio, ScanEvent};
use crate::core::bluetooth::types::{DiscoveredDevice, ScanId, ScanMode, SessionEvent};
use crate::error::BleError;

/// Owns the discovery on/off state and the catalog of devices heard so far.
pub struct ScanSession {
    radio: Arc<dyn Radio>,
    scan_mode: ScanMode,
    catalog: DeviceCatalog,
    /// Scan whose reports are folded; reports from any other are stale
    current_scan: Option<ScanId>,
    is_scanning: watch::Sender<bool>,
    devices: watch::Sender<Vec<DiscoveredDevice>>,
    events: broadcast::Sender<SessionEvent>,
}

impl ScanSession {
    pub fn new(
        radio: Arc<dyn Radio>,
        scan_mode: ScanMode,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let (is_scanning, _) = watch::channel(false);
        let (devices, _) = watch::channel(Vec::new());
        Self {
            radio,
            scan_mode,
            catalog: DeviceCatalog::new(),
            current_scan: None,
            is_scanning,
            devices,
            events,
        }
    }

    pub fn is_scanning(&self) -> bool {
        *self.is_scanning.borrow()
    }

    pub fn devices(&self) -> &[DiscoveredDevice] {
        self.catalog.devices()
    }

    pub fn subscribe_is_scanning(&self) -> watch::Receiver<bool> {
        self.is_scanning.subscribe()
    }

    pub fn subscribe_devices(&self) -> watch::Receiver<Vec<DiscoveredDevice>> {
        self.devices.subscribe()
    }

    /// Starts a fresh scan. The catalog is emptied first and an active scan
    /// is restarted rather than doubled up.
    pub async fn start_scan(&mut self) -> Result<(), BleError> {
        if !self.radio.is_available().await {
            error!("Device doesn't support Bluetooth or Bluetooth is disabled");
            return Err(self.report(BleError::RadioUnavailable));
        }

        self.catalog.clear();
        self.publish_devices();

        if self.is_scanning() {
            self.stop_scan().await;
        }

        match self.radio.start_discovery(self.scan_mode).await {
            Ok(scan) => {
                self.current_scan = Some(scan);
                self.is_scanning.send_replace(true);
                info!("Bluetooth {} started ({:?})", scan, self.scan_mode);
                Ok(())
            }
            Err(e) => {
                error!("Failed to start Bluetooth scan: {}", e);
                self.current_scan = None;
                self.is_scanning.send_replace(false);
                Err(self.report(BleError::DiscoveryFailed(e.code)))
            }
        }
    }

    pub async fn stop_scan(&mut self) {
        if !self.is_scanning() {
            debug!("Stop requested but no scan is running.");
            return;
        }

        self.current_scan = None;
        self.is_scanning.send_replace(false);
        match self.radio.stop_discovery().await {
            Ok(()) => info!("Bluetooth scanning stopped"),
            Err(e) => warn!("Radio did not stop discovery cleanly: {}", e),
        }
    }

    pub fn handle_event(&mut self, event: ScanEvent) {
        if self.current_scan != Some(event.scan()) {
            match self.current_scan {
                Some(current) => debug!("Discarding report from {} during {}", event.scan(), current),
                None => debug!("Discarding report from {} while not scanning", event.scan()),
            }
            return;
        }

        match event {
            ScanEvent::DeviceDiscovered { advertisement, .. } => {
                let device = mapper::device_from_advertisement(advertisement);
                match self.catalog.record(device) {
                    Sighting::New(index) => {
                        let device = &self.catalog.devices()[index];
                        info!(
                            "Found BLE device! Name: {}, address: {}, RSSI: {}",
                            device.display_name(),
                            device.address,
                            device.rssi
                        );
                    }
                    Sighting::Updated(index) => {
                        let device = &self.catalog.devices()[index];
                        debug!("Updated {} (RSSI {})", device.address, device.rssi);
                    }
                }
                self.publish_devices();
            }
            ScanEvent::DiscoveryFailed { scan, code } => {
                error!("Bluetooth {} failed: code {}", scan, code);
                self.current_scan = None;
                self.is_scanning.send_replace(false);
                self.report(BleError::DiscoveryFailed(code));
            }
        }
    }

    fn publish_devices(&self) {
        self.devices.send_replace(self.catalog.devices().to_vec());
    }

    fn report(&self, error: BleError) -> BleError {
        let _ = self.events.send(SessionEvent::Error(error.clone()));
        error
    }
}
