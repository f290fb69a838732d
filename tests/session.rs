//! End-to-end tests driving `BluetoothManager` through the in-memory radio.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use ble_explorer_lib::config::AppConfig;
use ble_explorer_lib::core::bluetooth::constants::{
    SCAN_FAILED_INTERNAL_ERROR, UUID_BATTERY_LEVEL, UUID_BATTERY_SERVICE,
    UUID_HEART_RATE_CONTROL_POINT, UUID_HEART_RATE_SERVICE,
};
use ble_explorer_lib::core::bluetooth::{
    Advertisement, BluetoothManager, ConnectionState, GattEvent, GattStatus, MockRadio, RadioCall,
    RawCharacteristic, RawService, ScanEvent, ScanMode, SessionEvent, SessionHandle, WriteMode,
};
use ble_explorer_lib::BleError;
use tokio::sync::broadcast;
use tokio::time::timeout;

const STEP: Duration = Duration::from_secs(2);

fn start() -> (BluetoothManager, MockRadio) {
    let (radio, radio_events) = MockRadio::new();
    let manager = BluetoothManager::new(Arc::new(radio.clone()), radio_events, &AppConfig::default());
    (manager, radio)
}

fn device_tree() -> Vec<RawService> {
    vec![
        RawService {
            id: UUID_BATTERY_SERVICE,
            characteristics: vec![RawCharacteristic {
                id: UUID_BATTERY_LEVEL,
                properties: 0x02 | 0x10,
            }],
        },
        RawService {
            id: UUID_HEART_RATE_SERVICE,
            characteristics: vec![RawCharacteristic {
                id: UUID_HEART_RATE_CONTROL_POINT,
                properties: 0x08,
            }],
        },
    ]
}

async fn wait_for_state(manager: &BluetoothManager, wanted: ConnectionState) {
    let mut state = manager.connection_state();
    timeout(STEP, state.wait_for(|s| *s == wanted))
        .await
        .unwrap_or_else(|_| panic!("never reached {wanted}"))
        .unwrap();
}

async fn wait_for_call(radio: &MockRadio, wanted: RadioCall) {
    timeout(STEP, async {
        while !radio.calls().contains(&wanted) {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("radio never saw {wanted:?}"));
}

fn count_calls(radio: &MockRadio, wanted: &RadioCall) -> usize {
    radio.calls().iter().filter(|call| *call == wanted).count()
}

async fn next_error(events: &mut broadcast::Receiver<SessionEvent>) -> BleError {
    timeout(STEP, async {
        loop {
            if let SessionEvent::Error(error) = events.recv().await.unwrap() {
                return error;
            }
        }
    })
    .await
    .expect("no error was reported")
}

/// Connects to `AA:BB` and waits until the service tree is published.
async fn connected_with_services(manager: &BluetoothManager, radio: &MockRadio) -> SessionHandle {
    manager.connect("AA:BB").await.unwrap();
    wait_for_state(manager, ConnectionState::Connecting).await;
    let handle = radio.last_handle().expect("session opened");

    radio.link_changed(handle, GattStatus::SUCCESS, ConnectionState::Connected);
    radio.services_discovered(handle, device_tree());

    let mut attributes = manager.device_attributes();
    timeout(STEP, attributes.wait_for(|services| services.len() == 2))
        .await
        .expect("services never published")
        .unwrap();
    handle
}

#[tokio::test]
async fn scan_folds_sightings_and_restart_clears() {
    let (manager, radio) = start();
    let mut devices = manager.discovered_devices();

    manager.start_scan().await.unwrap();
    radio.advertise("AA:BB", Some("Thermometer"), -80);
    radio.advertise("CC:DD", None, -90);
    radio.advertise("AA:BB", Some("Thermometer"), -50);

    let snapshot = timeout(STEP, devices.wait_for(|d| d.len() == 2 && d[0].rssi == -50))
        .await
        .unwrap()
        .unwrap()
        .clone();
    assert_eq!(snapshot[0].address, "AA:BB");
    assert_eq!(snapshot[0].display_name(), "Thermometer");
    assert_eq!(snapshot[1].display_name(), "Unknown");

    manager.start_scan().await.unwrap();
    assert!(manager.discovered_devices().borrow().is_empty());
    assert!(*manager.is_scanning().borrow());
}

#[tokio::test]
async fn concurrent_sightings_never_duplicate_an_address() {
    let (manager, radio) = start();
    let mut devices = manager.discovered_devices();
    manager.start_scan().await.unwrap();

    let emitters: Vec<_> = (0..4)
        .map(|worker| {
            let radio = radio.clone();
            tokio::spawn(async move {
                for round in 0..250i16 {
                    let address = format!("0{}:{:02X}", worker, round % 5);
                    radio.advertise(&address, None, -round);
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();
    for emitter in emitters {
        emitter.await.unwrap();
    }

    // Each address is last heard in round 245..=249.
    let snapshot = timeout(
        STEP,
        devices.wait_for(|d| d.len() == 20 && d.iter().all(|device| device.rssi <= -245)),
    )
    .await
    .expect("sightings never settled")
    .unwrap()
    .clone();

    let unique: HashSet<_> = snapshot.iter().map(|d| d.address.clone()).collect();
    assert_eq!(unique.len(), snapshot.len());
}

#[tokio::test]
async fn discovery_failure_stops_scanning() {
    let (manager, radio) = start();
    let mut events = manager.events();
    let mut scanning = manager.is_scanning();
    manager.start_scan().await.unwrap();

    radio.discovery_failed(2);

    assert_eq!(next_error(&mut events).await, BleError::DiscoveryFailed(2));
    timeout(STEP, scanning.wait_for(|s| !*s)).await.unwrap().unwrap();
}

#[tokio::test]
async fn reports_from_a_replaced_scan_are_ignored() {
    let (manager, radio) = start();
    let mut events = manager.events();
    let mut devices = manager.discovered_devices();
    // Ending a scan makes the radio report it failed, after the fact.
    radio.fail_scan_when_stopped(SCAN_FAILED_INTERNAL_ERROR);

    manager.start_scan().await.unwrap();
    let first = radio.last_scan().unwrap();
    manager.start_scan().await.unwrap();
    assert_ne!(radio.last_scan(), Some(first));

    radio.emit(ScanEvent::DeviceDiscovered {
        scan: first,
        advertisement: Advertisement {
            address: "EE:FF".to_string(),
            name: None,
            rssi: -40,
            manufacturer_id: None,
        },
    });
    radio.advertise("AA:BB", None, -60);

    // Reports are handled in order, so the stale ones were seen first.
    let snapshot = timeout(STEP, devices.wait_for(|d| !d.is_empty()))
        .await
        .expect("current scan never reported")
        .unwrap()
        .clone();
    let addresses: Vec<_> = snapshot.iter().map(|d| d.address.as_str()).collect();
    assert_eq!(addresses, vec!["AA:BB"]);
    assert!(*manager.is_scanning().borrow());
    assert!(events.try_recv().is_err());

    // Still scanning, so stopping reaches the radio.
    manager.stop_scan().await.unwrap();
    let stop = RadioCall::StopDiscovery;
    timeout(STEP, async {
        while count_calls(&radio, &stop) < 2 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("second scan was never stopped");
    assert!(!*manager.is_scanning().borrow());
}

#[tokio::test]
async fn connect_stops_the_scan_first() {
    let (manager, radio) = start();
    manager.start_scan().await.unwrap();
    assert!(*manager.is_scanning().borrow());

    manager.connect("AA:BB").await.unwrap();
    wait_for_state(&manager, ConnectionState::Connecting).await;

    // Already off by the time the connection leaves Disconnected.
    assert!(!*manager.is_scanning().borrow());
    assert_eq!(
        radio.calls(),
        vec![
            RadioCall::StartDiscovery(ScanMode::LowLatency),
            RadioCall::StopDiscovery,
            RadioCall::OpenSession("AA:BB".to_string()),
        ]
    );
}

#[tokio::test]
async fn read_and_write_through_a_live_session() {
    let (manager, radio) = start();
    let mut events = manager.events();
    let handle = connected_with_services(&manager, &radio).await;

    manager.read_attribute(UUID_BATTERY_LEVEL).await.unwrap();
    wait_for_call(&radio, RadioCall::ReadAttribute(handle, UUID_BATTERY_LEVEL)).await;
    radio.emit(GattEvent::CharacteristicRead {
        handle,
        id: UUID_BATTERY_LEVEL,
        status: GattStatus::SUCCESS,
        value: vec![0x5A],
    });

    let mut attributes = manager.device_attributes();
    let tree = timeout(
        STEP,
        attributes.wait_for(|services| services[0].characteristics[0].last_read_value.is_some()),
    )
    .await
    .unwrap()
    .unwrap()
    .clone();
    assert_eq!(tree[0].characteristics[0].last_read_value, Some(vec![0x5A]));

    manager
        .write_attribute(UUID_HEART_RATE_CONTROL_POINT, vec![0x01])
        .await
        .unwrap();
    wait_for_call(
        &radio,
        RadioCall::WriteAttribute {
            handle,
            id: UUID_HEART_RATE_CONTROL_POINT,
            value: vec![0x01],
            mode: WriteMode::WithResponse,
        },
    )
    .await;

    // Not readable: refused locally.
    manager.read_attribute(UUID_HEART_RATE_CONTROL_POINT).await.unwrap();
    assert_eq!(
        next_error(&mut events).await,
        BleError::AttributeNotReadable(UUID_HEART_RATE_CONTROL_POINT)
    );
    let reads = radio
        .calls()
        .into_iter()
        .filter(|call| matches!(call, RadioCall::ReadAttribute(..)))
        .count();
    assert_eq!(reads, 1);
}

#[tokio::test]
async fn failed_connection_is_reported_and_released() {
    let (manager, radio) = start();
    let mut events = manager.events();

    manager.connect("AA:BB").await.unwrap();
    wait_for_state(&manager, ConnectionState::Connecting).await;
    let handle = radio.last_handle().unwrap();
    radio.link_changed(handle, GattStatus(133), ConnectionState::Disconnected);

    assert_eq!(next_error(&mut events).await, BleError::ConnectionFailed(133));
    wait_for_state(&manager, ConnectionState::Disconnected).await;
    wait_for_call(&radio, RadioCall::ReleaseSession(handle)).await;
    assert!(manager.device_attributes().borrow().is_empty());
}

#[tokio::test]
async fn second_connect_is_rejected() {
    let (manager, radio) = start();
    let mut events = manager.events();
    connected_with_services(&manager, &radio).await;
    manager.start_scan().await.unwrap();
    radio.clear_calls();

    manager.connect("CC:DD").await.unwrap();

    assert_eq!(
        next_error(&mut events).await,
        BleError::SessionBusy(ConnectionState::Connected)
    );
    assert_eq!(*manager.connection_state().borrow(), ConnectionState::Connected);
    // The refused request touches neither the scan nor the radio.
    assert!(*manager.is_scanning().borrow());
    assert!(radio.calls().is_empty());

    radio.advertise("EE:FF", None, -70);
    let mut devices = manager.discovered_devices();
    timeout(STEP, devices.wait_for(|d| d.len() == 1))
        .await
        .expect("scan stopped folding sightings")
        .unwrap();
}

#[tokio::test]
async fn disconnect_then_reconnect_ignores_old_handle() {
    let (manager, radio) = start();
    let old = connected_with_services(&manager, &radio).await;

    manager.disconnect().await.unwrap();
    wait_for_state(&manager, ConnectionState::Disconnecting).await;
    radio.link_changed(old, GattStatus::SUCCESS, ConnectionState::Disconnected);
    wait_for_state(&manager, ConnectionState::Disconnected).await;
    assert!(manager.device_attributes().borrow().is_empty());

    manager.connect("AA:BB").await.unwrap();
    wait_for_state(&manager, ConnectionState::Connecting).await;
    let current = radio.last_handle().unwrap();
    assert_ne!(old, current);

    // A late report for the released session changes nothing.
    radio.link_changed(old, GattStatus::SUCCESS, ConnectionState::Connected);
    radio.link_changed(current, GattStatus::SUCCESS, ConnectionState::Connected);
    wait_for_state(&manager, ConnectionState::Connected).await;
    wait_for_call(&radio, RadioCall::DiscoverAttributes(current)).await;
    let discoveries = radio
        .calls()
        .into_iter()
        .filter(|call| matches!(call, RadioCall::DiscoverAttributes(h) if *h == old))
        .count();
    assert_eq!(discoveries, 1);
}

#[tokio::test]
async fn dropped_link_clears_the_session() {
    let (manager, radio) = start();
    let mut events = manager.events();
    let handle = connected_with_services(&manager, &radio).await;

    radio.link_changed(handle, GattStatus(8), ConnectionState::Disconnected);

    assert_eq!(next_error(&mut events).await, BleError::ConnectionLost(8));
    wait_for_state(&manager, ConnectionState::Disconnected).await;
    assert!(manager.device_attributes().borrow().is_empty());

    manager.read_attribute(UUID_BATTERY_LEVEL).await.unwrap();
    assert_eq!(
        next_error(&mut events).await,
        BleError::AttributeNotFound(UUID_BATTERY_LEVEL)
    );
}
