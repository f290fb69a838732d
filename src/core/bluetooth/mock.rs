//! In-memory radio for tests and demos.
//!
//! `MockRadio` records every request it receives and never produces events
//! on its own; callers inject the events a real radio would deliver.

use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use regex::Regex;
use uuid::Uuid;

use crate::core::bluetooth::constants::RADIO_ERROR_INVALID_ADDRESS;
use crate::core::bluetooth::radio::{
    radio_event_channel, Advertisement, GattEvent, Radio, RadioEvent, RadioEventReceiver,
    RadioEventSender, RawService, ScanEvent,
};
use crate::core::bluetooth::types::{
    ConnectionState, GattStatus, ScanId, ScanMode, SessionHandle, WriteMode,
};
use crate::error::RadioError;

static ADDRESS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9A-Fa-f]{2}(:[0-9A-Fa-f]{2})*$").expect("address pattern is valid")
});

/// A request the mock received, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioCall {
    StartDiscovery(ScanMode),
    StopDiscovery,
    OpenSession(String),
    CloseSession(SessionHandle),
    ReleaseSession(SessionHandle),
    DiscoverAttributes(SessionHandle),
    ReadAttribute(SessionHandle, Uuid),
    WriteAttribute {
        handle: SessionHandle,
        id: Uuid,
        value: Vec<u8>,
        mode: WriteMode,
    },
}

#[derive(Debug)]
struct MockState {
    available: bool,
    calls: Vec<RadioCall>,
    next_handle: u64,
    last_handle: Option<SessionHandle>,
    next_scan: u64,
    last_scan: Option<ScanId>,
    /// Failure posted for the stopped scan whenever discovery is stopped
    failure_on_stop: Option<i32>,
    pending_failure: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct MockRadio {
    state: Arc<Mutex<MockState>>,
    events: RadioEventSender,
}

impl MockRadio {
    /// Creates an available radio and the receiver its events arrive on.
    pub fn new() -> (Self, RadioEventReceiver) {
        let (events, receiver) = radio_event_channel();
        let radio = Self {
            state: Arc::new(Mutex::new(MockState {
                available: true,
                calls: Vec::new(),
                next_handle: 1,
                last_handle: None,
                next_scan: 1,
                last_scan: None,
                failure_on_stop: None,
                pending_failure: None,
            })),
            events,
        };
        (radio, receiver)
    }

    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    /// Makes the next request fail synchronously with `code`.
    pub fn fail_next_request(&self, code: i32) {
        self.lock().pending_failure = Some(code);
    }

    /// Makes every later `stop_discovery` post `DiscoveryFailed { code }` for
    /// the scan it stopped, as stacks do when a scan stream ends.
    pub fn fail_scan_when_stopped(&self, code: i32) {
        self.lock().failure_on_stop = Some(code);
    }

    pub fn calls(&self) -> Vec<RadioCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Handle issued by the most recent successful `open_session`.
    pub fn last_handle(&self) -> Option<SessionHandle> {
        self.lock().last_handle
    }

    /// Id issued by the most recent successful `start_discovery`.
    pub fn last_scan(&self) -> Option<ScanId> {
        self.lock().last_scan
    }

    pub fn emit(&self, event: impl Into<RadioEvent>) {
        // The receiver is gone once the manager shuts down.
        let _ = self.events.send(event.into());
    }

    /// Reports a sighting from the most recently started scan.
    pub fn advertise(&self, address: &str, name: Option<&str>, rssi: i16) {
        self.emit(ScanEvent::DeviceDiscovered {
            scan: self.reporting_scan(),
            advertisement: Advertisement {
                address: address.to_string(),
                name: name.map(str::to_string),
                rssi,
                manufacturer_id: None,
            },
        });
    }

    /// Reports that the most recently started scan failed.
    pub fn discovery_failed(&self, code: i32) {
        self.emit(ScanEvent::DiscoveryFailed {
            scan: self.reporting_scan(),
            code,
        });
    }

    pub fn link_changed(&self, handle: SessionHandle, status: GattStatus, state: ConnectionState) {
        self.emit(GattEvent::ConnectionStateChanged {
            handle,
            status,
            state,
        });
    }

    pub fn services_discovered(&self, handle: SessionHandle, services: Vec<RawService>) {
        self.emit(GattEvent::ServicesDiscovered {
            handle,
            status: GattStatus::SUCCESS,
            services,
        });
    }

    fn reporting_scan(&self) -> ScanId {
        self.last_scan().unwrap_or(ScanId(0))
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: RadioCall) -> Result<(), RadioError> {
        let mut state = self.lock();
        state.calls.push(call);
        match state.pending_failure.take() {
            Some(code) => Err(RadioError::new(code, "injected failure")),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Radio for MockRadio {
    async fn is_available(&self) -> bool {
        self.lock().available
    }

    async fn start_discovery(&self, mode: ScanMode) -> Result<ScanId, RadioError> {
        self.record(RadioCall::StartDiscovery(mode))?;
        let mut state = self.lock();
        let scan = ScanId(state.next_scan);
        state.next_scan += 1;
        state.last_scan = Some(scan);
        Ok(scan)
    }

    async fn stop_discovery(&self) -> Result<(), RadioError> {
        self.record(RadioCall::StopDiscovery)?;
        let failure = {
            let state = self.lock();
            state.failure_on_stop.zip(state.last_scan)
        };
        if let Some((code, scan)) = failure {
            self.emit(ScanEvent::DiscoveryFailed { scan, code });
        }
        Ok(())
    }

    async fn open_session(&self, address: &str) -> Result<SessionHandle, RadioError> {
        self.record(RadioCall::OpenSession(address.to_string()))?;
        if !ADDRESS_PATTERN.is_match(address) {
            return Err(RadioError::new(
                RADIO_ERROR_INVALID_ADDRESS,
                format!("{address} is not a valid device address"),
            ));
        }

        let mut state = self.lock();
        let handle = SessionHandle(state.next_handle);
        state.next_handle += 1;
        state.last_handle = Some(handle);
        Ok(handle)
    }

    async fn close_session(&self, handle: SessionHandle) -> Result<(), RadioError> {
        self.record(RadioCall::CloseSession(handle))
    }

    async fn release_session(&self, handle: SessionHandle) {
        self.lock().calls.push(RadioCall::ReleaseSession(handle));
    }

    async fn discover_attributes(&self, handle: SessionHandle) -> Result<(), RadioError> {
        self.record(RadioCall::DiscoverAttributes(handle))
    }

    async fn read_attribute(&self, handle: SessionHandle, id: Uuid) -> Result<(), RadioError> {
        self.record(RadioCall::ReadAttribute(handle, id))
    }

    async fn write_attribute(
        &self,
        handle: SessionHandle,
        id: Uuid,
        value: &[u8],
        mode: WriteMode,
    ) -> Result<(), RadioError> {
        self.record(RadioCall::WriteAttribute {
            handle,
            id,
            value: value.to_vec(),
            mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn issues_increasing_handles() {
        let (radio, _events) = MockRadio::new();
        let first = radio.open_session("AA:BB").await.unwrap();
        let second = radio.open_session("CC:DD").await.unwrap();
        assert!(second > first);
        assert_eq!(radio.last_handle(), Some(second));
    }

    #[tokio::test]
    async fn rejects_malformed_addresses() {
        let (radio, _events) = MockRadio::new();
        let err = radio.open_session("not-an-address").await.unwrap_err();
        assert_eq!(err.code, RADIO_ERROR_INVALID_ADDRESS);
        assert_eq!(radio.last_handle(), None);
    }

    #[tokio::test]
    async fn injected_failure_applies_once() {
        let (radio, _events) = MockRadio::new();
        radio.fail_next_request(7);
        assert_eq!(radio.stop_discovery().await.unwrap_err().code, 7);
        assert!(radio.stop_discovery().await.is_ok());
        assert_eq!(radio.calls().len(), 2);
    }

    #[tokio::test]
    async fn emitted_events_reach_the_receiver() {
        let (radio, mut events) = MockRadio::new();
        radio.advertise("AA:BB", Some("Sensor"), -40);
        match events.recv().await {
            Some(RadioEvent::Scan(ScanEvent::DeviceDiscovered { scan, advertisement })) => {
                assert_eq!(scan, ScanId(0));
                assert_eq!(advertisement.address, "AA:BB");
                assert_eq!(advertisement.rssi, -40);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn each_scan_gets_a_fresh_id() {
        let (radio, mut events) = MockRadio::new();
        let first = radio.start_discovery(ScanMode::LowLatency).await.unwrap();
        let second = radio.start_discovery(ScanMode::Balanced).await.unwrap();
        assert!(second > first);
        assert_eq!(radio.last_scan(), Some(second));

        radio.advertise("AA:BB", None, -40);
        match events.recv().await {
            Some(RadioEvent::Scan(event)) => assert_eq!(event.scan(), second),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn stopping_can_report_a_failure_for_the_stopped_scan() {
        let (radio, mut events) = MockRadio::new();
        radio.fail_scan_when_stopped(3);
        let scan = radio.start_discovery(ScanMode::LowLatency).await.unwrap();

        radio.stop_discovery().await.unwrap();

        assert_eq!(
            events.recv().await,
            Some(RadioEvent::Scan(ScanEvent::DiscoveryFailed { scan, code: 3 }))
        );
    }
}
