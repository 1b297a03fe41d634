//! Recording mocks of the radio driver, transport and reconnect timer.
//!
//! All three write into one shared [`Journal`] so tests can assert on the
//! relative order of calls across adapters.  The radio posts the same
//! driver notifications the real Wi-Fi stack would.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use audio_firmware::adapters::credentials::CredentialStore;
use audio_firmware::adapters::nvs::NvsStore;
use audio_firmware::app::ports::{RadioDriver, ReconnectTimer, Transport};
use audio_firmware::bus::{Listener, MessageBus};
use audio_firmware::connection::{ConnectionId, Role, Socket};
use audio_firmware::error::RadioError;
use audio_firmware::wlan::scan::{ApRecord, ApRecords, ScanResults};
use audio_firmware::wlan::{Internal, RadioController, WlanEvent, WlanHandle};

// ── Call record ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    StartStation,
    StopStation,
    StartAccessPoint,
    StopAccessPoint,
    Scan,
    Connect(String),
    TransportStart(Role),
    TransportStop,
    Close(Socket),
    Send(u32, String),
    Arm(Duration),
    Disarm,
}

#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Call>>>);

#[allow(dead_code)]
impl Journal {
    pub fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn position(&self, call: &Call) -> Option<usize> {
        self.calls().iter().position(|c| c == call)
    }
}

// ── MockRadio ─────────────────────────────────────────────────

pub struct MockRadio {
    handle: WlanHandle,
    journal: Journal,
    networks: Vec<(ApRecord, String)>,
}

impl MockRadio {
    pub fn new(handle: WlanHandle, journal: Journal) -> Self {
        Self {
            handle,
            journal,
            networks: Vec::new(),
        }
    }

    pub fn with_network(mut self, ssid: &str, key: &str, rssi: i8) -> Self {
        self.networks.push((ApRecord::new(ssid, rssi), key.to_owned()));
        self
    }

    fn post(&self, event: Internal) {
        self.handle.driver_event(event).unwrap();
    }
}

impl RadioDriver for MockRadio {
    fn start_station(&mut self) -> Result<(), RadioError> {
        self.journal.push(Call::StartStation);
        self.post(Internal::StationStarted);
        Ok(())
    }

    fn stop_station(&mut self) -> Result<(), RadioError> {
        self.journal.push(Call::StopStation);
        Ok(())
    }

    fn start_access_point(&mut self) -> Result<(), RadioError> {
        self.journal.push(Call::StartAccessPoint);
        self.post(Internal::AccessPointStarted);
        Ok(())
    }

    fn stop_access_point(&mut self) -> Result<(), RadioError> {
        self.journal.push(Call::StopAccessPoint);
        Ok(())
    }

    fn scan(&mut self) -> Result<ApRecords, RadioError> {
        self.journal.push(Call::Scan);
        Ok(self.networks.iter().map(|(rec, _)| rec.clone()).collect())
    }

    fn connect(&mut self, ssid: &str, key: &str) -> Result<(), RadioError> {
        self.journal.push(Call::Connect(ssid.to_owned()));
        let accepted = self
            .networks
            .iter()
            .any(|(rec, k)| rec.ssid == ssid && k == key);
        self.post(if accepted {
            Internal::GotIp
        } else {
            Internal::StationDisconnected
        });
        Ok(())
    }
}

// ── MockTransport ─────────────────────────────────────────────

pub struct MockTransport {
    journal: Journal,
}

impl MockTransport {
    pub fn new(journal: Journal) -> Self {
        Self { journal }
    }
}

impl Transport for MockTransport {
    fn start(&self, role: Role) {
        self.journal.push(Call::TransportStart(role));
    }

    fn stop(&self) {
        self.journal.push(Call::TransportStop);
    }

    fn close(&self, socket: Socket) {
        self.journal.push(Call::Close(socket));
    }

    fn send_text(&self, connection: ConnectionId, text: &str) {
        self.journal.push(Call::Send(connection.get(), text.to_owned()));
    }
}

// ── MockTimer ─────────────────────────────────────────────────

/// Records arm/disarm only; tests fire it by posting
/// [`Internal::ReconnectTimer`].
pub struct MockTimer {
    journal: Journal,
}

impl ReconnectTimer for MockTimer {
    fn arm(&mut self, after: Duration) {
        self.journal.push(Call::Arm(after));
    }

    fn disarm(&mut self) {
        self.journal.push(Call::Disarm);
    }
}

// ── Rig ───────────────────────────────────────────────────────

pub const PERIOD: Duration = Duration::from_secs(30);

pub type Controller = RadioController<MockRadio, MockTransport, MockTimer>;

/// A controller wired to mocks, plus a listener on its public events.
pub struct Rig {
    pub bus: Arc<MessageBus>,
    pub controller: Controller,
    pub events: Listener,
    pub journal: Journal,
    pub scan: Arc<ScanResults>,
}

#[allow(dead_code)]
impl Rig {
    /// `known` networks go into the credential store; `visible` ones are
    /// what the radio sees as `(ssid, key, rssi)`.
    pub fn new(known: &[(&str, &str)], visible: &[(&str, &str, i8)]) -> Self {
        let bus = Arc::new(MessageBus::new());
        let handle = WlanHandle::new(Arc::clone(&bus)).unwrap();
        let events = bus.listen(handle.event_type()).unwrap();
        let journal = Journal::default();

        let credentials = Arc::new(CredentialStore::open(
            Box::new(NvsStore::new().unwrap()),
            Duration::from_millis(10),
        ));
        {
            let mut creds = credentials.checkout().unwrap();
            for (i, (ssid, key)) in known.iter().enumerate() {
                creds.set(i, ssid, key).unwrap();
            }
            creds.release(false).unwrap();
        }

        let mut radio = MockRadio::new(handle.clone(), journal.clone());
        for (ssid, key, rssi) in visible {
            radio = radio.with_network(ssid, key, *rssi);
        }
        let scan = Arc::new(ScanResults::new());
        let controller = RadioController::new(
            handle,
            radio,
            MockTransport::new(journal.clone()),
            MockTimer {
                journal: journal.clone(),
            },
            credentials,
            Arc::clone(&scan),
            PERIOD,
        )
        .unwrap();
        Self {
            bus,
            controller,
            events,
            journal,
            scan,
        }
    }

    /// Start the controller and run until no internal message is pending.
    pub fn boot(&mut self) {
        self.controller.start();
        self.settle();
    }

    pub fn settle(&mut self) {
        while self.controller.poll() > 0 {}
    }

    pub fn post(&mut self, event: Internal) {
        self.controller.handle().driver_event(event).unwrap();
        self.settle();
    }

    pub fn toggle(&mut self) {
        self.controller.handle().toggle_mode().unwrap();
        self.settle();
    }

    /// Drain published events.
    pub fn published(&self) -> Vec<WlanEvent> {
        std::iter::from_fn(|| self.events.try_receive())
            .filter_map(|m| m.value().and_then(WlanEvent::from_u32))
            .collect()
    }
}
